use std::sync::Arc;

use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    domain::{ConfessionId, MessageId, UserId},
    errors::Error,
    formatting::truncate_chars,
    notify::Notifier,
    reputation::{Level, REP_COMMENT_POSTED},
    sanitize::sanitize_input,
    store::{collections, get_doc, put_doc, DocumentStore},
    users::UserDirectory,
    Result,
};

const MIN_COMMENT_LEN: usize = 3;
const NOTIFY_PREVIEW_LEN: usize = 50;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub author: UserId,
    pub text: String,
    /// Display name at post time; pages re-resolve the current one.
    pub author_name: String,
    /// Human-readable local time, shown in comment listings.
    pub posted_at: String,
    /// Canonical RFC3339 timestamp.
    pub created_at: String,
}

/// Per-confession comment thread. Created empty when the confession is
/// published; mutated only by appends, insertion order = display order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CommentThread {
    pub confession: ConfessionId,
    pub confession_number: i64,
    /// Denormalized from the confession for the comment views.
    pub confession_text: String,
    /// The published channel message this thread hangs off.
    pub channel_message_id: i32,
    pub comments: Vec<Comment>,
    pub total_comments: i64,
}

/// One entry of a comment page, enriched at read time.
#[derive(Clone, Debug)]
pub struct CommentEntry {
    /// 1-based position in the whole thread.
    pub index: usize,
    pub comment: Comment,
    /// The commenter's current display name (not the snapshot).
    pub author_name: String,
    /// Recomputed from the commenter's current lifetime comment count, so a
    /// displayed level can change retroactively.
    pub author_level: Level,
}

#[derive(Clone, Debug)]
pub struct CommentPage {
    pub page: usize,
    pub total_pages: usize,
    pub total_comments: usize,
    pub confession_number: i64,
    pub confession_text: String,
    pub entries: Vec<CommentEntry>,
}

pub struct CommentThreads {
    store: Arc<dyn DocumentStore>,
    users: Arc<UserDirectory>,
    notifier: Arc<Notifier>,
}

impl CommentThreads {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        users: Arc<UserDirectory>,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            store,
            users,
            notifier,
        }
    }

    /// Creates the empty thread for a freshly published confession.
    pub async fn create(
        &self,
        confession: &crate::confession::Confession,
        channel_message_id: MessageId,
    ) -> Result<()> {
        let thread = CommentThread {
            confession: confession.id.clone(),
            confession_number: confession.number,
            confession_text: confession.text.clone(),
            channel_message_id: channel_message_id.0,
            comments: Vec::new(),
            total_comments: 0,
        };
        put_doc(
            self.store.as_ref(),
            collections::COMMENTS,
            confession.id.as_str(),
            &thread,
        )
        .await
    }

    pub async fn get(&self, confession: &ConfessionId) -> Result<Option<CommentThread>> {
        get_doc(self.store.as_ref(), collections::COMMENTS, confession.as_str()).await
    }

    /// Appends a comment and returns the updated thread.
    ///
    /// Credits +5 reputation, bumps the thread/confession/user counters and
    /// notifies the confession author (unless commenting on their own, or
    /// opted out) with a short preview.
    pub async fn append(
        &self,
        confession_id: &ConfessionId,
        author: UserId,
        raw_text: &str,
    ) -> Result<CommentThread> {
        if raw_text.trim().chars().count() < MIN_COMMENT_LEN {
            return Err(Error::Validation(
                "Comment too short. Minimum 3 characters.".to_string(),
            ));
        }

        let mut thread = self
            .get(confession_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("no comment thread for {confession_id}")))?;

        let text = sanitize_input(raw_text);
        let profile = self.users.get_or_create(author).await?;
        let now = Utc::now();

        thread.comments.push(Comment {
            id: format!("comment_{}_{}", now.timestamp_millis(), author.0),
            author,
            text: text.clone(),
            author_name: profile.username.clone(),
            posted_at: Local::now().format("%Y-%m-%d %H:%M").to_string(),
            created_at: now.to_rfc3339(),
        });
        thread.total_comments += 1;

        put_doc(
            self.store.as_ref(),
            collections::COMMENTS,
            confession_id.as_str(),
            &thread,
        )
        .await?;

        let confession = get_doc::<crate::confession::Confession>(
            self.store.as_ref(),
            collections::CONFESSIONS,
            confession_id.as_str(),
        )
        .await?;

        // Cached count on the confession document, best-effort.
        if confession.is_some() {
            self.store
                .update(
                    collections::CONFESSIONS,
                    confession_id.as_str(),
                    json!({ "total_comments": thread.total_comments }),
                )
                .await?;
        }

        self.users.bump_comments(author).await?;
        self.users
            .adjust_reputation(author, REP_COMMENT_POSTED)
            .await?;

        if let Some(confession) = confession {
            if confession.author != author {
                let preview = truncate_chars(&text, NOTIFY_PREVIEW_LEN);
                self.notifier
                    .new_comment(confession.author, confession.number, &preview)
                    .await;
            }
        }

        Ok(thread)
    }

    /// Returns one page of the thread, 1-based. Out-of-range pages yield an
    /// empty slice, not an error.
    pub async fn page(
        &self,
        confession_id: &ConfessionId,
        page: usize,
        page_size: usize,
    ) -> Result<CommentPage> {
        let thread = self
            .get(confession_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("no comment thread for {confession_id}")))?;

        let page = page.max(1);
        let page_size = page_size.max(1);
        let total = thread.comments.len();
        let start = (page - 1) * page_size;

        let mut entries = Vec::new();
        for (offset, comment) in thread
            .comments
            .iter()
            .skip(start)
            .take(page_size)
            .enumerate()
        {
            let profile = self.users.get_or_create(comment.author).await?;
            entries.push(CommentEntry {
                index: start + offset + 1,
                comment: comment.clone(),
                author_name: profile.username.clone(),
                author_level: profile.level(),
            });
        }

        Ok(CommentPage {
            page,
            total_pages: total.div_ceil(page_size),
            total_comments: total,
            confession_number: thread.confession_number,
            confession_text: thread.confession_text.clone(),
            entries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Fixture;

    #[tokio::test]
    async fn short_comments_are_rejected() {
        let fx = Fixture::new().await;
        let id = fx.published_confession(UserId(10), "something happened").await;

        let err = fx.threads.append(&id, UserId(2), "no").await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        assert!(fx.threads.append(&id, UserId(2), "yes").await.is_ok());
    }

    #[tokio::test]
    async fn appending_to_a_missing_thread_is_not_found() {
        let fx = Fixture::new().await;
        let ghost = ConfessionId("confess_1_123".to_string());
        let err = fx.threads.append(&ghost, UserId(2), "hello").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn append_updates_counters_and_reputation() {
        let fx = Fixture::new().await;
        let id = fx.published_confession(UserId(10), "something happened").await;

        let thread = fx.threads.append(&id, UserId(2), "first comment").await.unwrap();
        assert_eq!(thread.total_comments, 1);
        assert_eq!(thread.comments.len(), 1);

        let commenter = fx.users.get(UserId(2)).await.unwrap().unwrap();
        assert_eq!(commenter.reputation, 5);
        assert_eq!(commenter.total_comments, 1);

        let confession = fx.pipeline.get(&id).await.unwrap().unwrap();
        assert_eq!(confession.total_comments, 1);
    }

    #[tokio::test]
    async fn comment_text_is_sanitized_and_name_snapshotted() {
        let fx = Fixture::new().await;
        fx.users.set_username(UserId(2), "critic_9").await.unwrap();
        let id = fx.published_confession(UserId(10), "something happened").await;

        let thread = fx
            .threads
            .append(&id, UserId(2), "nice <b>one</b><script>alert(1)</script>")
            .await
            .unwrap();
        let comment = &thread.comments[0];
        assert_eq!(comment.text, "nice one");
        assert_eq!(comment.author_name, "critic_9");
    }

    #[tokio::test]
    async fn author_gets_a_preview_notification_but_not_for_own_comments() {
        let fx = Fixture::new().await;
        let author = UserId(10);
        let id = fx.published_confession(author, "something happened").await;

        fx.messenger.clear().await;
        fx.threads.append(&id, author, "my own note").await.unwrap();
        assert!(fx.messenger.texts_for(author.0).await.is_empty());

        let long = "x".repeat(80);
        fx.threads.append(&id, UserId(2), &long).await.unwrap();
        let delivered = fx.messenger.texts_for(author.0).await;
        assert_eq!(delivered.len(), 1);
        assert!(delivered[0].contains(&"x".repeat(50)));
        assert!(!delivered[0].contains(&"x".repeat(51)));
    }

    #[tokio::test]
    async fn opted_out_authors_are_not_notified() {
        let fx = Fixture::new().await;
        let author = UserId(10);
        let id = fx.published_confession(author, "something happened").await;

        let mut profile = fx.users.get_or_create(author).await.unwrap();
        profile.notifications.new_comment = false;
        fx.users.save(&profile).await.unwrap();

        fx.messenger.clear().await;
        fx.threads.append(&id, UserId(2), "a comment").await.unwrap();
        assert!(fx.messenger.texts_for(author.0).await.is_empty());
    }

    #[tokio::test]
    async fn pagination_slices_and_counts_pages() {
        let fx = Fixture::new().await;
        let id = fx.published_confession(UserId(10), "something happened").await;
        for i in 1..=12 {
            fx.threads
                .append(&id, UserId(100 + i), &format!("comment number {i}"))
                .await
                .unwrap();
        }

        let first = fx.threads.page(&id, 1, 5).await.unwrap();
        assert_eq!(first.total_pages, 3);
        assert_eq!(first.total_comments, 12);
        assert_eq!(first.entries.len(), 5);
        assert_eq!(first.entries[0].index, 1);
        assert_eq!(first.entries[4].index, 5);

        let third = fx.threads.page(&id, 3, 5).await.unwrap();
        assert_eq!(third.entries.len(), 2);
        assert_eq!(third.entries[0].index, 11);
        assert_eq!(third.entries[1].comment.text, "comment number 12");

        let fourth = fx.threads.page(&id, 4, 5).await.unwrap();
        assert!(fourth.entries.is_empty());
        assert_eq!(fourth.total_pages, 3);
    }

    #[tokio::test]
    async fn page_entries_show_the_current_name_and_level() {
        let fx = Fixture::new().await;
        let id = fx.published_confession(UserId(10), "something happened").await;
        fx.threads.append(&id, UserId(2), "early words").await.unwrap();

        // The commenter renames and grows after posting.
        fx.users.set_username(UserId(2), "renamed_user").await.unwrap();
        for _ in 0..24 {
            fx.users.bump_comments(UserId(2)).await.unwrap();
        }

        let page = fx.threads.page(&id, 1, 5).await.unwrap();
        let entry = &page.entries[0];
        assert_eq!(entry.comment.author_name, "Anonymous");
        assert_eq!(entry.author_name, "renamed_user");
        assert_eq!(entry.author_level.rank, 2);
    }
}
