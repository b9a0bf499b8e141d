use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{
    callback::CallbackAction,
    comments::CommentThreads,
    config::Config,
    cooldown::{Cooldowns, ACTION_CONFESSION},
    domain::{ChatId, ConfessionId, UserId},
    errors::Error,
    formatting::{escape_html, truncate_chars},
    messaging::{
        port::MessengerPort,
        types::{InlineButton, InlineKeyboard},
    },
    notify::Notifier,
    reputation::REP_CONFESSION_APPROVED,
    sanitize::{extract_hashtags, sanitize_input},
    sequence::{SequenceGenerator, SEQ_CONFESSION_NUMBER},
    store::{collections, get_doc, put_doc, DocumentStore},
    users::UserDirectory,
    Result,
};

pub const MIN_CONFESSION_LEN: usize = 5;
pub const MAX_CONFESSION_LEN: usize = 1000;

const ADMIN_PREVIEW_LEN: usize = 200;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfessionStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Confession {
    pub id: ConfessionId,
    pub author: UserId,
    /// Sanitized text; immutable after submission.
    pub text: String,
    /// Ordinal sequence number, assigned at submission.
    pub number: i64,
    pub status: ConfessionStatus,
    pub created_at: String,
    #[serde(default)]
    pub moderated_at: Option<String>,
    #[serde(default)]
    pub rejection_reason: Option<String>,
    #[serde(default)]
    pub hashtags: Vec<String>,
    /// Cached comment count, maintained by the thread manager.
    #[serde(default)]
    pub total_comments: i64,
    #[serde(default)]
    pub likes: i64,
}

/// Result of a moderation decision. `AlreadyModerated` is the idempotency
/// guard: a retried tap reports the earlier decision instead of re-applying
/// side effects.
#[derive(Clone, Debug)]
pub enum ModerationOutcome {
    Approved(Confession),
    Rejected(Confession),
    AlreadyModerated(ConfessionStatus),
}

/// Owns the confession lifecycle: submission, the moderation decision, and
/// channel publication.
pub struct ModerationPipeline {
    cfg: Arc<Config>,
    store: Arc<dyn DocumentStore>,
    users: Arc<UserDirectory>,
    sequences: SequenceGenerator,
    cooldowns: Cooldowns,
    threads: Arc<CommentThreads>,
    notifier: Arc<Notifier>,
    messenger: Arc<dyn MessengerPort>,
}

impl ModerationPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cfg: Arc<Config>,
        store: Arc<dyn DocumentStore>,
        users: Arc<UserDirectory>,
        sequences: SequenceGenerator,
        cooldowns: Cooldowns,
        threads: Arc<CommentThreads>,
        notifier: Arc<Notifier>,
        messenger: Arc<dyn MessengerPort>,
    ) -> Self {
        Self {
            cfg,
            store,
            users,
            sequences,
            cooldowns,
            threads,
            notifier,
            messenger,
        }
    }

    pub async fn get(&self, id: &ConfessionId) -> Result<Option<Confession>> {
        get_doc(self.store.as_ref(), collections::CONFESSIONS, id.as_str()).await
    }

    /// Validates, sanitizes and persists a new pending confession, then fans
    /// the moderation request out to every configured admin.
    ///
    /// The steps after the sequence number are best-effort sequential, not a
    /// transaction: the number is taken first so a crash mid-way leaves a
    /// numbering gap, never a duplicate.
    pub async fn submit(&self, author: UserId, raw_text: &str) -> Result<Confession> {
        if raw_text.trim().chars().count() < MIN_CONFESSION_LEN {
            return Err(Error::Validation(
                "Confession too short. Minimum 5 characters.".to_string(),
            ));
        }
        if raw_text.chars().count() > MAX_CONFESSION_LEN {
            return Err(Error::Validation(
                "Confession too long. Maximum 1000 characters.".to_string(),
            ));
        }

        let text = sanitize_input(raw_text);
        let hashtags = extract_hashtags(&text);
        let now = Utc::now();
        let id = ConfessionId::new(author, now.timestamp_millis());
        let number = self.sequences.next(SEQ_CONFESSION_NUMBER).await?;

        let confession = Confession {
            id: id.clone(),
            author,
            text,
            number,
            status: ConfessionStatus::Pending,
            created_at: now.to_rfc3339(),
            moderated_at: None,
            rejection_reason: None,
            hashtags,
            total_comments: 0,
            likes: 0,
        };

        put_doc(
            self.store.as_ref(),
            collections::CONFESSIONS,
            id.as_str(),
            &confession,
        )
        .await?;

        self.users.bump_confessions(author).await?;
        self.cooldowns.record(author, ACTION_CONFESSION).await?;
        self.request_moderation(&confession).await;

        tracing::info!(confession = %id, number, "confession submitted");
        Ok(confession)
    }

    /// Approves a pending confession: status, +10 author reputation,
    /// channel publication, author notification.
    pub async fn approve(&self, admin: UserId, id: &ConfessionId) -> Result<ModerationOutcome> {
        self.require_admin(admin)?;

        let mut confession = self
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("confession {id}")))?;

        if confession.status != ConfessionStatus::Pending {
            return Ok(ModerationOutcome::AlreadyModerated(confession.status));
        }

        confession.status = ConfessionStatus::Approved;
        confession.moderated_at = Some(Utc::now().to_rfc3339());
        put_doc(
            self.store.as_ref(),
            collections::CONFESSIONS,
            id.as_str(),
            &confession,
        )
        .await?;

        self.users
            .adjust_reputation(confession.author, REP_CONFESSION_APPROVED)
            .await?;
        self.publish(&confession).await?;
        self.notifier
            .confession_approved(confession.author, confession.number)
            .await;

        tracing::info!(confession = %id, admin = admin.0, "confession approved");
        Ok(ModerationOutcome::Approved(confession))
    }

    /// Second step of the two-step rejection: the reason arrives as the
    /// admin's next text message.
    pub async fn reject(
        &self,
        admin: UserId,
        id: &ConfessionId,
        reason: &str,
    ) -> Result<ModerationOutcome> {
        self.require_admin(admin)?;

        let mut confession = self
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("confession {id}")))?;

        if confession.status != ConfessionStatus::Pending {
            return Ok(ModerationOutcome::AlreadyModerated(confession.status));
        }

        confession.status = ConfessionStatus::Rejected;
        confession.moderated_at = Some(Utc::now().to_rfc3339());
        confession.rejection_reason = Some(reason.to_string());
        put_doc(
            self.store.as_ref(),
            collections::CONFESSIONS,
            id.as_str(),
            &confession,
        )
        .await?;

        self.notifier
            .confession_rejected(confession.author, confession.number, reason)
            .await;

        tracing::info!(confession = %id, admin = admin.0, "confession rejected");
        Ok(ModerationOutcome::Rejected(confession))
    }

    /// Posts the approved confession to the channel and creates its empty
    /// comment thread, recording the channel message id. "Approve implies
    /// publish" — exactly-once delivery is not guaranteed here.
    async fn publish(&self, confession: &Confession) -> Result<()> {
        let text = format!(
            "#{}\n\n{}\n\n💬 Comment on this confession:",
            confession.number,
            escape_html(&confession.text)
        );
        let keyboard = InlineKeyboard::row(vec![InlineButton::url(
            "👁️‍🗨️ View/Add Comments",
            self.cfg.comment_deep_link(&confession.id),
        )]);

        let posted = self
            .messenger
            .send_channel_post(&self.cfg.channel_id, &text, keyboard)
            .await?;

        self.threads.create(confession, posted.message_id).await?;

        tracing::info!(confession = %confession.id, number = confession.number, "published to channel");
        Ok(())
    }

    /// Fan-out to every configured admin with inline accept/reject controls.
    /// Per-admin delivery failures are logged, not propagated.
    async fn request_moderation(&self, confession: &Confession) {
        if self.cfg.admin_ids.is_empty() {
            tracing::warn!(confession = %confession.id, "no admins configured; confession stays pending");
            return;
        }

        let preview = truncate_chars(&confession.text, ADMIN_PREVIEW_LEN);
        let text = format!(
            "🤫 <b>New Confession #{}</b>\n\n{}\n\n<b>Actions:</b>",
            confession.number,
            escape_html(&preview)
        );
        let keyboard = InlineKeyboard::row(vec![
            InlineButton::callback(
                "✅ Approve",
                CallbackAction::Approve(confession.id.clone()).encode(),
            ),
            InlineButton::callback(
                "❌ Reject",
                CallbackAction::Reject(confession.id.clone()).encode(),
            ),
        ]);

        for &admin in &self.cfg.admin_ids {
            if let Err(e) = self
                .messenger
                .send_keyboard(ChatId(admin), &text, keyboard.clone())
                .await
            {
                tracing::warn!(admin_id = admin, error = %e, "moderation request delivery failed");
            }
        }
    }

    fn require_admin(&self, user: UserId) -> Result<()> {
        if self.cfg.is_admin(user) {
            return Ok(());
        }
        tracing::warn!(user_id = user.0, "admin action denied");
        Err(Error::Permission(format!("user {} is not an admin", user.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::types::ButtonAction;
    use crate::test_support::{Fixture, ADMIN};

    #[tokio::test]
    async fn submission_length_bounds() {
        let fx = Fixture::new().await;

        let err = fx.pipeline.submit(UserId(1), "four").await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        assert!(fx.pipeline.submit(UserId(1), "12345").await.is_ok());
        assert!(fx.pipeline.submit(UserId(2), &"x".repeat(1000)).await.is_ok());

        let err = fx
            .pipeline
            .submit(UserId(3), &"x".repeat(1001))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn trimmed_length_decides_the_minimum() {
        let fx = Fixture::new().await;
        let err = fx.pipeline.submit(UserId(1), "   abcd   ").await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn submission_assigns_increasing_numbers_and_records_state() {
        let fx = Fixture::new().await;

        let first = fx.pipeline.submit(UserId(1), "first confession").await.unwrap();
        let second = fx.pipeline.submit(UserId(2), "second confession").await.unwrap();
        assert_eq!(first.number, 1);
        assert_eq!(second.number, 2);
        assert_eq!(first.status, ConfessionStatus::Pending);

        let author = fx.users.get(UserId(1)).await.unwrap().unwrap();
        assert_eq!(author.total_confessions, 1);

        // Cooldown recorded for the author.
        assert!(!fx
            .cooldowns
            .allowed(UserId(1), ACTION_CONFESSION, std::time::Duration::from_millis(60_000))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn submission_extracts_hashtags_and_sanitizes() {
        let fx = Fixture::new().await;
        let confession = fx
            .pipeline
            .submit(UserId(1), "I <b>love</b> #rust and #rust again #too")
            .await
            .unwrap();
        assert_eq!(confession.text, "I love #rust and #rust again #too");
        assert_eq!(confession.hashtags, vec!["#rust", "#rust", "#too"]);
    }

    #[tokio::test]
    async fn submission_fans_out_to_admins() {
        let fx = Fixture::new().await;
        fx.pipeline.submit(UserId(1), "please review me").await.unwrap();

        let requests = fx.messenger.keyboards_for(ADMIN.0).await;
        assert_eq!(requests.len(), 1);
        assert!(requests[0].0.contains("New Confession #1"));
    }

    #[tokio::test]
    async fn approve_publishes_and_credits_the_author() {
        let fx = Fixture::new().await;
        let submitted = fx.pipeline.submit(UserId(1), "worthy confession").await.unwrap();

        let outcome = fx.pipeline.approve(ADMIN, &submitted.id).await.unwrap();
        assert!(matches!(outcome, ModerationOutcome::Approved(_)));

        let stored = fx.pipeline.get(&submitted.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ConfessionStatus::Approved);
        assert!(stored.moderated_at.is_some());

        let author = fx.users.get(UserId(1)).await.unwrap().unwrap();
        assert_eq!(author.reputation, 10);

        let thread = fx.threads.get(&submitted.id).await.unwrap().unwrap();
        assert_eq!(thread.total_comments, 0);
        assert_eq!(thread.confession_number, stored.number);

        let posts = fx.messenger.channel_posts().await;
        assert_eq!(posts.len(), 1);
        assert!(posts[0].contains("worthy confession"));
        assert!(posts[0].contains("#1"));

        // The author hears about it.
        let delivered = fx.messenger.texts_for(1).await;
        assert!(delivered.iter().any(|t| t.contains("approved")));
    }

    #[tokio::test]
    async fn approve_requires_admin_and_an_existing_confession() {
        let fx = Fixture::new().await;
        let submitted = fx.pipeline.submit(UserId(1), "worthy confession").await.unwrap();

        let err = fx.pipeline.approve(UserId(5), &submitted.id).await.unwrap_err();
        assert!(matches!(err, Error::Permission(_)));

        let ghost = ConfessionId("confess_9_9".to_string());
        let err = fx.pipeline.approve(ADMIN, &ghost).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn retried_approval_does_not_double_apply() {
        let fx = Fixture::new().await;
        let submitted = fx.pipeline.submit(UserId(1), "worthy confession").await.unwrap();

        fx.pipeline.approve(ADMIN, &submitted.id).await.unwrap();
        let outcome = fx.pipeline.approve(ADMIN, &submitted.id).await.unwrap();
        assert!(matches!(
            outcome,
            ModerationOutcome::AlreadyModerated(ConfessionStatus::Approved)
        ));

        let author = fx.users.get(UserId(1)).await.unwrap().unwrap();
        assert_eq!(author.reputation, 10);
        assert_eq!(fx.messenger.channel_posts().await.len(), 1);
    }

    #[tokio::test]
    async fn reject_stores_the_reason_and_notifies_with_it() {
        let fx = Fixture::new().await;
        let submitted = fx.pipeline.submit(UserId(1), "questionable confession").await.unwrap();

        fx.messenger.clear().await;
        let outcome = fx.pipeline.reject(ADMIN, &submitted.id, "spam").await.unwrap();
        assert!(matches!(outcome, ModerationOutcome::Rejected(_)));

        let stored = fx.pipeline.get(&submitted.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ConfessionStatus::Rejected);
        assert_eq!(stored.rejection_reason.as_deref(), Some("spam"));

        let delivered = fx.messenger.texts_for(1).await;
        assert!(delivered.iter().any(|t| t.contains("spam")));

        // No channel post, no thread.
        assert!(fx.messenger.channel_posts().await.is_empty());
        assert!(fx.threads.get(&submitted.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn channel_post_escapes_html_in_text() {
        let fx = Fixture::new().await;
        let submitted = fx
            .pipeline
            .submit(UserId(1), "fish & chips > salad, obviously")
            .await
            .unwrap();
        fx.pipeline.approve(ADMIN, &submitted.id).await.unwrap();

        let posts = fx.messenger.channel_posts().await;
        assert!(posts[0].contains("fish &amp; chips &gt; salad"));
    }

    #[tokio::test]
    async fn channel_post_targets_the_channel_with_a_deep_link() {
        let fx = Fixture::new().await;
        let submitted = fx.pipeline.submit(UserId(1), "worthy confession").await.unwrap();
        fx.pipeline.approve(ADMIN, &submitted.id).await.unwrap();

        assert_eq!(fx.messenger.channel_targets().await, vec!["@confessions"]);

        let keyboards = fx.messenger.channel_keyboards().await;
        let button = &keyboards[0].rows[0][0];
        match &button.action {
            ButtonAction::Url(url) => {
                assert_eq!(
                    url,
                    &format!("https://t.me/confessor_bot?start=comment_{}", submitted.id)
                );
            }
            other => panic!("expected a url button, got {other:?}"),
        }
    }
}
