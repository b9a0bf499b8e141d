use std::sync::Arc;

use crate::{
    domain::{ChatId, UserId},
    messaging::port::MessengerPort,
    users::UserDirectory,
};

/// Notification category, mapped to the per-user toggle it honors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotifyKind {
    NewComment,
    ConfessionUpdate,
}

/// Best-effort lifecycle notifications.
///
/// Delivery failures (blocked bot, deleted chat) are logged and never
/// propagated; a notification must not fail the operation that triggered it.
pub struct Notifier {
    users: Arc<UserDirectory>,
    messenger: Arc<dyn MessengerPort>,
}

impl Notifier {
    pub fn new(users: Arc<UserDirectory>, messenger: Arc<dyn MessengerPort>) -> Self {
        Self { users, messenger }
    }

    pub async fn notify(&self, user: UserId, text: &str, kind: NotifyKind) {
        let enabled = match self.users.get_or_create(user).await {
            Ok(profile) => match kind {
                NotifyKind::NewComment => profile.notifications.new_comment,
                NotifyKind::ConfessionUpdate => profile.notifications.confession_update,
            },
            Err(e) => {
                tracing::warn!(user_id = user.0, error = %e, "notification settings lookup failed");
                return;
            }
        };

        if !enabled {
            tracing::debug!(user_id = user.0, ?kind, "notification suppressed by settings");
            return;
        }

        if let Err(e) = self.messenger.send_text(ChatId(user.0), text).await {
            tracing::warn!(user_id = user.0, error = %e, "notification delivery failed");
        }
    }

    pub async fn confession_approved(&self, author: UserId, number: i64) {
        let text = format!("✅ Your confession #{number} has been approved and posted!");
        self.notify(author, &text, NotifyKind::ConfessionUpdate).await;
    }

    pub async fn confession_rejected(&self, author: UserId, number: i64, reason: &str) {
        let text = if reason.trim().is_empty() {
            format!("❌ Your confession #{number} was rejected.")
        } else {
            format!("❌ Your confession #{number} was rejected. Reason: {reason}")
        };
        self.notify(author, &text, NotifyKind::ConfessionUpdate).await;
    }

    pub async fn new_comment(&self, author: UserId, number: i64, preview: &str) {
        let text =
            format!("💬 New comment on your confession #{number}:\n\n\"{preview}\"");
        self.notify(author, &text, NotifyKind::NewComment).await;
    }
}
