use std::{sync::Arc, time::Duration};

use chrono::Utc;
use serde_json::Value;

use crate::{
    domain::UserId,
    store::{collections, DocumentStore},
    Result,
};

/// Action kind for confession submission.
pub const ACTION_CONFESSION: &str = "confession";

/// Per-user, per-action-kind minimum interval enforcement.
///
/// A record is written after an action is allowed, not before; denial is a
/// normal user-visible outcome for the caller to frame, not an error.
#[derive(Clone)]
pub struct Cooldowns {
    store: Arc<dyn DocumentStore>,
}

impl Cooldowns {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn allowed(&self, user: UserId, kind: &str, window: Duration) -> Result<bool> {
        self.allowed_at(user, kind, window, now_millis()).await
    }

    pub async fn allowed_at(
        &self,
        user: UserId,
        kind: &str,
        window: Duration,
        now_ms: i64,
    ) -> Result<bool> {
        Ok(match self.last_action_ms(user, kind).await? {
            None => true,
            Some(last) => now_ms - last > window.as_millis() as i64,
        })
    }

    /// Time left until the action is allowed again; `None` when allowed now.
    pub async fn remaining(&self, user: UserId, kind: &str, window: Duration) -> Result<Option<Duration>> {
        self.remaining_at(user, kind, window, now_millis()).await
    }

    pub async fn remaining_at(
        &self,
        user: UserId,
        kind: &str,
        window: Duration,
        now_ms: i64,
    ) -> Result<Option<Duration>> {
        let Some(last) = self.last_action_ms(user, kind).await? else {
            return Ok(None);
        };

        let elapsed = now_ms - last;
        let window_ms = window.as_millis() as i64;
        if elapsed > window_ms {
            return Ok(None);
        }
        Ok(Some(Duration::from_millis((window_ms - elapsed).max(0) as u64)))
    }

    pub async fn record(&self, user: UserId, kind: &str) -> Result<()> {
        self.record_at(user, kind, now_millis()).await
    }

    pub async fn record_at(&self, user: UserId, kind: &str, now_ms: i64) -> Result<()> {
        let mut patch = serde_json::Map::new();
        patch.insert(kind.to_string(), Value::from(now_ms));
        self.store
            .update(
                collections::COOLDOWNS,
                &user.0.to_string(),
                Value::Object(patch),
            )
            .await
    }

    async fn last_action_ms(&self, user: UserId, kind: &str) -> Result<Option<i64>> {
        Ok(self
            .store
            .get(collections::COOLDOWNS, &user.0.to_string())
            .await?
            .as_ref()
            .and_then(|doc| doc.get(kind))
            .and_then(Value::as_i64))
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
