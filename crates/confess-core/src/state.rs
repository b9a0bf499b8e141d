use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    domain::{ConfessionId, UserId},
    store::{collections, get_doc, put_doc, DocumentStore},
    Result,
};

/// Pending free-text expectation for a user.
///
/// At most one per user. The next text message consumes it via
/// [`StateStore::take`] no matter what the message contains; the only retry
/// loop (username validation) re-arms explicitly. Concurrent writes for the
/// same user are last-write-wins.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConversationState {
    AwaitingUsername,
    AwaitingConfession,
    AwaitingComment { confession: ConfessionId },
    AwaitingRejectionReason { confession: ConfessionId },
}

#[derive(Clone)]
pub struct StateStore {
    store: Arc<dyn DocumentStore>,
}

impl StateStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn set(&self, user: UserId, state: ConversationState) -> Result<()> {
        put_doc(
            self.store.as_ref(),
            collections::STATES,
            &user.0.to_string(),
            &state,
        )
        .await
    }

    /// Reads without consuming.
    pub async fn peek(&self, user: UserId) -> Result<Option<ConversationState>> {
        get_doc(self.store.as_ref(), collections::STATES, &user.0.to_string()).await
    }

    /// Removes and returns the pending state. Consumption is unconditional:
    /// the caller gets exactly one shot at handling the message.
    pub async fn take(&self, user: UserId) -> Result<Option<ConversationState>> {
        let state = self.peek(user).await?;
        if state.is_some() {
            self.clear(user).await?;
        }
        Ok(state)
    }

    pub async fn clear(&self, user: UserId) -> Result<()> {
        self.store
            .delete(collections::STATES, &user.0.to_string())
            .await
    }
}
