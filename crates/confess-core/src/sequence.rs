use std::sync::Arc;

use serde_json::{json, Value};

use crate::{
    errors::Error,
    store::{collections, DocumentStore},
    Result,
};

/// Counter used for confession numbering.
pub const SEQ_CONFESSION_NUMBER: &str = "confessionNumber";

/// Strictly increasing named counters.
///
/// The read-increment-write runs inside the store's transaction primitive, so
/// concurrent callers sharing a name can never observe or produce the same
/// value.
#[derive(Clone)]
pub struct SequenceGenerator {
    store: Arc<dyn DocumentStore>,
}

impl SequenceGenerator {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Next value for `name`: 1 on first use, previous + 1 afterwards.
    pub async fn next(&self, name: &str) -> Result<i64> {
        let doc = self
            .store
            .transaction(
                collections::COUNTERS,
                name,
                Box::new(|prev| {
                    let next = prev
                        .as_ref()
                        .and_then(|doc| doc.get("value"))
                        .and_then(Value::as_i64)
                        .unwrap_or(0)
                        + 1;
                    json!({ "value": next })
                }),
            )
            .await?;

        doc.get("value")
            .and_then(Value::as_i64)
            .ok_or_else(|| Error::Store(format!("counter {name} has no value")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::collections::BTreeSet;

    #[tokio::test]
    async fn seeds_at_one_and_counts_up() {
        let seq = SequenceGenerator::new(Arc::new(MemoryStore::new()));
        assert_eq!(seq.next("confessionNumber").await.unwrap(), 1);
        assert_eq!(seq.next("confessionNumber").await.unwrap(), 2);
        assert_eq!(seq.next("confessionNumber").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn names_are_independent() {
        let seq = SequenceGenerator::new(Arc::new(MemoryStore::new()));
        assert_eq!(seq.next("a").await.unwrap(), 1);
        assert_eq!(seq.next("b").await.unwrap(), 1);
        assert_eq!(seq.next("a").await.unwrap(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_get_consecutive_values() {
        let seq = SequenceGenerator::new(Arc::new(MemoryStore::new()));

        let mut tasks = Vec::new();
        for _ in 0..50 {
            let seq = seq.clone();
            tasks.push(tokio::spawn(async move {
                seq.next("confessionNumber").await.unwrap()
            }));
        }

        let mut seen = BTreeSet::new();
        for task in tasks {
            assert!(seen.insert(task.await.unwrap()), "duplicate value");
        }

        // No duplicates and no gaps: exactly 1..=50.
        assert_eq!(seen.first(), Some(&1));
        assert_eq!(seen.last(), Some(&50));
        assert_eq!(seen.len(), 50);
    }
}
