//! Document store port and the in-memory implementation.
//!
//! The workflow only relies on per-collection get/set/update/delete, one
//! read-then-write transaction primitive, and an exact-match single-field
//! lookup. Everything else (queries, scans, ordering) is deliberately outside
//! the port.

use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::PathBuf,
};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::{errors::Error, Result};

/// Collection names, shared between repositories.
pub mod collections {
    pub const USERS: &str = "users";
    pub const CONFESSIONS: &str = "confessions";
    pub const COMMENTS: &str = "comments";
    pub const COUNTERS: &str = "counters";
    pub const COOLDOWNS: &str = "cooldowns";
    pub const STATES: &str = "states";
}

/// Read-then-write step executed under the store's atomicity guarantee.
pub type TxnFn = Box<dyn FnOnce(Option<Value>) -> Value + Send>;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>>;

    async fn set(&self, collection: &str, id: &str, doc: Value) -> Result<()>;

    /// Shallow-merges `patch` into the stored document, creating it when
    /// missing. Non-object documents are replaced.
    async fn update(&self, collection: &str, id: &str, patch: Value) -> Result<()>;

    async fn delete(&self, collection: &str, id: &str) -> Result<()>;

    /// Applies `apply` to the current document and stores the result, as a
    /// single transaction: no two concurrent callers may observe the same
    /// input. Returns the stored value.
    async fn transaction(&self, collection: &str, id: &str, apply: TxnFn) -> Result<Value>;

    /// Exact-match single-field lookup. Only used for display-name
    /// uniqueness checks.
    async fn find_eq(
        &self,
        collection: &str,
        field: &str,
        value: &str,
        limit: usize,
    ) -> Result<Vec<Value>>;
}

// ============== Typed helpers ==============

pub async fn get_doc<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: &str,
    id: &str,
) -> Result<Option<T>> {
    match store.get(collection, id).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

pub async fn put_doc<T: Serialize>(
    store: &dyn DocumentStore,
    collection: &str,
    id: &str,
    doc: &T,
) -> Result<()> {
    store.set(collection, id, serde_json::to_value(doc)?).await
}

// ============== In-memory implementation ==============

type Documents = HashMap<String, BTreeMap<String, Value>>;

/// Single-process store: one async mutex over the whole document map.
///
/// `transaction` holds the lock across the read-modify-write, which is the
/// atomicity guarantee the sequence generator depends on. Optionally
/// snapshots every mutation to a JSON file (best-effort, temp file + rename).
pub struct MemoryStore {
    inner: Mutex<Documents>,
    snapshot_path: Option<PathBuf>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            snapshot_path: None,
        }
    }

    /// Opens a store backed by a JSON snapshot file, loading it if present.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let documents = match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str::<Documents>(&contents)
                .map_err(|e| Error::Store(format!("corrupt snapshot {}: {e}", path.display())))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            inner: Mutex::new(documents),
            snapshot_path: Some(path),
        })
    }

    fn persist(&self, documents: &Documents) {
        let Some(path) = &self.snapshot_path else {
            return;
        };

        let result = serde_json::to_string(documents)
            .map_err(Error::Json)
            .and_then(|json| {
                let tmp = path.with_extension("tmp");
                fs::write(&tmp, json)?;
                fs::rename(&tmp, path)?;
                Ok(())
            });

        if let Err(e) = result {
            tracing::warn!(path = %path.display(), error = %e, "store snapshot failed");
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn merge_into(doc: &mut Value, patch: Value) {
    match (doc, patch) {
        (Value::Object(existing), Value::Object(incoming)) => {
            for (k, v) in incoming {
                existing.insert(k, v);
            }
        }
        (doc, patch) => *doc = patch,
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        let documents = self.inner.lock().await;
        Ok(documents
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn set(&self, collection: &str, id: &str, doc: Value) -> Result<()> {
        let mut documents = self.inner.lock().await;
        documents
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), doc);
        self.persist(&documents);
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, patch: Value) -> Result<()> {
        let mut documents = self.inner.lock().await;
        let docs = documents.entry(collection.to_string()).or_default();
        match docs.get_mut(id) {
            Some(doc) => merge_into(doc, patch),
            None => {
                docs.insert(id.to_string(), patch);
            }
        }
        self.persist(&documents);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let mut documents = self.inner.lock().await;
        if let Some(docs) = documents.get_mut(collection) {
            docs.remove(id);
        }
        self.persist(&documents);
        Ok(())
    }

    async fn transaction(&self, collection: &str, id: &str, apply: TxnFn) -> Result<Value> {
        let mut documents = self.inner.lock().await;
        let docs = documents.entry(collection.to_string()).or_default();
        let current = docs.get(id).cloned();
        let next = apply(current);
        docs.insert(id.to_string(), next.clone());
        self.persist(&documents);
        Ok(next)
    }

    async fn find_eq(
        &self,
        collection: &str,
        field: &str,
        value: &str,
        limit: usize,
    ) -> Result<Vec<Value>> {
        let documents = self.inner.lock().await;
        let Some(docs) = documents.get(collection) else {
            return Ok(Vec::new());
        };

        Ok(docs
            .values()
            .filter(|doc| doc.get(field).and_then(Value::as_str) == Some(value))
            .take(limit)
            .cloned()
            .collect())
    }
}
