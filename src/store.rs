//! # Document Store Contract
//!
//! The aggregation engine treats persistence abstractly: a transactional
//! document store offering point reads, versioned writes for optimistic
//! concurrency, atomic multi-document batch commits, and prefix scans.
//!
//! [`MemoryStore`] is the in-process implementation used by tests and the
//! demo binary; a production backend implements the same trait over a
//! document database.

use crate::errors::{AppError, AppResult};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;

/// Personal ledger collection, keyed `{user_id}_{canonical_key}`.
pub const PERSONAL_COLLECTION: &str = "personal_products";
/// Community ledger collection, keyed `{city}_{canonical_key}`.
pub const COMMUNITY_COLLECTION: &str = "community_products";
/// Per-receipt key index, keyed `{user_id}_{receipt_id}`.
pub const RECEIPT_INDEX_COLLECTION: &str = "receipt_index";

/// Optimistic-concurrency token for a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    /// The document did not exist at read time; a write with this token
    /// asserts creation.
    Missing,
    /// The document existed at this version; a write with this token fails
    /// if the version has moved.
    At(u64),
}

/// One write in an atomic batch.
#[derive(Debug, Clone)]
pub enum WriteOp {
    Put {
        collection: String,
        id: String,
        value: Value,
    },
    Delete {
        collection: String,
        id: String,
    },
}

impl WriteOp {
    pub fn put(collection: &str, id: &str, value: Value) -> Self {
        WriteOp::Put {
            collection: collection.to_string(),
            id: id.to_string(),
            value,
        }
    }

    pub fn delete(collection: &str, id: &str) -> Self {
        WriteOp::Delete {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }
}

/// Transactional document store contract required by the aggregation engine.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Point read.
    async fn get(&self, collection: &str, id: &str) -> AppResult<Option<Value>>;

    /// Point read returning the version for a later conditional write.
    async fn get_versioned(&self, collection: &str, id: &str)
        -> AppResult<(Option<Value>, Version)>;

    /// Conditional write; fails with [`AppError::Conflict`] when the document
    /// version moved since the paired read.
    async fn put_versioned(
        &self,
        collection: &str,
        id: &str,
        value: Value,
        expected: Version,
    ) -> AppResult<()>;

    /// Conditional delete with the same conflict semantics.
    async fn delete_versioned(&self, collection: &str, id: &str, expected: Version)
        -> AppResult<()>;

    /// Atomic multi-document batch; either every op applies or none does.
    async fn commit_batch(&self, ops: Vec<WriteOp>) -> AppResult<()>;

    /// All documents of a collection whose id starts with `prefix`, in
    /// ascending id order.
    async fn list_prefix(&self, collection: &str, prefix: &str)
        -> AppResult<Vec<(String, Value)>>;
}

type Collection = HashMap<String, (u64, Value)>;

/// In-memory document store with per-document versions.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents currently held in a collection (test helper).
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map(|c| c.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> AppResult<Option<Value>> {
        let collections = self.collections.read();
        Ok(collections
            .get(collection)
            .and_then(|c| c.get(id))
            .map(|(_, value)| value.clone()))
    }

    async fn get_versioned(
        &self,
        collection: &str,
        id: &str,
    ) -> AppResult<(Option<Value>, Version)> {
        let collections = self.collections.read();
        match collections.get(collection).and_then(|c| c.get(id)) {
            Some((version, value)) => Ok((Some(value.clone()), Version::At(*version))),
            None => Ok((None, Version::Missing)),
        }
    }

    async fn put_versioned(
        &self,
        collection: &str,
        id: &str,
        value: Value,
        expected: Version,
    ) -> AppResult<()> {
        let mut collections = self.collections.write();
        let coll = collections.entry(collection.to_string()).or_default();
        let current = coll.get(id).map(|(version, _)| *version);

        match (expected, current) {
            (Version::Missing, None) => {
                coll.insert(id.to_string(), (1, value));
                Ok(())
            }
            (Version::At(expected_version), Some(current_version))
                if expected_version == current_version =>
            {
                coll.insert(id.to_string(), (current_version + 1, value));
                Ok(())
            }
            _ => Err(AppError::Conflict(format!(
                "{}/{}: expected {:?}, found {:?}",
                collection, id, expected, current
            ))),
        }
    }

    async fn delete_versioned(
        &self,
        collection: &str,
        id: &str,
        expected: Version,
    ) -> AppResult<()> {
        let mut collections = self.collections.write();
        let coll = collections.entry(collection.to_string()).or_default();
        let current = coll.get(id).map(|(version, _)| *version);

        match (expected, current) {
            (Version::At(expected_version), Some(current_version))
                if expected_version == current_version =>
            {
                coll.remove(id);
                Ok(())
            }
            (Version::Missing, None) => Ok(()),
            _ => Err(AppError::Conflict(format!(
                "{}/{}: expected {:?}, found {:?}",
                collection, id, expected, current
            ))),
        }
    }

    async fn commit_batch(&self, ops: Vec<WriteOp>) -> AppResult<()> {
        // Single write-lock scope makes the whole batch atomic.
        let mut collections = self.collections.write();
        for op in ops {
            match op {
                WriteOp::Put {
                    collection,
                    id,
                    value,
                } => {
                    let coll = collections.entry(collection).or_default();
                    let next_version = coll.get(&id).map(|(v, _)| v + 1).unwrap_or(1);
                    coll.insert(id, (next_version, value));
                }
                WriteOp::Delete { collection, id } => {
                    if let Some(coll) = collections.get_mut(&collection) {
                        coll.remove(&id);
                    }
                }
            }
        }
        Ok(())
    }

    async fn list_prefix(
        &self,
        collection: &str,
        prefix: &str,
    ) -> AppResult<Vec<(String, Value)>> {
        let collections = self.collections.read();
        let mut out: Vec<(String, Value)> = collections
            .get(collection)
            .map(|c| {
                c.iter()
                    .filter(|(id, _)| id.starts_with(prefix))
                    .map(|(id, (_, value))| (id.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default();
        out.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(out)
    }
}
