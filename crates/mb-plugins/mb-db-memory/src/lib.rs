//! # mb-db-memory
//!
//! Process-local implementation of `ThreadStore`.
//! Each collection is one DashMap entry; every operation on a collection runs
//! under that entry's shard lock, which makes the version check and the write
//! of `compare_and_swap` indivisible.

use std::collections::HashMap;

use async_trait::async_trait;
use dashmap::DashMap;
use mb_core::models::{ThreadDocument, ThreadId, Versioned};
use mb_core::traits::ThreadStore;

type Documents = HashMap<ThreadId, Versioned<ThreadDocument>>;

#[derive(Default)]
pub struct MemoryThreadStore {
    collections: DashMap<String, Documents>,
}

impl MemoryThreadStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ThreadStore for MemoryThreadStore {
    async fn insert(&self, collection: &str, thread: ThreadDocument) -> anyhow::Result<u64> {
        let mut docs = self.collections.entry(collection.to_string()).or_default();
        if docs.contains_key(&thread.id) {
            anyhow::bail!("duplicate thread ID {} in {collection}", thread.id);
        }
        docs.insert(thread.id, Versioned { version: 0, document: thread });
        Ok(1)
    }

    async fn get(
        &self,
        collection: &str,
        id: ThreadId,
    ) -> anyhow::Result<Option<Versioned<ThreadDocument>>> {
        Ok(self
            .collections
            .get(collection)
            .and_then(|docs| docs.get(&id).cloned()))
    }

    async fn list_by_bump(
        &self,
        collection: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<ThreadDocument>> {
        let Some(docs) = self.collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut threads: Vec<&ThreadDocument> = docs.values().map(|v| &v.document).collect();
        threads.sort_by(|a, b| b.bumped_on.cmp(&a.bumped_on).then(b.id.cmp(&a.id)));
        Ok(threads.into_iter().take(limit).cloned().collect())
    }

    async fn compare_and_swap(
        &self,
        collection: &str,
        id: ThreadId,
        expected_version: u64,
        replacement: Option<ThreadDocument>,
    ) -> anyhow::Result<bool> {
        let Some(mut docs) = self.collections.get_mut(collection) else {
            return Ok(false);
        };

        let current = match docs.get(&id) {
            Some(current) if current.version == expected_version => current.version,
            _ => return Ok(false),
        };

        match replacement {
            Some(document) => {
                docs.insert(id, Versioned { version: current + 1, document });
            }
            None => {
                docs.remove(&id);
            }
        }
        Ok(true)
    }

    async fn delete_all(&self, collection: &str) -> anyhow::Result<u64> {
        let removed = self
            .collections
            .remove(collection)
            .map(|(_, docs)| docs.len() as u64)
            .unwrap_or(0);
        tracing::debug!(collection, removed, "collection dropped");
        Ok(removed)
    }
}
