//! # Core Traits (Ports)
//!
//! Any plugin must implement these traits to be used by the binary.

use async_trait::async_trait;

use crate::models::{ThreadDocument, ThreadId, Versioned};

/// Document persistence contract for thread aggregates.
///
/// Every method addresses one named collection. Writes to an existing
/// document go through [`ThreadStore::compare_and_swap`], which must apply
/// atomically and only when the stored version still equals `expected_version`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ThreadStore: Send + Sync {
    /// Inserts a new aggregate at version 0. Returns the number of documents written.
    async fn insert(&self, collection: &str, thread: ThreadDocument) -> anyhow::Result<u64>;

    async fn get(
        &self,
        collection: &str,
        id: ThreadId,
    ) -> anyhow::Result<Option<Versioned<ThreadDocument>>>;

    /// The `limit` most recently bumped threads, `bumped_on` descending.
    async fn list_by_bump(&self, collection: &str, limit: usize)
        -> anyhow::Result<Vec<ThreadDocument>>;

    /// Replaces (`Some`) or removes (`None`) the document if its version is
    /// still `expected_version`. Returns false when another writer got there first
    /// or the document is gone.
    async fn compare_and_swap(
        &self,
        collection: &str,
        id: ThreadId,
        expected_version: u64,
        replacement: Option<ThreadDocument>,
    ) -> anyhow::Result<bool>;

    /// Removes every document in the collection. Returns how many were removed.
    async fn delete_all(&self, collection: &str) -> anyhow::Result<u64>;

    /// Releases the underlying connection.
    async fn close(&self) {}
}

/// Delete-password hashing contract.
pub trait SecretHasher: Send + Sync {
    /// Produces a self-describing (salted) hash of `secret`.
    fn hash_secret(&self, secret: &str) -> anyhow::Result<String>;

    /// Verifies `secret` against a hash previously produced by `hash_secret`.
    fn verify_secret(&self, secret: &str, hash: &str) -> bool;
}
