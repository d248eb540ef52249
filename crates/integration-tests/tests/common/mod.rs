//! Shared fixtures: an engine over each storage backend, wired the way the
//! binary wires it, with Argon2 costs turned down for test speed.

#![allow(dead_code)]

use std::sync::Arc;

use mb_auth_simple::Argon2SecretHasher;
use mb_core::engine::ThreadEngine;
use mb_core::storage::StorageHandle;
use mb_core::traits::{SecretHasher, ThreadStore};
use mb_db_memory::MemoryThreadStore;
use mb_db_sqlite::SqliteThreadStore;

pub const BOARD: &str = "test";

pub fn hasher() -> Arc<Argon2SecretHasher> {
    Arc::new(Argon2SecretHasher::new(8, 1, 1).expect("valid argon2 parameters"))
}

pub async fn engine_over(store: Arc<dyn ThreadStore>) -> ThreadEngine {
    let storage = Arc::new(StorageHandle::new());
    storage
        .init(|| async move { Ok(store) })
        .await
        .expect("storage init");
    let hasher: Arc<dyn SecretHasher> = hasher();
    ThreadEngine::new(storage, hasher)
}

pub async fn memory_engine() -> ThreadEngine {
    engine_over(Arc::new(MemoryThreadStore::new())).await
}

pub async fn sqlite_engine() -> ThreadEngine {
    let store = SqliteThreadStore::connect("sqlite::memory:", 1)
        .await
        .expect("in-memory sqlite");
    engine_over(Arc::new(store)).await
}

/// One engine per backend, labelled for assertion messages.
pub async fn engines() -> Vec<(&'static str, ThreadEngine)> {
    vec![
        ("memory", memory_engine().await),
        ("sqlite", sqlite_engine().await),
    ]
}
