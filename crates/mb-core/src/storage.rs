//! # Storage Handle
//!
//! Owns the single process-wide connection to the document store. The handle
//! is constructed once at startup, initialized with a concrete backend, and
//! passed by reference to the engine.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{error, info, warn};

use crate::error::{AppError, Result};
use crate::models::{ThreadDocument, ThreadId, Versioned};
use crate::traits::ThreadStore;

/// Physical collection backing a board.
pub fn collection_name(board: &str) -> String {
    format!("{board}-threads")
}

#[derive(Default)]
pub struct StorageHandle {
    store: OnceCell<Arc<dyn ThreadStore>>,
}

impl StorageHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle that is already connected to `store`.
    pub fn with_store(store: Arc<dyn ThreadStore>) -> Self {
        Self {
            store: OnceCell::new_with(Some(store)),
        }
    }

    /// Establishes the connection by running `connect` exactly once.
    ///
    /// Calling this on an initialized handle does not reconnect; the active
    /// store is returned instead.
    pub async fn init<F, Fut>(&self, connect: F) -> Result<Arc<dyn ThreadStore>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<Arc<dyn ThreadStore>>>,
    {
        if let Some(store) = self.store.get() {
            warn!("storage connection already initialized; returning active connection");
            return Ok(store.clone());
        }

        let store = self
            .store
            .get_or_try_init(|| async move {
                let store = connect().await?;
                info!("connected to document store");
                Ok::<_, AppError>(store)
            })
            .await?;
        Ok(store.clone())
    }

    pub fn is_ready(&self) -> bool {
        self.store.initialized()
    }

    pub fn store(&self) -> Result<Arc<dyn ThreadStore>> {
        match self.store.get() {
            Some(store) => Ok(store.clone()),
            None => {
                error!("storage handle used before init");
                Err(AppError::ConnectionNotReady)
            }
        }
    }

    /// Resolves `board` to a handle addressing that board's thread collection.
    pub fn collection(&self, board: &str) -> Result<Collection> {
        Ok(Collection {
            name: collection_name(board),
            store: self.store()?,
        })
    }

    pub async fn close(&self) {
        if let Some(store) = self.store.get() {
            store.close().await;
            info!("document store connection closed");
        }
    }
}

/// A board-scoped view over the shared store.
#[derive(Clone)]
pub struct Collection {
    name: String,
    store: Arc<dyn ThreadStore>,
}

impl Collection {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn insert(&self, thread: ThreadDocument) -> Result<u64> {
        Ok(self.store.insert(&self.name, thread).await?)
    }

    pub async fn get(&self, id: ThreadId) -> Result<Option<Versioned<ThreadDocument>>> {
        Ok(self.store.get(&self.name, id).await?)
    }

    pub async fn list_by_bump(&self, limit: usize) -> Result<Vec<ThreadDocument>> {
        Ok(self.store.list_by_bump(&self.name, limit).await?)
    }

    pub async fn compare_and_swap(
        &self,
        id: ThreadId,
        expected_version: u64,
        replacement: Option<ThreadDocument>,
    ) -> Result<bool> {
        Ok(self
            .store
            .compare_and_swap(&self.name, id, expected_version, replacement)
            .await?)
    }

    pub async fn delete_all(&self) -> Result<u64> {
        Ok(self.store.delete_all(&self.name).await?)
    }
}
