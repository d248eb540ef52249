//! # mb-db-sqlite Implementation
//!
//! This module stores thread aggregates as JSON documents in SQLite.
//! One table holds every board; the `collection` column is the board's
//! collection name. `version` backs the compare-and-swap that makes each
//! aggregate update atomic, and `bumped_on` is mirrored out of the document
//! so listings can be ordered and limited in SQL.

use std::str::FromStr;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use mb_core::models::{ThreadDocument, ThreadId, Versioned};
use mb_core::traits::ThreadStore;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use uuid::Uuid;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS thread_documents (
        collection TEXT    NOT NULL,
        id         BLOB    NOT NULL,
        bumped_on  TEXT    NOT NULL,
        version    INTEGER NOT NULL,
        document   TEXT    NOT NULL,
        PRIMARY KEY (collection, id)
    )",
    "CREATE INDEX IF NOT EXISTS thread_documents_by_bump
        ON thread_documents (collection, bumped_on DESC)",
];

pub struct SqliteThreadStore {
    pool: SqlitePool,
}

// Helper for UUID conversion
fn uuid_to_blob(id: Uuid) -> Vec<u8> {
    id.as_bytes().to_vec()
}

/// Fixed-width RFC 3339 so that text order is time order.
fn sortable_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

impl SqliteThreadStore {
    /// Opens (creating if needed) the database at `url` and ensures the schema exists.
    ///
    /// # Developer Note
    /// An in-memory database lives and dies with its connection, so memory
    /// URLs are pinned to a single connection that is never recycled.
    pub async fn connect(url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("invalid sqlite url {url:?}"))?
            .create_if_missing(true);

        let pool_options = if url.contains(":memory:") || url.contains("mode=memory") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections.max(1))
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .context("failed to open sqlite database")?;

        for statement in SCHEMA {
            sqlx::query(*statement).execute(&pool).await?;
        }
        tracing::info!("sqlite thread store ready");

        Ok(Self { pool })
    }

    fn decode(document: &str) -> anyhow::Result<ThreadDocument> {
        serde_json::from_str(document).context("corrupt thread document")
    }
}

#[async_trait]
impl ThreadStore for SqliteThreadStore {
    async fn insert(&self, collection: &str, thread: ThreadDocument) -> anyhow::Result<u64> {
        let result = sqlx::query(
            "INSERT INTO thread_documents (collection, id, bumped_on, version, document) VALUES (?, ?, ?, 0, ?)",
        )
        .bind(collection)
        .bind(uuid_to_blob(thread.id.0))
        .bind(sortable_timestamp(thread.bumped_on))
        .bind(serde_json::to_string(&thread)?)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn get(
        &self,
        collection: &str,
        id: ThreadId,
    ) -> anyhow::Result<Option<Versioned<ThreadDocument>>> {
        let row = sqlx::query(
            "SELECT version, document FROM thread_documents WHERE collection = ? AND id = ?",
        )
        .bind(collection)
        .bind(uuid_to_blob(id.0))
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let version: i64 = row.try_get("version")?;
        let document: String = row.try_get("document")?;
        Ok(Some(Versioned {
            version: u64::try_from(version)?,
            document: Self::decode(&document)?,
        }))
    }

    async fn list_by_bump(
        &self,
        collection: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<ThreadDocument>> {
        let rows = sqlx::query(
            "SELECT document FROM thread_documents WHERE collection = ? ORDER BY bumped_on DESC, id DESC LIMIT ?",
        )
        .bind(collection)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| Self::decode(&row.try_get::<String, _>("document")?))
            .collect()
    }

    /// Single-statement write guarded by the version column.
    async fn compare_and_swap(
        &self,
        collection: &str,
        id: ThreadId,
        expected_version: u64,
        replacement: Option<ThreadDocument>,
    ) -> anyhow::Result<bool> {
        let expected = i64::try_from(expected_version)?;

        let result = match replacement {
            Some(thread) => {
                sqlx::query(
                    "UPDATE thread_documents SET document = ?, bumped_on = ?, version = version + 1 \
                     WHERE collection = ? AND id = ? AND version = ?",
                )
                .bind(serde_json::to_string(&thread)?)
                .bind(sortable_timestamp(thread.bumped_on))
                .bind(collection)
                .bind(uuid_to_blob(id.0))
                .bind(expected)
                .execute(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "DELETE FROM thread_documents WHERE collection = ? AND id = ? AND version = ?",
                )
                .bind(collection)
                .bind(uuid_to_blob(id.0))
                .bind(expected)
                .execute(&self.pool)
                .await?
            }
        };

        Ok(result.rows_affected() == 1)
    }

    async fn delete_all(&self, collection: &str) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM thread_documents WHERE collection = ?")
            .bind(collection)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mb_core::models::ReplyDocument;

    async fn memory_store() -> SqliteThreadStore {
        SqliteThreadStore::connect("sqlite::memory:", 1).await.unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_get_thread() {
        let store = memory_store().await;
        let now = Utc::now();

        let mut thread = ThreadDocument::new("OP".into(), "hash".into(), now);
        thread.push_reply(ReplyDocument::new("re".into(), "hash".into(), now));
        let id = thread.id;

        assert_eq!(store.insert("test-threads", thread.clone()).await.unwrap(), 1);

        let stored = store.get("test-threads", id).await.unwrap().expect("thread stored");
        assert_eq!(stored.version, 0);
        assert_eq!(stored.document, thread);
        assert_eq!(stored.document.replies.len(), 1);

        assert!(store.get("other-threads", id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_orders_by_bump() {
        let store = memory_store().await;
        let base = Utc::now();

        for (text, offset) in [("old", -30), ("newest", 30), ("middle", 0)] {
            let at = base + chrono::Duration::seconds(offset);
            store
                .insert("b-threads", ThreadDocument::new(text.into(), "hash".into(), at))
                .await
                .unwrap();
        }

        let listed = store.list_by_bump("b-threads", 10).await.unwrap();
        let texts: Vec<_> = listed.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, ["newest", "middle", "old"]);

        assert_eq!(store.list_by_bump("b-threads", 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_compare_and_swap_bumps_version_and_reorders() {
        let store = memory_store().await;
        let base = Utc::now();

        let older = ThreadDocument::new("older".into(), "hash".into(), base);
        let newer = ThreadDocument::new("newer".into(), "hash".into(), base + chrono::Duration::seconds(1));
        store.insert("b-threads", older.clone()).await.unwrap();
        store.insert("b-threads", newer).await.unwrap();

        let mut bumped = older.clone();
        bumped.push_reply(ReplyDocument::new("re".into(), "hash".into(), base + chrono::Duration::seconds(5)));

        assert!(store.compare_and_swap("b-threads", older.id, 0, Some(bumped.clone())).await.unwrap());
        assert!(!store.compare_and_swap("b-threads", older.id, 0, Some(bumped)).await.unwrap());

        let listed = store.list_by_bump("b-threads", 10).await.unwrap();
        assert_eq!(listed[0].id, older.id);
        assert_eq!(store.get("b-threads", older.id).await.unwrap().unwrap().version, 1);

        assert!(store.compare_and_swap("b-threads", older.id, 1, None).await.unwrap());
        assert!(store.get("b-threads", older.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_all_is_scoped_to_collection() {
        let store = memory_store().await;
        let now = Utc::now();
        store.insert("a-threads", ThreadDocument::new("a".into(), "h".into(), now)).await.unwrap();
        store.insert("a-threads", ThreadDocument::new("b".into(), "h".into(), now)).await.unwrap();
        store.insert("z-threads", ThreadDocument::new("z".into(), "h".into(), now)).await.unwrap();

        assert_eq!(store.delete_all("a-threads").await.unwrap(), 2);
        assert_eq!(store.list_by_bump("z-threads", 10).await.unwrap().len(), 1);
    }
}
