//! # Thread/Reply Engine
//!
//! Board-scoped operations over thread aggregates. Every mutation is one
//! atomic aggregate update: read the document with its version, apply the
//! change in memory, and write it back with a compare-and-swap. A lost race
//! re-applies the change to the fresh document.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, instrument, warn};

use crate::error::{AppError, Result};
use crate::models::{Outcome, ReplyDocument, ReplyId, ThreadDocument, ThreadId};
use crate::storage::{Collection, StorageHandle};
use crate::traits::SecretHasher;
use crate::views::ThreadView;

/// Replies shown under each thread in a board listing.
pub const PREVIEW_REPLIES: usize = 3;

/// Threads shown on a board page unless the caller asks otherwise.
pub const DEFAULT_PAGE_SIZE: usize = 10;

const MAX_SWAP_ATTEMPTS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListOptions {
    pub limit: usize,
    /// Strip `reported` and `delete_password` from every thread and reply.
    pub filtered: bool,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_SIZE,
            filtered: true,
        }
    }
}

/// What a mutation decided to do with the aggregate it was shown.
enum Change {
    Keep,
    Replace,
    Remove,
}

/// A mutation needs the verdict for this stored hash before it can decide.
struct Unverified(String);

/// Delete-password verdicts for one operation, keyed by the stored hash
/// they were computed against.
#[derive(Default)]
struct Verdicts {
    secret: Option<String>,
    known: HashMap<String, bool>,
}

impl Verdicts {
    fn for_secret(secret: &str) -> Self {
        Self {
            secret: Some(secret.to_owned()),
            known: HashMap::new(),
        }
    }

    fn check(&self, hash: &str) -> std::result::Result<bool, Unverified> {
        self.known
            .get(hash)
            .copied()
            .ok_or_else(|| Unverified(hash.to_owned()))
    }

    async fn settle(&mut self, hasher: &Arc<dyn SecretHasher>, hash: String) -> Result<()> {
        let matches = match &self.secret {
            Some(secret) => verify_blocking(hasher.clone(), secret.clone(), hash.clone()).await?,
            None => false,
        };
        self.known.insert(hash, matches);
        Ok(())
    }
}

type Mutation = std::result::Result<Change, Unverified>;

pub struct ThreadEngine {
    storage: Arc<StorageHandle>,
    hasher: Arc<dyn SecretHasher>,
}

impl ThreadEngine {
    pub fn new(storage: Arc<StorageHandle>, hasher: Arc<dyn SecretHasher>) -> Self {
        Self { storage, hasher }
    }

    pub fn storage(&self) -> &Arc<StorageHandle> {
        &self.storage
    }

    #[instrument(skip(self))]
    pub async fn list_threads(&self, board: &str, options: ListOptions) -> Result<Vec<ThreadView>> {
        if options.limit == 0 {
            return Err(AppError::ValidationError("limit must be at least 1".into()));
        }
        let collection = self.collection(board)?;

        let mut threads = collection.list_by_bump(options.limit).await?;
        threads.sort_by(|a, b| b.bumped_on.cmp(&a.bumped_on));
        threads.truncate(options.limit);

        Ok(threads
            .iter()
            .map(|thread| {
                // Walk newest-inserted first so equal timestamps keep recency order.
                let mut recent: Vec<&ReplyDocument> = thread.replies.iter().rev().collect();
                recent.sort_by(|a, b| b.created_on.cmp(&a.created_on));
                recent.truncate(PREVIEW_REPLIES);

                ThreadView::project(thread, recent, options.filtered)
                    .with_replycount(thread.replies.len())
            })
            .collect())
    }

    /// Posts a new thread. Returns its ID once the insert is confirmed.
    #[instrument(skip(self, text, delete_password))]
    pub async fn create_thread(
        &self,
        board: &str,
        text: &str,
        delete_password: &str,
    ) -> Result<ThreadId> {
        let (text, delete_password) = validate_post(text, delete_password)?;
        let collection = self.collection(board)?;

        let hash = hash_blocking(self.hasher.clone(), delete_password.to_owned()).await?;
        let thread = ThreadDocument::new(text.to_string(), hash, Utc::now());
        let id = thread.id;

        let inserted = collection.insert(thread).await?;
        if inserted == 0 {
            return Err(AppError::Storage(anyhow::anyhow!(
                "insert into {} reported no documents written",
                collection.name()
            )));
        }

        debug!(%id, "thread created");
        Ok(id)
    }

    #[instrument(skip(self))]
    pub async fn report_thread(&self, board: &str, thread_id: &str) -> Result<Outcome> {
        let id: ThreadId = thread_id.parse()?;
        let collection = self.collection(board)?;

        let settled = self
            .update_aggregate(&collection, id, Verdicts::default(), |thread, _| {
                thread.reported = true;
                Ok(Change::Replace)
            })
            .await?;

        Ok(match settled {
            Some(_) => Outcome::Applied,
            None => Outcome::NotFound,
        })
    }

    /// Removes the thread only if `delete_password` matches, in the same
    /// atomic step that finds it.
    #[instrument(skip(self, delete_password))]
    pub async fn delete_thread(
        &self,
        board: &str,
        thread_id: &str,
        delete_password: &str,
    ) -> Result<Outcome> {
        let id: ThreadId = thread_id.parse()?;
        let collection = self.collection(board)?;
        let verdicts = Verdicts::for_secret(delete_password);

        let settled = self
            .update_aggregate(&collection, id, verdicts, |thread, verdicts| {
                Ok(if verdicts.check(&thread.delete_password)? {
                    Change::Remove
                } else {
                    Change::Keep
                })
            })
            .await?;

        let outcome = match settled {
            Some((Change::Remove, _)) => Outcome::Applied,
            Some(_) => Outcome::Denied,
            None => Outcome::NotFound,
        };
        debug!(?outcome, "delete thread settled");
        Ok(outcome)
    }

    /// One thread with every reply, oldest first. Always filtered.
    #[instrument(skip(self))]
    pub async fn get_full_thread(&self, board: &str, thread_id: &str) -> Result<ThreadView> {
        let id: ThreadId = thread_id.parse()?;
        let collection = self.collection(board)?;

        let thread = collection
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound("thread".into(), id.to_string()))?
            .document;

        let mut replies: Vec<&ReplyDocument> = thread.replies.iter().collect();
        replies.sort_by(|a, b| a.created_on.cmp(&b.created_on));

        Ok(ThreadView::project(&thread, replies, true))
    }

    /// Appends a reply and bumps the thread to the reply's timestamp in one write.
    #[instrument(skip(self, text, delete_password))]
    pub async fn create_reply(
        &self,
        board: &str,
        thread_id: &str,
        text: &str,
        delete_password: &str,
    ) -> Result<Outcome> {
        let (text, delete_password) = validate_post(text, delete_password)?;
        let id: ThreadId = thread_id.parse()?;
        let collection = self.collection(board)?;

        let hash = hash_blocking(self.hasher.clone(), delete_password.to_owned()).await?;
        let mut reply = ReplyDocument::new(text.to_string(), hash, Utc::now());

        let settled = self
            .update_aggregate(&collection, id, Verdicts::default(), |thread, _| {
                // The bump marker never moves backwards, even when a
                // concurrent reply committed with a later clock reading.
                reply.created_on = Utc::now().max(thread.bumped_on);
                thread.push_reply(reply.clone());
                Ok(Change::Replace)
            })
            .await?;

        Ok(match settled {
            Some(_) => {
                debug!(reply_id = %reply.id, "reply created");
                Outcome::Applied
            }
            None => Outcome::NotFound,
        })
    }

    #[instrument(skip(self))]
    pub async fn report_reply(
        &self,
        board: &str,
        thread_id: &str,
        reply_id: &str,
    ) -> Result<Outcome> {
        let id: ThreadId = thread_id.parse()?;
        let reply_id: ReplyId = reply_id.parse()?;
        let collection = self.collection(board)?;

        let settled = self
            .update_aggregate(&collection, id, Verdicts::default(), |thread, _| {
                Ok(match thread.reply_mut(reply_id) {
                    Some(reply) => {
                        reply.reported = true;
                        Change::Replace
                    }
                    None => Change::Keep,
                })
            })
            .await?;

        Ok(match settled {
            Some((Change::Replace, _)) => Outcome::Applied,
            _ => Outcome::NotFound,
        })
    }

    /// Pulls the reply matching both `reply_id` and `delete_password` out of
    /// the thread. `bumped_on` is left untouched.
    #[instrument(skip(self, delete_password))]
    pub async fn delete_reply(
        &self,
        board: &str,
        thread_id: &str,
        reply_id: &str,
        delete_password: &str,
    ) -> Result<Outcome> {
        let id: ThreadId = thread_id.parse()?;
        let reply_id: ReplyId = reply_id.parse()?;
        let collection = self.collection(board)?;
        let verdicts = Verdicts::for_secret(delete_password);

        let settled = self
            .update_aggregate(&collection, id, verdicts, |thread, verdicts| {
                let Some(position) = thread.replies.iter().position(|r| r.id == reply_id) else {
                    return Ok(Change::Keep);
                };
                if verdicts.check(&thread.replies[position].delete_password)? {
                    thread.replies.remove(position);
                    Ok(Change::Replace)
                } else {
                    Ok(Change::Keep)
                }
            })
            .await?;

        // Judge by the document as it stands after the update, not by whether
        // the thread matched.
        let outcome = match settled {
            None => Outcome::NotFound,
            Some((_, thread)) if thread.reply(reply_id).is_some() => Outcome::Denied,
            Some(_) => Outcome::Applied,
        };
        debug!(?outcome, "delete reply settled");
        Ok(outcome)
    }

    /// Removes every thread on the board. Fixture teardown only.
    #[instrument(skip(self))]
    pub async fn delete_all_threads_in_board(&self, board: &str) -> Result<u64> {
        let removed = self.collection(board)?.delete_all().await?;
        debug!(removed, "board cleared");
        Ok(removed)
    }

    fn collection(&self, board: &str) -> Result<Collection> {
        if board.is_empty() {
            return Err(AppError::ValidationError("board is required".into()));
        }
        self.storage.collection(board)
    }

    /// Applies `mutate` to the current version of the thread and writes the
    /// result back with a compare-and-swap, retrying on lost races.
    ///
    /// Returns `None` when the thread does not exist, otherwise the change
    /// that was committed together with the post-update document (the removed
    /// document for `Change::Remove`).
    ///
    /// A mutation that asks for a password verdict is re-run on the same
    /// version once the verdict is known. Verdicts carry over between
    /// attempts, so a password is only re-verified against a hash it has
    /// not been checked against yet.
    async fn update_aggregate<F>(
        &self,
        collection: &Collection,
        id: ThreadId,
        mut verdicts: Verdicts,
        mut mutate: F,
    ) -> Result<Option<(Change, ThreadDocument)>>
    where
        F: FnMut(&mut ThreadDocument, &Verdicts) -> Mutation,
    {
        for attempt in 1..=MAX_SWAP_ATTEMPTS {
            let Some(current) = collection.get(id).await? else {
                return Ok(None);
            };

            let (change, thread) = loop {
                let mut thread = current.document.clone();
                match mutate(&mut thread, &verdicts) {
                    Ok(change) => break (change, thread),
                    Err(Unverified(hash)) => verdicts.settle(&self.hasher, hash).await?,
                }
            };
            let replacement = match change {
                Change::Keep => return Ok(Some((change, thread))),
                Change::Replace => Some(thread.clone()),
                Change::Remove => None,
            };

            if collection
                .compare_and_swap(id, current.version, replacement)
                .await?
            {
                return Ok(Some((change, thread)));
            }
            debug!(%id, attempt, "lost compare-and-swap race, retrying");
        }

        warn!(%id, collection = collection.name(), "giving up after repeated write conflicts");
        Err(AppError::Conflict(format!(
            "thread {id} kept changing during update"
        )))
    }
}

/// Argon2 is CPU-bound; these run it on the blocking pool, not the async workers.
async fn hash_blocking(hasher: Arc<dyn SecretHasher>, secret: String) -> Result<String> {
    let hash = tokio::task::spawn_blocking(move || hasher.hash_secret(&secret))
        .await
        .map_err(anyhow::Error::from)??;
    Ok(hash)
}

async fn verify_blocking(
    hasher: Arc<dyn SecretHasher>,
    secret: String,
    hash: String,
) -> Result<bool> {
    let matches = tokio::task::spawn_blocking(move || hasher.verify_secret(&secret, &hash))
        .await
        .map_err(anyhow::Error::from)?;
    Ok(matches)
}

fn validate_post<'a>(text: &'a str, delete_password: &'a str) -> Result<(&'a str, &'a str)> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::ValidationError("text is required".into()));
    }
    if delete_password.is_empty() {
        return Err(AppError::ValidationError("delete_password is required".into()));
    }
    Ok((text, delete_password))
}
