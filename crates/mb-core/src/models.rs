//! # Domain Models
//!
//! A thread is stored as one aggregate document that embeds its replies.
//! We use UUID v7 for time-ordered, globally unique identification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{AppError, Result};

macro_rules! id_type {
    ($name:ident, $kind:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Allocates a fresh ID from the global, time-ordered ID space.
            pub fn generate() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = AppError;

            fn from_str(s: &str) -> Result<Self> {
                Uuid::parse_str(s.trim())
                    .map(Self)
                    .map_err(|_| AppError::InvalidIdentifier(format!("{} ID {:?}", $kind, s)))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

id_type!(ThreadId, "thread");
id_type!(ReplyId, "reply");

/// The aggregate root: a thread and every reply posted to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadDocument {
    #[serde(rename = "_id")]
    pub id: ThreadId,
    pub text: String,
    pub created_on: DateTime<Utc>,
    /// The timestamp used for sorting threads by activity
    pub bumped_on: DateTime<Utc>,
    pub reported: bool,
    /// PHC-formatted hash of the poster's delete password
    pub delete_password: String,
    /// Insertion order is chronological order.
    pub replies: Vec<ReplyDocument>,
}

impl ThreadDocument {
    /// Builds a fresh thread with no replies, bumped at its creation time.
    pub fn new(text: String, delete_password_hash: String, now: DateTime<Utc>) -> Self {
        Self {
            id: ThreadId::generate(),
            text,
            created_on: now,
            bumped_on: now,
            reported: false,
            delete_password: delete_password_hash,
            replies: Vec::new(),
        }
    }

    pub fn reply(&self, id: ReplyId) -> Option<&ReplyDocument> {
        self.replies.iter().find(|r| r.id == id)
    }

    pub fn reply_mut(&mut self, id: ReplyId) -> Option<&mut ReplyDocument> {
        self.replies.iter_mut().find(|r| r.id == id)
    }

    /// Appends a reply and moves the bump marker to its creation time.
    pub fn push_reply(&mut self, reply: ReplyDocument) {
        self.bumped_on = reply.created_on;
        self.replies.push(reply);
    }
}

/// A child post. Owned by exactly one thread; has no lifecycle of its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyDocument {
    #[serde(rename = "_id")]
    pub id: ReplyId,
    pub text: String,
    pub created_on: DateTime<Utc>,
    pub reported: bool,
    pub delete_password: String,
}

impl ReplyDocument {
    pub fn new(text: String, delete_password_hash: String, now: DateTime<Utc>) -> Self {
        Self {
            id: ReplyId::generate(),
            text,
            created_on: now,
            reported: false,
            delete_password: delete_password_hash,
        }
    }
}

/// A stored document together with its compare-and-swap version.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub version: u64,
    pub document: T,
}

/// How a mutation against a single thread aggregate settled.
///
/// `NotFound` and `Denied` are deliberately collapsed by [`Outcome::is_applied`]
/// so that outward-facing callers cannot probe for existence by guessing passwords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    NotFound,
    Denied,
}

impl Outcome {
    pub fn is_applied(self) -> bool {
        matches!(self, Outcome::Applied)
    }

    /// Converts the outcome into an error for callers that need to tell
    /// a missing target from a rejected password.
    pub fn into_result(self, kind: &str, id: &str) -> Result<()> {
        match self {
            Outcome::Applied => Ok(()),
            Outcome::NotFound => Err(AppError::NotFound(kind.to_string(), id.to_string())),
            Outcome::Denied => Err(AppError::Unauthorized(format!(
                "delete password does not match {kind} {id}"
            ))),
        }
    }
}
