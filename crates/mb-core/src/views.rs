//! # Views
//!
//! Shaped, caller-facing projections of thread aggregates. A filtered view
//! carries neither `reported` nor `delete_password`; the keys are omitted
//! from the serialized form entirely rather than set to null.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ReplyDocument, ReplyId, ThreadDocument, ThreadId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadView {
    #[serde(rename = "_id")]
    pub id: ThreadId,
    pub text: String,
    pub created_on: DateTime<Utc>,
    pub bumped_on: DateTime<Utc>,
    /// Total replies on the thread; only present in board listings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replycount: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reported: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_password: Option<String>,
    pub replies: Vec<ReplyView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyView {
    #[serde(rename = "_id")]
    pub id: ReplyId,
    pub text: String,
    pub created_on: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reported: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_password: Option<String>,
}

impl ThreadView {
    /// Projects a thread with the given (already selected and ordered) replies.
    pub fn project<'a, I>(doc: &ThreadDocument, replies: I, filtered: bool) -> Self
    where
        I: IntoIterator<Item = &'a ReplyDocument>,
    {
        Self {
            id: doc.id,
            text: doc.text.clone(),
            created_on: doc.created_on,
            bumped_on: doc.bumped_on,
            replycount: None,
            reported: (!filtered).then_some(doc.reported),
            delete_password: (!filtered).then(|| doc.delete_password.clone()),
            replies: replies
                .into_iter()
                .map(|r| ReplyView::project(r, filtered))
                .collect(),
        }
    }

    pub fn with_replycount(mut self, count: usize) -> Self {
        self.replycount = Some(count);
        self
    }
}

impl ReplyView {
    pub fn project(doc: &ReplyDocument, filtered: bool) -> Self {
        Self {
            id: doc.id,
            text: doc.text.clone(),
            created_on: doc.created_on,
            reported: (!filtered).then_some(doc.reported),
            delete_password: (!filtered).then(|| doc.delete_password.clone()),
        }
    }
}
