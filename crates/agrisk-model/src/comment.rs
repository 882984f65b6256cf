//! Comments on assessments and prompts
//!
//! Comments posted from this client appear in the list before the server
//! confirms them. Those local records carry an [`CommentId::Local`] id that
//! can never equal a server id, since the two live in different variants.

use crate::ids::UserId;
use crate::validate::{Validate, ValidationErrors, MAX_COMMENT_LEN};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Comment identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommentId {
    /// Assigned by the API
    Server(u64),
    /// Synthesized locally while the post is in flight
    Local(Ulid),
}

impl CommentId {
    /// Fresh local id
    #[inline]
    #[must_use]
    pub fn local() -> Self {
        CommentId::Local(Ulid::new())
    }

    /// Whether this id was synthesized locally
    #[inline]
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self, CommentId::Local(_))
    }
}

impl std::fmt::Display for CommentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommentId::Server(id) => write!(f, "{id}"),
            CommentId::Local(id) => write!(f, "local-{id}"),
        }
    }
}

/// Identity of the signed-in user, threaded into locally synthesized records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    /// Signed-in user's id
    pub id: UserId,
    /// Name shown on optimistic records
    pub display_name: String,
}

impl CurrentUser {
    /// Create identity
    #[must_use]
    pub fn new(id: impl Into<UserId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

/// Comment as listed by the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    /// Server id, or a local id until confirmed
    pub id: CommentId,
    /// Author's user id
    pub author_id: UserId,
    /// Author's display name at posting time
    pub author_name: String,
    /// Comment text
    pub body: String,
    /// When the record was created
    pub created_at: DateTime<Utc>,
}

impl Comment {
    /// Local stand-in for a comment that has been posted but not confirmed
    #[must_use]
    pub fn pending(author: &CurrentUser, body: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: CommentId::local(),
            author_id: author.id,
            author_name: author.display_name.clone(),
            body: body.into(),
            created_at: now,
        }
    }
}

/// Payload for posting a comment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewComment {
    /// Comment text
    pub body: String,
}

impl NewComment {
    /// Create payload
    #[must_use]
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }
}

impl Validate for NewComment {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.require_text("body", &self.body);
        if self.body.chars().count() > MAX_COMMENT_LEN {
            errors.add("body", format!("must be at most {MAX_COMMENT_LEN} characters"));
        }
        errors.into_result()
    }
}
