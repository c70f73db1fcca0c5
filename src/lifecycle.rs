use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use ts_rs::TS;
use utoipa::ToSchema;

/// PostStatus
///
/// The moderation dimension of a post. Every post starts `Pending` and can only
/// move forward to `Published` through an explicit admin approval. There is no
/// way back: a published post never returns to the queue, even when its owner
/// edits it afterwards.
///
/// Deletion is not a state. It is a destructive transition available from
/// either state and is handled by the repository.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
#[ts(export)]
pub enum PostStatus {
    #[default]
    Pending,
    Published,
}

impl PostStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PostStatus::Pending => "pending",
            PostStatus::Published => "published",
        }
    }

    /// Only published posts appear on the listing, category and detail pages.
    pub fn is_publicly_visible(self) -> bool {
        self == PostStatus::Published
    }

    /// approve
    ///
    /// The single forward transition of the state machine.
    pub fn approve(self) -> Result<PostStatus, LifecycleError> {
        match self {
            PostStatus::Pending => Ok(PostStatus::Published),
            PostStatus::Published => Err(LifecycleError::AlreadyPublished),
        }
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("Post is already published.")]
    AlreadyPublished,
}

/// ModerationAction
///
/// The `{action}` segment of `/admin/update/{id}/{action}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationAction {
    Approve,
    Delete,
}

impl FromStr for ModerationAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" => Ok(ModerationAction::Approve),
            "delete" => Ok(ModerationAction::Delete),
            other => Err(format!("Unknown moderation action '{other}'.")),
        }
    }
}
