use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::{fmt, str::FromStr};
use ts_rs::TS;
use utoipa::ToSchema;

use crate::{flash::Flash, lifecycle::PostStatus};

// --- Core Application Schemas (Mapped to Database) ---

/// Role
///
/// Privilege tier of an account. Stored as lowercase text in `accounts.role`.
/// The tiers are ordered by privilege but the ordering is not used for
/// decisions: `policy::authorize` matches on the exact role.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS, ToSchema, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    #[default]
    Viewer,
    Collaborator,
    Editor,
    Admin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Viewer, Role::Collaborator, Role::Editor, Role::Admin];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Viewer => "viewer",
            Role::Collaborator => "collaborator",
            Role::Editor => "editor",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid role.")]
pub struct InvalidRole(pub String);

impl FromStr for Role {
    type Err = InvalidRole;

    /// Exact, case-sensitive match against the four stored names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| InvalidRole(s.to_string()))
    }
}

/// Account
///
/// A row of the `accounts` table. Carries the password hash, so it is never
/// serialized; pages expose `AccountSummary` instead.
#[derive(Debug, Clone, FromRow)]
pub struct Account {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub blocked: bool,
    pub block_reason: String,
    pub created_at: DateTime<Utc>,
}

/// Public projection of an `Account` used by every page view model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AccountSummary {
    pub id: i64,
    pub username: String,
    pub role: Role,
    pub blocked: bool,
    pub block_reason: String,
}

impl From<&Account> for AccountSummary {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            username: account.username.clone(),
            role: account.role,
            blocked: account.blocked,
            block_reason: account.block_reason.clone(),
        }
    }
}

/// Admin-defined tag used to filter published posts. Names are unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

/// Post
///
/// A row of the `posts` table. `author` is the owner's username copied at
/// creation time; `account_id` is the owning account and the only thing
/// ownership checks look at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub image_url: String,
    pub author: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    pub status: PostStatus,
    pub account_id: i64,
    pub category_id: Option<i64>,
}

/// Comment
///
/// Append-only. `account_id` is a weak reference: deleting the author's
/// account leaves the comment in place and `author` then loads as `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Comment {
    pub id: i64,
    pub content: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    pub account_id: i64,
    pub post_id: i64,
    // Loaded via a LEFT JOIN on accounts.
    #[sqlx(default)]
    pub author: Option<String>,
}

/// Insert payload assembled by the create handler.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub image_url: String,
    pub author: String,
    pub account_id: i64,
    pub category_id: Option<i64>,
}

// --- Request Payloads (Form Bodies) ---

// Every field defaults so a missing field becomes a validation message rather
// than a 4xx rejection from the extractor.

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct RegisterForm {
    pub username: String,
    pub password: String,
    pub confirm_password: String,
    /// Requested role, `viewer` when absent.
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct PostForm {
    pub title: String,
    pub content: String,
    pub category_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct EditPostForm {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct CommentForm {
    pub comment: String,
}

/// Checkbox selection from the "my posts" page, `post_ids` repeated once per box.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct BulkDeleteForm {
    pub post_ids: Vec<i64>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct CategoryForm {
    pub cat_name: String,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct RoleForm {
    pub role: String,
}

#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BlockQuery {
    /// Stored verbatim and shown to the user at login. Absent means "No reason given".
    pub reason: Option<String>,
}

// --- Page View Models (Output) ---

/// Layout
///
/// Context shared by every page: who is logged in, the category menu and the
/// pending flash message (consumed by this response).
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Layout {
    pub current_user: Option<AccountSummary>,
    pub categories: Vec<Category>,
    pub flash: Option<Flash>,
}

/// Public listing: `/`, `/page/{n}` and `/category/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct IndexPage {
    pub layout: Layout,
    pub posts: Vec<Post>,
    pub page: i64,
    pub total_pages: i64,
    pub category_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PostPage {
    pub layout: Layout,
    pub post: Post,
    /// Newest first.
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct EditPostPage {
    pub layout: Layout,
    pub post: Post,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MyPostsPage {
    pub layout: Layout,
    pub posts: Vec<Post>,
    /// Whether the bulk delete form should be offered.
    pub can_delete: bool,
}

/// Moderation panel: every post regardless of status.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AdminPostsPage {
    pub layout: Layout,
    pub posts: Vec<Post>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AdminUsersPage {
    pub layout: Layout,
    pub users: Vec<AccountSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct EditRolePage {
    pub layout: Layout,
    pub target_user: AccountSummary,
    pub roles: Vec<Role>,
}
