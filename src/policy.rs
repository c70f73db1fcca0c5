use crate::models::Role;

/// Actor
///
/// The identity an authorization decision is made for: the account id and its
/// role as resolved from the session. Block status is deliberately absent,
/// blocked accounts never get this far because they cannot log in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: i64,
    pub role: Role,
}

/// Action
///
/// Everything a request can ask permission for. Resource-scoped actions carry
/// the owner id of the resource they target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    // --- Own-resource actions ---
    CreatePost,
    EditPost { owner_id: i64 },
    /// Bulk delete from the "my posts" page. Ownership of each id is enforced by
    /// the repository query, so no owner id is carried here.
    DeleteOwnPosts,
    ViewOwnPosts,
    Comment,

    // --- Admin-only global actions ---
    Moderate,
    ListUsers,
    EditRole,
    ResetPassword,
    BlockUser,
    DeleteUser,
    ManageCategories,
}

impl Action {
    pub fn is_admin_only(self) -> bool {
        matches!(
            self,
            Action::Moderate
                | Action::ListUsers
                | Action::EditRole
                | Action::ResetPassword
                | Action::BlockUser
                | Action::DeleteUser
                | Action::ManageCategories
        )
    }
}

/// Denial
///
/// Why an action was refused. Handlers turn a denial into a flash message and a
/// redirect, nothing is mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    LoginRequired,
    NotOwner,
    RoleForbidden { role: Role, action: Action },
    AdminOnly,
}

impl Denial {
    pub fn message(&self) -> &'static str {
        match self {
            Denial::LoginRequired => "Please log in to continue.",
            Denial::NotOwner => "You cannot edit this post.",
            Denial::RoleForbidden { action, .. } => match action {
                Action::CreatePost => "Viewers can read posts but cannot create them.",
                Action::EditPost { .. } => "Viewers cannot edit posts.",
                Action::DeleteOwnPosts => "Your role cannot delete posts.",
                _ => "Your role does not allow this action.",
            },
            Denial::AdminOnly => "You do not have permission to perform this action.",
        }
    }

    /// The safe page to send the actor back to.
    pub fn fallback(&self) -> &'static str {
        match self {
            Denial::LoginRequired => "/login",
            Denial::RoleForbidden {
                action: Action::DeleteOwnPosts,
                ..
            } => "/my_posts",
            _ => "/",
        }
    }
}

/// Capability matrix for own-resource actions.
///
/// | role         | create | edit own | delete own |
/// |--------------|--------|----------|------------|
/// | viewer       | no     | no       | no         |
/// | collaborator | yes    | yes      | no         |
/// | editor       | yes    | yes      | yes        |
/// | admin        | yes    | yes      | yes        |
fn role_permits(role: Role, action: Action) -> bool {
    match action {
        Action::CreatePost | Action::EditPost { .. } => role != Role::Viewer,
        Action::DeleteOwnPosts => matches!(role, Role::Editor | Role::Admin),
        Action::ViewOwnPosts | Action::Comment => true,
        _ => role == Role::Admin,
    }
}

/// authorize
///
/// The single decision point for every permission check in the application.
/// Rules apply in order:
///
/// 1. no actor: every action here requires identity
/// 2. admin-only actions require `Role::Admin` exactly
/// 3. edits require ownership, for admins too
/// 4. the role capability matrix
pub fn authorize(actor: Option<&Actor>, action: Action) -> Result<(), Denial> {
    let Some(actor) = actor else {
        return Err(Denial::LoginRequired);
    };

    if action.is_admin_only() {
        return if actor.role == Role::Admin {
            Ok(())
        } else {
            Err(Denial::AdminOnly)
        };
    }

    if let Action::EditPost { owner_id } = action {
        if owner_id != actor.id {
            return Err(Denial::NotOwner);
        }
    }

    if role_permits(actor.role, action) {
        Ok(())
    } else {
        Err(Denial::RoleForbidden {
            role: actor.role,
            action,
        })
    }
}
