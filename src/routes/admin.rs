use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Admin Router Module
///
/// Moderation, account management and category management. Every handler
/// requires a session and `Role::Admin` exactly; anyone else is redirected
/// to `/` with a permission message and nothing is changed.
///
/// Paths are registered in full rather than nested under `/admin` so the bare
/// `/admin` panel sits next to its sub-pages.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin
        // Moderation panel listing every post in any status.
        .route("/admin", get(handlers::admin_panel))
        // GET /admin/update/{id}/{approve|delete}
        // Approve a pending post, or delete any post with its comments.
        .route(
            "/admin/update/{id}/{action}",
            get(handlers::moderate_post),
        )
        // GET /admin/users
        // Every account with role and block status.
        .route("/admin/users", get(handlers::admin_users))
        // GET /admin/reset_password/{username}
        // Resets the password to the configured fallback value.
        .route(
            "/admin/reset_password/{username}",
            get(handlers::reset_password),
        )
        // GET /admin/block_user/{username}/{block|unblock}?reason=...
        .route(
            "/admin/block_user/{username}/{action}",
            get(handlers::block_user),
        )
        // GET/POST /admin/edit_role/{username}
        .route(
            "/admin/edit_role/{username}",
            get(handlers::edit_role_page).post(handlers::edit_role),
        )
        // GET /admin/delete_user/{username}
        // Removes the account, its sessions, its posts and their comments.
        .route(
            "/admin/delete_user/{username}",
            get(handlers::delete_user),
        )
        // GET/POST /admin/categories
        .route(
            "/admin/categories",
            get(handlers::admin_categories).post(handlers::create_category),
        )
        // GET /admin/categories/delete/{id}
        .route(
            "/admin/categories/delete/{id}",
            get(handlers::delete_category),
        )
}
