use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Authoring features for logged-in accounts. Each handler resolves the
/// session through the `AuthUser` extractor (or `CurrentUser` for comments),
/// then checks the role capability matrix and post ownership through
/// `policy::authorize` before any store mutation.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // POST /post/{id}
        // Adds a comment to a published post.
        .route("/post/{id}", post(handlers::add_comment))
        // GET/POST /create
        // New post form and submission. Viewers are refused; new posts start pending.
        .route(
            "/create",
            get(handlers::create_post_page).post(handlers::create_post),
        )
        // GET/POST /my_posts
        // Own posts in every status; POST bulk-deletes the selected ids (editor and admin only).
        .route(
            "/my_posts",
            get(handlers::my_posts).post(handlers::delete_my_posts),
        )
        // GET/POST /edit_post/{id}
        // Edit an owned post. Ownership is required for every role.
        .route(
            "/edit_post/{id}",
            get(handlers::edit_post_page).post(handlers::edit_post),
        )
}
