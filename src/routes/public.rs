use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Public Router Module
///
/// Endpoints reachable without a session: the listing pages, post detail,
/// and the registration and login flow.
///
/// Visibility Mandate:
/// Listing, category and detail handlers only ever return `published` posts.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for monitoring and load balancers.
        .route("/health", get(|| async { "ok" }))
        // GET/POST /register
        // Registration form context and account creation.
        .route(
            "/register",
            get(handlers::register_page).post(handlers::register),
        )
        // GET/POST /login
        // Login form context and session establishment. Blocked accounts are refused here.
        .route("/login", get(handlers::login_page).post(handlers::login))
        // GET /logout
        // Deletes the server-side session and clears the cookie.
        .route("/logout", get(handlers::logout))
        // GET / and /page/{page}
        // Published posts, 10 per page, newest first. Out-of-range pages redirect to page 1.
        .route("/", get(handlers::index))
        .route("/page/{page}", get(handlers::index_page))
        // GET /category/{id}
        // Published posts in one category.
        .route("/category/{id}", get(handlers::category))
        // GET /post/{id}
        // A published post and its comments. The POST half lives with the authenticated routes.
        .route("/post/{id}", get(handlers::post_detail))
}
