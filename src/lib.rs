use axum::{Router, extract::FromRef, http::HeaderName};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Domain rules: pure, no I/O.
pub mod lifecycle;
pub mod pagination;
pub mod policy;

// Application services and components.
pub mod auth;
pub mod config;
pub mod error;
pub mod flash;
pub mod handlers;
pub mod models;
pub mod repository;

// Router segments (Public, Authenticated, Admin).
pub mod routes;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use repository::{Repository, RepositoryState, SqliteRepository};

use models::Role;

/// ApiDoc
///
/// OpenAPI document for every endpoint, served at `/api-docs/openapi.json`
/// and browsable through the Swagger UI.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::register_page, handlers::register, handlers::login_page, handlers::login,
        handlers::logout, handlers::index, handlers::index_page, handlers::category,
        handlers::post_detail, handlers::add_comment, handlers::create_post_page,
        handlers::create_post, handlers::my_posts, handlers::delete_my_posts,
        handlers::edit_post_page, handlers::edit_post, handlers::admin_panel,
        handlers::moderate_post, handlers::admin_users, handlers::reset_password,
        handlers::block_user, handlers::edit_role_page, handlers::edit_role,
        handlers::delete_user, handlers::admin_categories, handlers::create_category,
        handlers::delete_category
    ),
    components(
        schemas(
            models::Role, models::AccountSummary, models::Category, models::Post,
            models::Comment, models::Layout, models::IndexPage, models::PostPage,
            models::EditPostPage, models::MyPostsPage, models::AdminPostsPage,
            models::AdminUsersPage, models::EditRolePage, models::RegisterForm,
            models::LoginForm, models::PostForm, models::EditPostForm, models::CommentForm,
            models::BulkDeleteForm, models::CategoryForm, models::RoleForm,
            lifecycle::PostStatus, flash::Flash, flash::FlashLevel,
        )
    ),
    tags(
        (name = "blog-portal", description = "Multi-role blog with a moderation queue")
    )
)]
struct ApiDoc;

/// AppState
///
/// Shared, cheaply cloneable state handed to every request.
#[derive(Clone)]
pub struct AppState {
    /// Persistence layer behind the `Repository` trait.
    pub repo: RepositoryState,
    /// The loaded, immutable environment configuration.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// The session extractors only need these two pieces, not the whole state.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

pub const DEFAULT_CATEGORIES: [&str; 2] = ["Fun stories", "Sad stories"];

/// seed_defaults
///
/// First-start data: an `admin` account with the configured password unless
/// one already exists, and the default categories when there are none.
/// Running it again changes nothing.
pub async fn seed_defaults(repo: &dyn Repository, config: &AppConfig) -> AppResult<()> {
    if repo.find_account_by_username("admin").await?.is_none() {
        let password_hash = auth::hash_password(&config.admin_password)?;
        if repo
            .create_account("admin", &password_hash, Role::Admin)
            .await?
            .is_some()
        {
            tracing::info!("Seeded admin account");
        }
    }

    if repo.list_categories().await?.is_empty() {
        for name in DEFAULT_CATEGORIES {
            repo.create_category(name).await?;
        }
        tracing::info!("Seeded default categories");
    }

    Ok(())
}

/// create_router
///
/// Assembles the routing structure, registers the state and wraps everything
/// in the observability layers.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Base Router Assembly
    // Same-path routes from different segments (GET and POST /post/{id}) are
    // combined method by method when merged.
    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(authenticated::authenticated_routes())
        .merge(admin::admin_routes())
        .with_state(state);

    // 3. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                // 3a. A UUID for every incoming request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 3b. One tracing span per request, carrying the request id.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 3c. Echo x-request-id back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS Layer
        .layer(cors)
}

/// trace_span_logger
///
/// Span factory for `TraceLayer`: method, URI and the `x-request-id` header so
/// every log line of one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
