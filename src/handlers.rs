use crate::{
    AppState,
    auth::{self, AuthUser, CurrentUser, LoginOutcome},
    error::AppResult,
    flash::{self, Flash},
    lifecycle::{ModerationAction, PostStatus},
    models::{
        Account, AccountSummary, AdminPostsPage, AdminUsersPage, BlockQuery, BulkDeleteForm,
        CategoryForm, CommentForm, EditPostForm, EditPostPage, EditRolePage, IndexPage, Layout,
        LoginForm, MyPostsPage, NewPost, Post, PostForm, PostPage, RegisterForm, Role,
        RoleForm,
    },
    pagination::PageWindow,
    policy::{self, Action, Denial},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use axum_extra::extract::{CookieJar, Form};
use chrono::Utc;

const NO_REASON_GIVEN: &str = "No reason given";

// --- Shared Helpers ---

/// page_layout
///
/// Builds the context every page carries and consumes the pending flash
/// message. The returned jar must go back out with the response so the flash
/// cookie is cleared.
async fn page_layout(
    state: &AppState,
    user: Option<&Account>,
    jar: CookieJar,
) -> AppResult<(CookieJar, Layout)> {
    let (jar, flash) = flash::take(jar);
    let categories = state.repo.list_categories().await?;
    Ok((
        jar,
        Layout {
            current_user: user.map(AccountSummary::from),
            categories,
            flash,
        },
    ))
}

fn deny(jar: CookieJar, denial: Denial) -> Response {
    tracing::warn!(?denial, "Request denied");
    flash::redirect(jar, denial.fallback(), Flash::danger(denial.message()))
}

/// Ids arrive as raw path text; anything that is not an integer names no row.
fn parse_id(raw: &str) -> Option<i64> {
    raw.parse().ok()
}

async fn find_post(state: &AppState, raw_id: &str) -> AppResult<Option<Post>> {
    match parse_id(raw_id) {
        Some(id) => Ok(state.repo.get_post(id).await?),
        None => Ok(None),
    }
}

fn placeholder_image_url() -> String {
    format!(
        "https://picsum.photos/300/200?random={}",
        Utc::now().timestamp_millis()
    )
}

// --- Registration & Session Lifecycle ---

/// register_page
///
/// [Public Route] Context for the registration form.
#[utoipa::path(
    get,
    path = "/register",
    responses((status = 200, description = "Registration form context", body = Layout))
)]
pub async fn register_page(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    jar: CookieJar,
) -> AppResult<Response> {
    let (jar, layout) = page_layout(&state, user.as_ref(), jar).await?;
    Ok((jar, Json(layout)).into_response())
}

/// register
///
/// [Public Route] Creates an account. Username uniqueness is decided by the
/// store's constraint, not by a prior lookup, so concurrent registrations of
/// the same name cannot both succeed.
#[utoipa::path(
    post,
    path = "/register",
    request_body(content = RegisterForm, content_type = "application/x-www-form-urlencoded"),
    responses((status = 303, description = "Redirect to /login on success, back to /register otherwise"))
)]
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<RegisterForm>,
) -> AppResult<Response> {
    let registration = match auth::validate_registration(form, state.config.allow_role_selection)
    {
        Ok(registration) => registration,
        Err(message) => return Ok(flash::redirect(jar, "/register", Flash::danger(message))),
    };

    let password_hash = auth::hash_password(&registration.password)?;
    let created = state
        .repo
        .create_account(&registration.username, &password_hash, registration.role)
        .await?;

    let Some(account) = created else {
        return Ok(flash::redirect(
            jar,
            "/register",
            Flash::danger("Username already exists."),
        ));
    };

    if account.role == Role::Admin {
        tracing::warn!(username = %account.username, "Self-registration with the admin role");
    }
    tracing::info!(username = %account.username, role = %account.role, "Account registered");

    Ok(flash::redirect(
        jar,
        "/login",
        Flash::success("Registration successful. Please log in."),
    ))
}

/// login_page
///
/// [Public Route] Context for the login form.
#[utoipa::path(
    get,
    path = "/login",
    responses((status = 200, description = "Login form context", body = Layout))
)]
pub async fn login_page(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    jar: CookieJar,
) -> AppResult<Response> {
    let (jar, layout) = page_layout(&state, user.as_ref(), jar).await?;
    Ok((jar, Json(layout)).into_response())
}

/// login
///
/// [Public Route] Establishes a session. A new opaque token is stored server
/// side and handed to the client in the `session_id` cookie; blocked accounts
/// never get one.
#[utoipa::path(
    post,
    path = "/login",
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    responses((status = 303, description = "Redirect to / on success, back to /login otherwise"))
)]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    let outcome = auth::authenticate(state.repo.as_ref(), &form.username, &form.password).await?;

    let account = match outcome {
        LoginOutcome::Success(account) => account,
        LoginOutcome::Blocked { .. } => {
            tracing::warn!(username = %form.username, "Login refused: account blocked");
            return Ok(flash::redirect(jar, "/login", Flash::danger(outcome.message())));
        }
        LoginOutcome::InvalidCredentials => {
            tracing::warn!(username = %form.username, "Login refused: invalid credentials");
            return Ok(flash::redirect(jar, "/login", Flash::danger(outcome.message())));
        }
    };

    // A browser logging in again gives up its previous session.
    if let Some(previous) = jar.get(auth::SESSION_COOKIE) {
        state.repo.delete_session(previous.value()).await?;
    }

    let token = auth::new_session_token();
    state.repo.create_session(&token, account.id).await?;
    tracing::info!(username = %account.username, "Logged in");

    let jar = jar.add(auth::session_cookie(token, state.config.secure_cookies()));
    Ok(flash::redirect(
        jar,
        "/",
        Flash::success("Logged in successfully."),
    ))
}

/// logout
///
/// [Public Route] Deletes the server-side session (if any) and clears the cookie.
#[utoipa::path(
    get,
    path = "/logout",
    responses((status = 303, description = "Redirect to /login"))
)]
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> AppResult<Response> {
    if let Some(cookie) = jar.get(auth::SESSION_COOKIE) {
        state.repo.delete_session(cookie.value()).await?;
    }
    let jar = auth::clear_session_cookie(jar);
    Ok(flash::redirect(jar, "/login", Flash::success("Logged out.")))
}

// --- Public Listing ---

async fn render_listing(
    state: &AppState,
    user: Option<Account>,
    jar: CookieJar,
    requested: i64,
) -> AppResult<Response> {
    let total = state.repo.count_published_posts().await?;
    let window = match PageWindow::resolve(requested, total) {
        Ok(window) => window,
        Err(e) => {
            tracing::warn!(
                requested = e.requested,
                total_pages = e.total_pages,
                "Page out of range"
            );
            return Ok(flash::redirect(jar, "/page/1", Flash::danger(e.to_string())));
        }
    };

    let posts = state
        .repo
        .list_published_posts(window.offset(), window.limit())
        .await?;
    let (jar, layout) = page_layout(state, user.as_ref(), jar).await?;

    let page = IndexPage {
        layout,
        posts,
        page: window.page,
        total_pages: window.total_pages,
        category_name: None,
    };
    Ok((jar, Json(page)).into_response())
}

/// index
///
/// [Public Route] First page of published posts, newest first.
#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Published posts, page 1", body = IndexPage))
)]
pub async fn index(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    jar: CookieJar,
) -> AppResult<Response> {
    render_listing(&state, user, jar, 1).await
}

/// index_page
///
/// [Public Route] One page of published posts. Zero, negative, non-numeric and
/// beyond-the-end page numbers redirect to page 1 with a message.
#[utoipa::path(
    get,
    path = "/page/{page}",
    params(("page" = String, Path, description = "1-based page number")),
    responses(
        (status = 200, description = "Published posts", body = IndexPage),
        (status = 303, description = "Page does not exist, redirect to /page/1")
    )
)]
pub async fn index_page(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    jar: CookieJar,
    Path(page): Path<String>,
) -> AppResult<Response> {
    // Anything unparsable is treated like page 0: out of range.
    let requested = page.parse::<i64>().unwrap_or(0);
    render_listing(&state, user, jar, requested).await
}

/// category
///
/// [Public Route] Every published post in one category, newest first. Not paginated.
#[utoipa::path(
    get,
    path = "/category/{id}",
    params(("id" = i64, Path, description = "Category id")),
    responses(
        (status = 200, description = "Published posts in the category", body = IndexPage),
        (status = 303, description = "Unknown category, redirect to /")
    )
)]
pub async fn category(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    jar: CookieJar,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let category = match parse_id(&id) {
        Some(id) => state.repo.get_category(id).await?,
        None => None,
    };
    let Some(category) = category else {
        return Ok(flash::redirect(jar, "/", Flash::danger("Category not found.")));
    };

    let posts = state.repo.list_published_in_category(category.id).await?;
    let (jar, layout) = page_layout(&state, user.as_ref(), jar).await?;

    let page = IndexPage {
        layout,
        posts,
        page: 1,
        total_pages: 1,
        category_name: Some(category.name),
    };
    Ok((jar, Json(page)).into_response())
}

// --- Post Detail & Comments ---

const POST_NOT_VISIBLE: &str = "Post not found or not yet approved.";

/// post_detail
///
/// [Public Route] A published post with its comments. Pending and missing posts
/// look the same from here.
#[utoipa::path(
    get,
    path = "/post/{id}",
    params(("id" = i64, Path, description = "Post id")),
    responses(
        (status = 200, description = "Post with comments, newest first", body = PostPage),
        (status = 303, description = "Missing or unpublished, redirect to /")
    )
)]
pub async fn post_detail(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    jar: CookieJar,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let post = match find_post(&state, &id).await? {
        Some(post) if post.status.is_publicly_visible() => post,
        _ => return Ok(flash::redirect(jar, "/", Flash::danger(POST_NOT_VISIBLE))),
    };

    let comments = state.repo.list_comments(post.id).await?;
    let (jar, layout) = page_layout(&state, user.as_ref(), jar).await?;

    Ok((
        jar,
        Json(PostPage {
            layout,
            post,
            comments,
        }),
    )
        .into_response())
}

/// add_comment
///
/// [Authenticated Route] Appends a comment to a published post.
#[utoipa::path(
    post,
    path = "/post/{id}",
    params(("id" = i64, Path, description = "Post id")),
    request_body(content = CommentForm, content_type = "application/x-www-form-urlencoded"),
    responses((status = 303, description = "Redirect back to the post, or to /login without a session"))
)]
pub async fn add_comment(
    State(state): State<AppState>,
    current: CurrentUser,
    jar: CookieJar,
    Path(id): Path<String>,
    Form(form): Form<CommentForm>,
) -> AppResult<Response> {
    let post = match find_post(&state, &id).await? {
        Some(post) if post.status.is_publicly_visible() => post,
        _ => return Ok(flash::redirect(jar, "/", Flash::danger(POST_NOT_VISIBLE))),
    };

    let Some(actor) = current.actor() else {
        return Ok(deny(jar, Denial::LoginRequired));
    };
    if let Err(denial) = policy::authorize(Some(&actor), Action::Comment) {
        return Ok(deny(jar, denial));
    }

    let back = format!("/post/{}", post.id);
    let body = form.comment.trim();
    if body.is_empty() {
        return Ok(flash::redirect(
            jar,
            &back,
            Flash::danger("Comment cannot be empty."),
        ));
    }

    let comment = state.repo.add_comment(post.id, actor.id, body).await?;
    tracing::info!(post_id = post.id, comment_id = comment.id, "Comment added");

    Ok(flash::redirect(jar, &back, Flash::success("Comment added.")))
}

// --- Authoring ---

/// create_post_page
///
/// [Authenticated Route] Context for the new-post form. Viewers are turned away.
#[utoipa::path(
    get,
    path = "/create",
    responses(
        (status = 200, description = "New post form context", body = Layout),
        (status = 303, description = "Not logged in or viewer role")
    )
)]
pub async fn create_post_page(
    State(state): State<AppState>,
    user: AuthUser,
    jar: CookieJar,
) -> AppResult<Response> {
    if let Err(denial) = policy::authorize(Some(&user.actor()), Action::CreatePost) {
        return Ok(deny(jar, denial));
    }
    let (jar, layout) = page_layout(&state, Some(&user.account), jar).await?;
    Ok((jar, Json(layout)).into_response())
}

/// create_post
///
/// [Authenticated Route] Submits a post into the moderation queue. It is stored
/// as `pending` and stays off every public page until an admin approves it.
#[utoipa::path(
    post,
    path = "/create",
    request_body(content = PostForm, content_type = "application/x-www-form-urlencoded"),
    responses((status = 303, description = "Redirect to / once queued, back to /create on invalid input"))
)]
pub async fn create_post(
    State(state): State<AppState>,
    user: AuthUser,
    jar: CookieJar,
    Form(form): Form<PostForm>,
) -> AppResult<Response> {
    // Refused before anything touches the store.
    if let Err(denial) = policy::authorize(Some(&user.actor()), Action::CreatePost) {
        return Ok(deny(jar, denial));
    }

    let title = form.title.trim();
    if title.is_empty() {
        return Ok(flash::redirect(
            jar,
            "/create",
            Flash::danger("Title is required."),
        ));
    }

    if let Some(category_id) = form.category_id {
        if state.repo.get_category(category_id).await?.is_none() {
            return Ok(flash::redirect(
                jar,
                "/create",
                Flash::danger("Selected category does not exist."),
            ));
        }
    }

    let post = state
        .repo
        .create_post(NewPost {
            title: title.to_string(),
            content: form.content,
            image_url: placeholder_image_url(),
            author: user.account.username.clone(),
            account_id: user.id(),
            category_id: form.category_id,
        })
        .await?;
    tracing::info!(post_id = post.id, author = %post.author, "Post submitted for approval");

    Ok(flash::redirect(
        jar,
        "/",
        Flash::success("Post submitted and awaiting approval."),
    ))
}

/// my_posts
///
/// [Authenticated Route] The caller's own posts in every status, newest first.
#[utoipa::path(
    get,
    path = "/my_posts",
    responses((status = 200, description = "Own posts", body = MyPostsPage))
)]
pub async fn my_posts(
    State(state): State<AppState>,
    user: AuthUser,
    jar: CookieJar,
) -> AppResult<Response> {
    let actor = user.actor();
    if let Err(denial) = policy::authorize(Some(&actor), Action::ViewOwnPosts) {
        return Ok(deny(jar, denial));
    }

    let posts = state.repo.list_posts_by_account(actor.id).await?;
    let can_delete = policy::authorize(Some(&actor), Action::DeleteOwnPosts).is_ok();
    let (jar, layout) = page_layout(&state, Some(&user.account), jar).await?;

    Ok((
        jar,
        Json(MyPostsPage {
            layout,
            posts,
            can_delete,
        }),
    )
        .into_response())
}

/// delete_my_posts
///
/// [Authenticated Route] Bulk delete from the "my posts" page. Only editors and
/// admins may; ids the caller does not own are skipped by the store query.
#[utoipa::path(
    post,
    path = "/my_posts",
    request_body(content = BulkDeleteForm, content_type = "application/x-www-form-urlencoded"),
    responses((status = 303, description = "Redirect to /my_posts"))
)]
pub async fn delete_my_posts(
    State(state): State<AppState>,
    user: AuthUser,
    jar: CookieJar,
    Form(form): Form<BulkDeleteForm>,
) -> AppResult<Response> {
    if let Err(denial) = policy::authorize(Some(&user.actor()), Action::DeleteOwnPosts) {
        return Ok(deny(jar, denial));
    }

    if form.post_ids.is_empty() {
        return Ok(flash::redirect(
            jar,
            "/my_posts",
            Flash::danger("No posts selected."),
        ));
    }

    let deleted = state
        .repo
        .delete_posts_owned_by(user.id(), &form.post_ids)
        .await?;
    tracing::info!(account_id = user.id(), deleted, "Bulk deleted own posts");

    Ok(flash::redirect(
        jar,
        "/my_posts",
        Flash::success(format!("Deleted {deleted} post(s).")),
    ))
}

/// edit_post_page
///
/// [Authenticated Route] The post being edited. Ownership is required for every
/// role, admins included.
#[utoipa::path(
    get,
    path = "/edit_post/{id}",
    params(("id" = i64, Path, description = "Post id")),
    responses(
        (status = 200, description = "Post to edit", body = EditPostPage),
        (status = 303, description = "Missing, not owned, or viewer role")
    )
)]
pub async fn edit_post_page(
    State(state): State<AppState>,
    user: AuthUser,
    jar: CookieJar,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let Some(post) = find_post(&state, &id).await? else {
        return Ok(flash::redirect(jar, "/", Flash::danger("Post not found.")));
    };

    let action = Action::EditPost {
        owner_id: post.account_id,
    };
    if let Err(denial) = policy::authorize(Some(&user.actor()), action) {
        return Ok(deny(jar, denial));
    }

    let (jar, layout) = page_layout(&state, Some(&user.account), jar).await?;
    Ok((jar, Json(EditPostPage { layout, post })).into_response())
}

/// edit_post
///
/// [Authenticated Route] Replaces title and content of an owned post. The
/// status is left as it is: a published post stays published.
#[utoipa::path(
    post,
    path = "/edit_post/{id}",
    params(("id" = i64, Path, description = "Post id")),
    request_body(content = EditPostForm, content_type = "application/x-www-form-urlencoded"),
    responses((status = 303, description = "Redirect to /my_posts on success"))
)]
pub async fn edit_post(
    State(state): State<AppState>,
    user: AuthUser,
    jar: CookieJar,
    Path(id): Path<String>,
    Form(form): Form<EditPostForm>,
) -> AppResult<Response> {
    let Some(post) = find_post(&state, &id).await? else {
        return Ok(flash::redirect(jar, "/", Flash::danger("Post not found.")));
    };

    let action = Action::EditPost {
        owner_id: post.account_id,
    };
    if let Err(denial) = policy::authorize(Some(&user.actor()), action) {
        return Ok(deny(jar, denial));
    }

    let title = form.title.trim();
    if title.is_empty() {
        return Ok(flash::redirect(
            jar,
            &format!("/edit_post/{}", post.id),
            Flash::danger("Title is required."),
        ));
    }

    // The owner id is repeated in the UPDATE so a concurrent ownership change
    // cannot slip through.
    let updated = state
        .repo
        .update_post(post.id, user.id(), title, &form.content)
        .await?;
    if updated.is_none() {
        return Ok(flash::redirect(jar, "/", Flash::danger("Post not found.")));
    }
    tracing::info!(post_id = post.id, "Post updated");

    Ok(flash::redirect(jar, "/my_posts", Flash::success("Post updated.")))
}

// --- Admin: Moderation ---

/// admin_panel
///
/// [Admin Route] Moderation panel: every post in any status, newest first.
#[utoipa::path(
    get,
    path = "/admin",
    responses(
        (status = 200, description = "All posts", body = AdminPostsPage),
        (status = 303, description = "Not an admin")
    )
)]
pub async fn admin_panel(
    State(state): State<AppState>,
    user: AuthUser,
    jar: CookieJar,
) -> AppResult<Response> {
    if let Err(denial) = policy::authorize(Some(&user.actor()), Action::Moderate) {
        return Ok(deny(jar, denial));
    }

    let posts = state.repo.list_all_posts().await?;
    let (jar, layout) = page_layout(&state, Some(&user.account), jar).await?;
    Ok((jar, Json(AdminPostsPage { layout, posts })).into_response())
}

/// moderate_post
///
/// [Admin Route] `approve` moves a pending post to published; `delete` removes
/// a post in any status together with its comments.
#[utoipa::path(
    get,
    path = "/admin/update/{id}/{action}",
    params(
        ("id" = i64, Path, description = "Post id"),
        ("action" = String, Path, description = "approve | delete")
    ),
    responses((status = 303, description = "Redirect to /admin"))
)]
pub async fn moderate_post(
    State(state): State<AppState>,
    user: AuthUser,
    jar: CookieJar,
    Path((id, action)): Path<(String, String)>,
) -> AppResult<Response> {
    if let Err(denial) = policy::authorize(Some(&user.actor()), Action::Moderate) {
        return Ok(deny(jar, denial));
    }

    let action = match action.parse::<ModerationAction>() {
        Ok(action) => action,
        Err(message) => return Ok(flash::redirect(jar, "/admin", Flash::danger(message))),
    };

    match action {
        ModerationAction::Approve => {
            let Some(post) = find_post(&state, &id).await? else {
                return Ok(flash::redirect(jar, "/admin", Flash::danger("Post not found.")));
            };

            let next = match post.status.approve() {
                Ok(next) => next,
                Err(e) => return Ok(flash::redirect(jar, "/admin", Flash::danger(e.to_string()))),
            };

            // Compare-and-set: a concurrent approval leaves nothing to transition.
            let transitioned = state
                .repo
                .transition_post(post.id, PostStatus::Pending, next)
                .await?;
            if transitioned.is_none() {
                return Ok(flash::redirect(
                    jar,
                    "/admin",
                    Flash::danger("Post is already published."),
                ));
            }

            tracing::info!(post_id = post.id, admin = %user.account.username, "Post approved");
            Ok(flash::redirect(jar, "/admin", Flash::success("Post approved.")))
        }
        ModerationAction::Delete => {
            let deleted = match parse_id(&id) {
                Some(id) => state.repo.delete_post(id).await?,
                None => false,
            };
            if !deleted {
                return Ok(flash::redirect(jar, "/admin", Flash::danger("Post not found.")));
            }

            tracing::info!(post_id = %id, admin = %user.account.username, "Post deleted");
            Ok(flash::redirect(jar, "/admin", Flash::success("Post deleted.")))
        }
    }
}

// --- Admin: Accounts ---

const USER_NOT_FOUND: &str = "User not found.";

/// admin_users
///
/// [Admin Route] Every account with role and block status.
#[utoipa::path(
    get,
    path = "/admin/users",
    responses(
        (status = 200, description = "All accounts", body = AdminUsersPage),
        (status = 303, description = "Not an admin")
    )
)]
pub async fn admin_users(
    State(state): State<AppState>,
    user: AuthUser,
    jar: CookieJar,
) -> AppResult<Response> {
    if let Err(denial) = policy::authorize(Some(&user.actor()), Action::ListUsers) {
        return Ok(deny(jar, denial));
    }

    let users = state
        .repo
        .list_accounts()
        .await?
        .iter()
        .map(AccountSummary::from)
        .collect();
    let (jar, layout) = page_layout(&state, Some(&user.account), jar).await?;
    Ok((jar, Json(AdminUsersPage { layout, users })).into_response())
}

/// reset_password
///
/// [Admin Route] Sets the account's password to the configured fallback value
/// and tells the admin what it is. The user is expected to change it.
#[utoipa::path(
    get,
    path = "/admin/reset_password/{username}",
    params(("username" = String, Path, description = "Target account")),
    responses((status = 303, description = "Redirect to /admin/users"))
)]
pub async fn reset_password(
    State(state): State<AppState>,
    user: AuthUser,
    jar: CookieJar,
    Path(username): Path<String>,
) -> AppResult<Response> {
    if let Err(denial) = policy::authorize(Some(&user.actor()), Action::ResetPassword) {
        return Ok(deny(jar, denial));
    }

    let Some(target) = state.repo.find_account_by_username(&username).await? else {
        return Ok(flash::redirect(jar, "/admin/users", Flash::danger(USER_NOT_FOUND)));
    };

    let fallback = &state.config.reset_password;
    let password_hash = auth::hash_password(fallback)?;
    state.repo.set_password_hash(target.id, &password_hash).await?;
    tracing::info!(username = %target.username, admin = %user.account.username, "Password reset");

    Ok(flash::redirect(
        jar,
        "/admin/users",
        Flash::success(format!(
            "Password for {} has been reset to '{}'.",
            target.username, fallback
        )),
    ))
}

/// block_user
///
/// [Admin Route] `block` stores the reason (shown to the user at login),
/// `unblock` clears it. Existing sessions are not revoked.
#[utoipa::path(
    get,
    path = "/admin/block_user/{username}/{action}",
    params(
        ("username" = String, Path, description = "Target account"),
        ("action" = String, Path, description = "block | unblock"),
        BlockQuery
    ),
    responses((status = 303, description = "Redirect to /admin/users"))
)]
pub async fn block_user(
    State(state): State<AppState>,
    user: AuthUser,
    jar: CookieJar,
    Path((username, action)): Path<(String, String)>,
    Query(query): Query<BlockQuery>,
) -> AppResult<Response> {
    if let Err(denial) = policy::authorize(Some(&user.actor()), Action::BlockUser) {
        return Ok(deny(jar, denial));
    }

    let blocked = match action.as_str() {
        "block" => true,
        "unblock" => false,
        other => {
            return Ok(flash::redirect(
                jar,
                "/admin/users",
                Flash::danger(format!("Unknown action '{other}'.")),
            ));
        }
    };

    let Some(target) = state.repo.find_account_by_username(&username).await? else {
        return Ok(flash::redirect(jar, "/admin/users", Flash::danger(USER_NOT_FOUND)));
    };

    if blocked && target.id == user.id() {
        return Ok(flash::redirect(
            jar,
            "/admin/users",
            Flash::danger("You cannot block your own account."),
        ));
    }

    // The default applies only when no reason was sent at all.
    let reason = if blocked {
        query.reason.as_deref().unwrap_or(NO_REASON_GIVEN)
    } else {
        ""
    };

    state.repo.set_blocked(target.id, blocked, reason).await?;
    tracing::info!(
        username = %target.username,
        blocked,
        reason,
        admin = %user.account.username,
        "Block status changed"
    );

    let message = if blocked {
        format!("User {} has been blocked.", target.username)
    } else {
        format!("User {} has been unblocked.", target.username)
    };
    Ok(flash::redirect(jar, "/admin/users", Flash::success(message)))
}

/// edit_role_page
///
/// [Admin Route] The target account and the roles it may be given.
#[utoipa::path(
    get,
    path = "/admin/edit_role/{username}",
    params(("username" = String, Path, description = "Target account")),
    responses(
        (status = 200, description = "Role edit context", body = EditRolePage),
        (status = 303, description = "Not an admin or unknown user")
    )
)]
pub async fn edit_role_page(
    State(state): State<AppState>,
    user: AuthUser,
    jar: CookieJar,
    Path(username): Path<String>,
) -> AppResult<Response> {
    if let Err(denial) = policy::authorize(Some(&user.actor()), Action::EditRole) {
        return Ok(deny(jar, denial));
    }

    let Some(target) = state.repo.find_account_by_username(&username).await? else {
        return Ok(flash::redirect(jar, "/admin/users", Flash::danger(USER_NOT_FOUND)));
    };

    let (jar, layout) = page_layout(&state, Some(&user.account), jar).await?;
    let page = EditRolePage {
        layout,
        target_user: AccountSummary::from(&target),
        roles: Role::ALL.to_vec(),
    };
    Ok((jar, Json(page)).into_response())
}

/// edit_role
///
/// [Admin Route] Reassigns the role. Only the four known role names are accepted.
#[utoipa::path(
    post,
    path = "/admin/edit_role/{username}",
    params(("username" = String, Path, description = "Target account")),
    request_body(content = RoleForm, content_type = "application/x-www-form-urlencoded"),
    responses((status = 303, description = "Redirect to /admin/users on success"))
)]
pub async fn edit_role(
    State(state): State<AppState>,
    user: AuthUser,
    jar: CookieJar,
    Path(username): Path<String>,
    Form(form): Form<RoleForm>,
) -> AppResult<Response> {
    if let Err(denial) = policy::authorize(Some(&user.actor()), Action::EditRole) {
        return Ok(deny(jar, denial));
    }

    let Some(target) = state.repo.find_account_by_username(&username).await? else {
        return Ok(flash::redirect(jar, "/admin/users", Flash::danger(USER_NOT_FOUND)));
    };

    let role = match form.role.parse::<Role>() {
        Ok(role) => role,
        Err(e) => {
            return Ok(flash::redirect(
                jar,
                &format!("/admin/edit_role/{}", target.username),
                Flash::danger(e.to_string()),
            ));
        }
    };

    state.repo.set_role(target.id, role).await?;
    tracing::info!(
        username = %target.username,
        from = %target.role,
        to = %role,
        admin = %user.account.username,
        "Role changed"
    );

    Ok(flash::redirect(
        jar,
        "/admin/users",
        Flash::success(format!("Role for {} updated to {}.", target.username, role)),
    ))
}

/// delete_user
///
/// [Admin Route] Removes an account with its sessions, its posts and the
/// comments on those posts, in one transaction. Comments the account left on
/// other posts stay, with no author.
#[utoipa::path(
    get,
    path = "/admin/delete_user/{username}",
    params(("username" = String, Path, description = "Target account")),
    responses((status = 303, description = "Redirect to /admin/users"))
)]
pub async fn delete_user(
    State(state): State<AppState>,
    user: AuthUser,
    jar: CookieJar,
    Path(username): Path<String>,
) -> AppResult<Response> {
    if let Err(denial) = policy::authorize(Some(&user.actor()), Action::DeleteUser) {
        return Ok(deny(jar, denial));
    }

    let Some(target) = state.repo.find_account_by_username(&username).await? else {
        return Ok(flash::redirect(jar, "/admin/users", Flash::danger(USER_NOT_FOUND)));
    };

    if target.id == user.id() {
        return Ok(flash::redirect(
            jar,
            "/admin/users",
            Flash::danger("You cannot delete your own account."),
        ));
    }

    state.repo.delete_account(target.id).await?;
    tracing::info!(username = %target.username, admin = %user.account.username, "Account deleted");

    Ok(flash::redirect(
        jar,
        "/admin/users",
        Flash::success(format!("User {} deleted.", target.username)),
    ))
}

// --- Admin: Categories ---

/// admin_categories
///
/// [Admin Route] Category management page; the list itself is in the layout.
#[utoipa::path(
    get,
    path = "/admin/categories",
    responses(
        (status = 200, description = "Category management context", body = Layout),
        (status = 303, description = "Not an admin")
    )
)]
pub async fn admin_categories(
    State(state): State<AppState>,
    user: AuthUser,
    jar: CookieJar,
) -> AppResult<Response> {
    if let Err(denial) = policy::authorize(Some(&user.actor()), Action::ManageCategories) {
        return Ok(deny(jar, denial));
    }

    let (jar, layout) = page_layout(&state, Some(&user.account), jar).await?;
    Ok((jar, Json(layout)).into_response())
}

/// create_category
///
/// [Admin Route] Adds a category. Names are unique; the store's constraint decides.
#[utoipa::path(
    post,
    path = "/admin/categories",
    request_body(content = CategoryForm, content_type = "application/x-www-form-urlencoded"),
    responses((status = 303, description = "Redirect to /admin/categories"))
)]
pub async fn create_category(
    State(state): State<AppState>,
    user: AuthUser,
    jar: CookieJar,
    Form(form): Form<CategoryForm>,
) -> AppResult<Response> {
    if let Err(denial) = policy::authorize(Some(&user.actor()), Action::ManageCategories) {
        return Ok(deny(jar, denial));
    }

    let name = form.cat_name.trim();
    if name.is_empty() {
        return Ok(flash::redirect(
            jar,
            "/admin/categories",
            Flash::danger("Category name is required."),
        ));
    }

    let Some(category) = state.repo.create_category(name).await? else {
        return Ok(flash::redirect(
            jar,
            "/admin/categories",
            Flash::danger("Category already exists."),
        ));
    };
    tracing::info!(category_id = category.id, name = %category.name, "Category created");

    Ok(flash::redirect(
        jar,
        "/admin/categories",
        Flash::success("Category created."),
    ))
}

/// delete_category
///
/// [Admin Route] Removes a category. Its posts stay, uncategorised.
#[utoipa::path(
    get,
    path = "/admin/categories/delete/{id}",
    params(("id" = i64, Path, description = "Category id")),
    responses((status = 303, description = "Redirect to /admin/categories"))
)]
pub async fn delete_category(
    State(state): State<AppState>,
    user: AuthUser,
    jar: CookieJar,
    Path(id): Path<String>,
) -> AppResult<Response> {
    if let Err(denial) = policy::authorize(Some(&user.actor()), Action::ManageCategories) {
        return Ok(deny(jar, denial));
    }

    let deleted = match parse_id(&id) {
        Some(id) => state.repo.delete_category(id).await?,
        None => false,
    };
    if !deleted {
        return Ok(flash::redirect(
            jar,
            "/admin/categories",
            Flash::danger("Category not found."),
        ));
    }
    tracing::info!(category_id = %id, "Category deleted");

    Ok(flash::redirect(
        jar,
        "/admin/categories",
        Flash::success("Category deleted."),
    ))
}
