use async_trait::async_trait;
use axum::{
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::Response,
};
use axum_extra::extract::{CookieJar, Form, cookie::Cookie};
use blog_portal::{
    AppState,
    auth::AuthUser,
    config::AppConfig,
    handlers,
    lifecycle::PostStatus,
    models::{
        Account, BlockQuery, BulkDeleteForm, Category, Comment, EditPostForm, NewPost, Post,
        PostForm, Role,
    },
    repository::Repository,
};
use chrono::Utc;
use std::sync::{Arc, Mutex};

// --- MOCK REPOSITORY IMPLEMENTATION ---

// Handlers only see the `Repository` trait, so a scripted implementation
// isolates their decision logic from SQLite.
#[derive(Default)]
pub struct MockRepoControl {
    // Pre-canned outputs
    pub post_to_return: Option<Post>,
    pub transition_result: Option<Post>,
    pub account_to_return: Option<Account>,
    pub fail_store: bool,

    // Mutating calls the handler made, in order.
    pub recorded: Mutex<Vec<String>>,
}

impl MockRepoControl {
    fn record(&self, call: impl Into<String>) {
        self.recorded.lock().unwrap().push(call.into());
    }

    fn calls(&self) -> Vec<String> {
        self.recorded.lock().unwrap().clone()
    }
}

#[async_trait]
impl Repository for MockRepoControl {
    async fn create_account(
        &self,
        username: &str,
        _password_hash: &str,
        role: Role,
    ) -> Result<Option<Account>, sqlx::Error> {
        self.record(format!("create_account:{username}"));
        Ok(Some(account(2, username, role)))
    }
    async fn get_account(&self, _id: i64) -> Result<Option<Account>, sqlx::Error> {
        Ok(self.account_to_return.clone())
    }
    async fn find_account_by_username(
        &self,
        _username: &str,
    ) -> Result<Option<Account>, sqlx::Error> {
        Ok(self.account_to_return.clone())
    }
    async fn list_accounts(&self) -> Result<Vec<Account>, sqlx::Error> {
        Ok(self.account_to_return.clone().into_iter().collect())
    }
    async fn count_accounts(&self) -> Result<i64, sqlx::Error> {
        Ok(0)
    }
    async fn set_role(&self, id: i64, role: Role) -> Result<bool, sqlx::Error> {
        self.record(format!("set_role:{id}:{role}"));
        Ok(true)
    }
    async fn set_password_hash(&self, id: i64, _password_hash: &str) -> Result<bool, sqlx::Error> {
        self.record(format!("set_password_hash:{id}"));
        Ok(true)
    }
    async fn set_blocked(&self, id: i64, blocked: bool, reason: &str) -> Result<bool, sqlx::Error> {
        self.record(format!("set_blocked:{id}:{blocked}:{reason}"));
        Ok(true)
    }
    async fn delete_account(&self, id: i64) -> Result<bool, sqlx::Error> {
        self.record(format!("delete_account:{id}"));
        Ok(true)
    }
    async fn create_session(&self, _token: &str, account_id: i64) -> Result<(), sqlx::Error> {
        self.record(format!("create_session:{account_id}"));
        Ok(())
    }
    async fn resolve_session(&self, _token: &str) -> Result<Option<Account>, sqlx::Error> {
        Ok(None)
    }
    async fn delete_session(&self, _token: &str) -> Result<(), sqlx::Error> {
        self.record("delete_session");
        Ok(())
    }
    async fn list_categories(&self) -> Result<Vec<Category>, sqlx::Error> {
        if self.fail_store {
            return Err(sqlx::Error::PoolTimedOut);
        }
        Ok(vec![])
    }
    async fn get_category(&self, _id: i64) -> Result<Option<Category>, sqlx::Error> {
        Ok(None)
    }
    async fn create_category(&self, name: &str) -> Result<Option<Category>, sqlx::Error> {
        self.record(format!("create_category:{name}"));
        Ok(Some(Category {
            id: 1,
            name: name.to_string(),
        }))
    }
    async fn delete_category(&self, id: i64) -> Result<bool, sqlx::Error> {
        self.record(format!("delete_category:{id}"));
        Ok(true)
    }
    async fn create_post(&self, post: NewPost) -> Result<Post, sqlx::Error> {
        self.record(format!("create_post:{}", post.title));
        Ok(Post {
            id: 1,
            title: post.title,
            content: post.content,
            image_url: post.image_url,
            author: post.author,
            created_at: Utc::now(),
            status: PostStatus::Pending,
            account_id: post.account_id,
            category_id: post.category_id,
        })
    }
    async fn get_post(&self, _id: i64) -> Result<Option<Post>, sqlx::Error> {
        Ok(self.post_to_return.clone())
    }
    async fn count_posts(&self) -> Result<i64, sqlx::Error> {
        Ok(0)
    }
    async fn count_published_posts(&self) -> Result<i64, sqlx::Error> {
        if self.fail_store {
            return Err(sqlx::Error::PoolTimedOut);
        }
        Ok(0)
    }
    async fn list_published_posts(&self, _offset: i64, _limit: i64) -> Result<Vec<Post>, sqlx::Error> {
        Ok(vec![])
    }
    async fn list_published_in_category(&self, _category_id: i64) -> Result<Vec<Post>, sqlx::Error> {
        Ok(vec![])
    }
    async fn list_posts_by_account(&self, _account_id: i64) -> Result<Vec<Post>, sqlx::Error> {
        Ok(vec![])
    }
    async fn list_all_posts(&self) -> Result<Vec<Post>, sqlx::Error> {
        Ok(vec![])
    }
    async fn update_post(
        &self,
        id: i64,
        account_id: i64,
        _title: &str,
        _content: &str,
    ) -> Result<Option<Post>, sqlx::Error> {
        self.record(format!("update_post:{id}:{account_id}"));
        Ok(self.post_to_return.clone())
    }
    async fn transition_post(
        &self,
        id: i64,
        from: PostStatus,
        to: PostStatus,
    ) -> Result<Option<Post>, sqlx::Error> {
        self.record(format!("transition_post:{id}:{from}:{to}"));
        Ok(self.transition_result.clone())
    }
    async fn delete_post(&self, id: i64) -> Result<bool, sqlx::Error> {
        self.record(format!("delete_post:{id}"));
        Ok(true)
    }
    async fn delete_posts_owned_by(&self, account_id: i64, ids: &[i64]) -> Result<u64, sqlx::Error> {
        self.record(format!("delete_posts_owned_by:{account_id}:{ids:?}"));
        Ok(ids.len() as u64)
    }
    async fn add_comment(
        &self,
        _post_id: i64,
        _account_id: i64,
        _content: &str,
    ) -> Result<Comment, sqlx::Error> {
        Err(sqlx::Error::RowNotFound)
    }
    async fn list_comments(&self, _post_id: i64) -> Result<Vec<Comment>, sqlx::Error> {
        Ok(vec![])
    }
    async fn count_comments(&self) -> Result<i64, sqlx::Error> {
        Ok(0)
    }
}

// --- Helpers ---

fn account(id: i64, username: &str, role: Role) -> Account {
    Account {
        id,
        username: username.to_string(),
        password_hash: "$argon2id$placeholder".to_string(),
        role,
        blocked: false,
        block_reason: String::new(),
        created_at: Utc::now(),
    }
}

fn post(id: i64, owner_id: i64, status: PostStatus) -> Post {
    Post {
        id,
        title: "Hello".to_string(),
        content: "World".to_string(),
        image_url: "https://picsum.photos/300/200?random=1".to_string(),
        author: "alice".to_string(),
        created_at: Utc::now(),
        status,
        account_id: owner_id,
        category_id: None,
    }
}

fn user(id: i64, role: Role) -> AuthUser {
    AuthUser {
        account: account(id, "tester", role),
    }
}

fn create_test_state(mock: MockRepoControl) -> (AppState, Arc<MockRepoControl>) {
    let mock = Arc::new(mock);
    let state = AppState {
        repo: mock.clone(),
        config: AppConfig::default(),
    };
    (state, mock)
}

fn location(response: &Response) -> &str {
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    response.headers()[header::LOCATION].to_str().unwrap()
}

/// Decoded flash cookie set by the response, as `level:message`.
fn flash(response: &Response) -> String {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| Cookie::parse_encoded(value.to_str().ok()?.to_string()).ok())
        .find(|cookie| cookie.name() == "flash")
        .map(|cookie| cookie.value().to_string())
        .expect("response carries a flash cookie")
}

// --- Authoring ---

#[tokio::test]
async fn test_viewer_create_never_reaches_store() {
    let (state, mock) = create_test_state(MockRepoControl::default());
    let form = PostForm {
        title: "Hello".to_string(),
        content: "World".to_string(),
        category_id: None,
    };

    let response = handlers::create_post(State(state), user(1, Role::Viewer), CookieJar::new(), Form(form))
        .await
        .unwrap();

    assert_eq!(location(&response), "/");
    assert_eq!(
        flash(&response),
        "danger:Viewers can read posts but cannot create them."
    );
    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn test_collaborator_create_stores_post() {
    let (state, mock) = create_test_state(MockRepoControl::default());
    let form = PostForm {
        title: "  Hello  ".to_string(),
        content: "World".to_string(),
        category_id: None,
    };

    let response = handlers::create_post(
        State(state),
        user(1, Role::Collaborator),
        CookieJar::new(),
        Form(form),
    )
    .await
    .unwrap();

    assert_eq!(location(&response), "/");
    assert_eq!(mock.calls(), ["create_post:Hello"]);
}

#[tokio::test]
async fn test_edit_by_non_owner_is_refused_before_update() {
    let (state, mock) = create_test_state(MockRepoControl {
        post_to_return: Some(post(10, 1, PostStatus::Published)),
        ..MockRepoControl::default()
    });
    let form = EditPostForm {
        title: "Hacked".to_string(),
        content: "x".to_string(),
    };

    let response = handlers::edit_post(
        State(state),
        user(2, Role::Admin),
        CookieJar::new(),
        Path("10".to_string()),
        Form(form),
    )
    .await
    .unwrap();

    assert_eq!(location(&response), "/");
    assert_eq!(flash(&response), "danger:You cannot edit this post.");
    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn test_owner_edit_passes_owner_to_store() {
    let (state, mock) = create_test_state(MockRepoControl {
        post_to_return: Some(post(10, 1, PostStatus::Pending)),
        ..MockRepoControl::default()
    });
    let form = EditPostForm {
        title: "Better".to_string(),
        content: "x".to_string(),
    };

    let response = handlers::edit_post(
        State(state),
        user(1, Role::Collaborator),
        CookieJar::new(),
        Path("10".to_string()),
        Form(form),
    )
    .await
    .unwrap();

    assert_eq!(location(&response), "/my_posts");
    assert_eq!(mock.calls(), ["update_post:10:1"]);
}

#[tokio::test]
async fn test_empty_bulk_selection_is_a_no_op() {
    let (state, mock) = create_test_state(MockRepoControl::default());

    let response = handlers::delete_my_posts(
        State(state),
        user(1, Role::Editor),
        CookieJar::new(),
        Form(BulkDeleteForm::default()),
    )
    .await
    .unwrap();

    assert_eq!(location(&response), "/my_posts");
    assert_eq!(flash(&response), "danger:No posts selected.");
    assert!(mock.calls().is_empty());
}

// --- Moderation ---

#[tokio::test]
async fn test_approving_published_post_is_a_state_error() {
    let (state, mock) = create_test_state(MockRepoControl {
        post_to_return: Some(post(10, 1, PostStatus::Published)),
        ..MockRepoControl::default()
    });

    let response = handlers::moderate_post(
        State(state),
        user(99, Role::Admin),
        CookieJar::new(),
        Path(("10".to_string(), "approve".to_string())),
    )
    .await
    .unwrap();

    assert_eq!(location(&response), "/admin");
    assert_eq!(flash(&response), "danger:Post is already published.");
    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn test_lost_approval_race_reports_already_published() {
    // The row was pending when read but another admin got there first.
    let (state, mock) = create_test_state(MockRepoControl {
        post_to_return: Some(post(10, 1, PostStatus::Pending)),
        transition_result: None,
        ..MockRepoControl::default()
    });

    let response = handlers::moderate_post(
        State(state),
        user(99, Role::Admin),
        CookieJar::new(),
        Path(("10".to_string(), "approve".to_string())),
    )
    .await
    .unwrap();

    assert_eq!(flash(&response), "danger:Post is already published.");
    assert_eq!(mock.calls(), ["transition_post:10:pending:published"]);
}

#[tokio::test]
async fn test_editor_cannot_moderate() {
    let (state, mock) = create_test_state(MockRepoControl {
        post_to_return: Some(post(10, 1, PostStatus::Pending)),
        ..MockRepoControl::default()
    });

    let response = handlers::moderate_post(
        State(state),
        user(2, Role::Editor),
        CookieJar::new(),
        Path(("10".to_string(), "delete".to_string())),
    )
    .await
    .unwrap();

    assert_eq!(location(&response), "/");
    assert_eq!(
        flash(&response),
        "danger:You do not have permission to perform this action."
    );
    assert!(mock.calls().is_empty());
}

// --- Accounts ---

#[tokio::test]
async fn test_admin_cannot_block_self() {
    let (state, mock) = create_test_state(MockRepoControl {
        account_to_return: Some(account(99, "admin", Role::Admin)),
        ..MockRepoControl::default()
    });

    let response = handlers::block_user(
        State(state),
        user(99, Role::Admin),
        CookieJar::new(),
        Path(("admin".to_string(), "block".to_string())),
        Query(BlockQuery { reason: None }),
    )
    .await
    .unwrap();

    assert_eq!(location(&response), "/admin/users");
    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn test_missing_block_reason_falls_back_to_default() {
    let (state, mock) = create_test_state(MockRepoControl {
        account_to_return: Some(account(5, "erin", Role::Viewer)),
        ..MockRepoControl::default()
    });

    handlers::block_user(
        State(state),
        user(99, Role::Admin),
        CookieJar::new(),
        Path(("erin".to_string(), "block".to_string())),
        Query(BlockQuery { reason: None }),
    )
    .await
    .unwrap();

    assert_eq!(mock.calls(), ["set_blocked:5:true:No reason given"]);
}

#[tokio::test]
async fn test_block_reason_is_stored_verbatim() {
    let (state, mock) = create_test_state(MockRepoControl {
        account_to_return: Some(account(5, "erin", Role::Viewer)),
        ..MockRepoControl::default()
    });

    handlers::block_user(
        State(state),
        user(99, Role::Admin),
        CookieJar::new(),
        Path(("erin".to_string(), "block".to_string())),
        Query(BlockQuery {
            reason: Some("  spam ".to_string()),
        }),
    )
    .await
    .unwrap();

    assert_eq!(mock.calls(), ["set_blocked:5:true:  spam "]);
}

#[tokio::test]
async fn test_unparsable_post_id_is_not_found() {
    let (state, mock) = create_test_state(MockRepoControl::default());

    let response = handlers::moderate_post(
        State(state),
        user(99, Role::Admin),
        CookieJar::new(),
        Path(("abc".to_string(), "delete".to_string())),
    )
    .await
    .unwrap();

    assert_eq!(location(&response), "/admin");
    assert_eq!(flash(&response), "danger:Post not found.");
    assert!(mock.calls().is_empty());
}

// --- Store Failures ---

#[tokio::test]
async fn test_store_failure_is_a_generic_500() {
    let (state, _mock) = create_test_state(MockRepoControl {
        fail_store: true,
        ..MockRepoControl::default()
    });

    let result = handlers::index(
        State(state),
        blog_portal::auth::CurrentUser(None),
        CookieJar::new(),
    )
    .await;

    let Err(err) = result else {
        panic!("store failure must propagate");
    };
    let response = axum::response::IntoResponse::into_response(err);
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"Internal server error");
}
