#![allow(dead_code)]

use blog_portal::{
    AppConfig, AppState, auth, create_router,
    lifecycle::PostStatus,
    models::{Account, NewPost, Post, Role},
    repository::{Repository, RepositoryState, SqliteRepository},
    seed_defaults,
};
use reqwest::{Client, Response, StatusCode, header::LOCATION, redirect};
use serde_json::Value;
use std::sync::Arc;
use tokio::net::TcpListener;

pub const ADMIN_PASSWORD: &str = "admin";

pub struct TestApp {
    pub address: String,
    pub repo: RepositoryState,
    pub config: AppConfig,
}

/// In-memory database, migrated and seeded, served on an ephemeral port.
pub async fn spawn_app() -> TestApp {
    spawn_app_with(AppConfig::default()).await
}

pub async fn spawn_app_with(config: AppConfig) -> TestApp {
    let repo = test_repository().await;
    seed_defaults(repo.as_ref(), &config)
        .await
        .expect("Failed to seed test database");

    let state = AppState {
        repo: repo.clone(),
        config: config.clone(),
    };
    let router = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp {
        address,
        repo,
        config,
    }
}

pub async fn test_repository() -> RepositoryState {
    let repo = SqliteRepository::connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory database");
    repo.migrate().await.expect("Failed to run migrations");
    Arc::new(repo) as RepositoryState
}

/// One browser: its own cookie jar, redirects left for the test to inspect.
pub fn browser() -> Client {
    Client::builder()
        .cookie_store(true)
        .redirect(redirect::Policy::none())
        .build()
        .unwrap()
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn get(&self, client: &Client, path: &str) -> Response {
        client.get(self.url(path)).send().await.unwrap()
    }

    pub async fn post_form(&self, client: &Client, path: &str, form: &[(&str, &str)]) -> Response {
        client.post(self.url(path)).form(form).send().await.unwrap()
    }

    /// Follows a `303` to its target and returns that page's JSON.
    pub async fn follow(&self, client: &Client, response: Response) -> Value {
        let mut response = response;
        for _ in 0..5 {
            if response.status() != StatusCode::SEE_OTHER {
                break;
            }
            let to = location(&response);
            response = self.get(client, &to).await;
        }
        assert_eq!(response.status(), StatusCode::OK);
        response.json().await.unwrap()
    }

    pub async fn register(&self, client: &Client, username: &str, password: &str, role: &str) -> Response {
        self.post_form(
            client,
            "/register",
            &[
                ("username", username),
                ("password", password),
                ("confirm_password", password),
                ("role", role),
            ],
        )
        .await
    }

    pub async fn login(&self, client: &Client, username: &str, password: &str) -> Response {
        self.post_form(
            client,
            "/login",
            &[("username", username), ("password", password)],
        )
        .await
    }

    /// A fresh browser registered and logged in with `role`.
    pub async fn logged_in(&self, username: &str, password: &str, role: &str) -> Client {
        let client = browser();
        let response = self.register(&client, username, password, role).await;
        assert_eq!(location(&response), "/login");
        let response = self.login(&client, username, password).await;
        assert_eq!(location(&response), "/");
        client
    }

    pub async fn admin(&self) -> Client {
        let client = browser();
        let response = self.login(&client, "admin", &self.config.admin_password).await;
        assert_eq!(location(&response), "/");
        client
    }

    /// Stores an account directly, skipping the HTTP flow.
    pub async fn account(&self, username: &str, role: Role) -> Account {
        let hash = auth::hash_password("pw").unwrap();
        self.repo
            .create_account(username, &hash, role)
            .await
            .unwrap()
            .expect("username already taken")
    }

    pub async fn published_post(&self, owner: &Account, title: &str) -> Post {
        let post = self.pending_post(owner, title).await;
        self.repo
            .transition_post(post.id, PostStatus::Pending, PostStatus::Published)
            .await
            .unwrap()
            .unwrap()
    }

    pub async fn pending_post(&self, owner: &Account, title: &str) -> Post {
        self.repo
            .create_post(new_post(owner, title, None))
            .await
            .unwrap()
    }
}

pub fn new_post(owner: &Account, title: &str, category_id: Option<i64>) -> NewPost {
    NewPost {
        title: title.to_string(),
        content: format!("{title} body"),
        image_url: "https://picsum.photos/300/200?random=1".to_string(),
        author: owner.username.clone(),
        account_id: owner.id,
        category_id,
    }
}

pub fn location(response: &Response) -> String {
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    response.headers()[LOCATION].to_str().unwrap().to_string()
}

/// The flash message of a page, whether it is a bare layout or nests one.
pub fn flash_message(page: &Value) -> Option<String> {
    let layout = page.get("layout").unwrap_or(page);
    layout["flash"]["message"].as_str().map(str::to_string)
}

pub fn post_ids(page: &Value) -> Vec<i64> {
    page["posts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|post| post["id"].as_i64().unwrap())
        .collect()
}
