use crate::models::{Account, Category, Comment, NewPost, Post, Role};
use crate::lifecycle::PostStatus;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{
    QueryBuilder, Sqlite, SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::{str::FromStr, sync::Arc};

/// Repository Trait
///
/// Defines the abstract contract for all persistence operations. Handlers only
/// see this trait, so tests and alternative stores can stand in for SQLite.
///
/// Every method reports store failures as `sqlx::Error`; uniqueness conflicts
/// are not failures and come back as `Ok(None)` from the create methods.
///
/// **Send + Sync + async_trait** are required to make the trait object
/// (`Arc<dyn Repository>`) shareable across Axum's task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Accounts ---
    /// `None` when the username is already taken.
    async fn create_account(
        &self,
        username: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<Option<Account>, sqlx::Error>;
    async fn get_account(&self, id: i64) -> Result<Option<Account>, sqlx::Error>;
    // Exact, case-sensitive match.
    async fn find_account_by_username(&self, username: &str)
    -> Result<Option<Account>, sqlx::Error>;
    async fn list_accounts(&self) -> Result<Vec<Account>, sqlx::Error>;
    async fn count_accounts(&self) -> Result<i64, sqlx::Error>;
    async fn set_role(&self, id: i64, role: Role) -> Result<bool, sqlx::Error>;
    async fn set_password_hash(&self, id: i64, password_hash: &str) -> Result<bool, sqlx::Error>;
    async fn set_blocked(&self, id: i64, blocked: bool, reason: &str)
    -> Result<bool, sqlx::Error>;
    /// Removes the account with its sessions, its posts and the comments on
    /// those posts. Comments it wrote elsewhere stay behind.
    async fn delete_account(&self, id: i64) -> Result<bool, sqlx::Error>;

    // --- Sessions ---
    async fn create_session(&self, token: &str, account_id: i64) -> Result<(), sqlx::Error>;
    async fn resolve_session(&self, token: &str) -> Result<Option<Account>, sqlx::Error>;
    async fn delete_session(&self, token: &str) -> Result<(), sqlx::Error>;

    // --- Categories ---
    async fn list_categories(&self) -> Result<Vec<Category>, sqlx::Error>;
    async fn get_category(&self, id: i64) -> Result<Option<Category>, sqlx::Error>;
    /// `None` when a category with this name already exists.
    async fn create_category(&self, name: &str) -> Result<Option<Category>, sqlx::Error>;
    async fn delete_category(&self, id: i64) -> Result<bool, sqlx::Error>;

    // --- Posts ---
    async fn create_post(&self, post: NewPost) -> Result<Post, sqlx::Error>;
    async fn get_post(&self, id: i64) -> Result<Option<Post>, sqlx::Error>;
    async fn count_posts(&self) -> Result<i64, sqlx::Error>;
    async fn count_published_posts(&self) -> Result<i64, sqlx::Error>;
    // Public listing window, newest (highest id) first.
    async fn list_published_posts(&self, offset: i64, limit: i64)
    -> Result<Vec<Post>, sqlx::Error>;
    async fn list_published_in_category(&self, category_id: i64)
    -> Result<Vec<Post>, sqlx::Error>;
    // Any status, newest first.
    async fn list_posts_by_account(&self, account_id: i64) -> Result<Vec<Post>, sqlx::Error>;
    async fn list_all_posts(&self) -> Result<Vec<Post>, sqlx::Error>;
    /// Owner-Only: `None` if the post is missing or not owned by `account_id`.
    async fn update_post(
        &self,
        id: i64,
        account_id: i64,
        title: &str,
        content: &str,
    ) -> Result<Option<Post>, sqlx::Error>;
    /// Compare-and-set on the status column. `None` when the post is missing or
    /// no longer in `from`.
    async fn transition_post(
        &self,
        id: i64,
        from: PostStatus,
        to: PostStatus,
    ) -> Result<Option<Post>, sqlx::Error>;
    /// Admin Override: deletes any post and its comments.
    async fn delete_post(&self, id: i64) -> Result<bool, sqlx::Error>;
    /// Owner-Only bulk delete. Ids not owned by `account_id` are skipped.
    async fn delete_posts_owned_by(&self, account_id: i64, ids: &[i64])
    -> Result<u64, sqlx::Error>;

    // --- Comments ---
    async fn add_comment(
        &self,
        post_id: i64,
        account_id: i64,
        content: &str,
    ) -> Result<Comment, sqlx::Error>;
    // Newest first, author resolved if the account still exists.
    async fn list_comments(&self, post_id: i64) -> Result<Vec<Comment>, sqlx::Error>;
    async fn count_comments(&self) -> Result<i64, sqlx::Error>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// SqliteRepository
///
/// The concrete implementation of the `Repository` trait, backed by SQLite.
/// Uniqueness of usernames and category names lives in the schema, so two
/// concurrent registrations cannot both succeed.
#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Creates a new repository instance using an initialized connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// connect
    ///
    /// Opens (creating if needed) the database with foreign keys enforced on
    /// every connection. An in-memory database lives inside a single connection,
    /// so the pool is pinned to one connection that never expires.
    pub async fn connect(db_url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(db_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = if db_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options)
                .await?
        };

        Ok(Self::new(pool))
    }

    /// Applies the embedded `migrations/`.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Repository for SqliteRepository {
    // --- ACCOUNTS ---

    /// create_account
    ///
    /// Relies on the `UNIQUE` constraint instead of a read-then-write check.
    async fn create_account(
        &self,
        username: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<Option<Account>, sqlx::Error> {
        let inserted = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (username, password_hash, role, blocked, block_reason, created_at)
            VALUES (?, ?, ?, FALSE, '', ?)
            RETURNING id, username, password_hash, role, blocked, block_reason, created_at
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .bind(role)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await;

        match inserted {
            Ok(account) => Ok(Some(account)),
            Err(e) if is_unique_violation(&e) => Ok(None),
            Err(e) => {
                tracing::error!("create_account error: {:?}", e);
                Err(e)
            }
        }
    }

    async fn get_account(&self, id: i64) -> Result<Option<Account>, sqlx::Error> {
        sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn find_account_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Account>, sqlx::Error> {
        sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, sqlx::Error> {
        sqlx::query_as::<_, Account>("SELECT * FROM accounts ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
    }

    async fn count_accounts(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM accounts")
            .fetch_one(&self.pool)
            .await
    }

    async fn set_role(&self, id: i64, role: Role) -> Result<bool, sqlx::Error> {
        let res = sqlx::query("UPDATE accounts SET role = ? WHERE id = ?")
            .bind(role)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn set_password_hash(&self, id: i64, password_hash: &str) -> Result<bool, sqlx::Error> {
        let res = sqlx::query("UPDATE accounts SET password_hash = ? WHERE id = ?")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn set_blocked(
        &self,
        id: i64,
        blocked: bool,
        reason: &str,
    ) -> Result<bool, sqlx::Error> {
        let res = sqlx::query("UPDATE accounts SET blocked = ?, block_reason = ? WHERE id = ?")
            .bind(blocked)
            .bind(reason)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    /// delete_account
    ///
    /// One transaction: comments on the account's posts, the posts, the
    /// sessions, then the account. `comments.account_id` has no foreign key, so
    /// comments the account left on other posts survive with a dangling author.
    async fn delete_account(&self, id: i64) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM comments WHERE post_id IN (SELECT id FROM posts WHERE account_id = ?)",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM posts WHERE account_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM sessions WHERE account_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let res = sqlx::query("DELETE FROM accounts WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(res.rows_affected() > 0)
    }

    // --- SESSIONS ---

    async fn create_session(&self, token: &str, account_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO sessions (token, account_id, created_at) VALUES (?, ?, ?)")
            .bind(token)
            .bind(account_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn resolve_session(&self, token: &str) -> Result<Option<Account>, sqlx::Error> {
        sqlx::query_as::<_, Account>(
            r#"
            SELECT a.id, a.username, a.password_hash, a.role, a.blocked, a.block_reason, a.created_at
            FROM sessions s
            JOIN accounts a ON a.id = s.account_id
            WHERE s.token = ?
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
    }

    async fn delete_session(&self, token: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // --- CATEGORIES ---

    async fn list_categories(&self) -> Result<Vec<Category>, sqlx::Error> {
        sqlx::query_as::<_, Category>("SELECT id, name FROM categories ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
    }

    async fn get_category(&self, id: i64) -> Result<Option<Category>, sqlx::Error> {
        sqlx::query_as::<_, Category>("SELECT id, name FROM categories WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn create_category(&self, name: &str) -> Result<Option<Category>, sqlx::Error> {
        let inserted = sqlx::query_as::<_, Category>(
            "INSERT INTO categories (name) VALUES (?) RETURNING id, name",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await;

        match inserted {
            Ok(category) => Ok(Some(category)),
            Err(e) if is_unique_violation(&e) => Ok(None),
            Err(e) => {
                tracing::error!("create_category error: {:?}", e);
                Err(e)
            }
        }
    }

    /// Posts in the category become uncategorised (`ON DELETE SET NULL`).
    async fn delete_category(&self, id: i64) -> Result<bool, sqlx::Error> {
        let res = sqlx::query("DELETE FROM categories WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    // --- POSTS ---

    /// create_post
    ///
    /// Every new post enters the moderation queue as `pending`.
    async fn create_post(&self, post: NewPost) -> Result<Post, sqlx::Error> {
        sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO posts (title, content, image_url, author, created_at, status, account_id, category_id)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id, title, content, image_url, author, created_at, status, account_id, category_id
            "#,
        )
        .bind(post.title)
        .bind(post.content)
        .bind(post.image_url)
        .bind(post.author)
        .bind(Utc::now())
        .bind(PostStatus::Pending)
        .bind(post.account_id)
        .bind(post.category_id)
        .fetch_one(&self.pool)
        .await
        .inspect_err(|e| tracing::error!("create_post error: {:?}", e))
    }

    async fn get_post(&self, id: i64) -> Result<Option<Post>, sqlx::Error> {
        sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn count_posts(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.pool)
            .await
    }

    async fn count_published_posts(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM posts WHERE status = ?")
            .bind(PostStatus::Published)
            .fetch_one(&self.pool)
            .await
    }

    async fn list_published_posts(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Post>, sqlx::Error> {
        sqlx::query_as::<_, Post>(
            "SELECT * FROM posts WHERE status = ? ORDER BY id DESC LIMIT ? OFFSET ?",
        )
        .bind(PostStatus::Published)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    async fn list_published_in_category(
        &self,
        category_id: i64,
    ) -> Result<Vec<Post>, sqlx::Error> {
        sqlx::query_as::<_, Post>(
            "SELECT * FROM posts WHERE status = ? AND category_id = ? ORDER BY id DESC",
        )
        .bind(PostStatus::Published)
        .bind(category_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn list_posts_by_account(&self, account_id: i64) -> Result<Vec<Post>, sqlx::Error> {
        sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE account_id = ? ORDER BY id DESC")
            .bind(account_id)
            .fetch_all(&self.pool)
            .await
    }

    async fn list_all_posts(&self) -> Result<Vec<Post>, sqlx::Error> {
        sqlx::query_as::<_, Post>("SELECT * FROM posts ORDER BY id DESC")
            .fetch_all(&self.pool)
            .await
    }

    /// update_post
    ///
    /// Ownership is part of the `WHERE` clause. The status column is untouched:
    /// editing a published post does not send it back to moderation.
    async fn update_post(
        &self,
        id: i64,
        account_id: i64,
        title: &str,
        content: &str,
    ) -> Result<Option<Post>, sqlx::Error> {
        sqlx::query_as::<_, Post>(
            r#"
            UPDATE posts SET title = ?, content = ?
            WHERE id = ? AND account_id = ?
            RETURNING id, title, content, image_url, author, created_at, status, account_id, category_id
            "#,
        )
        .bind(title)
        .bind(content)
        .bind(id)
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn transition_post(
        &self,
        id: i64,
        from: PostStatus,
        to: PostStatus,
    ) -> Result<Option<Post>, sqlx::Error> {
        sqlx::query_as::<_, Post>(
            r#"
            UPDATE posts SET status = ?
            WHERE id = ? AND status = ?
            RETURNING id, title, content, image_url, author, created_at, status, account_id, category_id
            "#,
        )
        .bind(to)
        .bind(id)
        .bind(from)
        .fetch_optional(&self.pool)
        .await
    }

    async fn delete_post(&self, id: i64) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM comments WHERE post_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let res = sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(res.rows_affected() > 0)
    }

    /// delete_posts_owned_by
    ///
    /// Builds `IN (...)` lists with `QueryBuilder` so every id stays a bound
    /// parameter.
    async fn delete_posts_owned_by(
        &self,
        account_id: i64,
        ids: &[i64],
    ) -> Result<u64, sqlx::Error> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;

        let mut comments: QueryBuilder<Sqlite> = QueryBuilder::new(
            "DELETE FROM comments WHERE post_id IN (SELECT id FROM posts WHERE account_id = ",
        );
        comments.push_bind(account_id);
        comments.push(" AND id IN (");
        let mut separated = comments.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated("))");
        comments.build().execute(&mut *tx).await?;

        let mut posts: QueryBuilder<Sqlite> =
            QueryBuilder::new("DELETE FROM posts WHERE account_id = ");
        posts.push_bind(account_id);
        posts.push(" AND id IN (");
        let mut separated = posts.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");
        let res = posts.build().execute(&mut *tx).await?;

        tx.commit().await?;
        Ok(res.rows_affected())
    }

    // --- COMMENTS ---

    async fn add_comment(
        &self,
        post_id: i64,
        account_id: i64,
        content: &str,
    ) -> Result<Comment, sqlx::Error> {
        let mut comment = sqlx::query_as::<_, Comment>(
            r#"
            INSERT INTO comments (content, created_at, account_id, post_id)
            VALUES (?, ?, ?, ?)
            RETURNING id, content, created_at, account_id, post_id
            "#,
        )
        .bind(content)
        .bind(Utc::now())
        .bind(account_id)
        .bind(post_id)
        .fetch_one(&self.pool)
        .await?;

        comment.author = self
            .get_account(account_id)
            .await?
            .map(|account| account.username);
        Ok(comment)
    }

    async fn list_comments(&self, post_id: i64) -> Result<Vec<Comment>, sqlx::Error> {
        sqlx::query_as::<_, Comment>(
            r#"
            SELECT c.id, c.content, c.created_at, c.account_id, c.post_id, a.username AS author
            FROM comments c
            LEFT JOIN accounts a ON a.id = c.account_id
            WHERE c.post_id = ?
            ORDER BY c.id DESC
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn count_comments(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM comments")
            .fetch_one(&self.pool)
            .await
    }
}
