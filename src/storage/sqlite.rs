use std::str::FromStr;

use async_trait::async_trait;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
    FromRow,
};
use time::OffsetDateTime;
use tracing::warn;

use super::{StoreError, UserRecord, UserStore};

#[derive(Debug, FromRow)]
struct UserRow {
    username: String,
    password: String,
    email: String,
    created_at: OffsetDateTime,
}

impl From<UserRow> for UserRecord {
    fn from(r: UserRow) -> Self {
        Self {
            username: r.username,
            password_hash: r.password,
            email: r.email,
            created_at: r.created_at,
        }
    }
}

/// `users` table with UNIQUE constraints on username and email; concurrent
/// duplicate registrations are rejected by the database at insert time.
pub struct SqliteStore {
    db: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(StoreError::unavailable)?
            .create_if_missing(true);
        let db = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(StoreError::unavailable)?;
        Self::from_pool(db).await
    }

    /// Single-connection in-memory database, mainly for tests.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let db = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(StoreError::unavailable)?;
        Self::from_pool(db).await
    }

    async fn from_pool(db: SqlitePool) -> Result<Self, StoreError> {
        sqlx::migrate!("./migrations")
            .run(&db)
            .await
            .map_err(StoreError::unavailable)?;
        Ok(Self { db })
    }
}

fn map_insert_error(e: sqlx::Error) -> StoreError {
    if let Some(db_err) = e.as_database_error() {
        if db_err.is_unique_violation() {
            // SQLite reports "UNIQUE constraint failed: users.<column>"
            return if db_err.message().contains("users.email") {
                StoreError::DuplicateEmail
            } else {
                StoreError::DuplicateUsername
            };
        }
    }
    warn!(error = %e, "sqlite insert failed");
    StoreError::unavailable(e)
}

#[async_trait]
impl UserStore for SqliteStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            -- earlier deployments stored bcrypt digests as BLOBs
            SELECT username, CAST(password AS TEXT) AS password, email, created_at
            FROM users
            WHERE username = ?
            "#,
        )
        .bind(username)
        .fetch_optional(&self.db)
        .await
        .map_err(StoreError::unavailable)?;
        Ok(row.map(UserRecord::from))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            -- earlier deployments stored bcrypt digests as BLOBs
            SELECT username, CAST(password AS TEXT) AS password, email, created_at
            FROM users
            WHERE email = ?
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .map_err(StoreError::unavailable)?;
        Ok(row.map(UserRecord::from))
    }

    async fn insert(&self, record: UserRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (username, password, email, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&record.username)
        .bind(&record.password_hash)
        .bind(&record.email)
        .bind(record.created_at)
        .execute(&self.db)
        .await
        .map_err(map_insert_error)?;
        Ok(())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.db)
            .await
            .map_err(StoreError::unavailable)?;
        Ok(n as usize)
    }
}
