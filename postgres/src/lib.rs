//! `PostgreSQL` user document repository for simPodo.
//!
//! This crate implements the `UserRepository` port from `simpodo-core` over a
//! single `users` table:
//!
//! - the whole user (tags and todos included) is one JSONB `document`
//! - `username` is a nullable `UNIQUE` column, so only users that have a
//!   username can collide
//! - `version` backs the optimistic check on every save
//! - tag and todo membership queries use JSONB containment on the document
//!
//! # Example
//!
//! ```no_run
//! use simpodo_postgres::{PostgresConfig, PostgresUserRepository};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let repo = PostgresUserRepository::connect(&PostgresConfig::new("postgres://localhost/simpodo")).await?;
//! repo.migrate().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use simpodo_core::error::{RepositoryError, RepositoryResult};
use simpodo_core::keyed::EntityId;
use simpodo_core::repository::{UserQuery, UserRepository};
use simpodo_core::user::{ProjectedUser, User, UserId, UserProjection, Version};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::JsonValue;
use sqlx::Row;
use std::time::Duration;

/// Connection settings for [`PostgresUserRepository::connect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgresConfig {
    /// Database URL
    pub url: String,
    /// Maximum pool size
    pub max_connections: u32,
    /// How long to wait for a connection
    pub connect_timeout: Duration,
}

impl PostgresConfig {
    /// Settings with a pool of 5 and a 30 second connect timeout.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 5,
            connect_timeout: Duration::from_secs(30),
        }
    }

    /// Set the maximum pool size
    #[must_use]
    pub const fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    /// Set the connect timeout
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

/// `PostgreSQL` user repository.
#[derive(Clone, Debug)]
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    /// Wrap an existing connection pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a connection pool.
    ///
    /// # Errors
    ///
    /// Returns `Database` if the pool cannot connect.
    pub async fn connect(config: &PostgresConfig) -> RepositoryResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout)
            .connect(&config.url)
            .await
            .map_err(|e| RepositoryError::Database(format!("Failed to connect: {e}")))?;

        tracing::info!(max_connections = config.max_connections, "Connected to PostgreSQL");
        Ok(Self::from_pool(pool))
    }

    /// Run database migrations.
    ///
    /// # Errors
    ///
    /// Returns `Database` if migrations fail.
    pub async fn migrate(&self) -> RepositoryResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(format!("Migration failed: {e}")))?;
        Ok(())
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn stored_version(&self, id: &UserId) -> RepositoryResult<Option<Version>> {
        let row = sqlx::query("SELECT version FROM users WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(format!("Failed to read version: {e}")))?;

        row.map(|row| decode_version(&row)).transpose()
    }
}

fn encode_document(user: &User) -> RepositoryResult<JsonValue> {
    serde_json::to_value(user).map_err(|e| RepositoryError::Serialization(e.to_string()))
}

fn encode_version(version: Version) -> RepositoryResult<i64> {
    i64::try_from(version.value())
        .map_err(|_| RepositoryError::Database(format!("Version {version} out of range")))
}

fn decode_version(row: &PgRow) -> RepositoryResult<Version> {
    let raw: i64 = row
        .try_get("version")
        .map_err(|e| RepositoryError::Database(format!("Failed to read version: {e}")))?;
    u64::try_from(raw)
        .map(Version::new)
        .map_err(|_| RepositoryError::Database(format!("Negative version {raw}")))
}

/// The `version` column is authoritative over any version inside the document.
fn decode_user(row: &PgRow) -> RepositoryResult<User> {
    let document: JsonValue = row
        .try_get("document")
        .map_err(|e| RepositoryError::Database(format!("Failed to read document: {e}")))?;
    let mut user: User =
        serde_json::from_value(document).map_err(|e| RepositoryError::Serialization(e.to_string()))?;
    user.version = decode_version(row)?;
    Ok(user)
}

/// Map a write failure, turning unique violations into `Write`.
fn write_error(context: &str, error: &sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db_err) = error {
        if db_err.is_unique_violation() {
            return RepositoryError::Write(format!(
                "duplicate key: {}",
                db_err.constraint().unwrap_or("users")
            ));
        }
    }
    RepositoryError::Database(format!("{context}: {error}"))
}

/// `[{"id": id}]`, matched with `@>` against an embedded collection.
fn containing_id(id: Option<&str>) -> Option<JsonValue> {
    id.map(|id| serde_json::json!([{ "id": id }]))
}

impl UserRepository for PostgresUserRepository {
    async fn insert(&self, user: &User) -> RepositoryResult<()> {
        let mut stored = user.clone();
        stored.version = Version::INITIAL;
        let document = encode_document(&stored)?;

        sqlx::query(
            r"
            INSERT INTO users (id, username, version, document)
            VALUES ($1, $2, 0, $3)
            ",
        )
        .bind(user.id.as_str())
        .bind(user.username.as_deref())
        .bind(document)
        .execute(&self.pool)
        .await
        .map_err(|e| write_error("Failed to insert user", &e))?;

        tracing::debug!(user_id = %user.id, "Inserted user document");
        Ok(())
    }

    async fn save(&self, user: &User, expected: Version) -> RepositoryResult<Version> {
        let document = encode_document(user)?;

        let row = sqlx::query(
            r"
            UPDATE users
            SET username = $2,
                document = $3,
                version = version + 1,
                updated_at = now()
            WHERE id = $1 AND version = $4
            RETURNING version
            ",
        )
        .bind(user.id.as_str())
        .bind(user.username.as_deref())
        .bind(document)
        .bind(encode_version(expected)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| write_error("Failed to save user", &e))?;

        if let Some(row) = row {
            let version = decode_version(&row)?;
            tracing::debug!(user_id = %user.id, %version, "Saved user document");
            return Ok(version);
        }

        // Nothing matched: either the user is gone or someone else wrote first
        match self.stored_version(&user.id).await? {
            None => Err(RepositoryError::UserNotFound(user.id.clone())),
            Some(actual) => {
                tracing::warn!(user_id = %user.id, %expected, %actual, "Stale user document");
                Err(RepositoryError::ConcurrencyConflict {
                    user_id: user.id.clone(),
                    expected,
                    actual,
                })
            },
        }
    }

    async fn find_by_id(&self, id: &UserId) -> RepositoryResult<Option<User>> {
        let row = sqlx::query("SELECT version, document FROM users WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(format!("Failed to get user: {e}")))?;

        row.map(|row| decode_user(&row)).transpose()
    }

    async fn find_one(
        &self,
        query: &UserQuery,
        projection: UserProjection,
    ) -> RepositoryResult<Option<ProjectedUser>> {
        let row = sqlx::query(
            r"
            SELECT version, document
            FROM users
            WHERE ($1::text IS NULL OR id = $1)
              AND ($2::text IS NULL OR username = $2)
              AND ($3::jsonb IS NULL OR document->'tags' @> $3)
              AND ($4::jsonb IS NULL OR document->'todos' @> $4)
            ORDER BY created_at, id
            LIMIT 1
            ",
        )
        .bind(query.id.as_ref().map(EntityId::as_str))
        .bind(query.username.as_deref())
        .bind(containing_id(query.has_tag.as_ref().map(EntityId::as_str)))
        .bind(containing_id(query.has_todo.as_ref().map(EntityId::as_str)))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to query users: {e}")))?;

        row.map(|row| decode_user(&row).map(|user| projection.project(user)))
            .transpose()
    }

    async fn delete_by_id(&self, id: &UserId) -> RepositoryResult<Option<User>> {
        let row = sqlx::query("DELETE FROM users WHERE id = $1 RETURNING version, document")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(format!("Failed to delete user: {e}")))?;

        tracing::debug!(user_id = %id, deleted = row.is_some(), "Deleted user document");
        row.map(|row| decode_user(&row)).transpose()
    }
}
