use async_trait::async_trait;
use authz::UserId;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Sqlite,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::auth::store::UserStore;
use crate::auth::types::{NewUserRecord, StoredUser};
use crate::error::{Result, UserError};

/// Configuration for the user database
#[derive(Debug, Clone)]
pub struct UserDatabaseConfig {
    /// Path to the database file
    pub database_path: PathBuf,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Connection timeout in seconds
    pub connection_timeout: u64,
}

impl Default for UserDatabaseConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("data/exptrack.db"),
            max_connections: 5,
            connection_timeout: 30,
        }
    }
}

impl UserDatabaseConfig {
    /// Reads `DATABASE_PATH` and `DATABASE_MAX_CONNECTIONS`, keeping defaults
    /// for anything unset.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }
        if let Ok(raw) = std::env::var("DATABASE_MAX_CONNECTIONS") {
            config.max_connections = raw.trim().parse().map_err(|e| {
                UserError::Configuration(format!("Invalid DATABASE_MAX_CONNECTIONS: {}", e))
            })?;
        }

        Ok(config)
    }
}

/// SQLite-backed user store
pub struct UserDatabase {
    pool: Pool<Sqlite>,
}

impl UserDatabase {
    /// Open (creating if needed) the database and run migrations
    pub async fn new(config: UserDatabaseConfig) -> Result<Self> {
        if let Some(parent) = config.database_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        info!("Opening user database at: {}", config.database_path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect_with(
                SqliteConnectOptions::new()
                    .filename(&config.database_path)
                    .create_if_missing(true),
            )
            .await
            .map_err(|e| UserError::Initialization(format!("Failed to open database: {}", e)))?;

        let db = Self { pool };
        db.run_migrations().await?;

        info!("User database initialized successfully");
        Ok(db)
    }

    async fn run_migrations(&self) -> Result<()> {
        info!("Running user database migrations");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("User database migrations completed");
        Ok(())
    }

    /// Get the database pool for external use
    pub fn get_pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Close the database connection
    pub async fn close(self) -> Result<()> {
        self.pool.close().await;
        info!("User database connection closed");
        Ok(())
    }
}

fn map_insert_error(e: sqlx::Error, record: &NewUserRecord) -> UserError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            let message = db_err.message();
            return if message.contains("users.email") {
                UserError::DuplicateIdentity(format!("Email {}", record.email))
            } else {
                UserError::DuplicateIdentity(format!("Username {}", record.username))
            };
        }
    }
    error!("Failed to insert user: {}", e);
    UserError::Database(e)
}

#[async_trait]
impl UserStore for UserDatabase {
    async fn find_by_identity(&self, identity: &str) -> Result<Option<StoredUser>> {
        let user = sqlx::query_as::<_, StoredUser>(
            "SELECT id, username, email, password_hash FROM users WHERE email = ?",
        )
        .bind(identity)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<StoredUser>> {
        let user = sqlx::query_as::<_, StoredUser>(
            "SELECT id, username, email, password_hash FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn create_user(&self, record: NewUserRecord) -> Result<StoredUser> {
        let result = sqlx::query(
            "INSERT INTO users (username, email, password_hash) VALUES (?, ?, ?)",
        )
        .bind(&record.username)
        .bind(&record.email)
        .bind(&record.password_hash)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, &record))?;

        let id = result.last_insert_rowid();
        debug!("Created user {}", id);

        Ok(StoredUser {
            id,
            username: record.username,
            email: record.email,
            password_hash: record.password_hash,
        })
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open(temp_dir: &TempDir) -> UserDatabase {
        let config = UserDatabaseConfig {
            database_path: temp_dir.path().join("nested").join("test_user.db"),
            max_connections: 2,
            connection_timeout: 5,
        };
        UserDatabase::new(config).await.unwrap()
    }

    fn record(email: &str, username: &str) -> NewUserRecord {
        NewUserRecord {
            email: email.to_string(),
            username: username.to_string(),
            password_hash: "$argon2id$placeholder".to_string(),
        }
    }

    #[tokio::test]
    async fn test_unique_columns_are_the_only_indexes() {
        let temp_dir = TempDir::new().unwrap();
        let db = open(&temp_dir).await;

        let indexes: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'index' AND tbl_name = 'users'",
        )
        .fetch_all(db.get_pool())
        .await
        .unwrap();

        assert_eq!(indexes.len(), 2);
        assert!(indexes.iter().all(|name| name.starts_with("sqlite_autoindex_users")));
    }

    #[tokio::test]
    async fn test_database_initialization() {
        let temp_dir = TempDir::new().unwrap();
        let db = open(&temp_dir).await;

        assert!(temp_dir.path().join("nested").join("test_user.db").exists());
        assert!(db.ping().await.is_ok());

        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='users')",
        )
        .fetch_one(db.get_pool())
        .await
        .unwrap();
        assert!(exists);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_create_and_find_user() {
        let temp_dir = TempDir::new().unwrap();
        let db = open(&temp_dir).await;

        let created = db
            .create_user(record("alice@example.com", "alice"))
            .await
            .unwrap();
        assert!(created.id > 0);

        let by_email = db
            .find_by_identity("alice@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_email.id, created.id);
        assert_eq!(by_email.password_hash, "$argon2id$placeholder");

        let by_id = db.find_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(by_id.username, "alice");

        assert!(db.find_by_identity("nobody@example.com").await.unwrap().is_none());
        assert!(db.find_by_id(created.id + 100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_users_are_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let db = open(&temp_dir).await;

        db.create_user(record("alice@example.com", "alice"))
            .await
            .unwrap();

        let dup_email = db
            .create_user(record("alice@example.com", "alice2"))
            .await
            .unwrap_err();
        assert!(matches!(dup_email, UserError::DuplicateIdentity(ref m) if m.starts_with("Email")));

        let dup_name = db
            .create_user(record("alice2@example.com", "alice"))
            .await
            .unwrap_err();
        assert!(matches!(
            dup_name,
            UserError::DuplicateIdentity(ref m) if m.starts_with("Username")
        ));
    }

    #[tokio::test]
    async fn test_reopen_keeps_users() {
        let temp_dir = TempDir::new().unwrap();
        let db = open(&temp_dir).await;
        db.create_user(record("alice@example.com", "alice"))
            .await
            .unwrap();
        db.close().await.unwrap();

        let db = open(&temp_dir).await;
        assert!(db
            .find_by_identity("alice@example.com")
            .await
            .unwrap()
            .is_some());
    }
}
