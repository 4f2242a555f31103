use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use tracing::info;

use super::{MIGRATION_001_INITIAL, Repository, SqliteStorage};

/// Owner of the SQLite pool. Hands out the transactional [`SqliteStorage`]
/// and the plain [`Repository`], both sharing the same connections.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open the database file, creating it when `create` is set.
    async fn open(path: &Path, busy_timeout: Duration, create: bool) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(create)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(busy_timeout);

        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database {}", path.display()))?;

        Ok(Self { pool })
    }

    /// Connect to an existing database.
    pub async fn connect(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self> {
        Self::open(path.as_ref(), busy_timeout, false).await
    }

    /// Create (if needed) and migrate a database.
    pub async fn init(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self> {
        let db = Self::open(path.as_ref(), busy_timeout, true).await?;
        db.migrate().await?;
        info!(path = %path.as_ref().display(), "database ready");
        Ok(db)
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    pub fn storage(&self) -> SqliteStorage {
        SqliteStorage::new(self.pool.clone())
    }

    pub fn repository(&self) -> Repository {
        Repository::new(self.pool.clone())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
