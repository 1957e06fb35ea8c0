//! The options database.
//!
//! One SQLite file holds every device's options block. It is opened in WAL
//! mode with `synchronous = FULL`: an activation time that was reported as
//! saved must still be there after a power cut.

use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};

/// Adapters write rarely and one at a time.
const MAX_CONNECTIONS: u32 = 2;

const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Migrated connection pool over the options database.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open the database file at `path`, creating it and its directory if
    /// missing, and bring the schema up to date.
    ///
    /// ```no_run
    /// use egm_storage::Database;
    ///
    /// # async fn example() -> egm_storage::StorageResult<()> {
    /// let db = Database::open("/var/lib/egm/options.db").await?;
    /// db.close().await;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| {
                StorageError::Configuration(format!("cannot create {}: {}", dir.display(), e))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full)
            .busy_timeout(BUSY_TIMEOUT);
        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await?;

        info!("Opened options database at {}", path.display());
        Self::migrated(pool).await
    }

    /// A private in-memory database that vanishes with the pool.
    pub async fn in_memory() -> StorageResult<Self> {
        // Each connection to :memory: is its own database, so keep exactly one alive
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(SqliteConnectOptions::new().in_memory(true))
            .await?;
        Self::migrated(pool).await
    }

    async fn migrated(pool: SqlitePool) -> StorageResult<Self> {
        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Apply pending migrations. Already applied ones are skipped.
    pub async fn migrate(&self) -> StorageResult<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        debug!("Options schema up to date");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Wait for in-use connections to come back, then close them all.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
