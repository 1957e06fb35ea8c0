//! Storage layer for EGM peripheral adapters.
//!
//! Persists each device's options block (render target and activation
//! time) in SQLite so it survives restarts.
//!
//! - [`Database`] - the migrated SQLite pool
//! - [`SqliteOptionsStore`] - the [`egm_core::OptionsStore`] adapters use
//! - [`transaction`] - Transaction-aware row operations
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use egm_core::OptionsStore;
//! use egm_storage::{Database, SqliteOptionsStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::open("egm.db").await?;
//! let store: Arc<dyn OptionsStore> = Arc::new(SqliteOptionsStore::new(db.pool().clone()));
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod error;
pub mod options;
pub mod transaction;

pub use connection::Database;
pub use error::{StorageError, StorageResult};
pub use options::SqliteOptionsStore;
