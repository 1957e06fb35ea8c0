//! SQLite-backed [`OptionsStore`].

use egm_core::{DeviceOptions, OptionsKey, OptionsStore, Result};
use futures::FutureExt;
use futures::future::BoxFuture;
use sqlx::SqlitePool;
use tracing::{debug, error};

use crate::error::StorageResult;
use crate::transaction;

/// Options blocks kept in the `device_options` table.
///
/// Every call runs in its own transaction, so a failed write leaves the
/// last committed block in place.
#[derive(Debug, Clone)]
pub struct SqliteOptionsStore {
    pool: SqlitePool,
}

impl SqliteOptionsStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn load_or_create_block(
        &self,
        key: &OptionsKey,
        defaults: &DeviceOptions,
    ) -> StorageResult<DeviceOptions> {
        let mut tx = self.pool.begin().await?;
        if transaction::insert_options_if_absent(&mut tx, key, defaults).await? {
            debug!("Created options block {}[{}]", key.block_name, key.device_index);
        }
        let options = transaction::find_options(&mut tx, key).await?;
        tx.commit().await?;
        Ok(options.unwrap_or_else(|| defaults.clone()))
    }

    async fn save_block(&self, key: &OptionsKey, options: &DeviceOptions) -> StorageResult<()> {
        let mut tx = self.pool.begin().await?;
        transaction::upsert_options(&mut tx, key, options).await?;
        tx.commit().await?;
        debug!("Saved options block {}[{}]", key.block_name, key.device_index);
        Ok(())
    }
}

impl OptionsStore for SqliteOptionsStore {
    fn load_or_create<'a>(
        &'a self,
        key: &'a OptionsKey,
        defaults: &'a DeviceOptions,
    ) -> BoxFuture<'a, Result<DeviceOptions>> {
        async move {
            self.load_or_create_block(key, defaults).await.map_err(|e| {
                error!("Loading {}[{}] failed: {}", key.block_name, key.device_index, e);
                egm_core::Error::from(e)
            })
        }
        .boxed()
    }

    fn save<'a>(
        &'a self,
        key: &'a OptionsKey,
        options: &'a DeviceOptions,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            self.save_block(key, options).await.map_err(|e| {
                error!("Saving {}[{}] failed: {}", key.block_name, key.device_index, e);
                egm_core::Error::from(e)
            })
        }
        .boxed()
    }
}
