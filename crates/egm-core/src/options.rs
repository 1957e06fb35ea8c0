//! Persisted per-device options and the storage port they go through.
//!
//! Every device owns one options block keyed by `(block_name, device_index)`.
//! Writes replace the whole block at once; a failed write leaves the last
//! committed value in place.

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::constants::DEFAULT_RENDER_TARGET;
use crate::{Error, Result};

/// Key of one persisted options block.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OptionsKey {
    pub block_name: String,
    pub device_index: u8,
}

impl OptionsKey {
    pub fn new(block_name: impl Into<String>, device_index: u8) -> Self {
        Self {
            block_name: block_name.into(),
            device_index,
        }
    }
}

/// Options persisted for one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceOptions {
    /// Selects the renderer used to build hardware commands.
    pub render_target: String,

    /// First time the device became enabled. Written once, never changed.
    pub activation_time: Option<DateTime<Utc>>,
}

impl DeviceOptions {
    pub fn new(render_target: impl Into<String>) -> Self {
        Self {
            render_target: render_target.into(),
            activation_time: None,
        }
    }

    #[must_use]
    pub fn is_activated(&self) -> bool {
        self.activation_time.is_some()
    }
}

impl Default for DeviceOptions {
    fn default() -> Self {
        Self::new(DEFAULT_RENDER_TARGET)
    }
}

/// Persistence port for [`DeviceOptions`].
///
/// Futures are boxed so adapters can hold the store as `Arc<dyn OptionsStore>`.
pub trait OptionsStore: Send + Sync {
    /// Read the block for `key`, writing `defaults` first if it does not exist.
    fn load_or_create<'a>(
        &'a self,
        key: &'a OptionsKey,
        defaults: &'a DeviceOptions,
    ) -> BoxFuture<'a, Result<DeviceOptions>>;

    /// Replace the block for `key`. All-or-nothing. Once a block carries an
    /// activation time, later saves never change it.
    fn save<'a>(&'a self, key: &'a OptionsKey, options: &'a DeviceOptions)
    -> BoxFuture<'a, Result<()>>;
}

/// In-process [`OptionsStore`], used by tests and the simulator's memory mode.
#[derive(Debug, Default)]
pub struct MemoryOptionsStore {
    blocks: Mutex<HashMap<OptionsKey, DeviceOptions>>,
    fail_writes: AtomicBool,
}

impl MemoryOptionsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent writes fail without touching stored data.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Read a block without creating it.
    pub fn get(&self, key: &OptionsKey) -> Option<DeviceOptions> {
        self.blocks
            .lock()
            .ok()
            .and_then(|blocks| blocks.get(key).cloned())
    }

    fn write(&self, key: &OptionsKey, options: &DeviceOptions) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Storage(format!(
                "write rejected for {}[{}]",
                key.block_name, key.device_index
            )));
        }
        let mut blocks = self
            .blocks
            .lock()
            .map_err(|_| Error::Storage("options lock poisoned".to_string()))?;
        let mut options = options.clone();
        if let Some(activated) = blocks.get(key).and_then(|stored| stored.activation_time) {
            options.activation_time = Some(activated);
        }
        blocks.insert(key.clone(), options);
        Ok(())
    }
}

impl OptionsStore for MemoryOptionsStore {
    fn load_or_create<'a>(
        &'a self,
        key: &'a OptionsKey,
        defaults: &'a DeviceOptions,
    ) -> BoxFuture<'a, Result<DeviceOptions>> {
        Box::pin(async move {
            if let Some(existing) = self.get(key) {
                return Ok(existing);
            }
            self.write(key, defaults)?;
            Ok(defaults.clone())
        })
    }

    fn save<'a>(
        &'a self,
        key: &'a OptionsKey,
        options: &'a DeviceOptions,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move { self.write(key, options) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = DeviceOptions::default();
        assert_eq!(options.render_target, DEFAULT_RENDER_TARGET);
        assert!(!options.is_activated());
    }

    #[tokio::test]
    async fn test_memory_store_creates_defaults_once() {
        let store = MemoryOptionsStore::new();
        let key = OptionsKey::new("PrinterOptions", 1);

        let first = store
            .load_or_create(&key, &DeviceOptions::new("text"))
            .await
            .unwrap();
        assert_eq!(first.render_target, "text");

        // Defaults are ignored once the block exists
        let second = store
            .load_or_create(&key, &DeviceOptions::new("template"))
            .await
            .unwrap();
        assert_eq!(second.render_target, "text");
    }

    #[tokio::test]
    async fn test_memory_store_failed_write_keeps_last_committed() {
        let store = MemoryOptionsStore::new();
        let key = OptionsKey::new("PrinterOptions", 2);
        store.save(&key, &DeviceOptions::new("text")).await.unwrap();

        store.set_fail_writes(true);
        let mut changed = DeviceOptions::new("template");
        changed.activation_time = Some(Utc::now());
        assert!(store.save(&key, &changed).await.is_err());

        assert_eq!(store.get(&key), Some(DeviceOptions::new("text")));
    }

    #[tokio::test]
    async fn test_memory_store_keys_are_independent() {
        let store = MemoryOptionsStore::new();
        let a = OptionsKey::new("PrinterOptions", 1);
        let b = OptionsKey::new("PrinterOptions", 2);

        store.save(&a, &DeviceOptions::new("text")).await.unwrap();
        assert!(store.get(&b).is_none());
    }

    #[tokio::test]
    async fn test_memory_store_keeps_first_activation_time() {
        let store = MemoryOptionsStore::new();
        let key = OptionsKey::new("PrinterOptions", 3);
        let first = Utc::now();

        let mut options = DeviceOptions::new("text");
        options.activation_time = Some(first);
        store.save(&key, &options).await.unwrap();

        options.render_target = "template".to_string();
        options.activation_time = Some(first + chrono::Duration::hours(1));
        store.save(&key, &options).await.unwrap();

        let stored = store.get(&key).unwrap();
        assert_eq!(stored.render_target, "template");
        assert_eq!(stored.activation_time, Some(first));
    }
}
