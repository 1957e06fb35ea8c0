//! Adapter configuration.
//!
//! One [`AdapterConfig`] describes one configured device: which addin
//! provides its implementation, where its options are persisted, and how
//! large its channels are. It is usually read from a JSON file:
//!
//! ```
//! use egm_core::{AdapterConfig, DeviceKind};
//!
//! let config = AdapterConfig::from_json_str(r#"{
//!     "kind": "printer",
//!     "index": 1,
//!     "addin": "mock"
//! }"#).unwrap();
//!
//! assert_eq!(config.kind, DeviceKind::Printer);
//! assert_eq!(config.options_block, "PrinterOptions");
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::constants::{
    DEFAULT_COMMAND_CAPACITY, DEFAULT_EVENT_CAPACITY, DEFAULT_PRINTER_OPTIONS_BLOCK,
    DEFAULT_RENDER_TARGET,
};
use crate::options::{DeviceOptions, OptionsKey};
use crate::types::{DeviceIdentity, DeviceKind};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    /// Kind of device being adapted.
    pub kind: DeviceKind,

    /// 1-based device index.
    pub index: u8,

    /// Name of the addin providing the hardware implementation.
    pub addin: String,

    /// Options block name used for persistence.
    pub options_block: String,

    /// Render target written on first boot.
    pub default_render_target: String,

    /// Capacity of the implementation event channel.
    pub event_capacity: usize,

    /// Capacity of the command channel.
    pub command_capacity: usize,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            kind: DeviceKind::Printer,
            index: 1,
            addin: String::new(),
            options_block: DEFAULT_PRINTER_OPTIONS_BLOCK.to_string(),
            default_render_target: DEFAULT_RENDER_TARGET.to_string(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
            command_capacity: DEFAULT_COMMAND_CAPACITY,
        }
    }
}

impl AdapterConfig {
    /// Create a configuration for the given device kind and addin.
    pub fn new(kind: DeviceKind, addin: impl Into<String>) -> Self {
        Self {
            kind,
            addin: addin.into(),
            ..Default::default()
        }
    }

    /// Set the device index.
    pub fn index(mut self, index: u8) -> Self {
        self.index = index;
        self
    }

    /// Set the options block name.
    pub fn options_block(mut self, block: impl Into<String>) -> Self {
        self.options_block = block.into();
        self
    }

    /// Set the render target used on first boot.
    pub fn default_render_target(mut self, target: impl Into<String>) -> Self {
        self.default_render_target = target.into();
        self
    }

    /// Set the command channel capacity.
    pub fn command_capacity(mut self, capacity: usize) -> Self {
        self.command_capacity = capacity;
        self
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Check values that serde cannot.
    pub fn validate(&self) -> Result<()> {
        self.identity()?;
        if self.addin.trim().is_empty() {
            return Err(Error::Config("addin must not be empty".to_string()));
        }
        if self.options_block.trim().is_empty() {
            return Err(Error::Config("options_block must not be empty".to_string()));
        }
        if self.event_capacity == 0 || self.command_capacity == 0 {
            return Err(Error::Config("channel capacities must be non-zero".to_string()));
        }
        Ok(())
    }

    pub fn identity(&self) -> Result<DeviceIdentity> {
        DeviceIdentity::new(self.kind, self.index)
    }

    pub fn options_key(&self) -> OptionsKey {
        OptionsKey::new(self.options_block.clone(), self.index)
    }

    pub fn default_options(&self) -> DeviceOptions {
        DeviceOptions::new(self.default_render_target.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_defaults() {
        let config = AdapterConfig::default();
        assert_eq!(config.kind, DeviceKind::Printer);
        assert_eq!(config.index, 1);
        assert_eq!(config.options_block, DEFAULT_PRINTER_OPTIONS_BLOCK);
        assert_eq!(config.default_render_target, DEFAULT_RENDER_TARGET);
        assert_eq!(config.event_capacity, DEFAULT_EVENT_CAPACITY);
    }

    #[test]
    fn test_config_builder() {
        let config = AdapterConfig::new(DeviceKind::NoteAcceptor, "mock")
            .index(2)
            .options_block("NoteAcceptorOptions")
            .default_render_target("text")
            .command_capacity(4);

        assert_eq!(config.kind, DeviceKind::NoteAcceptor);
        assert_eq!(config.index, 2);
        assert_eq!(config.options_key(), OptionsKey::new("NoteAcceptorOptions", 2));
        assert_eq!(config.default_options().render_target, "text");
        assert_eq!(config.command_capacity, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_rejects_missing_addin() {
        let result = AdapterConfig::from_json_str(r#"{ "kind": "printer", "index": 1 }"#);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_config_rejects_bad_index() {
        let result =
            AdapterConfig::from_json_str(r#"{ "kind": "printer", "index": 0, "addin": "mock" }"#);
        assert!(matches!(result, Err(Error::InvalidDeviceIndex(_))));
    }

    #[test]
    fn test_config_rejects_malformed_json() {
        let result = AdapterConfig::from_json_str("{ kind: printer");
        assert!(matches!(result, Err(Error::Json(_))));
    }

    #[test]
    fn test_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "kind": "io_board", "index": 3, "addin": "mock", "options_block": "IoOptions" }}"#
        )
        .unwrap();

        let config = AdapterConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.kind, DeviceKind::IoBoard);
        assert_eq!(config.index, 3);
        assert_eq!(config.options_block, "IoOptions");
    }
}
