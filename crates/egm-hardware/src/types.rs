//! Common types shared across hardware implementations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;

/// A device-specific fault or warning tag.
///
/// Blanket-implemented; device crates only declare an enum of tags.
pub trait Condition:
    Copy + Eq + Ord + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static
{
}

impl<T> Condition for T where
    T: Copy + Eq + Ord + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static
{
}

/// Identification reported by a hardware implementation.
///
/// `manufacturer`, `protocol` and `firmware_id` select override rules for
/// region and template descriptors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Manufacturer name (e.g., "TransAct", "JCM").
    pub manufacturer: String,

    /// Device model identifier.
    pub model: String,

    /// Command protocol spoken by the device (e.g., "GDS", "TCL").
    pub protocol: String,

    /// Optional firmware identifier.
    pub firmware_id: Option<String>,

    /// Optional device serial number.
    pub serial_number: Option<String>,
}

impl DeviceInfo {
    /// Create a new DeviceInfo with required fields.
    pub fn new(
        manufacturer: impl Into<String>,
        model: impl Into<String>,
        protocol: impl Into<String>,
    ) -> Self {
        Self {
            manufacturer: manufacturer.into(),
            model: model.into(),
            protocol: protocol.into(),
            firmware_id: None,
            serial_number: None,
        }
    }

    /// Set the firmware identifier.
    pub fn with_firmware_id(mut self, firmware_id: impl Into<String>) -> Self {
        self.firmware_id = Some(firmware_id.into());
        self
    }

    /// Set the serial number.
    pub fn with_serial_number(mut self, serial_number: impl Into<String>) -> Self {
        self.serial_number = Some(serial_number.into());
        self
    }

    /// Manufacturer and protocol joined into the override lookup key.
    pub fn manufacturer_protocol(&self) -> String {
        format!("{} {}", self.manufacturer, self.protocol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_info_builder() {
        let info = DeviceInfo::new("TransAct", "Epic 950", "GDS")
            .with_firmware_id("EP950-1.22")
            .with_serial_number("123456789");

        assert_eq!(info.manufacturer, "TransAct");
        assert_eq!(info.model, "Epic 950");
        assert_eq!(info.firmware_id, Some("EP950-1.22".to_string()));
        assert_eq!(info.serial_number, Some("123456789".to_string()));
    }

    #[test]
    fn test_device_info_minimal() {
        let info = DeviceInfo::new("Mock", "Mock", "Mock");
        assert_eq!(info.firmware_id, None);
        assert_eq!(info.serial_number, None);
    }

    #[test]
    fn test_manufacturer_protocol_key() {
        let info = DeviceInfo::new("JCM", "GEN2U", "GDS");
        assert_eq!(info.manufacturer_protocol(), "JCM GDS");
    }

    #[test]
    fn test_device_info_serialization() {
        let info = DeviceInfo::new("Nanoptix", "PayCheck 4", "TCL").with_firmware_id("4.1");
        let json = serde_json::to_string(&info).unwrap();
        let deserialized: DeviceInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(info, deserialized);
    }
}
