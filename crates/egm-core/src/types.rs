use crate::{
    Result,
    constants::{MAX_DEVICE_INDEX, MIN_DEVICE_INDEX},
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of peripheral managed by an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Printer,
    NoteAcceptor,
    IoBoard,
    ReelController,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceKind::Printer => "Printer",
            DeviceKind::NoteAcceptor => "NoteAcceptor",
            DeviceKind::IoBoard => "IoBoard",
            DeviceKind::ReelController => "ReelController",
        };
        write!(f, "{}", name)
    }
}

/// Identifies one physical device: its kind plus the platform's 1-based index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceIdentity {
    kind: DeviceKind,
    index: u8,
}

impl DeviceIdentity {
    /// Create a new identity with index validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidDeviceIndex` if the index is outside
    /// `MIN_DEVICE_INDEX..=MAX_DEVICE_INDEX`.
    pub fn new(kind: DeviceKind, index: u8) -> Result<Self> {
        if !(MIN_DEVICE_INDEX..=MAX_DEVICE_INDEX).contains(&index) {
            return Err(Error::InvalidDeviceIndex(format!(
                "{kind} index must be {MIN_DEVICE_INDEX}-{MAX_DEVICE_INDEX}, got {index}"
            )));
        }
        Ok(Self { kind, index })
    }

    #[must_use]
    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    #[must_use]
    pub fn index(&self) -> u8 {
        self.index
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(1)]
    #[case(2)]
    #[case(MAX_DEVICE_INDEX)]
    fn test_identity_valid(#[case] index: u8) {
        let id = DeviceIdentity::new(DeviceKind::Printer, index).unwrap();
        assert_eq!(id.index(), index);
        assert_eq!(id.kind(), DeviceKind::Printer);
    }

    #[rstest]
    #[case(0)]
    #[case(MAX_DEVICE_INDEX + 1)]
    fn test_identity_invalid(#[case] index: u8) {
        let result = DeviceIdentity::new(DeviceKind::NoteAcceptor, index);
        assert!(matches!(result, Err(Error::InvalidDeviceIndex(_))));
    }

    #[test]
    fn test_identity_display() {
        let id = DeviceIdentity::new(DeviceKind::ReelController, 3).unwrap();
        assert_eq!(id.to_string(), "ReelController#3");
    }

    #[test]
    fn test_kind_serde_snake_case() {
        let json = serde_json::to_string(&DeviceKind::NoteAcceptor).unwrap();
        assert_eq!(json, "\"note_acceptor\"");
    }
}
