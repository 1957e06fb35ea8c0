use thiserror::Error;

use crate::types::DeviceKind;

#[derive(Error, Debug)]
pub enum Error {
    // Construction errors
    #[error("No implementation registered for {kind} addin '{addin}'")]
    ImplementationMissing { kind: DeviceKind, addin: String },

    #[error("Implementation event stream already taken for {0}")]
    EventsUnavailable(String),

    #[error("Invalid device index: {0}")]
    InvalidDeviceIndex(String),

    // Pipeline errors
    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("Region {region} referenced by template {template} not found")]
    RegionNotFound { template: u32, region: u32 },

    #[error("No renderer registered for render target '{0}'")]
    RendererNotFound(String),

    #[error("Render failed: {0}")]
    RenderFailed(String),

    // Collaborator errors
    #[error("Hardware operation failed: {0}")]
    Hardware(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Device service stopped")]
    ServiceStopped,

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_implementation_missing_message() {
        let error = Error::ImplementationMissing {
            kind: DeviceKind::Printer,
            addin: "JCM GDS".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "No implementation registered for Printer addin 'JCM GDS'"
        );
    }

    #[test]
    fn test_region_not_found_message() {
        let error = Error::RegionNotFound {
            template: 101,
            region: 7,
        };
        assert_eq!(
            error.to_string(),
            "Region 7 referenced by template 101 not found"
        );
    }
}
