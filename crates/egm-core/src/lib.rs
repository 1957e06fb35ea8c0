//! Shared domain types for EGM peripheral adapters.
//!
//! Holds what every adapter crate agrees on: the domain [`Error`], device
//! identity, disable/enable reasons, persisted [`DeviceOptions`] with the
//! [`OptionsStore`] port, and [`AdapterConfig`].

pub mod config;
pub mod constants;
pub mod error;
pub mod options;
pub mod reasons;
pub mod types;

pub use config::AdapterConfig;
pub use error::{Error, Result};
pub use options::{DeviceOptions, MemoryOptionsStore, OptionsKey, OptionsStore};
pub use reasons::{DisableReason, EnableReason};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
