//! Mock hardware implementations for testing and development.

pub mod device;

pub use device::{MockCall, MockDevice, MockDeviceHandle};
