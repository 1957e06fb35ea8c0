//! Platform-wide defaults for device adapters.

/// Lowest valid device index (indices are 1-based, as configured by the platform).
pub const MIN_DEVICE_INDEX: u8 = 1;

/// Highest valid device index.
pub const MAX_DEVICE_INDEX: u8 = 8;

/// Options block used for printers when configuration does not name one.
pub const DEFAULT_PRINTER_OPTIONS_BLOCK: &str = "PrinterOptions";

/// Render target used on first boot, before an operator selects another.
pub const DEFAULT_RENDER_TARGET: &str = "template";

/// Capacity of the implementation event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Capacity of the adapter command channel.
pub const DEFAULT_COMMAND_CAPACITY: usize = 32;

/// Maximum number of state transitions kept in a state machine's history.
pub const MAX_TRANSITION_HISTORY: usize = 100;
