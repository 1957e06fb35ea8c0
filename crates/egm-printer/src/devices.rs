//! Enum dispatch over printer implementations.
//!
//! `async fn` trait methods are not object-safe, so the adapter cannot hold
//! a `Box<dyn PrinterImplementation>`. Addin factories build an
//! [`AnyPrinter`] instead and the service is monomorphized over it.
//!
//! ```
//! use egm_printer::devices::AnyPrinter;
//! use egm_printer::mock::MockPrinter;
//!
//! let (printer, _handle) = MockPrinter::new();
//! let printer = AnyPrinter::Mock(printer);
//! ```

use egm_hardware::{DeviceImplementation, DeviceInfo, EventReceiver, Result};

use crate::descriptors::{PrintableRegion, PrintableTemplate};
use crate::mock::MockPrinter;
use crate::render::RenderedCommand;
use crate::traits::{PrinterFault, PrinterImplementation, PrinterWarning};

#[derive(Debug)]
#[non_exhaustive]
pub enum AnyPrinter {
    /// Mock printer for development, testing and the simulator.
    Mock(MockPrinter),
}

impl From<MockPrinter> for AnyPrinter {
    fn from(printer: MockPrinter) -> Self {
        Self::Mock(printer)
    }
}

impl DeviceImplementation for AnyPrinter {
    type Fault = PrinterFault;
    type Warning = PrinterWarning;

    fn info(&self) -> DeviceInfo {
        match self {
            Self::Mock(printer) => printer.info(),
        }
    }

    fn is_enabled(&self) -> bool {
        match self {
            Self::Mock(printer) => printer.is_enabled(),
        }
    }

    fn take_events(&self) -> Option<EventReceiver<PrinterFault, PrinterWarning>> {
        match self {
            Self::Mock(printer) => printer.take_events(),
        }
    }

    async fn initialize(&self) -> Result<()> {
        match self {
            Self::Mock(printer) => printer.initialize().await,
        }
    }

    async fn enable(&self) -> Result<()> {
        match self {
            Self::Mock(printer) => printer.enable().await,
        }
    }

    async fn disable(&self) -> Result<()> {
        match self {
            Self::Mock(printer) => printer.disable().await,
        }
    }

    async fn self_test(&self, clear: bool) -> Result<bool> {
        match self {
            Self::Mock(printer) => printer.self_test(clear).await,
        }
    }

    async fn calculate_checksum(&self, seed: i32) -> Result<i32> {
        match self {
            Self::Mock(printer) => printer.calculate_checksum(seed).await,
        }
    }
}

impl PrinterImplementation for AnyPrinter {
    async fn define_region(&self, region: &PrintableRegion) -> Result<()> {
        match self {
            Self::Mock(printer) => printer.define_region(region).await,
        }
    }

    async fn define_template(&self, template: &PrintableTemplate) -> Result<()> {
        match self {
            Self::Mock(printer) => printer.define_template(template).await,
        }
    }

    async fn submit_command(&self, command: &RenderedCommand) -> Result<bool> {
        match self {
            Self::Mock(printer) => printer.submit_command(command).await,
        }
    }

    async fn form_feed(&self) -> Result<()> {
        match self {
            Self::Mock(printer) => printer.form_feed().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::PrinterCall;
    use egm_hardware::mock::MockCall;

    #[tokio::test]
    async fn test_dispatches_to_mock() {
        let (printer, handle) = MockPrinter::new();
        let printer = AnyPrinter::from(printer);

        assert_eq!(printer.info().manufacturer_protocol(), "Mock GDS");
        assert!(printer.take_events().is_some());
        assert!(printer.take_events().is_none());

        printer.enable().await.unwrap();
        printer.form_feed().await.unwrap();
        assert_eq!(handle.device().count(MockCall::Enable), 1);
        assert_eq!(handle.calls(), vec![PrinterCall::FormFeed]);
    }
}
