//! Printer implementation contract and condition tags.

use std::fmt;
use std::future::Future;

use egm_hardware::{DeviceImplementation, Result};
use serde::{Deserialize, Serialize};

use crate::descriptors::{PrintableRegion, PrintableTemplate};
use crate::render::RenderedCommand;

/// Faults a printer can report. Any active fault disables the printer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrinterFault {
    PaperJam,
    PaperEmpty,
    PrintHeadOpen,
    ChassisOpen,
    FirmwareFault,
    TemperatureError,
    PrintHeadDamaged,
    NvmFault,
    /// Raised by the adapter when a failed print could not be recovered.
    OtherFault,
}

impl fmt::Display for PrinterFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PrinterFault::PaperJam => "Paper Jam",
            PrinterFault::PaperEmpty => "Paper Empty",
            PrinterFault::PrintHeadOpen => "Print Head Open",
            PrinterFault::ChassisOpen => "Chassis Open",
            PrinterFault::FirmwareFault => "Firmware Fault",
            PrinterFault::TemperatureError => "Temperature Error",
            PrinterFault::PrintHeadDamaged => "Print Head Damaged",
            PrinterFault::NvmFault => "NVM Fault",
            PrinterFault::OtherFault => "Other Fault",
        };
        write!(f, "{}", name)
    }
}

/// Informative printer conditions. Never disable the printer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrinterWarning {
    PaperLow,
    PaperInChute,
    TemperatureWarning,
}

impl fmt::Display for PrinterWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PrinterWarning::PaperLow => "Paper Low",
            PrinterWarning::PaperInChute => "Paper In Chute",
            PrinterWarning::TemperatureWarning => "Temperature Warning",
        };
        write!(f, "{}", name)
    }
}

/// Printer-specific calls on top of [`DeviceImplementation`].
pub trait PrinterImplementation:
    DeviceImplementation<Fault = PrinterFault, Warning = PrinterWarning>
{
    /// Download a region definition to the printer.
    fn define_region(&self, region: &PrintableRegion) -> impl Future<Output = Result<()>> + Send;

    /// Download a template definition to the printer.
    fn define_template(
        &self,
        template: &PrintableTemplate,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Print a rendered ticket. `Ok(false)` means the printer refused it.
    fn submit_command(
        &self,
        command: &RenderedCommand,
    ) -> impl Future<Output = Result<bool>> + Send;

    fn form_feed(&self) -> impl Future<Output = Result<()>> + Send;
}
