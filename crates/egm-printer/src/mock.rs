//! Mock printer for testing and the simulator.
//!
//! Wraps a generic [`MockDevice`] for the lifecycle calls and records the
//! printer-specific ones. Submissions can be scripted to fail and can be
//! paused to hold the printer in `Busy`.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use egm_hardware::mock::{MockDevice, MockDeviceHandle};
use egm_hardware::{DeviceImplementation, DeviceInfo, EventReceiver, Result};
use tokio::sync::watch;
use tracing::trace;

use crate::descriptors::{PrintableRegion, PrintableTemplate};
use crate::render::RenderedCommand;
use crate::traits::{PrinterFault, PrinterImplementation, PrinterWarning};

/// A printer-specific call made on a [`MockPrinter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrinterCall {
    DefineRegion(u32),
    DefineTemplate(u32),
    Submit { template_id: u32, payload: Vec<u8> },
    FormFeed,
}

#[derive(Debug)]
struct PrinterState {
    calls: Mutex<Vec<PrinterCall>>,
    /// Results for upcoming submissions; empty means success.
    submit_results: Mutex<VecDeque<bool>>,
    paused: watch::Sender<bool>,
}

impl PrinterState {
    fn record(&self, call: PrinterCall) {
        trace!("Mock printer call {:?}", call);
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

#[derive(Debug)]
pub struct MockPrinter {
    device: MockDevice<PrinterFault, PrinterWarning>,
    state: Arc<PrinterState>,
}

impl MockPrinter {
    pub fn new() -> (Self, MockPrinterHandle) {
        Self::with_info(DeviceInfo::new("Mock", "Mock Printer", "GDS"))
    }

    pub fn with_info(info: DeviceInfo) -> (Self, MockPrinterHandle) {
        let (device, device_handle) = MockDevice::with_info(info);
        let (paused, _) = watch::channel(false);
        let state = Arc::new(PrinterState {
            calls: Mutex::new(Vec::new()),
            submit_results: Mutex::new(VecDeque::new()),
            paused,
        });
        let handle = MockPrinterHandle {
            device: device_handle,
            state: state.clone(),
        };
        (Self { device, state }, handle)
    }
}

impl DeviceImplementation for MockPrinter {
    type Fault = PrinterFault;
    type Warning = PrinterWarning;

    fn info(&self) -> DeviceInfo {
        self.device.info()
    }

    fn is_enabled(&self) -> bool {
        self.device.is_enabled()
    }

    fn take_events(&self) -> Option<EventReceiver<PrinterFault, PrinterWarning>> {
        self.device.take_events()
    }

    async fn initialize(&self) -> Result<()> {
        self.device.initialize().await
    }

    async fn enable(&self) -> Result<()> {
        self.device.enable().await
    }

    async fn disable(&self) -> Result<()> {
        self.device.disable().await
    }

    async fn self_test(&self, clear: bool) -> Result<bool> {
        self.device.self_test(clear).await
    }

    async fn calculate_checksum(&self, seed: i32) -> Result<i32> {
        self.device.calculate_checksum(seed).await
    }
}

impl PrinterImplementation for MockPrinter {
    async fn define_region(&self, region: &PrintableRegion) -> Result<()> {
        self.state.record(PrinterCall::DefineRegion(region.id));
        Ok(())
    }

    async fn define_template(&self, template: &PrintableTemplate) -> Result<()> {
        self.state.record(PrinterCall::DefineTemplate(template.id));
        Ok(())
    }

    async fn submit_command(&self, command: &RenderedCommand) -> Result<bool> {
        self.state.record(PrinterCall::Submit {
            template_id: command.template_id,
            payload: command.payload.to_vec(),
        });

        let mut paused = self.state.paused.subscribe();
        // Sender lives in `state`, so this only ends when unpaused
        let _ = paused.wait_for(|paused| !paused).await;

        let result = self
            .state
            .submit_results
            .lock()
            .ok()
            .and_then(|mut results| results.pop_front())
            .unwrap_or(true);
        Ok(result)
    }

    async fn form_feed(&self) -> Result<()> {
        self.state.record(PrinterCall::FormFeed);
        Ok(())
    }
}

/// Control handle for a [`MockPrinter`].
#[derive(Debug, Clone)]
pub struct MockPrinterHandle {
    device: MockDeviceHandle<PrinterFault, PrinterWarning>,
    state: Arc<PrinterState>,
}

impl MockPrinterHandle {
    /// Lifecycle controls shared with every mock device.
    pub fn device(&self) -> &MockDeviceHandle<PrinterFault, PrinterWarning> {
        &self.device
    }

    /// Make the next submission report failure.
    pub fn fail_next_submit(&self) {
        if let Ok(mut results) = self.state.submit_results.lock() {
            results.push_back(false);
        }
    }

    /// Hold submissions until [`resume_submissions`](Self::resume_submissions).
    pub fn pause_submissions(&self) {
        self.state.paused.send_replace(true);
    }

    pub fn resume_submissions(&self) {
        self.state.paused.send_replace(false);
    }

    pub fn calls(&self) -> Vec<PrinterCall> {
        self.state
            .calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub fn submissions(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, PrinterCall::Submit { .. }))
            .count()
    }

    pub fn form_feeds(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| **call == PrinterCall::FormFeed)
            .count()
    }

    pub fn clear_calls(&self) {
        if let Ok(mut calls) = self.state.calls.lock() {
            calls.clear();
        }
        self.device.clear_calls();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn command() -> RenderedCommand {
        RenderedCommand {
            template_id: 101,
            target: "template".to_string(),
            payload: Bytes::from_static(b"T|101|"),
        }
    }

    #[tokio::test]
    async fn test_scripted_submit_results() {
        let (printer, handle) = MockPrinter::new();
        handle.fail_next_submit();

        assert!(!printer.submit_command(&command()).await.unwrap());
        assert!(printer.submit_command(&command()).await.unwrap());
        assert_eq!(handle.submissions(), 2);
    }

    #[tokio::test]
    async fn test_paused_submission_waits() {
        let (printer, handle) = MockPrinter::new();
        handle.pause_submissions();

        let printer = Arc::new(printer);
        let task = tokio::spawn({
            let printer = printer.clone();
            async move { printer.submit_command(&command()).await }
        });

        tokio::task::yield_now().await;
        assert!(!task.is_finished());

        handle.resume_submissions();
        assert!(task.await.unwrap().unwrap());
    }
}
