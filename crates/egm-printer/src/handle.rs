//! Protocol-facing printer handle.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use egm_core::{AdapterConfig, DisableReason, EnableReason, OptionsStore, Result};
use egm_hardware::{
    Command, DeviceAdapter, DeviceService, LogicalState, ServiceHandle, SharedBus, Snapshot,
};

use crate::descriptors::{PrintableRegion, PrintableTemplate};
use crate::pipeline::{FormFeedDisposition, PrintPipeline, PrinterCommand};
use crate::ticket::Ticket;
use crate::traits::{PrinterFault, PrinterImplementation, PrinterWarning};

/// A running printer adapter.
///
/// Reads come from the latest published snapshot and never wait on the
/// service; commands are queued to it and answered in order.
pub struct PrinterHandle<I: PrinterImplementation> {
    service: ServiceHandle<I, PrinterCommand>,
}

impl<I: PrinterImplementation> PrinterHandle<I> {
    /// Open the adapter for `implementation` and start its service.
    ///
    /// # Errors
    ///
    /// Propagates adapter construction failures.
    pub async fn open(
        config: &AdapterConfig,
        implementation: Arc<I>,
        store: Arc<dyn OptionsStore>,
        bus: SharedBus<I>,
        pipeline: PrintPipeline,
    ) -> Result<Self> {
        let (adapter, events) = DeviceAdapter::open(config, implementation, store, bus).await?;
        let service = DeviceService::spawn(adapter, events, pipeline, config.command_capacity);
        Ok(Self { service })
    }

    /// Print `ticket`. `false` if the printer could not print it.
    pub async fn submit(&self, ticket: Ticket) -> Result<bool> {
        self.service
            .request(|reply| Command::Pipeline(PrinterCommand::Submit(ticket, reply)))
            .await
    }

    pub async fn add_region(&self, region: PrintableRegion) -> Result<()> {
        self.service
            .request(|reply| Command::Pipeline(PrinterCommand::AddRegion(region, reply)))
            .await
    }

    pub async fn add_template(&self, template: PrintableTemplate) -> Result<()> {
        self.service
            .request(|reply| Command::Pipeline(PrinterCommand::AddTemplate(template, reply)))
            .await
    }

    pub async fn form_feed(&self) -> Result<FormFeedDisposition> {
        self.service
            .request(|reply| Command::Pipeline(PrinterCommand::FormFeed(reply)))
            .await
    }

    /// Checksum recorded by the last successful initialization or recovery.
    pub async fn readiness_checksum(&self) -> Result<Option<i32>> {
        self.service
            .request(|reply| Command::Pipeline(PrinterCommand::ReadinessChecksum(reply)))
            .await
    }

    pub async fn enable(&self, reason: EnableReason) -> Result<()> {
        self.service.enable(reason).await
    }

    pub async fn disable(&self, reason: DisableReason) -> Result<()> {
        self.service.disable(reason).await
    }

    pub async fn inspect(&self) -> Result<bool> {
        self.service.inspect().await
    }

    pub async fn set_render_target(&self, target: impl Into<String>) -> Result<()> {
        self.service.set_render_target(target).await
    }

    pub fn snapshot(&self) -> Snapshot<I> {
        self.service.snapshot()
    }

    pub fn state(&self) -> LogicalState {
        self.service.state()
    }

    pub fn can_perform_operation(&self) -> bool {
        self.snapshot().can_perform_operation
    }

    pub fn faults(&self) -> Vec<PrinterFault> {
        self.snapshot().faults
    }

    pub fn warnings(&self) -> Vec<PrinterWarning> {
        self.snapshot().warnings
    }

    pub fn render_target(&self) -> String {
        self.snapshot().render_target
    }

    pub fn activation_time(&self) -> Option<DateTime<Utc>> {
        self.snapshot().activation_time
    }

    pub async fn wait_for_state(&self, state: LogicalState) -> Result<Snapshot<I>> {
        self.service.wait_for_state(state).await
    }

    pub async fn shutdown(self) -> Result<()> {
        self.service.shutdown().await
    }
}
