//! The scripted simulator session.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use egm_core::{AdapterConfig, OptionsStore};
use egm_hardware::{BroadcastBus, LogicalState};
use egm_printer::mock::MockPrinterHandle;
use egm_printer::{
    AnyPrinter, DescriptorSet, Justification, OverrideRule, PrintPipeline, PrintableRegion,
    PrintableTemplate, PrinterFault, PrinterHandle, PrinterWarning, RendererRegistry,
    ResolverOverrideStore, Ticket,
};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::timeout;
use tracing::{info, warn};

const STATE_TIMEOUT: Duration = Duration::from_secs(5);

/// Descriptors used when none are given on the command line.
pub fn demo_descriptors() -> DescriptorSet {
    DescriptorSet {
        regions: vec![
            PrintableRegion::new(1, "amount", "F2").with_justification(Justification::Right),
            PrintableRegion::new(2, "validation", "F3"),
            PrintableRegion::new(3, "machine", "F1"),
        ],
        templates: vec![
            PrintableTemplate::new(101, "cashout", vec![3, 1, 2]),
            PrintableTemplate::new(102, "jackpot", vec![3, 1]),
        ],
        overrides: vec![OverrideRule::new("Mock GDS").font(1, "F7")],
    }
}

pub async fn run(
    config: &AdapterConfig,
    printer: AnyPrinter,
    control: MockPrinterHandle,
    store: Arc<dyn OptionsStore>,
    descriptors: DescriptorSet,
    render_target: Option<String>,
) -> Result<()> {
    let bus = Arc::new(BroadcastBus::<PrinterFault, PrinterWarning>::new(256));
    let mut events = bus.subscribe();
    let mut logger = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(envelope) => info!("[{}] {:?}", envelope.device, envelope.event),
                Err(RecvError::Lagged(missed)) => warn!("Event log skipped {} events", missed),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let pipeline = PrintPipeline::new(
        ResolverOverrideStore::from_descriptors(descriptors),
        RendererRegistry::with_builtin(),
    );
    let printer = PrinterHandle::open(config, Arc::new(printer), store, bus, pipeline).await?;
    wait_for(&printer, LogicalState::Idle).await?;

    if let Some(target) = render_target {
        printer.set_render_target(target).await?;
    }
    info!(
        "Printer ready: render target '{}', activated {:?}, checksum {:?}",
        printer.render_target(),
        printer.activation_time(),
        printer.readiness_checksum().await?
    );

    let printed = printer.submit(cashout("$20.00")).await?;
    info!("Cashout printed: {}", printed);

    control.device().warning(PrinterWarning::PaperLow).await?;
    control.device().fault(PrinterFault::PaperEmpty).await?;
    wait_for(&printer, LogicalState::Disabled).await?;
    let printed = printer.submit(cashout("$5.00")).await?;
    info!("Cashout while out of paper printed: {}", printed);

    control.device().clear_fault(PrinterFault::PaperEmpty).await?;
    wait_for(&printer, LogicalState::Idle).await?;
    info!("Form feed: {:?}", printer.form_feed().await?);

    control.fail_next_submit();
    let printed = printer.submit(cashout("$7.50")).await?;
    info!("Refused cashout printed: {}, printer {}", printed, printer.state());

    control.device().disconnect().await?;
    wait_for(&printer, LogicalState::Disconnected).await?;
    info!("Form feed while disconnected: {:?}", printer.form_feed().await?);
    control.device().connect().await?;
    wait_for(&printer, LogicalState::Idle).await?;

    let jackpot = Ticket::new("jackpot")
        .field("machine", "EGM 0042")
        .field("amount", "$1,200.00");
    let printed = printer.submit(jackpot).await?;
    info!("Jackpot printed: {}", printed);

    let snapshot = printer.snapshot();
    info!(
        "Session done: {} {}, faults {:?}, warnings {:?}, {} submissions, {} form feeds",
        snapshot.identity,
        snapshot.state,
        snapshot.faults,
        snapshot.warnings,
        control.submissions(),
        control.form_feeds()
    );

    printer.shutdown().await?;
    // The service owned the last bus sender, so the log drains and closes
    if timeout(STATE_TIMEOUT, &mut logger).await.is_err() {
        warn!("Event log still open after shutdown");
        logger.abort();
    }
    Ok(())
}

fn cashout(amount: &str) -> Ticket {
    Ticket::new("cashout")
        .field("machine", "EGM 0042")
        .field("amount", amount)
        .field("validation", "00-4217-9981-0032")
}

async fn wait_for(printer: &PrinterHandle<AnyPrinter>, state: LogicalState) -> Result<()> {
    timeout(STATE_TIMEOUT, printer.wait_for_state(state))
        .await
        .with_context(|| format!("printer did not reach {} in time", state))??;
    Ok(())
}
