//! Print pipeline.
//!
//! [`PrintPipeline`] is the printer's [`Pipeline`] strategy. A submission
//! goes through these steps:
//!
//! 1. rejected at once unless the printer can begin an operation
//! 2. the template for the ticket type is resolved from the working set; a
//!    missing template or region disables the printer with `Error` until an
//!    operator enables it
//! 3. the ticket is rendered by the renderer named by the render target
//! 4. `BeginOperation` fires and the command is submitted on its own task
//! 5. if the printer refuses it while still `Busy`, the device is
//!    re-initialized once (definitions, self test, checksum); success
//!    returns to `Idle`, failure raises `OtherFault`, which stays until an
//!    operator enables the printer
//!
//! A failure reported while no longer `Busy` gets no recovery, only an
//! `OperationError` event.
//!
//! Form feeds requested while the printer is not idle, or while a ticket is
//! outstanding, are deferred and run once on the next entry into `Idle`.

use std::sync::{Arc, Mutex};

use egm_hardware::{DeviceEvent, LogicalState, Pipeline, ServiceContext};
use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::descriptors::{PrintableRegion, PrintableTemplate};
use crate::render::{RenderedCommand, RendererCache, RendererRegistry};
use crate::resolver::{ResolverOverrideStore, WorkingSet};
use crate::ticket::Ticket;
use crate::traits::{PrinterFault, PrinterImplementation};

/// Seed for the readiness checksum computed after initialization.
pub const READINESS_CHECKSUM_SEED: i32 = 0;

#[derive(Debug)]
pub enum PrinterCommand {
    Submit(Ticket, oneshot::Sender<bool>),
    AddRegion(PrintableRegion, oneshot::Sender<()>),
    AddTemplate(PrintableTemplate, oneshot::Sender<()>),
    FormFeed(oneshot::Sender<FormFeedDisposition>),
    ReadinessChecksum(oneshot::Sender<Option<i32>>),
}

/// What happened to a form-feed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormFeedDisposition {
    Executed,
    /// Will run on the next entry into `Idle`.
    Deferred,
}

/// Result of a submission task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrintOutcome {
    ticket: u64,
    result: SubmitResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubmitResult {
    Completed,
    /// `busy` is the state seen when the failure was reported.
    Failed { busy: bool, recovered: bool },
}

struct InFlight {
    ticket: u64,
    reply: oneshot::Sender<bool>,
}

pub struct PrintPipeline {
    resolver: ResolverOverrideStore,
    working: Arc<WorkingSet>,
    renderers: RendererCache,
    readiness: Arc<Mutex<Option<i32>>>,
    in_flight: Option<InFlight>,
    next_ticket: u64,
    form_feed_pending: bool,
}

impl PrintPipeline {
    pub fn new(resolver: ResolverOverrideStore, renderers: RendererRegistry) -> Self {
        Self {
            resolver,
            working: Arc::new(WorkingSet::default()),
            renderers: RendererCache::new(renderers),
            readiness: Arc::new(Mutex::new(None)),
            in_flight: None,
            next_ticket: 0,
            form_feed_pending: false,
        }
    }

    fn refresh_working_set<I: PrinterImplementation>(&mut self, implementation: &I) {
        self.working = Arc::new(self.resolver.working_set(&implementation.info()));
    }

    async fn submit<I: PrinterImplementation>(
        &mut self,
        cx: &mut ServiceContext<'_, I, PrintOutcome>,
        ticket: Ticket,
        reply: oneshot::Sender<bool>,
    ) {
        let identity = cx.device.identity();
        if !cx.device.can_perform_operation() {
            debug!("{} cannot print while {}", identity, cx.device.state());
            cx.reply(reply, false);
            return;
        }

        let command = match self.prepare(cx, &ticket) {
            Ok(command) => command,
            Err(Prepare::Defect(e)) => {
                error!("{} configuration defect: {}", identity, e);
                cx.device.disable_for_defect().await;
                cx.reply(reply, false);
                return;
            }
            Err(Prepare::Payload(e)) => {
                warn!("{} rejected ticket '{}': {}", identity, ticket.ticket_type, e);
                cx.device.publish(DeviceEvent::OperationError);
                cx.reply(reply, false);
                return;
            }
        };

        if !cx.device.begin_operation() {
            cx.reply(reply, false);
            return;
        }

        self.next_ticket += 1;
        let ticket_id = self.next_ticket;
        self.in_flight = Some(InFlight {
            ticket: ticket_id,
            reply,
        });
        info!(
            "{} printing '{}' with template {}",
            identity, ticket.ticket_type, command.template_id
        );

        let implementation = cx.device.implementation().clone();
        let snapshots = cx.snapshots();
        let working = self.working.clone();
        let readiness = self.readiness.clone();
        cx.spawn(async move {
            let printed = match implementation.submit_command(&command).await {
                Ok(printed) => printed,
                Err(e) => {
                    warn!("Submission to {} failed: {}", identity, e);
                    false
                }
            };
            if printed {
                return PrintOutcome {
                    ticket: ticket_id,
                    result: SubmitResult::Completed,
                };
            }

            let busy = snapshots.borrow().state == LogicalState::Busy;
            let recovered = if busy {
                warn!("{} refused ticket while busy, re-initializing", identity);
                prepare_device(implementation.as_ref(), &working, &readiness).await
            } else {
                false
            };
            PrintOutcome {
                ticket: ticket_id,
                result: SubmitResult::Failed { busy, recovered },
            }
        });
    }

    fn prepare<I: PrinterImplementation>(
        &mut self,
        cx: &ServiceContext<'_, I, PrintOutcome>,
        ticket: &Ticket,
    ) -> Result<RenderedCommand, Prepare> {
        let resolved = self
            .working
            .resolve(&ticket.ticket_type)
            .map_err(Prepare::Defect)?;
        let renderer = self
            .renderers
            .resolve(&cx.device.options().render_target)
            .map_err(Prepare::Defect)?;
        renderer.render(ticket, &resolved).map_err(Prepare::Payload)
    }

    async fn form_feed<I: PrinterImplementation>(
        &mut self,
        cx: &mut ServiceContext<'_, I, PrintOutcome>,
    ) -> FormFeedDisposition {
        if cx.device.state() == LogicalState::Idle && self.in_flight.is_none() {
            run_form_feed(cx).await;
            FormFeedDisposition::Executed
        } else {
            debug!("{} form feed deferred while {}", cx.device.identity(), cx.device.state());
            self.form_feed_pending = true;
            FormFeedDisposition::Deferred
        }
    }

    async fn run_deferred<I: PrinterImplementation>(
        &mut self,
        cx: &mut ServiceContext<'_, I, PrintOutcome>,
    ) {
        if self.form_feed_pending
            && self.in_flight.is_none()
            && cx.device.state() == LogicalState::Idle
        {
            self.form_feed_pending = false;
            info!("{} running deferred form feed", cx.device.identity());
            run_form_feed(cx).await;
        }
    }
}

enum Prepare {
    /// Configuration problem; disables the printer.
    Defect(egm_core::Error),
    /// Problem with this ticket only.
    Payload(egm_core::Error),
}

async fn run_form_feed<I: PrinterImplementation>(cx: &mut ServiceContext<'_, I, PrintOutcome>) {
    if let Err(e) = cx.device.implementation().form_feed().await {
        error!("Form feed on {} failed: {}", cx.device.identity(), e);
    }
}

/// Download definitions, self test and record the readiness checksum.
async fn prepare_device<I: PrinterImplementation>(
    implementation: &I,
    working: &WorkingSet,
    readiness: &Mutex<Option<i32>>,
) -> bool {
    for region in working.regions() {
        if let Err(e) = implementation.define_region(region).await {
            error!("Defining region {} failed: {}", region.id, e);
            return false;
        }
    }
    for template in working.templates() {
        if let Err(e) = implementation.define_template(template).await {
            error!("Defining template {} failed: {}", template.id, e);
            return false;
        }
    }

    match implementation.self_test(false).await {
        Ok(true) => {}
        Ok(false) => {
            warn!("Printer self test failed");
            return false;
        }
        Err(e) => {
            error!("Printer self test could not run: {}", e);
            return false;
        }
    }

    match implementation.calculate_checksum(READINESS_CHECKSUM_SEED).await {
        Ok(checksum) => {
            debug!("Readiness checksum {:#x}", checksum);
            if let Ok(mut slot) = readiness.lock() {
                *slot = Some(checksum);
            }
            true
        }
        Err(e) => {
            error!("Readiness checksum failed: {}", e);
            false
        }
    }
}

impl<I: PrinterImplementation> Pipeline<I> for PrintPipeline {
    type Command = PrinterCommand;
    type Outcome = PrintOutcome;

    fn initialization(&mut self, implementation: Arc<I>) -> BoxFuture<'static, bool> {
        self.refresh_working_set(implementation.as_ref());
        let working = self.working.clone();
        let readiness = self.readiness.clone();
        async move { prepare_device(implementation.as_ref(), &working, &readiness).await }.boxed()
    }

    async fn handle_command(
        &mut self,
        cx: &mut ServiceContext<'_, I, PrintOutcome>,
        command: PrinterCommand,
    ) {
        match command {
            PrinterCommand::Submit(ticket, reply) => self.submit(cx, ticket, reply).await,
            PrinterCommand::AddRegion(region, reply) => {
                debug!("Adding region {} '{}'", region.id, region.name);
                self.resolver.add_region(region);
                self.refresh_working_set(cx.device.implementation().as_ref());
                cx.reply(reply, ());
            }
            PrinterCommand::AddTemplate(template, reply) => {
                debug!("Adding template {} '{}'", template.id, template.name);
                self.resolver.add_template(template);
                self.refresh_working_set(cx.device.implementation().as_ref());
                cx.reply(reply, ());
            }
            PrinterCommand::FormFeed(reply) => {
                let disposition = self.form_feed(cx).await;
                cx.reply(reply, disposition);
            }
            PrinterCommand::ReadinessChecksum(reply) => {
                let checksum = self.readiness.lock().ok().and_then(|slot| *slot);
                cx.reply(reply, checksum);
            }
        }
    }

    async fn handle_outcome(
        &mut self,
        cx: &mut ServiceContext<'_, I, PrintOutcome>,
        outcome: PrintOutcome,
    ) {
        let Some(in_flight) = self.in_flight.take_if(|f| f.ticket == outcome.ticket) else {
            debug!("Ignoring outcome of ticket {}", outcome.ticket);
            return;
        };

        let printed = match outcome.result {
            SubmitResult::Completed => {
                cx.device.complete_operation();
                cx.device.publish(DeviceEvent::OperationCompleted);
                true
            }
            SubmitResult::Failed {
                busy: true,
                recovered: true,
            } => {
                info!("{} recovered after failed print", cx.device.identity());
                cx.device.complete_operation();
                cx.device.publish(DeviceEvent::OperationFailed { recovered: true });
                false
            }
            SubmitResult::Failed {
                busy: true,
                recovered: false,
            } => {
                error!("{} could not recover after failed print", cx.device.identity());
                cx.device.publish(DeviceEvent::OperationFailed { recovered: false });
                cx.device.raise_local_fault(PrinterFault::OtherFault).await;
                false
            }
            SubmitResult::Failed { busy: false, .. } => {
                warn!("{} print failed outside of an operation", cx.device.identity());
                cx.device.publish(DeviceEvent::OperationError);
                false
            }
        };
        cx.device.end_operation();
        cx.reply(in_flight.reply, printed);

        // An OperationError leaves the state as is, so Idle is not re-entered
        self.run_deferred(cx).await;
    }

    async fn state_entered(
        &mut self,
        cx: &mut ServiceContext<'_, I, PrintOutcome>,
        state: LogicalState,
    ) {
        if state == LogicalState::Idle {
            self.run_deferred(cx).await;
        }
    }

    fn disconnected(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            debug!("Abandoning ticket {} on disconnect", in_flight.ticket);
            let _ = in_flight.reply.send(false);
        }
    }

    fn render_target_changed(&mut self, target: &str) {
        debug!("Render target now '{}'", target);
        self.renderers.invalidate();
    }
}

impl std::fmt::Debug for PrintPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrintPipeline")
            .field("in_flight", &self.in_flight.as_ref().map(|f| f.ticket))
            .field("form_feed_pending", &self.form_feed_pending)
            .finish_non_exhaustive()
    }
}
