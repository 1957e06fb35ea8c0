//! Generic device adapter.
//!
//! [`DeviceAdapter`] composes a [`StateMachine`], a
//! [`FaultWarningAggregator`] and the disable-reason set around one hardware
//! implementation. It translates implementation events into triggers,
//! condition updates and domain events, and reconciles enable/disable
//! requests against the reasons currently asserted.
//!
//! The adapter is owned by exactly one task (see [`crate::service`]); every
//! method takes `&mut self`, so there is no locking here.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use egm_core::{
    AdapterConfig, DeviceIdentity, DeviceOptions, DisableReason, EnableReason, Error,
    OptionsKey, OptionsStore, Result,
};
use tracing::{debug, error, info, warn};

use crate::events::{DeviceEvent, Envelope, EventBus, ImplementationEvent};
use crate::faults::FaultWarningAggregator;
use crate::state_machine::{LogicalState, StateMachine, StateTransition, TransitionContext, Trigger};
use crate::traits::{DeviceImplementation, EventReceiver};

/// Shared event bus for an implementation's condition tags.
pub type SharedBus<I> =
    Arc<dyn EventBus<<I as DeviceImplementation>::Fault, <I as DeviceImplementation>::Warning>>;

/// What the owner must do after an implementation event was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFollowup {
    None,
    /// Reconnected; start hardware inspection off the owner task.
    Inspect,
    /// Hardware inspection finished; run device-specific initialization.
    Initialize,
    /// Connection lost; in-flight work is stale.
    Disconnected,
}

/// Point-in-time copy of everything an observer may read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSnapshot<F, W> {
    pub identity: DeviceIdentity,
    pub state: LogicalState,
    pub faults: Vec<F>,
    pub warnings: Vec<W>,
    pub disable_reasons: DisableReason,
    pub enabled: bool,
    pub can_perform_operation: bool,
    pub render_target: String,
    pub activation_time: Option<DateTime<Utc>>,
}

pub struct DeviceAdapter<I: DeviceImplementation> {
    identity: DeviceIdentity,
    implementation: Arc<I>,
    machine: StateMachine,
    conditions: FaultWarningAggregator<I::Fault, I::Warning>,
    disable_reasons: DisableReason,
    /// A configuration defect asserted `Error`; only an operator lifts it.
    defect: bool,
    /// Faults the adapter raised itself. No hardware clear will come for these.
    local_faults: BTreeSet<I::Fault>,
    /// An operation began and has not reported back yet.
    operation_outstanding: bool,
    options_key: OptionsKey,
    options: DeviceOptions,
    store: Arc<dyn OptionsStore>,
    bus: SharedBus<I>,
    /// Bumped on every disconnect; outcomes tagged with an older epoch are stale.
    epoch: u64,
    /// Accepted transitions not yet seen by the owner.
    pending: Vec<StateTransition>,
}

impl<I: DeviceImplementation> DeviceAdapter<I> {
    /// Build an adapter around `implementation`.
    ///
    /// Takes the implementation's event receiver and reads (or creates) the
    /// persisted options block.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid, the event receiver was already
    /// taken, or the options block cannot be read.
    pub async fn open(
        config: &AdapterConfig,
        implementation: Arc<I>,
        store: Arc<dyn OptionsStore>,
        bus: SharedBus<I>,
    ) -> Result<(Self, EventReceiver<I::Fault, I::Warning>)> {
        let identity = config.identity()?;
        let events = implementation
            .take_events()
            .ok_or_else(|| Error::EventsUnavailable(identity.to_string()))?;

        let options_key = config.options_key();
        let options = store
            .load_or_create(&options_key, &config.default_options())
            .await?;

        let info = implementation.info();
        info!(
            "Opened {} ({} {}), render target '{}'",
            identity, info.manufacturer, info.model, options.render_target
        );

        let adapter = Self {
            identity,
            implementation,
            machine: StateMachine::new(),
            conditions: FaultWarningAggregator::new(),
            disable_reasons: DisableReason::empty(),
            defect: false,
            local_faults: BTreeSet::new(),
            operation_outstanding: false,
            options_key,
            options,
            store,
            bus,
            epoch: 0,
            pending: Vec::new(),
        };
        Ok((adapter, events))
    }

    pub fn identity(&self) -> DeviceIdentity {
        self.identity
    }

    pub fn implementation(&self) -> &Arc<I> {
        &self.implementation
    }

    pub fn state(&self) -> LogicalState {
        self.machine.current_state()
    }

    pub fn machine(&self) -> &StateMachine {
        &self.machine
    }

    pub fn disable_reasons(&self) -> DisableReason {
        self.disable_reasons
    }

    pub fn conditions(&self) -> &FaultWarningAggregator<I::Fault, I::Warning> {
        &self.conditions
    }

    pub fn options(&self) -> &DeviceOptions {
        &self.options
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn has_defect(&self) -> bool {
        self.defect
    }

    /// No disable reason is asserted and the hardware reports itself enabled.
    pub fn is_enabled(&self) -> bool {
        self.disable_reasons.is_empty() && self.implementation.is_enabled()
    }

    /// `BeginOperation` is permitted and no earlier operation is outstanding.
    pub fn can_perform_operation(&self) -> bool {
        !self.operation_outstanding && self.machine.can_fire(Trigger::BeginOperation)
    }

    pub fn snapshot(&self) -> DeviceSnapshot<I::Fault, I::Warning> {
        DeviceSnapshot {
            identity: self.identity,
            state: self.state(),
            faults: self.conditions.faults().iter().copied().collect(),
            warnings: self.conditions.warnings().iter().copied().collect(),
            disable_reasons: self.disable_reasons,
            enabled: self.is_enabled(),
            can_perform_operation: self.can_perform_operation(),
            render_target: self.options.render_target.clone(),
            activation_time: self.options.activation_time,
        }
    }

    /// Transitions accepted since the last call, oldest first.
    pub fn drain_transitions(&mut self) -> Vec<StateTransition> {
        std::mem::take(&mut self.pending)
    }

    pub fn publish(&self, event: DeviceEvent<I::Fault, I::Warning>) {
        self.bus.publish(Envelope::new(self.identity, event));
    }

    /// Fire `trigger` with the current enabled condition as context.
    pub fn fire(&mut self, trigger: Trigger) -> Option<StateTransition> {
        let ctx = TransitionContext {
            enabled: self.is_enabled(),
        };
        let transition = self.machine.fire(trigger, ctx)?;
        self.pending.push(transition.clone());
        Some(transition)
    }

    /// Fire `BeginOperation` and announce it.
    pub fn begin_operation(&mut self) -> bool {
        if !self.can_perform_operation() || self.fire(Trigger::BeginOperation).is_none() {
            return false;
        }
        self.operation_outstanding = true;
        self.publish(DeviceEvent::OperationStarted);
        true
    }

    /// Fire `OperationComplete`; returns whether the device went back to Idle.
    pub fn complete_operation(&mut self) -> bool {
        self.operation_outstanding = false;
        self.fire(Trigger::OperationComplete).is_some()
    }

    /// The outstanding operation reported back, however it ended.
    pub fn end_operation(&mut self) {
        self.operation_outstanding = false;
    }

    /// Lift the reasons `reason` covers and re-enable if none remain.
    ///
    /// An `Enabled` event is published either way.
    ///
    /// An operator enable also withdraws the faults the adapter raised
    /// itself and acknowledges a configuration defect.
    pub async fn enable(&mut self, reason: EnableReason) {
        if reason.contains(EnableReason::OPERATOR) {
            self.clear_local_faults();
            if std::mem::take(&mut self.defect) {
                info!("{} configuration defect acknowledged", self.identity);
            }
        }

        let mut lifted = reason.lifts();
        if self.conditions.has_faults() || self.defect {
            // Active faults and defects keep the error reason
            lifted.remove(DisableReason::ERROR);
        }
        self.disable_reasons.remove(lifted);

        if self.is_enabled() {
            if self.fire(Trigger::Enable).is_some() {
                info!("{} enabled ({})", self.identity, reason);
                if let Err(e) = self.implementation.enable().await {
                    error!("Implementation enable failed for {}: {}", self.identity, e);
                }
                self.ensure_activation_time().await;
            }
        } else {
            debug!(
                "{} remains disabled after enable ({}): reasons [{}], hardware enabled {}",
                self.identity,
                reason,
                self.disable_reasons,
                self.implementation.is_enabled()
            );
        }

        self.publish(DeviceEvent::Enabled { reason });
    }

    /// Assert `reason`. The first reason asserted disables the device.
    pub async fn disable(&mut self, reason: DisableReason) {
        let first = self.disable_reasons.is_empty();
        let added = !self.disable_reasons.contains(reason);
        self.disable_reasons.insert(reason);

        if first && self.fire(Trigger::Disable).is_some() {
            info!("{} disabled ({})", self.identity, reason);
            if let Err(e) = self.implementation.disable().await {
                error!("Implementation disable failed for {}: {}", self.identity, e);
            }
        }

        if added {
            self.publish(DeviceEvent::Disabled {
                reasons: self.disable_reasons,
                text: self.disable_reasons.describe(),
            });
        }
    }

    /// Disable with `Error` for a configuration problem (missing template,
    /// region or renderer). Fault clears and resets do not lift it.
    pub async fn disable_for_defect(&mut self) {
        self.defect = true;
        self.disable(DisableReason::ERROR).await;
    }

    /// Record a fault the adapter detected itself. An operator enable
    /// withdraws it.
    pub async fn raise_local_fault(&mut self, fault: I::Fault) -> bool {
        if !self.add_fault(fault).await {
            return false;
        }
        self.local_faults.insert(fault);
        true
    }

    fn clear_local_faults(&mut self) {
        for fault in std::mem::take(&mut self.local_faults) {
            if self.conditions.clear_fault(fault) {
                info!("{} fault withdrawn: {}", self.identity, fault);
                self.publish(DeviceEvent::FaultCleared(fault));
            }
        }
    }

    /// Record a fault. The first active fault disables the device.
    pub async fn add_fault(&mut self, fault: I::Fault) -> bool {
        if !self.conditions.add_fault(fault) {
            return false;
        }
        warn!("{} fault raised: {}", self.identity, fault);
        self.publish(DeviceEvent::FaultRaised(fault));
        if self.conditions.faults().len() == 1 {
            self.disable(DisableReason::ERROR).await;
        }
        true
    }

    /// Clear a fault. Clearing the last one resets the device when the
    /// error reason is the only one asserted.
    pub async fn clear_fault(&mut self, fault: I::Fault) -> bool {
        if !self.conditions.clear_fault(fault) {
            return false;
        }
        self.local_faults.remove(&fault);
        info!("{} fault cleared: {}", self.identity, fault);
        self.publish(DeviceEvent::FaultCleared(fault));
        if !self.conditions.has_faults()
            && !self.defect
            && self.disable_reasons == DisableReason::ERROR
        {
            self.enable(EnableReason::RESET).await;
        }
        true
    }

    pub fn add_warning(&mut self, warning: I::Warning) -> bool {
        if !self.conditions.add_warning(warning) {
            return false;
        }
        info!("{} warning raised: {}", self.identity, warning);
        self.publish(DeviceEvent::WarningRaised(warning));
        true
    }

    pub fn clear_warning(&mut self, warning: I::Warning) -> bool {
        if !self.conditions.clear_warning(warning) {
            return false;
        }
        info!("{} warning cleared: {}", self.identity, warning);
        self.publish(DeviceEvent::WarningCleared(warning));
        true
    }

    /// Enter `Inspecting` from `Uninitialized`.
    ///
    /// The owner then asks the implementation to inspect, off its own task:
    /// the implementation reports back on the event channel the owner drains.
    pub fn inspect(&mut self) -> bool {
        if self.fire(Trigger::Inspecting).is_none() {
            return false;
        }
        debug!("Inspecting {}", self.identity);
        true
    }

    /// The implementation could not start inspecting.
    pub fn inspection_failed(&mut self) {
        if self.fire(Trigger::InspectionFailed).is_some() {
            self.publish(DeviceEvent::InspectionFailed);
        }
    }

    /// Finish device-specific initialization.
    pub async fn complete_initialization(&mut self, succeeded: bool) {
        if !succeeded {
            warn!("Initialization of {} failed", self.identity);
            if self.fire(Trigger::InspectionFailed).is_some() {
                self.publish(DeviceEvent::InspectionFailed);
            }
            return;
        }

        let Some(transition) = self.fire(Trigger::Initialized) else {
            return;
        };
        info!("{} initialized, now {}", self.identity, transition.to);
        self.publish(DeviceEvent::Initialized);
        if transition.to == LogicalState::Idle {
            self.ensure_activation_time().await;
        }
    }

    /// Persist a new render target.
    ///
    /// # Errors
    ///
    /// Returns the storage error; the previous target stays in effect.
    pub async fn set_render_target(&mut self, target: &str) -> Result<()> {
        let mut updated = self.options.clone();
        updated.render_target = target.to_string();
        self.store.save(&self.options_key, &updated).await?;
        info!("{} render target set to '{}'", self.identity, target);
        self.options = updated;
        Ok(())
    }

    async fn ensure_activation_time(&mut self) {
        if self.options.is_activated() {
            return;
        }
        let mut updated = self.options.clone();
        updated.activation_time = Some(Utc::now());
        match self.store.save(&self.options_key, &updated).await {
            Ok(()) => {
                info!("{} activated", self.identity);
                self.options = updated;
            }
            Err(e) => error!(
                "Failed to persist activation time for {}: {}",
                self.identity, e
            ),
        }
    }

    /// Translate one implementation event.
    pub async fn handle_event(
        &mut self,
        event: ImplementationEvent<I::Fault, I::Warning>,
    ) -> EventFollowup {
        match event {
            ImplementationEvent::Connected => {
                if self.fire(Trigger::Connected).is_some() {
                    info!("{} connected", self.identity);
                    // Hardware re-reports whatever is still active
                    self.conditions.clear();
                    self.local_faults.clear();
                    if !self.defect {
                        self.disable_reasons.remove(DisableReason::ERROR);
                    }
                    self.publish(DeviceEvent::Connected);
                    return EventFollowup::Inspect;
                }
            }
            ImplementationEvent::Disconnected => {
                if let Some(transition) = self.fire(Trigger::Disconnected) {
                    if !transition.is_reentry() {
                        warn!("{} disconnected while {}", self.identity, transition.from);
                        self.epoch += 1;
                        self.operation_outstanding = false;
                        self.publish(DeviceEvent::Disconnected);
                        return EventFollowup::Disconnected;
                    }
                }
            }
            ImplementationEvent::Initialized => {
                if self.fire(Trigger::Initializing).is_some() {
                    return EventFollowup::Initialize;
                }
            }
            ImplementationEvent::InitializationFailed => {
                if self.fire(Trigger::InspectionFailed).is_some() {
                    warn!("{} inspection failed", self.identity);
                    self.publish(DeviceEvent::InspectionFailed);
                }
            }
            ImplementationEvent::Enabled => self.enable(EnableReason::DEVICE).await,
            ImplementationEvent::Disabled => self.disable(DisableReason::DEVICE).await,
            ImplementationEvent::FaultOccurred(fault) => {
                self.add_fault(fault).await;
            }
            ImplementationEvent::FaultCleared(fault) => {
                self.clear_fault(fault).await;
            }
            ImplementationEvent::WarningOccurred(warning) => {
                self.add_warning(warning);
            }
            ImplementationEvent::WarningCleared(warning) => {
                self.clear_warning(warning);
            }
            ImplementationEvent::OperationInProgress => {
                debug!("{} reports operation in progress", self.identity);
            }
            ImplementationEvent::OperationCompleted => {
                debug!("{} reports operation completed", self.identity);
            }
            ImplementationEvent::OperationIncomplete => {
                warn!("{} reports operation incomplete", self.identity);
                self.publish(DeviceEvent::OperationIncomplete);
            }
        }
        EventFollowup::None
    }
}

impl<I: DeviceImplementation> std::fmt::Debug for DeviceAdapter<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceAdapter")
            .field("identity", &self.identity)
            .field("state", &self.state())
            .field("disable_reasons", &self.disable_reasons)
            .field("defect", &self.defect)
            .field("epoch", &self.epoch)
            .finish_non_exhaustive()
    }
}
