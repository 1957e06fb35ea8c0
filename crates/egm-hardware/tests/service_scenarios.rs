use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use egm_core::constants::DEFAULT_EVENT_CAPACITY;
use egm_core::{AdapterConfig, DeviceKind, DisableReason, EnableReason, MemoryOptionsStore};
use egm_hardware::mock::{MockCall, MockDevice, MockDeviceHandle};
use egm_hardware::{
    BasicPipeline, BroadcastBus, DeviceAdapter, DeviceEvent, DeviceService, Envelope,
    ImplementationEvent, LogicalState, ServiceHandle,
};
use rstest::rstest;
use tokio::sync::broadcast;
use tokio::time::timeout;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Fault {
    PaperEmpty,
    PaperJam,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Warning {
    PaperLow,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

type Mock = MockDevice<Fault, Warning>;
type Events = broadcast::Receiver<Envelope<Fault, Warning>>;

struct Harness {
    handle: ServiceHandle<Mock, std::convert::Infallible>,
    control: MockDeviceHandle<Fault, Warning>,
    events: Events,
}

async fn start(configure: impl FnOnce(&MockDeviceHandle<Fault, Warning>)) -> Harness {
    let (device, control) = Mock::new();
    configure(&control);

    let bus = Arc::new(BroadcastBus::<Fault, Warning>::new(128));
    let events = bus.subscribe();
    let config = AdapterConfig::new(DeviceKind::NoteAcceptor, "mock");

    let (adapter, rx) = DeviceAdapter::open(
        &config,
        Arc::new(device),
        Arc::new(MemoryOptionsStore::new()),
        bus,
    )
    .await
    .unwrap();
    let handle = DeviceService::spawn(adapter, rx, BasicPipeline, config.command_capacity);

    Harness {
        handle,
        control,
        events,
    }
}

async fn wait_for(handle: &ServiceHandle<Mock, std::convert::Infallible>, state: LogicalState) {
    timeout(Duration::from_secs(2), handle.wait_for_state(state))
        .await
        .expect("timed out waiting for state")
        .unwrap();
}

/// Collect published events until `last` shows up.
async fn events_until(events: &mut Events, last: &DeviceEvent<Fault, Warning>) -> Vec<DeviceEvent<Fault, Warning>> {
    let mut seen = Vec::new();
    loop {
        let envelope = timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("timed out waiting for event")
            .unwrap();
        let done = &envelope.event == last;
        seen.push(envelope.event);
        if done {
            return seen;
        }
    }
}

#[tokio::test]
async fn test_fault_disables_and_clear_resets() {
    let mut h = start(|_| {}).await;
    wait_for(&h.handle, LogicalState::Idle).await;
    assert!(h.handle.snapshot().can_perform_operation);

    h.control.fault(Fault::PaperEmpty).await.unwrap();
    wait_for(&h.handle, LogicalState::Disabled).await;
    let snapshot = h.handle.snapshot();
    assert!(!snapshot.can_perform_operation);
    assert_eq!(snapshot.faults, vec![Fault::PaperEmpty]);
    assert_eq!(snapshot.disable_reasons, DisableReason::ERROR);

    let raised = events_until(&mut h.events, &DeviceEvent::FaultRaised(Fault::PaperEmpty)).await;
    assert!(raised.contains(&DeviceEvent::Initialized));

    h.control.clear_fault(Fault::PaperEmpty).await.unwrap();
    wait_for(&h.handle, LogicalState::Idle).await;

    let reset = DeviceEvent::Enabled {
        reason: EnableReason::RESET,
    };
    let tail = events_until(&mut h.events, &reset).await;
    let cleared_at = tail
        .iter()
        .position(|e| *e == DeviceEvent::FaultCleared(Fault::PaperEmpty))
        .expect("fault cleared event");
    assert_eq!(cleared_at, tail.len() - 2);

    h.handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_two_faults_need_both_cleared() {
    let h = start(|_| {}).await;
    wait_for(&h.handle, LogicalState::Idle).await;

    h.control.fault(Fault::PaperEmpty).await.unwrap();
    h.control.fault(Fault::PaperJam).await.unwrap();
    h.control.fault(Fault::PaperJam).await.unwrap();
    h.control.clear_fault(Fault::PaperEmpty).await.unwrap();

    // Round-trip a command so every event above has been handled
    h.handle.disable(DisableReason::ERROR).await.unwrap();
    let snapshot = h.handle.snapshot();
    assert_eq!(snapshot.state, LogicalState::Disabled);
    assert_eq!(snapshot.faults, vec![Fault::PaperJam]);
    assert_eq!(h.control.count(MockCall::Disable), 1);

    h.control.clear_fault(Fault::PaperJam).await.unwrap();
    wait_for(&h.handle, LogicalState::Idle).await;
}

#[tokio::test]
async fn test_warnings_never_disable() {
    let mut h = start(|_| {}).await;
    wait_for(&h.handle, LogicalState::Idle).await;

    h.control.warning(Warning::PaperLow).await.unwrap();
    events_until(&mut h.events, &DeviceEvent::WarningRaised(Warning::PaperLow)).await;

    let snapshot = h.handle.snapshot();
    assert_eq!(snapshot.state, LogicalState::Idle);
    assert_eq!(snapshot.warnings, vec![Warning::PaperLow]);
}

#[tokio::test]
async fn test_service_and_operator_reasons_coexist() {
    let h = start(|_| {}).await;
    wait_for(&h.handle, LogicalState::Idle).await;

    h.handle.disable(DisableReason::SERVICE).await.unwrap();
    h.handle.disable(DisableReason::CONFIGURATION).await.unwrap();
    assert_eq!(h.handle.state(), LogicalState::Disabled);

    // Reset lifts only the error reason
    h.handle.enable(EnableReason::RESET).await.unwrap();
    assert_eq!(h.handle.state(), LogicalState::Disabled);

    h.handle.enable(EnableReason::OPERATOR).await.unwrap();
    assert_eq!(h.handle.state(), LogicalState::Idle);
    assert!(h.handle.snapshot().activation_time.is_some());
}

#[rstest]
#[case::reset_leaves_service(DisableReason::SERVICE, EnableReason::RESET, LogicalState::Disabled)]
#[case::device_leaves_configuration(
    DisableReason::CONFIGURATION,
    EnableReason::DEVICE,
    LogicalState::Disabled
)]
#[case::operator_lifts_service(DisableReason::SERVICE, EnableReason::OPERATOR, LogicalState::Idle)]
#[case::operator_lifts_error(DisableReason::ERROR, EnableReason::OPERATOR, LogicalState::Idle)]
#[case::device_lifts_device(DisableReason::DEVICE, EnableReason::DEVICE, LogicalState::Idle)]
#[case::operator_leaves_device(DisableReason::DEVICE, EnableReason::OPERATOR, LogicalState::Disabled)]
#[tokio::test]
async fn test_enable_lifts_only_covered_reasons(
    #[case] disabled_by: DisableReason,
    #[case] enabled_by: EnableReason,
    #[case] expected: LogicalState,
) {
    let h = start(|_| {}).await;
    wait_for(&h.handle, LogicalState::Idle).await;

    h.handle.disable(disabled_by).await.unwrap();
    assert_eq!(h.handle.state(), LogicalState::Disabled);

    h.handle.enable(enabled_by).await.unwrap();
    assert_eq!(h.handle.state(), expected);
    assert_eq!(
        h.handle.snapshot().disable_reasons.is_empty(),
        expected == LogicalState::Idle
    );
}

#[tokio::test]
async fn test_reconnect_with_event_backlog_keeps_service_responsive() {
    let h = start(|_| {}).await;
    wait_for(&h.handle, LogicalState::Idle).await;

    h.control.disconnect().await.unwrap();
    wait_for(&h.handle, LogicalState::Disconnected).await;

    // More events than the channel holds queue up behind Connected
    h.control.connect().await.unwrap();
    for _ in 0..DEFAULT_EVENT_CAPACITY + 6 {
        timeout(Duration::from_secs(2), h.control.warning(Warning::PaperLow))
            .await
            .expect("event channel stalled")
            .unwrap();
    }

    wait_for(&h.handle, LogicalState::Idle).await;
    timeout(Duration::from_secs(2), h.handle.disable(DisableReason::SERVICE))
        .await
        .expect("service stalled")
        .unwrap();
    assert_eq!(h.handle.snapshot().warnings, vec![Warning::PaperLow]);
    assert_eq!(h.control.count(MockCall::Initialize), 2);

    h.handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_reconnect_cycle_returns_to_idle() {
    let mut h = start(|_| {}).await;
    wait_for(&h.handle, LogicalState::Idle).await;
    let activated = h.handle.snapshot().activation_time;

    h.control.disconnect().await.unwrap();
    wait_for(&h.handle, LogicalState::Disconnected).await;
    assert!(!h.handle.snapshot().can_perform_operation);

    h.control.connect().await.unwrap();
    wait_for(&h.handle, LogicalState::Idle).await;

    let seen = events_until(&mut h.events, &DeviceEvent::Connected).await;
    assert!(seen.contains(&DeviceEvent::Disconnected));
    assert_eq!(h.handle.snapshot().activation_time, activated);
    assert_eq!(h.control.count(MockCall::Initialize), 2);
}

#[tokio::test]
async fn test_inspection_failure_and_retry() {
    let h = start(|control| control.set_auto_initialize(false)).await;
    wait_for(&h.handle, LogicalState::Inspecting).await;

    h.control
        .raise(ImplementationEvent::InitializationFailed)
        .await
        .unwrap();
    wait_for(&h.handle, LogicalState::Uninitialized).await;

    h.control.set_auto_initialize(true);
    assert!(h.handle.inspect().await.unwrap());
    wait_for(&h.handle, LogicalState::Idle).await;

    // Not permitted once initialized
    assert!(!h.handle.inspect().await.unwrap());
}

#[tokio::test]
async fn test_hardware_not_ready_initializes_disabled() {
    let h = start(|control| control.set_hardware_enabled(false)).await;
    wait_for(&h.handle, LogicalState::Disabled).await;
    assert_eq!(h.handle.snapshot().activation_time, None);

    h.control.set_hardware_enabled(true);
    h.control.raise(ImplementationEvent::Enabled).await.unwrap();
    wait_for(&h.handle, LogicalState::Idle).await;
    assert!(h.handle.snapshot().activation_time.is_some());
}

#[tokio::test]
async fn test_snapshot_survives_shutdown() {
    let h = start(|_| {}).await;
    wait_for(&h.handle, LogicalState::Idle).await;
    let observer = h.handle.subscribe();

    h.handle.shutdown().await.unwrap();
    assert_eq!(observer.borrow().state, LogicalState::Idle);
}
