//! Mock hardware implementation for testing and development.
//!
//! [`MockDevice`] is driven entirely through its [`MockDeviceHandle`]: tests
//! raise implementation events, flip the hardware-enabled flag, script
//! self-test results and read back the calls the adapter made.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex};

use egm_core::constants::DEFAULT_EVENT_CAPACITY;
use tokio::sync::mpsc;
use tracing::trace;

use crate::error::{HardwareError, Result};
use crate::events::ImplementationEvent;
use crate::traits::{DeviceImplementation, EventReceiver};
use crate::types::{Condition, DeviceInfo};

/// A call the adapter made on a [`MockDevice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockCall {
    Initialize,
    Enable,
    Disable,
    SelfTest { clear: bool },
    CalculateChecksum { seed: i32 },
}

/// State shared between a mock and its handle.
#[derive(Debug)]
pub(crate) struct MockState {
    hardware_enabled: AtomicBool,
    auto_initialize: AtomicBool,
    self_test_passes: AtomicBool,
    checksum: AtomicI32,
    calls: Mutex<Vec<MockCall>>,
}

impl MockState {
    fn new() -> Self {
        Self {
            hardware_enabled: AtomicBool::new(true),
            auto_initialize: AtomicBool::new(true),
            self_test_passes: AtomicBool::new(true),
            checksum: AtomicI32::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn record(&self, call: MockCall) {
        trace!("Mock call {:?}", call);
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

/// Channel-driven fake hardware.
///
/// # Examples
///
/// ```
/// use egm_hardware::mock::MockDevice;
/// use egm_hardware::traits::DeviceImplementation;
///
/// let (device, handle) = MockDevice::<u8, u8>::new();
/// assert!(device.is_enabled());
///
/// handle.set_hardware_enabled(false);
/// assert!(!device.is_enabled());
/// ```
#[derive(Debug)]
pub struct MockDevice<F, W> {
    info: DeviceInfo,
    state: Arc<MockState>,
    events_tx: mpsc::Sender<ImplementationEvent<F, W>>,
    events_rx: Mutex<Option<EventReceiver<F, W>>>,
}

impl<F: Condition, W: Condition> MockDevice<F, W> {
    pub fn new() -> (Self, MockDeviceHandle<F, W>) {
        Self::with_info(DeviceInfo::new("Mock", "Mock Device", "MOCK"))
    }

    pub fn with_info(info: DeviceInfo) -> (Self, MockDeviceHandle<F, W>) {
        let (events_tx, events_rx) = mpsc::channel(DEFAULT_EVENT_CAPACITY);
        let state = Arc::new(MockState::new());

        let device = Self {
            info,
            state: state.clone(),
            events_tx: events_tx.clone(),
            events_rx: Mutex::new(Some(events_rx)),
        };
        let handle = MockDeviceHandle {
            events_tx,
            state,
            _conditions: PhantomData,
        };
        (device, handle)
    }
}

impl<F: Condition, W: Condition> DeviceImplementation for MockDevice<F, W> {
    type Fault = F;
    type Warning = W;

    fn info(&self) -> DeviceInfo {
        self.info.clone()
    }

    fn is_enabled(&self) -> bool {
        self.state.hardware_enabled.load(Ordering::SeqCst)
    }

    fn take_events(&self) -> Option<EventReceiver<F, W>> {
        self.events_rx.lock().ok()?.take()
    }

    async fn initialize(&self) -> Result<()> {
        self.state.record(MockCall::Initialize);
        if self.state.auto_initialize.load(Ordering::SeqCst) {
            self.events_tx
                .send(ImplementationEvent::Initialized)
                .await
                .map_err(|_| HardwareError::disconnected(self.info.model.clone()))?;
        }
        Ok(())
    }

    async fn enable(&self) -> Result<()> {
        self.state.record(MockCall::Enable);
        Ok(())
    }

    async fn disable(&self) -> Result<()> {
        self.state.record(MockCall::Disable);
        Ok(())
    }

    async fn self_test(&self, clear: bool) -> Result<bool> {
        self.state.record(MockCall::SelfTest { clear });
        Ok(self.state.self_test_passes.load(Ordering::SeqCst))
    }

    async fn calculate_checksum(&self, seed: i32) -> Result<i32> {
        self.state.record(MockCall::CalculateChecksum { seed });
        Ok(self.state.checksum.load(Ordering::SeqCst).wrapping_add(seed))
    }
}

/// Handle for controlling a [`MockDevice`]. Cheap to clone.
#[derive(Debug)]
pub struct MockDeviceHandle<F, W> {
    events_tx: mpsc::Sender<ImplementationEvent<F, W>>,
    state: Arc<MockState>,
    _conditions: PhantomData<fn() -> (F, W)>,
}

impl<F, W> Clone for MockDeviceHandle<F, W> {
    fn clone(&self) -> Self {
        Self {
            events_tx: self.events_tx.clone(),
            state: self.state.clone(),
            _conditions: PhantomData,
        }
    }
}

impl<F: Condition, W: Condition> MockDeviceHandle<F, W> {
    /// Raise an implementation event.
    ///
    /// # Errors
    ///
    /// Fails once the adapter has dropped the event receiver.
    pub async fn raise(&self, event: ImplementationEvent<F, W>) -> Result<()> {
        self.events_tx
            .send(event)
            .await
            .map_err(|_| HardwareError::communication("Mock event channel closed"))
    }

    pub async fn connect(&self) -> Result<()> {
        self.raise(ImplementationEvent::Connected).await
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.raise(ImplementationEvent::Disconnected).await
    }

    pub async fn fault(&self, fault: F) -> Result<()> {
        self.raise(ImplementationEvent::FaultOccurred(fault)).await
    }

    pub async fn clear_fault(&self, fault: F) -> Result<()> {
        self.raise(ImplementationEvent::FaultCleared(fault)).await
    }

    pub async fn warning(&self, warning: W) -> Result<()> {
        self.raise(ImplementationEvent::WarningOccurred(warning)).await
    }

    pub fn set_hardware_enabled(&self, enabled: bool) {
        self.state.hardware_enabled.store(enabled, Ordering::SeqCst);
    }

    /// Whether `initialize` raises `Initialized` by itself (default: yes).
    pub fn set_auto_initialize(&self, auto: bool) {
        self.state.auto_initialize.store(auto, Ordering::SeqCst);
    }

    pub fn set_self_test_passes(&self, passes: bool) {
        self.state.self_test_passes.store(passes, Ordering::SeqCst);
    }

    pub fn set_checksum(&self, checksum: i32) {
        self.state.checksum.store(checksum, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.state
            .calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub fn count(&self, call: MockCall) -> usize {
        self.calls().into_iter().filter(|c| *c == call).count()
    }

    pub fn clear_calls(&self) {
        if let Ok(mut calls) = self.state.calls.lock() {
            calls.clear();
        }
    }
}
