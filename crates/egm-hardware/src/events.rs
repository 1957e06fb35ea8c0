//! Events flowing into and out of a device adapter.
//!
//! [`ImplementationEvent`]s are raised by a hardware implementation on its
//! event channel and drained by the adapter in order. [`DeviceEvent`]s are
//! the adapter's outward domain events, wrapped in an [`Envelope`] and
//! published on an [`EventBus`].

use chrono::{DateTime, Utc};
use egm_core::{DeviceIdentity, DisableReason, EnableReason};
use tokio::sync::broadcast;
use tracing::trace;

use crate::types::Condition;

/// Raised by a hardware implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImplementationEvent<F, W> {
    Connected,
    Disconnected,
    /// Hardware finished its own inspection.
    Initialized,
    InitializationFailed,
    /// Hardware-originated enable (e.g. a door closed).
    Enabled,
    /// Hardware-originated disable.
    Disabled,
    FaultOccurred(F),
    FaultCleared(F),
    WarningOccurred(W),
    WarningCleared(W),
    OperationInProgress,
    OperationCompleted,
    OperationIncomplete,
}

/// Domain event published by an adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent<F, W> {
    Connected,
    Disconnected,
    Initialized,
    InspectionFailed,
    /// Published on every enable request, even if other reasons keep the
    /// device disabled.
    Enabled {
        reason: EnableReason,
    },
    Disabled {
        reasons: DisableReason,
        text: String,
    },
    FaultRaised(F),
    FaultCleared(F),
    WarningRaised(W),
    WarningCleared(W),
    OperationStarted,
    OperationCompleted,
    OperationIncomplete,
    /// Submission failed while busy; `recovered` tells whether the local
    /// re-initialization succeeded.
    OperationFailed {
        recovered: bool,
    },
    /// Submission failed outside of an operation; no recovery attempted.
    OperationError,
}

/// A [`DeviceEvent`] stamped with its origin and time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope<F, W> {
    pub device: DeviceIdentity,
    pub at: DateTime<Utc>,
    pub event: DeviceEvent<F, W>,
}

impl<F, W> Envelope<F, W> {
    pub fn new(device: DeviceIdentity, event: DeviceEvent<F, W>) -> Self {
        Self {
            device,
            at: Utc::now(),
            event,
        }
    }
}

/// Port to the platform event bus.
pub trait EventBus<F, W>: Send + Sync {
    fn publish(&self, envelope: Envelope<F, W>);
}

/// [`EventBus`] backed by a tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastBus<F, W> {
    sender: broadcast::Sender<Envelope<F, W>>,
}

impl<F: Condition, W: Condition> BroadcastBus<F, W> {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Envelope<F, W>> {
        self.sender.subscribe()
    }
}

impl<F: Condition, W: Condition> EventBus<F, W> for BroadcastBus<F, W> {
    fn publish(&self, envelope: Envelope<F, W>) {
        if self.sender.send(envelope).is_err() {
            trace!("No subscribers for device event");
        }
    }
}
