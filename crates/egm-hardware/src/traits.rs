//! Hardware implementation contract.
//!
//! A [`DeviceImplementation`] is the raw, addin-provided driver an adapter
//! wraps. It pushes [`ImplementationEvent`]s on a channel the adapter takes
//! once at construction, and answers the pull-style calls below.
//!
//! Methods take `&self` because the adapter shares the implementation with
//! spawned operation tasks; implementations use interior mutability.
//!
//! Calls return `impl Future + Send` (Edition 2024 RPITIT) so the service can
//! run them on spawned tasks. Implementors can still write `async fn` in
//! their impl blocks.

use std::future::Future;

use tokio::sync::mpsc;

use crate::error::Result;
use crate::events::ImplementationEvent;
use crate::types::{Condition, DeviceInfo};

/// Event receiver handed over by an implementation.
pub type EventReceiver<F, W> = mpsc::Receiver<ImplementationEvent<F, W>>;

/// Contract every hardware implementation fulfils.
pub trait DeviceImplementation: Send + Sync + 'static {
    /// Device-specific fault tag.
    type Fault: Condition;

    /// Device-specific warning tag.
    type Warning: Condition;

    /// Identification used for override lookup and logging.
    fn info(&self) -> DeviceInfo;

    /// Whether the hardware reports itself able to operate.
    ///
    /// This is the hardware-side half of the enabled condition. It is not
    /// changed by [`enable`](Self::enable) or [`disable`](Self::disable).
    fn is_enabled(&self) -> bool;

    /// Take the event receiver. Returns `None` once taken.
    fn take_events(&self) -> Option<EventReceiver<Self::Fault, Self::Warning>>;

    /// Start hardware inspection. The result arrives later as an
    /// `Initialized` or `InitializationFailed` event.
    fn initialize(&self) -> impl Future<Output = Result<()>> + Send;

    fn enable(&self) -> impl Future<Output = Result<()>> + Send;

    fn disable(&self) -> impl Future<Output = Result<()>> + Send;

    /// Run the device self test, optionally clearing NVM. Returns pass/fail.
    fn self_test(&self, clear: bool) -> impl Future<Output = Result<bool>> + Send;

    /// Compute a readiness checksum over device memory.
    fn calculate_checksum(&self, seed: i32) -> impl Future<Output = Result<i32>> + Send;
}
