//! Device adapter engine for EGM peripherals.
//!
//! This crate holds what every peripheral adapter (printer, note acceptor,
//! IO board, reel controller) shares:
//!
//! - [`state_machine`]: the logical lifecycle FSM with guarded, dynamic and
//!   re-entrant transitions
//! - [`faults`]: idempotent fault/warning tracking
//! - [`traits`] and [`events`]: the hardware implementation contract, its
//!   event channel and the outward domain events
//! - [`adapter`]: the [`DeviceAdapter`] that composes the above and
//!   reconciles enable/disable reasons
//! - [`service`]: the single-writer task owning an adapter, with the
//!   [`Pipeline`] strategy seam for device-specific commands
//! - [`addins`]: name-to-implementation registry
//! - [`mock`]: a channel-driven implementation for tests and simulation
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use egm_core::{AdapterConfig, DeviceKind, MemoryOptionsStore};
//! use egm_hardware::{BasicPipeline, BroadcastBus, DeviceAdapter, DeviceService, LogicalState};
//! use egm_hardware::mock::MockDevice;
//!
//! # async fn example() -> egm_core::Result<()> {
//! let config = AdapterConfig::new(DeviceKind::IoBoard, "mock");
//! let (device, _control) = MockDevice::<u8, u8>::new();
//! let bus = Arc::new(BroadcastBus::<u8, u8>::new(64));
//!
//! let (adapter, events) =
//!     DeviceAdapter::open(&config, Arc::new(device), Arc::new(MemoryOptionsStore::new()), bus)
//!         .await?;
//! let handle = DeviceService::spawn(adapter, events, BasicPipeline, config.command_capacity);
//!
//! handle.wait_for_state(LogicalState::Idle).await?;
//! handle.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod addins;
pub mod error;
pub mod events;
pub mod faults;
pub mod mock;
pub mod service;
pub mod state_machine;
pub mod traits;
pub mod types;

pub use adapter::{DeviceAdapter, DeviceSnapshot, EventFollowup, SharedBus};
pub use addins::AddinRegistry;
pub use error::{HardwareError, Result};
pub use events::{BroadcastBus, DeviceEvent, Envelope, EventBus, ImplementationEvent};
pub use faults::FaultWarningAggregator;
pub use service::{
    BasicPipeline, Command, DeviceService, Pipeline, ServiceContext, ServiceHandle, Snapshot,
};
pub use state_machine::{LogicalState, StateMachine, StateTransition, TransitionContext, Trigger};
pub use traits::{DeviceImplementation, EventReceiver};
pub use types::{Condition, DeviceInfo};
