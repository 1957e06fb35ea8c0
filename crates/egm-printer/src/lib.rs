//! Printer adapter for EGM peripherals.
//!
//! Builds the printer on top of the generic adapter engine in
//! `egm-hardware`:
//!
//! - [`descriptors`] and [`resolver`]: regions, templates and
//!   manufacturer/firmware override rules
//! - [`render`]: renderers selected by the persisted render target
//! - [`pipeline`]: the print pipeline with one-shot recovery and deferred
//!   form feeds
//! - [`handle`]: the protocol-facing [`PrinterHandle`]
//! - [`devices`]: enum dispatch over printer implementations
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use egm_core::{AdapterConfig, DeviceKind, MemoryOptionsStore};
//! use egm_hardware::{BroadcastBus, LogicalState};
//! use egm_printer::{PrinterFault, PrinterWarning};
//! use egm_printer::mock::MockPrinter;
//! use egm_printer::{
//!     PrintPipeline, PrintableRegion, PrintableTemplate, PrinterHandle, RendererRegistry,
//!     ResolverOverrideStore, Ticket,
//! };
//!
//! # async fn example() -> egm_core::Result<()> {
//! let mut resolver = ResolverOverrideStore::new();
//! resolver.load(
//!     vec![PrintableRegion::new(1, "amount", "F2")],
//!     vec![PrintableTemplate::new(101, "cashout", vec![1])],
//! );
//!
//! let (printer, _control) = MockPrinter::new();
//! let printer = PrinterHandle::open(
//!     &AdapterConfig::new(DeviceKind::Printer, "mock"),
//!     Arc::new(printer),
//!     Arc::new(MemoryOptionsStore::new()),
//!     Arc::new(BroadcastBus::<PrinterFault, PrinterWarning>::new(64)),
//!     PrintPipeline::new(resolver, RendererRegistry::with_builtin()),
//! )
//! .await?;
//!
//! printer.wait_for_state(LogicalState::Idle).await?;
//! let printed = printer.submit(Ticket::new("cashout").field("amount", "$20.00")).await?;
//! assert!(printed);
//! # Ok(())
//! # }
//! ```

pub mod descriptors;
pub mod devices;
pub mod handle;
pub mod mock;
pub mod pipeline;
pub mod render;
pub mod resolver;
pub mod ticket;
pub mod traits;

pub use descriptors::{
    DescriptorSet, Justification, OverrideRule, PrintableRegion, PrintableTemplate,
    RegionGeometry,
};
pub use devices::AnyPrinter;
pub use handle::PrinterHandle;
pub use pipeline::{FormFeedDisposition, PrintPipeline, PrinterCommand, READINESS_CHECKSUM_SEED};
pub use render::{
    RenderedCommand, Renderer, RendererCache, RendererRegistry, TemplateRenderer, TextRenderer,
};
pub use resolver::{ResolvedTemplate, ResolverOverrideStore, WorkingSet};
pub use ticket::Ticket;
pub use traits::{PrinterFault, PrinterImplementation, PrinterWarning};
