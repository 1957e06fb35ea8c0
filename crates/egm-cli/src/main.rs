//! EGM printer simulator.
//!
//! Wires the printer adapter to the mock printer, an options store and an
//! event bus, then runs a scripted session: prints, faults, a refused
//! ticket, a disconnect with a deferred form feed.
//!
//! Usage:
//!   egm-sim --database egm.db --render-target text
//!   RUST_LOG=debug egm-sim --config printer.json --descriptors tickets.json

mod session;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, bail};
use clap::Parser;
use egm_core::{AdapterConfig, DeviceKind, MemoryOptionsStore, OptionsStore};
use egm_hardware::AddinRegistry;
use egm_printer::mock::{MockPrinter, MockPrinterHandle};
use egm_printer::{AnyPrinter, DescriptorSet};
use egm_storage::{Database, SqliteOptionsStore};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// In-memory options instead of a database file.
const MEMORY_DATABASE: &str = ":memory:";

#[derive(Parser, Debug)]
#[command(name = "egm-sim", author, version, about = "Scripted EGM printer session")]
struct Cli {
    /// Adapter configuration (JSON). A mock printer at index 1 if omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SQLite database holding device options, or `:memory:`
    #[arg(short, long, default_value = MEMORY_DATABASE)]
    database: String,

    /// Region, template and override descriptors (JSON)
    #[arg(long)]
    descriptors: Option<PathBuf>,

    /// Render target to persist before printing
    #[arg(long)]
    render_target: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AdapterConfig::from_json_file(path)
            .with_context(|| format!("loading adapter config {}", path.display()))?,
        None => AdapterConfig::new(DeviceKind::Printer, "mock"),
    };
    if config.kind != DeviceKind::Printer {
        bail!("egm-sim drives printers, config names a {}", config.kind);
    }

    let descriptors = match &cli.descriptors {
        Some(path) => DescriptorSet::from_json_file(path)
            .with_context(|| format!("loading descriptors {}", path.display()))?,
        None => session::demo_descriptors(),
    };

    let (store, database) = open_store(&cli.database).await?;

    let control = Arc::new(Mutex::new(None));
    let addins = printer_addins(control.clone());
    let printer = addins
        .create(&config)
        .with_context(|| format!("creating printer from addin '{}'", config.addin))?;
    let control = control
        .lock()
        .ok()
        .and_then(|mut slot| slot.take())
        .context("addin did not provide a control handle")?;

    info!("Starting {} ({}) with addins {:?}", config.identity()?, config.addin, addins);
    session::run(&config, printer, control, store, descriptors, cli.render_target).await?;

    if let Some(database) = database {
        database.close().await;
    }
    Ok(())
}

/// Addins the simulator can build. The mock hands its control handle back
/// through `control` so the session can script it.
fn printer_addins(control: Arc<Mutex<Option<MockPrinterHandle>>>) -> AddinRegistry<AnyPrinter> {
    let mut addins = AddinRegistry::new(DeviceKind::Printer);
    addins.register("mock", move |_config| {
        let (printer, handle) = MockPrinter::new();
        if let Ok(mut slot) = control.lock() {
            *slot = Some(handle);
        }
        Ok(AnyPrinter::Mock(printer))
    });
    addins
}

async fn open_store(database: &str) -> Result<(Arc<dyn OptionsStore>, Option<Database>)> {
    if database == MEMORY_DATABASE {
        info!("Keeping device options in memory");
        return Ok((Arc::new(MemoryOptionsStore::new()), None));
    }
    let db = Database::open(database)
        .await
        .with_context(|| format!("opening options database {}", database))?;
    let store = Arc::new(SqliteOptionsStore::new(db.pool().clone()));
    Ok((store, Some(db)))
}
