//! Logging and Lifecycle Recording Module
//!
//! Provides subscriber initialization plus pluggable backends for
//! recording accepted order transitions:
//! - `LifecycleRecorder` trait - pluggable recorder interface
//! - `TracingRecorder` - structured log recorder
//! - `CsvRecorder` - CSV file recorder for development/testing
//! - `MultiRecorder` - fan-out to several backends

pub mod csv_recorder;
pub mod recorder;
pub mod tracing_recorder;

pub use csv_recorder::CsvRecorder;
pub use recorder::{LifecycleRecorder, MultiRecorder, ReconcileRecord, RecordError};
pub use tracing_recorder::TracingRecorder;

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// Filter directives come from `RUST_LOG`, falling back to the supplied
/// default. Returns an error if a subscriber is already installed.
pub fn init_logging(default_filter: &str) -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| e as Box<dyn std::error::Error>)?;
    Ok(())
}
