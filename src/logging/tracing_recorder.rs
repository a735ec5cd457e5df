//! Tracing-based Lifecycle Recorder
//!
//! Emits structured logs for accepted transitions that any tracing
//! subscriber can capture. Zero additional dependencies.

use async_trait::async_trait;
use tracing::info;

use super::recorder::{LifecycleRecorder, ReconcileRecord, RecordError};

/// Recorder that emits structured tracing logs.
pub struct TracingRecorder;

impl TracingRecorder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TracingRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LifecycleRecorder for TracingRecorder {
    async fn record(&self, record: &ReconcileRecord) -> Result<(), RecordError> {
        info!(
            target: "lifecycle",
            order_id = %record.order_id,
            timestamp = %record.timestamp.to_rfc3339(),
            previous_status = %record.previous_status,
            new_status = %record.new_status,
            fill_delta = %record.fill_delta,
            cumulative_filled = %record.cumulative_filled,
            fallback_applied = record.fallback_applied,
            source = %record.source,
            "Order transition recorded"
        );
        Ok(())
    }
}
