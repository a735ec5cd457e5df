//! Lifecycle Recording System
//!
//! Pluggable `LifecycleRecorder` trait for recording accepted order
//! transitions to various backends:
//! - Tracing (structured logs, observability)
//! - CSV (development/testing)
//!
//! Every accepted transition is recorded, including whether the
//! maker-zero fill fallback supplied the delta; the fallback is never
//! silently hidden.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::orders::{OrderId, OrderStatus};

/// Error type for lifecycle recording operations.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// One accepted reconciliation step for an order.
#[derive(Debug, Clone)]
pub struct ReconcileRecord {
    pub order_id: OrderId,
    pub timestamp: DateTime<Utc>,
    pub previous_status: OrderStatus,
    pub new_status: OrderStatus,
    /// Fill amount this step contributed (zero for pure status moves).
    pub fill_delta: Decimal,
    pub cumulative_filled: Decimal,
    /// True when the maker-zero fallback supplied the delta.
    pub fallback_applied: bool,
    /// Which feed produced the step ("push" or "poll").
    pub source: String,
}

impl ReconcileRecord {
    /// Format as a CSV line.
    pub fn to_csv_line(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{}",
            self.order_id,
            self.timestamp.to_rfc3339(),
            self.previous_status,
            self.new_status,
            self.fill_delta,
            self.cumulative_filled,
            self.fallback_applied,
            self.source,
        )
    }

    /// CSV header.
    pub fn csv_header() -> &'static str {
        "order_id,timestamp,previous_status,new_status,fill_delta,cumulative_filled,fallback_applied,source"
    }
}

/// Trait for recording lifecycle steps to various backends.
#[async_trait]
pub trait LifecycleRecorder: Send + Sync {
    /// Record one step. Implementations should be non-blocking.
    async fn record(&self, record: &ReconcileRecord) -> Result<(), RecordError>;

    /// Flush any buffered records (optional, default no-op).
    async fn flush(&self) -> Result<(), RecordError> {
        Ok(())
    }
}

/// A recorder that fans out to multiple backends.
pub struct MultiRecorder {
    recorders: Vec<Box<dyn LifecycleRecorder>>,
}

impl MultiRecorder {
    pub fn new(recorders: Vec<Box<dyn LifecycleRecorder>>) -> Self {
        Self { recorders }
    }

    pub fn add(&mut self, recorder: Box<dyn LifecycleRecorder>) {
        self.recorders.push(recorder);
    }
}

#[async_trait]
impl LifecycleRecorder for MultiRecorder {
    async fn record(&self, record: &ReconcileRecord) -> Result<(), RecordError> {
        let mut failures = 0;
        let mut last_error = None;

        for recorder in &self.recorders {
            if let Err(e) = recorder.record(record).await {
                tracing::error!(error = %e, "Failed to record lifecycle step to backend");
                last_error = Some(e);
                failures += 1;
            }
        }

        // Best-effort fan-out; only report when every backend failed.
        if failures > 0 && failures == self.recorders.len() {
            if let Some(e) = last_error {
                return Err(e);
            }
        }
        Ok(())
    }

    async fn flush(&self) -> Result<(), RecordError> {
        for recorder in &self.recorders {
            recorder.flush().await?;
        }
        Ok(())
    }
}
