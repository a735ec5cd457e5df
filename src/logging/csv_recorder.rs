//! CSV Lifecycle Recorder
//!
//! Writes accepted transitions to a CSV file. Suitable for development
//! and testing.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::recorder::{LifecycleRecorder, ReconcileRecord, RecordError};

/// CSV file recorder.
///
/// Uses `spawn_blocking` to keep file I/O off the async runtime.
pub struct CsvRecorder {
    file_path: Arc<PathBuf>,
    /// Serializes writes and tracks whether the header was written.
    state: Arc<Mutex<CsvState>>,
}

struct CsvState {
    header_written: bool,
}

impl CsvRecorder {
    pub fn new(file_path: PathBuf) -> Self {
        Self {
            file_path: Arc::new(file_path),
            state: Arc::new(Mutex::new(CsvState {
                header_written: false,
            })),
        }
    }
}

#[async_trait]
impl LifecycleRecorder for CsvRecorder {
    async fn record(&self, record: &ReconcileRecord) -> Result<(), RecordError> {
        let file_path = Arc::clone(&self.file_path);
        let state = Arc::clone(&self.state);
        let csv_line = record.to_csv_line();

        tokio::task::spawn_blocking(move || {
            let mut guard = state.lock().unwrap_or_else(|e| e.into_inner());

            if !guard.header_written {
                let needs_header = !file_path.exists()
                    || std::fs::metadata(&*file_path)
                        .map(|m| m.len() == 0)
                        .unwrap_or(true);

                if needs_header {
                    let mut file = OpenOptions::new()
                        .create(true)
                        .append(true)
                        .open(&*file_path)?;
                    writeln!(file, "{}", ReconcileRecord::csv_header())?;
                }
                guard.header_written = true;
            }

            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&*file_path)?;
            writeln!(file, "{}", csv_line)?;

            Ok::<(), RecordError>(())
        })
        .await
        .map_err(|e| RecordError::Io(std::io::Error::other(e)))??;

        Ok(())
    }
}
