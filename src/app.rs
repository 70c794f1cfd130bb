use std::time::{Duration, Instant};

use tracing::info;

use crate::error::ImportError;
use crate::fetch::{build_request, fetch};
use crate::opensky::StateVectorSource;
use crate::store::{FlightStore, ReplaceOutcome, replace};
use crate::transform::transform;
use crate::window::TimeWindow;

#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    pub ensure_indexes: bool,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub window: String,
    pub request: String,
    pub total_rows: usize,
    pub valid_records: usize,
    pub outcome: ReplaceOutcome,
    pub request_time: Duration,
    pub total_time: Duration,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// The fetch-validate-replace pipeline for one window.
pub struct Importer<S: StateVectorSource, W: FlightStore> {
    source: S,
    store: W,
    table: String,
}

impl<S: StateVectorSource, W: FlightStore> Importer<S, W> {
    pub fn new(source: S, store: W, table: impl Into<String>) -> Self {
        Self {
            source,
            store,
            table: table.into(),
        }
    }

    pub fn store(&self) -> &W {
        &self.store
    }

    /// Fails with `StoreUnavailable` when the store cannot be reached.
    pub fn check_store(&self) -> Result<(), ImportError> {
        self.store.ping()
    }

    /// Runs every stage in order. Any error stops the run before the next stage;
    /// a failed fetch never touches the store.
    pub fn run(
        &self,
        window: &TimeWindow,
        options: &ImportOptions,
        sink: &dyn ProgressSink,
    ) -> Result<ImportSummary, ImportError> {
        let started = Instant::now();
        let request = build_request(&self.table, window);
        info!(window = %window, "import started");
        sink.event(ProgressEvent {
            message: request.sql.clone(),
            elapsed: None,
        });
        sink.event(ProgressEvent {
            message: "Starting request".to_string(),
            elapsed: None,
        });

        let samples = fetch(&self.source, &request)?;
        let request_time = started.elapsed();
        sink.event(ProgressEvent {
            message: "Request completed".to_string(),
            elapsed: Some(request_time),
        });

        let records = transform(&samples);
        sink.event(ProgressEvent {
            message: format!("Total Response: {}", samples.len()),
            elapsed: None,
        });
        sink.event(ProgressEvent {
            message: format!("Filtered Total: {}", records.len()),
            elapsed: None,
        });

        if options.ensure_indexes {
            self.store.ensure_indexes()?;
            sink.event(ProgressEvent {
                message: "Indexes ensured".to_string(),
                elapsed: None,
            });
        }

        let outcome = replace(&self.store, &records, window)?;
        sink.event(ProgressEvent {
            message: format!(
                "Data inserted: {} records ({} removed)",
                outcome.inserted, outcome.deleted
            ),
            elapsed: None,
        });

        let total_time = started.elapsed();
        sink.event(ProgressEvent {
            message: "Import finished".to_string(),
            elapsed: Some(total_time),
        });

        Ok(ImportSummary {
            window: window.to_string(),
            request: request.sql,
            total_rows: samples.len(),
            valid_records: records.len(),
            outcome,
            request_time,
            total_time,
        })
    }
}
