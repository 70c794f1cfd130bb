use serde_json::Value;
use tracing::info;

use crate::domain::RawSample;
use crate::error::ImportError;
use crate::opensky::{QueryResult, StateVectorRequest, StateVectorSource};
use crate::window::TimeWindow;

pub const DEFAULT_TABLE: &str = "minio.osky.state_vectors_data4";

const COLUMNS: [&str; 4] = ["icao24", "lat", "lon", "time"];

/// SQL for one window: 10-second samples inside the second-level range,
/// restricted to the enclosing `hour` partitions.
pub fn build_query(table: &str, window: &TimeWindow) -> String {
    format!(
        "SELECT {} FROM {table} WHERE time % 10 = 0 AND time >= {} AND time <= {} AND hour >= {} AND hour <= {}",
        COLUMNS.join(", "),
        window.start_epoch(),
        window.end_epoch(),
        window.start_hour_epoch(),
        window.end_hour_epoch(),
    )
}

pub fn build_request(table: &str, window: &TimeWindow) -> StateVectorRequest {
    StateVectorRequest {
        sql: build_query(table, window),
        window: *window,
    }
}

/// Runs the request and types every returned row.
///
/// An empty result set is `NoData`; nothing downstream runs on it.
pub fn fetch<S: StateVectorSource + ?Sized>(
    source: &S,
    request: &StateVectorRequest,
) -> Result<Vec<RawSample>, ImportError> {
    let result = source.query(request)?;
    if result.is_empty() {
        return Err(ImportError::NoData(request.window.to_string()));
    }
    info!(rows = result.rows.len(), "state vectors received");
    samples_from_result(&result)
}

pub fn samples_from_result(result: &QueryResult) -> Result<Vec<RawSample>, ImportError> {
    let [icao24, lat, lon, time] = COLUMNS.map(|name| result.column_index(name));
    let (Some(icao24), Some(lat), Some(lon), Some(time)) = (icao24, lat, lon, time) else {
        return Err(ImportError::UpstreamQuery(format!(
            "result is missing required columns, got [{}]",
            result.columns.join(", ")
        )));
    };
    Ok(result
        .rows
        .iter()
        .map(|row| {
            RawSample::from_values(
                cell(row, icao24),
                cell(row, lat),
                cell(row, lon),
                cell(row, time),
            )
        })
        .collect())
}

fn cell(row: &[Value], index: usize) -> &Value {
    row.get(index).unwrap_or(&Value::Null)
}
