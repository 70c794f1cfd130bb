use chrono::{DateTime, Utc};
use tracing::debug;

use crate::domain::{FlightRecord, GeoPoint, RawSample};

/// Maps every valid sample to a [`FlightRecord`] stamped with the current
/// UTC time. Invalid samples are dropped.
pub fn transform(samples: &[RawSample]) -> Vec<FlightRecord> {
    transform_at(samples, Utc::now())
}

pub fn transform_at(samples: &[RawSample], created_at: DateTime<Utc>) -> Vec<FlightRecord> {
    let records = samples
        .iter()
        .filter_map(|sample| to_record(sample, created_at))
        .collect::<Vec<_>>();
    let dropped = samples.len() - records.len();
    if dropped > 0 {
        debug!(dropped, kept = records.len(), "dropped invalid state vectors");
    }
    records
}

fn to_record(sample: &RawSample, created_at: DateTime<Utc>) -> Option<FlightRecord> {
    let icao = sample.icao24.as_deref().filter(|icao| !icao.is_empty())?;
    let lat = sample.lat.filter(|lat| lat.is_finite())?;
    let lon = sample.lon.filter(|lon| lon.is_finite())?;
    let time = sample.time?;
    Some(FlightRecord {
        icao: icao.to_string(),
        position: GeoPoint::new(lon, lat),
        time,
        created_at,
    })
}
