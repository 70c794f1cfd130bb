use chrono::{DateTime, Utc};
use serde_json::Value;

/// One state-vector row as returned by OpenSky, typed at the fetch boundary.
///
/// A column whose JSON value has the wrong kind (or is null) is `None`; finite
/// and non-empty checks happen later in [`crate::transform`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawSample {
    pub icao24: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub time: Option<i64>,
}

impl RawSample {
    pub fn new(icao24: &str, lat: f64, lon: f64, time: i64) -> Self {
        Self {
            icao24: Some(icao24.to_string()),
            lat: Some(lat),
            lon: Some(lon),
            time: Some(time),
        }
    }

    pub fn from_values(icao24: &Value, lat: &Value, lon: &Value, time: &Value) -> Self {
        Self {
            icao24: icao24.as_str().map(str::to_string),
            lat: parse_double(lat),
            lon: parse_double(lon),
            time: time.as_i64(),
        }
    }
}

/// Trino serialises non-finite doubles as strings.
fn parse_double(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => match text.as_str() {
            "NaN" => Some(f64::NAN),
            "Infinity" => Some(f64::INFINITY),
            "-Infinity" => Some(f64::NEG_INFINITY),
            _ => None,
        },
        _ => None,
    }
}

/// GeoJSON point, coordinates in `[longitude, latitude]` order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub kind: &'static str,
    pub coordinates: [f64; 2],
}

impl GeoPoint {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self {
            kind: "Point",
            coordinates: [lon, lat],
        }
    }

    pub fn lon(&self) -> f64 {
        self.coordinates[0]
    }

    pub fn lat(&self) -> f64 {
        self.coordinates[1]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlightRecord {
    pub icao: String,
    pub position: GeoPoint,
    pub time: i64,
    pub created_at: DateTime<Utc>,
}
