use std::cell::{Cell, RefCell};

use assert_matches::assert_matches;
use chrono::Utc;
use serde_json::{Value, json};

use flight_data_import::app::{ImportOptions, Importer, ProgressEvent, ProgressSink};
use flight_data_import::domain::{FlightRecord, GeoPoint};
use flight_data_import::error::ImportError;
use flight_data_import::fetch::DEFAULT_TABLE;
use flight_data_import::opensky::{QueryResult, StateVectorRequest, StateVectorSource};
use flight_data_import::store::{FlightStore, replace};
use flight_data_import::window::{TimeWindow, parse_range};

#[derive(Default)]
struct MemoryStore {
    records: RefCell<Vec<FlightRecord>>,
    mutations: Cell<usize>,
    indexed: Cell<bool>,
    fail_delete: bool,
    fail_insert: bool,
}

impl MemoryStore {
    fn with_records(records: Vec<FlightRecord>) -> Self {
        Self {
            records: RefCell::new(records),
            ..Self::default()
        }
    }

    fn times(&self) -> Vec<i64> {
        let mut times = self
            .records
            .borrow()
            .iter()
            .map(|record| record.time)
            .collect::<Vec<_>>();
        times.sort_unstable();
        times
    }
}

impl FlightStore for MemoryStore {
    fn ping(&self) -> Result<(), ImportError> {
        Ok(())
    }

    fn delete_window(&self, start: i64, end: i64) -> Result<u64, ImportError> {
        self.mutations.set(self.mutations.get() + 1);
        if self.fail_delete {
            return Err(ImportError::StoreWrite("delete: not primary".to_string()));
        }
        let mut records = self.records.borrow_mut();
        let before = records.len();
        records.retain(|record| record.time < start || record.time > end);
        Ok((before - records.len()) as u64)
    }

    fn insert_many(&self, records: &[FlightRecord]) -> Result<usize, ImportError> {
        self.mutations.set(self.mutations.get() + 1);
        if self.fail_insert {
            return Err(ImportError::StoreWrite("insert: disk full".to_string()));
        }
        self.records.borrow_mut().extend_from_slice(records);
        Ok(records.len())
    }

    fn ensure_indexes(&self) -> Result<(), ImportError> {
        self.indexed.set(true);
        Ok(())
    }
}

struct UnreachableStore;

impl FlightStore for UnreachableStore {
    fn ping(&self) -> Result<(), ImportError> {
        Err(ImportError::StoreUnavailable("connection refused".to_string()))
    }

    fn delete_window(&self, _start: i64, _end: i64) -> Result<u64, ImportError> {
        panic!("store must not be written when unreachable")
    }

    fn insert_many(&self, _records: &[FlightRecord]) -> Result<usize, ImportError> {
        panic!("store must not be written when unreachable")
    }

    fn ensure_indexes(&self) -> Result<(), ImportError> {
        panic!("store must not be written when unreachable")
    }
}

enum MockSource {
    Rows(Vec<Vec<Value>>),
    Failing,
}

impl StateVectorSource for MockSource {
    fn query(&self, _request: &StateVectorRequest) -> Result<QueryResult, ImportError> {
        match self {
            MockSource::Rows(rows) => Ok(QueryResult {
                columns: ["icao24", "lat", "lon", "time"]
                    .iter()
                    .map(|name| name.to_string())
                    .collect(),
                rows: rows.clone(),
            }),
            MockSource::Failing => Err(ImportError::UpstreamStatus {
                status: 503,
                message: "trino unavailable".to_string(),
            }),
        }
    }
}

#[derive(Default)]
struct RecordingSink {
    messages: RefCell<Vec<String>>,
}

impl ProgressSink for RecordingSink {
    fn event(&self, event: ProgressEvent) {
        self.messages.borrow_mut().push(event.message);
    }
}

// 2023-01-01 10:00:00Z and 10:30:00Z
const START: i64 = 1672567200;
const END: i64 = 1672569000;

fn window() -> TimeWindow {
    parse_range("2023-01-01 10:00", "2023-01-01 10:30").unwrap()
}

fn record(icao: &str, time: i64) -> FlightRecord {
    FlightRecord {
        icao: icao.to_string(),
        position: GeoPoint::new(8.5, 47.4),
        time,
        created_at: Utc::now(),
    }
}

#[test]
fn replace_twice_keeps_only_second_batch() {
    let store = MemoryStore::with_records(vec![record("outside", START - 10)]);
    let window = window();

    replace(&store, &[record("a", START), record("b", START + 10)], &window).unwrap();
    let outcome = replace(&store, &[record("c", END)], &window).unwrap();

    assert_eq!(outcome.deleted, 2);
    assert_eq!(outcome.inserted, 1);
    let icaos = store
        .records
        .borrow()
        .iter()
        .map(|record| record.icao.clone())
        .collect::<Vec<_>>();
    assert_eq!(icaos, vec!["outside", "c"]);
}

#[test]
fn replace_with_empty_batch_clears_window() {
    let store = MemoryStore::with_records(vec![
        record("a", START),
        record("b", END),
        record("later", END + 10),
    ]);
    let outcome = replace(&store, &[], &window()).unwrap();
    assert_eq!(outcome.deleted, 2);
    assert_eq!(outcome.inserted, 0);
    assert_eq!(store.times(), vec![END + 10]);
    // delete only, no empty bulk insert
    assert_eq!(store.mutations.get(), 1);
}

#[test]
fn replace_keeps_duplicates_in_batch() {
    let store = MemoryStore::default();
    let outcome = replace(&store, &[record("a", START), record("a", START)], &window()).unwrap();
    assert_eq!(outcome.inserted, 2);
}

#[test]
fn pipeline_imports_only_valid_rows() {
    let source = MockSource::Rows(vec![
        vec![json!("3c6444"), json!(50.03), json!(8.57), json!(START)],
        vec![json!(""), json!(50.03), json!(8.57), json!(START + 10)],
        vec![json!("4b1814"), json!("NaN"), json!(8.56), json!(START + 20)],
        vec![json!("4b1815"), json!(47.45), json!(8.56), json!(1672567230.5)],
        vec![json!("4b1816"), json!(47.45), json!(8.56), json!(START + 40)],
    ]);
    let store = MemoryStore::with_records(vec![record("stale", START + 30)]);
    let importer = Importer::new(source, store, DEFAULT_TABLE);
    let sink = RecordingSink::default();

    let summary = importer
        .run(&window(), &ImportOptions::default(), &sink)
        .unwrap();

    assert_eq!(summary.total_rows, 5);
    assert_eq!(summary.valid_records, 2);
    assert_eq!(summary.outcome.deleted, 1);
    assert_eq!(summary.outcome.inserted, 2);
    assert_eq!(importer.store().times(), vec![START, START + 40]);

    let stored = importer.store().records.borrow();
    assert_eq!(stored[0].position.coordinates, [8.57, 50.03]);

    let messages = sink.messages.borrow();
    assert!(messages[0].starts_with("SELECT icao24, lat, lon, time FROM"));
    assert!(messages.iter().any(|message| message == "Total Response: 5"));
    assert!(messages.iter().any(|message| message == "Filtered Total: 2"));
    assert!(
        messages
            .iter()
            .any(|message| message == "Data inserted: 2 records (1 removed)")
    );
}

#[test]
fn pipeline_with_no_valid_rows_still_clears_window() {
    let source = MockSource::Rows(vec![vec![json!(""), json!(1.0), json!(2.0), json!(START)]]);
    let store = MemoryStore::with_records(vec![record("stale", START)]);
    let importer = Importer::new(source, store, DEFAULT_TABLE);

    let summary = importer
        .run(&window(), &ImportOptions::default(), &RecordingSink::default())
        .unwrap();

    assert_eq!(summary.valid_records, 0);
    assert_eq!(summary.outcome.deleted, 1);
    assert!(importer.store().times().is_empty());
}

#[test]
fn empty_upstream_result_halts_before_store() {
    let store = MemoryStore::with_records(vec![record("kept", START)]);
    let importer = Importer::new(MockSource::Rows(Vec::new()), store, DEFAULT_TABLE);

    let err = importer
        .run(&window(), &ImportOptions::default(), &RecordingSink::default())
        .unwrap_err();

    assert_matches!(err, ImportError::NoData(_));
    assert_eq!(importer.store().mutations.get(), 0);
    assert_eq!(importer.store().times(), vec![START]);
}

#[test]
fn upstream_failure_halts_before_store() {
    let importer = Importer::new(MockSource::Failing, MemoryStore::default(), DEFAULT_TABLE);

    let err = importer
        .run(&window(), &ImportOptions::default(), &RecordingSink::default())
        .unwrap_err();

    assert!(err.is_upstream());
    assert_eq!(importer.store().mutations.get(), 0);
}

#[test]
fn delete_failure_skips_insert() {
    let store = MemoryStore {
        fail_delete: true,
        ..MemoryStore::with_records(vec![record("kept", START)])
    };

    let err = replace(&store, &[record("new", START + 10)], &window()).unwrap_err();

    assert_matches!(err, ImportError::StoreWrite(_));
    assert_eq!(store.mutations.get(), 1);
    assert_eq!(store.times(), vec![START]);
}

#[test]
fn insert_failure_is_store_write_error() {
    let source = MockSource::Rows(vec![vec![json!("a"), json!(1.0), json!(2.0), json!(START)]]);
    let store = MemoryStore {
        fail_insert: true,
        ..MemoryStore::default()
    };
    let importer = Importer::new(source, store, DEFAULT_TABLE);

    let err = importer
        .run(&window(), &ImportOptions::default(), &RecordingSink::default())
        .unwrap_err();
    assert_matches!(err, ImportError::StoreWrite(_));
}

#[test]
fn ensure_indexes_runs_when_requested() {
    let source = MockSource::Rows(vec![vec![json!("a"), json!(1.0), json!(2.0), json!(START)]]);
    let importer = Importer::new(source, MemoryStore::default(), DEFAULT_TABLE);
    let options = ImportOptions {
        ensure_indexes: true,
    };

    importer
        .run(&window(), &options, &RecordingSink::default())
        .unwrap();
    assert!(importer.store().indexed.get());
}

#[test]
fn unreachable_store_fails_check() {
    let importer = Importer::new(MockSource::Rows(Vec::new()), UnreachableStore, DEFAULT_TABLE);
    assert_matches!(importer.check_store(), Err(ImportError::StoreUnavailable(_)));
}
