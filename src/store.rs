use std::time::Duration;

use mongodb::IndexModel;
use mongodb::bson::{self, Document, doc};
use mongodb::options::{ClientOptions, Credential, ServerAddress};
use mongodb::sync::{Client, Collection, Database};
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::domain::FlightRecord;
use crate::error::ImportError;
use crate::window::TimeWindow;

/// Collection holding imported flight records, addressed by `time`.
pub trait FlightStore {
    fn ping(&self) -> Result<(), ImportError>;
    /// Removes every record whose `time` lies in `[start, end]`.
    fn delete_window(&self, start: i64, end: i64) -> Result<u64, ImportError>;
    fn insert_many(&self, records: &[FlightRecord]) -> Result<usize, ImportError>;
    fn ensure_indexes(&self) -> Result<(), ImportError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReplaceOutcome {
    pub deleted: u64,
    pub inserted: usize,
}

/// Replaces the window's records with `records`: delete, then bulk insert.
///
/// The two steps are not atomic. An empty batch still clears the window.
pub fn replace<W: FlightStore + ?Sized>(
    store: &W,
    records: &[FlightRecord],
    window: &TimeWindow,
) -> Result<ReplaceOutcome, ImportError> {
    let deleted = store.delete_window(window.start_epoch(), window.end_epoch())?;
    let inserted = if records.is_empty() {
        0
    } else {
        store.insert_many(records)?
    };
    info!(deleted, inserted, window = %window, "window replaced");
    Ok(ReplaceOutcome { deleted, inserted })
}

pub struct MongoFlightStore {
    database: Database,
    collection: Collection<Document>,
}

impl MongoFlightStore {
    /// Builds the client. No network traffic happens until the first operation.
    pub fn connect(config: &StoreConfig) -> Result<Self, ImportError> {
        let mut options = ClientOptions::builder().build();
        options.hosts = vec![ServerAddress::Tcp {
            host: config.host.clone(),
            port: Some(config.port),
        }];
        options.credential = Some(
            Credential::builder()
                .username(config.user.clone())
                .password(config.password.clone())
                .build(),
        );
        options.app_name = Some(format!("flight-import/{}", env!("CARGO_PKG_VERSION")));
        options.server_selection_timeout = Some(Duration::from_secs(10));

        let client = Client::with_options(options)
            .map_err(|err| ImportError::StoreUnavailable(err.to_string()))?;
        let database = client.database(&config.database);
        let collection = database.collection::<Document>(&config.collection);
        debug!(host = %config.host, port = config.port, database = %config.database, "store client ready");
        Ok(Self {
            database,
            collection,
        })
    }
}

impl FlightStore for MongoFlightStore {
    fn ping(&self) -> Result<(), ImportError> {
        self.database
            .run_command(doc! { "ping": 1 })
            .run()
            .map_err(|err| ImportError::StoreUnavailable(err.to_string()))?;
        Ok(())
    }

    fn delete_window(&self, start: i64, end: i64) -> Result<u64, ImportError> {
        let result = self
            .collection
            .delete_many(doc! { "time": { "$gte": start, "$lte": end } })
            .run()
            .map_err(|err| ImportError::StoreWrite(format!("delete: {err}")))?;
        Ok(result.deleted_count)
    }

    fn insert_many(&self, records: &[FlightRecord]) -> Result<usize, ImportError> {
        let documents = records.iter().map(to_document).collect::<Vec<_>>();
        let result = self
            .collection
            .insert_many(documents)
            .run()
            .map_err(|err| ImportError::StoreWrite(format!("insert: {err}")))?;
        Ok(result.inserted_ids.len())
    }

    fn ensure_indexes(&self) -> Result<(), ImportError> {
        let indexes = vec![
            IndexModel::builder()
                .keys(doc! { "position": "2dsphere" })
                .build(),
            IndexModel::builder().keys(doc! { "time": 1 }).build(),
        ];
        self.collection
            .create_indexes(indexes)
            .run()
            .map_err(|err| ImportError::StoreWrite(format!("create indexes: {err}")))?;
        Ok(())
    }
}

pub fn to_document(record: &FlightRecord) -> Document {
    doc! {
        "icao": record.icao.as_str(),
        "position": {
            "type": record.position.kind,
            "coordinates": [record.position.lon(), record.position.lat()],
        },
        "time": record.time,
        "createdAt": bson::DateTime::from_millis(record.created_at.timestamp_millis()),
    }
}
