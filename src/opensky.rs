use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::config::OpenSkyConfig;
use crate::error::ImportError;
use crate::window::TimeWindow;

/// A single SQL statement against the state-vector table, scoped to a window.
#[derive(Debug, Clone)]
pub struct StateVectorRequest {
    pub sql: String,
    pub window: TimeWindow,
}

/// Tabular result of a query: column names plus one JSON array per row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl QueryResult {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

pub trait StateVectorSource {
    fn query(&self, request: &StateVectorRequest) -> Result<QueryResult, ImportError>;
}

/// OpenSky historical database over the Trino HTTP protocol.
#[derive(Clone)]
pub struct OpenSkyTrinoClient {
    client: Client,
    config: OpenSkyConfig,
}

impl OpenSkyTrinoClient {
    pub fn new(config: OpenSkyConfig) -> Result<Self, ImportError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("flight-import/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| ImportError::UpstreamHttp(err.to_string()))?,
        );
        headers.insert(
            "X-Trino-User",
            HeaderValue::from_str(&config.username).map_err(|err| ImportError::InvalidEnv {
                name: "OPENSKY_USERNAME",
                message: err.to_string(),
            })?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|err| ImportError::UpstreamHttp(err.to_string()))?;
        Ok(Self { client, config })
    }

    fn access_token(&self) -> Result<String, ImportError> {
        let response = self
            .client
            .post(&self.config.auth_url)
            .form(&[
                ("client_id", "trino-client"),
                ("grant_type", "password"),
                ("username", self.config.username.as_str()),
                ("password", self.config.password.as_str()),
            ])
            .send()
            .map_err(|err| ImportError::UpstreamHttp(err.to_string()))?;
        let token: TokenResponse = Self::handle_status(response)?
            .json()
            .map_err(|err| ImportError::UpstreamHttp(err.to_string()))?;
        Ok(token.access_token)
    }

    fn handle_status(response: Response) -> Result<Response, ImportError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "OpenSky request failed".to_string());
        Err(ImportError::UpstreamStatus { status, message })
    }

    fn read_page(response: Response) -> Result<StatementPage, ImportError> {
        Self::handle_status(response)?
            .json()
            .map_err(|err| ImportError::UpstreamHttp(err.to_string()))
    }
}

impl StateVectorSource for OpenSkyTrinoClient {
    fn query(&self, request: &StateVectorRequest) -> Result<QueryResult, ImportError> {
        let token = self.access_token()?;
        let statement_url = format!("{}/v1/statement", self.config.trino_url.trim_end_matches('/'));
        debug!(url = %statement_url, window = %request.window, "submitting statement");

        let response = self
            .client
            .post(&statement_url)
            .bearer_auth(&token)
            .body(request.sql.clone())
            .send()
            .map_err(|err| ImportError::UpstreamHttp(err.to_string()))?;

        let mut result = QueryResult::default();
        let mut next_uri = absorb_page(&mut result, Self::read_page(response)?)?;
        let mut pages = 1usize;
        while let Some(uri) = next_uri {
            let response = self
                .client
                .get(&uri)
                .bearer_auth(&token)
                .send()
                .map_err(|err| ImportError::UpstreamHttp(err.to_string()))?;
            next_uri = absorb_page(&mut result, Self::read_page(response)?)?;
            pages += 1;
        }
        debug!(pages, rows = result.rows.len(), "statement finished");
        Ok(result)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatementPage {
    #[serde(default)]
    next_uri: Option<String>,
    #[serde(default)]
    columns: Option<Vec<StatementColumn>>,
    #[serde(default)]
    data: Option<Vec<Vec<Value>>>,
    #[serde(default)]
    error: Option<StatementError>,
}

#[derive(Debug, Deserialize)]
struct StatementColumn {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatementError {
    message: String,
    #[serde(default)]
    error_name: Option<String>,
}

/// Folds one protocol page into `result`, returning the next page to follow.
fn absorb_page(
    result: &mut QueryResult,
    page: StatementPage,
) -> Result<Option<String>, ImportError> {
    if let Some(error) = page.error {
        let message = match error.error_name {
            Some(name) => format!("{name}: {}", error.message),
            None => error.message,
        };
        return Err(ImportError::UpstreamQuery(message));
    }
    if result.columns.is_empty() {
        if let Some(columns) = page.columns {
            result.columns = columns.into_iter().map(|column| column.name).collect();
        }
    }
    if let Some(data) = page.data {
        result.rows.extend(data);
    }
    Ok(page.next_uri)
}
