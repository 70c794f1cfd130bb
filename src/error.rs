use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ImportError {
    #[error("invalid arguments: {0}")]
    #[diagnostic(help("usage: flight-import [\"YYYY-MM-DD HH:MM\" \"YYYY-MM-DD HH:MM\"]"))]
    InvalidArguments(String),

    #[error("missing environment variable {0}")]
    MissingEnv(&'static str),

    #[error("invalid value for environment variable {name}: {message}")]
    InvalidEnv { name: &'static str, message: String },

    #[error("failed to read env file at {path}: {message}")]
    EnvFile { path: Utf8PathBuf, message: String },

    #[error("no connection could be established to the database: {0}")]
    StoreUnavailable(String),

    #[error("OpenSky request failed: {0}")]
    UpstreamHttp(String),

    #[error("OpenSky returned status {status}: {message}")]
    UpstreamStatus { status: u16, message: String },

    #[error("OpenSky query failed: {0}")]
    UpstreamQuery(String),

    #[error("no data found for {0}")]
    NoData(String),

    #[error("failed to write flight data: {0}")]
    StoreWrite(String),
}

impl ImportError {
    /// True for every failure attributed to the upstream data source.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            ImportError::UpstreamHttp(_)
                | ImportError::UpstreamStatus { .. }
                | ImportError::UpstreamQuery(_)
        )
    }
}
