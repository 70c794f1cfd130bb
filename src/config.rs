use std::collections::HashMap;
use std::env;

use camino::{Utf8Path, Utf8PathBuf};
use directories::ProjectDirs;
use tracing::debug;

use crate::error::ImportError;
use crate::fetch::DEFAULT_TABLE;

pub const DEFAULT_DB_PORT: u16 = 27017;
pub const DEFAULT_COLLECTION: &str = "flightData";
pub const DEFAULT_TRINO_URL: &str = "https://trino.opensky-network.org";
pub const DEFAULT_AUTH_URL: &str =
    "https://auth.opensky-network.org/auth/realms/opensky-network/protocol/openid-connect/token";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub collection: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenSkyConfig {
    pub username: String,
    pub password: String,
    pub trino_url: String,
    pub auth_url: String,
    pub table: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub store: StoreConfig,
    pub opensky: OpenSkyConfig,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Resolves from the process environment, falling back to a dotenv file.
    ///
    /// An explicit `env_file` must exist; otherwise `./.env` and then the
    /// per-user config directory are tried.
    pub fn resolve(env_file: Option<&Utf8Path>) -> Result<ResolvedConfig, ImportError> {
        let file_vars = match env_file {
            Some(path) => read_env_file(path)?,
            None => match default_env_file() {
                Some(path) => read_env_file(&path)?,
                None => HashMap::new(),
            },
        };
        Self::resolve_with(|name| env::var(name).ok().or_else(|| file_vars.get(name).cloned()))
    }

    pub fn resolve_with<F>(lookup: F) -> Result<ResolvedConfig, ImportError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or(ImportError::MissingEnv(name))
        };
        let optional = |name: &'static str, default: &str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let port = match lookup("DB_PORT").filter(|value| !value.trim().is_empty()) {
            Some(value) => value.trim().parse().map_err(|_| ImportError::InvalidEnv {
                name: "DB_PORT",
                message: format!("'{value}' is not a valid port number"),
            })?,
            None => DEFAULT_DB_PORT,
        };

        let store = StoreConfig {
            host: required("DB_HOST")?,
            port,
            user: required("DB_USER")?,
            password: required("DB_PW")?,
            database: required("DB_NAME")?,
            collection: optional("DB_COLLECTION", DEFAULT_COLLECTION),
        };
        let opensky = OpenSkyConfig {
            username: required("OPENSKY_USERNAME")?,
            password: required("OPENSKY_PASSWORD")?,
            trino_url: optional("OPENSKY_TRINO_URL", DEFAULT_TRINO_URL),
            auth_url: optional("OPENSKY_AUTH_URL", DEFAULT_AUTH_URL),
            table: optional("OPENSKY_TABLE", DEFAULT_TABLE),
        };
        Ok(ResolvedConfig { store, opensky })
    }
}

pub fn read_env_file(path: &Utf8Path) -> Result<HashMap<String, String>, ImportError> {
    let env_file_error = |message: String| ImportError::EnvFile {
        path: path.to_path_buf(),
        message,
    };
    let iter = dotenvy::from_path_iter(path.as_std_path())
        .map_err(|err| env_file_error(err.to_string()))?;
    let vars = iter
        .collect::<Result<HashMap<_, _>, _>>()
        .map_err(|err| env_file_error(err.to_string()))?;
    debug!(path = %path, count = vars.len(), "loaded env file");
    Ok(vars)
}

fn default_env_file() -> Option<Utf8PathBuf> {
    let local = Utf8PathBuf::from(".env");
    if local.as_std_path().is_file() {
        return Some(local);
    }
    ProjectDirs::from("", "", "flight-import")
        .and_then(|dirs| Utf8PathBuf::from_path_buf(dirs.config_dir().join(".env")).ok())
        .filter(|path| path.as_std_path().is_file())
}
