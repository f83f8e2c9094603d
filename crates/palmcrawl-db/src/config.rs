use std::path::PathBuf;

use palmcrawl_core::CrawlError;

/// Default primary store, relative to the working directory.
pub const DEFAULT_DB_PATH: &str = "palmcrawl.db";

/// Configuration for the primary SQLite store.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_connections: 5,
        }
    }

    /// Read configuration from environment variables.
    ///
    /// - `PALMCRAWL_DB` (optional, defaults to `palmcrawl.db`)
    /// - `PALMCRAWL_DB_MAX_CONNECTIONS` (optional, defaults to 5)
    pub fn from_env() -> Result<Self, CrawlError> {
        let path = std::env::var("PALMCRAWL_DB").unwrap_or_else(|_| DEFAULT_DB_PATH.to_string());

        let max_connections = match std::env::var("PALMCRAWL_DB_MAX_CONNECTIONS") {
            Err(_) => 5,
            Ok(raw) => parse_max_connections(&raw)?,
        };

        Ok(Self {
            path: path.into(),
            max_connections,
        })
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections.max(1);
        self
    }
}

fn parse_max_connections(raw: &str) -> Result<u32, CrawlError> {
    let parsed: u32 = raw.trim().parse().map_err(|_| {
        CrawlError::ConfigError(format!(
            "Invalid PALMCRAWL_DB_MAX_CONNECTIONS '{raw}': must be a positive integer"
        ))
    })?;
    if parsed == 0 {
        return Err(CrawlError::ConfigError(
            "PALMCRAWL_DB_MAX_CONNECTIONS must be at least 1".into(),
        ));
    }
    Ok(parsed)
}
