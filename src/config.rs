//! Agent configuration
//!
//! Explicit configuration struct passed into the components that need it.
//! Values come from CLI flags merged over environment variables; nothing
//! mutates process-wide state after startup.

use crate::error::{AgentError, Result};
use std::path::PathBuf;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:1234";

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Base URL of the completion endpoint (no trailing slash)
    pub api_url: String,

    /// Path to the SQLite database file
    pub db_path: PathBuf,

    /// Timeout for a single completion call, in seconds
    pub request_timeout_secs: u64,
}

impl AgentConfig {
    pub fn new(api_url: impl Into<String>, db_path: impl Into<PathBuf>) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            db_path: db_path.into(),
            request_timeout_secs: 120,
        }
    }

    /// Build from environment variables (after `dotenv` has been loaded),
    /// with optional CLI overrides taking precedence.
    pub fn from_env(
        api_url_override: Option<String>,
        db_path_override: Option<PathBuf>,
    ) -> Result<Self> {
        let api_url = api_url_override
            .or_else(|| std::env::var("DBPILOT_API_URL").ok())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let db_path = db_path_override
            .or_else(|| std::env::var("DBPILOT_DB").ok().map(PathBuf::from))
            .ok_or_else(|| {
                AgentError::Config("no database path given (flag --db or DBPILOT_DB)".to_string())
            })?;

        Ok(Self::new(api_url, db_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_stripped_from_api_url() {
        let config = AgentConfig::new("http://localhost:1234/", "test.db");
        assert_eq!(config.api_url, "http://localhost:1234");
    }

    #[test]
    fn overrides_win_over_environment() {
        let config = AgentConfig::from_env(
            Some("http://10.0.0.5:8080".to_string()),
            Some(PathBuf::from("chinook.db")),
        )
        .unwrap();
        assert_eq!(config.api_url, "http://10.0.0.5:8080");
        assert_eq!(config.db_path, PathBuf::from("chinook.db"));
    }
}
