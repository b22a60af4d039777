// ⚙️ Runtime configuration
// Defaults, then an optional JSON file, then HERDBOOK_* environment variables.
// CLI flags are applied last by the binaries.

use anyhow::{Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "HERDBOOK_CONFIG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    pub fn parse(raw: &str) -> Option<LogFormat> {
        match raw.trim().to_lowercase().as_str() {
            "text" => Some(LogFormat::Text),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database file
    pub database_path: PathBuf,

    /// Address the REST server binds to
    pub bind_address: String,

    pub log_format: LogFormat,

    /// Recorded as the actor on every event written by this process
    pub actor: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_path: PathBuf::from("herdbook.db"),
            bind_address: "0.0.0.0:3000".to_string(),
            log_format: LogFormat::Text,
            actor: "herdbook".to_string(),
        }
    }
}

impl Config {
    /// Load config from a JSON file. Missing keys fall back to defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: Config =
            serde_json::from_str(&content).context("Failed to parse config JSON")?;

        Ok(config)
    }

    /// Build the effective config: defaults, the file named by `explicit` or
    /// `HERDBOOK_CONFIG` (if any), then environment overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let from_env = std::env::var(CONFIG_ENV).ok().map(PathBuf::from);

        let mut config = match explicit.map(Path::to_path_buf).or(from_env) {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply `HERDBOOK_DB`, `HERDBOOK_BIND`, `HERDBOOK_LOG_FORMAT` and
    /// `HERDBOOK_ACTOR` from the given lookup
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(db) = lookup("HERDBOOK_DB").filter(|v| !v.is_empty()) {
            self.database_path = PathBuf::from(db);
        }
        if let Some(bind) = lookup("HERDBOOK_BIND").filter(|v| !v.is_empty()) {
            self.bind_address = bind;
        }
        if let Some(format) = lookup("HERDBOOK_LOG_FORMAT").and_then(|v| LogFormat::parse(&v)) {
            self.log_format = format;
        }
        if let Some(actor) = lookup("HERDBOOK_ACTOR").filter(|v| !v.is_empty()) {
            self.actor = actor;
        }
    }
}

/// Install the global tracing subscriber. `RUST_LOG` wins over the default
/// filter. Safe to call more than once; later calls are ignored.
pub fn init_logging(format: LogFormat) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "herdbook=info,tower_http=info".into());

    let result = match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init(),
    };

    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.database_path, PathBuf::from("herdbook.db"));
        assert_eq!(config.bind_address, "0.0.0.0:3000");
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn test_from_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"database_path": "/tmp/farm.db", "log_format": "json"}}"#).unwrap();
        file.flush().unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/farm.db"));
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.bind_address, "0.0.0.0:3000");
    }

    #[test]
    fn test_from_file_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        file.flush().unwrap();

        assert!(Config::from_file(file.path()).is_err());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("HERDBOOK_DB", "herd.sqlite"),
            ("HERDBOOK_BIND", "127.0.0.1:8080"),
            ("HERDBOOK_LOG_FORMAT", "JSON"),
            ("HERDBOOK_ACTOR", ""),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.database_path, PathBuf::from("herd.sqlite"));
        assert_eq!(config.bind_address, "127.0.0.1:8080");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.actor, "herdbook");
    }
}
