//! Runtime configuration, read from a TOML file.
//!
//! Every key is optional; a missing file means all defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use derivative::Derivative;
use serde::{Deserialize, Serialize};

use crate::app::error::{Result, TodoError};

/// Environment variable naming an alternative config file.
pub const CONFIG_ENV: &str = "TODO_LIST_CONFIG";

/// Config file looked up in the working directory by default.
pub const DEFAULT_CONFIG_FILE: &str = "todo_list.toml";

#[derive(Debug, Clone, PartialEq, Eq, Derivative, Serialize, Deserialize)]
#[derivative(Default)]
#[serde(default)]
pub struct AppConfig {
    /// SQLite database file.
    #[derivative(Default(value = "PathBuf::from(\"database.db\")"))]
    pub database_path: PathBuf,
    /// UI redraw / input poll interval in milliseconds.
    #[derivative(Default(value = "250"))]
    pub tick_rate_ms: u64,
    /// How many ticks a snackbar message stays on screen.
    #[derivative(Default(value = "12"))]
    pub snackbar_ticks: u32,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Derivative, Serialize, Deserialize)]
#[derivative(Default)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directives; `RUST_LOG` wins when set.
    #[derivative(Default(value = "\"info\".to_string()"))]
    pub filter: String,
    /// Directory for the log file. The terminal is busy drawing, so logs never go to stdout.
    #[derivative(Default(value = "PathBuf::from(\".\")"))]
    pub directory: PathBuf,
    #[derivative(Default(value = "\"todo_list.log\".to_string()"))]
    pub file_name: String,
}

impl AppConfig {
    pub fn tick_rate(&self) -> Duration {
        Duration::from_millis(self.tick_rate_ms)
    }

    /// Loads from `$TODO_LIST_CONFIG`, falling back to `todo_list.toml`.
    pub fn load() -> Result<Self> {
        let path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::parse(&contents)
                .map_err(|e| TodoError::Config(format!("{}: {e}", path.display()))),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn parse(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| TodoError::Config(e.to_string()))
    }
}
