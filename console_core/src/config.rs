use std::{
    env, fs, io,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use thiserror::Error;

pub const BUILTIN_CONSOLE_CONFIG: &str = include_str!("data/console_config.json");

/// Environment variable naming a JSON file that replaces the builtin config.
pub const CONSOLE_CONFIG_ENV: &str = "CONSOLE_CONFIG_PATH";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Listen address of the remote transport.
    pub bind: SocketAddr,
    pub local_greeting: String,
    pub remote_greeting: String,
    /// Line that opens and closes a raw block.
    pub block_delimiter: String,
    /// How long a session waits for its command before giving up. The
    /// command itself is never cancelled.
    pub command_timeout_ms: Option<u64>,
    /// Commands run in order before any interactive command is admitted.
    pub initial_commands: Vec<String>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 9000),
            local_greeting: "Live console started. Type 'help' for commands.".to_string(),
            remote_greeting: "Live console connected. Type 'help' for commands.".to_string(),
            block_delimiter: "$".to_string(),
            command_timeout_ms: None,
            initial_commands: Vec::new(),
        }
    }
}

impl ConsoleConfig {
    pub fn builtin() -> Self {
        Self::from_json_str(BUILTIN_CONSOLE_CONFIG).expect("builtin console config should parse")
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConsoleConfigError> {
        let config: ConsoleConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConsoleConfigError> {
        let contents =
            fs::read_to_string(path).map_err(|source| ConsoleConfigError::ReadFailed {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConsoleConfigError> {
        let delimiter = &self.block_delimiter;
        if delimiter.is_empty() || delimiter.contains(char::is_whitespace) {
            return Err(ConsoleConfigError::InvalidDelimiter(delimiter.clone()));
        }
        Ok(())
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Error)]
pub enum ConsoleConfigError {
    #[error("failed to parse console config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read console config from {path:?}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("block delimiter must be a non-empty token without whitespace, got {0:?}")]
    InvalidDelimiter(String),
}

/// Load the config named by `CONSOLE_CONFIG_PATH`, falling back to the
/// builtin one. Returns the path that was used, if any.
pub fn load_console_config_from_env() -> (ConsoleConfig, Option<PathBuf>) {
    if let Some(path) = env::var_os(CONSOLE_CONFIG_ENV).map(PathBuf::from) {
        match ConsoleConfig::from_file(&path) {
            Ok(config) => {
                tracing::info!(
                    target: "live_console::config",
                    path = %path.display(),
                    "console_config.loaded=file"
                );
                return (config, Some(path));
            }
            Err(err) => {
                tracing::warn!(
                    target: "live_console::config",
                    path = %path.display(),
                    error = %err,
                    "console_config.load_failed"
                );
            }
        }
    }

    tracing::info!(
        target: "live_console::config",
        "console_config.loaded=builtin"
    );
    (ConsoleConfig::builtin(), None)
}
