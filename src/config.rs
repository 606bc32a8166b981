// Recipe settings loaded from an optional TOML file
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::Result;

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RecipeSettings {
    /// Send attempts before an exchange is given up
    pub socket_attempts: u32,
    pub read_timeout_ms: u64,
    /// Overrides the per-interface command delay of every device
    pub command_delay_ms: Option<u64>,
    pub diagnostic_log_size: usize,
    /// Poll period of blocking prompts and inputs
    pub poll_interval_ms: u64,
}

impl Default for RecipeSettings {
    fn default() -> Self {
        Self {
            socket_attempts: 3,
            read_timeout_ms: 500,
            command_delay_ms: None,
            diagnostic_log_size: 500,
            poll_interval_ms: 250,
        }
    }
}

impl RecipeSettings {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn command_delay(&self) -> Option<Duration> {
        self.command_delay_ms.map(Duration::from_millis)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Loads settings from `path`. A missing file yields the defaults; a file
/// that exists but does not parse is an error.
pub fn load_config(path: impl AsRef<Path>) -> Result<RecipeSettings> {
    match std::fs::read_to_string(path.as_ref()) {
        Ok(s) => Ok(toml::from_str::<RecipeSettings>(&s)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(RecipeSettings::default()),
        Err(e) => Err(e.into()),
    }
}
