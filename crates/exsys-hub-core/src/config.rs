//! Hub configuration
//!
//! Stored as JSON, e.g.:
//!
//! ```json
//! { "name": "Lab hub", "port": "/dev/ttyUSB0", "password": "pass" }
//! ```
//!
//! Missing fields fall back to the hub's factory settings.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::protocol::{
    commands::Password, ProtocolError, DEFAULT_BAUD_RATE, DEFAULT_PASSWORD, DEFAULT_TIMEOUT_MS,
};

/// Default display name for a hub
pub const DEFAULT_NAME: &str = "Exsys USB Hub";

/// Errors loading or applying a configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("No serial port configured")]
    MissingPort,

    #[error("Invalid password: {0}")]
    Password(#[from] ProtocolError),

    #[error("Baud rate must be non-zero")]
    InvalidBaudRate,
}

/// Connection settings for one hub
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Display name
    pub name: String,

    /// Serial port name (e.g. "/dev/ttyUSB0" or "COM3")
    pub port: Option<String>,

    /// Baud rate
    pub baud_rate: u32,

    /// Response timeout in milliseconds
    pub timeout_ms: u64,

    /// Management password (at most 8 characters)
    pub password: String,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            password: DEFAULT_PASSWORD.to_string(),
        }
    }
}

impl HubConfig {
    /// Configuration for `port` with factory settings
    pub fn for_port(port: impl Into<String>) -> Self {
        Self {
            port: Some(port.into()),
            ..Self::default()
        }
    }

    /// Load and validate a JSON config file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: HubConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the config as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Check values that would only fail later on the wire
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.baud_rate == 0 {
            return Err(ConfigError::InvalidBaudRate);
        }
        self.password()?;
        Ok(())
    }

    /// The password as a wire field
    pub fn password(&self) -> Result<Password, ConfigError> {
        Ok(Password::new(&self.password)?)
    }
}
