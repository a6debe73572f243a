use crate::evaluate::Thresholds;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 161;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_community")]
    pub community: String,
    #[serde(default = "default_snmpwalk_path")]
    pub snmpwalk_path: String,
    #[serde(default = "default_table_oid")]
    pub table_oid: String,
    #[serde(default = "default_index_oid")]
    pub index_oid: String,
    #[serde(default = "default_timeout")]
    pub timeout: String,
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub perfdata: bool,
    #[serde(default)]
    pub textfile: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_port(),
            community: default_community(),
            snmpwalk_path: default_snmpwalk_path(),
            table_oid: default_table_oid(),
            index_oid: default_index_oid(),
            timeout: default_timeout(),
            thresholds: Thresholds::default(),
            perfdata: false,
            textfile: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse YAML in {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("invalid configuration: {0}")]
    Validation(String),
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let path_display = path_ref.display().to_string();
        let text = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_display.clone(),
            source,
        })?;

        Self::from_yaml(&text).map_err(|source| ConfigError::Parse {
            path: path_display,
            source,
        })
    }

    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Validation(
                "host is required".to_string(),
            ));
        }
        if self.port == 0 {
            return Err(ConfigError::Validation(
                "port must be in range 1..65535".to_string(),
            ));
        }
        if self.community.is_empty() {
            return Err(ConfigError::Validation(
                "community must not be empty".to_string(),
            ));
        }
        if self.table_oid.trim().is_empty() || self.index_oid.trim().is_empty() {
            return Err(ConfigError::Validation(
                "table_oid and index_oid must not be empty".to_string(),
            ));
        }
        self.timeout_duration()?;
        validate_thresholds(&self.thresholds)?;

        Ok(())
    }

    pub fn timeout_duration(&self) -> Result<Duration, ConfigError> {
        let timeout = humantime::parse_duration(self.timeout.trim()).map_err(|err| {
            ConfigError::Validation(format!("timeout '{}' is invalid: {err}", self.timeout))
        })?;
        if timeout.is_zero() {
            return Err(ConfigError::Validation(
                "timeout must be > 0".to_string(),
            ));
        }
        Ok(timeout)
    }

    /// Agent address as passed to snmpwalk; the port is only spelled out
    /// when it is not the SNMP default.
    pub fn agent(&self) -> String {
        if self.port == DEFAULT_PORT {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    pub fn example_yaml() -> &'static str {
        include_str!("../config.yaml.example")
    }
}

fn validate_thresholds(thresholds: &Thresholds) -> Result<(), ConfigError> {
    for (name, value) in [
        ("warning_percent", thresholds.warning_percent),
        ("critical_percent", thresholds.critical_percent),
    ] {
        if !(1..=100).contains(&value) {
            return Err(ConfigError::Validation(format!(
                "thresholds.{name} must be in range 1..100"
            )));
        }
    }
    if thresholds.warning_percent >= thresholds.critical_percent {
        return Err(ConfigError::Validation(format!(
            "thresholds.warning_percent ({}) must be below thresholds.critical_percent ({})",
            thresholds.warning_percent, thresholds.critical_percent
        )));
    }
    Ok(())
}

const fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_community() -> String {
    "public".to_string()
}

fn default_snmpwalk_path() -> String {
    "/usr/bin/snmpwalk".to_string()
}

fn default_table_oid() -> String {
    "1.3.6.1.4.1.24681.1.2.17".to_string()
}

fn default_index_oid() -> String {
    ".1.3.6.1.4.1.24681.1.2.17.1.1".to_string()
}

pub fn default_timeout() -> String {
    "10s".to_string()
}
