use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourierConfig {
    // HTTP + websocket listener
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    // Root of the storage namespace (holds messages/ and inbox.json)
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    // Who the compose page addresses before anyone has been picked
    #[serde(default = "default_recipient")]
    pub default_recipient: String,

    // Push delivery cadence
    #[serde(default = "default_push_interval_ms")]
    pub push_interval_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_io_failure_alert_threshold")]
    pub io_failure_alert_threshold: u32,
}

fn default_bind_addr() -> String {
    "0.0.0.0:5000".to_string()
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_recipient() -> String {
    "another".to_string()
}

fn default_push_interval_ms() -> u64 {
    1000
}

fn default_poll_interval_ms() -> u64 {
    50
}

fn default_io_failure_alert_threshold() -> u32 {
    3
}

impl Default for CourierConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            data_dir: default_data_dir(),
            default_recipient: default_recipient(),
            push_interval_ms: default_push_interval_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            io_failure_alert_threshold: default_io_failure_alert_threshold(),
        }
    }
}

impl CourierConfig {
    /// Get the directory containing the executable
    fn get_base_dir() -> PathBuf {
        match std::env::current_exe() {
            Ok(exe_path) => exe_path
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from(".")),
            Err(_) => PathBuf::from("."),
        }
    }

    pub fn config_path() -> PathBuf {
        Self::get_base_dir().join("courier_config.toml")
    }

    /// Load config from courier_config.toml (next to executable), falling back to env vars
    pub fn load() -> Self {
        let path = Self::config_path();

        if let Ok(contents) = fs::read_to_string(&path) {
            match toml::from_str::<CourierConfig>(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {:?}", path);
                    return config;
                }
                Err(e) => {
                    tracing::error!("Failed to parse {:?}: {}", path, e);
                }
            }
        }

        tracing::warn!("No config file found, using defaults + env vars");
        Self::from_env()
    }

    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = env::var("COURIER_BIND") {
            if !addr.trim().is_empty() {
                config.bind_addr = addr.trim().to_string();
            }
        }

        if let Ok(dir) = env::var("COURIER_DATA_DIR") {
            if !dir.trim().is_empty() {
                config.data_dir = dir;
            }
        }

        if let Ok(name) = env::var("COURIER_DEFAULT_RECIPIENT") {
            if !name.trim().is_empty() {
                config.default_recipient = name.trim().to_string();
            }
        }

        if let Ok(interval) = env::var("COURIER_PUSH_INTERVAL_MS") {
            if let Ok(ms) = interval.parse() {
                config.push_interval_ms = ms;
            }
        }

        if let Ok(interval) = env::var("COURIER_POLL_INTERVAL_MS") {
            if let Ok(ms) = interval.parse() {
                config.poll_interval_ms = ms;
            }
        }

        if let Ok(threshold) = env::var("COURIER_IO_ALERT_THRESHOLD") {
            if let Ok(count) = threshold.parse() {
                config.io_failure_alert_threshold = count;
            }
        }

        config
    }

    pub fn push_interval(&self) -> Duration {
        Duration::from_millis(self.push_interval_ms.max(1))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}
