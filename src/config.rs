use std::path::PathBuf;

use serde::{Deserialize, Serialize};

fn default_store_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_freshness_secs() -> u64 {
    30
}

fn default_poll_secs() -> u64 {
    5
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct DaymarkConfig {
    #[serde(default = "default_store_url")]
    pub store_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Age below which a cached day list is reused instead of refetched.
    #[serde(default = "default_freshness_secs")]
    pub freshness_secs: u64,
    /// Cadence of the store watch poll.
    #[serde(default = "default_poll_secs")]
    pub poll_secs: u64,
    #[serde(default)]
    pub debug_logging: bool,
}

impl Default for DaymarkConfig {
    fn default() -> Self {
        Self {
            store_url: default_store_url(),
            model: default_model(),
            freshness_secs: default_freshness_secs(),
            poll_secs: default_poll_secs(),
            debug_logging: false,
        }
    }
}

impl DaymarkConfig {
    pub fn path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("daymark")
            .join("config.json")
    }

    /// Read the config file, falling back to defaults when it is missing or
    /// unreadable.
    pub fn load() -> Self {
        let path = Self::path();
        match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                log::warn!("invalid config at {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) -> std::io::Result<()> {
        let path = Self::path();
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, raw)
    }

    /// The model credential stays out of the config file.
    pub fn api_key(&self) -> Option<String> {
        std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
    }
}
