use serde::{Deserialize, Serialize};
use stagesync_preview::ChannelConfig;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_CONFIG_NAME: &str = "stagesync.config.json";

/// Stagesync configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Preview channel settings
    #[serde(flatten)]
    pub channel: ChannelConfig,

    /// How long the editor ignores echoes of its own writes
    #[serde(default = "default_settle_window_ms")]
    pub settle_window_ms: u64,
}

fn default_settle_window_ms() -> u64 {
    50
}

impl Config {
    /// Load config from a directory
    pub fn load(cwd: &str) -> anyhow::Result<Self> {
        let config_path = PathBuf::from(cwd).join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            // Return default config if none exists
            Ok(Config::default())
        }
    }

    pub fn settle_window(&self) -> Duration {
        Duration::from_millis(self.settle_window_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            channel: ChannelConfig::default(),
            settle_window_ms: default_settle_window_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let json = r#"{
            "experimentId": "memory-study",
            "previewUrl": "https://studio.example.org/preview",
            "debounceMs": 800,
            "settleWindowMs": 20
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.channel.experiment_id, "memory-study");
        assert_eq!(config.channel.preview_url, "https://studio.example.org/preview");
        assert_eq!(config.channel.debounce_ms, 800);
        assert_eq!(config.channel.ping_delay_ms, 500);
        assert_eq!(config.settle_window(), Duration::from_millis(20));
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.channel.preview_url, "http://localhost:5173");
        assert_eq!(config.channel.debounce_ms, 1500);
        assert_eq!(config.settle_window_ms, 50);
    }

    #[test]
    fn test_load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        let cwd = dir.path().display().to_string();
        assert_eq!(Config::load(&cwd).unwrap().channel.experiment_id, "");

        std::fs::write(
            dir.path().join(DEFAULT_CONFIG_NAME),
            r#"{"experimentId": "exp-3"}"#,
        )
        .unwrap();
        assert_eq!(Config::load(&cwd).unwrap().channel.experiment_id, "exp-3");

        std::fs::write(dir.path().join(DEFAULT_CONFIG_NAME), "{ nope").unwrap();
        assert!(Config::load(&cwd).is_err());
    }
}
