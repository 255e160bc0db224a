//! Channel configuration

use crate::errors::ChannelError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

pub const DEFAULT_DEBOUNCE_MS: u64 = 1500;
pub const DEFAULT_PING_DELAY_MS: u64 = 500;

pub const DEFAULT_PREVIEW_URL: &str = "http://localhost:5173";

/// Settings for one editor ↔ preview channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChannelConfig {
    /// Experiment every message is scoped to
    pub experiment_id: String,

    /// Base URL the preview is served from; its origin gates all traffic
    pub preview_url: String,

    /// Quiet period before a queued update is sent
    pub debounce_ms: u64,

    /// Delay before the first keepalive probe of a freshly opened preview
    pub ping_delay_ms: u64,

    /// Probes sent before giving up on a silent preview; each retry doubles
    /// the delay
    pub max_ping_attempts: u32,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            experiment_id: String::new(),
            preview_url: DEFAULT_PREVIEW_URL.to_string(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            ping_delay_ms: DEFAULT_PING_DELAY_MS,
            max_ping_attempts: 1,
        }
    }
}

impl ChannelConfig {
    pub fn new(experiment_id: impl Into<String>, preview_url: impl Into<String>) -> Self {
        Self {
            experiment_id: experiment_id.into(),
            preview_url: preview_url.into(),
            ..Self::default()
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn ping_delay(&self) -> Duration {
        Duration::from_millis(self.ping_delay_ms)
    }

    /// Serialized origin (`scheme://host[:port]`) of the preview URL
    pub fn preview_origin(&self) -> Result<String, ChannelError> {
        let url = Url::parse(&self.preview_url)?;
        let origin = url.origin();
        if !origin.is_tuple() {
            return Err(ChannelError::OpaqueOrigin(self.preview_url.clone()));
        }
        Ok(origin.ascii_serialization())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_drops_path_and_default_port() {
        let config = ChannelConfig::new("e1", "https://studio.example.org:443/preview/e1?x=1");
        assert_eq!(config.preview_origin().unwrap(), "https://studio.example.org");

        let local = ChannelConfig::new("e1", "http://localhost:5173/preview");
        assert_eq!(local.preview_origin().unwrap(), "http://localhost:5173");
    }

    #[test]
    fn test_invalid_urls_rejected() {
        assert!(matches!(
            ChannelConfig::new("e1", "not a url").preview_origin(),
            Err(ChannelError::InvalidPreviewUrl(_))
        ));
        assert!(matches!(
            ChannelConfig::new("e1", "data:text/html,hi").preview_origin(),
            Err(ChannelError::OpaqueOrigin(_))
        ));
    }

    #[test]
    fn test_parse_config_with_defaults() {
        let json = r#"{"experimentId": "exp-9", "previewUrl": "http://localhost:3000"}"#;
        let config: ChannelConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.experiment_id, "exp-9");
        assert_eq!(config.debounce(), Duration::from_millis(1500));
        assert_eq!(config.ping_delay(), Duration::from_millis(500));
        assert_eq!(config.max_ping_attempts, 1);
    }

    #[test]
    fn test_empty_config_is_default() {
        let config: ChannelConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ChannelConfig::default());
        assert_eq!(config.preview_origin().unwrap(), "http://localhost:5173");
    }
}
