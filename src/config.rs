//! Configuration file parser for ~/.config/wikiscroll/config.toml.
//!
//! The file is optional; a missing or empty file yields `Config::default()`.
//! Unknown keys are ignored with a warning.
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::content::{DEFAULT_ACTION_API, DEFAULT_REST_BASE};
use crate::gesture::GestureConfig;
use crate::pipeline::ImagePolicy;
use crate::theme::ThemeVariant;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),
}

/// Application configuration. Any subset of keys may be given.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub rest_base_url: String,
    pub action_api_url: String,
    pub user_agent: String,

    /// Target number of articles waiting in the main-feed queue.
    pub queue_depth: usize,
    pub category_batch_size: usize,
    /// `cmlimit` for category member listings.
    pub category_page_size: u32,
    /// Members examined when looking for a category's first displayable article.
    pub first_displayable_scan: usize,
    pub overlay_preload: usize,
    pub overlay_scroll_batch: usize,
    pub cache_capacity: usize,

    pub image_timeout_secs: u64,
    pub image_max_attempts: u32,
    pub image_retry_delay_ms: u64,

    /// Fraction of the viewport width a swipe must exceed to commit.
    pub swipe_threshold: f64,
    pub scroll_settle_ms: u64,
    pub close_cooldown_ms: u64,
    pub animation_ms: u64,

    /// Per-request timeout for API calls. 0 disables it.
    pub request_timeout_secs: u64,

    /// "dark" or "light".
    pub theme: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rest_base_url: DEFAULT_REST_BASE.to_string(),
            action_api_url: DEFAULT_ACTION_API.to_string(),
            user_agent: concat!(
                "wikiscroll/",
                env!("CARGO_PKG_VERSION"),
                " (terminal article browser)"
            )
            .to_string(),
            queue_depth: 10,
            category_batch_size: 5,
            category_page_size: 50,
            first_displayable_scan: 5,
            overlay_preload: 10,
            overlay_scroll_batch: 5,
            cache_capacity: 512,
            image_timeout_secs: 5,
            image_max_attempts: 3,
            image_retry_delay_ms: 1000,
            swipe_threshold: 0.2,
            scroll_settle_ms: 500,
            close_cooldown_ms: 500,
            animation_ms: 300,
            request_timeout_secs: 0,
            theme: "dark".to_string(),
        }
    }
}

const KNOWN_KEYS: &[&str] = &[
    "rest_base_url",
    "action_api_url",
    "user_agent",
    "queue_depth",
    "category_batch_size",
    "category_page_size",
    "first_displayable_scan",
    "overlay_preload",
    "overlay_scroll_batch",
    "cache_capacity",
    "image_timeout_secs",
    "image_max_attempts",
    "image_retry_delay_ms",
    "swipe_threshold",
    "scroll_settle_ms",
    "close_cooldown_ms",
    "animation_ms",
    "request_timeout_secs",
    "theme",
];

impl Config {
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing or empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)`
    /// - Over 1 MiB → `Err(ConfigError::TooLarge)`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(ConfigError::Io(e)),
        };
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys().filter(|k| !KNOWN_KEYS.contains(&k.as_str())) {
                tracing::warn!(key = %key, "Unknown key in config file, ignoring");
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), queue_depth = config.queue_depth, "Loaded configuration");
        Ok(config)
    }

    pub fn image_policy(&self) -> ImagePolicy {
        ImagePolicy {
            max_attempts: self.image_max_attempts.max(1),
            retry_delay: Duration::from_millis(self.image_retry_delay_ms),
            timeout: Duration::from_secs(self.image_timeout_secs.max(1)),
        }
    }

    pub fn gesture_config(&self) -> GestureConfig {
        GestureConfig {
            threshold: self.swipe_threshold.clamp(0.01, 1.0),
            animation: Duration::from_millis(self.animation_ms),
            cooldown: Duration::from_millis(self.close_cooldown_ms),
        }
    }

    pub fn scroll_settle(&self) -> Duration {
        Duration::from_millis(self.scroll_settle_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Unknown names fall back to the dark theme.
    pub fn theme_variant(&self) -> ThemeVariant {
        ThemeVariant::from_str_name(&self.theme).unwrap_or_else(|| {
            tracing::warn!(theme = %self.theme, "Unknown theme, using dark");
            ThemeVariant::Dark
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write_config(name: &str, content: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("wikiscroll_config_{name}_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.queue_depth, 10);
        assert_eq!(config.category_batch_size, 5);
        assert_eq!(config.overlay_preload, 10);
        assert_eq!(config.swipe_threshold, 0.2);
        assert_eq!(config.request_timeout(), Duration::ZERO);
        assert_eq!(config.image_policy().max_attempts, 3);
        assert_eq!(config.image_policy().timeout, Duration::from_secs(5));
        assert!(config.rest_base_url.starts_with("https://"));
        assert_eq!(config.theme_variant(), ThemeVariant::Dark);
    }

    #[test]
    fn test_missing_file_returns_default() {
        let config = Config::load(Path::new("/tmp/wikiscroll_no_such_config.toml")).unwrap();
        assert_eq!(config.queue_depth, 10);
    }

    #[test]
    fn test_empty_file_returns_default() {
        let path = write_config("empty", "  \n");
        assert_eq!(Config::load(&path).unwrap().cache_capacity, 512);
    }

    #[test]
    fn test_partial_config_keeps_other_defaults() {
        let path = write_config(
            "partial",
            "queue_depth = 4\nswipe_threshold = 0.3\ntheme = \"light\"\nbogus_key = true\n",
        );
        let config = Config::load(&path).unwrap();
        assert_eq!(config.queue_depth, 4);
        assert_eq!(config.gesture_config().threshold, 0.3);
        assert_eq!(config.overlay_scroll_batch, 5);
        assert_eq!(config.theme_variant(), ThemeVariant::Light);
    }

    #[test]
    fn test_invalid_toml() {
        let path = write_config("invalid", "queue_depth = [");
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_too_large() {
        let path = write_config("large", &"#".repeat(1_048_577));
        assert!(matches!(Config::load(&path), Err(ConfigError::TooLarge(_))));
    }
}
