//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::client::ClientConfig;
use crate::cursor::DEFAULT_UNSET_SEGMENT;
use crate::page::DEFAULT_CONTAINER_ID;
use crate::poller::PollerConfig;
use crate::render::{MarkupMode, RenderConfig};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub watch: WatchConfig,

    #[serde(default)]
    pub render: RenderSettings,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// What to watch and how often
#[derive(Debug, Clone, Deserialize)]
pub struct WatchConfig {
    /// Thread page URL; usually given on the command line instead
    pub url: Option<String>,

    #[serde(default = "default_interval")]
    pub interval_ms: u64,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Path segment requested while no cursor marker was found
    #[serde(default = "default_unset_cursor")]
    pub unset_cursor: String,
}

fn default_interval() -> u64 {
    5000 // 5 seconds
}

fn default_request_timeout() -> u64 {
    10_000
}

fn default_unset_cursor() -> String {
    DEFAULT_UNSET_SEGMENT.to_string()
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            url: None,
            interval_ms: default_interval(),
            request_timeout_ms: default_request_timeout(),
            unset_cursor: default_unset_cursor(),
        }
    }
}

/// How new posts are rendered
#[derive(Debug, Clone, Deserialize)]
pub struct RenderSettings {
    #[serde(default = "default_container_id")]
    pub container_id: String,

    #[serde(default)]
    pub markup: MarkupMode,

    #[serde(default = "default_image_root")]
    pub image_root: String,

    #[serde(default = "default_image_alt")]
    pub image_alt: String,
}

fn default_container_id() -> String {
    DEFAULT_CONTAINER_ID.to_string()
}

fn default_image_root() -> String {
    "/".to_string()
}

fn default_image_alt() -> String {
    "image not found".to_string()
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            container_id: default_container_id(),
            markup: MarkupMode::default(),
            image_root: default_image_root(),
            image_alt: default_image_alt(),
        }
    }
}

/// Where the mirrored page goes
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    pub file: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment.
    ///
    /// Nothing is logged here since this runs before tracing is set up; the
    /// returned [`DefaultLoad`] says which file was used and which were skipped.
    pub fn load_default() -> DefaultLoad {
        let config_paths: Vec<PathBuf> = [
            dirs::config_dir().map(|p| p.join("threadwatch").join("config.toml")),
            Some(PathBuf::from("/etc/threadwatch/config.toml")),
            Some(PathBuf::from("./threadwatch.toml")),
        ]
        .into_iter()
        .flatten()
        .collect();

        Self::load_first(&config_paths)
    }

    /// Load the first existing file in `paths` that parses
    pub fn load_first(paths: &[PathBuf]) -> DefaultLoad {
        let mut skipped = Vec::new();

        for path in paths.iter().filter(|p| p.exists()) {
            match Self::load_with_env(path) {
                Ok(config) => {
                    return DefaultLoad {
                        config,
                        source: Some(path.clone()),
                        skipped,
                    }
                }
                Err(e) => skipped.push(e),
            }
        }

        DefaultLoad {
            config: Self::from_env(),
            source: None,
            skipped,
        }
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        // Watch overrides
        if let Ok(url) = std::env::var("THREADWATCH_URL") {
            self.watch.url = Some(url);
        }
        if let Ok(interval) = std::env::var("THREADWATCH_INTERVAL_MS") {
            if let Ok(ms) = interval.parse() {
                self.watch.interval_ms = ms;
            }
        }

        // Render overrides
        if let Ok(markup) = std::env::var("THREADWATCH_MARKUP") {
            if let Ok(mode) = markup.parse() {
                self.render.markup = mode;
            }
        }

        // Output overrides
        if let Ok(file) = std::env::var("THREADWATCH_OUTPUT") {
            self.output.file = Some(PathBuf::from(file));
        }

        // Logging overrides
        if let Ok(level) = std::env::var("THREADWATCH_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("THREADWATCH_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    /// Check values that would make the watcher misbehave
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.watch.interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "watch.interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.render.container_id.is_empty() {
            return Err(ConfigError::Invalid(
                "render.container_id must not be empty".to_string(),
            ));
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(ConfigError::Invalid(format!(
                "logging.format must be \"pretty\" or \"json\", got {:?}",
                self.logging.format
            )));
        }
        Ok(())
    }

    /// Thread client settings for `page_url`
    pub fn client_config(&self, page_url: &str) -> ClientConfig {
        ClientConfig {
            page_url: page_url.to_string(),
            request_timeout_ms: self.watch.request_timeout_ms,
            unset_segment: self.watch.unset_cursor.clone(),
        }
    }

    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            interval_ms: self.watch.interval_ms,
        }
    }

    pub fn render_config(&self) -> RenderConfig {
        RenderConfig {
            markup: self.render.markup,
            image_root: self.render.image_root.clone(),
            image_alt: self.render.image_alt.clone(),
        }
    }
}

/// Result of searching the default config locations
#[derive(Debug)]
pub struct DefaultLoad {
    pub config: Config,
    /// File the config came from; `None` means defaults plus environment
    pub source: Option<PathBuf>,
    /// Files that exist but could not be loaded
    pub skipped: Vec<ConfigError>,
}

impl DefaultLoad {
    /// Log where the config came from and every file that was skipped
    pub fn report(&self) {
        for error in &self.skipped {
            tracing::warn!("Ignoring config file: {}", error);
        }
        match &self.source {
            Some(path) => tracing::info!("Loaded config from {:?}", path),
            None => tracing::info!("Using default config with environment overrides"),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Threadwatch Configuration
#
# Environment variables override these settings:
# - THREADWATCH_URL
# - THREADWATCH_INTERVAL_MS
# - THREADWATCH_MARKUP
# - THREADWATCH_OUTPUT
# - THREADWATCH_LOG_LEVEL
# - THREADWATCH_LOG_FORMAT

[watch]
# Thread page to watch (normally passed on the command line)
# url = "http://localhost:8000/thread/1"

# Wait between poll cycles (ms)
interval_ms = 5000

# Request timeout (ms)
request_timeout_ms = 10000

# Cursor requested when the page carries no marker
unset_cursor = "0"

[render]
# Id of the element new posts are appended to
container_id = "commentSection"

# Post fields as markup ("raw") or as plain text ("escaped")
markup = "raw"

# Prefix for post image paths
image_root = "/"

# Alt text for post images
image_alt = "image not found"

[output]
# Mirror the rendered page to this file after every cycle with new posts
# file = "thread.html"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
