//! Application configuration structures.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Probing and concurrency settings
    #[serde(default)]
    pub probe: ProbeConfig,

    /// Where the mirror directory comes from
    #[serde(default)]
    pub source: SourceConfig,

    /// sources.list output settings
    #[serde(default)]
    pub output: OutputConfig,

    /// Log verbosity
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.probe.user_agent.trim().is_empty() {
            return Err(AppError::validation("probe.user_agent is empty"));
        }
        if self.probe.timeout_secs == 0 {
            return Err(AppError::validation("probe.timeout_secs must be > 0"));
        }
        if self.probe.samples == 0 {
            return Err(AppError::validation("probe.samples must be > 0"));
        }
        if self.probe.max_concurrent == 0 {
            return Err(AppError::validation("probe.max_concurrent must be > 0"));
        }
        if self.probe.score_buffer == 0 {
            return Err(AppError::validation("probe.score_buffer must be > 0"));
        }
        if self.probe.run_deadline_secs == Some(0) {
            return Err(AppError::validation(
                "probe.run_deadline_secs must be > 0 when set",
            ));
        }
        self.source.url()?;
        if self.output.limit == 0 {
            return Err(AppError::validation("output.limit must be > 0"));
        }
        Ok(())
    }
}

/// How per-protocol latencies are folded into one site score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Min,
    #[default]
    Mean,
    Max,
}

impl Aggregation {
    /// Fold latencies in milliseconds. `None` for an empty slice.
    pub fn apply(&self, millis: &[u64]) -> Option<u64> {
        match self {
            Aggregation::Min => millis.iter().copied().min(),
            Aggregation::Max => millis.iter().copied().max(),
            Aggregation::Mean => {
                if millis.is_empty() {
                    None
                } else {
                    let sum: u128 = millis.iter().map(|&m| u128::from(m)).sum();
                    Some((sum / millis.len() as u128) as u64)
                }
            }
        }
    }
}

/// Probe and concurrency settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Timeout for one probe attempt, in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Attempts per endpoint; the fastest success wins
    #[serde(default = "defaults::samples")]
    pub samples: u32,

    /// Maximum probes in flight
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Capacity of the queue between probes and the accumulator
    #[serde(default = "defaults::score_buffer")]
    pub score_buffer: usize,

    /// Optional overall deadline; unfinished probes then score worst
    #[serde(default)]
    pub run_deadline_secs: Option<u64>,

    /// How per-protocol latencies are combined
    #[serde(default)]
    pub aggregation: Aggregation,
}

impl ProbeConfig {
    /// Per-attempt timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Overall run deadline, if any.
    pub fn run_deadline(&self) -> Option<Duration> {
        self.run_deadline_secs.map(Duration::from_secs)
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            samples: defaults::samples(),
            max_concurrent: defaults::max_concurrent(),
            score_buffer: defaults::score_buffer(),
            run_deadline_secs: None,
            aggregation: Aggregation::default(),
        }
    }
}

/// Mirror directory source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// URL of the full mirror list
    #[serde(default = "defaults::directory_url")]
    pub directory_url: String,
}

impl SourceConfig {
    /// The directory URL, parsed.
    pub fn url(&self) -> Result<Url> {
        Ok(Url::parse(self.directory_url.trim())?)
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            directory_url: defaults::directory_url(),
        }
    }
}

/// sources.list output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Destination file
    #[serde(default = "defaults::out_file")]
    pub out_file: String,

    /// Number of mirrors written
    #[serde(default = "defaults::limit")]
    pub limit: usize,

    /// Leave out mirrors that never answered
    #[serde(default = "defaults::skip_unreachable")]
    pub skip_unreachable: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            out_file: defaults::out_file(),
            limit: defaults::limit(),
            skip_unreachable: defaults::skip_unreachable(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default level when RUST_LOG is unset
    #[serde(default = "defaults::level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::level(),
        }
    }
}

mod defaults {
    // Probe defaults
    pub fn user_agent() -> String {
        concat!("mirror-selector/", env!("CARGO_PKG_VERSION")).into()
    }
    pub fn timeout() -> u64 {
        5
    }
    pub fn samples() -> u32 {
        3
    }
    pub fn max_concurrent() -> usize {
        16
    }
    pub fn score_buffer() -> usize {
        32
    }

    // Source defaults
    pub fn directory_url() -> String {
        "https://www.debian.org/mirror/list-full".into()
    }

    // Output defaults
    pub fn out_file() -> String {
        "./sources.list".into()
    }
    pub fn limit() -> usize {
        3
    }
    pub fn skip_unreachable() -> bool {
        true
    }

    // Logging defaults
    pub fn level() -> String {
        "info".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_user_agent() {
        let mut config = Config::default();
        config.probe.user_agent = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.probe.max_concurrent = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_deadline() {
        let mut config = Config::default();
        config.probe.run_deadline_secs = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [probe]
            timeout_secs = 2
            aggregation = "min"

            [output]
            limit = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.probe.timeout_secs, 2);
        assert_eq!(config.probe.aggregation, Aggregation::Min);
        assert_eq!(config.probe.samples, 3);
        assert_eq!(config.output.limit, 5);
        assert_eq!(config.output.out_file, "./sources.list");
        assert_eq!(
            config.source.directory_url,
            "https://www.debian.org/mirror/list-full"
        );
    }

    #[test]
    fn load_or_default_falls_back() {
        let config = Config::load_or_default("/nonexistent/mirror-selector.toml");
        assert_eq!(config.probe.max_concurrent, 16);
    }

    #[test]
    fn aggregation_apply() {
        let samples = [30, 10, 20];
        assert_eq!(Aggregation::Min.apply(&samples), Some(10));
        assert_eq!(Aggregation::Mean.apply(&samples), Some(20));
        assert_eq!(Aggregation::Max.apply(&samples), Some(30));
        assert_eq!(Aggregation::Mean.apply(&[]), None);
    }

    #[test]
    fn validate_rejects_bad_directory_url() {
        let mut config = Config::default();
        config.source.directory_url = "not a url".to_string();
        assert!(matches!(config.validate(), Err(AppError::Url(_))));
    }

    #[test]
    fn source_url_is_parsed() {
        let url = SourceConfig::default().url().unwrap();
        assert_eq!(url.host_str(), Some("www.debian.org"));
        assert_eq!(url.path(), "/mirror/list-full");
    }

    #[test]
    fn example_config_parses() {
        let config: Config =
            toml::from_str(include_str!("../../mirror-selector.example.toml")).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.probe.aggregation, Aggregation::Mean);
        assert_eq!(config.probe.run_deadline_secs, None);
        assert_eq!(config.logging.level, "info");
    }
}
