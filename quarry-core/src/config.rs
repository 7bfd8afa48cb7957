//! Configuration management

use crate::async_utils::RetryConfig;
use crate::error::{ErrorContext, QuarryError, QuarryResult};
use crate::logging::LoggingConfig;
use crate::types::{LlmConfig, ModelConfig, PipelineConfig, QuarryConfig, SearchConfig};
use std::path::{Path, PathBuf};
use tracing::info;

/// Environment variable overriding `search.endpoint`
pub const SEARCH_ENDPOINT_ENV: &str = "QUARRY_SEARCH_ENDPOINT";

impl Default for QuarryConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                provider: "openai".to_string(),
                api_key: None,
                base_url: None,
                temperature: 1.0,
                max_tokens: None,
            },
            models: ModelConfig::default(),
            search: SearchConfig {
                endpoint: "http://localhost:8888/search".to_string(),
                results_per_query: 5,
                max_content_chars: 120_000,
                request_timeout_secs: 30,
                max_concurrent_scrapes: 8,
                user_agent: format!("quarry/{}", env!("CARGO_PKG_VERSION")),
            },
            pipeline: PipelineConfig {
                min_documents: 3,
                relevance_threshold: 0.3,
                retry: RetryConfig::default(),
            },
            logging: LoggingConfig::default(),
        }
    }
}

impl QuarryConfig {
    /// Load configuration from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> QuarryResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| QuarryError::Config {
            message: format!("Failed to read config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("read_file")
                .with_suggestion("Check if the config file exists and is readable"),
        })?;

        let config: QuarryConfig = toml::from_str(&content).map_err(|e| QuarryError::Config {
            message: format!("Failed to parse config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("parse_toml")
                .with_suggestion("Check TOML syntax in config file"),
        })?;

        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> QuarryResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| QuarryError::Config {
            message: format!("Failed to serialize config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config").with_operation("serialize_toml"),
        })?;

        std::fs::write(path, content).map_err(|e| QuarryError::Config {
            message: format!("Failed to write config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("write_file")
                .with_suggestion("Check if the directory exists and is writable"),
        })?;

        Ok(())
    }

    /// Load configuration from an explicit path, or from the first default
    /// location that exists, falling back to built-in defaults.
    pub fn load(path: Option<&Path>) -> QuarryResult<Self> {
        let mut config = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(crate::not_found_error!(path.display(), "config"));
                }
                info!("Loading configuration from {:?}", path);
                Self::from_file(path)?
            }
            None => match Self::default_paths().into_iter().find(|p| p.exists()) {
                Some(path) => {
                    info!("Loading configuration from {:?}", path);
                    Self::from_file(&path)?
                }
                None => {
                    info!("No configuration file found, using defaults");
                    Self::default()
                }
            },
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Default configuration search locations, most specific last
    pub fn default_paths() -> Vec<PathBuf> {
        [
            dirs::config_dir().map(|d| d.join("quarry").join("config.toml")),
            dirs::home_dir().map(|d| d.join(".quarry").join("config.toml")),
            Some(PathBuf::from("quarry.toml")),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// Path used by `quarry config --init`
    pub fn user_config_path() -> QuarryResult<PathBuf> {
        dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|d| d.join(".config")))
            .map(|d| d.join("quarry").join("config.toml"))
            .ok_or_else(|| crate::config_error!("Could not determine a config directory", "config"))
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(endpoint) = std::env::var(SEARCH_ENDPOINT_ENV) {
            if !endpoint.trim().is_empty() {
                self.search.endpoint = endpoint;
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> QuarryResult<()> {
        if self.pipeline.min_documents == 0 {
            return Err(QuarryError::Config {
                message: "pipeline.min_documents must be greater than 0".to_string(),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Set pipeline.min_documents to a positive value"),
            });
        }

        if !(0.0..=1.0).contains(&self.pipeline.relevance_threshold) {
            return Err(QuarryError::Config {
                message: "pipeline.relevance_threshold must be within 0.0..=1.0".to_string(),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Use a threshold such as 0.3"),
            });
        }

        if self.pipeline.retry.max_attempts == 0 {
            return Err(QuarryError::Config {
                message: "pipeline.retry.max_attempts must be greater than 0".to_string(),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Set pipeline.retry.max_attempts to at least 1"),
            });
        }

        if self.search.results_per_query == 0 || self.search.max_concurrent_scrapes == 0 {
            return Err(QuarryError::Config {
                message: "search.results_per_query and search.max_concurrent_scrapes must be greater than 0"
                    .to_string(),
                source: None,
                context: ErrorContext::new("config").with_operation("validate"),
            });
        }

        if self.search.endpoint.trim().is_empty() {
            return Err(QuarryError::Config {
                message: "search.endpoint must not be empty".to_string(),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion(&format!(
                        "Set search.endpoint or the {} environment variable",
                        SEARCH_ENDPOINT_ENV
                    )),
            });
        }

        Ok(())
    }
}
