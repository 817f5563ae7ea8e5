use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::backend::DEFAULT_BASE_URL;
use crate::data::DEFAULT_EXAMPLE_DELAY;
use crate::embed::DEFAULT_ENDPOINT;

const DEFAULT_ENV_PREFIX: &str = "TWEETLYTICS";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub examples: ExamplesConfig,
    #[serde(default)]
    pub embed: EmbedConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_backend_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            timeout: default_backend_timeout(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_user_agent() -> String {
    format!("tweetlytics/{}", crate::VERSION)
}

fn default_backend_timeout() -> Duration {
    Duration::from_secs(20)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExamplesConfig {
    #[serde(default = "default_example_delay", with = "humantime_serde")]
    pub delay: Duration,
}

impl Default for ExamplesConfig {
    fn default() -> Self {
        Self {
            delay: default_example_delay(),
        }
    }
}

fn default_example_delay() -> Duration {
    DEFAULT_EXAMPLE_DELAY
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbedConfig {
    #[serde(default = "default_embed_enabled")]
    pub enabled: bool,
    #[serde(default = "default_embed_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_embed_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            enabled: default_embed_enabled(),
            endpoint: default_embed_endpoint(),
            timeout: default_embed_timeout(),
        }
    }
}

fn default_embed_enabled() -> bool {
    true
}

fn default_embed_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_embed_timeout() -> Duration {
    Duration::from_secs(8)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_file")]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_file() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("tweetlytics").join("tweetlytics.log"))
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_file: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

pub fn load(options: LoadOptions) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(path) = options.config_file.as_ref() {
        if path.exists() {
            cfg = read_config_file(path)?;
        }
    } else if let Some(default_path) = default_config_path() {
        if default_path.exists() {
            cfg = read_config_file(&default_path)?;
        }
    }

    let prefix = options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
    apply_env(&mut cfg, prefix);

    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&data)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
    Ok(config)
}

/// Only the backend location can come from the environment.
fn apply_env(cfg: &mut Config, prefix: &str) {
    let key = format!("{}_BACKEND__BASE_URL", prefix.to_uppercase());
    if let Ok(value) = env::var(&key) {
        let value = value.trim();
        if !value.is_empty() {
            cfg.backend.base_url = value.to_string();
        }
    }
}

pub fn default_path() -> Option<PathBuf> {
    default_config_path()
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("tweetlytics").join("config.yaml"))
}

pub fn to_yaml(cfg: &Config) -> Result<String> {
    serde_yaml::to_string(cfg).context("config: failed to serialize config")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tempfile::tempdir;

    fn missing_file() -> LoadOptions {
        LoadOptions {
            config_file: Some(PathBuf::from("/nonexistent/tweetlytics/config.yaml")),
            env_prefix: Some("TWEETLYTICS_TEST_DEFAULTS".into()),
        }
    }

    #[test]
    fn load_defaults_without_files() {
        let cfg = load(missing_file()).unwrap();
        assert_eq!(cfg.backend.base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.examples.delay, DEFAULT_EXAMPLE_DELAY);
        assert!(cfg.embed.enabled);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn reads_partial_yaml_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "backend:\n  base_url: https://analysis.example.org\n  timeout: 5s\nexamples:\n  delay: 250ms\nembed:\n  enabled: false\n",
        )
        .unwrap();
        let cfg = load(LoadOptions {
            config_file: Some(path),
            env_prefix: Some("TWEETLYTICS_TEST_FILE".into()),
        })
        .unwrap();
        assert_eq!(cfg.backend.base_url, "https://analysis.example.org");
        assert_eq!(cfg.backend.timeout, Duration::from_secs(5));
        assert_eq!(cfg.backend.user_agent, default_user_agent());
        assert_eq!(cfg.examples.delay, Duration::from_millis(250));
        assert!(!cfg.embed.enabled);
        assert_eq!(cfg.embed.endpoint, DEFAULT_ENDPOINT);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "backend: [not, a, map]\n").unwrap();
        let err = load(LoadOptions {
            config_file: Some(path),
            env_prefix: Some("TWEETLYTICS_TEST_BAD".into()),
        })
        .unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn env_overrides_backend_base_url() {
        env::set_var("TWEETLYTICS_TEST_ENV_BACKEND__BASE_URL", "http://10.0.0.2:9000");
        let cfg = load(LoadOptions {
            config_file: Some(PathBuf::from("/nonexistent/config.yaml")),
            env_prefix: Some("TWEETLYTICS_TEST_ENV".into()),
        })
        .unwrap();
        assert_eq!(cfg.backend.base_url, "http://10.0.0.2:9000");
        env::remove_var("TWEETLYTICS_TEST_ENV_BACKEND__BASE_URL");
    }

    #[test]
    fn yaml_output_reloads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let mut cfg = Config::default();
        cfg.examples.delay = Duration::from_millis(10);
        fs::write(&path, to_yaml(&cfg).unwrap()).unwrap();
        assert_eq!(read_config_file(&path).unwrap(), cfg);
    }
}
