// src/config/mod.rs
//! Pipeline configuration: one TOML file plus a handful of env overrides.
//!
//! Lookup order for the file:
//! 1) $PIPELINE_CONFIG_PATH (must exist)
//! 2) config/pipeline.toml
//! 3) built-in defaults

pub mod ai;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use ai::AiSettings;

use crate::retry::RetryPolicy;

pub const ENV_CONFIG_PATH: &str = "PIPELINE_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/pipeline.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("missing environment variable {0}")]
    MissingEnv(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub paths: PathSettings,
    pub site: SiteSettings,
    pub ai: AiSettings,
    pub retry: RetrySettings,
    pub workers: WorkerSettings,
    pub social: SocialSettings,
    pub metrics: MetricsSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    /// Incoming candidate JSON files.
    pub queue_dir: PathBuf,
    /// Processed ids, reason log, social ledger and daily caps.
    pub state_dir: PathBuf,
    /// Published artifacts, `articles.json` and `sitemap.xml`.
    pub site_dir: PathBuf,
    /// Completion cache and daily call counter.
    pub cache_dir: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            queue_dir: PathBuf::from("data/queue"),
            state_dir: PathBuf::from("data/state"),
            site_dir: PathBuf::from("data/site"),
            cache_dir: PathBuf::from("data/cache/ai"),
        }
    }
}

impl PathSettings {
    /// Every path rooted under `root` (tests, one-off runs).
    pub fn under(root: &Path) -> Self {
        Self {
            queue_dir: root.join("queue"),
            state_dir: root.join("state"),
            site_dir: root.join("site"),
            cache_dir: root.join("cache"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteSettings {
    /// Absolute site URL, e.g. `https://news.example`. Enables canonical links and the sitemap.
    pub base_url: Option<String>,
}

impl SiteSettings {
    pub fn base_url(&self) -> Option<&str> {
        self.base_url
            .as_deref()
            .map(|u| u.trim().trim_end_matches('/'))
            .filter(|u| !u.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub attempt_timeout_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let p = RetryPolicy::default();
        Self {
            max_attempts: p.max_attempts,
            base_delay_ms: p.base_delay.as_millis() as u64,
            max_delay_ms: p.max_delay.as_millis() as u64,
            attempt_timeout_ms: p.attempt_timeout.as_millis() as u64,
        }
    }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            attempt_timeout: Duration::from_millis(self.attempt_timeout_ms),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSettings {
    /// Candidates processed concurrently (bounds in-flight AI calls).
    pub concurrency: usize,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self { concurrency: 4 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SocialSettings {
    /// Posts per platform per UTC day.
    pub daily_cap: u32,
    pub webhook: Option<WebhookSettings>,
    pub discord: Option<WebhookSettings>,
    pub slack: Option<WebhookSettings>,
    pub email: Option<EmailSettings>,
}

impl Default for SocialSettings {
    fn default() -> Self {
        Self {
            daily_cap: 10,
            webhook: None,
            discord: None,
            slack: None,
            email: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookSettings {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailSettings {
    pub smtp_host: String,
    pub username: String,
    /// "ENV" means: read from SMTP_PASS
    #[serde(default = "default_smtp_password")]
    pub password: String,
    pub from: String,
    pub to: String,
}

fn default_smtp_password() -> String {
    "ENV".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSettings {
    /// Prometheus textfile written at shutdown. `METRICS_TEXTFILE` overrides.
    pub textfile: Option<PathBuf>,
}

impl PipelineConfig {
    /// Load from env path / default path / defaults, apply env overrides, validate.
    pub fn load() -> Result<Self, ConfigError> {
        let mut cfg = match env::var(ENV_CONFIG_PATH) {
            Ok(p) => {
                let path = PathBuf::from(p);
                if !path.exists() {
                    return Err(ConfigError::Invalid(format!(
                        "{ENV_CONFIG_PATH} points to non-existent path {}",
                        path.display()
                    )));
                }
                Self::read_file(&path)?
            }
            Err(_) => {
                let path = PathBuf::from(DEFAULT_CONFIG_PATH);
                if path.exists() {
                    Self::read_file(&path)?
                } else {
                    tracing::info!(target: "config", "no config file found; using defaults");
                    Self::default()
                }
            }
        };
        cfg.apply_env_overrides()?;
        cfg.finalize()?;
        Ok(cfg)
    }

    /// Parse one file without env overrides or validation.
    pub fn read_file(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// PIPELINE_CONCURRENCY, SITE_BASE_URL, AI_TEST_MODE=mock, METRICS_TEXTFILE.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(v) = env::var("PIPELINE_CONCURRENCY") {
            self.workers.concurrency = v.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("PIPELINE_CONCURRENCY is not a number: `{v}`"))
            })?;
        }
        if let Ok(v) = env::var("SITE_BASE_URL") {
            self.site.base_url = Some(v);
        }
        if env::var("AI_TEST_MODE").map(|v| v == "mock").unwrap_or(false) {
            self.ai.provider = "mock".to_string();
        }
        if let Ok(v) = env::var("METRICS_TEXTFILE") {
            if !v.trim().is_empty() {
                self.metrics.textfile = Some(PathBuf::from(v));
            }
        }
        Ok(())
    }

    /// Resolve secrets and check invariants. Must run before the config is used.
    pub fn finalize(&mut self) -> Result<(), ConfigError> {
        self.ai.resolve()?;

        if self.workers.concurrency == 0 {
            return Err(ConfigError::Invalid("workers.concurrency must be >= 1".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be >= 1".into()));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::Invalid(
                "retry.base_delay_ms must not exceed retry.max_delay_ms".into(),
            ));
        }
        if self.retry.attempt_timeout_ms == 0 {
            return Err(ConfigError::Invalid("retry.attempt_timeout_ms must be > 0".into()));
        }
        if let Some(url) = self.site.base_url() {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::Invalid(format!(
                    "site.base_url must be an http(s) URL, got `{url}`"
                )));
            }
        }
        if let Some(email) = self.social.email.as_mut() {
            if email.password.trim().eq_ignore_ascii_case("env") {
                email.password = env::var("SMTP_PASS")
                    .map_err(|_| ConfigError::MissingEnv("SMTP_PASS".into()))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let cfg: PipelineConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.workers.concurrency, 4);
        assert_eq!(cfg.retry.policy(), RetryPolicy::default());
        assert_eq!(cfg.paths.queue_dir, PathBuf::from("data/queue"));
        assert!(cfg.social.discord.is_none());
    }

    #[test]
    fn sections_parse() {
        let cfg: PipelineConfig = toml::from_str(
            r#"
            [site]
            base_url = "https://news.example/"

            [ai]
            provider = "deepseek"
            model = "deepseek-chat"

            [retry]
            max_attempts = 5
            base_delay_ms = 200

            [social]
            daily_cap = 3
            [social.discord]
            url = "https://discord.example/hook"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.site.base_url(), Some("https://news.example"));
        assert_eq!(cfg.ai.model, "deepseek-chat");
        assert_eq!(cfg.retry.policy().max_attempts, 5);
        assert_eq!(cfg.retry.policy().base_delay, Duration::from_millis(200));
        assert_eq!(cfg.social.daily_cap, 3);
        assert_eq!(
            cfg.social.discord.as_ref().map(|d| d.url.as_str()),
            Some("https://discord.example/hook")
        );
    }

    #[test]
    fn finalize_rejects_bad_values() {
        let mut cfg = PipelineConfig::default();
        cfg.ai.provider = "mock".into();
        cfg.workers.concurrency = 0;
        assert!(matches!(cfg.finalize(), Err(ConfigError::Invalid(_))));

        let mut cfg = PipelineConfig::default();
        cfg.ai.provider = "mock".into();
        cfg.site.base_url = Some("news.example".into());
        assert!(matches!(cfg.finalize(), Err(ConfigError::Invalid(_))));
    }
}
