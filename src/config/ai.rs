// src/config/ai.rs
use serde::{Deserialize, Serialize};
use std::env;

use super::ConfigError;

/// Env vars consulted (in order) when `api_key = "ENV"`.
pub const API_KEY_VARS: &[&str] = &["AI_API_KEY", "OPENAI_API_KEY", "DEEPSEEK_API_KEY"];

fn default_provider() -> String {
    "openai".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_api_key() -> String {
    "ENV".to_string()
}
fn default_daily_limit() -> u32 {
    200
}
fn default_temperature() -> f32 {
    0.4
}
fn default_max_tokens() -> u32 {
    2_048
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiSettings {
    /// "openai" | "deepseek" | "mock" (case-insensitive)
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Chat-completions URL; defaults per provider.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// "ENV" means: read from AI_API_KEY / OPENAI_API_KEY / DEEPSEEK_API_KEY
    #[serde(default = "default_api_key")]
    pub api_key: String,
    /// Real (non-cached) calls allowed per UTC day.
    #[serde(default = "default_daily_limit")]
    pub daily_limit: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            endpoint: None,
            api_key: default_api_key(),
            daily_limit: default_daily_limit(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl AiSettings {
    pub fn is_mock(&self) -> bool {
        self.provider == "mock"
    }

    pub fn endpoint_url(&self) -> String {
        if let Some(e) = self.endpoint.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
            return e.to_string();
        }
        match self.provider.as_str() {
            "deepseek" => "https://api.deepseek.com/chat/completions".to_string(),
            _ => "https://api.openai.com/v1/chat/completions".to_string(),
        }
    }

    /// Normalize the provider name and resolve an `"ENV"` api key.
    pub(crate) fn resolve(&mut self) -> Result<(), ConfigError> {
        self.provider = self.provider.trim().to_lowercase();
        match self.provider.as_str() {
            "openai" | "deepseek" | "mock" => {}
            other => {
                return Err(ConfigError::Invalid(format!(
                    "unsupported ai.provider `{other}`"
                )))
            }
        }
        if self.is_mock() {
            return Ok(());
        }

        if self.api_key.trim().eq_ignore_ascii_case("env") {
            self.api_key = API_KEY_VARS
                .iter()
                .find_map(|k| env::var(k).ok().filter(|v| !v.trim().is_empty()))
                .ok_or_else(|| ConfigError::MissingEnv(API_KEY_VARS.join(" / ")))?;
        }
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::Invalid("ai.api_key is empty".into()));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            self.temperature = default_temperature();
        }
        if self.daily_limit == 0 {
            return Err(ConfigError::Invalid("ai.daily_limit must be > 0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deepseek_gets_its_own_default_endpoint() {
        let s = AiSettings {
            provider: "deepseek".into(),
            ..AiSettings::default()
        };
        assert_eq!(s.endpoint_url(), "https://api.deepseek.com/chat/completions");
        let s = AiSettings {
            endpoint: Some("http://localhost:9000/v1/chat/completions".into()),
            ..s
        };
        assert_eq!(s.endpoint_url(), "http://localhost:9000/v1/chat/completions");
    }

    #[test]
    fn mock_needs_no_key_and_unknown_provider_fails() {
        let mut s = AiSettings {
            provider: " Mock ".into(),
            api_key: "ENV".into(),
            ..AiSettings::default()
        };
        s.resolve().unwrap();
        assert!(s.is_mock());

        let mut bad = AiSettings {
            provider: "claude".into(),
            ..AiSettings::default()
        };
        assert!(matches!(bad.resolve(), Err(ConfigError::Invalid(_))));
    }
}
