//! Application configuration
//!
//! Built-in defaults, then an optional config file, then the process
//! environment. Values are only checked by [`AppConfig::validate`], which
//! reports every problem at once for the chosen front end.

use crate::card::CardSettings;
use crate::observability::LangfuseConfig;
use prodcards_kernel::config::{ConfigError, load_layered};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variables read into [`AppConfig`]
pub const ENV_KEYS: &[&str] = &[
    "TELEGRAM_BOT_TOKEN",
    "GIGACHAT_API_KEY",
    "GIGACHAT_CLIENT_ID",
    "GIGACHAT_SCOPE",
    "GIGACHAT_MODEL",
    "GIGACHAT_TEMPERATURE",
    "GIGACHAT_TOP_P",
    "GIGACHAT_TIMEOUT_SECS",
    "GIGACHAT_VERIFY_SSL",
    "LANGFUSE_SECRET_KEY",
    "LANGFUSE_PUBLIC_KEY",
    "LANGFUSE_HOST",
    "DATA_DIR",
    "PROMPTS_DIR",
    "CATALOG_URL",
    "CATALOG_DELIMITER",
    "MAX_PRODUCTS_DISPLAY",
    "DEBUG_TOKENS",
    "LOG_FILE",
];

/// Placeholder shipped in sample `.env` files
const TOKEN_PLACEHOLDER: &str = "YOUR_BOT_TOKEN_HERE";

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ConfigError),
    #[error("Invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// Which front end is being started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontEnd {
    Console,
    Telegram,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub telegram_bot_token: Option<String>,
    pub gigachat_api_key: Option<String>,
    pub gigachat_client_id: Option<String>,
    pub gigachat_scope: String,
    pub gigachat_model: String,
    pub gigachat_temperature: f32,
    pub gigachat_top_p: f32,
    pub gigachat_timeout_secs: u64,
    pub gigachat_verify_ssl: bool,
    pub langfuse_secret_key: Option<String>,
    pub langfuse_public_key: Option<String>,
    pub langfuse_host: String,
    pub data_dir: PathBuf,
    pub prompts_dir: PathBuf,
    pub catalog_url: String,
    pub catalog_delimiter: String,
    pub max_products_display: usize,
    pub debug_tokens: bool,
    pub log_file: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            telegram_bot_token: None,
            gigachat_api_key: None,
            gigachat_client_id: None,
            gigachat_scope: "GIGACHAT_API_PERS".to_string(),
            gigachat_model: "GigaChat-Lite".to_string(),
            gigachat_temperature: 0.2,
            gigachat_top_p: 1.0,
            gigachat_timeout_secs: 120,
            gigachat_verify_ssl: false,
            langfuse_secret_key: None,
            langfuse_public_key: None,
            langfuse_host: "https://cloud.langfuse.com".to_string(),
            data_dir: PathBuf::from("data"),
            prompts_dir: PathBuf::from("prompts"),
            catalog_url: crate::loader::DEFAULT_CATALOG_URL.to_string(),
            catalog_delimiter: ",".to_string(),
            max_products_display: 10,
            debug_tokens: false,
            log_file: PathBuf::from("telegram_bot.log"),
        }
    }
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

fn mask(value: &Option<String>) -> String {
    match value.as_deref() {
        Some(v) if !v.trim().is_empty() => {
            let chars: Vec<char> = v.chars().collect();
            let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
            format!("***{}", tail)
        }
        _ => "not set".to_string(),
    }
}

impl AppConfig {
    /// Defaults, then `file` (if any), then the environment
    pub fn load(file: Option<&Path>) -> Result<Self, AppConfigError> {
        Ok(load_layered(file, ENV_KEYS)?)
    }

    /// Every problem that prevents `front_end` from starting
    pub fn validate(&self, front_end: FrontEnd) -> Vec<String> {
        let mut problems = Vec::new();

        if front_end == FrontEnd::Telegram {
            let token_ok = present(&self.telegram_bot_token)
                && self.telegram_bot_token.as_deref() != Some(TOKEN_PLACEHOLDER);
            if !token_ok {
                problems.push("TELEGRAM_BOT_TOKEN is not set".to_string());
            }
        }
        if !present(&self.gigachat_api_key) {
            problems.push("GIGACHAT_API_KEY is not set".to_string());
        }
        if !(0.0..=2.0).contains(&self.gigachat_temperature) {
            problems.push(format!(
                "GIGACHAT_TEMPERATURE must be within 0..2, got {}",
                self.gigachat_temperature
            ));
        }
        if !(0.0..=1.0).contains(&self.gigachat_top_p) {
            problems.push(format!(
                "GIGACHAT_TOP_P must be within 0..1, got {}",
                self.gigachat_top_p
            ));
        }
        if self.max_products_display == 0 {
            problems.push("MAX_PRODUCTS_DISPLAY must be positive".to_string());
        }
        if self.delimiter().is_none() {
            problems.push(format!(
                "CATALOG_DELIMITER must be a single ASCII character, got '{}'",
                self.catalog_delimiter
            ));
        }

        problems
    }

    /// [`Self::validate`] as a `Result`
    pub fn ensure_valid(&self, front_end: FrontEnd) -> Result<(), AppConfigError> {
        let problems = self.validate(front_end);
        if problems.is_empty() {
            Ok(())
        } else {
            Err(AppConfigError::Invalid(problems))
        }
    }

    /// Tracing is on only when both Langfuse keys are present
    pub fn langfuse_enabled(&self) -> bool {
        present(&self.langfuse_public_key) && present(&self.langfuse_secret_key)
    }

    pub fn langfuse(&self) -> Option<LangfuseConfig> {
        if !self.langfuse_enabled() {
            return None;
        }
        Some(LangfuseConfig::new(
            self.langfuse_public_key.clone().unwrap_or_default(),
            self.langfuse_secret_key.clone().unwrap_or_default(),
            self.langfuse_host.clone(),
        ))
    }

    pub fn card_settings(&self) -> CardSettings {
        CardSettings {
            model: self.gigachat_model.clone(),
            temperature: Some(self.gigachat_temperature),
            top_p: Some(self.gigachat_top_p),
            profanity_check: true,
        }
    }

    pub fn delimiter(&self) -> Option<u8> {
        match self.catalog_delimiter.as_bytes() {
            [b] if b.is_ascii() => Some(*b),
            _ => None,
        }
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.data_dir.join(crate::loader::CATALOG_FILE)
    }

    pub fn template_path(&self) -> PathBuf {
        self.prompts_dir.join(crate::prompt::TEMPLATE_FILE)
    }

    /// Display-safe settings, secrets masked
    pub fn summary(&self) -> Vec<(&'static str, String)> {
        vec![
            ("TELEGRAM_BOT_TOKEN", mask(&self.telegram_bot_token)),
            ("GIGACHAT_API_KEY", mask(&self.gigachat_api_key)),
            ("GIGACHAT_SCOPE", self.gigachat_scope.clone()),
            ("GIGACHAT_MODEL", self.gigachat_model.clone()),
            ("GIGACHAT_TEMPERATURE", self.gigachat_temperature.to_string()),
            ("GIGACHAT_TOP_P", self.gigachat_top_p.to_string()),
            ("GIGACHAT_TIMEOUT_SECS", self.gigachat_timeout_secs.to_string()),
            ("GIGACHAT_VERIFY_SSL", self.gigachat_verify_ssl.to_string()),
            (
                "LANGFUSE",
                if self.langfuse_enabled() {
                    format!("enabled ({})", self.langfuse_host)
                } else {
                    "disabled".to_string()
                },
            ),
            ("DATA_DIR", self.data_dir.display().to_string()),
            ("PROMPTS_DIR", self.prompts_dir.display().to_string()),
            ("CATALOG_URL", self.catalog_url.clone()),
            ("MAX_PRODUCTS_DISPLAY", self.max_products_display.to_string()),
            ("DEBUG_TOKENS", self.debug_tokens.to_string()),
            ("LOG_FILE", self.log_file.display().to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn valid() -> AppConfig {
        AppConfig {
            telegram_bot_token: Some("123:abc".into()),
            gigachat_api_key: Some("key".into()),
            ..Default::default()
        }
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.gigachat_model, "GigaChat-Lite");
        assert_eq!(config.gigachat_scope, "GIGACHAT_API_PERS");
        assert_eq!(config.max_products_display, 10);
        assert!(!config.gigachat_verify_ssl);
        assert_eq!(config.catalog_path(), PathBuf::from("data/products.csv"));
    }

    #[test]
    fn bot_needs_both_secrets() {
        let problems = AppConfig::default().validate(FrontEnd::Telegram);
        assert_eq!(problems.len(), 2);
        assert!(problems[0].contains("TELEGRAM_BOT_TOKEN"));
        assert!(problems[1].contains("GIGACHAT_API_KEY"));
    }

    #[test]
    fn console_needs_only_llm_key() {
        let config = AppConfig {
            gigachat_api_key: Some("key".into()),
            ..Default::default()
        };
        assert!(config.validate(FrontEnd::Console).is_empty());
        assert!(!config.validate(FrontEnd::Telegram).is_empty());
    }

    #[test]
    fn placeholder_token_counts_as_missing() {
        let config = AppConfig {
            telegram_bot_token: Some(TOKEN_PLACEHOLDER.into()),
            ..valid()
        };
        let err = config.ensure_valid(FrontEnd::Telegram).unwrap_err();
        assert!(err.to_string().contains("TELEGRAM_BOT_TOKEN"));
        assert!(valid().ensure_valid(FrontEnd::Telegram).is_ok());
    }

    #[test]
    fn out_of_range_values_are_all_reported() {
        let config = AppConfig {
            gigachat_temperature: 5.0,
            gigachat_top_p: -1.0,
            max_products_display: 0,
            catalog_delimiter: ";;".into(),
            ..valid()
        };
        assert_eq!(config.validate(FrontEnd::Console).len(), 4);
    }

    #[test]
    fn langfuse_requires_both_keys() {
        let mut config = valid();
        config.langfuse_public_key = Some("pk".into());
        assert!(!config.langfuse_enabled());
        assert!(config.langfuse().is_none());
        config.langfuse_secret_key = Some("sk".into());
        assert!(config.langfuse_enabled());
        assert_eq!(config.langfuse().unwrap().host, "https://cloud.langfuse.com");
    }

    #[test]
    fn summary_masks_secrets() {
        let summary = valid().summary();
        let key = summary
            .iter()
            .find(|(k, _)| *k == "GIGACHAT_API_KEY")
            .map(|(_, v)| v.clone())
            .unwrap();
        assert_eq!(key, "***key");
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prodcards.toml");
        fs::write(
            &path,
            "max_products_display = 7\nprompts_dir = \"custom_prompts\"\n",
        )
        .unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.max_products_display, 7);
        assert_eq!(config.prompts_dir, PathBuf::from("custom_prompts"));
        assert_eq!(
            config.template_path(),
            PathBuf::from("custom_prompts/system_prompt.txt")
        );
    }
}
