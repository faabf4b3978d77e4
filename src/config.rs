//! Assistant configuration
//!
//! Loaded from environment variables (a `.env` file is honored by the
//! binaries through `dotenv`).

use std::env;
use std::path::PathBuf;

pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are Goldn MAX, a calm, helpful Jarvis-style assistant.";

const DEFAULT_REMOTE_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_REMOTE_MODEL: &str = "gpt-4o-mini";
const DEFAULT_LOCAL_URL: &str = "http://127.0.0.1:8000/v1";
const DEFAULT_LOCAL_MODEL: &str = "Qwen2-0.5B-Instruct-q4f16_1-MLC";
const DEFAULT_CONTEXT_MESSAGES: usize = 20;
const DEFAULT_DATA_DIR: &str = ".goldn";
const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone)]
pub struct AssistantConfig {
    pub system_prompt: String,
    pub remote_api_key: Option<String>,
    pub remote_url: String,
    pub remote_model: String,
    pub local_enabled: bool,
    pub local_url: String,
    pub local_model: String,
    /// Non-system history messages sent to the local model
    pub context_messages: usize,
    pub data_dir: PathBuf,
    pub database_url: Option<String>,
    pub port: u16,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            remote_api_key: None,
            remote_url: DEFAULT_REMOTE_URL.to_string(),
            remote_model: DEFAULT_REMOTE_MODEL.to_string(),
            local_enabled: true,
            local_url: DEFAULT_LOCAL_URL.to_string(),
            local_model: DEFAULT_LOCAL_MODEL.to_string(),
            context_messages: DEFAULT_CONTEXT_MESSAGES,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            database_url: None,
            port: DEFAULT_PORT,
        }
    }
}

impl AssistantConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from any variable source; unset, blank or unparsable values
    /// keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Self {
            system_prompt: get("GOLDN_SYSTEM_PROMPT").unwrap_or(defaults.system_prompt),
            remote_api_key: get("GOLDN_REMOTE_API_KEY").or_else(|| get("OPENAI_API_KEY")),
            remote_url: get("GOLDN_REMOTE_URL").unwrap_or(defaults.remote_url),
            remote_model: get("GOLDN_REMOTE_MODEL").unwrap_or(defaults.remote_model),
            local_enabled: get("GOLDN_LOCAL_ENABLED")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.local_enabled),
            local_url: get("GOLDN_LOCAL_URL").unwrap_or(defaults.local_url),
            local_model: get("GOLDN_LOCAL_MODEL").unwrap_or(defaults.local_model),
            context_messages: get("GOLDN_CONTEXT_MESSAGES")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.context_messages),
            data_dir: get("GOLDN_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            database_url: get("POSTGRES_URL").or_else(|| get("DATABASE_URL")),
            port: get("PORT")
                .or_else(|| get("API_PORT"))
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.port),
        }
    }

    pub fn remote_key_configured(&self) -> bool {
        self.remote_api_key.is_some()
    }
}

fn parse_flag(value: &str) -> bool {
    !matches!(
        value.trim().to_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> AssistantConfig {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AssistantConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);
        assert_eq!(config.system_prompt, DEFAULT_SYSTEM_PROMPT);
        assert!(!config.remote_key_configured());
        assert!(config.local_enabled);
        assert_eq!(config.port, 8080);
        assert_eq!(config.local_model, "Qwen2-0.5B-Instruct-q4f16_1-MLC");
    }

    #[test]
    fn test_overrides_and_fallbacks() {
        let config = config_from(&[
            ("OPENAI_API_KEY", "sk-fallback"),
            ("GOLDN_LOCAL_ENABLED", "off"),
            ("GOLDN_CONTEXT_MESSAGES", "6"),
            ("API_PORT", "9000"),
            ("DATABASE_URL", "postgres://localhost/goldn"),
        ]);
        assert_eq!(config.remote_api_key.as_deref(), Some("sk-fallback"));
        assert!(!config.local_enabled);
        assert_eq!(config.context_messages, 6);
        assert_eq!(config.port, 9000);
        assert!(config.database_url.is_some());
    }

    #[test]
    fn test_blank_and_invalid_values_keep_defaults() {
        let config = config_from(&[("GOLDN_REMOTE_API_KEY", "   "), ("PORT", "not-a-port")]);
        assert!(!config.remote_key_configured());
        assert_eq!(config.port, 8080);
    }
}
