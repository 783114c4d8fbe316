use std::path::PathBuf;
use std::time::Duration;

fn env_nonempty(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

/// Configuration for the completion provider
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    /// API credential; its absence is the only configuration failure the
    /// gateway detects explicitly.
    pub api_key: Option<String>,
    /// OpenAI-compatible endpoint base URL
    pub base_url: String,
    /// Optional preferred model, tried before the free-tier defaults
    pub preferred_model: Option<String>,
    /// Client-side bound on each model attempt
    pub timeout: Duration,
    /// Default max output tokens per completion
    pub max_tokens: u32,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://openrouter.ai/api/v1".to_string(),
            preferred_model: None,
            timeout: Duration::from_secs(30),
            max_tokens: 300,
        }
    }
}

impl CompletionConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: env_nonempty("OPENROUTER_API_KEY"),
            base_url: env_nonempty("OPENROUTER_BASE_URL").unwrap_or(defaults.base_url),
            preferred_model: env_nonempty("OPENROUTER_MODEL"),
            timeout: env_nonempty("LLM_TIMEOUT")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            max_tokens: env_nonempty("LLM_MAX_TOKENS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_tokens),
        }
    }
}

/// Server-level configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Optional path to a JSON game catalog overriding the built-in one
    pub games_file: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8086,
            games_file: None,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: env_nonempty("ELINITY_PORT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            games_file: env_nonempty("ELINITY_GAMES_FILE").map(PathBuf::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_defaults() {
        let config = CompletionConfig::default();
        assert!(config.api_key.is_none());
        assert_eq!(config.base_url, "https://openrouter.ai/api/v1");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_tokens, 300);
    }

    #[test]
    #[serial]
    fn test_from_env_trims_and_ignores_empty() {
        std::env::set_var("OPENROUTER_API_KEY", "  sk-test  ");
        std::env::set_var("OPENROUTER_MODEL", "   ");
        std::env::set_var("LLM_TIMEOUT", "5");

        let config = CompletionConfig::from_env();
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert!(config.preferred_model.is_none());
        assert_eq!(config.timeout, Duration::from_secs(5));

        std::env::remove_var("OPENROUTER_API_KEY");
        std::env::remove_var("OPENROUTER_MODEL");
        std::env::remove_var("LLM_TIMEOUT");
    }
}
