// Environment-driven settings. Each concern is read separately so a command
// only fails on the variables it actually needs (`login` never needs an AI
// key, `generate` never needs Google credentials).

use std::path::PathBuf;
use thiserror::Error;

use crate::core::ai::AiConfig;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Missing {0} environment variable")]
    Missing(&'static str),

    #[error("Invalid value '{value}' for {name}")]
    Invalid { name: &'static str, value: String },
}

/// Reads one variable. Blank values count as unset.
fn read(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    read(lookup, name)
        .map(|value| {
            value
                .parse()
                .map_err(|_| ConfigError::Invalid { name, value })
        })
        .transpose()
}

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

// ============================================================================
// COMPLETION MODEL
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiProviderKind {
    Gemini,
    OpenRouter,
}

#[derive(Debug, Clone)]
pub struct AiSettings {
    pub provider: AiProviderKind,
    pub api_key: String,
    pub config: AiConfig,
}

impl AiSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let provider = match read(&lookup, "QUIZ_AI_PROVIDER").as_deref() {
            None => AiProviderKind::Gemini,
            Some(p) if p.eq_ignore_ascii_case("gemini") => AiProviderKind::Gemini,
            Some(p) if p.eq_ignore_ascii_case("openrouter") => AiProviderKind::OpenRouter,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "QUIZ_AI_PROVIDER",
                    value: other.to_string(),
                })
            }
        };

        let defaults = AiConfig::default();
        let (api_key, model) = match provider {
            AiProviderKind::Gemini => (
                read(&lookup, "GEMINI_API_KEY")
                    .or_else(|| read(&lookup, "GOOGLE_API_KEY"))
                    .ok_or(ConfigError::Missing("GEMINI_API_KEY"))?,
                read(&lookup, "GEMINI_MODEL").unwrap_or(defaults.model),
            ),
            AiProviderKind::OpenRouter => (
                read(&lookup, "OPENROUTER_API_KEY").ok_or(ConfigError::Missing("OPENROUTER_API_KEY"))?,
                read(&lookup, "OPENROUTER_MODEL").ok_or(ConfigError::Missing("OPENROUTER_MODEL"))?,
            ),
        };

        let config = AiConfig {
            model,
            temperature: parse(&lookup, "QUIZ_TEMPERATURE")?.unwrap_or(defaults.temperature),
            max_tokens: parse(&lookup, "QUIZ_MAX_OUTPUT_TOKENS")?,
            top_p: defaults.top_p,
        };

        Ok(Self {
            provider,
            api_key,
            config,
        })
    }
}

// ============================================================================
// GOOGLE CREDENTIALS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceAccountKey {
    File(PathBuf),
    Json(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GoogleAuthSettings {
    /// Interactive consent, credential cached in `token_file`.
    InstalledApp {
        client_secret_file: PathBuf,
        token_file: PathBuf,
        port: u16,
    },
    ServiceAccount {
        key: ServiceAccountKey,
        delegated_user: Option<String>,
    },
}

impl GoogleAuthSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    /// A configured service account key wins over the installed-app flow.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let key = read(&lookup, "GOOGLE_SERVICE_ACCOUNT_KEY")
            .map(|path| ServiceAccountKey::File(PathBuf::from(path)))
            .or_else(|| read(&lookup, "GOOGLE_SERVICE_ACCOUNT_JSON").map(ServiceAccountKey::Json));

        if let Some(key) = key {
            return Ok(GoogleAuthSettings::ServiceAccount {
                key,
                delegated_user: read(&lookup, "GOOGLE_DELEGATED_USER"),
            });
        }

        Ok(GoogleAuthSettings::InstalledApp {
            client_secret_file: read(&lookup, "GOOGLE_CLIENT_SECRET_FILE")
                .unwrap_or_else(|| "client_secret.json".to_string())
                .into(),
            token_file: read(&lookup, "GOOGLE_TOKEN_FILE")
                .unwrap_or_else(|| "data/token.json".to_string())
                .into(),
            port: parse(&lookup, "GOOGLE_OAUTH_PORT")?.unwrap_or(8080),
        })
    }
}

// ============================================================================
// OCR
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrSettings {
    pub enabled: bool,
    pub command: String,
    pub language: String,
}

impl OcrSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            enabled: parse(&lookup, "QUIZ_OCR_ENABLED")?.unwrap_or(true),
            command: read(&lookup, "TESSERACT_CMD").unwrap_or_else(|| "tesseract".to_string()),
            language: read(&lookup, "QUIZ_OCR_LANG").unwrap_or_else(|| "eng".to_string()),
        })
    }
}
