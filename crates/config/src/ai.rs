// AI configuration and secrets
//
// The Gemini API key is looked up in:
// 1. System keychain (with the `keychain` feature)
// 2. SHEETMERGE_GEMINI_KEY, then GEMINI_API_KEY
//
// Keys are NEVER stored in settings.json

use std::env;
use std::time::Duration;

use crate::settings::AiSettings;

/// Service name for keychain storage
#[cfg(feature = "keychain")]
const KEYCHAIN_SERVICE: &str = "sheetmerge";

#[cfg(feature = "keychain")]
const KEYCHAIN_ACCOUNT: &str = "ai/gemini";

/// Environment variables holding the key, in priority order
pub const KEY_ENV_VARS: &[&str] = &["SHEETMERGE_GEMINI_KEY", "GEMINI_API_KEY"];

/// Environment variable naming the primary model
pub const MODEL_ENV_VAR: &str = "GEMINI_MODEL";

/// Source of an API key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Keychain,
    Environment,
    None,
}

impl KeySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeySource::Keychain => "keychain",
            KeySource::Environment => "environment",
            KeySource::None => "none",
        }
    }
}

/// Result of key lookup
#[derive(Debug, Clone)]
pub struct KeyLookup {
    pub key: Option<String>,
    pub source: KeySource,
}

/// Get the Gemini API key from the keychain or the environment.
pub fn gemini_api_key() -> KeyLookup {
    #[cfg(feature = "keychain")]
    {
        if let Ok(entry) = keyring::Entry::new(KEYCHAIN_SERVICE, KEYCHAIN_ACCOUNT) {
            if let Ok(key) = entry.get_password() {
                return KeyLookup {
                    key: Some(key),
                    source: KeySource::Keychain,
                };
            }
        }
    }
    key_from_env(|name| env::var(name).ok())
}

fn key_from_env(lookup: impl Fn(&str) -> Option<String>) -> KeyLookup {
    for &name in KEY_ENV_VARS {
        if let Some(key) = lookup(name).filter(|k| !k.trim().is_empty()) {
            return KeyLookup {
                key: Some(key.trim().to_string()),
                source: KeySource::Environment,
            };
        }
    }
    KeyLookup {
        key: None,
        source: KeySource::None,
    }
}

// ============================================================================
// Resolved AI configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiStatus {
    /// Not requested by settings or flags
    Disabled,
    Ready,
    /// Requested but no key was found
    MissingKey,
}

impl AiStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Ready => "ready",
            Self::MissingKey => "missing_key",
        }
    }
}

/// The effective oracle configuration, resolved from settings, flags and
/// environment.
#[derive(Debug, Clone)]
pub struct ResolvedAiConfig {
    pub status: AiStatus,
    /// Primary model; `None` = built-in default
    pub model: Option<String>,
    pub fallback_models: Vec<String>,
    pub endpoint: Option<String>,
    pub throttle: Duration,
    pub timeout: Duration,
    pub confidence_floor: u8,
    pub api_key: Option<String>,
    pub key_source: KeySource,
}

impl ResolvedAiConfig {
    pub fn is_ready(&self) -> bool {
        self.status == AiStatus::Ready
    }
}

/// Resolve the oracle configuration. `force` turns the oracle on regardless
/// of the settings file (the `--ai` flag).
pub fn resolve_ai(settings: &AiSettings, force: bool) -> ResolvedAiConfig {
    let wanted = force || settings.enabled;
    let lookup = if wanted {
        gemini_api_key()
    } else {
        KeyLookup {
            key: None,
            source: KeySource::None,
        }
    };
    resolve_with(settings, wanted, lookup, |name| env::var(name).ok())
}

fn resolve_with(
    settings: &AiSettings,
    wanted: bool,
    lookup: KeyLookup,
    env_lookup: impl Fn(&str) -> Option<String>,
) -> ResolvedAiConfig {
    let model = Some(settings.model.trim().to_string())
        .filter(|m| !m.is_empty())
        .or_else(|| env_lookup(MODEL_ENV_VAR).map(|m| m.trim().to_string()))
        .filter(|m| !m.is_empty());

    let status = match (wanted, lookup.key.is_some()) {
        (false, _) => AiStatus::Disabled,
        (true, true) => AiStatus::Ready,
        (true, false) => AiStatus::MissingKey,
    };

    ResolvedAiConfig {
        status,
        model,
        fallback_models: settings.fallback_models.clone(),
        endpoint: settings.endpoint.clone(),
        throttle: Duration::from_millis(settings.throttle_ms),
        timeout: Duration::from_secs(settings.timeout_secs),
        confidence_floor: settings.confidence_floor,
        api_key: lookup.key,
        key_source: lookup.source,
    }
}
