// User settings
// Loaded from <config dir>/sheetmerge/settings.json

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use sheetmerge_recon::similarity::{DEFAULT_THRESHOLD, VERIFY_CONFIDENCE_FLOOR};
use sheetmerge_recon::{InputLayout, OutputFormat, RowLayout};

#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        message: String,
    },
    Write {
        path: PathBuf,
        message: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "cannot read {}: {}", path.display(), source)
            }
            ConfigError::Parse { path, message } => {
                write!(f, "invalid settings in {}: {}", path.display(), message)
            }
            ConfigError::Write { path, message } => {
                write!(f, "cannot write {}: {}", path.display(), message)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Semantic oracle settings. The API key is never stored here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiSettings {
    pub enabled: bool,

    /// Primary model; empty = `GEMINI_MODEL` or the built-in default
    pub model: String,

    pub fallback_models: Vec<String>,

    /// API base URL; `None` = the public endpoint
    pub endpoint: Option<String>,

    /// Pause after each remote call
    pub throttle_ms: u64,

    pub timeout_secs: u64,

    /// Verification answers below this confidence are discarded
    pub confidence_floor: u8,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            model: String::new(),
            fallback_models: Vec::new(),
            endpoint: None,
            throttle_ms: 100,
            timeout_secs: 60,
            confidence_floor: VERIFY_CONFIDENCE_FLOOR,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Edit-distance verdict threshold, 0..=100
    pub threshold: u8,

    pub format: OutputFormat,

    pub layout: InputLayout,

    /// Cell positions for positional (personnel order) sheets
    pub row_layout: RowLayout,

    /// Reference data replacing the built-in tables
    pub lookup: Option<PathBuf>,

    pub ai: AiSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            format: OutputFormat::default(),
            layout: InputLayout::default(),
            row_layout: RowLayout::default(),
            lookup: None,
            ai: AiSettings::default(),
        }
    }
}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sheetmerge")
            .join("settings.json")
    }

    /// Load settings from the default location. A missing file means
    /// defaults; a broken one is reported and ignored.
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("{}; using default settings", e);
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        // Strip comments (lines starting with //)
        let cleaned: String = contents
            .lines()
            .filter(|line| !line.trim().starts_with("//"))
            .collect::<Vec<_>>()
            .join("\n");

        let settings: Settings =
            serde_json::from_str(&cleaned).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        settings.validate(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |message: String| ConfigError::Write {
            path: path.to_path_buf(),
            message,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| write_err(e.to_string()))?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| write_err(e.to_string()))?;
        fs::write(path, json).map_err(|e| write_err(e.to_string()))
    }

    fn validate(self, path: &Path) -> Result<Self, ConfigError> {
        let invalid = |message: String| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        };
        if self.threshold > 100 {
            return Err(invalid(format!("threshold {} is above 100", self.threshold)));
        }
        if self.ai.confidence_floor > 100 {
            return Err(invalid(format!(
                "ai.confidence_floor {} is above 100",
                self.ai.confidence_floor
            )));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults() {
        let s = Settings::default();
        assert_eq!(s.threshold, 85);
        assert_eq!(s.format, OutputFormat::Kfta);
        assert_eq!(s.layout, InputLayout::Auto);
        assert!(!s.ai.enabled);
        assert_eq!(s.ai.throttle_ms, 100);
        assert_eq!(s.ai.timeout_secs, 60);
        assert_eq!(s.ai.confidence_floor, 50);
    }

    #[test]
    fn partial_file_with_comments() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{
    // merge tolerance
    "threshold": 70,
    "format": "generic",
    "ai": { "enabled": true, "model": "gemini-2.5-flash" }
}"#,
        )
        .unwrap();

        let s = Settings::load_from(&path).unwrap();
        assert_eq!(s.threshold, 70);
        assert_eq!(s.format, OutputFormat::Generic);
        assert_eq!(s.layout, InputLayout::Auto);
        assert!(s.ai.enabled);
        assert_eq!(s.ai.model, "gemini-2.5-flash");
        assert_eq!(s.ai.throttle_ms, 100);
    }

    #[test]
    fn save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let mut s = Settings::default();
        s.lookup = Some(PathBuf::from("/srv/lookup/gangwon-2027.toml"));
        s.ai.fallback_models = vec!["gemini-2.0-flash".into()];
        s.save_to(&path).unwrap();

        let back = Settings::load_from(&path).unwrap();
        assert_eq!(back.lookup, s.lookup);
        assert_eq!(back.ai, s.ai);
    }

    #[test]
    fn rejects_bad_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");

        fs::write(&path, r#"{ "threshold": 150 }"#).unwrap();
        assert!(matches!(Settings::load_from(&path), Err(ConfigError::Parse { .. })));

        fs::write(&path, r#"{ "format": "pdf" }"#).unwrap();
        assert!(matches!(Settings::load_from(&path), Err(ConfigError::Parse { .. })));

        let missing = dir.path().join("missing.json");
        assert!(matches!(Settings::load_from(&missing), Err(ConfigError::Read { .. })));
    }
}
