// Configuration loading

pub mod ai;
pub mod settings;

pub use ai::{resolve_ai, AiStatus, KeyLookup, KeySource, ResolvedAiConfig};
pub use settings::{AiSettings, ConfigError, Settings};
