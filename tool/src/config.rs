use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use sc_link::{Feature, FeatureFlags, HighSkipGates};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Default config file, read from the working directory when present.
pub const DEFAULT_CONFIG_FILE: &str = "sc-link.yaml";

/// Tool configuration loaded from multiple sources.
///
/// Configuration is loaded in priority order (lowest to highest):
/// 1. Struct defaults
/// 2. sc-link.yaml, or the file given with `--config` (if exists)
/// 3. Environment variables with SC_ prefix (always wins)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub features: FeatureConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. `info` or `sc_link=debug`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// High-skip rollout gates, globally and per subject.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct FeatureConfig {
    /// Embed skip pointers in new links.
    #[serde(default)]
    pub allow_high_skips: bool,

    /// Refuse to write a link (past seqno 2) without a skip pointer. Only
    /// valid together with `allow_high_skips`.
    #[serde(default)]
    pub require_high_skips: bool,

    /// Per-subject exceptions. Unset fields fall back to the global value.
    #[serde(default)]
    pub overrides: Vec<FeatureOverride>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct FeatureOverride {
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_high_skips: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_high_skips: Option<bool>,
}

impl FeatureConfig {
    /// Effective gates for `subject` after applying its override.
    #[must_use]
    pub fn gates_for(&self, subject: &str) -> HighSkipGates {
        let mut gates = HighSkipGates {
            allow: self.allow_high_skips,
            require: self.require_high_skips,
        };
        if let Some(entry) = self.overrides.iter().find(|entry| entry.subject == subject) {
            gates.allow = entry.allow_high_skips.unwrap_or(gates.allow);
            gates.require = entry.require_high_skips.unwrap_or(gates.require);
        }
        gates
    }
}

impl FeatureFlags for FeatureConfig {
    fn is_enabled(&self, feature: Feature, subject: &str) -> bool {
        let gates = self.gates_for(subject);
        match feature {
            Feature::AllowHighSkips => gates.allow,
            Feature::RequireHighSkips => gates.require,
        }
    }
}

/// Configuration loading and validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Figment(#[from] Box<figment::Error>),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Sources are merged in priority order:
    /// 1. Struct defaults (lowest)
    /// 2. sc-link.yaml (if exists)
    /// 3. Environment variables with SC_ prefix (highest)
    ///
    /// # Errors
    /// Returns an error if configuration cannot be loaded or is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new(DEFAULT_CONFIG_FILE))
    }

    /// Load configuration with a custom YAML file path.
    ///
    /// # Errors
    /// Returns an error if configuration cannot be loaded or is invalid.
    pub fn load_from(yaml_path: &Path) -> Result<Self, ConfigError> {
        let config: Self = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Yaml::file(yaml_path))
            .merge(Env::prefixed("SC_").split("__"))
            .extract()?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::Validation("logging.level cannot be empty".into()));
        }
        if let Err(err) = EnvFilter::try_new(&self.logging.level) {
            return Err(ConfigError::Validation(format!(
                "logging.level '{}' is not a valid filter: {err}",
                self.logging.level
            )));
        }

        let features = &self.features;
        if features.require_high_skips && !features.allow_high_skips {
            return Err(ConfigError::Validation(
                "features.require_high_skips needs features.allow_high_skips. Set SC_FEATURES__ALLOW_HIGH_SKIPS=true or turn require off.".into(),
            ));
        }

        let mut seen = HashSet::new();
        for entry in &features.overrides {
            if entry.subject.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "features.overrides contains an entry with an empty subject".into(),
                ));
            }
            if !seen.insert(entry.subject.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "features.overrides lists subject '{}' more than once",
                    entry.subject
                )));
            }
            let gates = features.gates_for(&entry.subject);
            if gates.require && !gates.allow {
                return Err(ConfigError::Validation(format!(
                    "features.overrides for '{}' requires high skips without allowing them",
                    entry.subject
                )));
            }
        }

        Ok(())
    }
}
