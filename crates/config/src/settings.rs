//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::{dialogue, errors, learning};
use crate::ConfigError;

/// Runtime environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    /// Development mode - relaxed validation, warnings only
    #[default]
    Development,
    /// Staging mode - stricter validation
    Staging,
    /// Production mode - all validations enforced
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    /// Check if strict validation should be applied
    pub fn is_strict(&self) -> bool {
        matches!(self, Self::Production | Self::Staging)
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    #[serde(default)]
    pub server: ServerConfig,

    /// Session lifecycle and turn policy
    #[serde(default)]
    pub dialogue: DialogueConfig,

    /// Auto-learning report thresholds
    #[serde(default)]
    pub learning: LearningConfig,

    /// Error-learning retention
    #[serde(default)]
    pub errors: ErrorLearningConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Path to the store catalog (YAML)
    #[serde(default = "default_catalog_path")]
    pub catalog_path: String,

    /// Path to the response templates (YAML)
    #[serde(default = "default_templates_path")]
    pub templates_path: String,
}

fn default_catalog_path() -> String {
    "config/catalog.yaml".to_string()
}

fn default_templates_path() -> String {
    "config/templates.yaml".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            environment: RuntimeEnvironment::default(),
            server: ServerConfig::default(),
            dialogue: DialogueConfig::default(),
            learning: LearningConfig::default(),
            errors: ErrorLearningConfig::default(),
            observability: ObservabilityConfig::default(),
            catalog_path: default_catalog_path(),
            templates_path: default_templates_path(),
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_dialogue()?;
        self.validate_learning()?;
        self.validate_errors()?;
        self.validate_data_paths()?;
        Ok(())
    }

    fn validate_server(&self) -> Result<(), ConfigError> {
        let server = &self.server;

        if server.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.port".to_string(),
                message: "Port cannot be 0".to_string(),
            });
        }

        if server.timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.timeout_seconds".to_string(),
                message: "Timeout must be at least 1 second".to_string(),
            });
        }

        if self.environment.is_production() && server.cors_enabled && server.cors_origins.is_empty()
        {
            tracing::warn!(
                "CORS is enabled in production but no origins are configured. \
                 This may block legitimate requests."
            );
        }

        Ok(())
    }

    fn validate_dialogue(&self) -> Result<(), ConfigError> {
        let d = &self.dialogue;

        if d.idle_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "dialogue.idle_timeout_secs".to_string(),
                message: "Idle timeout must be at least 1 second".to_string(),
            });
        }

        if d.sweep_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "dialogue.sweep_interval_secs".to_string(),
                message: "Sweep interval must be at least 1 second".to_string(),
            });
        }

        if d.sweep_interval_secs > d.idle_timeout_secs {
            tracing::warn!(
                "dialogue.sweep_interval_secs ({}) exceeds idle_timeout_secs ({}), \
                 idle calls may linger up to one extra interval",
                d.sweep_interval_secs,
                d.idle_timeout_secs
            );
        }

        if d.silence_escalation_threshold == 0 {
            return Err(ConfigError::InvalidValue {
                field: "dialogue.silence_escalation_threshold".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        if d.max_turns == 0 {
            return Err(ConfigError::InvalidValue {
                field: "dialogue.max_turns".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    fn validate_learning(&self) -> Result<(), ConfigError> {
        if self.learning.min_keyword_frequency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "learning.min_keyword_frequency".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }
        if self.learning.min_intent_frequency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "learning.min_intent_frequency".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    fn validate_errors(&self) -> Result<(), ConfigError> {
        if self.errors.retention_days == 0 {
            return Err(ConfigError::InvalidValue {
                field: "errors.retention_days".to_string(),
                message: "Retention must be at least 1 day".to_string(),
            });
        }
        if self.errors.cleanup_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "errors.cleanup_interval_secs".to_string(),
                message: "Cleanup interval must be at least 1 second".to_string(),
            });
        }
        Ok(())
    }

    /// Missing data files fall back to compiled-in defaults outside strict mode
    fn validate_data_paths(&self) -> Result<(), ConfigError> {
        let paths = [
            ("catalog_path", &self.catalog_path),
            ("templates_path", &self.templates_path),
        ];

        let mut missing = Vec::new();
        for (field, path) in paths {
            if !std::path::Path::new(path).is_file() {
                if self.environment.is_strict() {
                    missing.push(format!("{}: file not found: {}", field, path));
                } else {
                    tracing::warn!("{} not found ({}), using built-in defaults", field, path);
                }
            }
        }

        if !missing.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "data files".to_string(),
                message: missing.join("; "),
            });
        }

        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_timeout() -> u64 {
    10
}
fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timeout_seconds: default_timeout(),
            cors_enabled: default_true(),
            cors_origins: Vec::new(),
        }
    }
}

/// Session lifecycle and turn policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueConfig {
    /// Idle time before a call context is evicted
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Interval between eviction sweeps
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Silence-timeout events before the call is closed
    #[serde(default = "default_silence_threshold")]
    pub silence_escalation_threshold: u32,

    /// Turns allowed per call before it is wrapped up
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
}

fn default_idle_timeout() -> u64 {
    dialogue::IDLE_TIMEOUT_SECS
}
fn default_sweep_interval() -> u64 {
    dialogue::SWEEP_INTERVAL_SECS
}
fn default_silence_threshold() -> u32 {
    dialogue::SILENCE_ESCALATION_THRESHOLD
}
fn default_max_turns() -> u32 {
    dialogue::MAX_TURNS
}

impl DialogueConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout(),
            sweep_interval_secs: default_sweep_interval(),
            silence_escalation_threshold: default_silence_threshold(),
            max_turns: default_max_turns(),
        }
    }
}

/// Thresholds for surfacing learning suggestions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningConfig {
    #[serde(default = "default_min_keyword_frequency")]
    pub min_keyword_frequency: u32,

    #[serde(default = "default_min_intent_frequency")]
    pub min_intent_frequency: u32,
}

fn default_min_keyword_frequency() -> u32 {
    learning::DEFAULT_MIN_KEYWORD_FREQUENCY
}
fn default_min_intent_frequency() -> u32 {
    learning::DEFAULT_MIN_INTENT_FREQUENCY
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            min_keyword_frequency: default_min_keyword_frequency(),
            min_intent_frequency: default_min_intent_frequency(),
        }
    }
}

/// Error record retention
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorLearningConfig {
    /// Records older than this are purged by cleanup
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// How often the maintenance task runs cleanup
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,
}

fn default_retention_days() -> u32 {
    errors::DEFAULT_RETENTION_DAYS
}
fn default_cleanup_interval() -> u64 {
    3600
}

impl ErrorLearningConfig {
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

impl Default for ErrorLearningConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
            cleanup_interval_secs: default_cleanup_interval(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit JSON log lines
    #[serde(default)]
    pub log_json: bool,

    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            metrics_enabled: true,
        }
    }
}

/// Load settings from files and environment
///
/// Priority (highest to lowest):
/// 1. Environment variables (MALL_VOICE_ prefix)
/// 2. config/{env}.yaml (if env specified)
/// 3. config/default.yaml
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name("config/default").required(false));

    if let Some(env_name) = env {
        builder =
            builder.add_source(File::with_name(&format!("config/{}", env_name)).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("MALL_VOICE")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}
