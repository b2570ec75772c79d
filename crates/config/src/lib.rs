//! Configuration management for the mall voice assistant
//!
//! Supports loading configuration from:
//! - YAML/TOML files (`config/default`, `config/{env}`)
//! - Environment variables (MALL_VOICE_ prefix, `__` separator)
//!
//! # Domain Data
//!
//! Besides runtime settings, this crate loads the two read-only data sets the
//! dialogue engine consumes:
//! - the store catalog (`catalog.yaml`)
//! - the response paraphrase templates (`templates.yaml`)
//!
//! Both fall back to compiled-in defaults when their file is absent.

pub mod catalog;
pub mod constants;
pub mod settings;
pub mod templates;

pub use catalog::{MallInfo, StoreCatalog};
pub use settings::{
    load_settings, DialogueConfig, ErrorLearningConfig, LearningConfig, ObservabilityConfig,
    RuntimeEnvironment, ServerConfig, Settings,
};
pub use templates::{template_keys, ResponseTemplates};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
