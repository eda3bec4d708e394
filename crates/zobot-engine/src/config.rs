//! Configuration for the engine

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use zobot_domain::EntityId;

/// Engine settings shared read-only by every conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// A matched value only counts once its confidence exceeds this; must stay
    /// below 1.0, the confidence of a match
    pub confidence_threshold: f64,

    /// Confidence of an entity fact before anything matched
    pub default_confidence: f64,

    /// Prepended to a question asked again after an unusable answer
    pub apology_prefix: String,

    /// Reply of a fact that has already been resolved
    pub resolved_text: String,

    /// Final reply when every outcome has been ruled out
    pub no_outcome_text: String,

    /// Entity the parser emits for "yes"
    pub yes_entity: EntityId,

    /// Entity the parser emits for "no"
    pub no_entity: EntityId,

    /// Question prefix for yes/no facts without their own question
    pub yes_no_prefix: String,

    /// Question prefix for valued facts without their own question
    pub value_prefix: String,
}

impl EngineConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..1.0).contains(&self.confidence_threshold) {
            return Err(ConfigError::Invalid(format!(
                "confidence_threshold {} out of range [0.0, 1.0)",
                self.confidence_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.default_confidence) {
            return Err(ConfigError::Invalid(format!(
                "default_confidence {} out of range [0.0, 1.0]",
                self.default_confidence
            )));
        }
        if self.default_confidence > self.confidence_threshold {
            return Err(ConfigError::Invalid(
                "default_confidence cannot exceed confidence_threshold".to_string(),
            ));
        }
        if self.yes_entity.id.is_empty() || self.no_entity.id.is_empty() {
            return Err(ConfigError::Invalid("yes/no entity ids must be set".to_string()));
        }
        if self.yes_entity == self.no_entity {
            return Err(ConfigError::Invalid(
                "yes_entity and no_entity must differ".to_string(),
            ));
        }
        Ok(())
    }

    /// Strict preset: a value must be matched with full confidence
    pub fn strict() -> Self {
        Self {
            confidence_threshold: 0.99,
            ..Self::default()
        }
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            default_confidence: 0.5,
            apology_prefix: "Sorry I didn't get that. ".to_string(),
            resolved_text: "Thank you!".to_string(),
            no_outcome_text: "I could not match your answers to any known condition.".to_string(),
            yes_entity: EntityId::new(1, 105, "YES"),
            no_entity: EntityId::new(1, 105, "NO"),
            yes_no_prefix: "Do you have".to_string(),
            value_prefix: "What is your".to_string(),
        }
    }
}
