//! Error types for the engine
//!
//! Only construction can fail. Once a conversation exists every turn yields an
//! utterance; unmatched or rejected answers are dialogue, not errors.

use thiserror::Error;

/// Errors raised while building a protocol from its declarative definition
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The definition is not valid JSON or has the wrong shape
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Two facts share an id
    #[error("Duplicate fact id: {0}")]
    DuplicateFact(String),

    /// A fact declares a kind with no registered constructor
    #[error("Unknown fact kind '{kind}' for fact {fact}")]
    UnknownFactKind {
        /// Fact id
        fact: String,
        /// Declared kind
        kind: String,
    },

    /// A required field is absent
    #[error("Fact {fact} is missing field '{field}'")]
    MissingField {
        /// Fact id
        fact: String,
        /// Field name
        field: &'static str,
    },

    /// A value type name with no registered matcher
    #[error("Unknown value type: {0}")]
    UnknownValueType(String),

    /// A value type parameter that cannot be used
    #[error("Invalid value type parameter: {0}")]
    InvalidValueType(String),

    /// A comparison expression that cannot be evaluated
    #[error("Invalid expression: {0}")]
    InvalidExpression(String),

    /// A composite operator other than AND / OR
    #[error("Unknown operator '{operator}' for fact {fact}")]
    UnknownOperator {
        /// Fact id
        fact: String,
        /// Declared operator
        operator: String,
    },

    /// A composite with nothing to aggregate
    #[error("Composite fact {0} has no dependencies")]
    EmptyComposite(String),

    /// A composite refers to a fact that is not defined
    #[error("Fact {fact} depends on unknown fact {missing}")]
    UnknownDependency {
        /// Referring fact
        fact: String,
        /// Missing id
        missing: String,
    },

    /// The dependency relation is not acyclic
    #[error("Cyclic fact dependency through {0}")]
    Cycle(String),

    /// A terminal id that is not defined
    #[error("Unknown terminal: {0}")]
    UnknownTerminal(String),

    /// A terminal that is an entity fact
    #[error("Terminal {0} is not a composite fact")]
    TerminalNotComposite(String),

    /// A protocol without outcomes
    #[error("Protocol declares no terminals")]
    NoTerminals,
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Failed to serialize TOML
    #[error("Failed to serialize config TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// A setting is out of range
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Errors raised while starting a conversation
#[derive(Error, Debug)]
pub enum EngineError {
    /// Protocol construction failed
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Configuration was rejected
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}
