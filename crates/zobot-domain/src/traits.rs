//! Trait definitions for external interactions
//!
//! The engine never parses text itself; it is handed a parser at construction
//! time. Implementations live in other crates (zobot-parser) or outside the
//! workspace.

use crate::bead::Bead;
use std::fmt;
use std::sync::Arc;

/// Failure reported by a bead parser
///
/// The engine treats any parse failure as "zero beads", so this only carries a
/// message for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// Description of the failure
    pub message: String,
}

impl ParseError {
    /// Create a new parse error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parse failed: {}", self.message)
    }
}

impl std::error::Error for ParseError {}

/// Trait for turning one utterance into beads
///
/// The returned sequence is ordered as the words appeared and is fully
/// materialized before matching starts.
pub trait BeadParser {
    /// Parse a single utterance
    fn parse(&self, text: &str) -> Result<Vec<Bead>, ParseError>;
}

/// Parser handle injected into a conversation and shared by its entity facts
pub type SharedParser = Arc<dyn BeadParser + Send + Sync>;

impl<P: BeadParser + ?Sized> BeadParser for Arc<P> {
    fn parse(&self, text: &str) -> Result<Vec<Bead>, ParseError> {
        (**self).parse(text)
    }
}
