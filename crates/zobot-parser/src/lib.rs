//! Zobot Parser Layer
//!
//! Implementations of the `BeadParser` trait from `zobot-domain`.
//!
//! # Architecture
//!
//! The real natural-language parser is an external service. This crate
//! provides the pieces the engine and its tests need around that boundary:
//!
//! - [`beads_from_json`]: decodes the service's JSON response into beads
//! - [`JsonBeadParser`]: adapts any "text to JSON" fetcher into a parser
//! - [`MockParser`]: scripted responses for deterministic testing
//! - [`LexiconParser`]: a small word-list tokenizer used as a test double
//!
//! # Examples
//!
//! ```
//! use zobot_domain::{Bead, BeadParser};
//! use zobot_parser::MockParser;
//!
//! let mut parser = MockParser::default();
//! parser.add_response("42", vec![Bead::number(42.0)]);
//! assert_eq!(parser.parse("42").unwrap(), vec![Bead::number(42.0)]);
//! assert!(parser.parse("anything else").unwrap().is_empty());
//! ```

#![warn(missing_docs)]

pub mod json;
pub mod lexicon;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use zobot_domain::{Bead, BeadParser, ParseError};

pub use json::{beads_from_json, JsonBeadParser};
pub use lexicon::LexiconParser;

#[derive(Debug, Clone)]
enum Scripted {
    Beads(Vec<Bead>),
    Error,
}

/// Mock parser for deterministic testing
///
/// Returns pre-configured beads per utterance and never touches the network.
///
/// # Examples
///
/// ```
/// use zobot_domain::{Bead, BeadParser};
/// use zobot_parser::MockParser;
///
/// let mut parser = MockParser::new(vec![Bead::token("hello")]);
/// parser.add_error("boom");
///
/// assert_eq!(parser.parse("hi").unwrap().len(), 1);
/// assert!(parser.parse("boom").is_err());
/// assert_eq!(parser.call_count(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct MockParser {
    default_beads: Vec<Bead>,
    responses: Arc<Mutex<HashMap<String, Scripted>>>,
    call_count: Arc<Mutex<usize>>,
}

impl MockParser {
    /// Create a new MockParser returning the same beads for every utterance
    pub fn new(default_beads: Vec<Bead>) -> Self {
        Self {
            default_beads,
            responses: Arc::new(Mutex::new(HashMap::new())),
            call_count: Arc::new(Mutex::new(0)),
        }
    }

    /// Add specific beads for a given utterance
    pub fn add_response(&mut self, text: impl Into<String>, beads: Vec<Bead>) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.insert(text.into(), Scripted::Beads(beads));
        }
    }

    /// Configure to fail for a specific utterance
    pub fn add_error(&mut self, text: impl Into<String>) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.insert(text.into(), Scripted::Error);
        }
    }

    /// Get the number of times parse was called
    pub fn call_count(&self) -> usize {
        self.call_count.lock().map(|count| *count).unwrap_or(0)
    }

    /// Reset the call count
    pub fn reset_call_count(&self) {
        if let Ok(mut count) = self.call_count.lock() {
            *count = 0;
        }
    }
}

impl Default for MockParser {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl BeadParser for MockParser {
    fn parse(&self, text: &str) -> Result<Vec<Bead>, ParseError> {
        if let Ok(mut count) = self.call_count.lock() {
            *count += 1;
        }

        let responses = self
            .responses
            .lock()
            .map_err(|_| ParseError::new("mock parser state poisoned"))?;

        match responses.get(text) {
            Some(Scripted::Beads(beads)) => Ok(beads.clone()),
            Some(Scripted::Error) => Err(ParseError::new(format!("mock error for '{}'", text))),
            None => Ok(self.default_beads.clone()),
        }
    }
}
