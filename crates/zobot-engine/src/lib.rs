//! Zobot Engine
//!
//! Incremental evaluation of a fact-dependency graph driven by a free-text
//! dialogue. A protocol declares entity facts (questions about one real-world
//! entity) and AND / OR composites over them; some composites are terminals
//! whose truth ends the conversation.
//!
//! The engine provides:
//! - Protocol parsing with dependency ordering and cycle detection
//! - Value-type matchers turning parsed beads into typed answers
//! - Comparison expressions turning answers into truths
//! - A live fact graph with three-valued AND / OR, dead-branch pruning and
//!   priority-ordered "what to ask next" scheduling
//! - The turn-by-turn conversation driver
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use zobot_domain::EntityId;
//! use zobot_engine::{ConvoProtocol, EngineConfig};
//! use zobot_parser::LexiconParser;
//!
//! let doc = r#"{
//!     "facts": [
//!         {"id": "cough", "type": "entity",
//!          "entity": {"class": 2, "subclass": 1, "id": "COUGH", "name": "a cough"}},
//!         {"id": "cold", "type": "composite", "operator": "AND",
//!          "text": "Sounds like a cold.", "facts": ["cough"]}
//!     ],
//!     "terminals": ["cold"]
//! }"#;
//!
//! let parser = LexiconParser::new().with_entity("yes", EntityId::new(1, 105, "YES"));
//! let mut convo = ConvoProtocol::from_json(doc, EngineConfig::default(), Arc::new(parser))?;
//!
//! assert_eq!(convo.step(None).utterance, "Do you have a cough?");
//! let done = convo.step(Some("yes"));
//! assert!(done.finished);
//! assert_eq!(done.utterance, "Sounds like a cold.");
//! # Ok::<(), zobot_engine::EngineError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod convo;
pub mod entity_fact;
pub mod error;
pub mod expression;
pub mod graph;
pub mod index;
pub mod node;
pub mod protocol;
pub mod queue;
pub mod value_type;

pub use config::EngineConfig;
pub use convo::{ConvoProtocol, ConvoStep, Outcome};
pub use entity_fact::{EntityFactNode, StepResponse};
pub use error::{ConfigError, EngineError, ProtocolError};
pub use expression::{CompareOp, Expression};
pub use graph::{FactGraph, FactIdx, FactSnapshot};
pub use node::Truth;
pub use protocol::{Operator, Protocol};
pub use value_type::{BeadMatch, ValueMatcher, ValueType};
