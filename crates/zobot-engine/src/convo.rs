//! Conversation driver
//!
//! [`ConvoProtocol`] owns one live fact graph and turns raw user text into the
//! next bot utterance. A turn activates the question being answered, parses the
//! input once, lets every open entity fact look at the beads, propagates the
//! changes and then either announces an outcome or asks the next question.

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::graph::{FactGraph, FactIdx, FactSnapshot};
use crate::node::Truth;
use crate::protocol::Protocol;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use zobot_domain::{Bead, BeadParser, SharedParser};

/// Reply to one turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConvoStep {
    /// True once the conversation has ended
    pub finished: bool,
    /// Bot utterance
    pub utterance: String,
}

/// How a finished conversation ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "fact", rename_all = "snake_case")]
pub enum Outcome {
    /// A terminal holds; carries its id
    Terminal(String),
    /// Every terminal was ruled out
    NoOutcome,
}

/// One conversation over a shared protocol
pub struct ConvoProtocol {
    protocol: Arc<Protocol>,
    config: Arc<EngineConfig>,
    parser: SharedParser,
    graph: FactGraph,
    turns: usize,
    ending: Option<(Outcome, ConvoStep)>,
}

impl ConvoProtocol {
    /// Start a conversation
    pub fn new(
        protocol: Arc<Protocol>,
        config: Arc<EngineConfig>,
        parser: SharedParser,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let graph = FactGraph::new(&protocol, &config, &parser);
        Ok(Self {
            protocol,
            config,
            parser,
            graph,
            turns: 0,
            ending: None,
        })
    }

    /// Parse a protocol document and start a conversation over it
    pub fn from_json(
        json: &str,
        config: EngineConfig,
        parser: SharedParser,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let protocol = Protocol::from_json(json, &config)?;
        Self::new(Arc::new(protocol), Arc::new(config), parser)
    }

    /// Run one turn
    ///
    /// `None` or blank input asks the current question without analyzing
    /// anything. After the conversation has finished every call repeats the
    /// final utterance.
    pub fn step(&mut self, input: Option<&str>) -> ConvoStep {
        if let Some((_, last)) = &self.ending {
            return last.clone();
        }
        self.turns += 1;

        if let Some(leaf) = self.graph.current_leaf() {
            self.graph.activate(leaf);
        }

        let beads = input
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(|text| self.parse(text));
        if let Some(beads) = &beads {
            debug!("Turn {}: {} beads", self.turns, beads.len());
            let resolved = self.graph.analyze_all(beads);
            self.graph.propagate(resolved);
        }

        if let Some(done) = self.check_outcome() {
            return done;
        }
        match self.graph.current_leaf() {
            Some(leaf) => {
                let response = self.graph.respond(leaf, beads.as_deref());
                ConvoStep {
                    finished: false,
                    utterance: response.text.unwrap_or_default(),
                }
            }
            None => {
                let text = self.config.no_outcome_text.clone();
                self.finish(Outcome::NoOutcome, text)
            }
        }
    }

    fn parse(&self, text: &str) -> Vec<Bead> {
        match self.parser.parse(text) {
            Ok(beads) => beads,
            Err(e) => {
                warn!("Parser failed, treating input as unmatched: {}", e);
                Vec::new()
            }
        }
    }

    /// The first terminal that holds wins; all terminals false ends without one
    fn check_outcome(&mut self) -> Option<ConvoStep> {
        let terminals = self.graph.terminals();
        let winner = terminals
            .iter()
            .copied()
            .find(|&t| self.graph.truth(t) == Truth::True);

        if let Some(winner) = winner {
            let (id, text) = self.terminal_text(winner);
            info!("Conversation finished after {} turns: {}", self.turns, id);
            return Some(self.finish(Outcome::Terminal(id), text));
        }

        if terminals.iter().all(|&t| self.graph.truth(t) == Truth::False) {
            info!("Conversation finished after {} turns without an outcome", self.turns);
            let text = self.config.no_outcome_text.clone();
            return Some(self.finish(Outcome::NoOutcome, text));
        }
        None
    }

    fn terminal_text(&self, idx: FactIdx) -> (String, String) {
        match self.graph.fact(idx) {
            Some(fact) => {
                let text = fact
                    .as_composite()
                    .map(|c| c.text().to_string())
                    .unwrap_or_else(|| fact.id().to_string());
                (fact.id().to_string(), text)
            }
            None => (idx.to_string(), String::new()),
        }
    }

    fn finish(&mut self, outcome: Outcome, utterance: String) -> ConvoStep {
        let step = ConvoStep {
            finished: true,
            utterance,
        };
        self.ending = Some((outcome, step.clone()));
        step
    }

    /// True once an outcome has been announced
    pub fn is_finished(&self) -> bool {
        self.ending.is_some()
    }

    /// How the conversation ended, if it has
    pub fn outcome(&self) -> Option<&Outcome> {
        self.ending.as_ref().map(|(outcome, _)| outcome)
    }

    /// Turns taken so far, not counting calls after finishing
    pub fn turns(&self) -> usize {
        self.turns
    }

    /// Serializable state of every fact
    pub fn snapshot(&self) -> Vec<FactSnapshot> {
        self.graph.snapshot()
    }

    /// Live graph
    pub fn graph(&self) -> &FactGraph {
        &self.graph
    }

    /// Shared protocol
    pub fn protocol(&self) -> &Arc<Protocol> {
        &self.protocol
    }

    /// Configuration in use
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
