//! Entity fact node
//!
//! A leaf of the fact graph bound to one entity. It owns the question for its
//! entity, interprets answers with its value matcher and turns the matched
//! value into a truth through its optional expression.
//!
//! Lifecycle: unasked, activated once its question is the current one, then
//! resolved. Deactivation returns to unasked but keeps the asked history, so a
//! repeated question gets the apology prefix.

use crate::config::EngineConfig;
use crate::expression::Expression;
use crate::node::{Truth, ValueSlot};
use crate::protocol::EntityFact;
use crate::value_type::{BeadMatch, ValueMatcher, ValueType};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};
use zobot_domain::{Bead, BeadParser, Entity, EntityId, FactValue, SharedParser};

/// Result of stepping a fact
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepResponse {
    /// Utterance for the user; `None` when the fact had nothing to ask
    pub text: Option<String>,
    /// Beads the step worked on
    pub beads: Vec<Bead>,
    /// False when the fact was already resolved and did nothing
    pub step_occurred: bool,
}

impl StepResponse {
    pub(crate) fn idle(beads: Vec<Bead>) -> Self {
        Self {
            text: None,
            beads,
            step_occurred: false,
        }
    }
}

/// Live entity fact
#[derive(Clone)]
pub struct EntityFactNode {
    id: String,
    entity: Entity,
    matcher: ValueType,
    active_matcher: Option<ValueType>,
    expression: Option<Expression>,
    question: String,
    activated: bool,
    asked: bool,
    value: ValueSlot<FactValue>,
    truth: ValueSlot<bool>,
    confidence: f64,
    special_response: Option<String>,
    config: Arc<EngineConfig>,
    parser: SharedParser,
}

impl fmt::Debug for EntityFactNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityFactNode")
            .field("id", &self.id)
            .field("entity", &self.entity.id)
            .field("matcher", &self.matcher.name())
            .field("activated", &self.activated)
            .field("asked", &self.asked)
            .field("value", &self.value.get())
            .field("truth", &self.truth())
            .field("confidence", &self.confidence)
            .finish_non_exhaustive()
    }
}

impl EntityFactNode {
    /// Create a live node for a fact descriptor
    pub fn new(
        id: impl Into<String>,
        question: Option<&str>,
        fact: &EntityFact,
        config: Arc<EngineConfig>,
        parser: SharedParser,
    ) -> Self {
        let question = match question {
            Some(q) => q.to_string(),
            None => {
                let prefix = fact
                    .q_prefix
                    .as_deref()
                    .unwrap_or_else(|| fact.value_type.question_prefix(&config));
                format!("{} {}?", prefix, fact.entity.display_name())
            }
        };

        Self {
            id: id.into(),
            entity: fact.entity.clone(),
            matcher: fact.value_type.clone(),
            active_matcher: None,
            expression: fact.expression.clone(),
            question,
            activated: false,
            asked: false,
            value: ValueSlot::new(),
            truth: ValueSlot::new(),
            confidence: config.default_confidence,
            special_response: None,
            config,
            parser,
        }
    }

    /// Fact id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Bound entity identity
    pub fn entity_id(&self) -> &EntityId {
        &self.entity.id
    }

    /// Own matcher, ignoring any override
    pub fn matcher(&self) -> &ValueType {
        &self.matcher
    }

    /// Question text
    pub fn question(&self) -> &str {
        &self.question
    }

    /// Current truth
    pub fn truth(&self) -> Truth {
        self.truth.truth()
    }

    /// True once the truth is established
    pub fn is_resolved(&self) -> bool {
        self.truth.is_set()
    }

    /// Matched value, if any
    pub fn value(&self) -> Option<&FactValue> {
        self.value.get()
    }

    /// Confidence in [0, 1]
    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// True while the fact may consume answers with its matcher
    pub fn is_activated(&self) -> bool {
        self.activated
    }

    /// True once the question has been put to the user
    pub fn was_asked(&self) -> bool {
        self.asked
    }

    /// Pending rejection message
    pub fn special_response(&self) -> Option<&str> {
        self.special_response.as_deref()
    }

    /// Mark the question as current, optionally interpreting answers with
    /// another fact's matcher
    pub fn activate(&mut self, matcher: Option<ValueType>) {
        self.activated = true;
        self.active_matcher = matcher;
    }

    /// Return to unasked, keeping the asked history
    pub fn deactivate(&mut self) {
        self.activated = false;
        self.active_matcher = None;
    }

    fn current_matcher(&self) -> &ValueType {
        self.active_matcher.as_ref().unwrap_or(&self.matcher)
    }

    /// Try to establish a value from one utterance
    ///
    /// Returns `true` if the fact resolved.
    pub fn analyze_beads(&mut self, beads: &[Bead]) -> bool {
        if self.is_resolved() {
            return false;
        }
        self.special_response = None;

        let matcher = self.current_matcher().clone();
        let whole = matcher.match_all(beads);
        let mut rejected = Vec::new();

        if self.activated {
            match whole.outcome {
                BeadMatch::Accepted(value) => return self.establish(value),
                BeadMatch::Rejected(value) => rejected.push(value),
                BeadMatch::Ignored => {}
            }

            if whole.single_bead_eligible {
                for bead in beads {
                    match matcher.match_one(bead) {
                        BeadMatch::Accepted(value) => return self.establish(value),
                        BeadMatch::Rejected(value) => rejected.push(value),
                        BeadMatch::Ignored => {}
                    }
                }
            }
        }

        if whole.single_bead_eligible {
            let own = self.entity.id.clone();
            for bead in beads.iter().filter(|b| b.mentions(&own)) {
                if self.expression.is_none() {
                    return self.establish(FactValue::Entity(own.clone()));
                }
                match matcher.match_one(bead) {
                    BeadMatch::Accepted(value) => return self.establish(value),
                    BeadMatch::Rejected(value) => rejected.push(value),
                    BeadMatch::Ignored => {}
                }
            }
        }

        if self.activated && !rejected.is_empty() {
            self.special_response = Some(self.rejection_message(&rejected));
        }
        false
    }

    fn rejection_message(&self, rejected: &[FactValue]) -> String {
        match rejected {
            [single] => format!("Sorry, {} is not valid. {}", single, self.question),
            many => {
                let values: Vec<String> = many.iter().map(|v| v.to_string()).collect();
                format!(
                    "None of these values seem valid {}. {}",
                    values.join(","),
                    self.question
                )
            }
        }
    }

    fn establish(&mut self, value: FactValue) -> bool {
        debug!("Fact {} matched value {}", self.id, value);
        if value.is_collection() {
            self.value.set_array(value);
        } else {
            self.value.set(value);
        }
        self.confidence = 1.0;
        self.special_response = None;
        self.deactivate();
        self.resolve_from_value()
    }

    /// Compute the truth once the value is trusted enough
    fn resolve_from_value(&mut self) -> bool {
        if self.is_resolved() || self.confidence <= self.config.confidence_threshold {
            return false;
        }
        let Some(value) = self.value.get() else {
            return false;
        };

        let holds = match &self.expression {
            Some(expr) => expr.evaluate(value),
            None => value.as_bool().unwrap_or(true),
        };
        debug!("Fact {} resolved {}", self.id, holds);
        self.truth.set(holds)
    }

    /// Produce this turn's utterance
    ///
    /// `beads` is the utterance the user just gave, if any; it has already been
    /// analyzed. A pending rejection message is shown once.
    pub fn respond(&mut self, beads: Option<&[Bead]>) -> StepResponse {
        let seen = beads.map(<[Bead]>::to_vec).unwrap_or_default();
        if self.is_resolved() {
            return StepResponse::idle(seen);
        }

        let text = match self.special_response.take() {
            Some(special) => special,
            None if beads.is_some() && self.asked => {
                format!("{}{}", self.config.apology_prefix, self.question)
            }
            None => self.question.clone(),
        };
        self.asked = true;

        StepResponse {
            text: Some(text),
            beads: seen,
            step_occurred: true,
        }
    }

    /// Standalone step: parse the input, analyze it and respond
    pub fn step(&mut self, input: Option<&str>) -> StepResponse {
        if self.is_resolved() {
            return StepResponse::idle(Vec::new());
        }

        let beads = match input.map(str::trim).filter(|text| !text.is_empty()) {
            Some(text) => {
                let beads = self.parse(text);
                self.analyze_beads(&beads);
                Some(beads)
            }
            None => None,
        };

        if self.is_resolved() {
            return StepResponse {
                text: Some(self.config.resolved_text.clone()),
                beads: beads.unwrap_or_default(),
                step_occurred: true,
            };
        }
        self.respond(beads.as_deref())
    }

    fn parse(&self, text: &str) -> Vec<Bead> {
        match self.parser.parse(text) {
            Ok(beads) => beads,
            Err(e) => {
                warn!("Parser failed on fact {}: {}", self.id, e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::CompareOp;
    use crate::value_type::NumberType;
    use zobot_domain::ParseError;

    struct Words;

    // "yes" / "no" / numbers / "fever" / anything else as a token
    impl BeadParser for Words {
        fn parse(&self, text: &str) -> Result<Vec<Bead>, ParseError> {
            if text == "crash" {
                return Err(ParseError::new("service down"));
            }
            Ok(text
                .split_whitespace()
                .map(|w| match w {
                    "yes" => Bead::entity(EntityId::new(1, 105, "YES")),
                    "no" => Bead::entity(EntityId::new(1, 105, "NO")),
                    "fever" => Bead::entity(fever_id()),
                    _ => w
                        .parse::<f64>()
                        .map(Bead::number)
                        .unwrap_or_else(|_| Bead::token(w)),
                })
                .collect())
        }
    }

    fn fever_id() -> EntityId {
        EntityId::new(2, 1, "FEVER")
    }

    fn node(value_type: ValueType, expression: Option<Expression>) -> EntityFactNode {
        let fact = EntityFact {
            entity: Entity::new(fever_id()).with_name("fever"),
            value_type,
            expression,
            q_prefix: None,
        };
        EntityFactNode::new(
            "fever",
            None,
            &fact,
            Arc::new(EngineConfig::default()),
            Arc::new(Words),
        )
    }

    fn yes_no() -> EntityFactNode {
        node(ValueType::yes_no(&EngineConfig::default()), None)
    }

    fn temperature() -> EntityFactNode {
        let expr = Expression::new(CompareOp::Gt, FactValue::Number(100.0)).unwrap();
        let number = NumberType {
            lo: Some(90.0),
            hi: Some(110.0),
        };
        node(ValueType::Number(number), Some(expr))
    }

    #[test]
    fn test_generated_questions() {
        assert_eq!(yes_no().question(), "Do you have fever?");
        assert_eq!(temperature().question(), "What is your fever?");
    }

    #[test]
    fn test_yes_resolves_true() {
        let mut fact = yes_no();
        fact.activate(None);
        assert!(fact.analyze_beads(&[Bead::entity(EntityId::new(1, 105, "YES"))]));
        assert_eq!(fact.truth(), Truth::True);
        assert_eq!(fact.confidence(), 1.0);
        assert!(!fact.is_activated());
    }

    #[test]
    fn test_no_resolves_false_even_with_mention() {
        let mut fact = yes_no();
        fact.activate(None);
        let beads = [
            Bead::entity(EntityId::new(1, 105, "NO")),
            Bead::entity(fever_id()),
        ];
        assert!(fact.analyze_beads(&beads));
        assert_eq!(fact.truth(), Truth::False);
    }

    #[test]
    fn test_unprompted_mention_resolves_true() {
        let mut fact = yes_no();
        assert!(!fact.is_activated());
        assert!(fact.analyze_beads(&[Bead::token("I"), Bead::entity(fever_id())]));
        assert_eq!(fact.truth(), Truth::True);
    }

    #[test]
    fn test_values_ignored_unless_activated() {
        let mut fact = temperature();
        assert!(!fact.analyze_beads(&[Bead::number(104.0)]));
        assert!(!fact.is_resolved());

        fact.activate(None);
        assert!(fact.analyze_beads(&[Bead::number(104.0)]));
        assert_eq!(fact.truth(), Truth::True);
        assert_eq!(fact.value(), Some(&FactValue::Number(104.0)));
    }

    #[test]
    fn test_expression_decides_truth() {
        let mut fact = temperature();
        fact.activate(None);
        assert!(fact.analyze_beads(&[Bead::number(98.6)]));
        assert_eq!(fact.truth(), Truth::False);
    }

    #[test]
    fn test_rejection_messages() {
        let mut fact = temperature();
        fact.activate(None);
        assert!(!fact.analyze_beads(&[Bead::number(300.0)]));
        assert_eq!(
            fact.special_response(),
            Some("Sorry, 300 is not valid. What is your fever?")
        );

        fact.activate(None);
        assert!(!fact.analyze_beads(&[Bead::number(300.0), Bead::number(5.0)]));
        assert_eq!(
            fact.special_response(),
            Some("None of these values seem valid 300,5. What is your fever?")
        );

        // a later unmatched answer clears the stale rejection
        fact.activate(None);
        fact.analyze_beads(&[Bead::token("dunno")]);
        assert_eq!(fact.special_response(), None);
    }

    #[test]
    fn test_rejection_is_shown_once() {
        let mut fact = temperature();
        fact.activate(None);
        fact.analyze_beads(&[Bead::number(300.0)]);

        let shown = fact.respond(Some(&[Bead::number(300.0)]));
        assert_eq!(
            shown.text.as_deref(),
            Some("Sorry, 300 is not valid. What is your fever?")
        );
        assert_eq!(fact.special_response(), None);

        let again = fact.respond(None);
        assert_eq!(again.text.as_deref(), Some("What is your fever?"));
    }

    #[test]
    fn test_step_asks_then_apologizes() {
        let mut fact = temperature();
        fact.activate(None);

        let first = fact.step(None);
        assert_eq!(first.text.as_deref(), Some("What is your fever?"));
        assert!(first.step_occurred);
        assert!(fact.was_asked());

        fact.activate(None);
        let second = fact.step(Some("hot"));
        assert_eq!(
            second.text.as_deref(),
            Some("Sorry I didn't get that. What is your fever?")
        );
        assert_eq!(second.beads, vec![Bead::token("hot")]);
        assert!(!fact.is_resolved());
    }

    #[test]
    fn test_step_resolves_and_goes_idle() {
        let mut fact = temperature();
        fact.step(None);
        fact.activate(None);

        let answer = fact.step(Some("102"));
        assert_eq!(answer.text.as_deref(), Some("Thank you!"));
        assert!(fact.is_resolved());

        let idle = fact.step(Some("99"));
        assert!(!idle.step_occurred);
        assert_eq!(idle.text, None);
        assert_eq!(fact.value(), Some(&FactValue::Number(102.0)));
    }

    #[test]
    fn test_parser_failure_is_a_re_ask() {
        let mut fact = yes_no();
        fact.step(None);
        fact.activate(None);
        let response = fact.step(Some("crash"));
        assert!(response.beads.is_empty());
        assert_eq!(
            response.text.as_deref(),
            Some("Sorry I didn't get that. Do you have fever?")
        );
    }

    #[test]
    fn test_matcher_override() {
        let mut fact = yes_no();
        fact.activate(Some(ValueType::Number(NumberType::unbounded())));
        assert!(fact.analyze_beads(&[Bead::number(3.0)]));
        assert_eq!(fact.truth(), Truth::True);
        assert_eq!(fact.matcher().name(), "yesno");
    }

    #[test]
    fn test_deactivate_keeps_history() {
        let mut fact = yes_no();
        fact.activate(None);
        fact.respond(None);
        fact.deactivate();
        assert!(!fact.is_activated());
        assert!(fact.was_asked());
    }
}
