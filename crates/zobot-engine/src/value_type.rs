//! Value-type matchers
//!
//! A matcher decides whether a bead, or a whole utterance, is an acceptable
//! answer for a fact and extracts the typed value. Matching is two-phase: a
//! whole-sequence pass for answers that span several beads (free text), then a
//! per-bead pass for single-token answers (a bare number, "yes").

use crate::config::EngineConfig;
use crate::error::ProtocolError;
use crate::node::NodeRegistry;
use regex::Regex;
use serde_json::{Map, Value};
use zobot_domain::{Bead, EntityId, FactValue};

/// Outcome of matching one bead or one sequence
#[derive(Debug, Clone, PartialEq)]
pub enum BeadMatch {
    /// Recognized and acceptable
    Accepted(FactValue),
    /// Recognized shape, unacceptable content; carries the value for the
    /// rejection message
    Rejected(FactValue),
    /// Not an answer of this type
    Ignored,
}

impl BeadMatch {
    /// Accepted value, if any
    pub fn accepted(&self) -> Option<&FactValue> {
        match self {
            BeadMatch::Accepted(v) => Some(v),
            _ => None,
        }
    }
}

/// Outcome of the whole-sequence pass
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceMatch {
    /// Result for the sequence as a whole
    pub outcome: BeadMatch,
    /// Whether the per-bead pass should run afterwards
    pub single_bead_eligible: bool,
}

impl SequenceMatch {
    /// No whole-sequence interpretation; defer to the per-bead pass
    pub fn per_bead() -> Self {
        Self {
            outcome: BeadMatch::Ignored,
            single_bead_eligible: true,
        }
    }
}

/// A value-type matcher
pub trait ValueMatcher {
    /// Registered name
    fn name(&self) -> &'static str;

    /// Match a single bead
    fn match_one(&self, bead: &Bead) -> BeadMatch;

    /// Match a whole utterance
    fn match_all(&self, _beads: &[Bead]) -> SequenceMatch {
        SequenceMatch::per_bead()
    }

    /// Prefix for generated questions ("Do you have fever?")
    fn question_prefix<'a>(&self, config: &'a EngineConfig) -> &'a str {
        &config.value_prefix
    }
}

/// Declarative description of a value type, as read from a protocol
#[derive(Debug, Clone)]
pub struct ValueTypeSpec {
    /// Registered matcher name
    pub name: String,
    /// Matcher parameters
    pub params: Map<String, Value>,
    /// Default "yes" entity
    pub yes_entity: EntityId,
    /// Default "no" entity
    pub no_entity: EntityId,
}

impl ValueTypeSpec {
    /// Read a spec from either `"number"` or `{"name": "number", "lo": 0}`
    pub fn from_json(raw: &Value, config: &EngineConfig) -> Result<Self, ProtocolError> {
        let (name, params) = match raw {
            Value::String(name) => (name.clone(), Map::new()),
            Value::Object(map) => {
                let name = map
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ProtocolError::InvalidValueType(format!("no name in {}", raw)))?;
                (name.to_string(), map.clone())
            }
            other => {
                return Err(ProtocolError::InvalidValueType(format!(
                    "expected a name or an object, got {}",
                    other
                )))
            }
        };

        Ok(Self {
            name,
            params,
            yes_entity: config.yes_entity.clone(),
            no_entity: config.no_entity.clone(),
        })
    }

    /// Spec with no parameters
    pub fn named(name: &str, config: &EngineConfig) -> Self {
        Self {
            name: name.to_string(),
            params: Map::new(),
            yes_entity: config.yes_entity.clone(),
            no_entity: config.no_entity.clone(),
        }
    }

    fn number(&self, key: &str) -> Result<Option<f64>, ProtocolError> {
        match self.params.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => v.as_f64().map(Some).ok_or_else(|| {
                ProtocolError::InvalidValueType(format!("{}.{} must be a number", self.name, key))
            }),
        }
    }

    fn count(&self, key: &str) -> Result<Option<usize>, ProtocolError> {
        match self.params.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => v.as_u64().map(|n| Some(n as usize)).ok_or_else(|| {
                ProtocolError::InvalidValueType(format!("{}.{} must be a count", self.name, key))
            }),
        }
    }

    fn entity(&self, key: &str) -> Result<Option<EntityId>, ProtocolError> {
        match self.params.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => serde_json::from_value(v.clone()).map(Some).map_err(|e| {
                ProtocolError::InvalidValueType(format!("{}.{}: {}", self.name, key, e))
            }),
        }
    }
}

/// Number answers with optional inclusive bounds
#[derive(Debug, Clone, PartialEq)]
pub struct NumberType {
    /// Lowest acceptable value
    pub lo: Option<f64>,
    /// Highest acceptable value
    pub hi: Option<f64>,
}

impl NumberType {
    /// Unbounded number matcher
    pub fn unbounded() -> Self {
        Self { lo: None, hi: None }
    }

    fn from_spec(spec: &ValueTypeSpec) -> Result<ValueType, ProtocolError> {
        let lo = spec.number("lo")?;
        let hi = spec.number("hi")?;
        if let (Some(lo), Some(hi)) = (lo, hi) {
            if lo > hi {
                return Err(ProtocolError::InvalidValueType(format!(
                    "number bounds reversed: lo {} > hi {}",
                    lo, hi
                )));
            }
        }
        Ok(ValueType::Number(NumberType { lo, hi }))
    }

    fn raw_value(bead: &Bead) -> Option<FactValue> {
        match bead {
            Bead::Number { value } => Some(FactValue::Number(*value)),
            Bead::Range(range) | Bead::Erc { range, .. } if range.is_numeric() => {
                let (lo, hi) = range.ordered();
                Some(FactValue::Range(lo, hi))
            }
            Bead::Evr { values, .. } => values.iter().find_map(|v| match v {
                Bead::Number { value } => Some(FactValue::Number(*value)),
                _ => None,
            }),
            _ => None,
        }
    }

    fn in_bounds(&self, n: f64) -> bool {
        self.lo.is_none_or(|lo| n >= lo) && self.hi.is_none_or(|hi| n <= hi)
    }
}

impl ValueMatcher for NumberType {
    fn name(&self) -> &'static str {
        "number"
    }

    fn match_one(&self, bead: &Bead) -> BeadMatch {
        let Some(value) = Self::raw_value(bead) else {
            return BeadMatch::Ignored;
        };
        match value.as_number() {
            Some(n) if self.in_bounds(n) => BeadMatch::Accepted(value),
            _ => BeadMatch::Rejected(value),
        }
    }
}

/// Yes / no answers, recognized by two entity identities
#[derive(Debug, Clone, PartialEq)]
pub struct YesNoType {
    /// Entity meaning "yes"
    pub yes: EntityId,
    /// Entity meaning "no"
    pub no: EntityId,
}

impl YesNoType {
    fn from_spec(spec: &ValueTypeSpec) -> Result<ValueType, ProtocolError> {
        Ok(ValueType::YesNo(YesNoType {
            yes: spec.entity("yes")?.unwrap_or_else(|| spec.yes_entity.clone()),
            no: spec.entity("no")?.unwrap_or_else(|| spec.no_entity.clone()),
        }))
    }
}

impl ValueMatcher for YesNoType {
    fn name(&self) -> &'static str {
        "yesno"
    }

    fn match_one(&self, bead: &Bead) -> BeadMatch {
        match bead {
            Bead::Entity(ent) if ent.id == self.yes => BeadMatch::Accepted(FactValue::Bool(true)),
            Bead::Entity(ent) if ent.id == self.no => BeadMatch::Accepted(FactValue::Bool(false)),
            _ => BeadMatch::Ignored,
        }
    }

    fn question_prefix<'a>(&self, config: &'a EngineConfig) -> &'a str {
        &config.yes_no_prefix
    }
}

/// Which bead kinds may form a free-text run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunKinds {
    /// Plain tokens
    pub tokens: bool,
    /// Fluff words
    pub fluff: bool,
    /// Numbers
    pub numbers: bool,
    /// Punctuation
    pub punct: bool,
}

impl Default for RunKinds {
    fn default() -> Self {
        Self {
            tokens: true,
            fluff: true,
            numbers: true,
            punct: true,
        }
    }
}

/// Free-text answers assembled from runs of token-like beads
#[derive(Debug, Clone)]
pub struct StringType {
    /// Anchored validation pattern; takes precedence over the length range
    pub pattern: Option<Regex>,
    /// Minimum length in characters
    pub min_len: usize,
    /// Maximum length in characters
    pub max_len: Option<usize>,
    /// Bead kinds allowed in a run
    pub kinds: RunKinds,
}

impl StringType {
    fn from_spec(spec: &ValueTypeSpec) -> Result<ValueType, ProtocolError> {
        let pattern = match spec.params.get("pattern") {
            None | Some(Value::Null) => None,
            Some(Value::String(p)) => Some(Regex::new(&format!("^(?:{})$", p)).map_err(|e| {
                ProtocolError::InvalidValueType(format!("string.pattern: {}", e))
            })?),
            Some(other) => {
                return Err(ProtocolError::InvalidValueType(format!(
                    "string.pattern must be text, got {}",
                    other
                )))
            }
        };

        let mut kinds = RunKinds::default();
        if let Some(accept) = spec.params.get("accept") {
            let names: Vec<&str> = accept
                .as_array()
                .map(|items| items.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default();
            kinds = RunKinds {
                tokens: names.contains(&"token"),
                fluff: names.contains(&"fluff"),
                numbers: names.contains(&"number"),
                punct: names.contains(&"punct"),
            };
        }

        let min_len = spec.count("min_len")?.unwrap_or(1);
        let max_len = spec.count("max_len")?;
        if max_len.is_some_and(|max| max < min_len) {
            return Err(ProtocolError::InvalidValueType(
                "string.max_len is below min_len".to_string(),
            ));
        }

        Ok(ValueType::String(StringType {
            pattern,
            min_len,
            max_len,
            kinds,
        }))
    }

    /// Text of a bead that may join a run; the flag marks punctuation
    fn piece(&self, bead: &Bead) -> Option<(String, bool)> {
        match bead {
            Bead::Token { value } if self.kinds.tokens => Some((value.clone(), false)),
            Bead::Fluff { value } if self.kinds.fluff => Some((value.clone(), false)),
            Bead::Punct { value } if self.kinds.punct => Some((value.clone(), true)),
            Bead::Number { value } if self.kinds.numbers => Some((value.to_string(), false)),
            _ => None,
        }
    }

    fn runs(&self, beads: &[Bead]) -> Vec<Vec<(String, bool)>> {
        let mut runs = Vec::new();
        let mut current = Vec::new();
        for bead in beads {
            match self.piece(bead) {
                Some(piece) => current.push(piece),
                None if !current.is_empty() => runs.push(std::mem::take(&mut current)),
                None => {}
            }
        }
        if !current.is_empty() {
            runs.push(current);
        }
        runs
    }

    fn join(pieces: &[(String, bool)]) -> String {
        let mut text = String::new();
        for (i, (piece, is_punct)) in pieces.iter().enumerate() {
            if i > 0 && !is_punct {
                text.push(' ');
            }
            text.push_str(piece);
        }
        text
    }

    fn is_valid(&self, candidate: &str) -> bool {
        match &self.pattern {
            Some(pattern) => pattern.is_match(candidate),
            None => {
                let len = candidate.chars().count();
                len >= self.min_len && self.max_len.is_none_or(|max| len <= max)
            }
        }
    }

    /// First valid candidate of a run, longest first, left to right
    fn best_in_run(&self, run: &[(String, bool)]) -> Option<String> {
        for len in (1..=run.len()).rev() {
            for start in 0..=run.len() - len {
                let candidate = Self::join(&run[start..start + len]);
                if self.is_valid(&candidate) {
                    return Some(candidate);
                }
            }
        }
        None
    }
}

impl ValueMatcher for StringType {
    fn name(&self) -> &'static str {
        "string"
    }

    fn match_one(&self, bead: &Bead) -> BeadMatch {
        self.match_all(std::slice::from_ref(bead)).outcome
    }

    fn match_all(&self, beads: &[Bead]) -> SequenceMatch {
        let runs = self.runs(beads);
        let outcome = runs
            .iter()
            .find_map(|run| self.best_in_run(run))
            .map(|text| BeadMatch::Accepted(FactValue::Text(text)))
            .or_else(|| {
                runs.first()
                    .map(|run| BeadMatch::Rejected(FactValue::Text(Self::join(run))))
            })
            .unwrap_or(BeadMatch::Ignored);

        SequenceMatch {
            outcome,
            single_bead_eligible: false,
        }
    }
}

/// Accepts any bead of one kind ("date", "entity", ...)
#[derive(Debug, Clone, PartialEq)]
pub struct BeadKindType {
    /// Bead kind name
    pub kind: String,
}

impl BeadKindType {
    fn from_spec(spec: &ValueTypeSpec) -> Result<ValueType, ProtocolError> {
        Ok(ValueType::BeadKind(BeadKindType {
            kind: spec.name.clone(),
        }))
    }
}

impl ValueMatcher for BeadKindType {
    fn name(&self) -> &'static str {
        "bead"
    }

    fn match_one(&self, bead: &Bead) -> BeadMatch {
        if bead.kind_name() != self.kind {
            return BeadMatch::Ignored;
        }
        let value = match bead {
            Bead::Token { value } | Bead::Fluff { value } | Bead::Punct { value } => {
                FactValue::Text(value.clone())
            }
            Bead::Number { value } => FactValue::Number(*value),
            Bead::Range(range) => FactValue::Range(range.lo, range.hi),
            Bead::Entity(ent) | Bead::Erc { ent, .. } | Bead::Evr { ent, .. } => {
                FactValue::Entity(ent.id.clone())
            }
        };
        BeadMatch::Accepted(value)
    }
}

/// Any of the registered matchers
#[derive(Debug, Clone)]
pub enum ValueType {
    /// Numbers
    Number(NumberType),
    /// Yes / no
    YesNo(YesNoType),
    /// Free text
    String(StringType),
    /// One bead kind
    BeadKind(BeadKindType),
}

static VALUE_TYPES: NodeRegistry<ValueTypeSpec, ValueType, ProtocolError> = NodeRegistry::new(&[
    ("number", NumberType::from_spec),
    ("yesno", YesNoType::from_spec),
    ("yes_no", YesNoType::from_spec),
    ("bool", YesNoType::from_spec),
    ("string", StringType::from_spec),
    ("token", BeadKindType::from_spec),
    ("fluff", BeadKindType::from_spec),
    ("punct", BeadKindType::from_spec),
    ("range", BeadKindType::from_spec),
    ("entity", BeadKindType::from_spec),
    ("erc", BeadKindType::from_spec),
    ("evr", BeadKindType::from_spec),
]);

impl ValueType {
    /// Build a matcher from its declarative spec
    pub fn from_spec(spec: &ValueTypeSpec) -> Result<Self, ProtocolError> {
        let ctor = VALUE_TYPES
            .lookup(&spec.name)
            .ok_or_else(|| ProtocolError::UnknownValueType(spec.name.clone()))?;
        ctor(spec)
    }

    /// Yes / no matcher over the configured entities
    pub fn yes_no(config: &EngineConfig) -> Self {
        ValueType::YesNo(YesNoType {
            yes: config.yes_entity.clone(),
            no: config.no_entity.clone(),
        })
    }

    fn inner(&self) -> &dyn ValueMatcher {
        match self {
            ValueType::Number(m) => m,
            ValueType::YesNo(m) => m,
            ValueType::String(m) => m,
            ValueType::BeadKind(m) => m,
        }
    }
}

impl ValueMatcher for ValueType {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn match_one(&self, bead: &Bead) -> BeadMatch {
        self.inner().match_one(bead)
    }

    fn match_all(&self, beads: &[Bead]) -> SequenceMatch {
        self.inner().match_all(beads)
    }

    fn question_prefix<'a>(&self, config: &'a EngineConfig) -> &'a str {
        self.inner().question_prefix(config)
    }
}
