//! Static protocol definition
//!
//! A protocol is parsed once from its JSON document into fact descriptors,
//! sorted so every fact comes after the facts it depends on, and then shared
//! read-only by every conversation built from it.

use crate::config::EngineConfig;
use crate::error::ProtocolError;
use crate::expression::{Expression, ExpressionSpec};
use crate::node::{NodeRegistry, Truth};
use crate::value_type::{ValueType, ValueTypeSpec};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use tracing::debug;
use zobot_domain::Entity;

/// Boolean aggregation of a composite fact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operator {
    /// All children must hold
    And,
    /// One child must hold
    Or,
}

impl Operator {
    /// Three-valued aggregation with short-circuiting
    pub fn evaluate(self, children: impl IntoIterator<Item = Truth>) -> Truth {
        let mut all_decided = true;
        for truth in children {
            match (self, truth) {
                (Operator::And, Truth::False) => return Truth::False,
                (Operator::Or, Truth::True) => return Truth::True,
                (_, Truth::Unresolved) => all_decided = false,
                _ => {}
            }
        }
        match (self, all_decided) {
            (_, false) => Truth::Unresolved,
            (Operator::And, true) => Truth::True,
            (Operator::Or, true) => Truth::False,
        }
    }

    /// Confidence of an unresolved composite: product for AND, max for OR
    pub fn confidence(self, children: impl IntoIterator<Item = f64>) -> f64 {
        match self {
            Operator::And => children.into_iter().product(),
            Operator::Or => children.into_iter().fold(0.0, f64::max),
        }
    }
}

impl FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AND" | "&" | "&&" => Ok(Operator::And),
            "OR" | "|" | "||" => Ok(Operator::Or),
            _ => Err(s.to_string()),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::And => write!(f, "AND"),
            Operator::Or => write!(f, "OR"),
        }
    }
}

/// Leaf fact bound to one entity
#[derive(Debug, Clone)]
pub struct EntityFact {
    /// Bound entity
    pub entity: Entity,
    /// Matcher for answers
    pub value_type: ValueType,
    /// Comparison turning the matched value into a truth
    pub expression: Option<Expression>,
    /// Question prefix override
    pub q_prefix: Option<String>,
}

/// AND / OR over other facts
#[derive(Debug, Clone)]
pub struct CompositeFact {
    /// Aggregation
    pub operator: Operator,
    /// Text shown when the composite is a terminal and holds
    pub text: String,
    /// Dependency ids in declaration order
    pub dependencies: Vec<String>,
    /// Dependency positions in the sorted protocol
    pub children: Vec<usize>,
}

/// Fact kinds
#[derive(Debug, Clone)]
pub enum FactKind {
    /// Entity-bound leaf
    Entity(EntityFact),
    /// AND / OR node
    Composite(CompositeFact),
}

/// One fact descriptor
#[derive(Debug, Clone)]
pub struct FactDef {
    /// Unique id
    pub id: String,
    /// Question override
    pub question: Option<String>,
    /// Kind specific data
    pub kind: FactKind,
}

impl FactDef {
    /// Kind name as declared
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            FactKind::Entity(_) => "entity",
            FactKind::Composite(_) => "composite",
        }
    }

    /// Children positions; empty for entity facts
    pub fn children(&self) -> &[usize] {
        match &self.kind {
            FactKind::Entity(_) => &[],
            FactKind::Composite(c) => &c.children,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawProtocol {
    facts: Vec<RawFact>,
    #[serde(default)]
    terminals: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawFact {
    #[serde(alias = "node_id")]
    id: String,
    #[serde(rename = "type", alias = "node_type")]
    kind: String,
    #[serde(default)]
    question: Option<String>,
    #[serde(default, alias = "data")]
    entity: Option<RawEntity>,
    #[serde(default)]
    operator: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    facts: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawEntity {
    #[serde(flatten)]
    entity: Entity,
    #[serde(default)]
    value_type: Option<Value>,
    #[serde(default)]
    expression: Option<ExpressionSpec>,
    #[serde(default)]
    q_prefix: Option<String>,
}

struct FactSource {
    raw: RawFact,
    config: EngineConfig,
}

fn build_entity(src: &FactSource) -> Result<FactDef, ProtocolError> {
    let raw = &src.raw;
    let block = raw.entity.as_ref().ok_or_else(|| ProtocolError::MissingField {
        fact: raw.id.clone(),
        field: "entity",
    })?;

    let expression = block
        .expression
        .as_ref()
        .map(Expression::from_spec)
        .transpose()?;

    let spec = match &block.value_type {
        Some(v) => ValueTypeSpec::from_json(v, &src.config)?,
        None if expression.is_some() => ValueTypeSpec::named("number", &src.config),
        None => ValueTypeSpec::named("yesno", &src.config),
    };

    Ok(FactDef {
        id: raw.id.clone(),
        question: raw.question.clone(),
        kind: FactKind::Entity(EntityFact {
            entity: block.entity.clone(),
            value_type: ValueType::from_spec(&spec)?,
            expression,
            q_prefix: block.q_prefix.clone(),
        }),
    })
}

fn build_composite(src: &FactSource) -> Result<FactDef, ProtocolError> {
    let raw = &src.raw;
    let declared = raw.operator.as_deref().ok_or_else(|| ProtocolError::MissingField {
        fact: raw.id.clone(),
        field: "operator",
    })?;
    let operator = declared
        .parse::<Operator>()
        .map_err(|operator| ProtocolError::UnknownOperator {
            fact: raw.id.clone(),
            operator,
        })?;
    if raw.facts.is_empty() {
        return Err(ProtocolError::EmptyComposite(raw.id.clone()));
    }

    Ok(FactDef {
        id: raw.id.clone(),
        question: raw.question.clone(),
        kind: FactKind::Composite(CompositeFact {
            operator,
            text: raw.text.clone().unwrap_or_else(|| raw.id.clone()),
            dependencies: raw.facts.clone(),
            children: Vec::new(),
        }),
    })
}

static FACT_KINDS: NodeRegistry<FactSource, FactDef, ProtocolError> =
    NodeRegistry::new(&[("entity", build_entity), ("composite", build_composite)]);

/// Parsed, validated and dependency-ordered protocol
#[derive(Debug, Clone)]
pub struct Protocol {
    facts: Vec<FactDef>,
    terminals: Vec<usize>,
    positions: HashMap<String, usize>,
}

impl Protocol {
    /// Parse a protocol document
    pub fn from_json(json: &str, config: &EngineConfig) -> Result<Self, ProtocolError> {
        let raw: RawProtocol = serde_json::from_str(json)?;
        Self::from_raw(raw, config)
    }

    /// Build from an already decoded JSON value
    pub fn from_value(value: Value, config: &EngineConfig) -> Result<Self, ProtocolError> {
        let raw: RawProtocol = serde_json::from_value(value)?;
        Self::from_raw(raw, config)
    }

    fn from_raw(raw: RawProtocol, config: &EngineConfig) -> Result<Self, ProtocolError> {
        let mut declared: Vec<FactDef> = Vec::with_capacity(raw.facts.len());
        let mut by_id: HashMap<String, usize> = HashMap::new();

        for fact in raw.facts {
            if by_id.contains_key(&fact.id) {
                return Err(ProtocolError::DuplicateFact(fact.id));
            }
            let ctor = FACT_KINDS
                .lookup(&fact.kind)
                .ok_or_else(|| ProtocolError::UnknownFactKind {
                    fact: fact.id.clone(),
                    kind: fact.kind.clone(),
                })?;
            let def = ctor(&FactSource {
                raw: fact,
                config: config.clone(),
            })?;
            by_id.insert(def.id.clone(), declared.len());
            declared.push(def);
        }

        let order = topological_order(&declared, &by_id)?;

        // move descriptors into dependency order and resolve ids to positions
        let positions: HashMap<String, usize> = order
            .iter()
            .enumerate()
            .map(|(pos, &i)| (declared[i].id.clone(), pos))
            .collect();
        let mut slots: Vec<Option<FactDef>> = declared.into_iter().map(Some).collect();
        let mut facts = Vec::with_capacity(order.len());
        for i in order {
            let Some(mut def) = slots[i].take() else {
                continue;
            };
            if let FactKind::Composite(c) = &mut def.kind {
                c.children = c.dependencies.iter().map(|d| positions[d]).collect();
            }
            facts.push(def);
        }

        let mut terminals = Vec::new();
        for id in raw.terminals {
            let pos = *positions
                .get(&id)
                .ok_or_else(|| ProtocolError::UnknownTerminal(id.clone()))?;
            if !matches!(facts[pos].kind, FactKind::Composite(_)) {
                return Err(ProtocolError::TerminalNotComposite(id));
            }
            if terminals.contains(&pos) {
                debug!("Ignoring repeated terminal {}", id);
                continue;
            }
            terminals.push(pos);
        }
        if terminals.is_empty() {
            return Err(ProtocolError::NoTerminals);
        }

        debug!(
            "Built protocol with {} facts and {} terminals",
            facts.len(),
            terminals.len()
        );
        Ok(Self {
            facts,
            terminals,
            positions,
        })
    }

    /// Facts in dependency order
    pub fn facts(&self) -> &[FactDef] {
        &self.facts
    }

    /// Fact at a position
    pub fn fact(&self, pos: usize) -> Option<&FactDef> {
        self.facts.get(pos)
    }

    /// Position of a fact id
    pub fn position(&self, id: &str) -> Option<usize> {
        self.positions.get(id).copied()
    }

    /// Terminal positions in declaration order
    pub fn terminals(&self) -> &[usize] {
        &self.terminals
    }

    /// Number of facts
    pub fn len(&self) -> usize {
        self.facts.len()
    }

    /// True if the protocol holds no facts
    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}

/// Dependency-first order of declared facts; fails on cycles and dangling ids
fn topological_order(
    facts: &[FactDef],
    by_id: &HashMap<String, usize>,
) -> Result<Vec<usize>, ProtocolError> {
    let mut sorted = Vec::with_capacity(facts.len());
    let mut visited = HashSet::new();
    let mut in_progress = HashSet::new();

    for i in 0..facts.len() {
        visit(i, facts, by_id, &mut visited, &mut in_progress, &mut sorted)?;
    }
    Ok(sorted)
}

fn visit(
    i: usize,
    facts: &[FactDef],
    by_id: &HashMap<String, usize>,
    visited: &mut HashSet<usize>,
    in_progress: &mut HashSet<usize>,
    sorted: &mut Vec<usize>,
) -> Result<(), ProtocolError> {
    if in_progress.contains(&i) {
        return Err(ProtocolError::Cycle(facts[i].id.clone()));
    }
    if visited.contains(&i) {
        return Ok(());
    }

    in_progress.insert(i);
    if let FactKind::Composite(c) = &facts[i].kind {
        for dep in &c.dependencies {
            let j = *by_id
                .get(dep)
                .ok_or_else(|| ProtocolError::UnknownDependency {
                    fact: facts[i].id.clone(),
                    missing: dep.clone(),
                })?;
            visit(j, facts, by_id, visited, in_progress, sorted)?;
        }
    }
    in_progress.remove(&i);

    visited.insert(i);
    sorted.push(i);
    Ok(())
}
