//! Bead module - typed semantic tokens of one parsed utterance

use crate::entity::{Entity, EntityId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A numeric range as reported by the parser
///
/// Either bound may be missing when the utterance only carried a partial
/// reading ("above 100").
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RangeBead {
    /// Lower bound
    #[serde(default)]
    pub lo: Option<f64>,
    /// Upper bound
    #[serde(default)]
    pub hi: Option<f64>,
}

impl RangeBead {
    /// Create a new range
    pub fn new(lo: Option<f64>, hi: Option<f64>) -> Self {
        Self { lo, hi }
    }

    /// Bounds ordered low to high when both are present
    pub fn ordered(&self) -> (Option<f64>, Option<f64>) {
        match (self.lo, self.hi) {
            (Some(lo), Some(hi)) if hi < lo => (Some(hi), Some(lo)),
            pair => pair,
        }
    }

    /// First present bound, low before high
    pub fn first_present(&self) -> Option<f64> {
        self.lo.or(self.hi)
    }

    /// Midpoint when both bounds are present
    pub fn midpoint(&self) -> Option<f64> {
        match (self.lo, self.hi) {
            (Some(lo), Some(hi)) => Some((lo + hi) / 2.0),
            _ => None,
        }
    }

    /// True if at least one bound is present
    pub fn is_numeric(&self) -> bool {
        self.lo.is_some() || self.hi.is_some()
    }
}

impl fmt::Display for RangeBead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: Option<f64>| v.map(|x| x.to_string()).unwrap_or_else(|| "-".to_string());
        write!(f, "({}, {})", show(self.lo), show(self.hi))
    }
}

/// One typed semantic token
///
/// Beads are produced by the external parser for a single utterance and are
/// consumed once by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Bead {
    /// A plain word
    Token {
        /// Token text
        value: String,
    },

    /// A filler word the parser considers insignificant
    Fluff {
        /// Token text
        value: String,
    },

    /// Punctuation
    Punct {
        /// Punctuation text
        value: String,
    },

    /// A number
    Number {
        /// Numeric value
        value: f64,
    },

    /// A numeric range
    Range(RangeBead),

    /// A recognized entity
    Entity(Entity),

    /// Entity-range combination ("temperature 101")
    Erc {
        /// The entity the range qualifies
        ent: Entity,
        /// The range
        #[serde(default)]
        range: RangeBead,
    },

    /// Entity with a list of values
    Evr {
        /// The entity the values qualify
        ent: Entity,
        /// Value beads
        #[serde(default)]
        values: Vec<Bead>,
    },
}

impl Bead {
    /// Build a token bead
    pub fn token(value: impl Into<String>) -> Self {
        Bead::Token {
            value: value.into(),
        }
    }

    /// Build a punctuation bead
    pub fn punct(value: impl Into<String>) -> Self {
        Bead::Punct {
            value: value.into(),
        }
    }

    /// Build a number bead
    pub fn number(value: f64) -> Self {
        Bead::Number { value }
    }

    /// Build an entity bead with no display metadata
    pub fn entity(id: EntityId) -> Self {
        Bead::Entity(Entity::new(id))
    }

    /// The kind name used by the parser service and protocol definitions
    pub fn kind_name(&self) -> &'static str {
        match self {
            Bead::Token { .. } => "token",
            Bead::Fluff { .. } => "fluff",
            Bead::Punct { .. } => "punct",
            Bead::Number { .. } => "number",
            Bead::Range(_) => "range",
            Bead::Entity(_) => "entity",
            Bead::Erc { .. } => "erc",
            Bead::Evr { .. } => "evr",
        }
    }

    /// The main entity carried by entity-bearing beads
    pub fn entity_ref(&self) -> Option<&Entity> {
        match self {
            Bead::Entity(ent) => Some(ent),
            Bead::Erc { ent, .. } | Bead::Evr { ent, .. } => Some(ent),
            _ => None,
        }
    }

    /// True if this bead mentions the given entity identity
    pub fn mentions(&self, id: &EntityId) -> bool {
        self.entity_ref().is_some_and(|ent| &ent.id == id)
    }

    /// Surface text of token-like beads
    pub fn text(&self) -> Option<&str> {
        match self {
            Bead::Token { value } | Bead::Fluff { value } | Bead::Punct { value } => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for Bead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bead::Token { value } | Bead::Fluff { value } | Bead::Punct { value } => {
                write!(f, "{}:{}", self.kind_name(), value)
            }
            Bead::Number { value } => write!(f, "number:{}", value),
            Bead::Range(range) => write!(f, "range:{}", range),
            Bead::Entity(ent) => write!(f, "{}", ent),
            Bead::Erc { ent, range } => write!(f, "erc:({}{})", ent, range),
            Bead::Evr { ent, values } => {
                let values: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "evr:({} [{}])", ent, values.join(","))
            }
        }
    }
}
