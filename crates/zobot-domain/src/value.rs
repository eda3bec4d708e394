//! Typed fact values

use crate::entity::EntityId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A raw value extracted from beads, or a threshold written in a protocol
///
/// Untagged so that protocol thresholds can be written as plain JSON scalars
/// and arrays. `Range` is only ever produced by matchers; a two element JSON
/// array decodes as a `List`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FactValue {
    /// Boolean answer
    Bool(bool),
    /// Number
    Number(f64),
    /// Free text
    Text(String),
    /// Collection of values
    List(Vec<FactValue>),
    /// Entity reference
    Entity(EntityId),
    /// Partial or complete numeric range
    Range(Option<f64>, Option<f64>),
}

impl FactValue {
    /// Boolean view
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FactValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Numeric view; a range yields its first present bound
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FactValue::Number(n) => Some(*n),
            FactValue::Range(lo, hi) => lo.or(*hi),
            _ => None,
        }
    }

    /// True for collection values (sets the value slot's array flag)
    pub fn is_collection(&self) -> bool {
        matches!(self, FactValue::List(_) | FactValue::Range(..))
    }

    /// The scalar a comparison should run against
    ///
    /// Pairs and lists evaluate against their first present element.
    pub fn leading(&self) -> Option<FactValue> {
        match self {
            FactValue::Range(lo, hi) => lo.or(*hi).map(FactValue::Number),
            FactValue::List(items) => items.iter().find_map(|v| v.leading()),
            other => Some(other.clone()),
        }
    }

    /// Ordering between two scalars of the same shape
    ///
    /// Numbers order numerically, text lexically, booleans false < true.
    /// Entities only compare for equality. Everything else is incomparable.
    pub fn compare(&self, other: &FactValue) -> Option<Ordering> {
        match (self, other) {
            (FactValue::Number(a), FactValue::Number(b)) => a.partial_cmp(b),
            (FactValue::Text(a), FactValue::Text(b)) => Some(a.as_str().cmp(b.as_str())),
            (FactValue::Bool(a), FactValue::Bool(b)) => Some(a.cmp(b)),
            (FactValue::Entity(a), FactValue::Entity(b)) if a == b => Some(Ordering::Equal),
            (FactValue::Text(a), FactValue::Entity(b)) | (FactValue::Entity(b), FactValue::Text(a))
                if a == &b.id =>
            {
                Some(Ordering::Equal)
            }
            _ => None,
        }
    }

    /// Equality under [`FactValue::compare`]
    pub fn loosely_equals(&self, other: &FactValue) -> bool {
        self.compare(other) == Some(Ordering::Equal)
    }
}

impl fmt::Display for FactValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactValue::Bool(b) => write!(f, "{}", if *b { "yes" } else { "no" }),
            FactValue::Number(n) => write!(f, "{}", n),
            FactValue::Text(s) => write!(f, "{}", s),
            FactValue::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "{}", parts.join(","))
            }
            FactValue::Entity(id) => write!(f, "{}", id),
            FactValue::Range(lo, hi) => match (lo, hi) {
                (Some(lo), Some(hi)) => write!(f, "{}-{}", lo, hi),
                (Some(v), None) | (None, Some(v)) => write!(f, "{}", v),
                (None, None) => write!(f, "?"),
            },
        }
    }
}
