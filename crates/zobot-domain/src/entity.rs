//! Entity identity module

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Identity of a real-world concept: `(class, subclass, id)`
///
/// Two beads or facts refer to the same thing exactly when all three parts are
/// equal. Display metadata lives on [`Entity`] and never takes part in equality.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId {
    /// Entity class
    pub class: i64,
    /// Entity subclass
    pub subclass: i64,
    /// Entity id within the subclass
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
}

impl EntityId {
    /// Create a new entity identity
    pub fn new(class: i64, subclass: i64, id: impl Into<String>) -> Self {
        Self {
            class,
            subclass,
            id: id.into(),
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.class, self.subclass, self.id)
    }
}

/// An entity reference as it appears in a bead or a protocol definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Stable identity
    #[serde(flatten)]
    pub id: EntityId,

    /// Human readable name, used when a question has to be generated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Scope label (display only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Category label (display only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Parser relevance score
    #[serde(default, rename = "rel", skip_serializing_if = "Option::is_none")]
    pub relevance: Option<f64>,
}

impl Entity {
    /// Create an entity with no display metadata
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            name: None,
            scope: None,
            category: None,
            relevance: None,
        }
    }

    /// Attach a display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Name to use in generated questions, falling back to the raw id
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id.id)
    }
}

impl From<EntityId> for Entity {
    fn from(id: EntityId) -> Self {
        Entity::new(id)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.scope, &self.category) {
            (Some(scope), Some(category)) => {
                write!(f, "entity:{}.{}.{}", scope, category, self.id.id)
            }
            _ => write!(f, "entity:{}", self.id),
        }
    }
}

/// The parser service emits ids as either strings or integers
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Int(n) => n.to_string(),
    })
}
