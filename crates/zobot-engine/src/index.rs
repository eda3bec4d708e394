//! Entity identity to live entity facts

use crate::graph::FactIdx;
use std::collections::{BTreeSet, HashMap};
use zobot_domain::EntityId;

/// Multimap from entity identity to the entity facts bound to it
///
/// The same entity may be asked about in several branches of a protocol;
/// activating one of them activates all of them.
#[derive(Debug, Clone, Default)]
pub struct EntityIndex {
    facts: HashMap<EntityId, BTreeSet<FactIdx>>,
}

impl EntityIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fact for an entity
    pub fn insert(&mut self, entity: EntityId, fact: FactIdx) {
        self.facts.entry(entity).or_default().insert(fact);
    }

    /// Facts bound to an entity, in arena order
    pub fn get(&self, entity: &EntityId) -> impl Iterator<Item = FactIdx> + '_ {
        self.facts.get(entity).into_iter().flatten().copied()
    }

    /// Number of distinct entities
    pub fn len(&self) -> usize {
        self.facts.len()
    }

    /// True if nothing is indexed
    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}
