//! Runtime fact graph
//!
//! One graph per conversation. Facts live in an arena in dependency order;
//! children and parents refer to each other by [`FactIdx`]. Each composite
//! keeps its children in a [`ChildQueue`] ranked by how useful asking about
//! them would be, and the graph keeps a root queue over the terminals.
//!
//! After an answer the changed entity facts are propagated upward one height
//! level at a time, leaves first, so every fact is recomputed at most once and
//! always after all of its children.

use crate::config::EngineConfig;
use crate::entity_fact::{EntityFactNode, StepResponse};
use crate::index::EntityIndex;
use crate::node::{ChildCursor, Truth, ValueSlot};
use crate::protocol::{CompositeFact, FactKind, Operator, Protocol};
use crate::queue::ChildQueue;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use zobot_domain::{Bead, FactValue, SharedParser};

/// Position of a fact in the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FactIdx(pub usize);

impl fmt::Display for FactIdx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Live AND / OR node
#[derive(Debug, Clone)]
pub struct CompositeNode {
    operator: Operator,
    text: String,
    question: Option<String>,
    children: Vec<FactIdx>,
    queue: ChildQueue<FactIdx>,
    cursor: ChildCursor,
    truth: ValueSlot<bool>,
    confidence: f64,
}

impl CompositeNode {
    fn new(fact: &CompositeFact, question: Option<String>) -> Self {
        Self {
            operator: fact.operator,
            text: fact.text.clone(),
            question,
            children: fact.children.iter().copied().map(FactIdx).collect(),
            queue: ChildQueue::new(),
            cursor: ChildCursor::default(),
            truth: ValueSlot::new(),
            confidence: 0.0,
        }
    }

    /// Aggregation
    pub fn operator(&self) -> Operator {
        self.operator
    }

    /// Display text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Question override
    pub fn question(&self) -> Option<&str> {
        self.question.as_deref()
    }

    /// Children in declaration order
    pub fn children(&self) -> &[FactIdx] {
        &self.children
    }

    /// Children ranked by score
    pub fn queue(&self) -> &ChildQueue<FactIdx> {
        &self.queue
    }

    /// Current truth
    pub fn truth(&self) -> Truth {
        self.truth.truth()
    }

    /// Confidence in [0, 1]
    pub fn confidence(&self) -> f64 {
        self.confidence
    }
}

/// Kind specific part of a live fact
#[derive(Debug, Clone)]
pub enum FactNode {
    /// Entity-bound leaf
    Entity(EntityFactNode),
    /// AND / OR node
    Composite(CompositeNode),
}

/// A fact in the arena
#[derive(Debug, Clone)]
pub struct ConvoFact {
    id: String,
    height: usize,
    parents: BTreeSet<FactIdx>,
    rooted: bool,
    node: FactNode,
}

impl ConvoFact {
    /// Fact id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// 0 for entity facts, one more than the highest child otherwise
    pub fn height(&self) -> usize {
        self.height
    }

    /// Composites that still depend on this fact
    pub fn parents(&self) -> &BTreeSet<FactIdx> {
        &self.parents
    }

    /// True for terminals
    pub fn is_rooted(&self) -> bool {
        self.rooted
    }

    /// Parents plus the root link
    pub fn live_parents(&self) -> usize {
        self.parents.len() + usize::from(self.rooted)
    }

    /// Kind specific part
    pub fn node(&self) -> &FactNode {
        &self.node
    }

    /// Entity node, if this is an entity fact
    pub fn as_entity(&self) -> Option<&EntityFactNode> {
        match &self.node {
            FactNode::Entity(e) => Some(e),
            FactNode::Composite(_) => None,
        }
    }

    /// Composite node, if this is a composite fact
    pub fn as_composite(&self) -> Option<&CompositeNode> {
        match &self.node {
            FactNode::Composite(c) => Some(c),
            FactNode::Entity(_) => None,
        }
    }

    /// Current truth
    pub fn truth(&self) -> Truth {
        match &self.node {
            FactNode::Entity(e) => e.truth(),
            FactNode::Composite(c) => c.truth(),
        }
    }

    /// True once the truth is established
    pub fn is_resolved(&self) -> bool {
        self.truth().is_resolved()
    }

    /// Confidence in [0, 1]
    pub fn confidence(&self) -> f64 {
        match &self.node {
            FactNode::Entity(e) => e.confidence(),
            FactNode::Composite(c) => c.confidence(),
        }
    }
}

/// Serializable view of one fact
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FactSnapshot {
    /// Fact id
    pub id: String,
    /// "entity" or "composite"
    pub kind: &'static str,
    /// Current truth
    pub truth: Truth,
    /// Current confidence
    pub confidence: f64,
    /// True for terminals
    pub rooted: bool,
    /// Ids of the composites still depending on the fact
    pub parents: Vec<String>,
    /// Child ids in declaration order
    pub children: Vec<String>,
    /// Matched value of an entity fact
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<FactValue>,
    /// True once an entity fact's question was put to the user
    pub asked: bool,
}

/// Arena of live facts for one conversation
#[derive(Debug, Clone)]
pub struct FactGraph {
    facts: Vec<ConvoFact>,
    terminals: Vec<FactIdx>,
    root_queue: ChildQueue<FactIdx>,
    root_cursor: ChildCursor,
    index: EntityIndex,
}

impl FactGraph {
    /// Build the live graph for a protocol
    ///
    /// Facts shared by several composites are built once and collect one
    /// parent link per composite.
    pub fn new(protocol: &Protocol, config: &Arc<EngineConfig>, parser: &SharedParser) -> Self {
        let mut facts: Vec<ConvoFact> = Vec::with_capacity(protocol.len());
        let mut index = EntityIndex::new();

        for (pos, def) in protocol.facts().iter().enumerate() {
            let idx = FactIdx(pos);
            let (node, height) = match &def.kind {
                FactKind::Entity(fact) => {
                    let node = EntityFactNode::new(
                        def.id.clone(),
                        def.question.as_deref(),
                        fact,
                        Arc::clone(config),
                        Arc::clone(parser),
                    );
                    index.insert(node.entity_id().clone(), idx);
                    (FactNode::Entity(node), 0)
                }
                FactKind::Composite(fact) => {
                    let node = CompositeNode::new(fact, def.question.clone());
                    let mut height = 0;
                    for child in &node.children {
                        let child = &mut facts[child.0];
                        child.parents.insert(idx);
                        height = height.max(child.height + 1);
                    }
                    (FactNode::Composite(node), height)
                }
            };
            facts.push(ConvoFact {
                id: def.id.clone(),
                height,
                parents: BTreeSet::new(),
                rooted: false,
                node,
            });
        }

        let terminals: Vec<FactIdx> = protocol.terminals().iter().copied().map(FactIdx).collect();
        for t in &terminals {
            facts[t.0].rooted = true;
        }

        let mut graph = Self {
            facts,
            terminals,
            root_queue: ChildQueue::new(),
            root_cursor: ChildCursor::default(),
            index,
        };
        graph.seed_queues();
        debug!(
            "Built fact graph: {} facts, {} entities, {} terminals",
            graph.facts.len(),
            graph.index.len(),
            graph.terminals.len()
        );
        graph
    }

    /// Initial scores and confidences, children before parents
    fn seed_queues(&mut self) {
        for pos in 0..self.facts.len() {
            let Some(children) = self.facts[pos].as_composite().map(|c| c.children.clone()) else {
                continue;
            };
            let scores: Vec<(FactIdx, f64)> = children.iter().map(|&c| (c, self.score(c))).collect();
            let confidences: Vec<f64> = children
                .iter()
                .map(|c| self.facts[c.0].confidence())
                .collect();

            if let FactNode::Composite(node) = &mut self.facts[pos].node {
                for (child, score) in scores {
                    node.queue.set(child, score);
                }
                node.confidence = node.operator.confidence(confidences);
            }
        }

        for i in 0..self.terminals.len() {
            let t = self.terminals[i];
            let score = self.score(t);
            self.root_queue.set(t, score);
        }
    }

    /// All facts in arena order
    pub fn facts(&self) -> &[ConvoFact] {
        &self.facts
    }

    /// Fact at an index
    pub fn fact(&self, idx: FactIdx) -> Option<&ConvoFact> {
        self.facts.get(idx.0)
    }

    /// Index of a fact id
    pub fn find(&self, id: &str) -> Option<FactIdx> {
        self.facts.iter().position(|f| f.id == id).map(FactIdx)
    }

    /// Terminals in declaration order
    pub fn terminals(&self) -> &[FactIdx] {
        &self.terminals
    }

    /// Terminals ranked by score
    pub fn root_queue(&self) -> &ChildQueue<FactIdx> {
        &self.root_queue
    }

    /// Entity index
    pub fn index(&self) -> &EntityIndex {
        &self.index
    }

    /// Truth of a fact
    pub fn truth(&self, idx: FactIdx) -> Truth {
        self.facts[idx.0].truth()
    }

    /// Priority of a fact in its parents' queues
    ///
    /// Resolved facts score 0. An unresolved composite scores its number of
    /// live parents, an unresolved entity fact its confidence.
    pub fn score(&self, idx: FactIdx) -> f64 {
        let fact = &self.facts[idx.0];
        if fact.is_resolved() {
            return 0.0;
        }
        match &fact.node {
            FactNode::Entity(e) => e.confidence(),
            FactNode::Composite(_) => fact.live_parents() as f64,
        }
    }

    fn entity_mut(&mut self, idx: FactIdx) -> Option<&mut EntityFactNode> {
        match &mut self.facts.get_mut(idx.0)?.node {
            FactNode::Entity(e) => Some(e),
            FactNode::Composite(_) => None,
        }
    }

    /// The entity fact to ask about next, if any
    pub fn current_leaf(&mut self) -> Option<FactIdx> {
        let terminal = match self.root_queue.peek() {
            Some((t, score)) if score > 0.0 && !self.facts[t.0].is_resolved() => Some(t),
            _ => {
                let facts = &self.facts;
                self.root_cursor
                    .next_unresolved(&self.terminals, |t| facts[t.0].is_resolved())
            }
        }?;
        self.leaf_under(terminal)
    }

    /// Descend through composite queue tops to an unresolved entity fact
    pub fn leaf_under(&mut self, from: FactIdx) -> Option<FactIdx> {
        let mut current = from;
        loop {
            match &self.facts[current.0].node {
                FactNode::Entity(e) => return (!e.is_resolved()).then_some(current),
                FactNode::Composite(_) => current = self.current_child(current)?,
            }
        }
    }

    /// Queue top of a composite, falling back to its cursor
    fn current_child(&mut self, idx: FactIdx) -> Option<FactIdx> {
        let (children, top) = match &self.facts[idx.0].node {
            FactNode::Composite(c) if !c.truth.is_set() => (c.children.clone(), c.queue.peek()),
            _ => return None,
        };
        if let Some((child, score)) = top {
            if score > 0.0 && !self.facts[child.0].is_resolved() {
                return Some(child);
            }
        }

        let mut cursor = match &mut self.facts[idx.0].node {
            FactNode::Composite(c) => std::mem::take(&mut c.cursor),
            FactNode::Entity(_) => return None,
        };
        let next = cursor.next_unresolved(&children, |child| self.facts[child.0].is_resolved());
        if let FactNode::Composite(c) = &mut self.facts[idx.0].node {
            c.cursor = cursor;
        }
        next
    }

    /// Activate an entity fact and every fact bound to the same entity
    ///
    /// Each peer keeps its own matcher, so a yes/no answer never becomes the
    /// value of a numeric peer.
    pub fn activate(&mut self, leaf: FactIdx) {
        let Some(asked) = self.facts[leaf.0].as_entity() else {
            return;
        };
        let entity = asked.entity_id().clone();

        let peers: Vec<FactIdx> = self.index.get(&entity).collect();
        for peer in peers {
            if let Some(node) = self.entity_mut(peer) {
                if !node.is_resolved() {
                    node.activate(None);
                }
            }
        }
        debug!("Activated {} ({})", self.facts[leaf.0].id, entity);
    }

    /// Feed one utterance to every unresolved entity fact
    ///
    /// Every fact is deactivated afterwards. Returns the facts that resolved.
    pub fn analyze_all(&mut self, beads: &[Bead]) -> Vec<FactIdx> {
        let mut resolved = Vec::new();
        for (pos, fact) in self.facts.iter_mut().enumerate() {
            let FactNode::Entity(node) = &mut fact.node else {
                continue;
            };
            if node.is_resolved() {
                continue;
            }
            if node.analyze_beads(beads) {
                resolved.push(FactIdx(pos));
            }
            node.deactivate();
        }
        resolved
    }

    /// Ask an entity fact for this turn's utterance
    pub fn respond(&mut self, leaf: FactIdx, beads: Option<&[Bead]>) -> StepResponse {
        match self.entity_mut(leaf) {
            Some(node) => node.respond(beads),
            None => StepResponse::idle(Vec::new()),
        }
    }

    /// Step a fact on its own: composites delegate to their current leaf
    pub fn step(&mut self, idx: FactIdx, input: Option<&str>) -> StepResponse {
        let Some(leaf) = self.leaf_under(idx) else {
            return StepResponse::idle(Vec::new());
        };
        let Some(node) = self.entity_mut(leaf) else {
            return StepResponse::idle(Vec::new());
        };
        let response = node.step(input);
        if self.facts[leaf.0].is_resolved() {
            self.propagate([leaf]);
        }
        response
    }

    /// Recompute everything above the changed facts
    ///
    /// Returns the facts whose truth or confidence changed, in the order they
    /// were recomputed.
    pub fn propagate(&mut self, seeds: impl IntoIterator<Item = FactIdx>) -> Vec<FactIdx> {
        let mut work: BTreeSet<(usize, FactIdx)> = seeds
            .into_iter()
            .map(|idx| (self.facts[idx.0].height, idx))
            .collect();
        let mut visited = HashSet::new();
        let mut changed = Vec::new();

        while let Some((_, idx)) = work.pop_first() {
            if !visited.insert(idx) {
                continue;
            }
            let is_leaf = matches!(self.facts[idx.0].node, FactNode::Entity(_));
            let dirty = is_leaf || self.recompute(idx);
            if !dirty {
                continue;
            }

            changed.push(idx);
            self.refresh_score(idx);
            for &parent in &self.facts[idx.0].parents {
                work.insert((self.facts[parent.0].height, parent));
            }
        }

        debug!("Propagation changed {} facts", changed.len());
        changed
    }

    /// Re-evaluate one composite from its children
    fn recompute(&mut self, idx: FactIdx) -> bool {
        let (operator, children, before) = match &self.facts[idx.0].node {
            FactNode::Composite(c) if !c.truth.is_set() => {
                (c.operator, c.children.clone(), c.confidence)
            }
            _ => return false,
        };

        let truth = operator.evaluate(children.iter().map(|c| self.facts[c.0].truth()));
        let confidence = if truth.is_resolved() {
            1.0
        } else {
            operator.confidence(children.iter().map(|c| self.facts[c.0].confidence()))
        };

        if let FactNode::Composite(c) = &mut self.facts[idx.0].node {
            c.confidence = confidence;
            match truth {
                Truth::True => {
                    c.truth.set(true);
                }
                Truth::False => {
                    c.truth.set(false);
                }
                Truth::Unresolved => {}
            }
        }

        if truth.is_resolved() {
            debug!("{} {} resolved {}", operator, self.facts[idx.0].id, truth);
        }
        if truth == Truth::False {
            self.detach(idx, &children);
        }
        truth.is_resolved() || confidence != before
    }

    /// Drop a dead composite from its children's parent sets
    fn detach(&mut self, idx: FactIdx, children: &[FactIdx]) {
        for &child in children {
            if self.facts[child.0].parents.remove(&idx) {
                self.refresh_score(child);
            }
        }
    }

    /// Push a fact's current score into every queue that ranks it
    fn refresh_score(&mut self, idx: FactIdx) {
        let score = self.score(idx);
        let parents: Vec<FactIdx> = self.facts[idx.0].parents.iter().copied().collect();
        for parent in parents {
            if let FactNode::Composite(c) = &mut self.facts[parent.0].node {
                c.queue.set(idx, score);
            }
        }
        if self.facts[idx.0].rooted {
            self.root_queue.set(idx, score);
        }
    }

    /// Serializable view of every fact
    pub fn snapshot(&self) -> Vec<FactSnapshot> {
        let name = |i: &FactIdx| self.facts[i.0].id.clone();

        self.facts
            .iter()
            .map(|fact| {
                let (kind, children, value, asked) = match &fact.node {
                    FactNode::Entity(e) => ("entity", Vec::new(), e.value().cloned(), e.was_asked()),
                    FactNode::Composite(c) => {
                        ("composite", c.children.iter().map(name).collect(), None, false)
                    }
                };
                FactSnapshot {
                    id: fact.id.clone(),
                    kind,
                    truth: fact.truth(),
                    confidence: fact.confidence(),
                    rooted: fact.rooted,
                    parents: fact.parents.iter().map(name).collect(),
                    children,
                    value,
                    asked,
                }
            })
            .collect()
    }
}
