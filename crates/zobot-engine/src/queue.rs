//! Keyed max-priority queue with change-key
//!
//! Composite facts rank their children by a score that moves after every
//! answer, so the queue has to support updating the score of a key already in
//! it. Implemented as a binary heap plus a key-to-slot map.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug, Clone, Copy)]
struct Entry<K> {
    key: K,
    score: f64,
    // insertion order breaks ties: earlier wins
    order: usize,
}

impl<K> Entry<K> {
    fn rank(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.order.cmp(&self.order))
    }
}

/// Max-priority queue over keys with mutable scores
#[derive(Debug, Clone)]
pub struct ChildQueue<K> {
    heap: Vec<Entry<K>>,
    slots: HashMap<K, usize>,
    next_order: usize,
}

impl<K> Default for ChildQueue<K> {
    fn default() -> Self {
        Self {
            heap: Vec::new(),
            slots: HashMap::new(),
            next_order: 0,
        }
    }
}

impl<K: Copy + Eq + Hash> ChildQueue<K> {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// True if the queue holds no keys
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Highest ranked key
    pub fn top(&self) -> Option<K> {
        self.heap.first().map(|e| e.key)
    }

    /// Highest ranked key with its score
    pub fn peek(&self) -> Option<(K, f64)> {
        self.heap.first().map(|e| (e.key, e.score))
    }

    /// Current score of a key
    pub fn score(&self, key: K) -> Option<f64> {
        self.slots.get(&key).map(|&slot| self.heap[slot].score)
    }

    /// True if the key is queued
    pub fn contains(&self, key: K) -> bool {
        self.slots.contains_key(&key)
    }

    /// Insert a key, or move it to its new score if already queued
    pub fn set(&mut self, key: K, score: f64) {
        match self.slots.get(&key).copied() {
            Some(slot) => {
                let old = self.heap[slot].score;
                self.heap[slot].score = score;
                match score.total_cmp(&old) {
                    Ordering::Greater => self.sift_up(slot),
                    Ordering::Less => self.sift_down(slot),
                    Ordering::Equal => {}
                }
            }
            None => {
                let order = self.next_order;
                self.next_order += 1;
                self.heap.push(Entry { key, score, order });
                let slot = self.heap.len() - 1;
                self.slots.insert(key, slot);
                self.sift_up(slot);
            }
        }
    }

    /// Remove a key, returning its score
    pub fn remove(&mut self, key: K) -> Option<f64> {
        let slot = self.slots.remove(&key)?;
        let removed = self.heap.swap_remove(slot);

        // the former last entry now sits in `slot` and may be out of place
        if slot < self.heap.len() {
            self.slots.insert(self.heap[slot].key, slot);
            self.sift_up(slot);
            self.sift_down(slot);
        }
        Some(removed.score)
    }

    /// Keys in queue order, highest first
    pub fn ranked(&self) -> Vec<K> {
        let mut entries = self.heap.clone();
        entries.sort_by(|a, b| b.rank(a));
        entries.into_iter().map(|e| e.key).collect()
    }

    fn swap_slots(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        self.slots.insert(self.heap[a].key, a);
        self.slots.insert(self.heap[b].key, b);
    }

    fn sift_up(&mut self, mut slot: usize) {
        while slot > 0 {
            let parent = (slot - 1) / 2;
            if self.heap[slot].rank(&self.heap[parent]) != Ordering::Greater {
                break;
            }
            self.swap_slots(slot, parent);
            slot = parent;
        }
    }

    fn sift_down(&mut self, mut slot: usize) {
        loop {
            let left = 2 * slot + 1;
            let right = left + 1;
            let mut best = slot;

            if left < self.heap.len() && self.heap[left].rank(&self.heap[best]) == Ordering::Greater {
                best = left;
            }
            if right < self.heap.len() && self.heap[right].rank(&self.heap[best]) == Ordering::Greater
            {
                best = right;
            }
            if best == slot {
                break;
            }
            self.swap_slots(slot, best);
            slot = best;
        }
    }
}
