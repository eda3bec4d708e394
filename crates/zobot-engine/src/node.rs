//! Graph node building blocks
//!
//! Every fact node, static or live, is assembled from the same pieces: a value
//! slot that can be written once, an explicit three-valued truth, an ordered
//! child list walked by a monotonic cursor, and a registry that maps declared
//! kind names to constructors.

use serde::Serialize;
use std::fmt;
use tracing::warn;

/// Three-valued truth of a fact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Truth {
    /// Not established yet
    #[default]
    Unresolved,
    /// Established true
    True,
    /// Established false
    False,
}

impl Truth {
    /// True unless unresolved
    pub fn is_resolved(self) -> bool {
        self != Truth::Unresolved
    }
}

impl From<bool> for Truth {
    fn from(b: bool) -> Self {
        if b {
            Truth::True
        } else {
            Truth::False
        }
    }
}

impl From<Option<bool>> for Truth {
    fn from(b: Option<bool>) -> Self {
        b.map(Truth::from).unwrap_or(Truth::Unresolved)
    }
}

impl fmt::Display for Truth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Truth::Unresolved => "unresolved",
            Truth::True => "true",
            Truth::False => "false",
        };
        write!(f, "{}", s)
    }
}

/// Write-once value container
///
/// A set slot never changes again. The array flag records that the stored
/// value is a collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueSlot<T> {
    value: Option<T>,
    is_array: bool,
}

impl<T> Default for ValueSlot<T> {
    fn default() -> Self {
        Self {
            value: None,
            is_array: false,
        }
    }
}

impl<T: PartialEq + fmt::Debug> ValueSlot<T> {
    /// Create an empty slot
    pub fn new() -> Self {
        Self::default()
    }

    /// True once a value has been stored
    pub fn is_set(&self) -> bool {
        self.value.is_some()
    }

    /// Stored value, if any
    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// True if the stored value is a collection
    pub fn is_array(&self) -> bool {
        self.is_array
    }

    /// Store a value
    ///
    /// Returns `true` if the slot changed. Writing a different value into a
    /// set slot is refused and logged.
    pub fn set(&mut self, value: T) -> bool {
        match &self.value {
            None => {
                self.value = Some(value);
                true
            }
            Some(current) if *current == value => false,
            Some(current) => {
                warn!("Refusing to overwrite {:?} with {:?}", current, value);
                false
            }
        }
    }

    /// Store a collection value and raise the array flag
    pub fn set_array(&mut self, value: T) -> bool {
        let changed = self.set(value);
        if changed {
            self.is_array = true;
        }
        changed
    }
}

impl ValueSlot<bool> {
    /// Truth view of a boolean slot
    pub fn truth(&self) -> Truth {
        Truth::from(self.value)
    }
}

/// Cursor over an ordered child list that only moves forward
///
/// It skips children the caller reports as resolved; a child behind the
/// cursor is never revisited.
#[derive(Debug, Clone, Default)]
pub struct ChildCursor {
    pos: usize,
}

impl ChildCursor {
    /// Position of the cursor
    pub fn position(&self) -> usize {
        self.pos
    }

    /// First unresolved child at or after the cursor
    pub fn next_unresolved<C: Copy>(
        &mut self,
        children: &[C],
        is_resolved: impl Fn(C) -> bool,
    ) -> Option<C> {
        while let Some(&child) = children.get(self.pos) {
            if !is_resolved(child) {
                return Some(child);
            }
            self.pos += 1;
        }
        None
    }
}

/// Constructor signature stored in a [`NodeRegistry`]
pub type Constructor<I, T, E> = fn(&I) -> Result<T, E>;

/// Table from declared kind name to constructor
///
/// The set of kinds is closed and known at compile time; a registry is a
/// static slice of `(name, constructor)` pairs.
pub struct NodeRegistry<I: 'static, T: 'static, E: 'static> {
    entries: &'static [(&'static str, Constructor<I, T, E>)],
}

impl<I: 'static, T: 'static, E: 'static> NodeRegistry<I, T, E> {
    /// Wrap a static constructor table
    pub const fn new(entries: &'static [(&'static str, Constructor<I, T, E>)]) -> Self {
        Self { entries }
    }

    /// Constructor registered under `name`
    pub fn lookup(&self, name: &str) -> Option<Constructor<I, T, E>> {
        self.entries
            .iter()
            .find(|(kind, _)| *kind == name)
            .map(|(_, ctor)| *ctor)
    }

    /// Registered kind names
    pub fn kinds(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(kind, _)| *kind)
    }
}
