//! Zobot Domain Layer
//!
//! The vocabulary shared by every other zobot crate: the beads an utterance is
//! parsed into, the identity of the real-world entities they mention, the typed
//! values a fact can take, and the parser boundary.
//!
//! ## Key Concepts
//!
//! - **Bead**: one typed semantic token of a parsed utterance
//! - **Entity Identity**: the `(class, subclass, id)` triple that recognizes
//!   "the same thing" across a protocol
//! - **Fact Value**: the raw typed value a matcher extracts from beads
//! - **Bead Parser**: the external text-to-beads collaborator
//!
//! ## Architecture
//!
//! This crate holds data and trait definitions only. The only dependency is
//! `serde` derive support, because beads are produced by a JSON service.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bead;
pub mod entity;
pub mod traits;
pub mod value;

// Re-exports for convenience
pub use bead::{Bead, RangeBead};
pub use entity::{Entity, EntityId};
pub use traits::{BeadParser, ParseError, SharedParser};
pub use value::FactValue;
