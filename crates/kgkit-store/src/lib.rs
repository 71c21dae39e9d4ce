//! kgkit-store: The graph store and merge engine for the knowledge graph kit.
//!
//! Owns one JSON graph document in memory, enforces id uniqueness per
//! collection and `(from, to, type)` uniqueness for relationships, merges
//! foreign documents with provenance-preserving set-union, and reports
//! dangling relationship endpoints.

pub mod merge;
pub mod store;
pub mod validate;

pub use merge::{CollectionMergeStats, MergeStats};
pub use store::{GraphStore, RELATIONSHIPS_KEY};
pub use validate::{Endpoint, ValidationIssue};
