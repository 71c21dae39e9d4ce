//! kgkit-core: Shared types, schema configuration, and error handling for the knowledge graph kit.
//!
//! This crate provides the foundational types used by the store and the CLI:
//! - Entity and relationship records for the graph document
//! - The persisted graph document and the import document consumed by merges
//! - The schema collaborator (category to collection lookup) and its YAML loader
//! - Common error types

pub mod config;
pub mod error;
pub mod schema;
pub mod types;

pub use error::{KgkitError, Result};
pub use schema::{Schema, SchemaCatalog};
pub use types::{
    Entity, GraphDocument, ImportDocument, Metadata, Relationship, RelationshipKey, Strength,
};
