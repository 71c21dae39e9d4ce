//! Referential integrity checks.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use serde::Serialize;

use kgkit_core::{RelationshipKey, SchemaCatalog};

use crate::store::GraphStore;

/// Which end of a relationship failed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Endpoint {
    From,
    To,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::From => f.write_str("from"),
            Self::To => f.write_str("to"),
        }
    }
}

/// A relationship endpoint that names no known entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub endpoint: Endpoint,
    /// The unresolved entity id.
    pub id: String,
    pub relationship: RelationshipKey,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Relationship {} references unknown '{}' ID: {}",
            self.relationship, self.endpoint, self.id
        )
    }
}

impl<S: SchemaCatalog> GraphStore<S> {
    /// Report every relationship endpoint that does not resolve to an entity
    /// in any declared collection.
    ///
    /// One issue per dangling endpoint, in relationship order. An empty
    /// result means the graph is referentially closed.
    pub fn validate(&self) -> Vec<ValidationIssue> {
        let known: HashSet<&str> = self
            .schema
            .collection_names()
            .into_iter()
            .filter_map(|name| self.document.collections.get(name))
            .flatten()
            .map(|e| e.id.as_str())
            .collect();

        let mut issues = Vec::new();
        for rel in &self.document.relationships {
            for (endpoint, id) in [(Endpoint::From, &rel.from), (Endpoint::To, &rel.to)] {
                if !known.contains(id.as_str()) {
                    issues.push(ValidationIssue {
                        endpoint,
                        id: id.clone(),
                        relationship: rel.key(),
                    });
                }
            }
        }

        if !issues.is_empty() {
            tracing::debug!(issues = issues.len(), "Dangling relationship endpoints found");
        }
        issues
    }

    /// Relationship types in use that the schema does not permit, sorted.
    ///
    /// Always empty when the schema declares no relationship types.
    pub fn undeclared_relationship_types(&self) -> Vec<String> {
        let permitted = self.schema.relationship_types();
        if permitted.is_empty() {
            return Vec::new();
        }

        self.document
            .relationships
            .iter()
            .map(|r| r.rel_type.as_str())
            .filter(|t| !permitted.iter().any(|p| p == t))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(String::from)
            .collect()
    }
}
