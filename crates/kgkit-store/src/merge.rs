//! Merge engine: fold a foreign graph document into the store.
//!
//! Entities are deduplicated by id within each collection and
//! relationships by their `(from, to, type)` triple. When an incoming
//! entity collides with an existing one, only its provenance fields are
//! combined (set-union, first-seen order); every other field of the
//! existing entity wins. Merging the same document twice is a no-op the
//! second time.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use serde::Serialize;

use kgkit_core::{Entity, ImportDocument, KgkitError, RelationshipKey, Result, SchemaCatalog};
use serde_json::Value;

use crate::store::{read_json, GraphStore};

/// Per-collection outcome of a merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CollectionMergeStats {
    /// Entities whose id was new to the collection.
    pub added: usize,
    /// Entities that collided with an existing id and had provenance combined.
    pub merged: usize,
}

/// Summary of a merge, for reporting only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    /// Keyed by collection name; only collections present in the incoming
    /// document appear.
    pub collections: BTreeMap<String, CollectionMergeStats>,
    pub relationships_added: usize,
}

impl MergeStats {
    pub fn total_added(&self) -> usize {
        self.collections.values().map(|c| c.added).sum::<usize>() + self.relationships_added
    }

    pub fn total_merged(&self) -> usize {
        self.collections.values().map(|c| c.merged).sum()
    }
}

impl<S: SchemaCatalog> GraphStore<S> {
    /// Merge an incoming document into the store.
    ///
    /// Only collections declared by the schema are considered; anything
    /// else in the incoming document is ignored with a warning. A declared
    /// collection that does not hold entities fails the whole merge before
    /// the store is touched.
    pub fn merge(&mut self, incoming: &ImportDocument) -> Result<MergeStats> {
        let mut stats = MergeStats::default();
        let provenance = self.schema.provenance_fields();
        let mut mapped = HashSet::new();
        let mut pending: Vec<(&str, Cow<'_, [Entity]>)> = Vec::new();

        for category in self.schema.declared_categories() {
            let name = self.schema.collection_name(category)?;
            mapped.insert(name);

            if let Some(entities) = incoming.collections.get(name) {
                pending.push((name, Cow::Borrowed(entities.as_slice())));
            } else if let Some(value) = incoming.extra.get(name) {
                let entities: Vec<Entity> = serde_json::from_value(value.clone())?;
                pending.push((name, Cow::Owned(entities)));
            }
        }

        for (name, incoming_entities) in pending {
            let collection = self.document.collections.entry(name.to_string()).or_default();
            let counts = merge_collection(collection, &incoming_entities, &provenance);

            tracing::debug!(
                collection = name,
                added = counts.added,
                merged = counts.merged,
                "Collection merged"
            );
            stats.collections.insert(name.to_string(), counts);
        }

        for name in incoming.collections.keys().chain(incoming.extra.keys()) {
            if !mapped.contains(name.as_str()) {
                tracing::warn!(collection = %name, "Ignoring collection not declared by schema");
            }
        }

        let mut existing: HashSet<RelationshipKey> = self
            .document
            .relationships
            .iter()
            .map(|r| r.key())
            .collect();
        for relationship in &incoming.relationships {
            if existing.insert(relationship.key()) {
                self.document.relationships.push(relationship.clone());
                stats.relationships_added += 1;
            }
        }

        tracing::info!(
            added = stats.total_added(),
            merged = stats.total_merged(),
            relationships_added = stats.relationships_added,
            "Merge complete"
        );

        Ok(stats)
    }

    /// Read a JSON document from disk and merge it.
    ///
    /// Relative paths are resolved through the schema.
    pub fn merge_from_file(&mut self, path: impl AsRef<Path>) -> Result<MergeStats> {
        let path = self.schema.resolve_path(path.as_ref());
        let mut incoming: ImportDocument = read_json(&path)?;
        incoming
            .claim_collections(self.schema.collection_names())
            .map_err(|e| KgkitError::format(&path, e))?;
        tracing::info!(path = %path.display(), "Merging graph document");
        self.merge(&incoming)
    }
}

/// Merge incoming entities into one collection.
///
/// Entities added earlier in the same pass are indexed too, so an incoming
/// document that repeats an id still yields a single entity.
fn merge_collection(
    collection: &mut Vec<Entity>,
    incoming: &[Entity],
    provenance: &[&str],
) -> CollectionMergeStats {
    let mut counts = CollectionMergeStats::default();
    let mut index: HashMap<String, usize> = collection
        .iter()
        .enumerate()
        .map(|(i, e)| (e.id.clone(), i))
        .collect();

    for entity in incoming {
        match index.get(&entity.id) {
            Some(&i) => {
                merge_provenance(&mut collection[i], entity, provenance);
                counts.merged += 1;
            }
            None => {
                index.insert(entity.id.clone(), collection.len());
                collection.push(normalized(entity, provenance));
                counts.added += 1;
            }
        }
    }

    counts
}

/// A copy of `entity` with every provenance field in array form, matching
/// what [`merge_provenance`] leaves behind on a collision.
fn normalized(entity: &Entity, provenance: &[&str]) -> Entity {
    let mut entity = entity.clone();
    for field in provenance {
        if entity.get(field).is_some_and(|v| !v.is_array()) {
            entity.array_field_mut(field);
        }
    }
    entity
}

/// Union each provenance field of `incoming` into `existing`.
///
/// A scalar incoming value counts as a single attestation.
pub fn merge_provenance(existing: &mut Entity, incoming: &Entity, fields: &[&str]) {
    for field in fields {
        let values: Vec<&Value> = match incoming.get(field) {
            None | Some(Value::Null) => continue,
            Some(Value::Array(items)) => items.iter().collect(),
            Some(scalar) => vec![scalar],
        };

        let Some(target) = existing.array_field_mut(field) else {
            continue;
        };
        for value in values {
            if !target.contains(value) {
                target.push(value.clone());
            }
        }
    }
}
