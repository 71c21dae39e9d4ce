//! Core domain types for knowledge graph documents.
//!
//! Entities are open records: only `id` is mandated, every other field is
//! defined by the schema and carried through the store untouched.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ── Entities ──────────────────────────────────────────────────────

/// A single entity record within a category's collection.
///
/// The `id` is unique within its collection. All other fields live in an
/// open map so schemas can add descriptions, labels, provenance arrays and
/// so on without the core knowing about them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entity {
    pub id: String,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl Entity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: Map::new(),
        }
    }

    /// Builder-style field setter. Attempts to set `id` are ignored.
    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.set(key, value.into());
        self
    }

    /// Parse an entity from an arbitrary JSON object.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Overwrite a single field in place.
    ///
    /// Returns `false` without modifying anything when `key` is `id`; the
    /// identifier cannot be changed once the entity is stored.
    pub fn set(&mut self, key: &str, value: Value) -> bool {
        if key == "id" {
            return false;
        }
        self.fields.insert(key.to_string(), value);
        true
    }

    /// Get a multi-valued field as a mutable array, creating it if absent.
    ///
    /// A `null` becomes an empty array and a scalar becomes a one-element
    /// array, so callers can always append.
    pub fn array_field_mut(&mut self, key: &str) -> Option<&mut Vec<Value>> {
        if key == "id" {
            return None;
        }
        let slot = self
            .fields
            .entry(key.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if !slot.is_array() {
            *slot = match slot.take() {
                Value::Null => Value::Array(Vec::new()),
                scalar => Value::Array(vec![scalar]),
            };
        }
        slot.as_array_mut()
    }
}

// ── Relationships ─────────────────────────────────────────────────

/// How strongly two entities are related.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Strength {
    Weak,
    #[default]
    Moderate,
    Strong,
}

impl fmt::Display for Strength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Weak => "weak",
            Self::Moderate => "moderate",
            Self::Strong => "strong",
        };
        f.write_str(s)
    }
}

impl FromStr for Strength {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "weak" => Ok(Self::Weak),
            "moderate" => Ok(Self::Moderate),
            "strong" => Ok(Self::Strong),
            _ => Err(format!(
                "Invalid strength: {s}. Choose: weak, moderate, strong"
            )),
        }
    }
}

/// A directed, typed edge between two entity ids.
///
/// Identity is the `(from, to, type)` triple; `description` and `strength`
/// are payload and never participate in deduplication.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Relationship {
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub rel_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub strength: Strength,
    /// Fields written by other tools, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Relationship {
    pub fn new(from: impl Into<String>, to: impl Into<String>, rel_type: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            rel_type: rel_type.into(),
            description: String::new(),
            strength: Strength::default(),
            extra: Map::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_strength(mut self, strength: Strength) -> Self {
        self.strength = strength;
        self
    }

    /// The deduplication key for this relationship.
    pub fn key(&self) -> RelationshipKey {
        RelationshipKey {
            from: self.from.clone(),
            to: self.to.clone(),
            rel_type: self.rel_type.clone(),
        }
    }

    /// Whether this relationship has the given `(from, to, type)` triple.
    pub fn matches(&self, from: &str, to: &str, rel_type: &str) -> bool {
        self.from == from && self.to == to && self.rel_type == rel_type
    }
}

/// The `(from, to, type)` identity of a relationship.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelationshipKey {
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub rel_type: String,
}

impl fmt::Display for RelationshipKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -[{}]-> {}", self.from, self.rel_type, self.to)
    }
}

// ── Documents ─────────────────────────────────────────────────────

/// Document-level metadata block.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Metadata {
    pub domain: String,
    pub version: String,
    pub created: NaiveDate,
    pub last_updated: NaiveDate,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Metadata {
    pub fn new(domain: impl Into<String>, version: impl Into<String>, today: NaiveDate) -> Self {
        Self {
            domain: domain.into(),
            version: version.into(),
            created: today,
            last_updated: today,
            extra: Map::new(),
        }
    }
}

/// The persisted unit: metadata, one collection per category, relationships.
///
/// Collections are flattened into the top-level JSON object under their
/// collection names, so the on-disk layout is
/// `{"metadata": {..}, "<collection>": [..], .., "relationships": [..]}`.
/// Any other top-level key lands in `extra` and is written back untouched.
/// `collections` and `extra` never share a key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(from = "RawDocument")]
pub struct GraphDocument {
    pub metadata: Metadata,
    #[serde(flatten)]
    pub collections: BTreeMap<String, Vec<Entity>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    pub relationships: Vec<Relationship>,
}

impl GraphDocument {
    /// An empty document with one empty collection per given name.
    pub fn empty<'a>(
        metadata: Metadata,
        collection_names: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        Self {
            metadata,
            collections: collection_names
                .into_iter()
                .map(|name| (name.to_string(), Vec::new()))
                .collect(),
            extra: Map::new(),
            relationships: Vec::new(),
        }
    }

    /// Require the named keys, when present, to hold entity collections.
    ///
    /// Fails on the first named key whose value is not an array of
    /// entities; keys absent from the document are skipped.
    pub fn claim_collections<'a>(
        &mut self,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), serde_json::Error> {
        claim(&mut self.collections, &mut self.extra, names)
    }
}

/// Top-level shape shared by both document kinds before collections are
/// told apart from other keys.
#[derive(Deserialize)]
struct RawDocument {
    metadata: Metadata,
    relationships: Vec<Relationship>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

impl From<RawDocument> for GraphDocument {
    fn from(raw: RawDocument) -> Self {
        let (collections, extra) = split_collections(raw.rest);
        Self {
            metadata: raw.metadata,
            collections,
            extra,
            relationships: raw.relationships,
        }
    }
}

/// A foreign graph document being merged into a store.
///
/// More lenient than [`GraphDocument`]: metadata is ignored and may be
/// absent, and a missing relationships list means "no relationships".
/// Top-level keys that do not hold entity arrays are kept in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(from = "RawImport")]
pub struct ImportDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(flatten)]
    pub collections: BTreeMap<String, Vec<Entity>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    pub relationships: Vec<Relationship>,
}

impl ImportDocument {
    pub fn with_collection(mut self, name: &str, entities: Vec<Entity>) -> Self {
        self.extra.remove(name);
        self.collections.insert(name.to_string(), entities);
        self
    }

    pub fn with_relationship(mut self, relationship: Relationship) -> Self {
        self.relationships.push(relationship);
        self
    }

    /// Insert an arbitrary top-level value, replacing any collection of
    /// the same name.
    pub fn with_extra(mut self, key: &str, value: Value) -> Self {
        self.collections.remove(key);
        self.extra.insert(key.to_string(), value);
        self
    }

    /// See [`GraphDocument::claim_collections`].
    pub fn claim_collections<'a>(
        &mut self,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), serde_json::Error> {
        claim(&mut self.collections, &mut self.extra, names)
    }
}

#[derive(Deserialize)]
struct RawImport {
    #[serde(default)]
    metadata: Option<Value>,
    #[serde(default)]
    relationships: Vec<Relationship>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

impl From<RawImport> for ImportDocument {
    fn from(raw: RawImport) -> Self {
        let (collections, extra) = split_collections(raw.rest);
        Self {
            metadata: raw.metadata,
            collections,
            extra,
            relationships: raw.relationships,
        }
    }
}

impl From<GraphDocument> for ImportDocument {
    fn from(doc: GraphDocument) -> Self {
        Self {
            metadata: serde_json::to_value(&doc.metadata).ok(),
            collections: doc.collections,
            extra: doc.extra,
            relationships: doc.relationships,
        }
    }
}

/// Sort top-level keys into entity collections and everything else.
///
/// A key is a collection when its value is an array that parses as
/// entities. An empty array counts.
fn split_collections(
    rest: Map<String, Value>,
) -> (BTreeMap<String, Vec<Entity>>, Map<String, Value>) {
    let mut collections = BTreeMap::new();
    let mut extra = Map::new();
    for (key, value) in rest {
        if !value.is_array() {
            extra.insert(key, value);
            continue;
        }
        match serde_json::from_value::<Vec<Entity>>(value.clone()) {
            Ok(entities) => {
                collections.insert(key, entities);
            }
            Err(_) => {
                extra.insert(key, value);
            }
        }
    }
    (collections, extra)
}

fn claim<'a>(
    collections: &mut BTreeMap<String, Vec<Entity>>,
    extra: &mut Map<String, Value>,
    names: impl IntoIterator<Item = &'a str>,
) -> Result<(), serde_json::Error> {
    for name in names {
        if let Some(value) = extra.get(name) {
            let entities = serde_json::from_value(value.clone())?;
            extra.remove(name);
            collections.insert(name.to_string(), entities);
        }
    }
    Ok(())
}
