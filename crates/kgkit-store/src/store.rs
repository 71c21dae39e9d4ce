//! Graph store: the authoritative in-memory graph plus JSON persistence.
//!
//! The document is loaded once, mutated in memory, and written back only
//! on an explicit [`GraphStore::save`]. There is no autosave.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde_json::{Map, Value};

use kgkit_core::schema::RESERVED_KEYS;
use kgkit_core::{
    Entity, GraphDocument, KgkitError, Metadata, Relationship, Result, Schema, SchemaCatalog,
};

/// Key under which [`GraphStore::stats`] reports the relationship count.
pub const RELATIONSHIPS_KEY: &str = "relationships";

/// Owns one graph document and the schema that shapes it.
///
/// The store assumes a single writer per document file. Callers that share
/// a store between threads must serialize load-mutate-save sequences
/// themselves.
#[derive(Debug)]
pub struct GraphStore<S = Schema> {
    pub(crate) schema: S,
    pub(crate) path: PathBuf,
    pub(crate) document: GraphDocument,
}

impl GraphStore<Schema> {
    /// Load (or initialize) the document at the schema's configured path.
    pub fn open(schema: Schema) -> Result<Self> {
        let path = schema.entities_file_path();
        Self::load(schema, path)
    }
}

impl<S: SchemaCatalog> GraphStore<S> {
    /// Load the document at `path`, or synthesize an empty one if the file
    /// does not exist.
    ///
    /// An existing document is taken verbatim; it is not reshaped to match
    /// the schema. Collections the schema declares must hold entity arrays;
    /// any other top-level key is carried through as is.
    ///
    /// Fails with `Config` if a declared collection would shadow a reserved
    /// document key.
    pub fn load(schema: S, path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        check_reserved(&schema)?;

        let document = match fs::read_to_string(&path) {
            Ok(json) => {
                let mut document: GraphDocument =
                    serde_json::from_str(&json).map_err(|e| KgkitError::format(&path, e))?;
                document
                    .claim_collections(schema.collection_names())
                    .map_err(|e| KgkitError::format(&path, e))?;
                tracing::info!(
                    path = %path.display(),
                    collections = document.collections.len(),
                    relationships = document.relationships.len(),
                    "Graph document loaded"
                );
                document
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No graph document found, initializing");
                empty_document(&schema)
            }
            Err(e) => return Err(KgkitError::io(&path, e)),
        };

        Ok(Self {
            schema,
            path,
            document,
        })
    }

    /// Persist the document to the path it was loaded from.
    pub fn save(&mut self) -> Result<()> {
        let path = self.path.clone();
        self.write_document(&path)
    }

    /// Persist the document to `path` and make it the store's new home.
    pub fn save_as(&mut self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        self.write_document(&path)?;
        self.path = path;
        Ok(())
    }

    /// Refresh `last_updated` and write the document atomically.
    ///
    /// The timestamp is rolled back if the write fails.
    fn write_document(&mut self, path: &Path) -> Result<()> {
        let previous = self.document.metadata.last_updated;
        self.document.metadata.last_updated = Local::now().date_naive();

        let result = write_json_atomic(path, &self.document);
        if result.is_err() {
            self.document.metadata.last_updated = previous;
        }
        result?;

        tracing::info!(
            path = %path.display(),
            relationships = self.document.relationships.len(),
            "Graph document saved"
        );
        Ok(())
    }

    /// Append an entity to a category's collection.
    ///
    /// Returns `Ok(false)` and leaves the collection untouched if an entity
    /// with the same id already exists there.
    pub fn add_entity(&mut self, category: &str, entity: Entity) -> Result<bool> {
        let name = self.schema.collection_name(category)?;
        let collection = self.document.collections.entry(name.to_string()).or_default();

        if collection.iter().any(|e| e.id == entity.id) {
            tracing::debug!(category, id = %entity.id, "Entity already exists, skipping");
            return Ok(false);
        }

        tracing::debug!(category, id = %entity.id, "Entity added");
        collection.push(entity);
        Ok(true)
    }

    /// Shallow-merge `updates` into an existing entity.
    ///
    /// Each key overwrites in place; keys not present are untouched. An `id`
    /// key is ignored. Returns `Ok(false)` if no entity has that id.
    pub fn update_entity(
        &mut self,
        category: &str,
        id: &str,
        updates: Map<String, Value>,
    ) -> Result<bool> {
        let name = self.schema.collection_name(category)?;
        let Some(entity) = self
            .document
            .collections
            .get_mut(name)
            .and_then(|c| c.iter_mut().find(|e| e.id == id))
        else {
            return Ok(false);
        };

        for (key, value) in updates {
            if !entity.set(&key, value) {
                tracing::warn!(category, id, "Ignoring attempt to change entity id");
            }
        }

        tracing::debug!(category, id, "Entity updated");
        Ok(true)
    }

    /// Look up one entity by id within a category.
    pub fn get_entity(&self, category: &str, id: &str) -> Result<Option<&Entity>> {
        Ok(self.collection(category)?.iter().find(|e| e.id == id))
    }

    /// All entities of a category, in insertion order.
    pub fn collection(&self, category: &str) -> Result<&[Entity]> {
        let name = self.schema.collection_name(category)?;
        Ok(self
            .document
            .collections
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or_default())
    }

    /// Append a relationship unless its `(from, to, type)` triple is
    /// already present.
    ///
    /// Endpoints are not checked here; see [`GraphStore::validate`].
    pub fn add_relationship(&mut self, relationship: Relationship) -> bool {
        let exists = self
            .document
            .relationships
            .iter()
            .any(|r| r.matches(&relationship.from, &relationship.to, &relationship.rel_type));
        if exists {
            tracing::debug!(key = %relationship.key(), "Relationship already exists, skipping");
            return false;
        }

        tracing::debug!(key = %relationship.key(), "Relationship added");
        self.document.relationships.push(relationship);
        true
    }

    /// All relationships, in insertion order.
    pub fn relationships(&self) -> &[Relationship] {
        &self.document.relationships
    }

    /// Entity count per declared collection, plus the relationship count.
    pub fn stats(&self) -> BTreeMap<String, usize> {
        let mut stats: BTreeMap<String, usize> = self
            .schema
            .collection_names()
            .into_iter()
            .map(|name| {
                let count = self.document.collections.get(name).map_or(0, Vec::len);
                (name.to_string(), count)
            })
            .collect();
        stats.insert(
            RELATIONSHIPS_KEY.to_string(),
            self.document.relationships.len(),
        );
        stats
    }

    /// The full in-memory document.
    pub fn document(&self) -> &GraphDocument {
        &self.document
    }

    /// The schema this store was opened with.
    pub fn schema(&self) -> &S {
        &self.schema
    }

    /// Where [`GraphStore::save`] writes.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn check_reserved(schema: &impl SchemaCatalog) -> Result<()> {
    match schema
        .collection_names()
        .into_iter()
        .find(|name| RESERVED_KEYS.contains(name))
    {
        Some(name) => Err(KgkitError::Config(format!(
            "collection name '{name}' is a reserved document key"
        ))),
        None => Ok(()),
    }
}

/// A fresh document: one empty collection per category, stamped today.
fn empty_document(schema: &impl SchemaCatalog) -> GraphDocument {
    let metadata = Metadata::new(
        schema.domain(),
        schema.schema_version(),
        Local::now().date_naive(),
    );
    GraphDocument::empty(metadata, schema.collection_names())
}

/// Read and parse a JSON file, mapping failures onto the error taxonomy.
pub(crate) fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let json = fs::read_to_string(path).map_err(|e| KgkitError::io(path, e))?;
    serde_json::from_str(&json).map_err(|e| KgkitError::format(path, e))
}

/// Write pretty JSON to a sibling temp file, then rename over `path`.
fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| KgkitError::io(parent, e))?;
    }

    let mut json = serde_json::to_string_pretty(value)?;
    json.push('\n');

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, json).map_err(|e| KgkitError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        KgkitError::io(path, e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_schema() -> Schema {
        Schema::new("systems", "1.0")
            .with_category("primary", "components")
            .with_category("contributors", "teams")
            .with_category("sources", "documents")
    }

    fn empty_store() -> (tempfile::TempDir, GraphStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = GraphStore::load(test_schema(), dir.path().join("entities.json")).unwrap();
        (dir, store)
    }

    fn updates(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn load_initializes_empty_document() {
        let (_dir, store) = empty_store();
        let doc = store.document();

        assert_eq!(doc.metadata.domain, "systems");
        assert_eq!(doc.metadata.version, "1.0");
        assert_eq!(doc.metadata.created, doc.metadata.last_updated);
        assert_eq!(doc.collections.len(), 3);
        assert!(doc.collections.values().all(Vec::is_empty));
        assert!(doc.relationships.is_empty());
    }

    #[test]
    fn load_does_not_write_to_disk() {
        let (dir, _store) = empty_store();
        assert!(!dir.path().join("entities.json").exists());
    }

    #[test]
    fn load_rejects_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entities.json");
        fs::write(&path, "{ not json").unwrap();

        let err = GraphStore::load(test_schema(), &path).unwrap_err();
        assert!(matches!(err, KgkitError::Format { .. }));
    }

    #[test]
    fn load_rejects_missing_top_level_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entities.json");
        fs::write(&path, r#"{"components": []}"#).unwrap();

        let err = GraphStore::load(test_schema(), &path).unwrap_err();
        assert!(matches!(err, KgkitError::Format { .. }));
    }

    #[test]
    fn load_reports_unreadable_path_as_io() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be read as a file.
        let err = GraphStore::load(test_schema(), dir.path()).unwrap_err();
        assert!(matches!(err, KgkitError::Io { .. }));
    }

    #[test]
    fn add_entity_rejects_duplicate_id() {
        let (_dir, mut store) = empty_store();

        assert!(store.add_entity("primary", Entity::new("a")).unwrap());
        let dup = Entity::new("a").with_field("label", "dup");
        assert!(!store.add_entity("primary", dup).unwrap());

        let components = store.collection("primary").unwrap();
        assert_eq!(components.len(), 1);
        assert!(components[0].get("label").is_none());
    }

    #[test]
    fn same_id_allowed_in_different_categories() {
        let (_dir, mut store) = empty_store();
        assert!(store.add_entity("primary", Entity::new("x")).unwrap());
        assert!(store.add_entity("sources", Entity::new("x")).unwrap());
    }

    #[test]
    fn add_entity_unknown_category() {
        let (_dir, mut store) = empty_store();
        let err = store.add_entity("widgets", Entity::new("a")).unwrap_err();
        assert!(matches!(err, KgkitError::UnknownCategory(c) if c == "widgets"));
    }

    #[test]
    fn update_entity_shallow_merges() {
        let (_dir, mut store) = empty_store();
        let entity = Entity::new("auth-service")
            .with_field("status", "active")
            .with_field("version", "v2.1.0");
        store.add_entity("primary", entity).unwrap();

        let changed = store
            .update_entity(
                "primary",
                "auth-service",
                updates(json!({"status": "deprecated", "owner": "platform"})),
            )
            .unwrap();
        assert!(changed);

        let entity = store.get_entity("primary", "auth-service").unwrap().unwrap();
        assert_eq!(entity.get("status"), Some(&json!("deprecated")));
        assert_eq!(entity.get("owner"), Some(&json!("platform")));
        assert_eq!(entity.get("version"), Some(&json!("v2.1.0")));
    }

    #[test]
    fn update_entity_keeps_id() {
        let (_dir, mut store) = empty_store();
        store.add_entity("primary", Entity::new("a")).unwrap();

        assert!(store
            .update_entity("primary", "a", updates(json!({"id": "b", "label": "A"})))
            .unwrap());
        assert!(store.get_entity("primary", "a").unwrap().is_some());
        assert!(store.get_entity("primary", "b").unwrap().is_none());
    }

    #[test]
    fn update_missing_entity_returns_false() {
        let (_dir, mut store) = empty_store();
        assert!(!store
            .update_entity("primary", "ghost", updates(json!({"label": "x"})))
            .unwrap());
    }

    #[test]
    fn get_entity_not_found() {
        let (_dir, store) = empty_store();
        assert!(store.get_entity("primary", "nope").unwrap().is_none());
        assert!(store.get_entity("widgets", "nope").is_err());
    }

    #[test]
    fn add_relationship_is_idempotent() {
        let (_dir, mut store) = empty_store();

        assert!(store.add_relationship(Relationship::new("a", "b", "depends-on")));
        assert!(!store.add_relationship(
            Relationship::new("a", "b", "depends-on").with_description("extra")
        ));

        assert_eq!(store.relationships().len(), 1);
        assert_eq!(store.relationships()[0].description, "");
    }

    #[test]
    fn add_relationship_distinguishes_type_and_direction() {
        let (_dir, mut store) = empty_store();
        assert!(store.add_relationship(Relationship::new("a", "b", "uses")));
        assert!(store.add_relationship(Relationship::new("a", "b", "owns")));
        assert!(store.add_relationship(Relationship::new("b", "a", "uses")));
        assert_eq!(store.relationships().len(), 3);
    }

    #[test]
    fn stats_counts_collections_and_relationships() {
        let (_dir, mut store) = empty_store();
        store.add_entity("primary", Entity::new("a")).unwrap();
        store.add_entity("primary", Entity::new("b")).unwrap();
        store.add_entity("contributors", Entity::new("team-1")).unwrap();
        store.add_relationship(Relationship::new("team-1", "a", "owns"));

        let stats = store.stats();
        assert_eq!(stats["components"], 2);
        assert_eq!(stats["teams"], 1);
        assert_eq!(stats["documents"], 0);
        assert_eq!(stats[RELATIONSHIPS_KEY], 1);
    }

    #[test]
    fn save_creates_parent_dirs_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("data").join("entities.json");
        let mut store = GraphStore::load(test_schema(), &path).unwrap();
        store
            .add_entity("primary", Entity::new("naïve-café").with_field("label", "Café"))
            .unwrap();
        store.save().unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("naïve-café"), "UTF-8 written unescaped");
        assert!(raw.contains("\n  \"metadata\""), "pretty printed");
        assert!(!path.with_extension("json.tmp").exists());

        let reloaded = GraphStore::load(test_schema(), &path).unwrap();
        assert_eq!(reloaded.document(), store.document());
    }

    #[test]
    fn save_refreshes_last_updated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entities.json");
        fs::write(
            &path,
            json!({
                "metadata": {
                    "domain": "systems", "version": "1.0",
                    "created": "2020-01-01", "last_updated": "2020-01-01"
                },
                "components": [],
                "relationships": []
            })
            .to_string(),
        )
        .unwrap();

        let mut store = GraphStore::load(test_schema(), &path).unwrap();
        store.save().unwrap();

        let today = Local::now().date_naive();
        assert_eq!(store.document().metadata.last_updated, today);
        assert_eq!(
            store.document().metadata.created.to_string(),
            "2020-01-01"
        );
    }

    #[test]
    fn save_to_unwritable_path_fails_with_io() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "file, not a directory").unwrap();

        let mut store = GraphStore::load(test_schema(), blocker.join("entities.json")).unwrap();
        let before = store.document().metadata.last_updated;
        let err = store.save().unwrap_err();

        assert!(matches!(err, KgkitError::Io { .. }));
        assert_eq!(store.document().metadata.last_updated, before);
    }

    #[test]
    fn save_as_moves_store_home() {
        let (dir, mut store) = empty_store();
        let other = dir.path().join("copy.json");
        store.save_as(&other).unwrap();
        assert_eq!(store.path(), other.as_path());
        assert!(other.exists());
    }

    #[test]
    fn load_keeps_stray_top_level_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entities.json");
        fs::write(
            &path,
            json!({
                "metadata": {
                    "domain": "systems", "version": "1.0",
                    "created": "2024-01-01", "last_updated": "2024-01-01"
                },
                "components": [],
                "notes": "hand-edited",
                "relationships": []
            })
            .to_string(),
        )
        .unwrap();

        let mut store = GraphStore::load(test_schema(), &path).unwrap();
        assert_eq!(store.document().extra["notes"], "hand-edited");
        store.add_entity("primary", Entity::new("a")).unwrap();
        store.save().unwrap();

        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["notes"], "hand-edited");
        assert_eq!(raw["components"][0]["id"], "a");
    }

    #[test]
    fn load_rejects_declared_collection_that_is_not_entities() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entities.json");
        fs::write(
            &path,
            json!({
                "metadata": {
                    "domain": "systems", "version": "1.0",
                    "created": "2024-01-01", "last_updated": "2024-01-01"
                },
                "components": "not a list",
                "relationships": []
            })
            .to_string(),
        )
        .unwrap();

        let err = GraphStore::load(test_schema(), &path).unwrap_err();
        assert!(matches!(err, KgkitError::Format { .. }));
    }

    #[test]
    fn load_rejects_reserved_collection_names() {
        let dir = tempfile::tempdir().unwrap();
        let schema = Schema::new("systems", "1.0").with_category("primary", "relationships");

        let err = GraphStore::load(schema, dir.path().join("entities.json")).unwrap_err();
        assert!(matches!(err, KgkitError::Config(msg) if msg.contains("relationships")));
    }

    #[test]
    fn existing_document_loaded_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entities.json");
        fs::write(
            &path,
            json!({
                "metadata": {
                    "domain": "legacy", "version": "0.9",
                    "created": "2023-05-01", "last_updated": "2023-06-01",
                    "notes": "imported"
                },
                "components": [{"id": "a", "tech_stack": ["Rust"]}],
                "archive": [{"id": "old"}],
                "relationships": [{"from": "a", "to": "old", "type": "replaces", "weight": 3}]
            })
            .to_string(),
        )
        .unwrap();

        let store = GraphStore::load(test_schema(), &path).unwrap();
        let doc = store.document();
        assert_eq!(doc.metadata.domain, "legacy");
        assert_eq!(doc.metadata.extra["notes"], "imported");
        assert_eq!(doc.collections["archive"][0].id, "old");
        assert!(!doc.collections.contains_key("teams"));
        assert_eq!(doc.relationships[0].extra["weight"], 3);

        // Collections absent from the file read as empty.
        assert!(store.collection("contributors").unwrap().is_empty());
    }
}
