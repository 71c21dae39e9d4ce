//! The schema collaborator: which entity categories exist, what their
//! collections are called, and which relationship types are permitted.
//!
//! The store only depends on [`SchemaCatalog`]. [`Schema`] is the
//! YAML-backed implementation loaded by [`crate::config`].

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{KgkitError, Result};

/// Provenance fields merged by set-union when no schema overrides them.
pub const DEFAULT_PROVENANCE_FIELDS: &[&str] = &["source_papers", "mentioned_in", "key_papers"];

/// Fallback node color for entity types without a configured color.
pub const DEFAULT_COLOR: &str = "#7f8c8d";

/// Top-level keys of the graph document that collections may not shadow.
pub const RESERVED_KEYS: &[&str] = &["metadata", "relationships"];

/// The read-only schema contract consumed by the graph store.
pub trait SchemaCatalog {
    /// Resolve a category id to its collection name.
    fn collection_name(&self, category: &str) -> Result<&str>;

    /// All declared category ids, in a stable order.
    fn declared_categories(&self) -> Vec<&str>;

    fn domain(&self) -> &str;

    fn schema_version(&self) -> &str;

    /// Relationship types the schema permits. Empty means unrestricted.
    fn relationship_types(&self) -> &[String] {
        &[]
    }

    /// Multi-valued fields merged by set-union when entities collide.
    fn provenance_fields(&self) -> Vec<&str> {
        DEFAULT_PROVENANCE_FIELDS.to_vec()
    }

    /// Resolve a document path given by a caller. Paths pass through
    /// unchanged unless the schema knows a base directory.
    fn resolve_path(&self, path: &Path) -> PathBuf {
        path.to_path_buf()
    }

    /// Collection names for every declared category, in category order.
    fn collection_names(&self) -> Vec<&str> {
        self.declared_categories()
            .into_iter()
            .filter_map(|category| self.collection_name(category).ok())
            .collect()
    }
}

/// Definition of one entity category.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CategoryConfig {
    /// Collection name in the graph document. Defaults to the category id.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub label_singular: Option<String>,
    #[serde(default)]
    pub label_plural: Option<String>,
    /// Subtypes of this category (e.g. "service", "library"). Opaque to the store.
    #[serde(default)]
    pub types: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RelationshipConfig {
    #[serde(default)]
    pub types: Vec<String>,
}

/// Where the graph document lives, relative to the config file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PathsConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_entities_file")]
    pub entities_file: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            entities_file: default_entities_file(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VisualizationConfig {
    #[serde(default)]
    pub colors: BTreeMap<String, String>,
}

/// A complete, validated schema.
///
/// Categories are kept in a sorted map, so [`SchemaCatalog::declared_categories`]
/// and every collection iteration derived from it are deterministic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Schema {
    pub domain: String,
    #[serde(default = "default_version")]
    pub version: String,
    pub entity_types: BTreeMap<String, CategoryConfig>,
    #[serde(default)]
    pub relationships: RelationshipConfig,
    pub paths: PathsConfig,
    #[serde(default = "default_provenance_fields")]
    pub provenance_fields: Vec<String>,
    #[serde(default)]
    pub visualization: VisualizationConfig,
    /// Directory relative paths resolve against (the config file's directory).
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl Schema {
    /// Start building a schema in code.
    pub fn new(domain: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            version: version.into(),
            entity_types: BTreeMap::new(),
            relationships: RelationshipConfig::default(),
            paths: PathsConfig::default(),
            provenance_fields: default_provenance_fields(),
            visualization: VisualizationConfig::default(),
            base_dir: PathBuf::new(),
        }
    }

    /// Declare a category stored under `collection`.
    pub fn with_category(mut self, category: &str, collection: &str) -> Self {
        self.entity_types.insert(
            category.to_string(),
            CategoryConfig {
                name: Some(collection.to_string()),
                ..Default::default()
            },
        );
        self
    }

    pub fn with_relationship_types<I, T>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.relationships.types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_provenance_fields<I, T>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.provenance_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = dir.into();
        self
    }

    /// Check the invariants the store relies on.
    ///
    /// At least one category must be declared, collection names must be
    /// unique, and no collection may shadow a reserved document key.
    pub fn validate(&self) -> Result<()> {
        if self.domain.trim().is_empty() {
            return Err(KgkitError::Config("domain must not be empty".to_string()));
        }
        if self.entity_types.is_empty() {
            return Err(KgkitError::Config(
                "entity_types must declare at least one category".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for (category, config) in &self.entity_types {
            let name = config.name.as_deref().unwrap_or(category.as_str());
            if name.is_empty() {
                return Err(KgkitError::Config(format!(
                    "category '{category}' has an empty collection name"
                )));
            }
            if RESERVED_KEYS.contains(&name) {
                return Err(KgkitError::Config(format!(
                    "category '{category}' uses reserved collection name '{name}'"
                )));
            }
            if !seen.insert(name) {
                return Err(KgkitError::Config(format!(
                    "collection name '{name}' is used by more than one category"
                )));
            }
        }

        Ok(())
    }

    /// The category definition, if declared.
    pub fn category(&self, category: &str) -> Option<&CategoryConfig> {
        self.entity_types.get(category)
    }

    /// Display label for a category, falling back to its collection name.
    pub fn label(&self, category: &str, plural: bool) -> Result<String> {
        let config = self
            .category(category)
            .ok_or_else(|| KgkitError::UnknownCategory(category.to_string()))?;
        let label = if plural {
            config.label_plural.as_deref()
        } else {
            config.label_singular.as_deref()
        };
        Ok(label
            .or(config.name.as_deref())
            .unwrap_or(category)
            .to_string())
    }

    /// Node color for an entity subtype.
    pub fn color_for_type(&self, entity_type: &str) -> &str {
        self.visualization
            .colors
            .get(entity_type)
            .map(String::as_str)
            .unwrap_or(DEFAULT_COLOR)
    }

    /// Resolve a path relative to the config file's directory.
    pub fn resolve_path(&self, path: impl AsRef<Path>) -> PathBuf {
        self.base_dir.join(path)
    }

    /// Full path of the persisted graph document.
    pub fn entities_file_path(&self) -> PathBuf {
        self.resolve_path(&self.paths.data_dir)
            .join(&self.paths.entities_file)
    }
}

impl SchemaCatalog for Schema {
    fn collection_name(&self, category: &str) -> Result<&str> {
        self.entity_types
            .get_key_value(category)
            .map(|(id, config)| config.name.as_deref().unwrap_or(id.as_str()))
            .ok_or_else(|| KgkitError::UnknownCategory(category.to_string()))
    }

    fn declared_categories(&self) -> Vec<&str> {
        self.entity_types.keys().map(String::as_str).collect()
    }

    fn domain(&self) -> &str {
        &self.domain
    }

    fn schema_version(&self) -> &str {
        &self.version
    }

    fn relationship_types(&self) -> &[String] {
        &self.relationships.types
    }

    fn provenance_fields(&self) -> Vec<&str> {
        self.provenance_fields.iter().map(String::as_str).collect()
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        Schema::resolve_path(self, path)
    }
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_entities_file() -> String {
    "entities.json".to_string()
}

fn default_provenance_fields() -> Vec<String> {
    DEFAULT_PROVENANCE_FIELDS
        .iter()
        .map(|f| f.to_string())
        .collect()
}
