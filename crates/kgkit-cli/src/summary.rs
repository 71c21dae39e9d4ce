//! Human-facing overview of a loaded schema, printed by `kgkit init`.

use std::path::Path;

use serde::Serialize;

use kgkit_core::{Result, Schema, SchemaCatalog};

#[derive(Debug, Serialize)]
pub struct CategorySummary {
    pub category: String,
    pub collection: String,
    pub label: String,
    pub label_plural: String,
    pub types: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SchemaSummary {
    pub domain: String,
    pub version: String,
    pub document: String,
    pub categories: Vec<CategorySummary>,
    pub relationship_types: Vec<String>,
}

impl SchemaSummary {
    pub fn new(schema: &Schema, document: &Path) -> Result<Self> {
        let categories = schema
            .declared_categories()
            .into_iter()
            .map(|category| -> Result<CategorySummary> {
                Ok(CategorySummary {
                    category: category.to_string(),
                    collection: schema.collection_name(category)?.to_string(),
                    label: schema.label(category, false)?,
                    label_plural: schema.label(category, true)?,
                    types: schema
                        .category(category)
                        .map(|c| c.types.clone())
                        .unwrap_or_default(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            domain: schema.domain.clone(),
            version: schema.version.clone(),
            document: document.display().to_string(),
            categories,
            relationship_types: schema.relationships.types.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summarizes_every_category() {
        let schema = Schema::new("ecosystem", "1.0")
            .with_category("primary", "organizations")
            .with_category("contributors", "people")
            .with_relationship_types(["funds", "partners-with"]);

        let summary = SchemaSummary::new(&schema, Path::new("data/entities.json")).unwrap();
        assert_eq!(summary.domain, "ecosystem");
        assert_eq!(summary.categories.len(), 2);
        assert_eq!(summary.categories[0].category, "contributors");
        assert_eq!(summary.categories[0].collection, "people");
        assert_eq!(summary.categories[1].label_plural, "organizations");
        assert_eq!(summary.relationship_types, vec!["funds", "partners-with"]);
    }
}
