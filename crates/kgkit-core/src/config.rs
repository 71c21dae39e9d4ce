//! Schema configuration loading.
//!
//! The schema is loaded from (in priority order):
//! 1. Environment variables (KGKIT__ prefix, `__` separated, e.g. `KGKIT__DOMAIN`)
//! 2. The YAML config file (config.yaml)
//! 3. Defaults for optional fields

use std::path::Path;

use crate::error::{KgkitError, Result};
use crate::schema::Schema;

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "KGKIT";

impl Schema {
    /// Load and validate a schema from a YAML config file.
    ///
    /// Relative paths inside the schema resolve against the directory that
    /// holds the config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(KgkitError::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }

        let cfg = ::config::Config::builder()
            .add_source(::config::File::from(path).format(::config::FileFormat::Yaml))
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| KgkitError::Config(e.to_string()))?;

        let schema: Schema = cfg
            .try_deserialize()
            .map_err(|e| KgkitError::Config(format!("{}: {e}", path.display())))?;
        let schema = schema.with_base_dir(path.parent().unwrap_or_else(|| Path::new("")));
        schema.validate()?;

        tracing::debug!(
            config = %path.display(),
            domain = %schema.domain,
            categories = schema.entity_types.len(),
            "Schema loaded"
        );

        Ok(schema)
    }
}
