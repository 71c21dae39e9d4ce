//! CLI entry point for building and inspecting knowledge graph documents.
//!
//! Results go to stdout as JSON; logs go to stderr.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use tracing_subscriber::{fmt, EnvFilter};

use kgkit_core::config::DEFAULT_CONFIG_FILE;
use kgkit_core::{Entity, Relationship, Schema, Strength};
use kgkit_store::GraphStore;

mod summary;

#[derive(Parser)]
#[command(name = "kgkit")]
#[command(about = "Schema-configurable knowledge graph builder")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to the YAML schema/config file.
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Create the graph document if absent and print the schema summary.
    Init,
    /// Print entity and relationship counts.
    Stats,
    /// Check that every relationship endpoint names a known entity.
    Validate,
    /// Add an entity from a JSON object (must contain "id").
    AddEntity {
        /// Category id (e.g. primary, contributors, sources).
        category: String,
        /// Entity as a JSON object.
        json: String,
    },
    /// Shallow-merge a JSON object into an existing entity.
    UpdateEntity {
        category: String,
        id: String,
        /// Fields to overwrite, as a JSON object.
        json: String,
    },
    /// Print a single entity.
    Get { category: String, id: String },
    /// Add a relationship between two entity ids.
    AddRelationship {
        from: String,
        to: String,
        #[arg(value_name = "TYPE")]
        rel_type: String,
        #[arg(short, long, default_value = "")]
        description: String,
        /// weak, moderate, or strong.
        #[arg(short, long, default_value = "moderate")]
        strength: Strength,
    },
    /// Merge another graph document into this one.
    Merge {
        /// Path to the document, relative to the config file's directory.
        file: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let schema = Schema::from_file(&cli.config)?;
    let mut store = GraphStore::open(schema)?;

    match cli.command {
        Command::Init => {
            if !store.path().exists() {
                store.save()?;
                tracing::info!(path = %store.path().display(), "Graph document created");
            }
            let summary = summary::SchemaSummary::new(store.schema(), store.path())?;
            print_json(&summary)?;
        }
        Command::Stats => print_json(&store.stats())?,
        Command::Validate => {
            for kind in store.undeclared_relationship_types() {
                tracing::warn!(rel_type = %kind, "Relationship type not declared by schema");
            }
            let issues = store.validate();
            print_json(&issues)?;
            if !issues.is_empty() {
                std::process::exit(1);
            }
        }
        Command::AddEntity { category, json } => {
            let entity = Entity::from_value(serde_json::from_str(&json)?)?;
            let id = entity.id.clone();
            if store.add_entity(&category, entity)? {
                store.save()?;
                print_json(&serde_json::json!({ "added": true, "id": id }))?;
            } else {
                print_json(&serde_json::json!({ "added": false, "id": id }))?;
            }
        }
        Command::UpdateEntity { category, id, json } => {
            let updates = parse_object(&json)?;
            let updated = store.update_entity(&category, &id, updates)?;
            if updated {
                store.save()?;
            }
            print_json(&serde_json::json!({ "updated": updated, "id": id }))?;
        }
        Command::Get { category, id } => match store.get_entity(&category, &id)? {
            Some(entity) => print_json(entity)?,
            None => anyhow::bail!("No entity '{id}' in category '{category}'"),
        },
        Command::AddRelationship {
            from,
            to,
            rel_type,
            description,
            strength,
        } => {
            let relationship = Relationship::new(from, to, rel_type)
                .with_description(description)
                .with_strength(strength);
            let key = relationship.key();
            let added = store.add_relationship(relationship);
            if added {
                store.save()?;
            }
            print_json(&serde_json::json!({ "added": added, "relationship": key }))?;
        }
        Command::Merge { file } => {
            let stats = store.merge_from_file(&file)?;
            store.save()?;
            print_json(&stats)?;
        }
    }

    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn parse_object(json: &str) -> anyhow::Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(json)? {
        Value::Object(map) => Ok(map),
        other => anyhow::bail!("Expected a JSON object, got: {other}"),
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
