#![allow(clippy::print_stdout, reason = "CLI output goes to stdout")]

use crate::cli::{Args, Command};
use anyhow::Context;
use clap::Parser;
use sqlet::engine::{MemoryMetadata, MetadataProvider};
use sqlet::model::{Field, FieldType, ParameterMode};
use sqlet::store::Store;
use std::fs;
use std::path::Path;
use std::sync::Arc;

mod cli;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    match args.command {
        Command::Inspect {
            root,
            entity,
            dialect,
            tables,
            aliases,
        } => {
            let metadata: Arc<dyn MetadataProvider> = match tables {
                Some(path) => Arc::new(load_tables(&path)?),
                None => Arc::new(MemoryMetadata::new()),
            };
            let store = Store::builder(root, metadata)
                .dialect(dialect.into())
                .aliases_to_table_names(aliases)
                .build();

            let resolved = store
                .entity(&entity)
                .with_context(|| format!("failed to load entity '{entity}'"))?;
            let query = resolved.to_query(store.dialect());

            println!("entity {}", resolved.name);
            if let Some(title) = &resolved.title {
                println!("title: {title}");
            }
            let mut flags = Vec::new();
            for (set, label) in [
                (resolved.command, "command"),
                (resolved.procedure, "procedure"),
                (resolved.readonly, "readonly"),
                (resolved.public_access, "public"),
            ] {
                if set {
                    flags.push(label);
                }
            }
            if !flags.is_empty() {
                println!("flags: {}", flags.join(", "));
            }
            if let Some(page_size) = resolved.page_size {
                println!("page size: {page_size}");
            }

            println!("\nsql:\n{}", query.sql);

            if !query.parameters.is_empty() {
                println!("\nparameters:");
                for (index, parameter) in query.parameters.iter().enumerate() {
                    let mode = match parameter.mode {
                        ParameterMode::In => "",
                        ParameterMode::InOut => " inout",
                    };
                    println!(
                        "  {}. {} {}{mode}",
                        index + 1,
                        parameter.name,
                        parameter.data_type
                    );
                }
            }

            if !query.fields.is_empty() {
                println!("\nfields:");
                for (name, field) in &query.fields {
                    let mut notes = vec![field.data_type.to_string()];
                    if let Some(table) = &field.table_name {
                        notes.push(format!("of {table}"));
                    }
                    if field.primary_key {
                        notes.push("key".to_string());
                    }
                    if !field.nullable {
                        notes.push("not null".to_string());
                    }
                    if let Some(reference) = &field.foreign_key {
                        notes.push(format!("-> {}.{}", reference.entity, reference.column));
                    }
                    println!("  {name}: {}", notes.join(", "));
                }
            }

            Ok(())
        }
    }
}

/// Reads a table-metadata JSON file into a [MemoryMetadata].
fn load_tables(path: &Path) -> anyhow::Result<MemoryMetadata> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read table metadata {}", path.display()))?;
    let document: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("invalid table metadata {}", path.display()))?;

    let mut metadata = MemoryMetadata::new();
    let Some(tables) = document.as_object() else {
        anyhow::bail!("table metadata must be a JSON object keyed by table name");
    };
    for (table, columns) in tables {
        let Some(columns) = columns.as_object() else {
            continue;
        };
        let mut fields = Vec::new();
        for (name, spec) in columns {
            let mut field = Field::named(name.clone());
            if let Some(spec) = spec.as_object() {
                if let Some(data_type) = spec.get("type").and_then(|v| v.as_str()) {
                    field.data_type = data_type.parse().unwrap_or(FieldType::Unknown);
                }
                if let Some(nullable) = spec.get("nullable").and_then(|v| v.as_bool()) {
                    field.nullable = nullable;
                }
                if let Some(key) = spec.get("key").and_then(|v| v.as_bool()) {
                    field.primary_key = key;
                }
            }
            fields.push(field);
        }
        metadata.insert_table(table.clone(), fields);
    }
    Ok(metadata)
}
