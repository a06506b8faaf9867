//! # CLI Command Implementations
//!
//! Each subcommand opens the store, does its work, and prints either
//! human-readable text or JSON depending on `--json-mode`.

use codelore_core::{Direction, EntityQuery, LoreError, Store, snapshot_checksum};
use std::fs;
use std::path::{Path, PathBuf};

use super::Cli;
use crate::api;

/// Largest facts file we accept (8 MB). Facts files are analyzer output
/// and should never come close.
const MAX_FACTS_FILE_BYTES: u64 = 8 * 1024 * 1024;

/// Open the store on the backend selected by the global flags.
fn load_store(cli: &Cli) -> Result<Store, LoreError> {
    match cli.backend.as_str() {
        "redb" => Store::open_database(&cli.database),
        "file" => Store::open_file(cli.database.clone()),
        other => Err(LoreError::Validation(format!(
            "unknown backend '{other}', expected 'redb' or 'file'"
        ))),
    }
}

/// Reject paths that escape into directories the caller did not name.
fn validate_output_path(path: &Path) -> Result<PathBuf, LoreError> {
    if path.as_os_str().is_empty() {
        return Err(LoreError::Validation("output path is empty".to_string()));
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        return Err(LoreError::Validation(format!(
            "output directory does not exist: {}",
            parent.display()
        )));
    }
    Ok(path.to_path_buf())
}

fn validate_facts_file(path: &Path) -> Result<PathBuf, LoreError> {
    let canonical = path.canonicalize().map_err(|e| {
        LoreError::Validation(format!("cannot read facts file {}: {e}", path.display()))
    })?;
    let meta = fs::metadata(&canonical)
        .map_err(|e| LoreError::Validation(format!("cannot stat facts file: {e}")))?;
    if !meta.is_file() {
        return Err(LoreError::Validation(format!(
            "{} is not a regular file",
            canonical.display()
        )));
    }
    if meta.len() > MAX_FACTS_FILE_BYTES {
        return Err(LoreError::Validation(format!(
            "facts file is {} bytes, maximum is {MAX_FACTS_FILE_BYTES}",
            meta.len()
        )));
    }
    Ok(canonical)
}

// =============================================================================
// SERVER
// =============================================================================

pub async fn cmd_server(cli: &Cli, addr: &str) -> Result<(), LoreError> {
    let store = load_store(cli)?;
    let stats = store.statistics();

    if !cli.quiet {
        println!("Starting knowledge API server");
        println!("  Address:  http://{addr}");
        println!("  Database: {} ({})", cli.database.display(), cli.backend);
        println!(
            "  Loaded:   {} entities, {} relationships, {} patterns, {} conventions",
            stats.entity_count,
            stats.relationship_count,
            stats.pattern_count,
            stats.convention_count
        );
        println!();
    }

    api::run_server(addr, store).await
}

// =============================================================================
// STATUS
// =============================================================================

pub fn cmd_status(cli: &Cli) -> Result<(), LoreError> {
    let store = load_store(cli)?;
    let stats = store.statistics();

    if cli.json_mode {
        let payload = serde_json::json!({
            "database": cli.database.display().to_string(),
            "backend": cli.backend,
            "statistics": stats,
        });
        println!("{}", serde_json::to_string_pretty(&payload).map_err(json_err)?);
        return Ok(());
    }

    println!("Knowledge database: {}", cli.database.display());
    println!("Backend:            {}", cli.backend);
    println!();
    println!("  Entities:       {}", stats.entity_count);
    for (entity_type, count) in &stats.entities_by_type {
        println!("    {entity_type}: {count}");
    }
    println!("  Relationships:  {}", stats.relationship_count);
    for (rel_type, count) in &stats.relationships_by_type {
        println!("    {rel_type}: {count}");
    }
    println!("  Patterns:       {}", stats.pattern_count);
    println!("  Conventions:    {}", stats.convention_count);
    println!("  Notes:          {}", stats.note_count);
    Ok(())
}

// =============================================================================
// REGISTER
// =============================================================================

/// Top-level shape of a facts file.
#[derive(Debug, serde::Deserialize)]
struct FactsFile {
    #[serde(default)]
    entities: Vec<api::types::RegisterEntityRequest>,
    #[serde(default)]
    relationships: Vec<api::types::RegisterRelationshipRequest>,
    #[serde(default)]
    patterns: Vec<api::types::RegisterPatternRequest>,
    #[serde(default)]
    conventions: Vec<api::types::RegisterConventionRequest>,
}

pub fn cmd_register(cli: &Cli, file: &Path) -> Result<(), LoreError> {
    let path = validate_facts_file(file)?;
    let raw = fs::read_to_string(&path)
        .map_err(|e| LoreError::Validation(format!("cannot read facts file: {e}")))?;
    let facts: FactsFile = serde_json::from_str(&raw)
        .map_err(|e| LoreError::Validation(format!("invalid facts file: {e}")))?;

    let mut store = load_store(cli)?;
    let mut created = 0_usize;
    let mut merged = 0_usize;

    for request in &facts.entities {
        let registration = store.register_entity(request.to_draft()?)?;
        if registration.created {
            created += 1;
        } else {
            merged += 1;
        }
        if cli.verbose {
            println!(
                "  entity {} -> {}",
                request.name,
                if registration.created { "created" } else { "merged" }
            );
        }
    }
    for request in &facts.relationships {
        let registration = store.register_relationship(request.to_draft()?)?;
        if registration.created {
            created += 1;
        } else {
            merged += 1;
        }
    }
    for request in &facts.patterns {
        let registration = store.register_pattern(request.to_draft()?)?;
        if registration.created {
            created += 1;
        } else {
            merged += 1;
        }
    }
    for request in &facts.conventions {
        let registration = store.register_style_convention(request.to_draft()?)?;
        if registration.created {
            created += 1;
        } else {
            merged += 1;
        }
    }

    if cli.json_mode {
        let payload = serde_json::json!({"created": created, "merged": merged});
        println!("{}", serde_json::to_string(&payload).map_err(json_err)?);
    } else {
        println!("Registered {created} new records, merged into {merged} existing");
    }
    Ok(())
}

// =============================================================================
// QUERY
// =============================================================================

pub fn cmd_query(
    cli: &Cli,
    entity_type: &Option<String>,
    language: &Option<String>,
    name_pattern: &Option<String>,
    limit: Option<i64>,
    name: &Option<String>,
) -> Result<(), LoreError> {
    let store = load_store(cli)?;

    // Exact-name lookup takes precedence over filtered listing.
    if let Some(name) = name {
        let details = store.entity_details(name)?;
        if cli.json_mode {
            let entity = api::types::EntityJson::from(&details.entity);
            let relationships: Vec<api::types::DirectedRelationshipJson> = details
                .relationships
                .iter()
                .map(api::types::DirectedRelationshipJson::from)
                .collect();
            let payload = serde_json::json!({
                "entity": entity,
                "relationships": relationships,
            });
            println!("{}", serde_json::to_string_pretty(&payload).map_err(json_err)?);
            return Ok(());
        }

        let entity = &details.entity;
        println!("{} [{}] ({})", entity.name, entity.entity_type, entity.id);
        println!("  {}", entity.summary);
        if let Some(signature) = &entity.signature {
            println!("  signature: {signature}");
        }
        if let Some(language) = &entity.language {
            println!("  language:  {language}");
        }
        for observation in &entity.observations {
            println!("  note: {observation}");
        }
        if !details.relationships.is_empty() {
            println!("  relationships:");
            for directed in &details.relationships {
                let rel = &directed.relationship;
                match directed.direction {
                    Direction::Outgoing => println!(
                        "    -> {} ({})",
                        rel.to_entity, rel.relationship_type
                    ),
                    Direction::Incoming => println!(
                        "    <- {} ({})",
                        rel.from_entity, rel.relationship_type
                    ),
                }
            }
        }
        return Ok(());
    }

    let query = EntityQuery {
        entity_type: entity_type.clone(),
        language: language.clone(),
        name_pattern: name_pattern.clone(),
        limit,
    };
    let entities = store.query_entities(&query)?;

    if cli.json_mode {
        let entities: Vec<api::types::EntityJson> =
            entities.iter().map(api::types::EntityJson::from).collect();
        println!("{}", serde_json::to_string_pretty(&entities).map_err(json_err)?);
        return Ok(());
    }

    if entities.is_empty() {
        println!("No matching entities");
        return Ok(());
    }
    println!("{} matching entities:", entities.len());
    for entity in &entities {
        let language = entity.language.as_deref().unwrap_or("-");
        println!(
            "  {} [{} / {}] {}",
            entity.name, entity.entity_type, language, entity.summary
        );
    }
    Ok(())
}

// =============================================================================
// EXPORT
// =============================================================================

pub fn cmd_export(cli: &Cli, output: &Path) -> Result<(), LoreError> {
    let output = validate_output_path(output)?;
    let store = load_store(cli)?;
    let bytes = store.snapshot_bytes()?;
    let checksum = snapshot_checksum(&bytes);

    fs::write(&output, &bytes)
        .map_err(|e| LoreError::Persistence(format!("cannot write export: {e}")))?;

    if cli.json_mode {
        let payload = serde_json::json!({
            "output": output.display().to_string(),
            "bytes": bytes.len(),
            "checksum": checksum,
        });
        println!("{}", serde_json::to_string(&payload).map_err(json_err)?);
    } else {
        println!(
            "Exported {} bytes to {} (checksum {checksum:#018x})",
            bytes.len(),
            output.display()
        );
    }
    Ok(())
}

// =============================================================================
// INIT / CLEAR
// =============================================================================

pub fn cmd_init(cli: &Cli, force: bool) -> Result<(), LoreError> {
    if cli.database.exists() && !force {
        return Err(LoreError::Validation(format!(
            "{} already exists, pass --force to overwrite",
            cli.database.display()
        )));
    }
    if cli.database.exists() {
        fs::remove_file(&cli.database)
            .map_err(|e| LoreError::Persistence(format!("cannot remove old database: {e}")))?;
    }

    let mut store = load_store(cli)?;
    store.clear()?;

    if !cli.quiet {
        println!(
            "Initialized empty knowledge database at {}",
            cli.database.display()
        );
    }
    Ok(())
}

pub fn cmd_clear(cli: &Cli) -> Result<(), LoreError> {
    let mut store = load_store(cli)?;
    let stats = store.statistics();
    store.clear()?;

    if cli.json_mode {
        let payload = serde_json::json!({
            "cleared_entities": stats.entity_count,
            "cleared_relationships": stats.relationship_count,
        });
        println!("{}", serde_json::to_string(&payload).map_err(json_err)?);
    } else {
        println!(
            "Cleared {} entities, {} relationships, {} patterns, {} conventions",
            stats.entity_count,
            stats.relationship_count,
            stats.pattern_count,
            stats.convention_count
        );
    }
    Ok(())
}

fn json_err(e: serde_json::Error) -> LoreError {
    LoreError::Persistence(format!("JSON encoding failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_facts_file_is_rejected() {
        let result = validate_facts_file(Path::new("/nonexistent/facts.json"));
        assert!(result.is_err());
    }

    #[test]
    fn output_into_missing_directory_is_rejected() {
        let result = validate_output_path(Path::new("/nonexistent-dir-xyz/out.bin"));
        assert!(result.is_err());
    }

    fn test_cli(database: PathBuf, backend: &str) -> Cli {
        Cli {
            verbose: false,
            quiet: true,
            database,
            backend: backend.to_string(),
            json_mode: true,
            command: None,
        }
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let cli = test_cli(PathBuf::from("kb.db"), "sqlite");
        assert!(load_store(&cli).is_err());
    }

    #[test]
    fn export_writes_a_decodable_snapshot() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cli = test_cli(dir.path().join("kb.db"), "file");

        let mut store = load_store(&cli).expect("open store");
        store
            .register_entity(codelore_core::EntityDraft::new(
                "parse", "function", "parses input",
            ))
            .expect("register");
        drop(store);

        let output = dir.path().join("export.bin");
        cmd_export(&cli, &output).expect("export");

        let bytes = fs::read(&output).expect("read export");
        let graph = codelore_core::knowledge_from_bytes(&bytes).expect("decode");
        assert_eq!(graph.entity_count(), 1);
    }

    #[test]
    fn facts_file_parses_partial_sections() {
        let facts: FactsFile = serde_json::from_str(
            r#"{"entities": [{"name": "parse", "entity_type": "function", "summary": "parses"}]}"#,
        )
        .expect("parse facts");
        assert_eq!(facts.entities.len(), 1);
        assert!(facts.relationships.is_empty());
        assert!(facts.patterns.is_empty());
        assert!(facts.conventions.is_empty());
    }
}
