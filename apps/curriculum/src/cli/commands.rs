//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::api::{self, AppState};
use crate::config::AppConfig;
use curriculum_core::{
    Catalog, CurriculumError, CurriculumFilter, CurriculumTree, ImportOptions, ImportReport,
    Importer, Kind, RecordId, Store, curriculum_tree, export_tables, list_curricula, pack,
    schema,
};
use std::path::{Path, PathBuf};

// =============================================================================
// FILE VALIDATION
// =============================================================================

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: usize) -> Result<(), CurriculumError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| CurriculumError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size as u64 {
        return Err(CurriculumError::InvalidInput(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Resolve an input path to an existing regular file.
///
/// Canonicalizing resolves symlinks and `..` before anything is read.
fn validate_file_path(path: &Path) -> Result<PathBuf, CurriculumError> {
    let canonical = path.canonicalize().map_err(|e| {
        CurriculumError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(CurriculumError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Resolve an output path: the parent directory must exist.
fn validate_output_path(path: &Path) -> Result<PathBuf, CurriculumError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        CurriculumError::IoError(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(CurriculumError::IoError(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| CurriculumError::IoError("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CurriculumError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| CurriculumError::SerializationError(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

/// Open the configured database.
pub fn open_catalog(config: &AppConfig) -> Result<Catalog, CurriculumError> {
    Catalog::open(&config.database)
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize a new database.
pub fn cmd_init(config: &AppConfig, force: bool) -> Result<(), CurriculumError> {
    let db_path = &config.database;
    if db_path.exists() {
        if !force {
            return Err(CurriculumError::InvalidInput(
                "Database already exists. Use --force to overwrite.".to_string(),
            ));
        }
        std::fs::remove_file(db_path)
            .map_err(|e| CurriculumError::IoError(format!("Remove database: {}", e)))?;
    }

    open_catalog(config)?;
    tracing::info!(database = %db_path.display(), "database initialized");
    println!("Initialized new database at {:?}", db_path);
    Ok(())
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show record counts per kind.
pub fn cmd_status(config: &AppConfig, json_mode: bool) -> Result<(), CurriculumError> {
    let catalog = open_catalog(config)?;
    let counts = catalog.counts()?;

    if json_mode {
        return print_json(&api::StatusResponse::new("redb", counts));
    }

    println!("Curriculum Catalog Status");
    println!("=========================");
    println!("Database: {:?}", config.database);
    println!();
    for (kind, count) in &counts {
        println!("{:<28}{:>8}", schema::schema_of(*kind).label, count);
    }
    println!("{:<28}{:>8}", "Total", counts.iter().map(|(_, c)| c).sum::<usize>());

    Ok(())
}

// =============================================================================
// EXPORT COMMAND
// =============================================================================

/// Export the catalog to an archive file.
pub fn cmd_export(config: &AppConfig, output: &Path) -> Result<(), CurriculumError> {
    let validated_output = validate_output_path(output)?;

    let catalog = open_catalog(config)?;
    let tables = export_tables(&catalog)?;
    let data = pack(&tables)?;

    std::fs::write(&validated_output, &data)
        .map_err(|e| CurriculumError::IoError(format!("Write file: {}", e)))?;

    for table in &tables {
        println!("{:<36}{:>8} rows", table.file_name(), table.len());
    }
    println!("Exported {} bytes to {:?}", data.len(), validated_output);

    Ok(())
}

// =============================================================================
// IMPORT COMMAND
// =============================================================================

/// Import an archive file.
///
/// Rolled-back kinds make the command fail after the report is printed.
pub fn cmd_import(
    config: &AppConfig,
    input: &Path,
    dry_run: bool,
    strict_references: bool,
    json_mode: bool,
) -> Result<(), CurriculumError> {
    let validated_path = validate_file_path(input)?;
    validate_file_size(&validated_path, config.archive_limit())?;

    let data = std::fs::read(&validated_path)
        .map_err(|e| CurriculumError::IoError(format!("Read file: {}", e)))?;

    let options = ImportOptions::default()
        .dry_run(dry_run)
        .strict_references(strict_references || config.import.strict_references);

    let mut catalog = open_catalog(config)?;
    let report = Importer::new(options).run(&mut catalog, &data)?;

    if json_mode {
        print_json(&report)?;
    } else {
        println!("{}", report.summary());
        print_issues(&report);
    }

    if report.has_fatal() {
        return Err(CurriculumError::StorageFailure(format!(
            "rolled back: {}",
            fatal_kinds(&report).join(", ")
        )));
    }
    Ok(())
}

fn fatal_kinds(report: &ImportReport) -> Vec<&'static str> {
    report
        .kinds
        .iter()
        .filter(|k| k.is_fatal())
        .map(|k| k.kind.as_str())
        .collect()
}

fn print_issues(report: &ImportReport) {
    let issues: Vec<_> = report
        .kinds
        .iter()
        .flat_map(|k| k.issues.iter().map(move |i| (k.kind, i)))
        .collect();
    if issues.is_empty() {
        return;
    }

    println!();
    println!("Row issues:");
    for (kind, issue) in issues {
        println!(
            "  {}:{}  {}",
            schema::table_file_name(kind),
            issue.line(),
            issue.describe()
        );
    }
}

// =============================================================================
// READ COMMANDS
// =============================================================================

/// Show one curriculum with its subtree.
pub fn cmd_tree(config: &AppConfig, id: u64, json_mode: bool) -> Result<(), CurriculumError> {
    let catalog = open_catalog(config)?;
    let tree = curriculum_tree(&catalog, RecordId(id))?.ok_or(CurriculumError::RecordNotFound {
        kind: Kind::Curriculum,
        id: RecordId(id),
    })?;

    if json_mode {
        return print_json(&tree);
    }
    print_tree(&tree);
    Ok(())
}

/// Indented outline of a tree.
fn print_tree(tree: &CurriculumTree) {
    println!(
        "[{}] {} - {} (grades {})",
        tree.id, tree.subject, tree.state, tree.grade_levels
    );
    for area in &tree.learning_areas {
        println!(
            "  [{}] {}. {} ({} h)",
            area.id, area.number, area.name, area.teaching_hours
        );
        for objective in &area.objectives {
            println!("    [{}] {}", objective.id, objective.name);
            for d in &objective.descriptions {
                println!("      - {}", d.text);
            }
            for sub in &objective.sub_objectives {
                println!("      [{}] {}", sub.id, sub.name);
                for d in &sub.descriptions {
                    println!("        - {}", d.text);
                }
                for content in &sub.contents {
                    println!("        [{}] {}", content.id, content.name);
                    for d in &content.descriptions {
                        println!("          - {}", d.text);
                    }
                }
            }
        }
    }
}

/// List curricula.
pub fn cmd_list(
    config: &AppConfig,
    state: Option<String>,
    subject: Option<String>,
    page: usize,
    json_mode: bool,
) -> Result<(), CurriculumError> {
    let catalog = open_catalog(config)?;
    let filter = CurriculumFilter { state, subject };
    let result = list_curricula(&catalog, &filter, page)?;

    if json_mode {
        return print_json(&result);
    }

    for item in &result.items {
        println!(
            "{:>6}  {:<30} {:<24} {}",
            item.id.to_string(),
            item.subject,
            item.state,
            item.grade_levels
        );
    }
    println!(
        "Page {} of {} ({} curricula)",
        result.current_page, result.total_pages, result.total_items
    );
    Ok(())
}

// =============================================================================
// DELETE COMMAND
// =============================================================================

/// Delete a record and its descendants.
pub fn cmd_delete(
    config: &AppConfig,
    kind: &str,
    id: u64,
    json_mode: bool,
) -> Result<(), CurriculumError> {
    let kind = Kind::parse(kind)
        .ok_or_else(|| CurriculumError::InvalidInput(format!("Unknown kind: {}", kind)))?;

    let mut catalog = open_catalog(config)?;
    let removed = catalog.delete(kind, RecordId(id))?;
    tracing::info!(%kind, id, removed, "record deleted");

    if json_mode {
        return print_json(&serde_json::json!({
            "kind": kind,
            "id": id,
            "removed": removed,
        }));
    }
    println!("Deleted {} {} ({} records including descendants)", kind, id, removed);
    Ok(())
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(config: AppConfig, memory: bool) -> Result<(), CurriculumError> {
    let catalog = if memory {
        Catalog::memory()
    } else {
        open_catalog(&config)?
    };

    println!("Curriculum Archive Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:     {}", config.server.host);
    println!("  Port:     {}", config.server.port);
    if memory {
        println!("  Backend:  memory");
    } else {
        println!("  Database: {:?}", config.database);
    }
    println!();
    println!("Endpoints:");
    println!("  GET  /health          - Health check");
    println!("  GET  /status          - Record counts");
    println!("  GET  /export          - Export archive");
    println!("  POST /import          - Import archive");
    println!("  GET  /curricula       - List curricula");
    println!("  GET  /curricula/all   - All trees");
    println!("  GET  /curricula/{{id}}  - One tree");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let addr = format!("{}:{}", config.server.host, config.server.port);
    api::run_server(&addr, AppState::new(catalog, config)).await
}

// =============================================================================
// TESTS
// =============================================================================
