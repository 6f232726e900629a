//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::config::AppConfig;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use toothplan_core::{
    EditorCommand, Finding, IdAllocator, PlanError, PriceCatalog, StageEditor, StageFormat,
    StageSerializer, TokenKind, TreatmentStage, UrgencyClassifier,
};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum size for plan and findings files (10 MB).
const MAX_INPUT_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Maximum number of operations in one edit script.
const MAX_EDIT_OPERATIONS: usize = 10_000;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), PlanError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| PlanError::Io(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(PlanError::InvalidInput(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Resolve `path` to an existing regular file.
///
/// Canonicalizing resolves ".." and symlinks before anything is read.
fn validate_file_path(path: &Path) -> Result<PathBuf, PlanError> {
    let canonical = path
        .canonicalize()
        .map_err(|e| PlanError::Io(format!("Invalid file path '{}': {}", path.display(), e)))?;

    if !canonical.is_file() {
        return Err(PlanError::Io(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Read and parse a JSON input file after path and size checks.
fn read_json(path: &Path) -> Result<serde_json::Value, PlanError> {
    let validated = validate_file_path(path)?;
    validate_file_size(&validated, MAX_INPUT_FILE_SIZE)?;

    let contents = std::fs::read(&validated)
        .map_err(|e| PlanError::Io(format!("Read file: {}", e)))?;
    serde_json::from_slice(&contents).map_err(|e| {
        PlanError::Deserialization(format!("'{}' is not valid JSON: {}", path.display(), e))
    })
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), PlanError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| PlanError::Serialization(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

// =============================================================================
// PLAN LOADING
// =============================================================================

/// Parse a `-t` format argument.
pub fn parse_format(format: &str) -> Result<StageFormat, PlanError> {
    match format {
        "wire" => Ok(StageFormat::Wire),
        "internal" => Ok(StageFormat::Internal),
        _ => Err(PlanError::InvalidInput(format!(
            "Unknown format: {} (expected wire or internal)",
            format
        ))),
    }
}

fn catalog(config: &AppConfig) -> Arc<dyn PriceCatalog> {
    Arc::new(config.pricing.clone())
}

/// Load a findings file.
pub fn load_findings(path: &Path) -> Result<Vec<Finding>, PlanError> {
    let value = read_json(path)?;
    serde_json::from_value(value).map_err(|e| {
        PlanError::Deserialization(format!("'{}' is not a findings array: {}", path.display(), e))
    })
}

/// Load a plan file into an editor.
///
/// Malformed stage data degrades to an empty plan (logged by the
/// serializer), which the editor turns into its single default stage.
pub fn load_plan(config: &AppConfig, path: &Path, format: &str) -> Result<StageEditor, PlanError> {
    let format = parse_format(format)?;
    let value = read_json(path)?;

    let mut ids = IdAllocator::new();
    let stages = StageSerializer::new(&config.organizer).deserialize_value(&value, format, &mut ids);
    tracing::debug!(stages = stages.len(), ?format, "Loaded plan from {:?}", path);

    Ok(StageEditor::new(
        Arc::new(config.organizer.clone()),
        catalog(config),
        stages,
    ))
}

/// Load an edit script.
pub fn load_script(path: &Path) -> Result<Vec<EditorCommand>, PlanError> {
    let value = read_json(path)?;
    let commands: Vec<EditorCommand> = serde_json::from_value(value).map_err(|e| {
        PlanError::Deserialization(format!("'{}' is not an edit script: {}", path.display(), e))
    })?;

    if commands.len() > MAX_EDIT_OPERATIONS {
        return Err(PlanError::InvalidInput(format!(
            "Edit script has {} operations, maximum is {}",
            commands.len(),
            MAX_EDIT_OPERATIONS
        )));
    }
    Ok(commands)
}

/// Apply commands in order. Returns how many changed the plan.
///
/// Stops at the first refused deletion; earlier edits stay applied.
pub fn apply_script(
    editor: &mut StageEditor,
    commands: Vec<EditorCommand>,
) -> Result<usize, PlanError> {
    let mut changed = 0usize;
    for (index, command) in commands.into_iter().enumerate() {
        tracing::debug!(index, ?command, "Applying edit");
        if editor.apply(command)? {
            changed = changed.saturating_add(1);
        }
    }
    Ok(changed)
}

fn print_plan(stages: &[TreatmentStage]) {
    for stage in stages {
        println!(
            "{}. {} ({} min, {})",
            stage.order().saturating_add(1),
            stage.name,
            stage.total_time(),
            stage.total_cost()
        );
        if !stage.focus.is_empty() {
            println!("   Focus: {}", stage.focus);
        }
        for item in &stage.items {
            let urgency = item.urgency.map(|u| u.as_str()).unwrap_or("-");
            println!(
                "   - Tooth {}: {} -> {} [{}] {} min, {}",
                item.tooth_number,
                item.condition,
                item.treatment,
                urgency,
                item.estimated_time,
                item.price
            );
        }
    }
}

// =============================================================================
// ORGANIZE COMMAND
// =============================================================================

/// Build the default staged plan from findings.
pub fn cmd_organize(config: &AppConfig, json_mode: bool, file: &Path) -> Result<(), PlanError> {
    tracing::info!("Organizing findings from {:?}", file);

    let findings = load_findings(file)?;
    let editor = StageEditor::from_findings(
        Arc::new(config.organizer.clone()),
        catalog(config),
        &findings,
    );

    let admitted: usize = editor.stages().iter().map(|s| s.items.len()).sum();
    if admitted < findings.len() {
        tracing::warn!(
            skipped = findings.len() - admitted,
            "Findings without tooth, condition or treatment were skipped"
        );
    }

    if json_mode {
        return print_json(&editor.to_wire());
    }

    println!("Treatment Plan");
    println!("==============");
    print_plan(editor.stages());
    let totals = editor.global_totals();
    println!();
    println!("Total: {} min, {}", totals.total_time, totals.total_cost);

    Ok(())
}

// =============================================================================
// VALIDATE COMMAND
// =============================================================================

/// Validate a plan. Fails when the plan has errors.
pub fn cmd_validate(
    config: &AppConfig,
    json_mode: bool,
    file: &Path,
    format: &str,
) -> Result<(), PlanError> {
    let editor = load_plan(config, file, format)?;
    let result = editor.validation();

    if json_mode {
        print_json(result)?;
    } else {
        println!("Plan Validation");
        println!("===============");
        println!("Stages: {}", editor.stages().len());
        println!();
        if result.errors.is_empty() && result.warnings.is_empty() {
            println!("No issues found");
        }
        for error in &result.errors {
            println!("ERROR   {}", error);
        }
        for warning in &result.warnings {
            println!("WARNING {}", warning);
        }
    }

    if result.is_valid {
        Ok(())
    } else {
        Err(PlanError::InvalidInput(format!(
            "Plan has {} validation error(s)",
            result.errors.len()
        )))
    }
}

// =============================================================================
// TOTALS COMMAND
// =============================================================================

/// Show per-stage and global totals.
pub fn cmd_totals(
    config: &AppConfig,
    json_mode: bool,
    file: &Path,
    format: &str,
    threshold: Option<u32>,
) -> Result<(), PlanError> {
    let mut editor = load_plan(config, file, format)?;
    if let Some(minutes) = threshold {
        editor.set_time_threshold(minutes);
    }

    let over: Vec<_> = editor
        .stages_over_threshold()
        .into_iter()
        .map(|s| s.id.clone())
        .collect();

    if json_mode {
        let stages: Vec<_> = editor
            .stages()
            .iter()
            .map(|s| {
                serde_json::json!({
                    "id": s.id,
                    "name": s.name,
                    "totalTime": s.total_time(),
                    "totalCost": s.total_cost(),
                    "overThreshold": over.contains(&s.id),
                })
            })
            .collect();
        let output = serde_json::json!({
            "timeThreshold": editor.time_threshold(),
            "stages": stages,
            "globalTotals": editor.global_totals(),
        });
        return print_json(&output);
    }

    println!("Plan Totals (limit {} min per stage)", editor.time_threshold());
    println!("====================================");
    for stage in editor.stages() {
        let marker = if over.contains(&stage.id) {
            "  OVER LIMIT"
        } else {
            ""
        };
        println!(
            "{:>3}. {:<28} {:>5} min {:>12}{}",
            stage.order().saturating_add(1),
            stage.name,
            stage.total_time(),
            stage.total_cost().to_string(),
            marker
        );
    }
    let totals = editor.global_totals();
    println!();
    println!("Total: {} min, {}", totals.total_time, totals.total_cost);

    Ok(())
}

// =============================================================================
// CLASSIFY COMMAND
// =============================================================================

/// Show condition, treatment and combined urgency.
pub fn cmd_classify(
    config: &AppConfig,
    json_mode: bool,
    condition: &str,
    treatment: &str,
) -> Result<(), PlanError> {
    if condition.trim().is_empty() || treatment.trim().is_empty() {
        return Err(PlanError::InvalidInput(
            "Both --condition and --treatment must be non-empty".to_string(),
        ));
    }

    let classifier = UrgencyClassifier::new(&config.organizer.urgency);
    let condition_tier = classifier.classify(condition, TokenKind::Condition);
    let treatment_tier = classifier.classify(treatment, TokenKind::Treatment);
    let finding = classifier.finding_urgency(condition, treatment);

    if json_mode {
        let output = serde_json::json!({
            "condition": condition_tier,
            "treatment": treatment_tier,
            "finding": finding,
        });
        return print_json(&output);
    }

    println!("Condition: {:<24} {}", condition, condition_tier);
    println!("Treatment: {:<24} {}", treatment, treatment_tier);
    println!("Finding urgency: {}", finding);

    Ok(())
}

// =============================================================================
// EDIT COMMAND
// =============================================================================

/// Apply an edit script and print the resulting plan.
pub fn cmd_edit(
    config: &AppConfig,
    json_mode: bool,
    file: &Path,
    ops: &Path,
    format: &str,
) -> Result<(), PlanError> {
    let mut editor = load_plan(config, file, format)?;
    let commands = load_script(ops)?;
    let total = commands.len();

    let changed = apply_script(&mut editor, commands)?;
    tracing::info!(total, changed, "Applied edit script");

    if json_mode {
        return print_json(&editor.snapshot());
    }

    print_plan(editor.stages());
    let validation = editor.validation();
    println!();
    println!(
        "{} of {} operations changed the plan; {} error(s), {} warning(s); {}",
        changed,
        total,
        validation.errors.len(),
        validation.warnings.len(),
        if editor.can_save() {
            "ready to save"
        } else {
            "not saveable"
        }
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_names() {
        assert_eq!(parse_format("wire").ok(), Some(StageFormat::Wire));
        assert_eq!(parse_format("internal").ok(), Some(StageFormat::Internal));
        assert!(matches!(
            parse_format("xml"),
            Err(PlanError::InvalidInput(_))
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let result = read_json(Path::new("/definitely/not/here.json"));
        assert!(matches!(result, Err(PlanError::Io(_))));
    }
}
