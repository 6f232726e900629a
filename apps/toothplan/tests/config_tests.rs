//! Tests for TOML config loading.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use std::io::Write;
use toothplan::config::AppConfig;
use toothplan_core::{PlanError, Price, PriceCatalog, Urgency};

// =============================================================================
// PARSING
// =============================================================================

#[test]
fn test_empty_config_is_default() {
    let config = AppConfig::from_toml("").unwrap();
    assert_eq!(config, AppConfig::default());
    assert_eq!(config.organizer.time_threshold_minutes, 90);
    assert!(config.pricing.is_empty());
}

#[test]
fn test_partial_organizer_keeps_defaults() {
    let config = AppConfig::from_toml(
        r#"
        [organizer]
        time_threshold_minutes = 120
        long_stage_minutes = 240
        "#,
    )
    .unwrap();

    assert_eq!(config.organizer.time_threshold_minutes, 120);
    assert_eq!(config.organizer.long_stage_minutes, 240);
    assert_eq!(config.organizer.treatments.duration_of("crown"), 90);
    assert_eq!(config.organizer.urgency.fallback, Urgency::Medium);
}

#[test]
fn test_pricing_keys_are_normalized() {
    let config = AppConfig::from_toml(
        r#"
        [pricing.prices]
        "Root Canal Treatment" = 950.5

        [pricing.durations]
        Crown = 75
        "#,
    )
    .unwrap();

    assert_eq!(
        config.pricing.price("root-canal-treatment"),
        Some(Price::from_cents(95_050))
    );
    assert_eq!(config.pricing.duration("crown"), Some(75));
}

#[test]
fn test_invalid_toml_is_config_error() {
    let result = AppConfig::from_toml("[organizer\nbroken");
    assert!(matches!(result, Err(PlanError::Config(_))));
}

#[test]
fn test_wrong_type_is_config_error() {
    let result = AppConfig::from_toml("[organizer]\ntime_threshold_minutes = \"soon\"");
    assert!(matches!(result, Err(PlanError::Config(_))));
}

// =============================================================================
// LOADING FROM DISK
// =============================================================================

#[test]
fn test_load_without_path_uses_defaults() {
    let config = AppConfig::load(None).unwrap();
    assert_eq!(config, AppConfig::default());
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[pricing.prices]\ncrown = 1350").unwrap();

    let config = AppConfig::load(Some(file.path())).unwrap();
    assert_eq!(config.pricing.price("crown"), Some(Price::from_cents(135_000)));
}

#[test]
fn test_load_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = AppConfig::load(Some(dir.path().join("absent.toml").as_path()));
    assert!(matches!(result, Err(PlanError::Io(_))));
}
