//! # App Configuration
//!
//! Optional TOML file for the CLI host.
//!
//! ```toml
//! [organizer]
//! time_threshold_minutes = 120
//!
//! [pricing.prices]
//! crown = 1350.0
//!
//! [pricing.durations]
//! crown = 75
//! ```
//!
//! Every section is optional; missing keys keep the built-in defaults. A
//! table given under `[organizer]` replaces the built-in table as a whole,
//! so per-treatment tweaks belong in `[pricing]`.

use serde::Deserialize;
use std::path::Path;
use toothplan_core::{OrganizerConfig, PlanError, PriceOverrides};

/// Maximum config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

/// Parsed `toothplan.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Organizer tables and limits.
    pub organizer: OrganizerConfig,
    /// Clinic price/duration overrides.
    pub pricing: PriceOverrides,
}

impl AppConfig {
    /// Parse config text. Table keys are normalized.
    pub fn from_toml(text: &str) -> Result<Self, PlanError> {
        let config: Self = toml::from_str(text)
            .map_err(|e| PlanError::Config(format!("Invalid TOML config: {}", e)))?;
        Ok(Self {
            organizer: config.organizer.normalized(),
            pricing: config.pricing.normalized(),
        })
    }

    /// Load from `path`, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, PlanError> {
        let Some(path) = path else {
            tracing::debug!("No config file given, using built-in tables");
            return Ok(Self::default());
        };

        let metadata = std::fs::metadata(path).map_err(|e| {
            PlanError::Io(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(PlanError::Config(format!(
                "Config file size {} bytes exceeds maximum allowed {} bytes",
                metadata.len(),
                MAX_CONFIG_FILE_SIZE
            )));
        }

        let text = std::fs::read_to_string(path).map_err(|e| {
            PlanError::Io(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        let config = Self::from_toml(&text)?;

        tracing::info!(
            path = %path.display(),
            price_overrides = !config.pricing.is_empty(),
            "Loaded config"
        );
        Ok(config)
    }
}
