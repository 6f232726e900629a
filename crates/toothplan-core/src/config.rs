//! # Organizer Configuration
//!
//! Lookup tables and limits the organizer consults. Built once at startup
//! and shared by `Arc` between engines; nothing here is a global.
//!
//! Every struct is `#[serde(default)]`, so a partial TOML/JSON document only
//! replaces the fields it names. Table keys are normalized with
//! [`normalize_token`] when [`OrganizerConfig::normalized`] runs.

use crate::primitives::{
    DEFAULT_TIME_THRESHOLD_MINUTES, FALLBACK_DURATION_MINUTES, LONG_STAGE_MINUTES,
};
use crate::urgency::normalize_token;
use crate::{Price, Urgency};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// TOP LEVEL
// =============================================================================

/// Everything the organizer needs besides the plan itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrganizerConfig {
    pub treatments: TreatmentTables,
    pub urgency: UrgencyTables,
    pub naming: StageNaming,
    /// Initial per-stage threshold for the editor, in minutes.
    pub time_threshold_minutes: u32,
    /// Stages longer than this get a validation warning.
    pub long_stage_minutes: u32,
}

impl Default for OrganizerConfig {
    fn default() -> Self {
        Self {
            treatments: TreatmentTables::default(),
            urgency: UrgencyTables::default(),
            naming: StageNaming::default(),
            time_threshold_minutes: DEFAULT_TIME_THRESHOLD_MINUTES,
            long_stage_minutes: LONG_STAGE_MINUTES,
        }
    }
}

impl OrganizerConfig {
    /// Normalize every table key so lookups match `normalize_token` output.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.treatments.durations = normalize_keys(self.treatments.durations);
        self.treatments.prices = normalize_keys(self.treatments.prices);
        self.urgency.conditions = normalize_keys(self.urgency.conditions);
        self.urgency.treatments = normalize_keys(self.urgency.treatments);
        for rule in &mut self.urgency.keywords {
            rule.keyword = rule.keyword.trim().to_lowercase();
        }
        self.urgency.keywords.retain(|rule| !rule.keyword.is_empty());
        for group in &mut self.naming.groups {
            group.treatments = group.treatments.iter().map(|t| normalize_token(t)).collect();
        }
        self
    }
}

fn normalize_keys<V>(table: BTreeMap<String, V>) -> BTreeMap<String, V> {
    table
        .into_iter()
        .map(|(key, value)| (normalize_token(&key), value))
        .collect()
}

// =============================================================================
// TREATMENT TABLES
// =============================================================================

/// System default durations and prices, keyed by normalized treatment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreatmentTables {
    pub durations: BTreeMap<String, u32>,
    pub prices: BTreeMap<String, Price>,
    pub fallback_duration_minutes: u32,
}

impl TreatmentTables {
    /// Table duration or the fallback.
    #[must_use]
    pub fn duration_of(&self, normalized_treatment: &str) -> u32 {
        self.durations
            .get(normalized_treatment)
            .copied()
            .unwrap_or(self.fallback_duration_minutes)
    }

    /// Table price or zero.
    #[must_use]
    pub fn price_of(&self, normalized_treatment: &str) -> Price {
        self.prices
            .get(normalized_treatment)
            .copied()
            .unwrap_or(Price::ZERO)
    }
}

impl Default for TreatmentTables {
    fn default() -> Self {
        // (treatment, minutes, price in whole currency units)
        const DEFAULTS: &[(&str, u32, u64)] = &[
            ("filling", 45, 150),
            ("composite-filling", 45, 180),
            ("inlay", 60, 650),
            ("onlay", 60, 750),
            ("veneer", 60, 900),
            ("crown", 90, 1200),
            ("bridge", 120, 2800),
            ("denture", 90, 1500),
            ("root-canal-treatment", 90, 900),
            ("pulpotomy", 45, 300),
            ("root-canal-retreatment", 120, 1100),
            ("extraction", 30, 200),
            ("surgical-extraction", 60, 450),
            ("scale-and-clean", 45, 120),
            ("deep-cleaning", 60, 250),
            ("scaling", 45, 150),
            ("root-planing", 60, 300),
            ("cleaning", 30, 90),
            ("fluoride-treatment", 15, 40),
            ("implant", 120, 3000),
            ("bone-graft", 90, 800),
            ("sinus-lift", 120, 1500),
            ("whitening", 60, 400),
        ];

        let mut durations = BTreeMap::new();
        let mut prices = BTreeMap::new();
        for &(treatment, minutes, major) in DEFAULTS {
            durations.insert(treatment.to_string(), minutes);
            prices.insert(
                treatment.to_string(),
                Price::from_cents(major.saturating_mul(100)),
            );
        }

        Self {
            durations,
            prices,
            fallback_duration_minutes: FALLBACK_DURATION_MINUTES,
        }
    }
}

// =============================================================================
// URGENCY TABLES
// =============================================================================

/// One entry of the ranked keyword table. Earlier rules win.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRule {
    pub keyword: String,
    pub urgency: Urgency,
}

impl KeywordRule {
    #[must_use]
    pub fn new(keyword: impl Into<String>, urgency: Urgency) -> Self {
        Self {
            keyword: keyword.into(),
            urgency,
        }
    }
}

/// Exact-match tables plus the ranked keyword fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UrgencyTables {
    pub conditions: BTreeMap<String, Urgency>,
    pub treatments: BTreeMap<String, Urgency>,
    pub keywords: Vec<KeywordRule>,
    /// Tier when neither table nor keyword matches.
    pub fallback: Urgency,
}

impl Default for UrgencyTables {
    fn default() -> Self {
        use Urgency::{High, Low, Medium};

        let conditions = [
            ("abscess", High),
            ("periapical-abscess", High),
            ("periapical-lesion", High),
            ("pulpitis", High),
            ("fractured-tooth", High),
            ("cracked-tooth", High),
            ("infection", High),
            ("deep-caries", High),
            ("caries", Medium),
            ("cavity", Medium),
            ("decay", Medium),
            ("impacted-tooth", Medium),
            ("periodontitis", Medium),
            ("failing-restoration", Medium),
            ("defective-filling", Medium),
            ("bone-loss", Medium),
            ("missing-tooth", Low),
            ("gingivitis", Low),
            ("calculus", Low),
            ("tartar", Low),
            ("plaque", Low),
            ("staining", Low),
            ("worn-filling", Low),
        ];
        let treatments = [
            ("root-canal-treatment", High),
            ("root-canal-retreatment", High),
            ("pulpotomy", High),
            ("extraction", High),
            ("surgical-extraction", High),
            ("filling", Medium),
            ("composite-filling", Medium),
            ("inlay", Medium),
            ("onlay", Medium),
            ("crown", Medium),
            ("deep-cleaning", Medium),
            ("root-planing", Medium),
            ("bone-graft", Medium),
            ("bridge", Low),
            ("denture", Low),
            ("implant", Low),
            ("sinus-lift", Low),
            ("veneer", Low),
            ("whitening", Low),
            ("scale-and-clean", Low),
            ("scaling", Low),
            ("cleaning", Low),
            ("fluoride-treatment", Low),
        ];
        let keywords = [
            ("abscess", High),
            ("infect", High),
            ("pain", High),
            ("fracture", High),
            ("swelling", High),
            ("pulp", High),
            ("lesion", High),
            ("caries", Medium),
            ("decay", Medium),
            ("cavity", Medium),
            ("root", Medium),
            ("crown", Medium),
            ("impact", Medium),
            ("perio", Medium),
            ("gingiv", Low),
            ("clean", Low),
            ("scal", Low),
            ("polish", Low),
            ("whiten", Low),
            ("cosmetic", Low),
        ];

        Self {
            conditions: conditions
                .iter()
                .map(|&(k, u)| (k.to_string(), u))
                .collect(),
            treatments: treatments
                .iter()
                .map(|&(k, u)| (k.to_string(), u))
                .collect(),
            keywords: keywords
                .iter()
                .map(|&(k, u)| KeywordRule::new(k, u))
                .collect(),
            fallback: Medium,
        }
    }
}

// =============================================================================
// STAGE NAMING
// =============================================================================

/// Name and focus for a generated stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTemplate {
    pub name: String,
    #[serde(default)]
    pub focus: String,
}

impl StageTemplate {
    fn new(name: &str, focus: &str) -> Self {
        Self {
            name: name.to_string(),
            focus: focus.to_string(),
        }
    }
}

/// A labelled family of treatments used for stage-name suggestions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreatmentGroup {
    pub label: String,
    pub treatments: Vec<String>,
}

impl TreatmentGroup {
    #[must_use]
    pub fn contains(&self, normalized_treatment: &str) -> bool {
        self.treatments.iter().any(|t| t == normalized_treatment)
    }
}

/// Names used when the organizer creates stages on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageNaming {
    /// Stage for high-urgency items.
    pub emergency: StageTemplate,
    /// Stage for medium-urgency items.
    pub restorative: StageTemplate,
    /// Stage for low-urgency items.
    pub preventive: StageTemplate,
    /// Single stage created for an empty plan.
    pub empty_plan: StageTemplate,
    /// Name suggested when no group matches and nothing is urgent.
    pub generic_name: String,
    /// `add_stage` without a name produces `"{prefix} {n}"`.
    pub new_stage_prefix: String,
    pub groups: Vec<TreatmentGroup>,
}

impl Default for StageNaming {
    fn default() -> Self {
        let group = |label: &str, treatments: &[&str]| TreatmentGroup {
            label: label.to_string(),
            treatments: treatments.iter().map(|t| (*t).to_string()).collect(),
        };

        Self {
            emergency: StageTemplate::new(
                "Emergency Care",
                "Relieve pain and treat infection or fractures first",
            ),
            restorative: StageTemplate::new(
                "Restorative Treatment",
                "Restore decayed and damaged teeth",
            ),
            preventive: StageTemplate::new(
                "Preventive Care",
                "Maintain gum health and prevent new problems",
            ),
            empty_plan: StageTemplate::new("Treatment Plan", ""),
            generic_name: "Treatment Stage".to_string(),
            new_stage_prefix: "Stage".to_string(),
            groups: vec![
                group(
                    "Restorative Treatment",
                    &["filling", "composite-filling", "inlay", "onlay", "veneer"],
                ),
                group("Prosthetic Work", &["crown", "bridge", "denture"]),
                group(
                    "Endodontic Treatment",
                    &["root-canal-treatment", "root-canal-retreatment", "pulpotomy"],
                ),
                group("Extractions", &["extraction", "surgical-extraction"]),
                group(
                    "Periodontal Care",
                    &[
                        "scale-and-clean",
                        "deep-cleaning",
                        "scaling",
                        "root-planing",
                        "cleaning",
                    ],
                ),
                group("Implant Surgery", &["implant", "bone-graft", "sinus-lift"]),
            ],
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tables_are_normalized() {
        let config = OrganizerConfig::default();
        assert_eq!(config.clone().normalized(), config);
    }

    #[test]
    fn normalized_rewrites_keys() {
        let mut config = OrganizerConfig::default();
        config
            .treatments
            .durations
            .insert("Night Guard".to_string(), 20);
        let config = config.normalized();
        assert_eq!(config.treatments.duration_of("night-guard"), 20);
    }

    #[test]
    fn unknown_treatment_falls_back() {
        let tables = TreatmentTables::default();
        assert_eq!(tables.duration_of("laser-therapy"), FALLBACK_DURATION_MINUTES);
        assert_eq!(tables.price_of("laser-therapy"), Price::ZERO);
        assert_eq!(tables.duration_of("crown"), 90);
    }

    #[test]
    fn partial_document_keeps_defaults() {
        let config: OrganizerConfig =
            serde_json::from_str(r#"{"long_stage_minutes": 240}"#).expect("deserialize");
        assert_eq!(config.long_stage_minutes, 240);
        assert_eq!(config.time_threshold_minutes, DEFAULT_TIME_THRESHOLD_MINUTES);
        assert!(!config.urgency.keywords.is_empty());
    }
}
