//! # Stage Validator
//!
//! Structural and clinical-ordering checks over a full stage list.
//!
//! | Check                                   | Severity |
//! |-----------------------------------------|----------|
//! | No stages                               | error    |
//! | Blank stage name                        | error    |
//! | Same item id twice in the plan          | error    |
//! | Stage without items                     | warning  |
//! | Stage longer than the long-stage limit  | warning  |
//! | Same treatment twice on a tooth, 1 stage| warning  |
//! | Crown/bridge before root canal          | warning  |
//! | Extraction after other treatment        | warning  |
//!
//! Errors block saving; warnings never do.
//!
//! The two ordering checks are substring heuristics over an implicit
//! partial order, not a precedence graph. They cover only those two
//! patterns.

use crate::config::OrganizerConfig;
use crate::urgency::normalize_token;
use crate::{ItemId, StageId, TreatmentItem, TreatmentStage, Urgency};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// =============================================================================
// RESULT TYPES
// =============================================================================

/// What a validation issue is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    NoStages,
    BlankStageName,
    DuplicateItemId,
    EmptyStage,
    LongStage,
    DuplicateTreatment,
    CrownBeforeRootCanal,
    ExtractionAfterTreatment,
}

/// A single error or warning, with a user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage_id: Option<StageId>,
    pub message: String,
}

impl ValidationIssue {
    fn new(kind: IssueKind, stage_id: Option<&StageId>, message: String) -> Self {
        Self {
            kind,
            stage_id: stage_id.cloned(),
            message,
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Outcome of [`StageValidator::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    fn from_issues(errors: Vec<ValidationIssue>, warnings: Vec<ValidationIssue>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    #[must_use]
    pub fn has_warning(&self, kind: IssueKind) -> bool {
        self.warnings.iter().any(|w| w.kind == kind)
    }

    #[must_use]
    pub fn has_error(&self, kind: IssueKind) -> bool {
        self.errors.iter().any(|e| e.kind == kind)
    }
}

/// Outcome of [`StageValidator::can_delete_stage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteCheck {
    pub can_delete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

// =============================================================================
// TREATMENT PATTERNS
// =============================================================================

fn is_crown_or_bridge(treatment: &str) -> bool {
    treatment.contains("crown") || treatment.contains("bridge")
}

fn is_root_canal(treatment: &str) -> bool {
    treatment.contains("root-canal")
}

fn is_extraction(treatment: &str) -> bool {
    treatment.contains("extraction")
}

/// Treatments that may precede an extraction without comment.
fn is_pre_extraction_compatible(treatment: &str) -> bool {
    is_extraction(treatment) || treatment.contains("clean") || treatment.contains("scal")
}

// =============================================================================
// STAGE VALIDATOR
// =============================================================================

/// Validator bound to a configuration.
#[derive(Debug, Clone, Copy)]
pub struct StageValidator<'a> {
    config: &'a OrganizerConfig,
}

impl<'a> StageValidator<'a> {
    #[must_use]
    pub fn new(config: &'a OrganizerConfig) -> Self {
        Self { config }
    }

    /// Run every check over the ordered stage list.
    #[must_use]
    pub fn validate(&self, stages: &[TreatmentStage]) -> ValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if stages.is_empty() {
            errors.push(ValidationIssue::new(
                IssueKind::NoStages,
                None,
                "The plan has no stages".to_string(),
            ));
            return ValidationResult::from_issues(errors, warnings);
        }

        self.check_structure(stages, &mut errors, &mut warnings);
        check_clinical_order(stages, &mut warnings);

        ValidationResult::from_issues(errors, warnings)
    }

    fn check_structure(
        &self,
        stages: &[TreatmentStage],
        errors: &mut Vec<ValidationIssue>,
        warnings: &mut Vec<ValidationIssue>,
    ) {
        let mut seen_ids: BTreeSet<&ItemId> = BTreeSet::new();
        let mut reported_ids: BTreeSet<&ItemId> = BTreeSet::new();

        for (position, stage) in stages.iter().enumerate() {
            let label = stage_label(stage, position);

            if stage.name.trim().is_empty() {
                errors.push(ValidationIssue::new(
                    IssueKind::BlankStageName,
                    Some(&stage.id),
                    format!("Stage {} needs a name", position.saturating_add(1)),
                ));
            }

            if stage.items.is_empty() {
                warnings.push(ValidationIssue::new(
                    IssueKind::EmptyStage,
                    Some(&stage.id),
                    format!("{} has no treatments", label),
                ));
            }

            if stage.total_time() > self.config.long_stage_minutes {
                warnings.push(ValidationIssue::new(
                    IssueKind::LongStage,
                    Some(&stage.id),
                    format!(
                        "{} is very long ({} min), consider splitting it",
                        label,
                        stage.total_time()
                    ),
                ));
            }

            let mut pairs: BTreeMap<(&str, String), usize> = BTreeMap::new();
            for item in &stage.items {
                let key = (item.tooth_number.trim(), normalize_token(&item.treatment));
                let count = pairs.entry(key).or_insert(0);
                *count = count.saturating_add(1);

                if !seen_ids.insert(&item.id) && reported_ids.insert(&item.id) {
                    errors.push(ValidationIssue::new(
                        IssueKind::DuplicateItemId,
                        Some(&stage.id),
                        format!("Treatment id {} is used more than once", item.id),
                    ));
                }
            }
            for ((tooth, treatment), count) in pairs {
                if count > 1 && !tooth.is_empty() {
                    warnings.push(ValidationIssue::new(
                        IssueKind::DuplicateTreatment,
                        Some(&stage.id),
                        format!(
                            "Tooth {}: {} appears {} times in {}",
                            tooth, treatment, count, label
                        ),
                    ));
                }
            }
        }
    }

    /// Whether a stage may be deleted. Only empty stages can go.
    #[must_use]
    pub fn can_delete_stage(stage: &TreatmentStage) -> DeleteCheck {
        if stage.items.is_empty() {
            DeleteCheck {
                can_delete: true,
                reason: None,
            }
        } else {
            DeleteCheck {
                can_delete: false,
                reason: Some(format!(
                    "Move or remove the {} treatment(s) in this stage before deleting it",
                    stage.items.len()
                )),
            }
        }
    }

    /// Suggest a stage name for a set of items.
    ///
    /// A treatment group label if every item falls in one group, otherwise
    /// the emergency name if anything is high urgency, otherwise the
    /// generic name.
    #[must_use]
    pub fn suggest_stage_name(&self, items: &[TreatmentItem]) -> String {
        let naming = &self.config.naming;
        if items.is_empty() {
            return naming.generic_name.clone();
        }

        let treatments: Vec<String> = items
            .iter()
            .map(|item| normalize_token(&item.treatment))
            .collect();

        if let Some(group) = naming
            .groups
            .iter()
            .find(|group| treatments.iter().all(|t| group.contains(t)))
        {
            return group.label.clone();
        }

        if items.iter().any(|item| item.urgency == Some(Urgency::High)) {
            return naming.emergency.name.clone();
        }

        naming.generic_name.clone()
    }
}

fn stage_label(stage: &TreatmentStage, position: usize) -> String {
    let name = stage.name.trim();
    if name.is_empty() {
        format!("Stage {}", position.saturating_add(1))
    } else {
        format!("\"{}\"", name)
    }
}

// =============================================================================
// CLINICAL ORDERING
// =============================================================================

/// Per-tooth ordering heuristics across the stage sequence.
fn check_clinical_order(stages: &[TreatmentStage], warnings: &mut Vec<ValidationIssue>) {
    // tooth -> [(stage position, normalized treatment)] in plan order
    let mut by_tooth: BTreeMap<&str, Vec<(usize, String)>> = BTreeMap::new();
    for (position, stage) in stages.iter().enumerate() {
        for item in &stage.items {
            let tooth = item.tooth_number.trim();
            if tooth.is_empty() {
                continue;
            }
            by_tooth
                .entry(tooth)
                .or_default()
                .push((position, normalize_token(&item.treatment)));
        }
    }

    for (tooth, entries) in &by_tooth {
        let mut reported: BTreeSet<(IssueKind, usize, usize)> = BTreeSet::new();

        for (earlier, earlier_treatment) in entries {
            for (later, later_treatment) in entries {
                if later <= earlier {
                    continue;
                }

                if is_crown_or_bridge(earlier_treatment)
                    && is_root_canal(later_treatment)
                    && reported.insert((IssueKind::CrownBeforeRootCanal, *earlier, *later))
                {
                    warnings.push(ValidationIssue::new(
                        IssueKind::CrownBeforeRootCanal,
                        Some(&stages[*earlier].id),
                        format!(
                            "Tooth {}: crown/bridge in {} is scheduled before root canal in {}",
                            tooth,
                            stage_label(&stages[*earlier], *earlier),
                            stage_label(&stages[*later], *later)
                        ),
                    ));
                }

                if is_extraction(later_treatment)
                    && !is_pre_extraction_compatible(earlier_treatment)
                    && reported.insert((IssueKind::ExtractionAfterTreatment, *earlier, *later))
                {
                    warnings.push(ValidationIssue::new(
                        IssueKind::ExtractionAfterTreatment,
                        Some(&stages[*later].id),
                        format!(
                            "Tooth {}: extraction in {} comes after other treatments in {}",
                            tooth,
                            stage_label(&stages[*later], *later),
                            stage_label(&stages[*earlier], *earlier)
                        ),
                    ));
                }
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Price;
    use crate::metrics::StageMetrics;

    fn item(id: &str, tooth: &str, treatment: &str, minutes: u32) -> TreatmentItem {
        TreatmentItem {
            id: ItemId::new(id),
            tooth_number: tooth.into(),
            condition: "caries".into(),
            treatment: treatment.into(),
            estimated_time: minutes,
            price: Price::ZERO,
            urgency: None,
            listed_price: None,
        }
    }

    fn stage(id: &str, name: &str, items: Vec<TreatmentItem>) -> TreatmentStage {
        let mut stage = TreatmentStage::new(StageId::new(id), name, "").with_items(items);
        StageMetrics::apply(&mut stage);
        stage
    }

    fn validate(stages: &[TreatmentStage]) -> ValidationResult {
        let config = OrganizerConfig::default();
        StageValidator::new(&config).validate(stages)
    }

    #[test]
    fn empty_plan_is_invalid() {
        let result = validate(&[]);
        assert!(!result.is_valid);
        assert!(result.has_error(IssueKind::NoStages));
    }

    #[test]
    fn blank_name_is_error() {
        let result = validate(&[stage("s1", "   ", vec![item("a", "11", "filling", 30)])]);
        assert!(!result.is_valid);
        assert!(result.has_error(IssueKind::BlankStageName));
    }

    #[test]
    fn empty_and_long_stages_warn_only() {
        let result = validate(&[
            stage("s1", "Empty", vec![]),
            stage(
                "s2",
                "Marathon",
                vec![item("a", "11", "crown", 100), item("b", "12", "crown", 100)],
            ),
        ]);
        assert!(result.is_valid);
        assert!(result.has_warning(IssueKind::EmptyStage));
        assert!(result.has_warning(IssueKind::LongStage));
    }

    #[test]
    fn exactly_long_limit_does_not_warn() {
        let result = validate(&[stage(
            "s1",
            "Visit",
            vec![item("a", "11", "crown", 90), item("b", "12", "crown", 90)],
        )]);
        assert!(!result.has_warning(IssueKind::LongStage));
    }

    #[test]
    fn duplicate_treatment_same_tooth_same_stage() {
        let result = validate(&[stage(
            "s1",
            "Visit",
            vec![item("a", "11", "Filling", 30), item("b", "11", "filling", 30)],
        )]);
        assert!(result.has_warning(IssueKind::DuplicateTreatment));
    }

    #[test]
    fn duplicate_across_stages_is_not_flagged() {
        let result = validate(&[
            stage("s1", "One", vec![item("a", "11", "filling", 30)]),
            stage("s2", "Two", vec![item("b", "11", "filling", 30)]),
        ]);
        assert!(!result.has_warning(IssueKind::DuplicateTreatment));
    }

    #[test]
    fn duplicate_item_id_is_error() {
        let result = validate(&[
            stage("s1", "One", vec![item("a", "11", "filling", 30)]),
            stage("s2", "Two", vec![item("a", "12", "filling", 30)]),
        ]);
        assert!(result.has_error(IssueKind::DuplicateItemId));
    }

    #[test]
    fn crown_before_root_canal_warns() {
        let result = validate(&[
            stage("s1", "One", vec![item("a", "11", "crown", 90)]),
            stage("s2", "Two", vec![item("b", "11", "root-canal-treatment", 90)]),
        ]);
        assert!(result.is_valid);
        let warning = result
            .warnings
            .iter()
            .find(|w| w.kind == IssueKind::CrownBeforeRootCanal)
            .expect("warning present");
        assert!(warning.message.to_lowercase().contains("tooth 11"));
        assert!(warning.message.contains("before root canal"));
    }

    #[test]
    fn root_canal_before_crown_is_fine() {
        let result = validate(&[
            stage("s1", "One", vec![item("a", "11", "root canal treatment", 90)]),
            stage("s2", "Two", vec![item("b", "11", "crown", 90)]),
        ]);
        assert!(!result.has_warning(IssueKind::CrownBeforeRootCanal));
    }

    #[test]
    fn extraction_after_filling_warns() {
        let result = validate(&[
            stage("s1", "One", vec![item("a", "36", "filling", 30)]),
            stage("s2", "Two", vec![item("b", "36", "surgical-extraction", 60)]),
        ]);
        assert!(result.has_warning(IssueKind::ExtractionAfterTreatment));
    }

    #[test]
    fn extraction_after_cleaning_is_fine() {
        let result = validate(&[
            stage("s1", "One", vec![item("a", "36", "scale-and-clean", 30)]),
            stage("s2", "Two", vec![item("b", "36", "extraction", 30)]),
        ]);
        assert!(!result.has_warning(IssueKind::ExtractionAfterTreatment));
    }

    #[test]
    fn can_delete_only_empty_stage() {
        let empty = stage("s1", "One", vec![]);
        let full = stage("s2", "Two", vec![item("a", "11", "filling", 30)]);

        assert_eq!(
            StageValidator::can_delete_stage(&empty),
            DeleteCheck {
                can_delete: true,
                reason: None
            }
        );
        let check = StageValidator::can_delete_stage(&full);
        assert!(!check.can_delete);
        assert!(check.reason.is_some_and(|r| !r.is_empty()));
    }

    #[test]
    fn suggest_name_from_group() {
        let config = OrganizerConfig::default();
        let validator = StageValidator::new(&config);
        let items = vec![item("a", "11", "crown", 90), item("b", "12", "Bridge", 90)];
        assert_eq!(validator.suggest_stage_name(&items), "Prosthetic Work");
    }

    #[test]
    fn suggest_name_emergency_then_generic() {
        let config = OrganizerConfig::default();
        let validator = StageValidator::new(&config);

        let mut urgent = item("a", "11", "filling", 30);
        urgent.urgency = Some(Urgency::High);
        let mixed = vec![urgent, item("b", "12", "crown", 90)];
        assert_eq!(validator.suggest_stage_name(&mixed), "Emergency Care");

        let calm = vec![item("a", "11", "filling", 30), item("b", "12", "crown", 90)];
        assert_eq!(validator.suggest_stage_name(&calm), "Treatment Stage");
        assert_eq!(validator.suggest_stage_name(&[]), "Treatment Stage");
    }
}
