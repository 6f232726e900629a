//! # Stage Editor
//!
//! The editing state machine behind the treatment-plan screen.
//!
//! The editor owns a single composite state:
//! `{stages, original_stages, is_dirty, time_threshold}`.
//!
//! - Every mutation goes through one internal `update_stages` step that
//!   applies the change, recomputes every stage's totals and order, marks
//!   the plan dirty, and refreshes the derived values (global totals,
//!   validation).
//! - Operations naming an unknown stage or item are no-ops and return `false`.
//! - `delete_stage` is the only operation that can be refused; it returns a
//!   typed [`DeleteStageError`] and leaves the state untouched.
//! - `original_stages` is an immutable [`PlanSnapshot`] taken at
//!   construction and used only by [`StageEditor::reset_to_original`].
//!
//! Single-threaded and synchronous: each call completes, including
//! recomputation, before it returns.

use crate::config::OrganizerConfig;
use crate::ids::IdAllocator;
use crate::metrics::{NoOverrides, PriceCatalog, StageMetrics, Totals};
use crate::serializer::{StageSerializer, WireStage};
use crate::urgency::UrgencyClassifier;
use crate::validator::{StageValidator, ValidationResult};
use crate::{
    DeleteStageError, Finding, ItemId, NewTreatmentItem, StageId, StagePatch, TreatmentItem,
    TreatmentStage,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// =============================================================================
// PLAN SNAPSHOT
// =============================================================================

/// Immutable copy of a stage list.
///
/// There is no way to mutate a snapshot; restoring hands out a fresh deep
/// copy, so the working plan and the snapshot never share data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSnapshot(Arc<[TreatmentStage]>);

impl PlanSnapshot {
    #[must_use]
    pub fn capture(stages: &[TreatmentStage]) -> Self {
        Self(Arc::from(stages.to_vec()))
    }

    #[must_use]
    pub fn stages(&self) -> &[TreatmentStage] {
        &self.0
    }

    /// A fresh, independently owned copy of the captured stages.
    #[must_use]
    pub fn restore(&self) -> Vec<TreatmentStage> {
        self.0.to_vec()
    }
}

// =============================================================================
// EDITOR STATE
// =============================================================================

/// The editor's composite state.
#[derive(Debug, Clone)]
pub struct EditorState {
    stages: Vec<TreatmentStage>,
    original_stages: PlanSnapshot,
    is_dirty: bool,
    time_threshold: u32,
}

impl EditorState {
    #[must_use]
    pub fn stages(&self) -> &[TreatmentStage] {
        &self.stages
    }

    #[must_use]
    pub fn original_stages(&self) -> &[TreatmentStage] {
        self.original_stages.stages()
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }

    #[must_use]
    pub fn time_threshold(&self) -> u32 {
        self.time_threshold
    }
}

/// Serializable view of the editor for hosts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorSnapshot {
    pub stages: Vec<TreatmentStage>,
    pub global_totals: Totals,
    pub validation: ValidationResult,
    pub is_dirty: bool,
    pub can_save: bool,
    pub time_threshold: u32,
    pub over_threshold: Vec<StageId>,
}

// =============================================================================
// EDITOR COMMANDS
// =============================================================================

/// One editor operation as data, for scripted or remote edits.
///
/// JSON form: `{"op": "move_item", "item_id": "item-3", ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum EditorCommand {
    MoveItem {
        item_id: ItemId,
        from_stage_id: StageId,
        to_stage_id: StageId,
        #[serde(default)]
        insert_index: usize,
    },
    ReorderItems {
        stage_id: StageId,
        from_index: usize,
        to_index: usize,
    },
    AddStage {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        focus: Option<String>,
    },
    DeleteStage {
        stage_id: StageId,
    },
    MoveStage {
        stage_id: StageId,
        to_index: usize,
    },
    UpdateStage {
        stage_id: StageId,
        #[serde(flatten)]
        patch: StagePatch,
    },
    AddItem {
        stage_id: StageId,
        item: NewTreatmentItem,
    },
    AddFinding {
        stage_id: StageId,
        finding: Finding,
    },
    RemoveItem {
        stage_id: StageId,
        item_id: ItemId,
    },
    UpdateItem {
        stage_id: StageId,
        item: TreatmentItem,
    },
    SetTimeThreshold {
        minutes: u32,
    },
    ResetToOriginal,
    ResetToAiSuggestion {
        stages: Vec<TreatmentStage>,
    },
}

// =============================================================================
// STAGE EDITOR
// =============================================================================

/// Owns the plan being edited and everything derived from it.
#[derive(Debug, Clone)]
pub struct StageEditor {
    config: Arc<OrganizerConfig>,
    metrics: StageMetrics,
    ids: IdAllocator,
    state: EditorState,
    global_totals: Totals,
    validation: ValidationResult,
}

impl StageEditor {
    /// Create an editor over `initial` stages.
    ///
    /// An empty `initial` starts from the single default stage. The
    /// computed starting plan becomes the original snapshot; the editor
    /// starts clean.
    #[must_use]
    pub fn new(
        config: Arc<OrganizerConfig>,
        catalog: Arc<dyn PriceCatalog>,
        initial: Vec<TreatmentStage>,
    ) -> Self {
        let mut ids = IdAllocator::seeded_from(&initial);
        let mut stages = if initial.is_empty() {
            StageSerializer::new(&config).default_stages(Vec::new(), &mut ids)
        } else {
            initial
        };
        recompute(&mut stages);

        let state = EditorState {
            original_stages: PlanSnapshot::capture(&stages),
            stages,
            is_dirty: false,
            time_threshold: config.time_threshold_minutes,
        };
        let metrics = StageMetrics::new(Arc::clone(&config), catalog);

        let mut editor = Self {
            config,
            metrics,
            ids,
            state,
            global_totals: Totals::default(),
            validation: ValidationResult::default(),
        };
        editor.refresh();
        editor
    }

    /// Editor with built-in tables and no clinic overrides.
    #[must_use]
    pub fn with_defaults(initial: Vec<TreatmentStage>) -> Self {
        Self::new(
            Arc::new(OrganizerConfig::default()),
            Arc::new(NoOverrides),
            initial,
        )
    }

    /// Editor whose starting plan is the default layout for `findings`.
    #[must_use]
    pub fn from_findings(
        config: Arc<OrganizerConfig>,
        catalog: Arc<dyn PriceCatalog>,
        findings: &[Finding],
    ) -> Self {
        let mut ids = IdAllocator::new();
        let serializer = StageSerializer::new(&config);
        let items = serializer.findings_to_items(findings, &mut ids);
        let stages = serializer.default_stages(items, &mut ids);
        Self::new(config, catalog, stages)
    }

    // =========================================================================
    // READ ACCESS
    // =========================================================================

    #[must_use]
    pub fn state(&self) -> &EditorState {
        &self.state
    }

    #[must_use]
    pub fn stages(&self) -> &[TreatmentStage] {
        &self.state.stages
    }

    #[must_use]
    pub fn original_stages(&self) -> &[TreatmentStage] {
        self.state.original_stages()
    }

    #[must_use]
    pub fn stage(&self, stage_id: &StageId) -> Option<&TreatmentStage> {
        self.state.stages.iter().find(|s| &s.id == stage_id)
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.state.is_dirty
    }

    #[must_use]
    pub fn time_threshold(&self) -> u32 {
        self.state.time_threshold
    }

    #[must_use]
    pub fn global_totals(&self) -> Totals {
        self.global_totals
    }

    #[must_use]
    pub fn validation(&self) -> &ValidationResult {
        &self.validation
    }

    /// Saving needs unsaved changes and no validation errors.
    #[must_use]
    pub fn can_save(&self) -> bool {
        self.validation.is_valid && self.state.is_dirty
    }

    #[must_use]
    pub fn config(&self) -> &OrganizerConfig {
        &self.config
    }

    #[must_use]
    pub fn metrics(&self) -> &StageMetrics {
        &self.metrics
    }

    /// Stages whose total time is strictly above the current threshold.
    #[must_use]
    pub fn stages_over_threshold(&self) -> Vec<&TreatmentStage> {
        self.state
            .stages
            .iter()
            .filter(|s| StageMetrics::over_threshold(s, self.state.time_threshold))
            .collect()
    }

    /// Name suggestion for a stage based on its current items.
    #[must_use]
    pub fn suggest_stage_name(&self, stage_id: &StageId) -> Option<String> {
        self.stage(stage_id)
            .map(|s| StageValidator::new(&self.config).suggest_stage_name(&s.items))
    }

    /// The current plan in the backend wire shape.
    #[must_use]
    pub fn to_wire(&self) -> Vec<WireStage> {
        StageSerializer::serialize(&self.state.stages)
    }

    #[must_use]
    pub fn snapshot(&self) -> EditorSnapshot {
        EditorSnapshot {
            stages: self.state.stages.clone(),
            global_totals: self.global_totals,
            validation: self.validation.clone(),
            is_dirty: self.state.is_dirty,
            can_save: self.can_save(),
            time_threshold: self.state.time_threshold,
            over_threshold: self
                .stages_over_threshold()
                .into_iter()
                .map(|s| s.id.clone())
                .collect(),
        }
    }

    // =========================================================================
    // MUTATIONS
    // =========================================================================

    /// Move an item to another stage (or elsewhere in the same stage).
    ///
    /// `insert_index` is clamped to the target's length; 0 puts the item on
    /// top.
    pub fn move_item_between_stages(
        &mut self,
        item_id: &ItemId,
        from_stage_id: &StageId,
        to_stage_id: &StageId,
        insert_index: usize,
    ) -> bool {
        let (Some(from), Some(to)) = (
            self.stage_index(from_stage_id),
            self.stage_index(to_stage_id),
        ) else {
            tracing::debug!(%from_stage_id, %to_stage_id, "move_item: unknown stage");
            return false;
        };
        let Some(position) = self.state.stages[from].position_of(item_id) else {
            tracing::debug!(%item_id, %from_stage_id, "move_item: item not in source stage");
            return false;
        };

        self.update_stages(|stages| {
            let item = stages[from].items.remove(position);
            let target = &mut stages[to].items;
            let index = insert_index.min(target.len());
            target.insert(index, item);
        });
        true
    }

    /// Move an item within one stage.
    pub fn reorder_items_in_stage(
        &mut self,
        stage_id: &StageId,
        from_index: usize,
        to_index: usize,
    ) -> bool {
        let Some(index) = self.stage_index(stage_id) else {
            tracing::debug!(%stage_id, "reorder_items: unknown stage");
            return false;
        };
        if from_index >= self.state.stages[index].items.len() {
            return false;
        }

        self.update_stages(|stages| {
            let items = &mut stages[index].items;
            let item = items.remove(from_index);
            let to = to_index.min(items.len());
            items.insert(to, item);
        });
        true
    }

    /// Append an empty stage. Returns its id.
    pub fn add_stage(&mut self, name: Option<String>, focus: Option<String>) -> StageId {
        let id = self.ids.next_stage_id();
        let name = name.unwrap_or_else(|| {
            format!(
                "{} {}",
                self.config.naming.new_stage_prefix,
                self.state.stages.len().saturating_add(1)
            )
        });
        let stage = TreatmentStage::new(id.clone(), name, focus.unwrap_or_default());
        self.update_stages(|stages| stages.push(stage));
        id
    }

    /// Delete an empty stage.
    ///
    /// Refused when the stage still has items or is the only stage. An
    /// unknown id is a no-op.
    pub fn delete_stage(&mut self, stage_id: &StageId) -> Result<(), DeleteStageError> {
        let Some(index) = self.stage_index(stage_id) else {
            tracing::debug!(%stage_id, "delete_stage: unknown stage");
            return Ok(());
        };

        let stage = &self.state.stages[index];
        if !stage.items.is_empty() {
            return Err(DeleteStageError::HasItems {
                stage_id: stage_id.clone(),
                item_count: stage.items.len(),
            });
        }
        if self.state.stages.len() <= 1 {
            return Err(DeleteStageError::LastStageRemaining {
                stage_id: stage_id.clone(),
            });
        }

        self.update_stages(|stages| {
            stages.remove(index);
        });
        Ok(())
    }

    /// Move a whole stage to a new position.
    pub fn move_stage(&mut self, stage_id: &StageId, to_index: usize) -> bool {
        let Some(from) = self.stage_index(stage_id) else {
            tracing::debug!(%stage_id, "move_stage: unknown stage");
            return false;
        };

        self.update_stages(|stages| {
            let stage = stages.remove(from);
            let to = to_index.min(stages.len());
            stages.insert(to, stage);
        });
        true
    }

    /// Shallow-merge name/focus into a stage.
    pub fn update_stage(&mut self, stage_id: &StageId, patch: StagePatch) -> bool {
        let Some(index) = self.stage_index(stage_id) else {
            tracing::debug!(%stage_id, "update_stage: unknown stage");
            return false;
        };

        self.update_stages(|stages| patch.apply_to(&mut stages[index]));
        true
    }

    /// Append a caller-built item. Missing urgency is classified from the
    /// item's condition and treatment. Returns the new id.
    pub fn add_treatment_item(
        &mut self,
        stage_id: &StageId,
        item: NewTreatmentItem,
    ) -> Option<ItemId> {
        let Some(index) = self.stage_index(stage_id) else {
            tracing::debug!(%stage_id, "add_item: unknown stage");
            return None;
        };

        let id = self.ids.next_item_id();
        let mut item = item.with_id(id.clone());
        if item.urgency.is_none() {
            let classifier = UrgencyClassifier::new(&self.config.urgency);
            item.urgency = Some(classifier.finding_urgency(&item.condition, &item.treatment));
        }

        self.update_stages(|stages| stages[index].items.push(item));
        Some(id)
    }

    /// Append a finding, priced and timed through the metrics lookup.
    pub fn add_finding(&mut self, stage_id: &StageId, finding: Finding) -> Option<ItemId> {
        if !finding.is_complete() {
            tracing::debug!(%stage_id, "add_finding: incomplete finding ignored");
            return None;
        }

        let item = NewTreatmentItem {
            estimated_time: self.metrics.duration_of(&finding.treatment),
            price: finding
                .price
                .unwrap_or_else(|| self.metrics.price_of(&finding.treatment)),
            tooth_number: finding.tooth.trim().to_string(),
            condition: finding.condition,
            treatment: finding.treatment,
            urgency: None,
        };
        self.add_treatment_item(stage_id, item)
    }

    pub fn remove_treatment_item(&mut self, stage_id: &StageId, item_id: &ItemId) -> bool {
        let Some(index) = self.stage_index(stage_id) else {
            tracing::debug!(%stage_id, "remove_item: unknown stage");
            return false;
        };
        let Some(position) = self.state.stages[index].position_of(item_id) else {
            tracing::debug!(%item_id, %stage_id, "remove_item: unknown item");
            return false;
        };

        self.update_stages(|stages| {
            stages[index].items.remove(position);
        });
        true
    }

    /// Replace the item whose id matches `updated.id`.
    pub fn update_treatment_item(&mut self, stage_id: &StageId, updated: TreatmentItem) -> bool {
        let Some(index) = self.stage_index(stage_id) else {
            tracing::debug!(%stage_id, "update_item: unknown stage");
            return false;
        };
        let Some(position) = self.state.stages[index].position_of(&updated.id) else {
            tracing::debug!(item_id = %updated.id, %stage_id, "update_item: unknown item");
            return false;
        };

        self.update_stages(|stages| stages[index].items[position] = updated);
        true
    }

    /// Change the over-threshold limit. A view setting; does not dirty the plan.
    pub fn set_time_threshold(&mut self, minutes: u32) {
        self.state.time_threshold = minutes;
    }

    /// Discard all edits and return to the original snapshot.
    pub fn reset_to_original(&mut self) {
        self.state.stages = self.state.original_stages.restore();
        self.state.is_dirty = false;
        self.refresh();
        tracing::info!(stages = self.state.stages.len(), "plan reset to original");
    }

    /// Install a fresh AI-suggested plan. The original snapshot is kept,
    /// and the plan counts as changed.
    pub fn reset_to_ai_suggestion(&mut self, ai_stages: Vec<TreatmentStage>) {
        self.ids.observe_stages(&ai_stages);
        let mut stages = if ai_stages.is_empty() {
            StageSerializer::new(&self.config).default_stages(Vec::new(), &mut self.ids)
        } else {
            ai_stages
        };
        recompute(&mut stages);

        self.state.stages = stages;
        self.state.is_dirty = true;
        self.refresh();
        tracing::info!(stages = self.state.stages.len(), "plan replaced by AI suggestion");
    }

    /// Apply a command. Returns whether the plan changed.
    pub fn apply(&mut self, command: EditorCommand) -> Result<bool, DeleteStageError> {
        let changed = match command {
            EditorCommand::MoveItem {
                item_id,
                from_stage_id,
                to_stage_id,
                insert_index,
            } => self.move_item_between_stages(&item_id, &from_stage_id, &to_stage_id, insert_index),
            EditorCommand::ReorderItems {
                stage_id,
                from_index,
                to_index,
            } => self.reorder_items_in_stage(&stage_id, from_index, to_index),
            EditorCommand::AddStage { name, focus } => {
                self.add_stage(name, focus);
                true
            }
            EditorCommand::DeleteStage { stage_id } => {
                let before = self.state.stages.len();
                self.delete_stage(&stage_id)?;
                self.state.stages.len() != before
            }
            EditorCommand::MoveStage { stage_id, to_index } => {
                self.move_stage(&stage_id, to_index)
            }
            EditorCommand::UpdateStage { stage_id, patch } => self.update_stage(&stage_id, patch),
            EditorCommand::AddItem { stage_id, item } => {
                self.add_treatment_item(&stage_id, item).is_some()
            }
            EditorCommand::AddFinding { stage_id, finding } => {
                self.add_finding(&stage_id, finding).is_some()
            }
            EditorCommand::RemoveItem { stage_id, item_id } => {
                self.remove_treatment_item(&stage_id, &item_id)
            }
            EditorCommand::UpdateItem { stage_id, item } => {
                self.update_treatment_item(&stage_id, item)
            }
            EditorCommand::SetTimeThreshold { minutes } => {
                self.set_time_threshold(minutes);
                false
            }
            EditorCommand::ResetToOriginal => {
                self.reset_to_original();
                true
            }
            EditorCommand::ResetToAiSuggestion { stages } => {
                self.reset_to_ai_suggestion(stages);
                true
            }
        };
        Ok(changed)
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    fn stage_index(&self, stage_id: &StageId) -> Option<usize> {
        self.state.stages.iter().position(|s| &s.id == stage_id)
    }

    /// The single path for plan mutations.
    fn update_stages(&mut self, transform: impl FnOnce(&mut Vec<TreatmentStage>)) {
        transform(&mut self.state.stages);
        recompute(&mut self.state.stages);
        self.state.is_dirty = true;
        self.refresh();
    }

    fn refresh(&mut self) {
        self.global_totals = StageMetrics::aggregate_all(&self.state.stages);
        self.validation = StageValidator::new(&self.config).validate(&self.state.stages);
    }
}

/// Recompute totals and renumber `order` to match position.
fn recompute(stages: &mut [TreatmentStage]) {
    for (position, stage) in stages.iter_mut().enumerate() {
        stage.set_order(position);
        StageMetrics::apply(stage);
    }
}

// =============================================================================
// TESTS
// =============================================================================
