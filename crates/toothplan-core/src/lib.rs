//! # toothplan-core
//!
//! The treatment-stage organizer for dental plans - THE LOGIC.
//!
//! This crate turns clinical findings into staged treatment plans and
//! keeps an edited plan consistent while a clinician rearranges it.
//!
//! ## Components
//!
//! - `urgency` → classify conditions and treatments into high/medium/low
//! - `metrics` → price/duration lookup and time/cost aggregation
//! - `validator` → structural errors, clinical warnings, name suggestions
//! - `serializer` → wire ↔ internal conversion and the default stage layout
//! - `editor` → the editing state machine over a plan
//!
//! ## Constraints
//!
//! - Synchronous and single-threaded: every edit recomputes derived state
//!   before it returns
//! - Configuration is passed in explicitly, never read from globals
//! - Money is integer cents; no float arithmetic on prices
//! - NO async, NO I/O

// =============================================================================
// MODULES
// =============================================================================

pub mod config;
pub mod editor;
pub mod ids;
pub mod metrics;
pub mod primitives;
pub mod serializer;
pub mod types;
pub mod urgency;
pub mod validator;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    DeleteStageError, Finding, ItemId, NewTreatmentItem, PlanError, Price, StageId, StagePatch,
    TreatmentItem, TreatmentStage, Urgency,
};

// =============================================================================
// RE-EXPORTS: Organizer
// =============================================================================

pub use config::{
    KeywordRule, OrganizerConfig, StageNaming, StageTemplate, TreatmentGroup, TreatmentTables,
    UrgencyTables,
};
pub use editor::{EditorCommand, EditorSnapshot, EditorState, PlanSnapshot, StageEditor};
pub use ids::IdAllocator;
pub use metrics::{NoOverrides, PriceCatalog, PriceOverrides, StageMetrics, Totals};
pub use serializer::{StageFormat, StageInput, StageSerializer, WireItem, WireStage};
pub use urgency::{TokenKind, UrgencyClassifier, normalize_token};
pub use validator::{DeleteCheck, IssueKind, StageValidator, ValidationIssue, ValidationResult};
