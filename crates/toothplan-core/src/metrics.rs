//! # Stage Metrics
//!
//! Price/duration lookup and time/cost aggregation.
//!
//! - Lookups consult the injected [`PriceCatalog`] first (clinic overrides,
//!   used only when the value is > 0), then the default tables from
//!   [`OrganizerConfig`], then fall back to price 0 / the fallback duration.
//! - Stage totals are a sum over items. Global totals are a sum over the
//!   stages' already-computed totals, never over items again.

use crate::config::OrganizerConfig;
use crate::urgency::normalize_token;
use crate::{Price, TreatmentStage};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

// =============================================================================
// PRICE CATALOG (external collaborator)
// =============================================================================

/// Clinic-specific price and duration source.
///
/// Implemented by the surrounding layer (a pricing service, a settings
/// page, a config file). Treatments are passed normalized.
pub trait PriceCatalog: Send + Sync {
    fn price(&self, treatment: &str) -> Option<Price>;
    fn duration(&self, treatment: &str) -> Option<u32>;
}

/// Catalog with no clinic values; every lookup falls through to defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOverrides;

impl PriceCatalog for NoOverrides {
    fn price(&self, _treatment: &str) -> Option<Price> {
        None
    }

    fn duration(&self, _treatment: &str) -> Option<u32> {
        None
    }
}

/// In-memory clinic overrides, keyed by normalized treatment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceOverrides {
    prices: BTreeMap<String, Price>,
    durations: BTreeMap<String, u32>,
}

impl PriceOverrides {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_price(&mut self, treatment: &str, price: Price) {
        self.prices.insert(normalize_token(treatment), price);
    }

    pub fn insert_duration(&mut self, treatment: &str, minutes: u32) {
        self.durations.insert(normalize_token(treatment), minutes);
    }

    /// Re-key after deserializing hand-written tables.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            prices: self
                .prices
                .into_iter()
                .map(|(k, v)| (normalize_token(&k), v))
                .collect(),
            durations: self
                .durations
                .into_iter()
                .map(|(k, v)| (normalize_token(&k), v))
                .collect(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prices.is_empty() && self.durations.is_empty()
    }
}

impl PriceCatalog for PriceOverrides {
    fn price(&self, treatment: &str) -> Option<Price> {
        self.prices.get(treatment).copied()
    }

    fn duration(&self, treatment: &str) -> Option<u32> {
        self.durations.get(treatment).copied()
    }
}

// =============================================================================
// TOTALS
// =============================================================================

/// Aggregate chair time and cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub total_time: u32,
    pub total_cost: Price,
}

// =============================================================================
// STAGE METRICS
// =============================================================================

/// Lookup and aggregation over stages.
#[derive(Clone)]
pub struct StageMetrics {
    config: Arc<OrganizerConfig>,
    catalog: Arc<dyn PriceCatalog>,
}

impl std::fmt::Debug for StageMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageMetrics").finish_non_exhaustive()
    }
}

impl StageMetrics {
    #[must_use]
    pub fn new(config: Arc<OrganizerConfig>, catalog: Arc<dyn PriceCatalog>) -> Self {
        Self { config, catalog }
    }

    /// Price for a treatment: clinic override if > 0, else table, else 0.
    #[must_use]
    pub fn price_of(&self, treatment: &str) -> Price {
        let key = normalize_token(treatment);
        self.catalog
            .price(&key)
            .filter(|price| !price.is_zero())
            .unwrap_or_else(|| self.config.treatments.price_of(&key))
    }

    /// Duration for a treatment: clinic override if > 0, else table, else fallback.
    #[must_use]
    pub fn duration_of(&self, treatment: &str) -> u32 {
        let key = normalize_token(treatment);
        self.catalog
            .duration(&key)
            .filter(|&minutes| minutes > 0)
            .unwrap_or_else(|| self.config.treatments.duration_of(&key))
    }

    /// Sum of item time and price for one stage.
    #[must_use]
    pub fn aggregate(stage: &TreatmentStage) -> Totals {
        stage.items.iter().fold(Totals::default(), |acc, item| Totals {
            total_time: acc.total_time.saturating_add(item.estimated_time),
            total_cost: acc.total_cost.saturating_add(item.price),
        })
    }

    /// Recompute and store a stage's totals. Idempotent.
    pub fn apply(stage: &mut TreatmentStage) {
        let totals = Self::aggregate(stage);
        stage.set_totals(totals.total_time, totals.total_cost);
    }

    /// Sum of the stages' stored totals.
    #[must_use]
    pub fn aggregate_all(stages: &[TreatmentStage]) -> Totals {
        stages.iter().fold(Totals::default(), |acc, stage| Totals {
            total_time: acc.total_time.saturating_add(stage.total_time()),
            total_cost: acc.total_cost.saturating_add(stage.total_cost()),
        })
    }

    /// Strictly greater than the threshold; equal is not over.
    #[must_use]
    pub fn over_threshold(stage: &TreatmentStage, threshold_minutes: u32) -> bool {
        stage.total_time() > threshold_minutes
    }
}

// =============================================================================
// TESTS
// =============================================================================
