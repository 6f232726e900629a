//! # Core Type Definitions
//!
//! This module contains the data model shared by every organizer component:
//! - Identifiers (`ItemId`, `StageId`)
//! - Clinical values (`Urgency`, `Price`)
//! - Plan structure (`TreatmentItem`, `TreatmentStage`)
//! - Inputs from the surrounding layer (`Finding`, `NewTreatmentItem`, `StagePatch`)
//! - Error types (`PlanError`, `DeleteStageError`)
//!
//! ## Determinism Guarantees
//!
//! - Money is integer cents; durations are whole minutes
//! - Sums saturate instead of overflowing
//! - Stage totals are derived and can only be written from inside the crate

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Identifier of a treatment item. Unique across the whole plan.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub String);

impl ItemId {
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a stage (visit group).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageId(pub String);

impl StageId {
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// URGENCY
// =============================================================================

/// Clinical urgency tier.
///
/// Variant order is severity order, so `Ord` gives `Low < Medium < High`
/// and `max` picks the more severe tier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    #[default]
    Medium,
    High,
}

impl Urgency {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Medium => "medium",
            Urgency::High => "high",
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// PRICE
// =============================================================================

/// A price in integer cents.
///
/// Crosses JSON/TOML boundaries as a decimal number in major units
/// (`150`, `89.5`). All arithmetic inside the crate stays integer, so
/// amounts below one cent or below zero cannot be represented: they are
/// rounded (or clamped to zero) with a warning. Items keep the amount they
/// were listed with in [`TreatmentItem::listed_price`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Price(u64);

impl Price {
    pub const ZERO: Price = Price(0);

    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    #[must_use]
    pub const fn cents(self) -> u64 {
        self.0
    }

    /// Convert a major-unit amount. Negative, NaN and infinite inputs become zero.
    #[must_use]
    #[allow(clippy::float_arithmetic)]
    pub fn from_major(amount: f64) -> Self {
        if !amount.is_finite() || amount <= 0.0 {
            return Self::ZERO;
        }
        Self((amount * 100.0).round() as u64)
    }

    /// The amount in major units, for the wire.
    #[must_use]
    #[allow(clippy::float_arithmetic)]
    pub fn as_major(self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Convert a JSON number in major units.
    ///
    /// The flag is `false` when the amount had to be clamped or rounded to
    /// fit whole, non-negative cents.
    #[must_use]
    #[allow(clippy::float_arithmetic, clippy::float_cmp)]
    pub fn from_number(number: &serde_json::Number) -> (Self, bool) {
        if let Some(major) = number.as_u64() {
            return match major.checked_mul(100) {
                Some(cents) => (Self(cents), true),
                None => (Self(u64::MAX), false),
            };
        }
        if number.as_i64().is_some() {
            return (Self::ZERO, false);
        }
        let Some(amount) = number.as_f64() else {
            return (Self::ZERO, false);
        };
        let price = Self::from_major(amount);
        (price, price.as_major() == amount)
    }

    /// The amount as a JSON number: an integer when whole, else a float.
    #[must_use]
    pub fn to_number(self) -> serde_json::Number {
        if self.0 % 100 == 0 {
            return serde_json::Number::from(self.0 / 100);
        }
        serde_json::Number::from_f64(self.as_major())
            .unwrap_or_else(|| serde_json::Number::from(self.0 / 100))
    }

    #[must_use]
    pub const fn saturating_add(self, other: Price) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl std::iter::Sum for Price {
    fn sum<I: Iterator<Item = Price>>(iter: I) -> Self {
        iter.fold(Price::ZERO, Price::saturating_add)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0 % 100 == 0 {
            serializer.serialize_u64(self.0 / 100)
        } else {
            serializer.serialize_f64(self.as_major())
        }
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let number = serde_json::Number::deserialize(deserializer)?;
        let (price, exact) = Price::from_number(&number);
        if !exact {
            tracing::warn!(%number, %price, "price is not whole cents, stored rounded");
        }
        Ok(price)
    }
}

// =============================================================================
// TREATMENT ITEM
// =============================================================================

/// A finding once admitted into the stage editor.
///
/// Owned by exactly one stage at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreatmentItem {
    pub id: ItemId,
    #[serde(deserialize_with = "string_or_number")]
    pub tooth_number: String,
    pub condition: String,
    pub treatment: String,
    /// Minutes of chair time.
    #[serde(default)]
    pub estimated_time: u32,
    #[serde(default)]
    pub price: Price,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgency: Option<Urgency>,
    /// The price exactly as it arrived on the wire. Emitted again on output
    /// while it still maps to `price`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listed_price: Option<serde_json::Number>,
}

impl TreatmentItem {
    /// The price to put on the wire: the listed amount if the item has not
    /// been repriced since, otherwise `price` in major units.
    #[must_use]
    pub fn wire_price(&self) -> serde_json::Number {
        match &self.listed_price {
            Some(listed) if Price::from_number(listed).0 == self.price => listed.clone(),
            _ => self.price.to_number(),
        }
    }
}

/// Item fields supplied by a caller before an id is allocated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTreatmentItem {
    #[serde(deserialize_with = "string_or_number")]
    pub tooth_number: String,
    pub condition: String,
    pub treatment: String,
    #[serde(default)]
    pub estimated_time: u32,
    #[serde(default)]
    pub price: Price,
    #[serde(default)]
    pub urgency: Option<Urgency>,
}

impl NewTreatmentItem {
    /// Attach an id, producing a full item.
    #[must_use]
    pub fn with_id(self, id: ItemId) -> TreatmentItem {
        TreatmentItem {
            id,
            tooth_number: self.tooth_number,
            condition: self.condition,
            treatment: self.treatment,
            estimated_time: self.estimated_time,
            price: self.price,
            urgency: self.urgency,
            listed_price: None,
        }
    }
}

// =============================================================================
// TREATMENT STAGE
// =============================================================================

/// An ordered, named group of treatment items: one visit of the plan.
///
/// `total_time`, `total_cost` and `order` are derived by the organizer and
/// are read-only from outside the crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreatmentStage {
    pub id: StageId,
    pub name: String,
    #[serde(default)]
    pub focus: String,
    #[serde(default)]
    pub items: Vec<TreatmentItem>,
    #[serde(default)]
    total_time: u32,
    #[serde(default)]
    total_cost: Price,
    #[serde(default)]
    order: usize,
}

impl TreatmentStage {
    /// Create an empty stage.
    #[must_use]
    pub fn new(id: StageId, name: impl Into<String>, focus: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            focus: focus.into(),
            items: Vec::new(),
            total_time: 0,
            total_cost: Price::ZERO,
            order: 0,
        }
    }

    /// Builder-style item assignment. Totals are not computed here.
    #[must_use]
    pub fn with_items(mut self, items: Vec<TreatmentItem>) -> Self {
        self.items = items;
        self
    }

    #[must_use]
    pub fn total_time(&self) -> u32 {
        self.total_time
    }

    #[must_use]
    pub fn total_cost(&self) -> Price {
        self.total_cost
    }

    #[must_use]
    pub fn order(&self) -> usize {
        self.order
    }

    /// Highest urgency among the items, `None` for an empty stage.
    #[must_use]
    pub fn urgency(&self) -> Option<Urgency> {
        self.items.iter().filter_map(|item| item.urgency).max()
    }

    #[must_use]
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn position_of(&self, item_id: &ItemId) -> Option<usize> {
        self.items.iter().position(|item| &item.id == item_id)
    }

    pub(crate) fn set_totals(&mut self, total_time: u32, total_cost: Price) {
        self.total_time = total_time;
        self.total_cost = total_cost;
    }

    pub(crate) fn set_order(&mut self, order: usize) {
        self.order = order;
    }
}

// =============================================================================
// FINDING
// =============================================================================

/// A clinical observation from AI detection or manual entry.
///
/// Missing fields deserialize as empty strings; the serializer drops
/// findings that lack a tooth, condition or treatment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Finding {
    #[serde(default, deserialize_with = "string_or_number")]
    pub tooth: String,
    #[serde(default)]
    pub condition: String,
    #[serde(default)]
    pub treatment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Price>,
}

impl Finding {
    #[must_use]
    pub fn new(
        tooth: impl Into<String>,
        condition: impl Into<String>,
        treatment: impl Into<String>,
    ) -> Self {
        Self {
            tooth: tooth.into(),
            condition: condition.into(),
            treatment: treatment.into(),
            price: None,
        }
    }

    #[must_use]
    pub fn with_price(mut self, price: Price) -> Self {
        self.price = Some(price);
        self
    }

    /// True when tooth, condition and treatment are all present.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.tooth.trim().is_empty()
            && !self.condition.trim().is_empty()
            && !self.treatment.trim().is_empty()
    }
}

// =============================================================================
// STAGE PATCH
// =============================================================================

/// Shallow update for a stage's editable fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StagePatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub focus: Option<String>,
}

impl StagePatch {
    #[must_use]
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            focus: None,
        }
    }

    pub(crate) fn apply_to(self, stage: &mut TreatmentStage) {
        if let Some(name) = self.name {
            stage.name = name;
        }
        if let Some(focus) = self.focus {
            stage.focus = focus;
        }
    }
}

// =============================================================================
// SERDE HELPERS
// =============================================================================

/// Tooth numbers arrive as `"11"` from some producers and `11` from others.
pub(crate) fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Unsigned(u64),
        Signed(i64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Unsigned(n) => n.to_string(),
        Raw::Signed(n) => n.to_string(),
    })
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors from fallible organizer entry points and the host layer.
#[derive(Debug, Error)]
pub enum PlanError {
    /// Input was structurally unusable.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(String),

    /// A stage deletion was refused.
    #[error(transparent)]
    DeleteStage(#[from] DeleteStageError),
}

/// Why a stage could not be deleted. Engine state is unchanged on either.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeleteStageError {
    #[error("Stage {stage_id} still has {item_count} treatment(s); move or remove them first")]
    HasItems { stage_id: StageId, item_count: usize },

    #[error("Stage {stage_id} is the only stage left; a plan needs at least one stage")]
    LastStageRemaining { stage_id: StageId },
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urgency_orders_by_severity() {
        assert!(Urgency::Low < Urgency::Medium);
        assert!(Urgency::Medium < Urgency::High);
        assert_eq!(Urgency::Low.max(Urgency::High), Urgency::High);
    }

    #[test]
    fn price_from_major_rounds_to_cents() {
        assert_eq!(Price::from_major(89.99).cents(), 8999);
        assert_eq!(Price::from_major(150.0).cents(), 15000);
        assert_eq!(Price::from_major(-5.0), Price::ZERO);
        assert_eq!(Price::from_major(f64::NAN), Price::ZERO);
    }

    #[test]
    fn price_serializes_as_major_units() {
        let whole = serde_json::to_string(&Price::from_cents(15000)).expect("serialize");
        assert_eq!(whole, "150");
        let fractional = serde_json::to_string(&Price::from_cents(8950)).expect("serialize");
        assert_eq!(fractional, "89.5");
    }

    #[test]
    fn price_from_number_flags_inexact_amounts() {
        let number = |text: &str| serde_json::from_str::<serde_json::Number>(text).expect("number");
        assert_eq!(Price::from_number(&number("150")), (Price::from_cents(15000), true));
        assert_eq!(Price::from_number(&number("89.5")), (Price::from_cents(8950), true));
        assert_eq!(Price::from_number(&number("0.1")), (Price::from_cents(10), true));
        assert!(!Price::from_number(&number("12.345")).1);
        assert_eq!(Price::from_number(&number("-40")), (Price::ZERO, false));
        assert_eq!(Price::from_number(&number("0.004")), (Price::ZERO, false));
    }

    #[test]
    fn wire_price_prefers_listed_amount_until_repriced() {
        let listed: serde_json::Number = serde_json::from_str("-40").expect("number");
        let mut item = NewTreatmentItem {
            tooth_number: "11".into(),
            condition: "caries".into(),
            treatment: "filling".into(),
            estimated_time: 30,
            price: Price::ZERO,
            urgency: None,
        }
        .with_id(ItemId::new("item-1"));
        item.listed_price = Some(listed.clone());
        assert_eq!(item.wire_price(), listed);

        item.price = Price::from_cents(2500);
        assert_eq!(item.wire_price(), serde_json::Number::from(25u64));
    }

    #[test]
    fn price_display() {
        assert_eq!(Price::from_cents(120_005).to_string(), "1200.05");
    }

    #[test]
    fn finding_accepts_numeric_tooth() {
        let finding: Finding =
            serde_json::from_str(r#"{"tooth":11,"condition":"caries","treatment":"filling"}"#)
                .expect("deserialize");
        assert_eq!(finding.tooth, "11");
        assert!(finding.is_complete());
    }

    #[test]
    fn finding_missing_fields_is_incomplete() {
        let finding: Finding = serde_json::from_str(r#"{"tooth":"11"}"#).expect("deserialize");
        assert!(!finding.is_complete());
    }

    #[test]
    fn stage_urgency_is_max_of_items() {
        let mut stage = TreatmentStage::new(StageId::new("s"), "S", "");
        assert_eq!(stage.urgency(), None);
        for (id, urgency) in [("a", Urgency::Low), ("b", Urgency::High)] {
            stage.items.push(TreatmentItem {
                id: ItemId::new(id),
                tooth_number: "11".into(),
                condition: "x".into(),
                treatment: "y".into(),
                estimated_time: 10,
                price: Price::ZERO,
                urgency: Some(urgency),
                listed_price: None,
            });
        }
        assert_eq!(stage.urgency(), Some(Urgency::High));
    }

    #[test]
    fn internal_stage_without_totals_defaults_to_zero() {
        let json = r#"{"id":"stage-1","name":"Visit","items":[]}"#;
        let stage: TreatmentStage = serde_json::from_str(json).expect("deserialize");
        assert_eq!(stage.total_time(), 0);
        assert_eq!(stage.total_cost(), Price::ZERO);
        assert_eq!(stage.focus, "");
    }

    #[test]
    fn delete_stage_error_messages_differ() {
        let has_items = DeleteStageError::HasItems {
            stage_id: StageId::new("stage-1"),
            item_count: 2,
        };
        let last = DeleteStageError::LastStageRemaining {
            stage_id: StageId::new("stage-1"),
        };
        assert!(has_items.to_string().contains("2 treatment"));
        assert!(last.to_string().contains("only stage"));
    }
}
