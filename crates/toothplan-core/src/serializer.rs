//! # Stage Serializer
//!
//! Conversion between the backend wire shape and the editor's internal shape,
//! plus construction of the initial plan from findings.
//!
//! ## Wire shape
//!
//! ```json
//! [{ "stage": "Emergency Care", "focus": "...",
//!    "items": [{ "tooth": "11", "condition": "abscess",
//!                "recommended_treatment": "root-canal-treatment",
//!                "treatment": "root-canal-treatment", "price": 900 }] }]
//! ```
//!
//! Callers declare which shape they hand in ([`StageInput`] / [`StageFormat`]);
//! nothing is guessed from the data.

use crate::config::OrganizerConfig;
use crate::ids::IdAllocator;
use crate::metrics::StageMetrics;
use crate::urgency::{TokenKind, UrgencyClassifier, normalize_token};
use crate::{Finding, Price, TreatmentItem, TreatmentStage, Urgency};
use serde::{Deserialize, Serialize};

// =============================================================================
// WIRE TYPES
// =============================================================================

/// One item in the wire shape.
///
/// Producers send either `recommended_treatment` or `treatment`; both are
/// emitted on output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct WireItem {
    #[serde(default, deserialize_with = "crate::types::string_or_number")]
    pub tooth: String,
    #[serde(default)]
    pub condition: String,
    #[serde(default)]
    pub recommended_treatment: Option<String>,
    #[serde(default)]
    pub treatment: Option<String>,
    /// Major units, kept as the exact number that was sent.
    #[serde(default)]
    pub price: Option<serde_json::Number>,
}

impl WireItem {
    /// `recommended_treatment` if non-blank, else `treatment`, else empty.
    #[must_use]
    pub fn resolved_treatment(&self) -> &str {
        [&self.recommended_treatment, &self.treatment]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .find(|t| !t.trim().is_empty())
            .unwrap_or("")
    }
}

/// One stage in the wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct WireStage {
    #[serde(default)]
    pub stage: String,
    #[serde(default)]
    pub focus: String,
    #[serde(default)]
    pub items: Vec<WireItem>,
}

/// Declared shape of incoming stage data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageFormat {
    Wire,
    Internal,
}

/// Stage data tagged with its shape.
///
/// JSON form: `{"format": "wire", "stages": [...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", content = "stages", rename_all = "snake_case")]
pub enum StageInput {
    Wire(Vec<WireStage>),
    Internal(Vec<TreatmentStage>),
}

// =============================================================================
// STAGE SERIALIZER
// =============================================================================

/// Converter bound to a configuration.
#[derive(Debug, Clone, Copy)]
pub struct StageSerializer<'a> {
    config: &'a OrganizerConfig,
}

impl<'a> StageSerializer<'a> {
    #[must_use]
    pub fn new(config: &'a OrganizerConfig) -> Self {
        Self { config }
    }

    fn classifier(&self) -> UrgencyClassifier<'a> {
        UrgencyClassifier::new(&self.config.urgency)
    }

    /// Convert tagged input to internal stages.
    ///
    /// Internal stages pass through unchanged (missing totals are already
    /// zero). Wire stages get fresh ids, `order` = position, table
    /// durations and condition-only urgency.
    pub fn deserialize(&self, input: StageInput, ids: &mut IdAllocator) -> Vec<TreatmentStage> {
        match input {
            StageInput::Internal(stages) => {
                ids.observe_stages(&stages);
                stages
            }
            StageInput::Wire(stages) => stages
                .into_iter()
                .enumerate()
                .map(|(position, wire)| self.stage_from_wire(wire, position, ids))
                .collect(),
        }
    }

    /// Lenient entry point for raw JSON.
    ///
    /// Anything that is not an array of the declared shape is logged and
    /// treated as an empty plan.
    pub fn deserialize_value(
        &self,
        value: &serde_json::Value,
        format: StageFormat,
        ids: &mut IdAllocator,
    ) -> Vec<TreatmentStage> {
        if !value.is_array() {
            tracing::warn!(?format, "stage data is not an array, treating as empty plan");
            return Vec::new();
        }

        let parsed = match format {
            StageFormat::Wire => {
                serde_json::from_value::<Vec<WireStage>>(value.clone()).map(StageInput::Wire)
            }
            StageFormat::Internal => serde_json::from_value::<Vec<TreatmentStage>>(value.clone())
                .map(StageInput::Internal),
        };

        match parsed {
            Ok(input) => self.deserialize(input, ids),
            Err(e) => {
                tracing::warn!(?format, error = %e, "malformed stage data, treating as empty plan");
                Vec::new()
            }
        }
    }

    fn stage_from_wire(
        &self,
        wire: WireStage,
        position: usize,
        ids: &mut IdAllocator,
    ) -> TreatmentStage {
        let classifier = self.classifier();
        let items = wire
            .items
            .iter()
            .map(|item| {
                let treatment = item.resolved_treatment().to_string();
                let price = item.price.as_ref().map_or(Price::ZERO, |listed| {
                    let (price, exact) = Price::from_number(listed);
                    if !exact {
                        tracing::warn!(
                            tooth = %item.tooth,
                            %listed,
                            %price,
                            "wire price is not whole cents; totals use the rounded amount"
                        );
                    }
                    price
                });
                TreatmentItem {
                    id: ids.next_item_id(),
                    tooth_number: item.tooth.trim().to_string(),
                    condition: item.condition.clone(),
                    estimated_time: self
                        .config
                        .treatments
                        .duration_of(&normalize_token(&treatment)),
                    price,
                    urgency: Some(classifier.classify(&item.condition, TokenKind::Condition)),
                    listed_price: item.price.clone(),
                    treatment,
                }
            })
            .collect();

        let mut stage =
            TreatmentStage::new(ids.next_stage_id(), wire.stage, wire.focus).with_items(items);
        stage.set_order(position);
        StageMetrics::apply(&mut stage);
        stage
    }

    /// Convert internal stages to the wire shape, emitting both treatment keys.
    #[must_use]
    pub fn serialize(stages: &[TreatmentStage]) -> Vec<WireStage> {
        stages
            .iter()
            .map(|stage| WireStage {
                stage: stage.name.clone(),
                focus: stage.focus.clone(),
                items: stage
                    .items
                    .iter()
                    .map(|item| WireItem {
                        tooth: item.tooth_number.clone(),
                        condition: item.condition.clone(),
                        recommended_treatment: Some(item.treatment.clone()),
                        treatment: Some(item.treatment.clone()),
                        price: Some(item.wire_price()),
                    })
                    .collect(),
            })
            .collect()
    }

    /// Admit findings as items.
    ///
    /// Incomplete findings are dropped. Duration comes from the default
    /// table, urgency from [`UrgencyClassifier::finding_urgency`], price from
    /// the finding or else the default table.
    pub fn findings_to_items(
        &self,
        findings: &[Finding],
        ids: &mut IdAllocator,
    ) -> Vec<TreatmentItem> {
        let classifier = self.classifier();
        findings
            .iter()
            .filter(|finding| finding.is_complete())
            .map(|finding| {
                let key = normalize_token(&finding.treatment);
                TreatmentItem {
                    id: ids.next_item_id(),
                    tooth_number: finding.tooth.trim().to_string(),
                    condition: finding.condition.clone(),
                    treatment: finding.treatment.clone(),
                    estimated_time: self.config.treatments.duration_of(&key),
                    price: finding
                        .price
                        .unwrap_or_else(|| self.config.treatments.price_of(&key)),
                    urgency: Some(
                        classifier.finding_urgency(&finding.condition, &finding.treatment),
                    ),
                    listed_price: None,
                }
            })
            .collect()
    }

    /// Group items into the default stage layout.
    ///
    /// Empty input gives one empty stage. Otherwise one stage per non-empty
    /// urgency tier, always in high → medium → low order. Items without an
    /// urgency use the configured fallback tier.
    pub fn default_stages(
        &self,
        items: Vec<TreatmentItem>,
        ids: &mut IdAllocator,
    ) -> Vec<TreatmentStage> {
        let naming = &self.config.naming;
        if items.is_empty() {
            return vec![TreatmentStage::new(
                ids.next_stage_id(),
                naming.empty_plan.name.clone(),
                naming.empty_plan.focus.clone(),
            )];
        }

        let fallback = self.config.urgency.fallback;
        let mut high = Vec::new();
        let mut medium = Vec::new();
        let mut low = Vec::new();
        for item in items {
            match item.urgency.unwrap_or(fallback) {
                Urgency::High => high.push(item),
                Urgency::Medium => medium.push(item),
                Urgency::Low => low.push(item),
            }
        }

        let tiers = [
            (&naming.emergency, high),
            (&naming.restorative, medium),
            (&naming.preventive, low),
        ];

        let mut stages: Vec<TreatmentStage> = tiers
            .into_iter()
            .filter(|(_, items)| !items.is_empty())
            .map(|(template, items)| {
                TreatmentStage::new(
                    ids.next_stage_id(),
                    template.name.clone(),
                    template.focus.clone(),
                )
                .with_items(items)
            })
            .collect();

        for (position, stage) in stages.iter_mut().enumerate() {
            stage.set_order(position);
            StageMetrics::apply(stage);
        }
        stages
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> OrganizerConfig {
        OrganizerConfig::default()
    }

    #[test]
    fn wire_stage_gets_ids_order_and_durations() {
        let config = config();
        let serializer = StageSerializer::new(&config);
        let mut ids = IdAllocator::new();
        let value = json!([
            {"stage": "First", "focus": "pain", "items": [
                {"tooth": "11", "condition": "abscess", "recommended_treatment": "Root Canal Treatment", "price": 900}
            ]},
            {"stage": "Second", "focus": "", "items": [
                {"tooth": 21, "condition": "gingivitis", "treatment": "scale-and-clean", "price": 120.5}
            ]}
        ]);

        let stages = serializer.deserialize_value(&value, StageFormat::Wire, &mut ids);

        assert_eq!(stages.len(), 2);
        assert_eq!(stages[1].order(), 1);
        let first = &stages[0].items[0];
        assert_eq!(first.treatment, "Root Canal Treatment");
        assert_eq!(first.estimated_time, 90);
        assert_eq!(first.urgency, Some(Urgency::High));
        let second = &stages[1].items[0];
        assert_eq!(second.tooth_number, "21");
        assert_eq!(second.price, Price::from_cents(12_050));
        assert_eq!(second.urgency, Some(Urgency::Low));
        assert_ne!(first.id, second.id);
        assert_eq!(stages[0].total_time(), 90);
    }

    #[test]
    fn wire_urgency_uses_condition_only() {
        let config = config();
        let serializer = StageSerializer::new(&config);
        let mut ids = IdAllocator::new();
        let input = StageInput::Wire(vec![WireStage {
            stage: "Visit".into(),
            focus: String::new(),
            items: vec![WireItem {
                tooth: "36".into(),
                condition: "gingivitis".into(),
                recommended_treatment: Some("extraction".into()),
                treatment: None,
                price: None,
            }],
        }]);

        let stages = serializer.deserialize(input, &mut ids);
        assert_eq!(stages[0].items[0].urgency, Some(Urgency::Low));
        assert_eq!(stages[0].items[0].price, Price::ZERO);
    }

    #[test]
    fn wire_prices_survive_json_round_trip() {
        let config = config();
        let serializer = StageSerializer::new(&config);
        let mut ids = IdAllocator::new();
        let text = r#"[{"stage": "Visit", "items": [
            {"tooth": "11", "condition": "caries", "treatment": "filling", "price": 12.345},
            {"tooth": "12", "condition": "caries", "treatment": "filling", "price": -40},
            {"tooth": "13", "condition": "caries", "treatment": "filling", "price": 0.004},
            {"tooth": "14", "condition": "caries", "treatment": "filling", "price": 89.5}
        ]}]"#;
        let value: serde_json::Value = serde_json::from_str(text).expect("parse");

        let stages = serializer.deserialize_value(&value, StageFormat::Wire, &mut ids);
        let cents: Vec<u64> = stages[0].items.iter().map(|i| i.price.cents()).collect();
        assert_eq!(cents, vec![1235, 0, 0, 8950]);

        let out = serde_json::to_string(&StageSerializer::serialize(&stages)).expect("json");
        let back: serde_json::Value = serde_json::from_str(&out).expect("reparse");
        let prices: Vec<String> = back[0]["items"]
            .as_array()
            .expect("items")
            .iter()
            .map(|i| i["price"].to_string())
            .collect();
        assert_eq!(prices, vec!["12.345", "-40", "0.004", "89.5"]);
    }

    #[test]
    fn repriced_item_emits_cents_not_listed_amount() {
        let config = config();
        let serializer = StageSerializer::new(&config);
        let mut ids = IdAllocator::new();
        let value = json!([{"stage": "Visit", "items": [
            {"tooth": "11", "condition": "caries", "treatment": "filling", "price": 12.345}
        ]}]);
        let mut stages = serializer.deserialize_value(&value, StageFormat::Wire, &mut ids);
        stages[0].items[0].price = Price::from_cents(9_999);

        let wire = serde_json::to_value(StageSerializer::serialize(&stages)).expect("json");
        assert_eq!(wire[0]["items"][0]["price"], json!(99.99));
    }

    #[test]
    fn wire_tooth_is_trimmed() {
        let config = config();
        let serializer = StageSerializer::new(&config);
        let mut ids = IdAllocator::new();
        let value = json!([{"stage": "Visit", "items": [
            {"tooth": " 11 ", "condition": "caries", "treatment": "filling"}
        ]}]);

        let stages = serializer.deserialize_value(&value, StageFormat::Wire, &mut ids);
        assert_eq!(stages[0].items[0].tooth_number, "11");
    }

    #[test]
    fn non_array_degrades_to_empty() {
        let config = config();
        let serializer = StageSerializer::new(&config);
        let mut ids = IdAllocator::new();
        let stages =
            serializer.deserialize_value(&json!({"stage": "oops"}), StageFormat::Wire, &mut ids);
        assert!(stages.is_empty());
    }

    #[test]
    fn malformed_internal_degrades_to_empty() {
        let config = config();
        let serializer = StageSerializer::new(&config);
        let mut ids = IdAllocator::new();
        let stages =
            serializer.deserialize_value(&json!([{"name": 5}]), StageFormat::Internal, &mut ids);
        assert!(stages.is_empty());
    }

    #[test]
    fn internal_passes_through_and_seeds_ids() {
        let config = config();
        let serializer = StageSerializer::new(&config);
        let mut ids = IdAllocator::new();
        let value = json!([{"id": "stage-4", "name": "Kept", "items": [
            {"id": "item-9", "toothNumber": "11", "condition": "caries", "treatment": "filling",
             "estimatedTime": 45, "price": 150}
        ]}]);

        let stages = serializer.deserialize_value(&value, StageFormat::Internal, &mut ids);
        assert_eq!(stages[0].id.as_str(), "stage-4");
        assert_eq!(stages[0].total_time(), 0);
        assert_eq!(ids.next_item_id().as_str(), "item-10");
    }

    #[test]
    fn tagged_input_parses() {
        let input: StageInput =
            serde_json::from_value(json!({"format": "wire", "stages": []})).expect("parse");
        assert_eq!(input, StageInput::Wire(vec![]));
    }

    #[test]
    fn serialize_emits_both_treatment_keys() {
        let config = config();
        let serializer = StageSerializer::new(&config);
        let mut ids = IdAllocator::new();
        let items = serializer.findings_to_items(&[Finding::new("11", "caries", "filling")], &mut ids);
        let stages = serializer.default_stages(items, &mut ids);

        let wire = serde_json::to_value(StageSerializer::serialize(&stages)).expect("json");
        let item = &wire[0]["items"][0];
        assert_eq!(item["recommended_treatment"], "filling");
        assert_eq!(item["treatment"], "filling");
        assert_eq!(item["price"], 150);
        assert_eq!(wire[0]["stage"], "Restorative Treatment");
    }

    #[test]
    fn findings_filter_incomplete() {
        let config = config();
        let serializer = StageSerializer::new(&config);
        let mut ids = IdAllocator::new();
        let findings = vec![
            Finding::new("11", "abscess", "filling"),
            Finding::new("", "caries", "filling"),
            Finding::new("12", "caries", "  "),
        ];

        let items = serializer.findings_to_items(&findings, &mut ids);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].urgency, Some(Urgency::High));
        assert_eq!(items[0].estimated_time, 45);
    }

    #[test]
    fn finding_price_wins_over_table() {
        let config = config();
        let serializer = StageSerializer::new(&config);
        let mut ids = IdAllocator::new();
        let findings = vec![Finding::new("11", "caries", "crown").with_price(Price::from_cents(50_000))];
        let items = serializer.findings_to_items(&findings, &mut ids);
        assert_eq!(items[0].price, Price::from_cents(50_000));
    }

    #[test]
    fn default_stages_for_empty_plan() {
        let config = config();
        let serializer = StageSerializer::new(&config);
        let mut ids = IdAllocator::new();
        let stages = serializer.default_stages(Vec::new(), &mut ids);
        assert_eq!(stages.len(), 1);
        assert_eq!(stages[0].name, "Treatment Plan");
        assert!(stages[0].is_empty());
    }

    #[test]
    fn default_stages_skip_empty_tiers() {
        let config = config();
        let serializer = StageSerializer::new(&config);
        let mut ids = IdAllocator::new();
        let findings = vec![
            Finding::new("46", "gingivitis", "scale-and-clean"),
            Finding::new("11", "abscess", "root-canal-treatment"),
        ];
        let items = serializer.findings_to_items(&findings, &mut ids);
        let stages = serializer.default_stages(items, &mut ids);

        let names: Vec<_> = stages.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Emergency Care", "Preventive Care"]);
        assert_eq!(stages[1].order(), 1);
    }
}
