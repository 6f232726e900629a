//! # Urgency Classifier
//!
//! Maps a condition or treatment string to an urgency tier.
//!
//! Lookup order:
//! 1. Exact match in the condition or treatment table (normalized token)
//! 2. Ranked keyword substring scan, first match wins
//! 3. The configured fallback tier (`medium` by default)
//!
//! Pure: no state, no side effects.

use crate::Urgency;
use crate::config::UrgencyTables;

/// Which exact-match table a token is looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Condition,
    Treatment,
}

/// Normalize a clinical token: trimmed, lower-cased, whitespace runs → `-`.
///
/// `"Root Canal  Treatment"` becomes `"root-canal-treatment"`.
#[must_use]
pub fn normalize_token(token: &str) -> String {
    token
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

/// Table-driven urgency classification.
#[derive(Debug, Clone, Copy)]
pub struct UrgencyClassifier<'a> {
    tables: &'a UrgencyTables,
}

impl<'a> UrgencyClassifier<'a> {
    #[must_use]
    pub fn new(tables: &'a UrgencyTables) -> Self {
        Self { tables }
    }

    /// Classify a single token.
    #[must_use]
    pub fn classify(&self, token: &str, kind: TokenKind) -> Urgency {
        let normalized = normalize_token(token);
        let table = match kind {
            TokenKind::Condition => &self.tables.conditions,
            TokenKind::Treatment => &self.tables.treatments,
        };

        if let Some(&urgency) = table.get(&normalized) {
            return urgency;
        }

        self.tables
            .keywords
            .iter()
            .find(|rule| normalized.contains(rule.keyword.as_str()))
            .map(|rule| rule.urgency)
            .unwrap_or(self.tables.fallback)
    }

    /// Urgency of a finding: the more severe of its condition and treatment.
    #[must_use]
    pub fn finding_urgency(&self, condition: &str, treatment: &str) -> Urgency {
        let by_condition = self.classify(condition, TokenKind::Condition);
        let by_treatment = self.classify(treatment, TokenKind::Treatment);
        by_condition.max(by_treatment)
    }
}

// =============================================================================
// TESTS
// =============================================================================
