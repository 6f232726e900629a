//! # Id Allocation
//!
//! Counter-based ids (`stage-N`, `item-N`). No randomness, no clock.
//!
//! An allocator that adopts existing stages is advanced past every numeric
//! suffix it sees, so fresh ids never collide with adopted ones. Once the
//! counter reaches `u64::MAX` it continues as `stage-18446744073709551615-K`,
//! skipping any such id it has already seen.

use crate::primitives::{ITEM_ID_PREFIX, STAGE_ID_PREFIX};
use crate::{ItemId, StageId, TreatmentStage};
use std::collections::BTreeSet;

/// Hands out plan-unique ids.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    stages: Sequence,
    items: Sequence,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdAllocator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            stages: Sequence::new(STAGE_ID_PREFIX),
            items: Sequence::new(ITEM_ID_PREFIX),
        }
    }

    /// Allocator already advanced past every id in `stages`.
    #[must_use]
    pub fn seeded_from(stages: &[TreatmentStage]) -> Self {
        let mut ids = Self::new();
        ids.observe_stages(stages);
        ids
    }

    pub fn next_stage_id(&mut self) -> StageId {
        StageId(self.stages.issue())
    }

    pub fn next_item_id(&mut self) -> ItemId {
        ItemId(self.items.issue())
    }

    /// Advance past all stage and item ids in `stages`.
    pub fn observe_stages(&mut self, stages: &[TreatmentStage]) {
        for stage in stages {
            self.observe_stage_id(&stage.id);
            for item in &stage.items {
                self.observe_item_id(&item.id);
            }
        }
    }

    pub fn observe_stage_id(&mut self, id: &StageId) {
        self.stages.observe(id.as_str());
    }

    pub fn observe_item_id(&mut self, id: &ItemId) {
        self.items.observe(id.as_str());
    }
}

/// One id family.
#[derive(Debug, Clone)]
struct Sequence {
    prefix: &'static str,
    /// `None` once `prefix-<u64::MAX>` is taken.
    next: Option<u64>,
    /// Counter for `prefix-<u64::MAX>-K` ids.
    overflow: u64,
    /// Seen ids of the `prefix-<u64::MAX>-K` form.
    taken: BTreeSet<String>,
}

impl Sequence {
    fn new(prefix: &'static str) -> Self {
        Self {
            prefix,
            next: Some(1),
            overflow: 0,
            taken: BTreeSet::new(),
        }
    }

    fn overflow_prefix(&self) -> String {
        format!("{}-{}-", self.prefix, u64::MAX)
    }

    fn issue(&mut self) -> String {
        if let Some(n) = self.next {
            self.next = n.checked_add(1);
            return format!("{}-{}", self.prefix, n);
        }
        let head = self.overflow_prefix();
        loop {
            let id = format!("{}{}", head, self.overflow);
            self.overflow = self.overflow.wrapping_add(1);
            if !self.taken.contains(&id) {
                return id;
            }
        }
    }

    fn observe(&mut self, id: &str) {
        let Some(rest) = id.strip_prefix(self.prefix).and_then(|r| r.strip_prefix('-')) else {
            return;
        };
        if let Ok(n) = rest.parse::<u64>() {
            self.next = self
                .next
                .and_then(|next| n.checked_add(1).map(|after| after.max(next)));
        } else if id.starts_with(&self.overflow_prefix()) {
            self.taken.insert(id.to_string());
        }
    }
}
