//! # Organizer Primitives
//!
//! Fixed defaults compiled into the organizer. Every one of them can be
//! overridden through [`crate::config::OrganizerConfig`]; these are only the
//! values a fresh configuration starts from.

/// Default per-stage chair-time threshold, in minutes.
///
/// A stage whose total time is strictly greater than this is "over threshold".
pub const DEFAULT_TIME_THRESHOLD_MINUTES: u32 = 90;

/// Stages longer than this draw a "very long, consider splitting" warning.
pub const LONG_STAGE_MINUTES: u32 = 180;

/// Duration assumed for a treatment missing from every lookup table.
pub const FALLBACK_DURATION_MINUTES: u32 = 60;

/// Prefix for stage ids handed out by [`crate::ids::IdAllocator`].
pub const STAGE_ID_PREFIX: &str = "stage";

/// Prefix for item ids handed out by [`crate::ids::IdAllocator`].
pub const ITEM_ID_PREFIX: &str = "item";
