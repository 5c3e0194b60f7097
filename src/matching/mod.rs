//! Matching: pairing available users of comparable level.

pub mod engine;
pub mod picker;

pub use engine::{MatchEngine, MatchOutcome, compatible_candidates};
pub use picker::{FirstCandidate, PartnerPicker, RandomPicker};
