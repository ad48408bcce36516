//! Decision components of the first-board strategy.
//!
//! - Screener: same-day price-action gate for candidates
//! - Allocator: equal-split entry orders at the entry time
//! - Exit rules: ordered stop-loss / take-profit / time / resistance exits

pub mod allocator;
pub mod exit;
pub mod screener;

pub use allocator::{EntryAllocator, EntryOutcome};
pub use exit::{ExitInputs, ExitRuleEvaluator};
pub use screener::{CandidateScreener, PriceSnapshot, Rejection, ScreenOutcome};
