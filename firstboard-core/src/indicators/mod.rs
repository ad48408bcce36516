//! Technical levels derived from trailing daily history.

pub mod resistance;

pub use resistance::{PivotHigh, ResistanceEstimator};
