//! Domain types for the first-board strategy engine

pub mod bar;
pub mod position;
pub mod signal;

pub use bar::{DailyBar, SessionBar, Tick};
pub use position::{BrokerPosition, PositionRecord};
pub use signal::{SellReason, SellSignal};

/// Symbol type alias
pub type Symbol = String;
