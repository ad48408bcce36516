//! Strategy engine: session state, scheduler callbacks and replay.
//!
//! The scheduler is tick-driven and single-threaded. Each callback takes the
//! `StrategyState` by `&mut` and the collaborators through a `SessionContext`:
//!
//! 1. Pre-market: candidates, holdings, record reconciliation
//! 2. Tick: one-shot entries at the entry time, exits on every tick
//! 3. Post-market: new-high counters and the holdings summary

pub mod error;
pub mod replay;
pub mod report;
pub mod scheduler;
pub mod state;

pub use error::EngineError;
pub use replay::{replay_sessions, ReplaySummary, SessionSummary, TradeLine};
pub use report::{ExitFill, HoldingSummary, PreMarketReport, SessionReport, TickReport};
pub use scheduler::{SessionContext, StrategyScheduler};
pub use state::{Eviction, EvictionReason, PositionBook, SessionStats, StrategyState};
