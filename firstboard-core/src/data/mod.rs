//! Market data collaborators: feed, calendar, candidate source, CSV ingestion

pub mod calendar;
pub mod ingest;
pub mod memory;
pub mod provider;

pub use calendar::{hold_days, TradingCalendar, WeekdayCalendar};
pub use memory::InMemoryFeed;
pub use provider::{limit_up_price, CandidateSource, DataError, MarketDataFeed, StaticCandidates};
