//! Per-symbol error kinds. None of them aborts a tick or a session.

use thiserror::Error;

use crate::broker::ExecutionError;
use crate::data::DataError;

/// A failure isolated to one symbol within one scheduler callback.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EngineError {
    /// Missing history or price; the symbol is skipped for this cycle.
    #[error("data unavailable for {symbol}: {source}")]
    DataUnavailable { symbol: String, source: DataError },

    /// The broker rejected an order; no state is recorded and nothing is retried.
    #[error("execution failed for {symbol}: {source}")]
    ExecutionFailure { symbol: String, source: ExecutionError },
}

impl EngineError {
    pub fn data(symbol: &str, source: DataError) -> Self {
        Self::DataUnavailable {
            symbol: symbol.to_string(),
            source,
        }
    }

    pub fn execution(symbol: &str, source: ExecutionError) -> Self {
        Self::ExecutionFailure {
            symbol: symbol.to_string(),
            source,
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            Self::DataUnavailable { symbol, .. } | Self::ExecutionFailure { symbol, .. } => symbol,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_symbol_and_cause() {
        let e = EngineError::data(
            "600000.SH",
            DataError::PriceUnavailable {
                symbol: "600000.SH".into(),
            },
        );
        assert_eq!(e.symbol(), "600000.SH");
        assert_eq!(
            e.to_string(),
            "data unavailable for 600000.SH: no current price for 600000.SH"
        );
    }

    #[test]
    fn source_is_exposed() {
        use std::error::Error as _;
        let e = EngineError::execution(
            "A",
            ExecutionError::NoPosition { symbol: "A".into() },
        );
        assert!(e.source().is_some());
    }
}
