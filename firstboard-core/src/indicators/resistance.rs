//! Resistance level: volume-weighted prior swing high above the current price.
//!
//! A bar is a pivot high when its high is >= every high within `pivot_window`
//! bars on both sides. Each pivot is weighted by the mean volume over
//! `volume_window` bars on both sides of it. Pivots are ranked by that weight
//! (heaviest first, ties keep chronological order) and the first one whose
//! price clears `current_price * margin` is the resistance level.
//!
//! Heavy volume at a prior high means many holders bought there, so the level
//! is where selling pressure is expected on a revisit.

use std::cmp::Ordering;

use crate::config::ResistanceParams;
use crate::data::{DataError, MarketDataFeed};
use crate::domain::DailyBar;

/// A local maximum in the trailing high series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PivotHigh {
    pub index: usize,
    pub price: f64,
    pub volume_weight: f64,
}

#[derive(Debug, Clone)]
pub struct ResistanceEstimator {
    params: ResistanceParams,
}

impl Default for ResistanceEstimator {
    fn default() -> Self {
        Self::new(ResistanceParams::default())
    }
}

impl ResistanceEstimator {
    pub fn new(params: ResistanceParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ResistanceParams {
        &self.params
    }

    /// All pivot highs in chronological order.
    pub fn pivot_highs(&self, bars: &[DailyBar]) -> Vec<PivotHigh> {
        let w = self.params.pivot_window;
        let n = bars.len();
        if n < 2 * w + 1 {
            return Vec::new();
        }

        (w..n - w)
            .filter(|&i| {
                let high = bars[i].high;
                (i - w..=i + w)
                    .filter(|&j| j != i)
                    .all(|j| high >= bars[j].high)
            })
            .map(|i| PivotHigh {
                index: i,
                price: bars[i].high,
                volume_weight: self.volume_weight(bars, i),
            })
            .collect()
    }

    fn volume_weight(&self, bars: &[DailyBar], i: usize) -> f64 {
        let v = self.params.volume_window;
        let start = i.saturating_sub(v);
        let end = (i + v).min(bars.len() - 1);
        let window = &bars[start..=end];
        window.iter().map(|b| b.volume as f64).sum::<f64>() / window.len() as f64
    }

    /// Resistance level from a trailing bar history, or `None` if no pivot
    /// qualifies or the history is shorter than `min_bars`.
    pub fn level(&self, bars: &[DailyBar], current_price: f64) -> Option<f64> {
        if bars.len() < self.params.min_bars {
            return None;
        }

        let mut pivots = self.pivot_highs(bars);
        pivots.sort_by(|a, b| {
            b.volume_weight
                .partial_cmp(&a.volume_weight)
                .unwrap_or(Ordering::Equal)
        });

        let floor = current_price * self.params.margin;
        pivots.iter().map(|p| p.price).find(|&price| price > floor)
    }

    /// Fetch `lookback_bars` of history for `symbol` and estimate its level.
    pub fn estimate(
        &self,
        feed: &dyn MarketDataFeed,
        symbol: &str,
        current_price: f64,
    ) -> Result<Option<f64>, DataError> {
        let bars = feed.daily_bars(symbol, self.params.lookback_bars)?;
        Ok(self.level(&bars, current_price))
    }
}
