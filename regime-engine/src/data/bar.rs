//! Daily OHLCV bar data structures

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One daily bar. Prices are fixed-point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketBar {
    /// Bar timestamp (session close)
    pub timestamp: DateTime<Utc>,
    /// Symbol (e.g., "QQQ")
    pub symbol: String,
    /// Opening price
    pub open: Decimal,
    /// High price
    pub high: Decimal,
    /// Low price
    pub low: Decimal,
    /// Closing price
    pub close: Decimal,
    /// Volume
    pub volume: Decimal,
}

impl MarketBar {
    /// Create a new bar
    pub fn new(
        timestamp: DateTime<Utc>,
        symbol: impl Into<String>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
    ) -> Self {
        Self {
            timestamp,
            symbol: symbol.into(),
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Closing price as f64 for indicator math
    pub fn close_f64(&self) -> f64 {
        self.close.to_f64().unwrap_or(0.0)
    }

    /// Volume as f64 for indicator math
    pub fn volume_f64(&self) -> f64 {
        self.volume.to_f64().unwrap_or(0.0)
    }

    /// Get total range (high - low)
    pub fn range(&self) -> Decimal {
        self.high - self.low
    }

    /// Check if bar closed up
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }
}

/// Ascending sequence of bars for one symbol
#[derive(Debug, Clone, Default)]
pub struct BarSeries {
    bars: Vec<MarketBar>,
}

impl BarSeries {
    /// Create from bars, sorted oldest first
    pub fn from_vec(mut bars: Vec<MarketBar>) -> Self {
        bars.sort_by_key(|b| b.timestamp);
        Self { bars }
    }

    /// Get number of bars
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Check if series is empty
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Get last bar
    pub fn last(&self) -> Option<&MarketBar> {
        self.bars.last()
    }

    /// Get all bars
    pub fn bars(&self) -> &[MarketBar] {
        &self.bars
    }

    /// Get close prices as vector
    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(MarketBar::close_f64).collect()
    }

    /// Get volumes as vector
    pub fn volumes(&self) -> Vec<f64> {
        self.bars.iter().map(MarketBar::volume_f64).collect()
    }

    /// Series truncated to the first `len` bars
    pub fn prefix(&self, len: usize) -> BarSeries {
        Self {
            bars: self.bars[..len.min(self.bars.len())].to_vec(),
        }
    }
}

impl From<Vec<MarketBar>> for BarSeries {
    fn from(bars: Vec<MarketBar>) -> Self {
        Self::from_vec(bars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn bar(day: i64, close: i64) -> MarketBar {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 21, 0, 0).unwrap() + Duration::days(day);
        let close = Decimal::from(close);
        MarketBar::new(ts, "QQQ", close, close + Decimal::ONE, close - Decimal::ONE, close, Decimal::from(1000))
    }

    #[test]
    fn test_series_sorted_oldest_first() {
        let series = BarSeries::from_vec(vec![bar(2, 102), bar(0, 100), bar(1, 101)]);
        assert_eq!(series.closes(), vec![100.0, 101.0, 102.0]);
        assert_eq!(series.last().map(|b| b.close), Some(Decimal::from(102)));
        assert_eq!(series.prefix(2).len(), 2);
        assert_eq!(series.prefix(10).len(), 3);
    }

    #[test]
    fn test_bar_utilities() {
        let b = bar(0, 100);
        assert_eq!(b.range(), Decimal::from(2));
        assert!(!b.is_bullish());
        assert_eq!(b.volume_f64(), 1000.0);
    }
}
