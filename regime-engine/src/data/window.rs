//! Shared market window handed to every engine in a cycle

use crate::data::{BarSeries, MarketBar};
use std::collections::HashMap;

/// Trailing bars per symbol, fetched once per run
#[derive(Debug, Default, Clone)]
pub struct MarketWindow {
    series: HashMap<String, BarSeries>,
}

impl MarketWindow {
    /// Create new empty window
    pub fn new() -> Self {
        Self {
            series: HashMap::new(),
        }
    }

    /// Insert (or replace) the bars of one symbol
    pub fn insert(&mut self, symbol: impl Into<String>, bars: Vec<MarketBar>) {
        self.series.insert(symbol.into(), BarSeries::from_vec(bars));
    }

    /// Bars for a symbol, if it was fetched
    pub fn series(&self, symbol: &str) -> Option<&BarSeries> {
        self.series.get(symbol)
    }

    /// Number of bars available for a symbol
    pub fn available(&self, symbol: &str) -> usize {
        self.series.get(symbol).map(BarSeries::len).unwrap_or(0)
    }

    /// Get latest bar
    pub fn latest(&self, symbol: &str) -> Option<&MarketBar> {
        self.series.get(symbol)?.last()
    }

    /// Window restricted to bars at or before `index` of `anchor`'s timeline.
    ///
    /// Other symbols are cut at the anchor bar's timestamp.
    pub fn truncated(&self, anchor: &str, index: usize) -> MarketWindow {
        let Some(cutoff) = self
            .series
            .get(anchor)
            .and_then(|s| s.bars().get(index))
            .map(|b| b.timestamp)
        else {
            return MarketWindow::new();
        };

        let series = self
            .series
            .iter()
            .map(|(symbol, s)| {
                let len = s.bars().partition_point(|b| b.timestamp <= cutoff);
                (symbol.clone(), s.prefix(len))
            })
            .collect();
        MarketWindow { series }
    }

    /// Symbols present in the window
    pub fn symbols(&self) -> Vec<&str> {
        let mut symbols: Vec<&str> = self.series.keys().map(String::as_str).collect();
        symbols.sort_unstable();
        symbols
    }

    /// Check if window is empty
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;

    fn bars(symbol: &str, count: i64) -> Vec<MarketBar> {
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 21, 0, 0).unwrap();
        (0..count)
            .map(|i| {
                let px = Decimal::from(100 + i);
                MarketBar::new(start + Duration::days(i), symbol, px, px, px, px, Decimal::from(10))
            })
            .collect()
    }

    #[test]
    fn test_window() {
        let mut window = MarketWindow::new();
        window.insert("QQQ", bars("QQQ", 5));
        assert_eq!(window.available("QQQ"), 5);
        assert_eq!(window.available("TLT"), 0);
        assert_eq!(window.latest("QQQ").map(|b| b.close), Some(Decimal::from(104)));
    }

    #[test]
    fn test_truncated_aligns_other_symbols_by_time() {
        let mut window = MarketWindow::new();
        window.insert("QQQ", bars("QQQ", 10));
        window.insert("TLT", bars("TLT", 4));

        let cut = window.truncated("QQQ", 5);
        assert_eq!(cut.available("QQQ"), 6);
        assert_eq!(cut.available("TLT"), 4);

        let early = window.truncated("QQQ", 1);
        assert_eq!(early.available("TLT"), 2);
        assert!(window.truncated("SPY", 0).is_empty());
    }
}
