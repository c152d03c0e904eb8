//! Adaptive trend filter
//!
//! Kaufman-style efficiency ratio weighted by volume. The signed,
//! volume-weighted efficiency ratio, scaled to [-100, 100], is the trend
//! strength.

use crate::indicators::Indicator;
use crate::{Error, Result};
use std::collections::VecDeque;

/// Adaptive trend filter over (close, volume) pairs
#[derive(Debug, Clone)]
pub struct AdaptiveTrendFilter {
    lookback: usize,
    window: VecDeque<(f64, f64)>,
    strength: Option<f64>,
}

impl AdaptiveTrendFilter {
    /// Create a filter measuring efficiency over `lookback` bar-to-bar changes
    pub fn new(lookback: usize) -> Result<Self> {
        if lookback == 0 {
            return Err(Error::config("trend lookback must be positive"));
        }
        Ok(Self {
            lookback,
            window: VecDeque::with_capacity(lookback + 1),
            strength: None,
        })
    }

    /// Volume-weighted efficiency ratio of the current window, in [-1, 1]
    fn efficiency_ratio(&self) -> f64 {
        let points: Vec<(f64, f64)> = self.window.iter().copied().collect();
        let total_volume: f64 = points.iter().skip(1).map(|(_, v)| v.max(0.0)).sum();
        // missing volume data degrades to an unweighted ratio
        let weighted = total_volume > 0.0;

        let mut directional = 0.0;
        let mut path = 0.0;
        for pair in points.windows(2) {
            let (prev, _) = pair[0];
            let (price, volume) = pair[1];
            let w = if weighted { volume.max(0.0) } else { 1.0 };
            let change = price - prev;
            directional += w * change;
            path += w * change.abs();
        }

        if path > 0.0 {
            (directional / path).clamp(-1.0, 1.0)
        } else {
            0.0
        }
    }
}

impl Indicator for AdaptiveTrendFilter {
    type Input = (f64, f64);

    fn name(&self) -> &str {
        "AdaptiveTrend"
    }

    fn update(&mut self, (price, volume): (f64, f64)) {
        if !price.is_finite() || price <= 0.0 {
            return;
        }
        self.window.push_back((price, volume));
        if self.window.len() > self.lookback + 1 {
            self.window.pop_front();
        }

        if self.window.len() <= self.lookback {
            return;
        }
        self.strength = Some(self.efficiency_ratio() * 100.0);
    }

    /// Signed trend strength in [-100, 100]
    fn value(&self) -> Option<f64> {
        self.strength
    }

    fn is_ready(&self) -> bool {
        self.strength.is_some()
    }
}

/// Latest trend strength over the full series
pub fn calculate_trend_strength(closes: &[f64], volumes: &[f64], lookback: usize) -> Result<Option<f64>> {
    let mut filter = AdaptiveTrendFilter::new(lookback)?;
    for (i, &close) in closes.iter().enumerate() {
        let volume = volumes.get(i).copied().unwrap_or(0.0);
        filter.update((close, volume));
    }
    Ok(filter.value())
}

/// Trend strength normalized by `t_max` and clipped to [-1, 1]
pub fn normalize_trend(strength: f64, t_max: f64) -> f64 {
    if t_max <= 0.0 {
        return 0.0;
    }
    (strength / t_max).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_straight_line_is_full_strength() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64 * 0.1).collect();
        let volumes = vec![1000.0; 30];
        let strength = calculate_trend_strength(&closes, &volumes, 20).unwrap().unwrap();
        assert!((strength - 100.0).abs() < 1e-9);

        let falling: Vec<f64> = closes.iter().rev().copied().collect();
        let strength = calculate_trend_strength(&falling, &volumes, 20).unwrap().unwrap();
        assert!((strength + 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_choppy_market_is_weak() {
        let closes: Vec<f64> = (0..30).map(|i| if i % 2 == 0 { 100.0 } else { 101.0 }).collect();
        let strength = calculate_trend_strength(&closes, &[], 20).unwrap().unwrap();
        assert!(strength.abs() <= 10.0);
    }

    #[test]
    fn test_volume_weighting() {
        // Up moves on heavy volume, down moves on light volume
        let closes = vec![100.0, 101.0, 100.5, 101.5, 101.0, 102.0];
        let volumes = vec![0.0, 5000.0, 100.0, 5000.0, 100.0, 5000.0];
        let weighted = calculate_trend_strength(&closes, &volumes, 5).unwrap().unwrap();
        let unweighted = calculate_trend_strength(&closes, &[], 5).unwrap().unwrap();
        assert!(weighted > unweighted);
    }

    #[test]
    fn test_not_ready_before_lookback() {
        let mut filter = AdaptiveTrendFilter::new(5).unwrap();
        for i in 0..5 {
            filter.update((100.0 + i as f64, 10.0));
        }
        assert!(!filter.is_ready());
        filter.update((106.0, 10.0));
        assert!(filter.is_ready());
        assert_eq!(filter.value(), Some(100.0));
    }

    #[test]
    fn test_normalize_trend() {
        assert_eq!(normalize_trend(30.0, 60.0), 0.5);
        assert_eq!(normalize_trend(100.0, 60.0), 1.0);
        assert_eq!(normalize_trend(-100.0, 60.0), -1.0);
        assert_eq!(normalize_trend(10.0, 0.0), 0.0);
    }
}
