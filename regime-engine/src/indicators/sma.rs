//! SMA (Simple Moving Average) indicator

use crate::indicators::{ta_error, Indicator};
use crate::Result;
use ta::indicators::SimpleMovingAverage;
use ta::Next;

/// SMA indicator wrapper
#[derive(Debug)]
pub struct SMA {
    inner: SimpleMovingAverage,
    period: usize,
    update_count: usize,
    last_value: Option<f64>,
}

impl SMA {
    /// Create new SMA indicator
    pub fn new(period: usize) -> Result<Self> {
        Ok(Self {
            inner: SimpleMovingAverage::new(period).map_err(|e| ta_error("SMA", period, e))?,
            period,
            update_count: 0,
            last_value: None,
        })
    }
}

impl Indicator for SMA {
    type Input = f64;

    fn name(&self) -> &str {
        "SMA"
    }

    fn update(&mut self, value: f64) {
        let sma_value = self.inner.next(value);
        self.update_count += 1;
        if self.update_count >= self.period {
            self.last_value = Some(sma_value);
        }
    }

    fn value(&self) -> Option<f64> {
        self.last_value
    }

    fn is_ready(&self) -> bool {
        self.update_count >= self.period
    }
}

/// Calculate SMA from a series of values
pub fn calculate_sma(values: &[f64], period: usize) -> Result<Vec<Option<f64>>> {
    let mut sma = SMA::new(period)?;
    let mut results = Vec::with_capacity(values.len());

    for &value in values {
        sma.update(value);
        results.push(sma.value());
    }

    Ok(results)
}

/// Latest SMA over the tail of `values`, or `None` before warm-up
pub fn latest_sma(values: &[f64], period: usize) -> Result<Option<f64>> {
    if values.len() < period {
        return Ok(None);
    }
    Ok(calculate_sma(&values[values.len() - period..], period)?.pop().flatten())
}
