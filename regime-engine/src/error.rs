//! Error taxonomy shared by the engine and the runner

use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed registry or strategy parameters. Fatal at load.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Warm-up unmet for a required series. The step is a no-op.
    #[error("Insufficient data for {symbol}: need {required} bars, have {available}")]
    InsufficientData {
        symbol: String,
        required: usize,
        available: usize,
    },

    /// Stored and observed positions drifted apart beyond the allowed limit.
    #[error(
        "Position drift for {symbol}: stored {stored}, observed {observed} ({drift_pct}% > {max_drift_pct}%)"
    )]
    Reconciliation {
        symbol: String,
        stored: Decimal,
        observed: Decimal,
        drift_pct: Decimal,
        max_drift_pct: Decimal,
    },

    /// Failure inside one strategy's cycle.
    #[error("Execution error: {0}")]
    Execution(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    pub fn execution(msg: impl Into<String>) -> Self {
        Error::Execution(msg.into())
    }

    /// Warm-up shortfalls hold the prior state and are not failures.
    pub fn is_no_op(&self) -> bool {
        matches!(self, Error::InsufficientData { .. })
    }

    /// Errors that must stop the process rather than a single strategy.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let warmup = Error::InsufficientData {
            symbol: "QQQ".to_string(),
            required: 147,
            available: 20,
        };
        assert!(warmup.is_no_op());
        assert!(!warmup.is_fatal());

        assert!(Error::config("no strategies").is_fatal());
        assert!(!Error::execution("quote timeout").is_no_op());
        assert_eq!(
            warmup.to_string(),
            "Insufficient data for QQQ: need 147 bars, have 20"
        );
    }
}
