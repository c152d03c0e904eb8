//! Order intents and executed trade records

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// A signed quantity change for one instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderIntent {
    pub symbol: String,
    /// Positive buys, negative sells
    pub quantity: Decimal,
    pub reference_price: Decimal,
}

impl OrderIntent {
    pub fn new(symbol: impl Into<String>, quantity: Decimal, reference_price: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            quantity,
            reference_price,
        }
    }

    pub fn side(&self) -> Side {
        if self.quantity.is_sign_negative() {
            Side::Sell
        } else {
            Side::Buy
        }
    }

    /// Reducing orders free cash and are sent first
    pub fn is_reduce(&self) -> bool {
        self.quantity < Decimal::ZERO
    }

    /// Absolute dollar value at the reference price
    pub fn notional(&self) -> Decimal {
        self.quantity.abs() * self.reference_price
    }
}

/// One executed fill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub side: Side,
    /// Unsigned filled quantity
    pub quantity: Decimal,
    pub price: Decimal,
}

impl TradeRecord {
    pub fn new(timestamp: DateTime<Utc>, symbol: impl Into<String>, side: Side, quantity: Decimal, price: Decimal) -> Self {
        Self {
            timestamp,
            symbol: symbol.into(),
            side,
            quantity,
            price,
        }
    }

    /// Fill of `intent` at its reference price
    pub fn filled(intent: &OrderIntent, timestamp: DateTime<Utc>) -> Self {
        Self::new(
            timestamp,
            intent.symbol.clone(),
            intent.side(),
            intent.quantity.abs(),
            intent.reference_price,
        )
    }

    pub fn notional(&self) -> Decimal {
        self.quantity * self.price
    }

    /// Signed position change
    pub fn signed_quantity(&self) -> Decimal {
        match self.side {
            Side::Buy => self.quantity,
            Side::Sell => -self.quantity,
        }
    }
}
