//! Paper book: cash and share positions of one strategy

use crate::portfolio::{positions_value, OrderIntent, PriceMap, Side, TradeRecord};
use crate::strategy::StrategyState;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub struct PaperBook {
    cash: Decimal,
    positions: BTreeMap<String, Decimal>,
}

impl PaperBook {
    pub fn new(cash: Decimal) -> Self {
        Self {
            cash,
            positions: BTreeMap::new(),
        }
    }

    pub fn from_state(state: &StrategyState) -> Self {
        Self {
            cash: state.cash,
            positions: state.current_positions.clone(),
        }
    }

    pub fn cash(&self) -> Decimal {
        self.cash
    }

    pub fn positions(&self) -> &BTreeMap<String, Decimal> {
        &self.positions
    }

    pub fn quantity(&self, symbol: &str) -> Decimal {
        self.positions.get(symbol).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn market_value(&self, prices: &PriceMap) -> Result<Decimal> {
        positions_value(&self.positions, prices)
    }

    pub fn equity(&self, prices: &PriceMap) -> Result<Decimal> {
        Ok(self.cash + self.market_value(prices)?)
    }

    /// Fill intents at their reference price, reductions first.
    ///
    /// Sells are capped at the held quantity and buys at the whole shares
    /// available cash can pay for.
    pub fn execute(&mut self, intents: &[OrderIntent], timestamp: DateTime<Utc>) -> Vec<TradeRecord> {
        let (reductions, increases): (Vec<&OrderIntent>, Vec<&OrderIntent>) =
            intents.iter().partition(|i| i.is_reduce());

        let mut fills = Vec::new();
        for intent in reductions {
            let quantity = intent.quantity.abs().min(self.quantity(&intent.symbol));
            if quantity > Decimal::ZERO {
                fills.push(self.fill(timestamp, &intent.symbol, Side::Sell, quantity, intent.reference_price));
            }
        }
        for intent in increases {
            if intent.reference_price <= Decimal::ZERO {
                continue;
            }
            let affordable = (self.cash / intent.reference_price).floor();
            let quantity = intent.quantity.min(affordable);
            if quantity < intent.quantity {
                warn!(
                    symbol = %intent.symbol,
                    requested = %intent.quantity,
                    filled = %quantity,
                    "buy clipped to available cash"
                );
            }
            if quantity > Decimal::ZERO {
                fills.push(self.fill(timestamp, &intent.symbol, Side::Buy, quantity, intent.reference_price));
            }
        }
        fills
    }

    /// Book fills reported by an external router
    pub fn apply(&mut self, fills: &[TradeRecord]) -> Result<()> {
        for fill in fills {
            self.book(&fill.symbol, fill.signed_quantity(), fill.price);
        }
        if self.cash < Decimal::ZERO {
            return Err(Error::execution(format!("fills overdraw cash to {}", self.cash)));
        }
        Ok(())
    }

    /// Write cash, positions and marked equity into `state`
    pub fn settle(&self, state: &mut StrategyState, prices: &PriceMap) -> Result<()> {
        state.account_equity = self.equity(prices)?;
        state.cash = self.cash;
        state.current_positions = self.positions.clone();
        Ok(())
    }

    fn fill(&mut self, timestamp: DateTime<Utc>, symbol: &str, side: Side, quantity: Decimal, price: Decimal) -> TradeRecord {
        let record = TradeRecord::new(timestamp, symbol, side, quantity, price);
        self.book(symbol, record.signed_quantity(), price);
        record
    }

    fn book(&mut self, symbol: &str, signed_quantity: Decimal, price: Decimal) {
        self.cash -= signed_quantity * price;
        let held = self.positions.entry(symbol.to_string()).or_insert(Decimal::ZERO);
        *held += signed_quantity;
        if held.is_zero() {
            self.positions.remove(symbol);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn prices() -> PriceMap {
        [("QQQ", "100"), ("TQQQ", "50")]
            .iter()
            .map(|(s, p)| (s.to_string(), dec(p)))
            .collect()
    }

    #[test]
    fn test_sells_fund_buys() {
        let mut book = PaperBook::new(Decimal::ZERO);
        book.apply(&[TradeRecord::new(Utc::now(), "QQQ", Side::Buy, dec("10"), dec("0"))])
            .unwrap();

        // buy listed first still waits for the sell
        let intents = vec![
            OrderIntent::new("TQQQ", dec("20"), dec("50")),
            OrderIntent::new("QQQ", dec("-10"), dec("100")),
        ];
        let fills = book.execute(&intents, Utc::now());
        assert_eq!(fills.len(), 2);
        assert_eq!(fills[0].side, Side::Sell);
        assert_eq!(book.quantity("TQQQ"), dec("20"));
        assert_eq!(book.quantity("QQQ"), Decimal::ZERO);
        assert_eq!(book.cash(), Decimal::ZERO);
    }

    #[test]
    fn test_buys_clipped_to_cash() {
        let mut book = PaperBook::new(dec("1020"));
        let fills = book.execute(&[OrderIntent::new("QQQ", dec("15"), dec("100"))], Utc::now());
        assert_eq!(fills[0].quantity, dec("10"));
        assert_eq!(book.cash(), dec("20"));
        assert_eq!(book.equity(&prices()).unwrap(), dec("1020"));
    }

    #[test]
    fn test_overdraw_rejected() {
        let mut book = PaperBook::new(dec("100"));
        let fill = TradeRecord::new(Utc::now(), "QQQ", Side::Buy, dec("2"), dec("100"));
        assert!(book.apply(&[fill]).is_err());
    }

    #[test]
    fn test_settle_into_state() {
        let mut state = StrategyState::new(dec("1000"));
        let mut book = PaperBook::from_state(&state);
        book.execute(&[OrderIntent::new("TQQQ", dec("4"), dec("50"))], Utc::now());
        book.settle(&mut state, &prices()).unwrap();
        assert_eq!(state.cash, dec("800"));
        assert_eq!(state.quantity("TQQQ"), dec("4"));
        assert_eq!(state.account_equity, dec("1000"));
    }
}
