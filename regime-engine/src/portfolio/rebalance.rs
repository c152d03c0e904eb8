//! Rebalance gating and two-phase order planning

use crate::portfolio::OrderIntent;
use crate::strategy::Allocation;
use crate::{Error, Result};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Symbol -> price used for valuation and order sizing
pub type PriceMap = BTreeMap<String, Decimal>;

fn price_of(prices: &PriceMap, symbol: &str) -> Result<Decimal> {
    match prices.get(symbol) {
        Some(price) if *price > Decimal::ZERO => Ok(*price),
        Some(price) => Err(Error::execution(format!("non-positive price {} for {}", price, symbol))),
        None => Err(Error::execution(format!("no price for {}", symbol))),
    }
}

/// Market value of held positions
pub fn positions_value(positions: &BTreeMap<String, Decimal>, prices: &PriceMap) -> Result<Decimal> {
    let mut total = Decimal::ZERO;
    for (symbol, quantity) in positions {
        if quantity.is_zero() {
            continue;
        }
        total += *quantity * price_of(prices, symbol)?;
    }
    Ok(total)
}

/// Held weights of each position against `equity`
pub fn current_weights(
    positions: &BTreeMap<String, Decimal>,
    prices: &PriceMap,
    equity: Decimal,
) -> Result<BTreeMap<String, Decimal>> {
    let mut weights = BTreeMap::new();
    if equity <= Decimal::ZERO {
        return Ok(weights);
    }
    for (symbol, quantity) in positions {
        if quantity.is_zero() {
            continue;
        }
        weights.insert(symbol.clone(), *quantity * price_of(prices, symbol)? / equity);
    }
    Ok(weights)
}

/// Summed absolute difference between target and held weights
pub fn weight_deviation(target: &Allocation, current: &BTreeMap<String, Decimal>) -> Decimal {
    let symbols: BTreeSet<&str> = target
        .symbols()
        .chain(current.keys().map(String::as_str))
        .collect();
    symbols
        .into_iter()
        .map(|s| (target.weight(s) - current.get(s).copied().unwrap_or(Decimal::ZERO)).abs())
        .sum()
}

/// Rebalance only when the deviation exceeds the threshold
pub fn needs_rebalance(target: &Allocation, current: &BTreeMap<String, Decimal>, threshold: Decimal) -> bool {
    let deviation = weight_deviation(target, current);
    let trigger = deviation > threshold;
    if trigger {
        info!(deviation = %deviation, threshold = %threshold, "rebalance triggered");
    } else {
        debug!(deviation = %deviation, threshold = %threshold, "within rebalance threshold");
    }
    trigger
}

/// Orders moving `positions` to `target` at `equity`, in whole shares.
///
/// All reducing orders come before all increasing orders. A buy whose
/// dollar change is below one share's price is skipped.
pub fn plan_orders(
    target: &Allocation,
    positions: &BTreeMap<String, Decimal>,
    prices: &PriceMap,
    equity: Decimal,
) -> Result<Vec<OrderIntent>> {
    let symbols: BTreeSet<&str> = target
        .symbols()
        .chain(positions.iter().filter(|(_, q)| !q.is_zero()).map(|(s, _)| s.as_str()))
        .collect();

    let mut reductions = Vec::new();
    let mut increases = Vec::new();
    for symbol in symbols {
        let price = price_of(prices, symbol)?;
        let held = positions.get(symbol).copied().unwrap_or(Decimal::ZERO);
        let target_value = (equity * target.weight(symbol)).max(Decimal::ZERO);
        let target_qty = (target_value / price).floor();
        let delta = target_qty - held;

        if delta < Decimal::ZERO {
            reductions.push(OrderIntent::new(symbol, delta, price));
        } else if delta > Decimal::ZERO {
            increases.push(OrderIntent::new(symbol, delta, price));
        } else {
            let dollar_delta = target_value - held * price;
            if dollar_delta > Decimal::ZERO && dollar_delta < price {
                info!(
                    symbol = %symbol,
                    allocation = %dollar_delta.round_dp(2),
                    price = %price,
                    "buy smaller than one share skipped"
                );
            }
        }
    }

    reductions.extend(increases);
    Ok(reductions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn map(entries: &[(&str, &str)]) -> BTreeMap<String, Decimal> {
        entries.iter().map(|(s, v)| (s.to_string(), dec(v))).collect()
    }

    fn allocation(entries: &[(&str, &str)]) -> Allocation {
        Allocation::new(map(entries)).unwrap()
    }

    #[test]
    fn test_deviation_and_gating() {
        let target = allocation(&[("TQQQ", "0.6"), ("QQQ", "0.4")]);
        let current = map(&[("QQQ", "1.0")]);
        assert_eq!(weight_deviation(&target, &current), dec("1.2"));
        assert!(needs_rebalance(&target, &current, dec("0.025")));

        let close = map(&[("TQQQ", "0.59"), ("QQQ", "0.405")]);
        assert_eq!(weight_deviation(&target, &close), dec("0.015"));
        assert!(!needs_rebalance(&target, &close, dec("0.025")));
    }

    #[test]
    fn test_current_weights() {
        let positions = map(&[("QQQ", "10"), ("TLT", "0")]);
        let prices = map(&[("QQQ", "400")]);
        let weights = current_weights(&positions, &prices, dec("8000")).unwrap();
        assert_eq!(weights.get("QQQ"), Some(&dec("0.5")));
        assert!(!weights.contains_key("TLT"));
        assert!(current_weights(&map(&[("SPY", "1")]), &prices, dec("8000")).is_err());
    }

    #[test]
    fn test_reductions_precede_increases() {
        // rotate from bonds and core into leverage
        let target = allocation(&[("TQQQ", "0.6"), ("QQQ", "0.4")]);
        let positions = map(&[("QQQ", "20"), ("TMF", "100"), ("AAA", "5")]);
        let prices = map(&[("TQQQ", "50"), ("QQQ", "100"), ("TMF", "10"), ("AAA", "10")]);
        let orders = plan_orders(&target, &positions, &prices, dec("5000")).unwrap();

        let first_increase = orders.iter().position(|o| !o.is_reduce()).unwrap();
        assert!(orders[..first_increase].iter().all(|o| o.is_reduce()));
        assert!(orders[first_increase..].iter().all(|o| !o.is_reduce()));

        let qty = |s: &str| orders.iter().find(|o| o.symbol == s).map(|o| o.quantity);
        assert_eq!(qty("TMF"), Some(dec("-100")));
        assert_eq!(qty("AAA"), Some(dec("-5")));
        assert_eq!(qty("TQQQ"), Some(dec("60")));
        assert_eq!(qty("QQQ"), None);
    }

    #[test]
    fn test_sub_share_buy_is_skipped() {
        let target = allocation(&[("QQQ", "0.01")]);
        let prices = map(&[("QQQ", "450")]);
        let orders = plan_orders(&target, &BTreeMap::new(), &prices, dec("10000")).unwrap();
        assert!(orders.is_empty());
    }

    #[test]
    fn test_missing_price_is_an_error() {
        let target = allocation(&[("QQQ", "1")]);
        let err = plan_orders(&target, &BTreeMap::new(), &BTreeMap::new(), dec("1000")).unwrap_err();
        assert!(!err.is_fatal());
        assert!(!err.is_no_op());
    }
}
