use crate::models::{Order, QUANTITY_EPSILON};
use crate::strategy::{StrategyContext, MIN_ORDER_VALUE};

/// Rebalances every asset to `totalValue / assetCount` on the periodic
/// schedule and stays idle in between.
pub struct EqualWeightStrategy {
    label: String,
}

impl EqualWeightStrategy {
    pub fn new() -> Self {
        Self {
            label: "equal_weight".to_string(),
        }
    }
}

impl Default for EqualWeightStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl super::Strategy for EqualWeightStrategy {
    fn label(&self) -> &str {
        &self.label
    }

    fn decide(&self, ctx: &StrategyContext) -> Vec<Order> {
        if !ctx.is_rebalance_day() {
            return Vec::new();
        }

        let tickers = ctx.data.tickers();
        let target = ctx.total_value() / tickers.len() as f64;

        let mut sells = Vec::new();
        let mut buys = Vec::new();
        for ticker in tickers {
            let price = ctx.close(ticker);
            let gap = target - ctx.holding_value(ticker);
            if gap.abs() < MIN_ORDER_VALUE {
                continue;
            }
            let quantity = gap.abs() / price;
            if quantity < QUANTITY_EPSILON {
                continue;
            }
            if gap > 0.0 {
                buys.push(Order::buy(ticker.clone(), quantity, "rebalance"));
            } else {
                sells.push(Order::sell(ticker.clone(), quantity, "rebalance"));
            }
        }

        sells.extend(buys);
        sells
    }

    fn min_history_days(&self) -> usize {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::MarketData;
    use crate::models::{PricePoint, PriceSeries, TradeAction};
    use crate::strategy::Strategy;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn flat_data() -> MarketData {
        let start = NaiveDate::from_ymd_opt(2022, 1, 3).unwrap();
        let series = |ticker: &str, close: f64| {
            PriceSeries::new(
                ticker,
                (0..5)
                    .map(|offset| PricePoint {
                        date: start + chrono::Duration::days(offset),
                        close,
                    })
                    .collect(),
            )
        };
        MarketData::align(vec![series("AAA", 100.0), series("BBB", 50.0)]).unwrap()
    }

    #[test]
    fn splits_capital_evenly_on_the_first_rebalance_day() {
        let data = flat_data();
        let holdings = BTreeMap::new();
        let ctx = StrategyContext {
            day_index: 0,
            date: data.dates()[0],
            cash: 10_000.0,
            holdings: &holdings,
            data: &data,
        };

        let orders = EqualWeightStrategy::new().decide(&ctx);
        assert_eq!(orders.len(), 2);
        assert!(orders
            .iter()
            .all(|order| order.action == TradeAction::Buy && order.reason == "rebalance"));
        assert!((orders[0].quantity * 100.0 - 5_000.0).abs() < 1e-9);
        assert!((orders[1].quantity * 50.0 - 5_000.0).abs() < 1e-9);
    }

    #[test]
    fn stays_idle_between_rebalance_days() {
        let data = flat_data();
        let holdings = BTreeMap::from([("AAA".to_string(), 50.0)]);
        let ctx = StrategyContext {
            day_index: 1,
            date: data.dates()[1],
            cash: 5_000.0,
            holdings: &holdings,
            data: &data,
        };

        assert!(EqualWeightStrategy::new().decide(&ctx).is_empty());
    }
}
