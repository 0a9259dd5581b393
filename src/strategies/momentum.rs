use crate::models::{Order, QUANTITY_EPSILON};
use crate::strategy::{StrategyContext, MIN_ORDER_VALUE};
use std::cmp::Ordering;

pub const MOMENTUM_LOOKBACK_DAYS: usize = 20;

/// Ranks assets by trailing return over the lookback window on the periodic
/// rebalance schedule, concentrates capital in the top half and exits the
/// bottom half. Assets without lookback+1 days of history are neutral: their
/// positions are left untouched and excluded from the ranking.
pub struct MomentumStrategy {
    label: String,
    lookback: usize,
}

impl MomentumStrategy {
    pub fn new() -> Self {
        Self {
            label: "momentum".to_string(),
            lookback: MOMENTUM_LOOKBACK_DAYS,
        }
    }

    fn trailing_return(&self, closes: &[f64]) -> Option<f64> {
        if closes.len() <= self.lookback {
            return None;
        }
        let current = closes[closes.len() - 1];
        let past = closes[closes.len() - 1 - self.lookback];
        Some(current / past - 1.0)
    }
}

impl Default for MomentumStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl super::Strategy for MomentumStrategy {
    fn label(&self) -> &str {
        &self.label
    }

    fn decide(&self, ctx: &StrategyContext) -> Vec<Order> {
        if !ctx.is_rebalance_day() {
            return Vec::new();
        }

        let mut ranked: Vec<(&String, f64)> = Vec::new();
        let mut neutral_value = 0.0;
        for ticker in ctx.data.tickers() {
            match self.trailing_return(ctx.closes_up_to(ticker)) {
                Some(trailing) => ranked.push((ticker, trailing)),
                None => neutral_value += ctx.holding_value(ticker),
            }
        }
        if ranked.is_empty() {
            return Vec::new();
        }

        // Descending return, ticker lexical order on ties.
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });
        let winner_count = ranked.len().div_ceil(2);
        let (winners, losers) = ranked.split_at(winner_count);

        let investable = ctx.total_value() - neutral_value;
        let target = investable / winner_count as f64;

        let mut sells = Vec::new();
        let mut buys = Vec::new();
        for (ticker, _) in losers {
            let held = ctx.holdings.get(*ticker).copied().unwrap_or(0.0);
            if held > QUANTITY_EPSILON {
                sells.push(Order::sell((*ticker).clone(), held, "momentum exit"));
            }
        }
        for (ticker, _) in winners {
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
                buys.push(Order::buy((*ticker).clone(), quantity, "momentum rebalance"));
            } else {
                sells.push(Order::sell(
                    (*ticker).clone(),
                    quantity,
                    "momentum rebalance",
                ));
            }
        }

        sells.extend(buys);
        sells
    }

    fn min_history_days(&self) -> usize {
        self.lookback + 1
    }
}
