use crate::models::{Order, QUANTITY_EPSILON};
use crate::strategy::{StrategyContext, MIN_ORDER_VALUE};

pub const MEAN_REVERSION_LOOKBACK_DAYS: usize = 20;
pub const ENTRY_Z_SCORE: f64 = -1.0;
pub const EXIT_Z_SCORE: f64 = 1.0;

/// Fraction of available cash deployed across the day's entry signals.
const CASH_FRACTION_PER_DAY: f64 = 0.5;

/// Buys assets trading at least one standard deviation below their trailing
/// moving average and sells holdings at least one standard deviation above
/// it. Assets without a full lookback window are neutral.
pub struct MeanReversionStrategy {
    label: String,
    lookback: usize,
}

impl MeanReversionStrategy {
    pub fn new() -> Self {
        Self {
            label: "mean_reversion".to_string(),
            lookback: MEAN_REVERSION_LOOKBACK_DAYS,
        }
    }

    /// Z-score of the latest close against the trailing window, None until
    /// lookback+1 days of history exist (same gate as momentum) or when the
    /// window has no variance.
    fn z_score(&self, closes: &[f64]) -> Option<f64> {
        if closes.len() <= self.lookback {
            return None;
        }
        let window = &closes[closes.len() - self.lookback..];
        let mean = window.iter().sum::<f64>() / window.len() as f64;
        let variance = window
            .iter()
            .map(|close| (close - mean).powi(2))
            .sum::<f64>()
            / window.len() as f64;
        let std_dev = variance.sqrt();
        if std_dev < f64::EPSILON {
            return None;
        }
        Some((closes[closes.len() - 1] - mean) / std_dev)
    }
}

impl Default for MeanReversionStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl super::Strategy for MeanReversionStrategy {
    fn label(&self) -> &str {
        &self.label
    }

    fn decide(&self, ctx: &StrategyContext) -> Vec<Order> {
        let mut sells = Vec::new();
        let mut entry_tickers = Vec::new();
        for ticker in ctx.data.tickers() {
            let Some(z) = self.z_score(ctx.closes_up_to(ticker)) else {
                continue;
            };
            if z >= EXIT_Z_SCORE {
                let held = ctx.holdings.get(ticker).copied().unwrap_or(0.0);
                if held > QUANTITY_EPSILON {
                    sells.push(Order::sell(ticker.clone(), held, "mean-reversion exit"));
                }
            } else if z <= ENTRY_Z_SCORE {
                entry_tickers.push(ticker);
            }
        }

        let mut orders = sells;
        if !entry_tickers.is_empty() {
            let budget = ctx.cash * CASH_FRACTION_PER_DAY / entry_tickers.len() as f64;
            if budget >= MIN_ORDER_VALUE {
                for ticker in entry_tickers {
                    let quantity = budget / ctx.close(ticker);
                    if quantity > QUANTITY_EPSILON {
                        orders.push(Order::buy(ticker.clone(), quantity, "mean-reversion entry"));
                    }
                }
            }
        }
        orders
    }

    fn min_history_days(&self) -> usize {
        self.lookback + 1
    }
}
