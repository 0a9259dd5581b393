use crate::config::StrategyKind;
use crate::market_data::MarketData;
use crate::models::Order;
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Rebalance schedule shared by the periodic strategies, roughly monthly.
pub const REBALANCE_INTERVAL_DAYS: usize = 21;

/// Rebalance gaps below this value are noise and are not turned into orders.
pub const MIN_ORDER_VALUE: f64 = 1.0;

/// Read-only view of one trading day handed to a strategy. Strategies are
/// side-effect free: they propose orders, the ledger executes them.
pub struct StrategyContext<'a> {
    pub day_index: usize,
    pub date: NaiveDate,
    pub cash: f64,
    pub holdings: &'a BTreeMap<String, f64>,
    pub data: &'a MarketData,
}

impl<'a> StrategyContext<'a> {
    pub fn close(&self, ticker: &str) -> f64 {
        self.data.close(ticker, self.day_index)
    }

    pub fn closes_up_to(&self, ticker: &str) -> &'a [f64] {
        self.data.closes_up_to(ticker, self.day_index)
    }

    pub fn holding_value(&self, ticker: &str) -> f64 {
        self.holdings.get(ticker).copied().unwrap_or(0.0) * self.close(ticker)
    }

    pub fn total_value(&self) -> f64 {
        self.cash
            + self
                .holdings
                .iter()
                .map(|(ticker, quantity)| quantity * self.close(ticker))
                .sum::<f64>()
    }

    pub fn is_rebalance_day(&self) -> bool {
        self.day_index % REBALANCE_INTERVAL_DAYS == 0
    }
}

pub trait Strategy {
    fn label(&self) -> &str;
    /// Proposed orders for the day. Sell intents are listed before buy
    /// intents so freed cash is available to fund purchases, and ties are
    /// broken by ticker lexical order for determinism.
    fn decide(&self, ctx: &StrategyContext) -> Vec<Order>;
    /// Aligned trading days required before the strategy can ever trade.
    fn min_history_days(&self) -> usize;
}

#[path = "strategies/equal_weight.rs"]
pub mod equal_weight;

pub use equal_weight::EqualWeightStrategy;

#[path = "strategies/momentum.rs"]
pub mod momentum;

pub use momentum::MomentumStrategy;

#[path = "strategies/mean_reversion.rs"]
pub mod mean_reversion;

pub use mean_reversion::MeanReversionStrategy;

pub fn create_strategy(kind: StrategyKind) -> Box<dyn Strategy + Send + Sync> {
    match kind {
        StrategyKind::EqualWeight => Box::new(EqualWeightStrategy::new()),
        StrategyKind::Momentum => Box::new(MomentumStrategy::new()),
        StrategyKind::MeanReversion => Box::new(MeanReversionStrategy::new()),
    }
}
