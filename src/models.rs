use anyhow::{anyhow, Result as AnyResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

pub const QUANTITY_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

/// Historical closing prices for one ticker, immutable once fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSeries {
    pub ticker: String,
    pub points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn new(ticker: impl Into<String>, points: Vec<PricePoint>) -> Self {
        Self {
            ticker: ticker.into(),
            points,
        }
    }

    /// Enforces the market data contract: dates strictly ascending, no
    /// duplicates, all closes strictly positive.
    pub fn validate(&self) -> AnyResult<()> {
        for window in self.points.windows(2) {
            if window[1].date <= window[0].date {
                return Err(anyhow!(
                    "dates must be strictly ascending ({} followed by {})",
                    window[0].date,
                    window[1].date
                ));
            }
        }
        for point in &self.points {
            if !(point.close > 0.0) || !point.close.is_finite() {
                return Err(anyhow!(
                    "close price must be positive on {} (value: {})",
                    point.date,
                    point.close
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeAction {
    Buy,
    Sell,
}

impl TradeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeAction::Buy => "BUY",
            TradeAction::Sell => "SELL",
        }
    }
}

impl FromStr for TradeAction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(TradeAction::Buy),
            "SELL" => Ok(TradeAction::Sell),
            other => Err(anyhow!("Unknown trade action '{}'", other)),
        }
    }
}

/// Intent produced by a strategy or rewritten by the risk layer. Orders
/// describe what should happen; only the ledger executes them.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub ticker: String,
    pub action: TradeAction,
    pub quantity: f64,
    pub reason: String,
}

impl Order {
    pub fn buy(ticker: impl Into<String>, quantity: f64, reason: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            action: TradeAction::Buy,
            quantity,
            reason: reason.into(),
        }
    }

    pub fn sell(ticker: impl Into<String>, quantity: f64, reason: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            action: TradeAction::Sell,
            quantity,
            reason: reason.into(),
        }
    }
}

/// Executed order, appended to the trade log and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    pub id: u64,
    pub date: NaiveDate,
    pub ticker: String,
    pub action: TradeAction,
    pub quantity: f64,
    pub price: f64,
    pub value: f64,
    pub reason: String,
}

/// Total portfolio value at one day's close: cash plus all holdings marked
/// to market.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartPoint {
    pub date: NaiveDate,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioState {
    pub cash: f64,
    pub holdings: BTreeMap<String, f64>,
    pub peak_value: f64,
    pub halted: bool,
}

impl PortfolioState {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            cash: initial_capital,
            holdings: BTreeMap::new(),
            peak_value: initial_capital,
            halted: false,
        }
    }

    pub fn quantity_held(&self, ticker: &str) -> f64 {
        self.holdings.get(ticker).copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    pub total_return: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub volatility: f64,
    pub win_rate: f64,
    pub alpha: f64,
    pub beta: f64,
}

/// Aggregate output of a completed run. Created once, owned by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_capital: f64,
    pub final_state: PortfolioState,
    pub trades: Vec<Trade>,
    pub chart_points: Vec<ChartPoint>,
    pub metrics: PerformanceMetrics,
    pub benchmark_total_return: f64,
}

impl SimulationResult {
    pub fn final_value(&self) -> f64 {
        self.chart_points
            .last()
            .map(|point| point.value)
            .unwrap_or(self.initial_capital)
    }
}
