use crate::error::SimulationError;
use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use std::collections::BTreeSet;

/// Risk thresholds, each a positive percentage. Stop-loss is measured against
/// initial capital, max drawdown against the trailing peak, and the
/// volatility cap against trailing annualized realized volatility.
#[derive(Debug, Clone, Copy)]
pub struct RiskControls {
    pub max_drawdown_pct: f64,
    pub volatility_cap_pct: f64,
    pub stop_loss_pct: f64,
}

impl Default for RiskControls {
    fn default() -> Self {
        Self {
            max_drawdown_pct: 20.0,
            volatility_cap_pct: 30.0,
            stop_loss_pct: 15.0,
        }
    }
}

impl RiskControls {
    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("maxDrawdownPct", self.max_drawdown_pct),
            ("volatilityCapPct", self.volatility_cap_pct),
            ("stopLossPct", self.stop_loss_pct),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(anyhow!(
                    "{} must be a positive percentage (value: {})",
                    name,
                    value
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    EqualWeight,
    Momentum,
    MeanReversion,
}

impl StrategyKind {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "equal_weight" | "equal-weight" => Ok(Self::EqualWeight),
            "momentum" => Ok(Self::Momentum),
            "mean_reversion" | "mean-reversion" => Ok(Self::MeanReversion),
            other => Err(anyhow!(
                "strategy must be equal_weight, momentum or mean_reversion (value: {})",
                other
            )),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::EqualWeight => "equal_weight",
            Self::Momentum => "momentum",
            Self::MeanReversion => "mean_reversion",
        }
    }
}

/// Caller-owned description of one run, passed by value into the simulator.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub tickers: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_capital: f64,
    pub strategy: StrategyKind,
    pub risk: RiskControls,
}

impl SimulationConfig {
    /// Rejects invalid configurations before any data is fetched.
    pub fn validate(&self) -> Result<(), SimulationError> {
        if self.tickers.is_empty() {
            return Err(SimulationError::Config(
                "ticker set must not be empty".to_string(),
            ));
        }
        let mut seen = BTreeSet::new();
        for ticker in &self.tickers {
            if ticker.trim().is_empty() {
                return Err(SimulationError::Config(
                    "ticker symbols must not be blank".to_string(),
                ));
            }
            if !seen.insert(ticker.trim().to_ascii_uppercase()) {
                return Err(SimulationError::Config(format!(
                    "duplicate ticker {}",
                    ticker
                )));
            }
        }
        if !self.initial_capital.is_finite() || self.initial_capital <= 0.0 {
            return Err(SimulationError::Config(format!(
                "initial capital must be positive (value: {})",
                self.initial_capital
            )));
        }
        if self.start_date >= self.end_date {
            return Err(SimulationError::Config(format!(
                "start date {} must be before end date {}",
                self.start_date, self.end_date
            )));
        }
        self.risk
            .validate()
            .map_err(|error| SimulationError::Config(error.to_string()))?;
        Ok(())
    }

    /// Ticker universe normalized to uppercase, sorted for deterministic
    /// iteration everywhere downstream.
    pub fn normalized_tickers(&self) -> Vec<String> {
        let mut tickers: Vec<String> = self
            .tickers
            .iter()
            .map(|ticker| ticker.trim().to_ascii_uppercase())
            .collect();
        tickers.sort();
        tickers
    }
}
