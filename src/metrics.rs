use crate::models::{ChartPoint, PerformanceMetrics, Trade, TradeAction, QUANTITY_EPSILON};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

pub struct PerformanceCalculator;

impl PerformanceCalculator {
    /// Pure function over the completed value series and trade log, computed
    /// once at the end of a run. Degenerate inputs (zero volatility, zero
    /// benchmark variance) produce zeros, never errors.
    pub fn calculate(
        chart_points: &[ChartPoint],
        trades: &[Trade],
        initial_capital: f64,
        benchmark_points: &[ChartPoint],
    ) -> PerformanceMetrics {
        let final_value = chart_points
            .last()
            .map(|point| point.value)
            .unwrap_or(initial_capital);
        let total_return = if initial_capital > 0.0 {
            final_value / initial_capital - 1.0
        } else {
            0.0
        };

        let returns = Self::daily_returns(chart_points);
        let volatility = Self::volatility(&returns);
        let sharpe_ratio = if volatility > 0.0 {
            returns.clone().mean() * TRADING_DAYS_PER_YEAR / volatility
        } else {
            0.0
        };

        let max_drawdown = Self::max_drawdown(chart_points);
        let win_rate = Self::win_rate(trades);

        let benchmark_returns = Self::daily_returns(benchmark_points);
        let (alpha, beta) = Self::alpha_beta(&returns, &benchmark_returns);

        PerformanceMetrics {
            total_return,
            sharpe_ratio,
            max_drawdown,
            volatility,
            win_rate,
            alpha,
            beta,
        }
    }

    pub fn daily_returns(chart_points: &[ChartPoint]) -> Vec<f64> {
        chart_points
            .windows(2)
            .map(|window| {
                if window[0].value > 0.0 {
                    window[1].value / window[0].value - 1.0
                } else {
                    0.0
                }
            })
            .collect()
    }

    /// Annualized standard deviation of daily returns; 0 without returns.
    fn volatility(returns: &[f64]) -> f64 {
        if returns.is_empty() {
            return 0.0;
        }
        returns.to_vec().population_std_dev() * TRADING_DAYS_PER_YEAR.sqrt()
    }

    /// Largest fractional peak-to-trough decline over the run.
    fn max_drawdown(chart_points: &[ChartPoint]) -> f64 {
        let mut max_drawdown = 0.0;
        let mut peak = f64::NEG_INFINITY;
        for point in chart_points {
            if point.value > peak {
                peak = point.value;
            } else if peak > 0.0 {
                let drawdown = (peak - point.value) / peak;
                if drawdown > max_drawdown {
                    max_drawdown = drawdown;
                }
            }
        }
        max_drawdown
    }

    /// Fraction of closing (sell) trades executed above the weighted average
    /// cost basis of the shares they closed, replayed from the trade log.
    fn win_rate(trades: &[Trade]) -> f64 {
        struct Basis {
            quantity: f64,
            cost: f64,
        }

        let mut basis: BTreeMap<&str, Basis> = BTreeMap::new();
        let mut closing_trades = 0usize;
        let mut winning_trades = 0usize;

        for trade in trades {
            match trade.action {
                TradeAction::Buy => {
                    let entry = basis.entry(trade.ticker.as_str()).or_insert(Basis {
                        quantity: 0.0,
                        cost: 0.0,
                    });
                    entry.quantity += trade.quantity;
                    entry.cost += trade.value;
                }
                TradeAction::Sell => {
                    let Some(entry) = basis.get_mut(trade.ticker.as_str()) else {
                        continue;
                    };
                    if entry.quantity <= QUANTITY_EPSILON {
                        continue;
                    }
                    let avg_cost = entry.cost / entry.quantity;
                    closing_trades += 1;
                    if trade.price > avg_cost {
                        winning_trades += 1;
                    }
                    let closed = trade.quantity.min(entry.quantity);
                    entry.cost -= avg_cost * closed;
                    entry.quantity -= closed;
                }
            }
        }

        if closing_trades == 0 {
            0.0
        } else {
            winning_trades as f64 / closing_trades as f64
        }
    }

    /// Linear regression of portfolio daily returns against the benchmark:
    /// beta = cov / var, alpha = annualized excess mean. Zero benchmark
    /// variance yields (0, 0).
    fn alpha_beta(returns: &[f64], benchmark_returns: &[f64]) -> (f64, f64) {
        let paired = returns.len().min(benchmark_returns.len());
        if paired < 2 {
            return (0.0, 0.0);
        }
        let r: Vec<f64> = returns[..paired].to_vec();
        let b: Vec<f64> = benchmark_returns[..paired].to_vec();

        let benchmark_variance = b.clone().population_variance();
        if benchmark_variance <= 0.0 || !benchmark_variance.is_finite() {
            return (0.0, 0.0);
        }

        let covariance = r.clone().population_covariance(b.clone());
        let beta = covariance / benchmark_variance;
        let alpha = (r.mean() - beta * b.mean()) * TRADING_DAYS_PER_YEAR;
        (alpha, beta)
    }
}
