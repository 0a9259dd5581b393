use crate::config::RiskControls;
use crate::metrics::TRADING_DAYS_PER_YEAR;
use crate::models::{ChartPoint, Order, PortfolioState, TradeAction, QUANTITY_EPSILON};
use log::{debug, info};
use statrs::statistics::Statistics;

/// Trailing window of daily value returns used for the volatility cap.
pub const VOLATILITY_WINDOW_DAYS: usize = 10;

/// Buy quantities are halved while trailing volatility exceeds the cap.
pub const VOLATILITY_DAMPING: f64 = 0.5;

pub const STOP_LOSS_REASON: &str = "stop-loss";
pub const DRAWDOWN_REASON: &str = "drawdown-limit";

#[derive(Debug)]
pub struct RiskDecision {
    pub orders: Vec<Order>,
    pub halted: bool,
}

/// Pure transform over the strategy's proposals, evaluated first match wins:
/// stop-loss liquidation (terminal for buys), max-drawdown liquidation
/// (recoverable), then the volatility throttle. Reads portfolio state and the
/// value series, never mutates them.
pub fn apply_risk_controls(
    proposed: Vec<Order>,
    state: &PortfolioState,
    chart_points: &[ChartPoint],
    controls: &RiskControls,
    initial_capital: f64,
    total_value: f64,
) -> RiskDecision {
    if state.halted {
        let orders = proposed
            .into_iter()
            .filter(|order| order.action == TradeAction::Sell)
            .collect();
        return RiskDecision {
            orders,
            halted: true,
        };
    }

    let stop_loss_floor = initial_capital * (1.0 - controls.stop_loss_pct / 100.0);
    if total_value <= stop_loss_floor {
        info!(
            "Stop-loss triggered: value {:.2} breached floor {:.2}; liquidating and halting",
            total_value, stop_loss_floor
        );
        return RiskDecision {
            orders: liquidation_orders(state, STOP_LOSS_REASON),
            halted: true,
        };
    }

    if state.peak_value > 0.0 {
        let drawdown = (state.peak_value - total_value) / state.peak_value;
        if drawdown >= controls.max_drawdown_pct / 100.0 {
            info!(
                "Drawdown limit hit: {:.2}% off peak {:.2}; liquidating",
                drawdown * 100.0,
                state.peak_value
            );
            return RiskDecision {
                orders: liquidation_orders(state, DRAWDOWN_REASON),
                halted: false,
            };
        }
    }

    let mut orders = proposed;
    if let Some(volatility) = trailing_volatility(chart_points, VOLATILITY_WINDOW_DAYS) {
        if volatility > controls.volatility_cap_pct / 100.0 {
            debug!(
                "Volatility cap active ({:.4} annualized); damping buy orders",
                volatility
            );
            for order in orders.iter_mut() {
                if order.action == TradeAction::Buy {
                    order.quantity *= VOLATILITY_DAMPING;
                }
            }
        }
    }

    RiskDecision {
        orders,
        halted: false,
    }
}

fn liquidation_orders(state: &PortfolioState, reason: &str) -> Vec<Order> {
    state
        .holdings
        .iter()
        .filter(|(_, &quantity)| quantity > QUANTITY_EPSILON)
        .map(|(ticker, &quantity)| Order::sell(ticker.clone(), quantity, reason))
        .collect()
}

/// Annualized standard deviation of daily returns over the trailing window,
/// None until window+1 chart points exist.
pub fn trailing_volatility(chart_points: &[ChartPoint], window: usize) -> Option<f64> {
    if chart_points.len() < window + 1 {
        return None;
    }
    let tail = &chart_points[chart_points.len() - window - 1..];
    let returns: Vec<f64> = tail
        .windows(2)
        .map(|pair| {
            if pair[0].value > 0.0 {
                pair[1].value / pair[0].value - 1.0
            } else {
                0.0
            }
        })
        .collect();
    Some(returns.population_std_dev() * TRADING_DAYS_PER_YEAR.sqrt())
}
