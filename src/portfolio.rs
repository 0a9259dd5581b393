use crate::market_data::MarketData;
use crate::models::{
    ChartPoint, Order, PortfolioState, Trade, TradeAction, QUANTITY_EPSILON,
};
use chrono::NaiveDate;
use log::debug;

const CASH_EPSILON: f64 = 1e-6;

/// Owns the evolving cash/holdings state and the append-only trade log.
/// Orders execute at the same day's closing price; there is no intrabar fill
/// modeling. The ledger is the only component that mutates portfolio state.
pub struct Ledger {
    state: PortfolioState,
    trades: Vec<Trade>,
    next_trade_id: u64,
}

impl Ledger {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            state: PortfolioState::new(initial_capital),
            trades: Vec::new(),
            next_trade_id: 1,
        }
    }

    pub fn state(&self) -> &PortfolioState {
        &self.state
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn set_halted(&mut self, halted: bool) {
        self.state.halted = self.state.halted || halted;
    }

    pub fn total_value(&self, data: &MarketData, day_index: usize) -> f64 {
        self.state.cash
            + self
                .state
                .holdings
                .iter()
                .map(|(ticker, quantity)| quantity * data.close(ticker, day_index))
                .sum::<f64>()
    }

    /// Applies final orders for one day. A buy whose value exceeds available
    /// cash and a sell whose quantity exceeds the held position are rejected
    /// without logging a trade.
    pub fn execute_orders(
        &mut self,
        orders: &[Order],
        date: NaiveDate,
        data: &MarketData,
        day_index: usize,
    ) {
        for order in orders {
            if order.quantity <= QUANTITY_EPSILON || !order.quantity.is_finite() {
                continue;
            }
            let price = data.close(&order.ticker, day_index);
            match order.action {
                TradeAction::Buy => self.execute_buy(order, date, price),
                TradeAction::Sell => self.execute_sell(order, date, price),
            }
        }
    }

    fn execute_buy(&mut self, order: &Order, date: NaiveDate, price: f64) {
        let mut value = order.quantity * price;
        if value > self.state.cash + CASH_EPSILON {
            debug!(
                "Rejecting BUY {} x{:.4}: value {:.2} exceeds cash {:.2}",
                order.ticker, order.quantity, value, self.state.cash
            );
            return;
        }
        let mut quantity = order.quantity;
        if value > self.state.cash {
            // Rounding residue within CASH_EPSILON: fill with the cash that
            // is actually there so the debit stays exact.
            value = self.state.cash;
            quantity = value / price;
        }
        self.state.cash -= value;
        *self.state.holdings.entry(order.ticker.clone()).or_insert(0.0) += quantity;
        self.append_trade(order, date, price, quantity, value);
    }

    fn execute_sell(&mut self, order: &Order, date: NaiveDate, price: f64) {
        let held = self.state.quantity_held(&order.ticker);
        if order.quantity > held + QUANTITY_EPSILON {
            debug!(
                "Rejecting SELL {} x{:.4}: only {:.4} held",
                order.ticker, order.quantity, held
            );
            return;
        }
        let quantity = order.quantity.min(held);
        let value = quantity * price;
        self.state.cash += value;
        let remaining = held - quantity;
        if remaining > QUANTITY_EPSILON {
            self.state.holdings.insert(order.ticker.clone(), remaining);
        } else {
            self.state.holdings.remove(&order.ticker);
        }
        self.append_trade(order, date, price, quantity, value);
    }

    fn append_trade(
        &mut self,
        order: &Order,
        date: NaiveDate,
        price: f64,
        quantity: f64,
        value: f64,
    ) {
        self.trades.push(Trade {
            id: self.next_trade_id,
            date,
            ticker: order.ticker.clone(),
            action: order.action,
            quantity,
            price,
            value,
            reason: order.reason.clone(),
        });
        self.next_trade_id += 1;
    }

    /// Revalues all holdings at the day's close, raising the running peak
    /// when a new high is made. Runs once per trading day regardless of
    /// whether any order executed.
    pub fn mark_to_market(
        &mut self,
        date: NaiveDate,
        data: &MarketData,
        day_index: usize,
    ) -> ChartPoint {
        let value = self.total_value(data, day_index);
        if value > self.state.peak_value {
            self.state.peak_value = value;
        }
        ChartPoint { date, value }
    }

    pub fn into_parts(self) -> (PortfolioState, Vec<Trade>) {
        (self.state, self.trades)
    }
}
