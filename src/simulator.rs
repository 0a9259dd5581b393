use crate::config::SimulationConfig;
use crate::error::SimulationError;
use crate::market_data::MarketData;
use crate::metrics::PerformanceCalculator;
use crate::models::{ChartPoint, PriceSeries, SimulationResult};
use crate::portfolio::Ledger;
use crate::provider::PriceProvider;
use crate::risk::apply_risk_controls;
use crate::strategy::{create_strategy, StrategyContext};
use futures::stream::{FuturesUnordered, StreamExt};
use log::info;

/// Drives a run end to end: concurrent fetch, date alignment, the strictly
/// sequential day loop (strategy, risk controls, ledger, mark-to-market) and
/// the final metrics pass. Fails fast with no partial result.
pub struct Simulator<'a> {
    provider: &'a dyn PriceProvider,
    benchmark: Option<(&'a dyn PriceProvider, String)>,
}

impl<'a> Simulator<'a> {
    pub fn new(provider: &'a dyn PriceProvider) -> Self {
        Self {
            provider,
            benchmark: None,
        }
    }

    /// Use an external index series for alpha/beta instead of the built-in
    /// equal-weight buy-and-hold benchmark.
    pub fn with_benchmark(
        mut self,
        provider: &'a dyn PriceProvider,
        ticker: impl Into<String>,
    ) -> Self {
        self.benchmark = Some((provider, ticker.into()));
        self
    }

    pub async fn run(&self, config: SimulationConfig) -> Result<SimulationResult, SimulationError> {
        config.validate()?;
        let tickers = config.normalized_tickers();
        let strategy = create_strategy(config.strategy);

        info!(
            "Starting {} simulation for {} tickers, {} to {}",
            strategy.label(),
            tickers.len(),
            config.start_date,
            config.end_date
        );

        let series = self.fetch_universe(&tickers, &config).await?;
        let data = MarketData::align(series)?;

        if data.day_count() < strategy.min_history_days() {
            return Err(SimulationError::InsufficientHistory(format!(
                "{} strategy needs {} aligned trading days, only {} available",
                strategy.label(),
                strategy.min_history_days(),
                data.day_count()
            )));
        }

        let benchmark_points = self.build_benchmark(&data, &config).await?;

        let mut ledger = Ledger::new(config.initial_capital);
        let mut chart_points: Vec<ChartPoint> = Vec::with_capacity(data.day_count());

        for day_index in 0..data.day_count() {
            let date = data.dates()[day_index];
            let state = ledger.state();
            let ctx = StrategyContext {
                day_index,
                date,
                cash: state.cash,
                holdings: &state.holdings,
                data: &data,
            };
            let proposed = strategy.decide(&ctx);

            let total_value = ledger.total_value(&data, day_index);
            let decision = apply_risk_controls(
                proposed,
                ledger.state(),
                &chart_points,
                &config.risk,
                config.initial_capital,
                total_value,
            );

            ledger.execute_orders(&decision.orders, date, &data, day_index);
            ledger.set_halted(decision.halted);
            chart_points.push(ledger.mark_to_market(date, &data, day_index));
        }

        let (final_state, trades) = ledger.into_parts();
        let metrics = PerformanceCalculator::calculate(
            &chart_points,
            &trades,
            config.initial_capital,
            &benchmark_points,
        );
        let benchmark_total_return = benchmark_points
            .last()
            .zip(benchmark_points.first())
            .map(|(last, first)| {
                if first.value > 0.0 {
                    last.value / first.value - 1.0
                } else {
                    0.0
                }
            })
            .unwrap_or(0.0);

        info!(
            "Simulation completed: {} trades, total return {:.2}%, Sharpe {:.2}, max drawdown {:.2}%",
            trades.len(),
            metrics.total_return * 100.0,
            metrics.sharpe_ratio,
            metrics.max_drawdown * 100.0
        );

        Ok(SimulationResult {
            start_date: config.start_date,
            end_date: config.end_date,
            initial_capital: config.initial_capital,
            final_state,
            trades,
            chart_points,
            metrics,
            benchmark_total_return,
        })
    }

    /// Fetches all requested series concurrently, failing the whole run on
    /// the first error: the strategies assume a complete universe.
    async fn fetch_universe(
        &self,
        tickers: &[String],
        config: &SimulationConfig,
    ) -> Result<Vec<PriceSeries>, SimulationError> {
        let mut fetches = FuturesUnordered::new();
        for ticker in tickers {
            fetches.push(async move {
                let result = self
                    .provider
                    .fetch_series(ticker, config.start_date, config.end_date)
                    .await;
                (ticker.clone(), result)
            });
        }

        let mut series = Vec::with_capacity(tickers.len());
        while let Some((ticker, result)) = fetches.next().await {
            let fetched = result.map_err(|error| SimulationError::DataUnavailable {
                ticker: ticker.clone(),
                message: error.to_string(),
            })?;
            fetched
                .validate()
                .map_err(|error| SimulationError::InvalidSeries {
                    ticker: ticker.clone(),
                    message: error.to_string(),
                })?;
            series.push(fetched);
        }

        // FuturesUnordered yields in completion order; realign to the
        // configured universe so downstream processing is deterministic.
        series.sort_by(|a, b| a.ticker.cmp(&b.ticker));
        Ok(series)
    }

    /// Benchmark value series over the same aligned trading days: an
    /// external index when configured, otherwise an equal-weight
    /// buy-and-hold of the universe itself.
    async fn build_benchmark(
        &self,
        data: &MarketData,
        config: &SimulationConfig,
    ) -> Result<Vec<ChartPoint>, SimulationError> {
        if let Some((provider, ticker)) = &self.benchmark {
            let fetched = provider
                .fetch_series(ticker, config.start_date, config.end_date)
                .await
                .map_err(|error| SimulationError::DataUnavailable {
                    ticker: ticker.clone(),
                    message: error.to_string(),
                })?;
            fetched
                .validate()
                .map_err(|error| SimulationError::InvalidSeries {
                    ticker: ticker.clone(),
                    message: error.to_string(),
                })?;

            let mut points = Vec::with_capacity(data.day_count());
            let mut cursor = fetched.points.iter().peekable();
            for &date in data.dates() {
                while cursor.peek().map(|p| p.date < date).unwrap_or(false) {
                    cursor.next();
                }
                match cursor.peek() {
                    Some(point) if point.date == date => {
                        let scaled = config.initial_capital * point.close / fetched.points[0].close;
                        points.push(ChartPoint {
                            date,
                            value: scaled,
                        });
                    }
                    _ => {
                        return Err(SimulationError::InvalidSeries {
                            ticker: ticker.clone(),
                            message: format!("benchmark is missing trading day {}", date),
                        })
                    }
                }
            }
            return Ok(points);
        }

        let points = (0..data.day_count())
            .map(|day_index| {
                let growth = data
                    .tickers()
                    .iter()
                    .map(|ticker| data.close(ticker, day_index) / data.close(ticker, 0))
                    .sum::<f64>()
                    / data.tickers().len() as f64;
                ChartPoint {
                    date: data.dates()[day_index],
                    value: config.initial_capital * growth,
                }
            })
            .collect();
        Ok(points)
    }
}
