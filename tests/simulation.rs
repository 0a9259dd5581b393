use chrono::NaiveDate;
use portsim::risk::{DRAWDOWN_REASON, STOP_LOSS_REASON};
use portsim::{
    InMemoryProvider, PricePoint, PriceSeries, RiskControls, SimulationConfig, SimulationError,
    SimulationResult, Simulator, StrategyKind, TradeAction,
};
use std::collections::BTreeMap;
use std::sync::Once;

fn ensure_test_env() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2022, 1, 3).unwrap()
}

fn series_from_closes(ticker: &str, closes: &[f64]) -> PriceSeries {
    PriceSeries::new(
        ticker,
        closes
            .iter()
            .enumerate()
            .map(|(offset, &close)| PricePoint {
                date: start_date() + chrono::Duration::days(offset as i64),
                close,
            })
            .collect(),
    )
}

fn config(tickers: &[&str], days: usize, strategy: StrategyKind) -> SimulationConfig {
    SimulationConfig {
        tickers: tickers.iter().map(|t| t.to_string()).collect(),
        start_date: start_date(),
        end_date: start_date() + chrono::Duration::days(days as i64),
        initial_capital: 10_000.0,
        strategy,
        risk: RiskControls::default(),
    }
}

fn permissive_risk() -> RiskControls {
    RiskControls {
        max_drawdown_pct: 95.0,
        volatility_cap_pct: 10_000.0,
        stop_loss_pct: 95.0,
    }
}

/// Replays the trade log against the known fixture closes and checks that
/// every recorded chart point equals cash plus marked holdings.
fn assert_value_conservation(
    result: &SimulationResult,
    closes_by_ticker: &BTreeMap<&str, Vec<f64>>,
) {
    let close_at = |ticker: &str, date: NaiveDate| -> f64 {
        let offset = (date - start_date()).num_days() as usize;
        closes_by_ticker[ticker][offset]
    };

    let mut cash = result.initial_capital;
    let mut holdings: BTreeMap<String, f64> = BTreeMap::new();
    let mut trade_iter = result.trades.iter().peekable();

    for point in &result.chart_points {
        while trade_iter
            .peek()
            .map(|trade| trade.date <= point.date)
            .unwrap_or(false)
        {
            let trade = trade_iter.next().unwrap();
            match trade.action {
                TradeAction::Buy => {
                    cash -= trade.value;
                    *holdings.entry(trade.ticker.clone()).or_insert(0.0) += trade.quantity;
                }
                TradeAction::Sell => {
                    cash += trade.value;
                    *holdings.entry(trade.ticker.clone()).or_insert(0.0) -= trade.quantity;
                }
            }
        }
        assert!(cash >= -1e-9, "cash went negative on {}", point.date);
        let replayed = cash
            + holdings
                .iter()
                .map(|(ticker, quantity)| quantity * close_at(ticker, point.date))
                .sum::<f64>();
        assert!(
            (replayed - point.value).abs() < 1e-6,
            "value leak on {}: replayed {} vs recorded {}",
            point.date,
            replayed,
            point.value
        );
    }
}

#[tokio::test]
async fn equal_weight_conserves_value_every_day() {
    ensure_test_env();
    let aaa: Vec<f64> = (0..60).map(|i| 100.0 + ((i * 7) % 13) as f64).collect();
    let bbb: Vec<f64> = (0..60).map(|i| 50.0 + ((i * 5) % 11) as f64).collect();
    let provider = InMemoryProvider::new()
        .with_series(series_from_closes("AAA", &aaa))
        .with_series(series_from_closes("BBB", &bbb));

    let mut config = config(&["AAA", "BBB"], 59, StrategyKind::EqualWeight);
    config.risk = permissive_risk();
    let result = Simulator::new(&provider).run(config).await.unwrap();

    assert_eq!(result.chart_points.len(), 60);
    assert!(!result.trades.is_empty());
    let closes = BTreeMap::from([("AAA", aaa), ("BBB", bbb)]);
    assert_value_conservation(&result, &closes);
}

#[tokio::test]
async fn stop_loss_halts_all_later_buys() {
    ensure_test_env();
    // Drops 20% on day two, then recovers well past the entry price.
    let mut closes = vec![100.0, 80.0];
    closes.extend(std::iter::repeat(80.0).take(18));
    closes.extend(std::iter::repeat(120.0).take(10));
    let provider = InMemoryProvider::new().with_series(series_from_closes("AAA", &closes));

    let mut config = config(&["AAA"], closes.len() - 1, StrategyKind::EqualWeight);
    config.risk = RiskControls {
        max_drawdown_pct: 50.0,
        volatility_cap_pct: 10_000.0,
        stop_loss_pct: 15.0,
    };
    let result = Simulator::new(&provider).run(config).await.unwrap();

    assert!(result.final_state.halted);
    assert_eq!(result.trades.len(), 2);
    assert_eq!(result.trades[0].action, TradeAction::Buy);
    assert_eq!(result.trades[1].action, TradeAction::Sell);
    assert_eq!(result.trades[1].reason, STOP_LOSS_REASON);

    let halt_date = result.trades[1].date;
    assert!(result
        .trades
        .iter()
        .all(|trade| trade.action != TradeAction::Buy || trade.date < halt_date));
    assert!((result.final_state.cash - 8_000.0).abs() < 1e-9);
    assert!(result.final_state.holdings.is_empty());
}

#[tokio::test]
async fn drawdown_breach_forces_full_liquidation() {
    ensure_test_env();
    // Rallies 40% then crashes back to the entry price: 28.6% off the peak,
    // above the 20% drawdown limit but above the stop-loss floor.
    let mut closes = vec![100.0, 108.0, 116.0, 124.0, 132.0, 140.0];
    closes.extend(std::iter::repeat(100.0).take(19));
    let provider = InMemoryProvider::new().with_series(series_from_closes("AAA", &closes));

    let mut config = config(&["AAA"], closes.len() - 1, StrategyKind::EqualWeight);
    config.risk = RiskControls {
        max_drawdown_pct: 20.0,
        volatility_cap_pct: 10_000.0,
        stop_loss_pct: 15.0,
    };
    let result = Simulator::new(&provider).run(config).await.unwrap();

    assert!(!result.final_state.halted);
    assert_eq!(result.trades.len(), 2);
    assert_eq!(result.trades[1].action, TradeAction::Sell);
    assert_eq!(result.trades[1].reason, DRAWDOWN_REASON);
    assert_eq!(
        result.trades[1].date,
        start_date() + chrono::Duration::days(6)
    );
}

#[tokio::test]
async fn equal_weight_converges_on_flat_prices() {
    ensure_test_env();
    let provider = InMemoryProvider::new()
        .with_series(series_from_closes("AAA", &[100.0; 10]))
        .with_series(series_from_closes("BBB", &[50.0; 10]));

    let result = Simulator::new(&provider)
        .run(config(&["AAA", "BBB"], 9, StrategyKind::EqualWeight))
        .await
        .unwrap();

    let aaa_value = result.final_state.holdings["AAA"] * 100.0;
    let bbb_value = result.final_state.holdings["BBB"] * 50.0;
    assert!((aaa_value - 5_000.0).abs() < 1e-9);
    assert!((bbb_value - 5_000.0).abs() < 1e-9);
    assert!(result.final_state.cash.abs() < 1e-9);

    assert_eq!(result.metrics.volatility, 0.0);
    assert_eq!(result.metrics.sharpe_ratio, 0.0);
    assert!(result.metrics.total_return.abs() < 1e-9);
    assert!(result
        .chart_points
        .iter()
        .all(|point| (point.value - 10_000.0).abs() < 1e-9));
}

#[tokio::test]
async fn repeated_runs_are_byte_identical() {
    ensure_test_env();
    let aaa: Vec<f64> = (0..45).map(|i| 100.0 + ((i * 3) % 17) as f64).collect();
    let bbb: Vec<f64> = (0..45).map(|i| 60.0 - ((i * 2) % 7) as f64).collect();
    let provider = InMemoryProvider::new()
        .with_series(series_from_closes("AAA", &aaa))
        .with_series(series_from_closes("BBB", &bbb));

    let mut run_config = config(&["AAA", "BBB"], 44, StrategyKind::Momentum);
    run_config.risk = permissive_risk();

    let first = Simulator::new(&provider)
        .run(run_config.clone())
        .await
        .unwrap();
    let second = Simulator::new(&provider).run(run_config).await.unwrap();

    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[tokio::test]
async fn momentum_concentrates_in_the_recent_winner() {
    ensure_test_env();
    let aaa: Vec<f64> = (0..45).map(|i| 100.0 + i as f64).collect();
    let bbb: Vec<f64> = (0..45).map(|i| 100.0 - 0.5 * i as f64).collect();
    let provider = InMemoryProvider::new()
        .with_series(series_from_closes("AAA", &aaa))
        .with_series(series_from_closes("BBB", &bbb));

    let mut run_config = config(&["AAA", "BBB"], 44, StrategyKind::Momentum);
    run_config.risk = permissive_risk();
    let result = Simulator::new(&provider).run(run_config).await.unwrap();

    assert!(!result.trades.is_empty());
    assert!(result
        .trades
        .iter()
        .filter(|trade| trade.action == TradeAction::Buy)
        .all(|trade| trade.ticker == "AAA"));
    assert!(result.final_state.holdings.contains_key("AAA"));
    assert!(!result.final_state.holdings.contains_key("BBB"));
}

#[tokio::test]
async fn single_asset_tracks_external_benchmark_exactly() {
    ensure_test_env();
    let closes: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
    let provider = InMemoryProvider::new()
        .with_series(series_from_closes("AAA", &closes))
        .with_series(series_from_closes("INDEX", &closes));

    let mut run_config = config(&["AAA"], 19, StrategyKind::EqualWeight);
    run_config.risk = permissive_risk();
    let result = Simulator::new(&provider)
        .with_benchmark(&provider, "INDEX")
        .run(run_config)
        .await
        .unwrap();

    assert!((result.benchmark_total_return - 0.19).abs() < 1e-9);
    assert!((result.metrics.beta - 1.0).abs() < 1e-6);
    assert!(result.metrics.alpha.abs() < 1e-6);
}

#[tokio::test]
async fn missing_ticker_fails_the_whole_run() {
    ensure_test_env();
    let provider = InMemoryProvider::new().with_series(series_from_closes("AAA", &[100.0; 10]));

    let result = Simulator::new(&provider)
        .run(config(&["AAA", "BBB"], 9, StrategyKind::EqualWeight))
        .await;

    match result {
        Err(SimulationError::DataUnavailable { ticker, .. }) => assert_eq!(ticker, "BBB"),
        other => panic!("expected DataUnavailable, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn invalid_config_is_rejected_before_any_fetch() {
    ensure_test_env();
    let provider = InMemoryProvider::new();
    let mut bad_config = config(&["AAA"], 9, StrategyKind::EqualWeight);
    bad_config.tickers.clear();

    let result = Simulator::new(&provider).run(bad_config).await;
    assert!(matches!(result, Err(SimulationError::Config(_))));
}

#[tokio::test]
async fn short_history_fails_momentum_runs() {
    ensure_test_env();
    let provider = InMemoryProvider::new()
        .with_series(series_from_closes("AAA", &[100.0; 10]))
        .with_series(series_from_closes("BBB", &[50.0; 10]));

    let result = Simulator::new(&provider)
        .run(config(&["AAA", "BBB"], 9, StrategyKind::Momentum))
        .await;
    assert!(matches!(
        result,
        Err(SimulationError::InsufficientHistory(_))
    ));
}

#[tokio::test]
async fn corrupt_series_is_a_fatal_input_error() {
    ensure_test_env();
    let mut series = series_from_closes("AAA", &[100.0, 101.0, 102.0]);
    series.points[2].close = -5.0;
    let provider = InMemoryProvider::new().with_series(series);

    let result = Simulator::new(&provider)
        .run(config(&["AAA"], 2, StrategyKind::EqualWeight))
        .await;
    assert!(matches!(result, Err(SimulationError::InvalidSeries { .. })));
}
