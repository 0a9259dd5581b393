use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use log::info;
use portsim::export::trades_to_csv;
use portsim::{
    CsvDirProvider, RiskControls, SimulationConfig, SimulationResult, Simulator, StrategyKind,
};
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "portsim")]
#[command(about = "A portfolio strategy backtesting engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Backtest a strategy over historical daily closes
    Run {
        /// Directory containing one <TICKER>.csv file per asset (date,close rows)
        #[arg(long = "data-dir", value_name = "PATH")]
        data_dir: PathBuf,
        /// Comma separated ticker universe
        #[arg(long, value_delimiter = ',', num_args = 1..)]
        tickers: Vec<String>,
        /// First day of the backtest window (YYYY-MM-DD)
        #[arg(long)]
        start: NaiveDate,
        /// Last day of the backtest window (YYYY-MM-DD)
        #[arg(long)]
        end: NaiveDate,
        /// Starting cash
        #[arg(long, default_value_t = 100_000.0)]
        capital: f64,
        /// Strategy: equal_weight, momentum or mean_reversion
        #[arg(long, default_value = "equal_weight")]
        strategy: String,
        /// Stop-loss threshold as a percentage of initial capital
        #[arg(long = "stop-loss", default_value_t = 15.0)]
        stop_loss_pct: f64,
        /// Maximum tolerated drawdown percentage from the running peak
        #[arg(long = "max-drawdown", default_value_t = 20.0)]
        max_drawdown_pct: f64,
        /// Annualized volatility cap percentage for new exposure
        #[arg(long = "volatility-cap", default_value_t = 30.0)]
        volatility_cap_pct: f64,
        /// Benchmark ticker for alpha/beta (must exist in the data directory)
        #[arg(long = "benchmark")]
        benchmark: Option<String>,
        /// Write the trade log as CSV to this path
        #[arg(long = "trades-csv", value_name = "PATH")]
        trades_csv: Option<PathBuf>,
        /// Print the full result as JSON instead of the text report
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let Cli { command } = Cli::parse();
    match command {
        Commands::Run {
            data_dir,
            tickers,
            start,
            end,
            capital,
            strategy,
            stop_loss_pct,
            max_drawdown_pct,
            volatility_cap_pct,
            benchmark,
            trades_csv,
            json,
        } => {
            let config = SimulationConfig {
                tickers,
                start_date: start,
                end_date: end,
                initial_capital: capital,
                strategy: StrategyKind::parse(&strategy)?,
                risk: RiskControls {
                    max_drawdown_pct,
                    volatility_cap_pct,
                    stop_loss_pct,
                },
            };

            let provider = CsvDirProvider::new(&data_dir);
            let mut simulator = Simulator::new(&provider);
            if let Some(ticker) = &benchmark {
                simulator = simulator.with_benchmark(&provider, ticker.clone());
            }
            let result = simulator.run(config).await?;

            if let Some(path) = trades_csv {
                fs::write(&path, trades_to_csv(&result.trades))
                    .with_context(|| format!("failed to write {}", path.display()))?;
                info!("Wrote {} trades to {}", result.trades.len(), path.display());
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_report(&result);
            }
        }
    }

    Ok(())
}

fn print_report(result: &SimulationResult) {
    println!("Period          {} to {}", result.start_date, result.end_date);
    println!("Initial capital {:.2}", result.initial_capital);
    println!("Final value     {:.2}", result.final_value());
    println!(
        "Total return    {:.2}% (benchmark {:.2}%)",
        result.metrics.total_return * 100.0,
        result.benchmark_total_return * 100.0
    );
    println!("Sharpe ratio    {:.3}", result.metrics.sharpe_ratio);
    println!("Volatility      {:.2}%", result.metrics.volatility * 100.0);
    println!(
        "Max drawdown    {:.2}%",
        result.metrics.max_drawdown * 100.0
    );
    println!("Win rate        {:.1}%", result.metrics.win_rate * 100.0);
    println!(
        "Alpha / beta    {:.4} / {:.3}",
        result.metrics.alpha, result.metrics.beta
    );
    println!("Trades          {}", result.trades.len());
    if result.final_state.halted {
        println!("Note: run ended halted after a stop-loss breach");
    }
}
