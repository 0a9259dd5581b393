pub mod config;
pub mod error;
pub mod export;
pub mod market_data;
pub mod metrics;
pub mod models;
pub mod portfolio;
pub mod provider;
pub mod risk;
pub mod simulator;
pub mod strategy;

pub use config::{RiskControls, SimulationConfig, StrategyKind};
pub use error::SimulationError;
pub use models::{
    ChartPoint, Order, PerformanceMetrics, PortfolioState, PricePoint, PriceSeries,
    SimulationResult, Trade, TradeAction,
};
pub use provider::{CsvDirProvider, InMemoryProvider, PriceProvider};
pub use simulator::Simulator;
