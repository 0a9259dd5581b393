use thiserror::Error;

/// Fatal conditions that abort a simulation run before any partial result is
/// constructed. Degenerate arithmetic (zero volatility, zero benchmark
/// variance) is not an error and is zero-guarded in the metrics calculator.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("market data unavailable for {ticker}: {message}")]
    DataUnavailable { ticker: String, message: String },

    #[error("invalid price series for {ticker}: {message}")]
    InvalidSeries { ticker: String, message: String },

    #[error("insufficient history: {0}")]
    InsufficientHistory(String),
}
