use thiserror::Error;

/// Errors produced by the forecasting core itself. Collaborator failures
/// (price fetch, persistence) stay `anyhow` at the orchestrator seam.
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("insufficient history: {got} monthly observations, need at least {need}")]
    InsufficientData { got: usize, need: usize },

    #[error("no price history available for {ticker}")]
    EmptyPriceHistory { ticker: String },
}
