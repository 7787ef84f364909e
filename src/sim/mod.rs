pub mod monte_carlo;
pub mod percentile;

pub use monte_carlo::MonteCarloSimulator;
pub use percentile::summarize_percentiles;
