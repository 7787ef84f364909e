pub mod forecast;
pub mod returns;

pub use forecast::{ForecastRecord, ModelSummary, Percentile, PercentileSummary};
pub use returns::{PricePoint, ReturnSeries};
