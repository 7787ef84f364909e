mod source;
mod store;

pub use source::CsvPriceSource;
pub use store::JsonForecastStore;

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::config::ForecastConfig;
use crate::errors::ForecastError;
use crate::model::{long_run_stats, stationary_distribution, HmmFitter};
use crate::sim::{summarize_percentiles, MonteCarloSimulator};
use crate::types::{ForecastRecord, ModelSummary, PricePoint, ReturnSeries};

/// Price-history collaborator: yields a time-ordered daily close series.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch_prices(&self, ticker: &str) -> Result<Vec<PricePoint>>;
}

/// Persistence collaborator: receives the finished record.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ForecastStore: Send + Sync {
    async fn save(&self, record: &ForecastRecord) -> Result<()>;
}

/// Composes fit -> stationary analysis -> simulation -> summarization per
/// ticker and hands the record to the persistence collaborator. Tickers are
/// independent: each task reads only its own series and writes only its own
/// record.
#[derive(Clone)]
pub struct Precomputer {
    config: ForecastConfig,
    source: Arc<dyn PriceSource>,
    store: Arc<dyn ForecastStore>,
}

impl Precomputer {
    pub fn new(
        config: ForecastConfig,
        source: Arc<dyn PriceSource>,
        store: Arc<dyn ForecastStore>,
    ) -> Self {
        Self {
            config,
            source,
            store,
        }
    }

    /// Precompute one ticker. Identical (ticker, seed, data) inputs yield an
    /// identical record on rerun.
    pub async fn run_ticker(&self, ticker: &str) -> Result<ForecastRecord> {
        let ticker = ticker.trim().to_uppercase();
        let prices = self.source.fetch_prices(&ticker).await?;
        let (first, last) = match (prices.first(), prices.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return Err(ForecastError::EmptyPriceHistory { ticker }.into()),
        };

        info!(
            "{}: {} price points, {} to {}",
            ticker,
            prices.len(),
            first.date,
            last.date
        );

        let series = ReturnSeries::from_daily_prices(&prices);
        let config = self.config.clone();
        let record_ticker = ticker.clone();
        // Fitting and simulation are CPU-bound; keep them off the async
        // runtime threads.
        let record = tokio::task::spawn_blocking(move || {
            build_record(&config, record_ticker, first, last, &series)
        })
        .await??;

        self.store.save(&record).await?;
        info!(
            "{}: growth={:.2}% vol={:.2}% over {} years ({} paths)",
            ticker,
            record.estimated_annual_growth * 100.0,
            record.annual_volatility * 100.0,
            record.horizon_years,
            record.n_sims
        );
        Ok(record)
    }

    /// Precompute a batch of tickers concurrently, continuing past
    /// individual failures.
    pub async fn run_many(&self, tickers: &[String]) -> BTreeMap<String, Result<ForecastRecord>> {
        let mut tasks = JoinSet::new();
        for ticker in tickers {
            let ticker = ticker.trim().to_uppercase();
            if ticker.is_empty() {
                continue;
            }
            let this = self.clone();
            tasks.spawn(async move {
                let result = this.run_ticker(&ticker).await;
                (ticker, result)
            });
        }

        let mut results = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((ticker, result)) => {
                    match &result {
                        Ok(_) => info!("[OK] {}", ticker),
                        Err(e) => error!("[ERR] {}: {:#}", ticker, e),
                    }
                    results.insert(ticker, result);
                }
                Err(e) => error!("precompute task panicked: {}", e),
            }
        }
        results
    }
}

/// The single-ticker pipeline, synchronous and deterministic given config
/// and inputs.
fn build_record(
    config: &ForecastConfig,
    ticker: String,
    first: PricePoint,
    last: PricePoint,
    series: &ReturnSeries,
) -> Result<ForecastRecord> {
    let fitter = HmmFitter::from_config(&config.fit);
    let fit = fitter.fit(series)?;
    if !fit.converged {
        info!(
            "{}: EM hit the iteration cap ({}), using estimate at cap",
            ticker,
            fit.log_likelihood.len()
        );
    }

    let weights = stationary_distribution(&fit.params.transition);
    let stats = long_run_stats(&fit.params, &weights);

    // Stationary weights seed the initial regime draw: long-horizon
    // forecasts should not depend on today's filtered state.
    let simulator = MonteCarloSimulator::from_config(&config.simulation, config.fit.seed);
    let multipliers_by_year = simulator
        .simulate(&fit.params, &weights)
        .into_iter()
        .map(|(year, multipliers)| (year, summarize_percentiles(&multipliers)))
        .collect();

    let transition_matrix = fit
        .params
        .transition
        .rows()
        .into_iter()
        .map(|row| row.to_vec())
        .collect();

    Ok(ForecastRecord {
        ticker,
        asof: last.date,
        lookback_start: first.date,
        starting_price: last.close,
        horizon_years: config.simulation.horizon_years,
        n_sims: config.simulation.n_sims,
        estimated_annual_growth: stats.annual_growth,
        annual_volatility: stats.annual_volatility,
        model: ModelSummary {
            mu_monthly_log: fit.params.mu.to_vec(),
            sigma_monthly_log: fit.params.sigma.to_vec(),
            transition_matrix,
            stationary_weights: weights.to_vec(),
        },
        multipliers_by_year,
    })
}
