mod config;
mod errors;
mod model;
mod precompute;
mod sim;
mod types;

use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use config::ForecastConfig;
use model::Regime;
use precompute::{CsvPriceSource, JsonForecastStore, Precomputer};
use types::Percentile;

#[derive(Parser)]
#[command(name = "regime-forecast")]
#[command(version = "0.1.0")]
#[command(about = "Regime-switching Monte Carlo price forecaster", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit, simulate and persist forecast records for a batch of tickers
    Precompute {
        /// Comma-separated tickers (e.g. AAPL,MSFT,SPY)
        #[arg(short, long)]
        tickers: String,

        /// Directory holding <TICKER>.csv price files
        #[arg(short, long, default_value = "data/prices")]
        data_dir: String,

        /// Directory receiving <TICKER>.json forecast records
        #[arg(short, long, default_value = "data/precomputed")]
        out_dir: String,

        /// Override the simulation horizon in years
        #[arg(long)]
        years: Option<usize>,

        /// Override the number of simulated paths
        #[arg(long)]
        sims: Option<usize>,

        /// Override the random seed
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Look up a forecast price: current price x multiplier percentile
    Forecast {
        #[arg(short, long)]
        ticker: String,

        /// Forecast year (1..=horizon)
        #[arg(short, long)]
        year: usize,

        /// Percentile: p10, p50 or p90
        #[arg(short, long, default_value = "p50")]
        percentile: String,

        /// Current price of the asset
        #[arg(long)]
        price: f64,

        #[arg(short, long, default_value = "data/precomputed")]
        out_dir: String,
    },
    /// Print the fitted model behind a persisted forecast record
    Inspect {
        #[arg(short, long)]
        ticker: String,

        #[arg(short, long, default_value = "data/precomputed")]
        out_dir: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Precompute {
            tickers,
            data_dir,
            out_dir,
            years,
            sims,
            seed,
        } => {
            run_precompute(&cli.config, &tickers, &data_dir, &out_dir, years, sims, seed).await?;
        }
        Commands::Forecast {
            ticker,
            year,
            percentile,
            price,
            out_dir,
        } => {
            run_forecast(&ticker, year, &percentile, price, &out_dir).await?;
        }
        Commands::Inspect { ticker, out_dir } => {
            run_inspect(&ticker, &out_dir).await?;
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_precompute(
    config_path: &str,
    tickers: &str,
    data_dir: &str,
    out_dir: &str,
    years: Option<usize>,
    sims: Option<usize>,
    seed: Option<u64>,
) -> Result<()> {
    let mut config = ForecastConfig::load(config_path)?;
    if let Some(years) = years {
        config.simulation.horizon_years = years;
    }
    if let Some(sims) = sims {
        config.simulation.n_sims = sims;
    }
    if let Some(seed) = seed {
        config.fit.seed = seed;
    }
    config
        .validate()
        .map_err(|errors| anyhow!("invalid config: {}", errors.join(", ")))?;

    let tickers: Vec<String> = tickers
        .split(',')
        .map(|t| t.trim().to_uppercase())
        .filter(|t| !t.is_empty())
        .collect();
    if tickers.is_empty() {
        return Err(anyhow!("no tickers given"));
    }

    info!(
        "Precomputing {} tickers: horizon={}y, paths={}, seed={}",
        tickers.len(),
        config.simulation.horizon_years,
        config.simulation.n_sims,
        config.fit.seed
    );

    let precomputer = Precomputer::new(
        config,
        Arc::new(CsvPriceSource::new(data_dir)),
        Arc::new(JsonForecastStore::new(out_dir)),
    );
    let results = precomputer.run_many(&tickers).await;

    let succeeded = results.values().filter(|r| r.is_ok()).count();
    info!("Done: {}/{} tickers precomputed", succeeded, results.len());
    if succeeded == 0 {
        return Err(anyhow!("all tickers failed"));
    }
    Ok(())
}

async fn run_forecast(
    ticker: &str,
    year: usize,
    percentile: &str,
    price: f64,
    out_dir: &str,
) -> Result<()> {
    let percentile = Percentile::from_str(percentile).map_err(|e| anyhow!(e))?;
    let store = JsonForecastStore::new(out_dir);
    let record = store.load(ticker).await?;

    let multiplier = record.multiplier(year, percentile).ok_or_else(|| {
        anyhow!(
            "year {} is outside the simulated horizon 1..={}",
            year,
            record.horizon_years
        )
    })?;

    let current_price =
        Decimal::from_f64(price).ok_or_else(|| anyhow!("invalid price: {}", price))?;
    let multiplier_dec =
        Decimal::from_f64(multiplier).ok_or_else(|| anyhow!("invalid multiplier"))?;
    let forecast_price = (current_price * multiplier_dec).round_dp(2);

    println!("{} forecast (as of {})", record.ticker, record.asof);
    println!(
        "  year {} {} multiplier: {:.4}",
        year,
        percentile.as_str(),
        multiplier
    );
    println!("  forecast price: {} (current {})", forecast_price, current_price);
    Ok(())
}

async fn run_inspect(ticker: &str, out_dir: &str) -> Result<()> {
    let store = JsonForecastStore::new(out_dir);
    let record = store.load(ticker).await?;
    let model = &record.model;

    println!("{} fitted on data through {}", record.ticker, record.asof);
    println!("  lookback start:  {}", record.lookback_start);
    println!("  starting price:  {}", record.starting_price);
    println!(
        "  annual growth:   {:.2}%  volatility: {:.2}%",
        record.estimated_annual_growth * 100.0,
        record.annual_volatility * 100.0
    );
    println!(
        "  horizon: {} years, {} simulated paths",
        record.horizon_years, record.n_sims
    );

    for (i, (mu, sigma)) in model
        .mu_monthly_log
        .iter()
        .zip(&model.sigma_monthly_log)
        .enumerate()
    {
        let label = Regime::from_index(i).map(|r| r.as_str()).unwrap_or("?");
        let weight = model.stationary_weights.get(i).copied().unwrap_or(0.0);
        println!(
            "  {:<4} regime: mu={:+.4}/mo sigma={:.4}/mo stationary weight {:.3}",
            label, mu, sigma, weight
        );
    }

    println!("  transition matrix:");
    for row in &model.transition_matrix {
        let cells: Vec<String> = row.iter().map(|p| format!("{:.4}", p)).collect();
        println!("    [{}]", cells.join(", "));
    }
    Ok(())
}
