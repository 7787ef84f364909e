use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// {p10, p50, p90} reduction of one year's simulated multipliers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentileSummary {
    pub p10: f64,
    pub p50: f64,
    pub p90: f64,
}

/// Fitted model parameters in plain serializable form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    pub mu_monthly_log: Vec<f64>,
    pub sigma_monthly_log: Vec<f64>,
    pub transition_matrix: Vec<Vec<f64>>,
    pub stationary_weights: Vec<f64>,
}

/// The durable per-ticker artifact. Written once per precompute run and
/// read-only thereafter; valuation consumers multiply a current price by a
/// chosen year/percentile multiplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    pub ticker: String,
    pub asof: NaiveDate,
    pub lookback_start: NaiveDate,
    pub starting_price: Decimal,
    pub horizon_years: usize,
    pub n_sims: usize,
    pub estimated_annual_growth: f64,
    pub annual_volatility: f64,
    pub model: ModelSummary,
    pub multipliers_by_year: BTreeMap<usize, PercentileSummary>,
}

impl ForecastRecord {
    /// Multiplier for (year, percentile), or None when the year is outside
    /// the simulated horizon.
    pub fn multiplier(&self, year: usize, percentile: Percentile) -> Option<f64> {
        self.multipliers_by_year.get(&year).map(|s| match percentile {
            Percentile::P10 => s.p10,
            Percentile::P50 => s.p50,
            Percentile::P90 => s.p90,
        })
    }
}

/// Forecast resolution exposed to consumers: pessimistic / median / optimistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Percentile {
    P10,
    P50,
    P90,
}

impl Percentile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Percentile::P10 => "p10",
            Percentile::P50 => "p50",
            Percentile::P90 => "p90",
        }
    }
}

impl FromStr for Percentile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "p10" | "10" => Ok(Percentile::P10),
            "p50" | "50" | "median" => Ok(Percentile::P50),
            "p90" | "90" => Ok(Percentile::P90),
            other => Err(format!("unknown percentile: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_record() -> ForecastRecord {
        let mut multipliers_by_year = BTreeMap::new();
        multipliers_by_year.insert(
            1,
            PercentileSummary {
                p10: 0.9,
                p50: 1.05,
                p90: 1.25,
            },
        );

        ForecastRecord {
            ticker: "AAPL".to_string(),
            asof: NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
            lookback_start: NaiveDate::from_ymd_opt(2010, 1, 31).unwrap(),
            starting_price: dec!(230.50),
            horizon_years: 1,
            n_sims: 100,
            estimated_annual_growth: 0.08,
            annual_volatility: 0.22,
            model: ModelSummary {
                mu_monthly_log: vec![-0.01, 0.012],
                sigma_monthly_log: vec![0.06, 0.03],
                transition_matrix: vec![vec![0.9, 0.1], vec![0.05, 0.95]],
                stationary_weights: vec![1.0 / 3.0, 2.0 / 3.0],
            },
            multipliers_by_year,
        }
    }

    #[test]
    fn test_multiplier_lookup() {
        let record = sample_record();
        assert_eq!(record.multiplier(1, Percentile::P50), Some(1.05));
        assert_eq!(record.multiplier(1, Percentile::P90), Some(1.25));
        assert_eq!(record.multiplier(2, Percentile::P50), None);
    }

    #[test]
    fn test_percentile_parsing() {
        assert_eq!("p10".parse::<Percentile>().unwrap(), Percentile::P10);
        assert_eq!("P50".parse::<Percentile>().unwrap(), Percentile::P50);
        assert_eq!("median".parse::<Percentile>().unwrap(), Percentile::P50);
        assert!("p42".parse::<Percentile>().is_err());
    }

    #[test]
    fn test_record_json_round_trip() {
        let record = sample_record();
        let json = serde_json::to_string_pretty(&record).unwrap();
        let back: ForecastRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, back);
    }
}
