#![allow(dead_code)]
use chrono::{Datelike, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// One observation from the price-history collaborator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: Decimal,
}

/// Ordered monthly log-returns, immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnSeries {
    values: Vec<f64>,
}

impl ReturnSeries {
    pub fn from_log_returns(values: Vec<f64>) -> Self {
        Self { values }
    }

    /// Resample a time-ordered price series to month-end closes, then take
    /// log-returns ln(m_t / m_{t-1}). Non-positive closes are skipped since
    /// they have no log-return.
    pub fn from_daily_prices(points: &[PricePoint]) -> Self {
        let mut monthly: Vec<f64> = Vec::new();
        let mut current_month: Option<(i32, u32)> = None;

        for point in points {
            let close = match point.close.to_f64() {
                Some(c) if c > 0.0 => c,
                _ => continue,
            };
            let key = (point.date.year(), point.date.month());
            match monthly.last_mut() {
                // Same month: later close wins.
                Some(last) if current_month == Some(key) => *last = close,
                _ => {
                    current_month = Some(key);
                    monthly.push(close);
                }
            }
        }

        let values = monthly
            .windows(2)
            .map(|w| (w[1] / w[0]).ln())
            .collect();

        Self { values }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().sum::<f64>() / self.values.len() as f64
    }

    /// Sample standard deviation (ddof = 1).
    pub fn std_dev(&self) -> f64 {
        if self.values.len() < 2 {
            return 0.0;
        }
        let mean = self.mean();
        let var = self
            .values
            .iter()
            .map(|v| (v - mean).powi(2))
            .sum::<f64>()
            / (self.values.len() - 1) as f64;
        var.sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn point(y: i32, m: u32, d: u32, close: Decimal) -> PricePoint {
        PricePoint {
            date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            close,
        }
    }

    #[test]
    fn test_monthly_resample_takes_last_close() {
        let points = vec![
            point(2024, 1, 10, dec!(100)),
            point(2024, 1, 31, dec!(110)),
            point(2024, 2, 5, dec!(105)),
            point(2024, 2, 28, dec!(121)),
            point(2024, 3, 29, dec!(133.1)),
        ];

        let series = ReturnSeries::from_daily_prices(&points);
        assert_eq!(series.len(), 2);
        // Month-end closes are 110, 121, 133.1: two returns of ln(1.1).
        let expected = 1.1f64.ln();
        for v in series.values() {
            assert!((v - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn test_empty_and_single_month_produce_no_returns() {
        assert!(ReturnSeries::from_daily_prices(&[]).is_empty());

        let one_month = vec![point(2024, 1, 2, dec!(50)), point(2024, 1, 30, dec!(55))];
        assert!(ReturnSeries::from_daily_prices(&one_month).is_empty());
    }

    #[test]
    fn test_sample_stats() {
        let series = ReturnSeries::from_log_returns(vec![0.01, 0.03, -0.01, 0.01]);
        assert!((series.mean() - 0.01).abs() < 1e-12);
        let expected_var = (0.0f64.powi(2) + 0.02f64.powi(2) + 0.02f64.powi(2) + 0.0) / 3.0;
        assert!((series.std_dev() - expected_var.sqrt()).abs() < 1e-12);
    }
}
