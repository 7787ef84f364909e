use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::debug;

use super::PriceSource;
use crate::types::PricePoint;

/// File-backed price history: one `<TICKER>.csv` per ticker with
/// `date,close` rows (ISO dates, optional header line).
pub struct CsvPriceSource {
    data_dir: PathBuf,
}

impl CsvPriceSource {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }
}

#[async_trait::async_trait]
impl PriceSource for CsvPriceSource {
    async fn fetch_prices(&self, ticker: &str) -> Result<Vec<PricePoint>> {
        let path = self.data_dir.join(format!("{}.csv", ticker));
        let raw = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed to read price file: {}", path.display()))?;

        let mut points = Vec::new();
        for (line_no, line) in raw.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut fields = line.split(',');
            let (date_str, close_str) = match (fields.next(), fields.next()) {
                (Some(d), Some(c)) => (d.trim(), c.trim()),
                _ => anyhow::bail!("{}:{}: expected date,close", path.display(), line_no + 1),
            };
            // Header row: neither field parses. A first data row with a
            // typo'd date still has a numeric close and must error below.
            if line_no == 0
                && NaiveDate::parse_from_str(date_str, "%Y-%m-%d").is_err()
                && Decimal::from_str(close_str).is_err()
            {
                continue;
            }
            let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
                .with_context(|| format!("{}:{}: bad date", path.display(), line_no + 1))?;
            let close = Decimal::from_str(close_str)
                .with_context(|| format!("{}:{}: bad close", path.display(), line_no + 1))?;
            points.push(PricePoint { date, close });
        }

        points.sort_by_key(|p| p.date);
        debug!("{}: loaded {} price points", ticker, points.len());
        Ok(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn load(ticker: &str, contents: &str) -> Result<Vec<PricePoint>> {
        let dir = std::env::temp_dir().join(format!("csv-source-test-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join(format!("{}.csv", ticker)), contents)
            .await
            .unwrap();
        CsvPriceSource::new(&dir).fetch_prices(ticker).await
    }

    #[tokio::test]
    async fn test_parses_csv_with_header_and_sorts() {
        let points = load("HDR", "date,close\n2024-02-01,110.5\n2024-01-02,100\n")
            .await
            .unwrap();
        assert_eq!(points.len(), 2);
        assert!(points[0].date < points[1].date);
        assert_eq!(points[1].close.to_string(), "110.5");
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let source = CsvPriceSource::new("/nonexistent-dir");
        assert!(source.fetch_prices("NOPE").await.is_err());
    }

    #[tokio::test]
    async fn test_bad_row_is_an_error() {
        assert!(load("BAD", "2024-01-02,100\nnot-a-date,50\n").await.is_err());
    }

    #[tokio::test]
    async fn test_bad_date_on_first_row_is_not_a_header() {
        // A numeric close means this is a data row with a broken date, not
        // a header, and it must not be silently dropped.
        let result = load("BAD1", "2024-13-02,100\n2024-02-01,110\n").await;
        assert!(result.is_err());
    }
}
