use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use super::ForecastStore;
use crate::types::ForecastRecord;

/// File-backed persistence: one pretty-printed `<TICKER>.json` per record.
pub struct JsonForecastStore {
    out_dir: PathBuf,
}

impl JsonForecastStore {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    fn record_path(&self, ticker: &str) -> PathBuf {
        self.out_dir.join(format!("{}.json", ticker.to_uppercase()))
    }

    /// Read back a persisted record, for valuation lookups.
    pub async fn load(&self, ticker: &str) -> Result<ForecastRecord> {
        let path = self.record_path(ticker);
        let raw = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("no forecast record at {}", path.display()))?;
        let record = serde_json::from_str(&raw)
            .with_context(|| format!("corrupt forecast record at {}", path.display()))?;
        Ok(record)
    }
}

#[async_trait::async_trait]
impl ForecastStore for JsonForecastStore {
    async fn save(&self, record: &ForecastRecord) -> Result<()> {
        tokio::fs::create_dir_all(&self.out_dir)
            .await
            .with_context(|| format!("failed to create {}", self.out_dir.display()))?;

        let path = self.record_path(&record.ticker);
        let json = serde_json::to_string_pretty(record)?;
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;

        info!("{} -> {}", record.ticker, path.display());
        Ok(())
    }
}
