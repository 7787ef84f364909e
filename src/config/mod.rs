use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub fit: FitSettings,
    pub simulation: SimulationSettings,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            fit: FitSettings::default(),
            simulation: SimulationSettings::default(),
        }
    }
}

impl ForecastConfig {
    /// Load config from a TOML file, falling back to defaults when the file
    /// does not exist.
    pub fn load(path: &str) -> Result<Self> {
        if !Path::new(path).exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file: {}", path))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.fit.max_iterations == 0 {
            errors.push("fit.max_iterations must be > 0".to_string());
        }
        if self.fit.tolerance <= 0.0 {
            errors.push("fit.tolerance must be > 0".to_string());
        }
        if self.fit.init_persistence <= 0.0 || self.fit.init_persistence >= 1.0 {
            errors.push("fit.init_persistence must be strictly between 0 and 1".to_string());
        }
        if self.fit.min_observations < 24 {
            errors.push("fit.min_observations must be >= 24 (two years of monthly data)".to_string());
        }

        if self.simulation.horizon_years == 0 {
            errors.push("simulation.horizon_years must be > 0".to_string());
        }
        if self.simulation.n_sims == 0 {
            errors.push("simulation.n_sims must be > 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// EM fitting knobs for the two-regime Gaussian HMM.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FitSettings {
    pub max_iterations: usize,
    pub tolerance: f64,
    pub seed: u64,
    pub init_persistence: f64,
    pub min_observations: usize,
}

impl Default for FitSettings {
    fn default() -> Self {
        Self {
            max_iterations: 75,
            tolerance: 1e-6,
            seed: 42,
            init_persistence: 0.90,
            min_observations: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    pub horizon_years: usize,
    pub n_sims: usize,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            horizon_years: 50,
            n_sims: 20_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        let config = ForecastConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.fit.max_iterations, 75);
        assert_eq!(config.simulation.n_sims, 20_000);
    }

    #[test]
    fn test_invalid_config_collects_errors() {
        let mut config = ForecastConfig::default();
        config.fit.tolerance = 0.0;
        config.fit.init_persistence = 1.5;
        config.simulation.n_sims = 0;

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_partial_toml_overrides_defaults() {
        let config: ForecastConfig = toml::from_str(
            r#"
            [fit]
            seed = 7
            [simulation]
            horizon_years = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.fit.seed, 7);
        assert_eq!(config.fit.max_iterations, 75);
        assert_eq!(config.simulation.horizon_years, 10);
        assert_eq!(config.simulation.n_sims, 20_000);
    }

    #[test]
    fn test_load_missing_file_falls_back_to_defaults() {
        let config = ForecastConfig::load("does-not-exist.toml").unwrap();
        assert_eq!(config.fit.seed, ForecastConfig::default().fit.seed);
    }
}
