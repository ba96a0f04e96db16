use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Pipeline settings, loadable from a TOML file with `SMA_`-prefixed
/// environment overrides. CLI flags override both.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Sliding window length in trading days.
    pub window_size: usize,
    /// Percentage of examples kept for training; the rest is holdout.
    pub training_size_pct: f64,
    pub epochs: usize,
    pub learning_rate: f64,
    pub hidden_layers: usize,
    /// Days to project in the trade-history pipeline.
    pub forward_days: usize,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            window_size: 50,
            training_size_pct: 70.0,
            epochs: 10,
            learning_rate: 0.01,
            hidden_layers: 4,
            forward_days: 30,
        }
    }
}

impl ForecastConfig {
    /// Layered load: defaults, then an optional TOML file, then
    /// environment variables (e.g. `SMA_WINDOW_SIZE=30`).
    pub fn load(path: &str) -> Result<Self> {
        dotenvy::dotenv().ok();

        let settings = config::Config::builder()
            .add_source(config::File::from(std::path::Path::new(path)).required(false))
            .add_source(config::Environment::with_prefix("SMA").try_parsing(true))
            .build()
            .context("failed to build configuration")?;

        let loaded: Self = settings
            .try_deserialize()
            .context("failed to parse configuration")?;

        if let Err(errors) = loaded.validate() {
            anyhow::bail!("invalid configuration: {}", errors.join(", "));
        }
        Ok(loaded)
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.window_size == 0 {
            errors.push("window_size must be >= 1".to_string());
        }
        if !(0.0..=100.0).contains(&self.training_size_pct) {
            errors.push("training_size_pct must be within [0, 100]".to_string());
        }
        if self.epochs == 0 {
            errors.push("epochs must be >= 1".to_string());
        }
        if self.learning_rate <= 0.0 || !self.learning_rate.is_finite() {
            errors.push("learning_rate must be > 0".to_string());
        }
        if self.hidden_layers == 0 {
            errors.push("hidden_layers must be >= 1".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(ForecastConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let bad = ForecastConfig {
            window_size: 0,
            training_size_pct: 130.0,
            epochs: 0,
            learning_rate: -0.5,
            hidden_layers: 0,
            forward_days: 10,
        };
        let errors = bad.validate().unwrap_err();
        assert_eq!(errors.len(), 5);
    }

    #[test]
    fn test_load_from_toml_file() {
        use std::io::Write;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forecast.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "window_size = 20\nepochs = 5").unwrap();

        let cfg = ForecastConfig::load(path.to_str().unwrap()).unwrap();
        assert_eq!(cfg.window_size, 20);
        assert_eq!(cfg.epochs, 5);
        // untouched keys keep their defaults
        assert_eq!(cfg.hidden_layers, 4);
    }
}
