use crate::core::error::AnalysisError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Parameters of one analysis run.
///
/// Every field has a default, so a TOML file only needs the keys it
/// overrides:
///
/// ```toml
/// max_fee_rel = 0.01
/// max_solutions = 100
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Largest individual maker fee as a fraction of the equal amount.
    pub max_fee_rel: f64,
    /// Stop after this many distinct solutions.
    pub max_solutions: usize,
    /// Wall-clock limit for each solver call, in seconds.
    pub time_limit_per_solve: u64,
    /// Greedy preprocessing only runs for at least this many participants.
    pub greedy_min_participants: usize,
    /// Where accepted solutions are persisted, if anywhere.
    pub output_path: Option<PathBuf>,
    /// Rewrite `output_path` after every accepted solution.
    pub save_incrementally: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            max_fee_rel: 0.005,
            max_solutions: 10,
            time_limit_per_solve: 60,
            greedy_min_participants: 3,
            output_path: None,
            save_incrementally: true,
        }
    }
}

impl AnalyzerConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, AnalysisError> {
        let config: AnalyzerConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, AnalysisError> {
        let raw = fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn with_max_fee_rel(mut self, max_fee_rel: f64) -> Self {
        self.max_fee_rel = max_fee_rel;
        self
    }

    pub fn with_max_solutions(mut self, max_solutions: usize) -> Self {
        self.max_solutions = max_solutions;
        self
    }

    pub fn with_time_limit(mut self, seconds: u64) -> Self {
        self.time_limit_per_solve = seconds;
        self
    }

    pub fn with_greedy_min_participants(mut self, min: usize) -> Self {
        self.greedy_min_participants = min;
        self
    }

    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    pub fn time_limit(&self) -> Duration {
        Duration::from_secs(self.time_limit_per_solve)
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        if !(0.0..=1.0).contains(&self.max_fee_rel) {
            return Err(AnalysisError::InvalidConfig(format!(
                "max_fee_rel must lie in [0, 1], got {}",
                self.max_fee_rel
            )));
        }
        if self.max_solutions == 0 {
            return Err(AnalysisError::InvalidConfig(
                "max_solutions must be at least 1".to_string(),
            ));
        }
        if self.time_limit_per_solve == 0 {
            return Err(AnalysisError::InvalidConfig(
                "time_limit_per_solve must be at least 1 second".to_string(),
            ));
        }
        Ok(())
    }
}
