use crate::dataset::DatasetSpec;
use crate::rule::{default_rules, Rule};
use anyhow::{Context, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct SpoofSentryConfig {
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub explain: ExplainConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SimulationConfig {
    /// Seed for every random draw; a fresh seed is picked when absent
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_train_rows")]
    pub train_rows: usize,
    #[serde(default = "default_test_rows")]
    pub test_rows: usize,
    #[serde(default = "default_train_spoof_rate")]
    pub train_spoof_rate: RateRange,
    #[serde(default = "default_test_spoof_rate")]
    pub test_spoof_rate: RateRange,
    #[serde(default = "default_base_lat")]
    pub base_lat: f64,
    #[serde(default = "default_base_lon")]
    pub base_lon: f64,
    /// Unix timestamp of the first event; "now" when absent
    #[serde(default)]
    pub start_time: Option<i64>,
}

fn default_train_rows() -> usize {
    10_000
}

fn default_test_rows() -> usize {
    3_000
}

fn default_train_spoof_rate() -> RateRange {
    RateRange {
        min: 0.15,
        max: 0.30,
    }
}

fn default_test_spoof_rate() -> RateRange {
    RateRange { min: 0.10, max: 0.40 }
}

// New York City
fn default_base_lat() -> f64 {
    40.7128
}

fn default_base_lon() -> f64 {
    -74.0060
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: None,
            train_rows: default_train_rows(),
            test_rows: default_test_rows(),
            train_spoof_rate: default_train_spoof_rate(),
            test_spoof_rate: default_test_spoof_rate(),
            base_lat: default_base_lat(),
            base_lon: default_base_lon(),
            start_time: None,
        }
    }
}

impl SimulationConfig {
    pub fn dataset_spec(&self, rows: usize, spoof_rate: f64, start_time: i64) -> DatasetSpec {
        DatasetSpec {
            rows,
            spoof_rate,
            base_lat: self.base_lat,
            base_lon: self.base_lon,
            start_time,
        }
    }
}

/// Inclusive range a spoof rate is drawn from.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct RateRange {
    pub min: f64,
    pub max: f64,
}

impl RateRange {
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        if self.min >= self.max {
            self.min
        } else {
            rng.gen_range(self.min..=self.max)
        }
    }

    fn lint(&self, name: &str) -> Option<String> {
        let in_unit = |v: f64| v > 0.0 && v <= 1.0;
        if !in_unit(self.min) || !in_unit(self.max) {
            Some(format!("{} must lie in (0, 1], got {}..{}", name, self.min, self.max))
        } else if self.min > self.max {
            Some(format!("{} has min {} above max {}", name, self.min, self.max))
        } else {
            None
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DetectorConfig {
    /// Rules in evaluation order
    #[serde(default = "default_rules")]
    pub rules: Vec<Rule>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            rules: default_rules(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ExplainConfig {
    /// Text-generation endpoint; the deterministic template is used when absent
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Name of the environment variable holding the endpoint's API key
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Share of flagged events to explain
    #[serde(default = "default_sample_fraction")]
    pub sample_fraction: f64,
    /// Handlebars prompt template
    #[serde(default)]
    pub template: Option<String>,
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_sample_fraction() -> f64 {
    0.1
}

impl Default for ExplainConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key_env: None,
            model: None,
            timeout_seconds: default_timeout_seconds(),
            sample_fraction: default_sample_fraction(),
            template: None,
        }
    }
}

impl SpoofSentryConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .build()
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config: SpoofSentryConfig = settings
            .try_deserialize()
            .with_context(|| format!("Invalid config in {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Every problem found in the configuration.
    pub fn issues(&self) -> Vec<String> {
        let mut issues = Vec::new();

        let mut rule_ids = HashSet::new();
        for rule in &self.detector.rules {
            if !rule_ids.insert(&rule.id) {
                issues.push(format!("Duplicate rule ID: {}", rule.id));
            }
            issues.extend(rule.lint());
        }
        if !self.detector.rules.iter().any(|r| r.enabled) {
            issues.push("Detector has no enabled rules".to_string());
        }

        issues.extend(self.simulation.train_spoof_rate.lint("train_spoof_rate"));
        issues.extend(self.simulation.test_spoof_rate.lint("test_spoof_rate"));
        if !(self.explain.sample_fraction > 0.0 && self.explain.sample_fraction <= 1.0) {
            issues.push(format!(
                "explain.sample_fraction must lie in (0, 1], got {}",
                self.explain.sample_fraction
            ));
        }

        issues
    }

    pub fn validate(&self) -> Result<()> {
        let issues = self.issues();
        if !issues.is_empty() {
            anyhow::bail!("Invalid configuration: {}", issues.join("; "));
        }
        Ok(())
    }
}
