//! Per-row stochastic wind pushing agents sideways.

use rand::Rng;
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;

use crate::infra::{GridWorldError, Result};

const PROBABILITY_TOLERANCE: f64 = 1e-9;

/// Static wind per row plus a discrete noise distribution.
#[derive(Debug, Clone, PartialEq)]
pub struct WindConfig {
    /// Static bias per grid row (rightwards is positive)
    pub static_bias: Vec<i32>,
    /// Values the random offset can take
    pub noise_support: Vec<i32>,
    /// Probability of each support value
    pub probabilities: Vec<f64>,
}

impl WindConfig {
    /// No wind on any row
    pub fn calm(rows: usize) -> Self {
        Self {
            static_bias: vec![0; rows],
            noise_support: vec![0],
            probabilities: vec![1.0],
        }
    }

    /// Static bias with noise over `-range..=range`. Without explicit
    /// probabilities the noise is uniform over the support.
    pub fn with_range(static_bias: Vec<i32>, range: i32, probabilities: Option<Vec<f64>>) -> Self {
        let range = range.abs();
        let noise_support: Vec<i32> = (-range..=range).collect();
        let probabilities = probabilities
            .unwrap_or_else(|| vec![1.0 / noise_support.len() as f64; noise_support.len()]);
        Self {
            static_bias,
            noise_support,
            probabilities,
        }
    }

    pub fn is_calm(&self) -> bool {
        self.static_bias.iter().all(|b| *b == 0)
    }

    /// Pad (with calm rows) or cut the static bias to exactly `rows`
    /// entries. Returns whether the length changed.
    pub fn fit_rows(&mut self, rows: usize) -> bool {
        if self.static_bias.len() == rows {
            return false;
        }
        self.static_bias.resize(rows, 0);
        true
    }

    pub fn bias(&self, row: i32) -> i32 {
        usize::try_from(row)
            .ok()
            .and_then(|r| self.static_bias.get(r).copied())
            .unwrap_or(0)
    }

    pub fn validate(&self) -> Result<()> {
        if self.noise_support.is_empty() {
            return Err(GridWorldError::InvalidWind("noise support is empty".into()));
        }
        if self.noise_support.len() != self.probabilities.len() {
            return Err(GridWorldError::InvalidWind(format!(
                "{} noise values but {} probabilities",
                self.noise_support.len(),
                self.probabilities.len()
            )));
        }
        if self.probabilities.iter().any(|p| !p.is_finite() || *p < 0.0) {
            return Err(GridWorldError::InvalidWind(
                "probabilities must be finite and non-negative".into(),
            ));
        }
        let sum: f64 = self.probabilities.iter().sum();
        if (sum - 1.0).abs() > PROBABILITY_TOLERANCE {
            return Err(GridWorldError::InvalidWind(format!(
                "probabilities sum to {sum}, expected 1"
            )));
        }
        Ok(())
    }
}

/// Samples the column offset applied to a proposed move.
#[derive(Debug, Clone)]
pub struct WindModel {
    config: WindConfig,
    noise: WeightedIndex<f64>,
}

impl WindModel {
    pub fn new(config: WindConfig) -> Result<Self> {
        config.validate()?;
        let noise = WeightedIndex::new(&config.probabilities)
            .map_err(|e| GridWorldError::InvalidWind(e.to_string()))?;
        Ok(Self { config, noise })
    }

    pub fn config(&self) -> &WindConfig {
        &self.config
    }

    /// Offset for an agent currently on `row`.
    ///
    /// Rows without static wind return 0 and leave `rng` untouched, so
    /// calm rows never shift the random stream.
    pub fn sample<R: Rng + ?Sized>(&self, row: i32, rng: &mut R) -> i32 {
        let bias = self.config.bias(row);
        if bias == 0 {
            return 0;
        }
        bias + self.config.noise_support[self.noise.sample(rng)]
    }
}
