use serde::{Deserialize, Serialize};

use crate::error::AbsError;
use crate::monte_carlo::defaults::DefaultAssumption;
use crate::AbsResult;

fn default_num_trials() -> usize {
    20
}

fn default_workers() -> usize {
    20
}

fn default_tolerance() -> f64 {
    0.005
}

/// Settings for the Monte Carlo pricing loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Trials per inner batch
    #[serde(default = "default_num_trials")]
    pub num_trials: usize,
    /// Worker threads for the inner batch; 1 runs on the calling thread
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Convergence threshold on the notional-weighted relative coupon change
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// Optional cap on outer iterations
    #[serde(default)]
    pub max_iterations: Option<u32>,
    /// Base seed for default draws. Trial `i` uses `seed + i`.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub defaults: DefaultAssumption,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            num_trials: default_num_trials(),
            workers: default_workers(),
            tolerance: default_tolerance(),
            max_iterations: None,
            seed: None,
            defaults: DefaultAssumption::default(),
        }
    }
}

impl PricingConfig {
    pub fn validate(&self) -> AbsResult<()> {
        if self.num_trials == 0 {
            return Err(AbsError::invalid("num_trials", "At least one trial is required"));
        }
        if self.workers == 0 {
            return Err(AbsError::invalid("workers", "At least one worker is required"));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(AbsError::invalid("tolerance", "Tolerance must be positive"));
        }
        if self.max_iterations == Some(0) {
            return Err(AbsError::invalid("max_iterations", "Cap must be at least 1"));
        }
        self.defaults.validate()
    }
}
