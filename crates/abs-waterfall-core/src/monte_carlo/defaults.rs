use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::AbsError;
use crate::loans::defaults::{DefaultDecision, DefaultPolicy, NoDefaults};
use crate::loans::loan::Loan;
use crate::types::{Money, Period};
use crate::AbsResult;

/// Monthly default probability in effect from `from_period` on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HazardStep {
    pub from_period: Period,
    pub probability: f64,
}

/// Default model for a pricing run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DefaultAssumption {
    #[default]
    #[serde(rename = "None")]
    NoDefaults,
    /// Independent monthly default draws from a stepped hazard curve
    HazardCurve { curve: Vec<HazardStep> },
}

impl DefaultAssumption {
    pub fn validate(&self) -> AbsResult<()> {
        if let DefaultAssumption::HazardCurve { curve } = self {
            if curve.is_empty() {
                return Err(AbsError::invalid("defaults.curve", "Hazard curve is empty"));
            }
            for step in curve {
                if !(0.0..=1.0).contains(&step.probability) {
                    return Err(AbsError::invalid(
                        "defaults.curve",
                        format!("Probability {} is outside [0, 1]", step.probability),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Fresh policy for trial `trial`. Seeded runs give each trial its own
    /// reproducible stream.
    pub fn policy_for_trial(&self, seed: Option<u64>, trial: u64) -> Box<dyn DefaultPolicy> {
        match self {
            DefaultAssumption::NoDefaults => Box::new(NoDefaults),
            DefaultAssumption::HazardCurve { curve } => {
                let rng = match seed {
                    Some(s) => StdRng::seed_from_u64(s.wrapping_add(trial)),
                    None => StdRng::from_entropy(),
                };
                Box::new(HazardCurve::new(curve.clone(), rng))
            }
        }
    }
}

/// Draws a default for each performing loan with the curve's probability for
/// the period; a defaulted loan recovers its collateral's recovery value.
#[derive(Debug, Clone)]
pub struct HazardCurve {
    steps: Vec<HazardStep>,
    rng: StdRng,
}

impl HazardCurve {
    pub fn new(mut steps: Vec<HazardStep>, rng: StdRng) -> Self {
        steps.sort_by_key(|s| s.from_period);
        Self { steps, rng }
    }

    /// Probability in effect at `period`; zero before the first step.
    pub fn probability(&self, period: Period) -> f64 {
        let idx = self.steps.partition_point(|s| s.from_period <= period);
        if idx == 0 {
            0.0
        } else {
            self.steps[idx - 1].probability
        }
    }
}

impl DefaultPolicy for HazardCurve {
    fn assess(&mut self, period: Period, _: usize, loan: &Loan, _: Money) -> DefaultDecision {
        let p = self.probability(period);
        if p > 0.0 && self.rng.gen::<f64>() < p {
            DefaultDecision::charge_off(loan.recovery_value(period))
        } else {
            DefaultDecision::performing()
        }
    }
}
