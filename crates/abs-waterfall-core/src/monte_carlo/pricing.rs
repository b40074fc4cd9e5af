use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::error::AbsError;
use crate::loans::pool::LoanPool;
use crate::monte_carlo::batch::{run_batch, BatchSummary};
use crate::monte_carlo::config::PricingConfig;
use crate::ratings::{dirr_bps_rounded, rating_for_dirr, LetterRating};
use crate::types::{with_metadata, ComputationOutput, Rate};
use crate::waterfall::deal::DealSpec;
use crate::waterfall::securities::StructuredSecurities;
use crate::AbsResult;

/// Runs longer than this are logged as a warning.
pub const SLOW_RUN: Duration = Duration::from_secs(60);

/// Fair yield for a tranche from its average DIRR and average life
/// (in months).
pub fn calculate_yield(dirr: Rate, average_life: f64) -> Rate {
    let years = average_life / 12.0;
    let spread = (years * dirr * 100.0).max(0.0).sqrt();
    (7.0 / (1.0 + 0.08 * (-0.19 * years).exp()) + 0.019 * spread) / 100.0
}

/// One step of the coupon search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingIteration {
    pub iteration: u32,
    /// Coupons the batch was run at, in seniority order
    pub coupon_rates: Vec<Rate>,
    pub yields: Vec<Rate>,
    /// Notional-weighted relative coupon change
    pub diff: f64,
    pub valid_trials: usize,
}

/// Priced tranche at convergence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranchePricing {
    pub name: String,
    pub subordination: u32,
    pub notional: f64,
    pub coupon_rate: Rate,
    pub yield_rate: Rate,
    pub dirr: Rate,
    pub dirr_bps: f64,
    pub rating: LetterRating,
    /// In months
    pub average_life: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingOutput {
    pub deal_name: String,
    pub iterations: u32,
    pub tranches: Vec<TranchePricing>,
    pub history: Vec<PricingIteration>,
    pub requested_trials: usize,
    pub valid_trials: usize,
}

/// Notional-weighted relative change between two coupon vectors.
pub fn coupon_diff(notionals: &[f64], old: &[Rate], new: &[Rate]) -> f64 {
    let total: f64 = notionals.iter().sum();
    let weighted: f64 = notionals
        .iter()
        .zip(old.iter().zip(new))
        .map(|(n, (o, c))| n * (o - c).abs() / o)
        .sum();
    weighted / total
}

/// Damped fixed-point search over the deal's coupons.
///
/// Each iteration runs a batch at the current coupons, converts the
/// averaged DIRR and average life into a yield per tranche, and moves each
/// coupon `damping` of the way toward its yield. The search stops when the
/// notional-weighted relative change drops below `config.tolerance`; the
/// coupons of that final batch are the answer.
pub fn run_monte(
    pool: &LoanPool,
    deal: &mut StructuredSecurities,
    damping: &[f64],
    config: &PricingConfig,
) -> AbsResult<(BatchSummary, Vec<PricingIteration>)> {
    config.validate()?;
    if damping.len() != deal.len() {
        return Err(AbsError::invalid(
            "damping",
            format!("Expected {} coefficients, got {}", deal.len(), damping.len()),
        ));
    }
    let notionals: Vec<f64> = deal.iter().map(|t| t.notional()).collect();
    let mut history = Vec::new();
    let mut iteration: u32 = 0;

    loop {
        deal.reset_all();
        let summary = run_batch(pool, deal, config)?;
        iteration += 1;

        let old = deal.coupon_rates();
        let yields: Vec<Rate> = summary
            .tranches
            .iter()
            .map(|t| calculate_yield(t.dirr, t.average_life))
            .collect();
        let new = damped_coupons(&old, &yields, damping);
        let diff = coupon_diff(&notionals, &old, &new);

        info!(
            iteration,
            coupons = ?old,
            diff,
            valid_trials = summary.valid_trials,
            "outer iteration complete"
        );
        history.push(PricingIteration {
            iteration,
            coupon_rates: old,
            yields,
            diff,
            valid_trials: summary.valid_trials,
        });

        if diff < config.tolerance {
            return Ok((summary, history));
        }
        if config.max_iterations.is_some_and(|cap| iteration >= cap) {
            return Err(AbsError::ConvergenceFailure {
                function: "coupon search".into(),
                iterations: iteration,
                last_delta: diff,
            });
        }
        check_coupons(&new, iteration, diff)?;
        deal.set_coupon_rates(&new)?;
    }
}

/// Move each coupon `damping` of the way toward its yield.
pub fn damped_coupons(old: &[Rate], yields: &[Rate], damping: &[f64]) -> Vec<Rate> {
    old.iter()
        .zip(yields)
        .zip(damping)
        .map(|((o, y), c)| o + c * (y - o))
        .collect()
}

/// A damping above 1 overshoots; once a coupon is pushed to zero or below
/// the search has diverged.
fn check_coupons(coupons: &[Rate], iteration: u32, diff: f64) -> AbsResult<()> {
    if let Some(bad) = coupons.iter().find(|c| !(c.is_finite() && **c > 0.0)) {
        warn!(iteration, coupon = *bad, "coupon search overshot below zero");
        return Err(AbsError::ConvergenceFailure {
            function: "coupon search".into(),
            iterations: iteration,
            last_delta: diff,
        });
    }
    Ok(())
}

/// Price every tranche of `spec` against `pool`.
pub fn price_deal(
    pool: &LoanPool,
    spec: &DealSpec,
    config: &PricingConfig,
) -> AbsResult<ComputationOutput<PricingOutput>> {
    let start = Instant::now();
    if pool.is_empty() {
        return Err(AbsError::invalid("pool", "Loan pool is empty"));
    }
    let mut deal = spec.build(pool.total_principal())?;
    let damping = spec.damping_coefficients();

    let (summary, history) = run_monte(pool, &mut deal, &damping, config)?;

    let tranches = summary
        .tranches
        .iter()
        .map(|t| TranchePricing {
            name: t.name.clone(),
            subordination: t.subordination,
            notional: t.notional,
            coupon_rate: t.coupon_rate,
            yield_rate: calculate_yield(t.dirr, t.average_life),
            dirr: t.dirr,
            dirr_bps: dirr_bps_rounded(t.dirr),
            rating: rating_for_dirr(t.dirr),
            average_life: t.average_life,
        })
        .collect();

    let output = PricingOutput {
        deal_name: spec.deal_name.clone(),
        iterations: history.len() as u32,
        tranches,
        history,
        requested_trials: summary.requested_trials,
        valid_trials: summary.valid_trials,
    };

    let elapsed = start.elapsed();
    if elapsed > SLOW_RUN {
        warn!(elapsed_secs = elapsed.as_secs_f64(), "pricing run was slow");
    } else {
        info!(elapsed_secs = elapsed.as_secs_f64(), "pricing run finished");
    }

    let assumptions = serde_json::json!({
        "payment_mode": spec.payment_mode,
        "non_equity": spec.non_equity,
        "num_trials": config.num_trials,
        "workers": config.workers,
        "tolerance": config.tolerance,
        "max_iterations": config.max_iterations,
        "seed": config.seed,
        "defaults": config.defaults,
        "damping": damping,
    });

    Ok(with_metadata(
        "Monte Carlo waterfall simulation with damped fixed-point coupon search",
        &assumptions,
        summary.warnings,
        elapsed.as_micros() as u64,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{Asset, AssetKind};
    use crate::loans::loan::Loan;
    use approx::assert_abs_diff_eq;

    fn pool() -> LoanPool {
        let car = Asset::new(AssetKind::Car, 30_000.0).unwrap();
        LoanPool::new(vec![
            Loan::auto_loan(car.clone(), 25_000.0, 0.07, 60).unwrap(),
            Loan::auto_loan(car, 20_000.0, 0.09, 48).unwrap(),
        ])
    }

    fn config() -> PricingConfig {
        PricingConfig {
            num_trials: 4,
            workers: 2,
            ..PricingConfig::default()
        }
    }

    #[test]
    fn test_yield_with_zero_dirr() {
        let al = 24.0;
        let expected = 7.0 / (1.0 + 0.08 * (-0.19_f64 * 2.0).exp()) / 100.0;
        assert_abs_diff_eq!(calculate_yield(0.0, al), expected, epsilon = 1e-15);
    }

    #[test]
    fn test_yield_rises_with_dirr() {
        assert!(calculate_yield(0.01, 36.0) > calculate_yield(0.0, 36.0));
    }

    #[test]
    fn test_coupon_diff() {
        let d = coupon_diff(&[800.0, 200.0], &[0.05, 0.08], &[0.055, 0.08]);
        assert_abs_diff_eq!(d, 800.0 * 0.1 / 1000.0, epsilon = 1e-12);
    }

    #[test]
    fn test_overshooting_update_is_divergence() {
        // Coupon well above the yield with damping 1.2 lands below zero
        let new = damped_coupons(&[0.05, 0.07], &[0.06, 0.01], &[0.8, 1.2]);
        assert_abs_diff_eq!(new[0], 0.058, epsilon = 1e-12);
        assert!(new[1] < 0.0);
        let err = check_coupons(&new, 3, 0.4).unwrap_err();
        assert!(matches!(
            err,
            AbsError::ConvergenceFailure { iterations: 3, .. }
        ));
        assert!(check_coupons(&new[..1], 3, 0.4).is_ok());
    }

    #[test]
    fn test_price_deal_converges() {
        let out = price_deal(&pool(), &DealSpec::default(), &config()).unwrap();
        let result = &out.result;
        assert_eq!(result.tranches.len(), 2);
        assert_eq!(result.requested_trials, 4);
        assert!(result.history.last().unwrap().diff < 0.005);
        for t in &result.tranches {
            // Fully performing pool: every class is paid in full
            assert_eq!(t.dirr, 0.0);
            assert_eq!(t.rating, LetterRating::Aaa);
            assert!(t.average_life > 0.0);
        }
        assert_eq!(out.metadata.precision, "ieee754_f64");
    }

    #[test]
    fn test_iteration_cap() {
        let cfg = PricingConfig {
            max_iterations: Some(1),
            tolerance: 1e-12,
            ..config()
        };
        let err = price_deal(&pool(), &DealSpec::default(), &cfg).unwrap_err();
        assert!(matches!(err, AbsError::ConvergenceFailure { iterations: 1, .. }));
    }

    #[test]
    fn test_empty_pool_rejected() {
        assert!(price_deal(&LoanPool::default(), &DealSpec::default(), &config()).is_err());
    }
}
