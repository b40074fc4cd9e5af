//! One inner Monte Carlo batch: N independent trials at fixed coupons,
//! averaged per tranche.
//!
//! The parallel path gives each worker its own copy of the deal and shares
//! the immutable pool by reference. Workers tag every result with its trial
//! index and send it over a channel; the collector stops the workers once
//! trials `0..N` have all arrived and discards any overshoot.

use crossbeam::channel;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use tracing::{debug, warn};

use crate::error::AbsError;
use crate::loans::defaults::DefaultTracker;
use crate::loans::pool::LoanPool;
use crate::monte_carlo::config::PricingConfig;
use crate::monte_carlo::trial::{run_trial, TrialOutcome};
use crate::types::Rate;
use crate::waterfall::securities::StructuredSecurities;
use crate::AbsResult;

/// Per-tranche averages over the valid trials of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrancheAverage {
    pub name: String,
    pub subordination: u32,
    pub notional: f64,
    pub coupon_rate: Rate,
    pub dirr: Rate,
    pub average_life: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// In seniority order
    pub tranches: Vec<TrancheAverage>,
    pub requested_trials: usize,
    pub valid_trials: usize,
    /// Trials dropped because some tranche was never repaid
    pub undefined_trials: usize,
    /// Trials that ended in an error
    pub failed_trials: usize,
    pub warnings: Vec<String>,
}

type TaggedResult = (usize, AbsResult<TrialOutcome>);

/// Run a batch on the calling thread or across `config.workers` threads.
pub fn run_batch(
    pool: &LoanPool,
    deal: &StructuredSecurities,
    config: &PricingConfig,
) -> AbsResult<BatchSummary> {
    if config.workers <= 1 {
        simulate_waterfall(pool, deal, config)
    } else {
        simulate_waterfall_parallel(pool, deal, config)
    }
}

/// Run every trial in order on the calling thread.
pub fn simulate_waterfall(
    pool: &LoanPool,
    deal: &StructuredSecurities,
    config: &PricingConfig,
) -> AbsResult<BatchSummary> {
    let mut deal = deal.clone();
    let mut tracker = DefaultTracker::for_pool(pool);
    let results = (0..config.num_trials)
        .map(|index| {
            let mut policy = config.defaults.policy_for_trial(config.seed, index as u64);
            (
                index,
                run_trial(index, pool, &mut deal, &mut tracker, policy.as_mut()),
            )
        })
        .collect();
    summarize(deal_template(&deal), results, config.num_trials)
}

/// Split the trials across worker threads, `ceil(N / W)` per worker.
pub fn simulate_waterfall_parallel(
    pool: &LoanPool,
    deal: &StructuredSecurities,
    config: &PricingConfig,
) -> AbsResult<BatchSummary> {
    let n = config.num_trials;
    let workers = config.workers.clamp(1, n.max(1));
    let per_worker = n.div_ceil(workers);
    let cancel = AtomicBool::new(false);

    let results: Vec<TaggedResult> = thread::scope(|s| {
        let (tx, rx) = channel::unbounded::<TaggedResult>();
        for worker in 0..workers {
            let tx = tx.clone();
            let cancel = &cancel;
            let mut deal = deal.clone();
            s.spawn(move || {
                let mut tracker = DefaultTracker::for_pool(pool);
                for k in 0..per_worker {
                    if cancel.load(Ordering::Relaxed) {
                        break;
                    }
                    let index = worker * per_worker + k;
                    let mut policy = config.defaults.policy_for_trial(config.seed, index as u64);
                    let result = run_trial(index, pool, &mut deal, &mut tracker, policy.as_mut());
                    if tx.send((index, result)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(tx);

        let mut collected = Vec::with_capacity(n);
        let mut in_range = 0;
        for (index, result) in rx.iter() {
            if index < n {
                in_range += 1;
            }
            collected.push((index, result));
            if in_range == n {
                cancel.store(true, Ordering::Relaxed);
                break;
            }
        }
        drop(rx);
        collected
    });

    debug!(
        collected = results.len(),
        requested = n,
        workers,
        "parallel batch collected"
    );
    summarize(deal_template(deal), results, n)
}

fn deal_template(deal: &StructuredSecurities) -> Vec<(String, u32, f64, Rate)> {
    deal.iter()
        .map(|t| {
            (
                t.name().to_string(),
                t.subordination(),
                t.notional(),
                t.coupon_rate(),
            )
        })
        .collect()
}

/// Trim to trials `0..requested`, drop invalid ones and average the rest.
fn summarize(
    template: Vec<(String, u32, f64, Rate)>,
    mut results: Vec<TaggedResult>,
    requested: usize,
) -> AbsResult<BatchSummary> {
    results.retain(|(index, _)| *index < requested);
    results.sort_by_key(|(index, _)| *index);

    let mut valid: Vec<TrialOutcome> = Vec::with_capacity(results.len());
    let mut undefined_trials = 0;
    let mut failed_trials = 0;
    for (index, result) in results {
        match result {
            Ok(outcome) if outcome.is_valid() => valid.push(outcome),
            Ok(_) => undefined_trials += 1,
            Err(e) => {
                warn!(trial = index, error = %e, "trial failed and was excluded");
                failed_trials += 1;
            }
        }
    }

    if valid.is_empty() {
        return Err(AbsError::InsufficientData(format!(
            "None of the {requested} trials produced a defined average life for every tranche"
        )));
    }

    let count = valid.len() as f64;
    let tranches = template
        .into_iter()
        .enumerate()
        .map(|(i, (name, subordination, notional, coupon_rate))| {
            let (dirr, al) = valid.iter().fold((0.0, 0.0), |(d, a), o| {
                let m = &o.tranches[i];
                (
                    d + m.dirr.unwrap_or(0.0),
                    a + m.average_life.unwrap_or(0.0),
                )
            });
            TrancheAverage {
                name,
                subordination,
                notional,
                coupon_rate,
                dirr: dirr / count,
                average_life: al / count,
            }
        })
        .collect();

    let mut warnings = Vec::new();
    if undefined_trials > 0 {
        let msg = format!(
            "{undefined_trials} of {requested} trials dropped for undefined average life"
        );
        warn!("{msg}");
        warnings.push(msg);
    }
    if failed_trials > 0 {
        warnings.push(format!("{failed_trials} of {requested} trials failed"));
    }
    debug!(valid = valid.len(), requested, "batch complete");

    Ok(BatchSummary {
        tranches,
        requested_trials: requested,
        valid_trials: valid.len(),
        undefined_trials,
        failed_trials,
        warnings,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
