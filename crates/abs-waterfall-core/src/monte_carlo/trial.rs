use serde::{Deserialize, Serialize};

use crate::loans::defaults::{DefaultPolicy, DefaultTracker};
use crate::loans::pool::LoanPool;
use crate::waterfall::engine::drive_waterfall;
use crate::waterfall::metrics::{tranche_metrics, TrancheMetrics};
use crate::waterfall::securities::StructuredSecurities;
use crate::AbsResult;

/// Result of one full pool-to-tranches simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialOutcome {
    pub index: usize,
    /// In seniority order
    pub tranches: Vec<TrancheMetrics>,
    pub defaults: usize,
}

impl TrialOutcome {
    /// A trial counts toward the averages only if every tranche repaid.
    pub fn is_valid(&self) -> bool {
        self.tranches
            .iter()
            .all(|t| t.average_life.is_some() && t.dirr.is_some())
    }
}

/// Run trial `index` on `deal`, reusing its ledgers and `tracker`.
pub fn run_trial(
    index: usize,
    pool: &LoanPool,
    deal: &mut StructuredSecurities,
    tracker: &mut DefaultTracker,
    policy: &mut dyn DefaultPolicy,
) -> AbsResult<TrialOutcome> {
    drive_waterfall(pool, deal, tracker, policy, |_, _| {})?;
    let tranches = deal
        .iter()
        .map(tranche_metrics)
        .collect::<AbsResult<Vec<_>>>()?;
    Ok(TrialOutcome {
        index,
        tranches,
        defaults: tracker.num_defaulted(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{Asset, AssetKind};
    use crate::loans::defaults::NoDefaults;
    use crate::loans::loan::Loan;
    use crate::waterfall::deal::DealSpec;

    #[test]
    fn test_trial_on_performing_pool_is_valid() {
        let car = Asset::new(AssetKind::Car, 25_000.0).unwrap();
        let pool = LoanPool::new(vec![Loan::auto_loan(car, 20_000.0, 0.09, 36).unwrap()]);
        let mut deal = DealSpec::default().build(pool.total_principal()).unwrap();
        let mut tracker = DefaultTracker::for_pool(&pool);
        let outcome = run_trial(7, &pool, &mut deal, &mut tracker, &mut NoDefaults).unwrap();
        assert_eq!(outcome.index, 7);
        assert!(outcome.is_valid());
        assert_eq!(outcome.defaults, 0);
        // Both classes paid their full coupon
        for t in &outcome.tranches {
            assert_eq!(t.dirr, Some(0.0));
        }
        let al_a = outcome.tranches[0].average_life.unwrap();
        let al_b = outcome.tranches[1].average_life.unwrap();
        assert!(al_a < al_b);
    }
}
