use serde::{Deserialize, Serialize};

use crate::loans::defaults::{DefaultPolicy, DefaultTracker};
use crate::loans::pool::{AssetPeriod, LoanPool};
use crate::types::Period;
use crate::waterfall::securities::{LiabilityPeriod, StructuredSecurities};
use crate::AbsResult;

/// Every period of one waterfall run, asset and liability side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterfallRun {
    pub asset_periods: Vec<AssetPeriod>,
    pub liability_periods: Vec<LiabilityPeriod>,
}

impl WaterfallRun {
    /// Last period that moved cash.
    pub fn final_period(&self) -> Period {
        self.asset_periods.last().map_or(0, |a| a.period)
    }
}

/// Run the pool through the deal until the assets stop paying.
///
/// The deal and tracker are reset first. Period 0 is always recorded so the
/// opening balances appear; payments start at period 1. `sink` sees every
/// period's asset and liability records as they settle. Returns the last
/// period executed.
pub fn drive_waterfall<F>(
    pool: &LoanPool,
    deal: &mut StructuredSecurities,
    tracker: &mut DefaultTracker,
    policy: &mut dyn DefaultPolicy,
    mut sink: F,
) -> AbsResult<Period>
where
    F: FnMut(&AssetPeriod, &StructuredSecurities),
{
    deal.reset_all();
    tracker.reset();

    let mut period: Period = 0;
    loop {
        tracker.check_defaults(period, pool, policy);
        let asset = pool.cashflow_with_defaults(period, tracker);
        if period != 0 && asset.total_payment <= 0.0 && asset.recoveries <= 0.0 {
            return Ok(period - 1);
        }
        if period != 0 {
            deal.increase_period_for_all()?;
            deal.make_payments(asset.interest_due, asset.principal_available())?;
        }
        sink(&asset, &*deal);
        period += 1;
    }
}

/// Run one waterfall and keep every period's records.
pub fn run_waterfall(
    pool: &LoanPool,
    deal: &mut StructuredSecurities,
    policy: &mut dyn DefaultPolicy,
) -> AbsResult<WaterfallRun> {
    let mut tracker = DefaultTracker::for_pool(pool);
    let mut run = WaterfallRun {
        asset_periods: Vec::new(),
        liability_periods: Vec::new(),
    };
    drive_waterfall(pool, deal, &mut tracker, policy, |asset, deal| {
        run.asset_periods.push(*asset);
        run.liability_periods.push(deal.waterfall());
    })?;
    Ok(run)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
