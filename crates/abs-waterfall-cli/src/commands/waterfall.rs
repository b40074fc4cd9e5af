use chrono::NaiveDate;
use clap::Args;
use serde::Serialize;
use serde_json::Value;
use std::time::Instant;

use abs_waterfall_core::loans::{AssetPeriod, DefaultTracker};
use abs_waterfall_core::ratings::{dirr_bps_rounded, rating_for_dirr, LetterRating};
use abs_waterfall_core::types::with_metadata;
use abs_waterfall_core::waterfall::{drive_waterfall, tranche_metrics, DealSpec, WaterfallRun};
use abs_waterfall_core::{AbsError, Money, Period};

use crate::commands::ModeOverride;
use crate::input::deal::load_deal;
use crate::input::loans::read_loans;

/// Arguments for a single waterfall run
#[derive(Args)]
pub struct WaterfallArgs {
    /// Path to the loans CSV
    #[arg(long)]
    pub loans: String,
    /// Path to a JSON or YAML deal file (stdin if omitted and piped)
    #[arg(long)]
    pub deal: Option<String>,
    /// Stamp each period with closing date + p months
    #[arg(long)]
    pub closing_date: Option<NaiveDate>,
    #[command(flatten)]
    pub mode: ModeOverride,
    /// Apply the deal file's default assumption with this seed
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Debug, Serialize)]
struct AssetRow {
    #[serde(skip_serializing_if = "Option::is_none")]
    payment_date: Option<NaiveDate>,
    #[serde(flatten)]
    record: AssetPeriod,
}

#[derive(Debug, Serialize)]
struct LiabilityRow {
    period: Period,
    #[serde(skip_serializing_if = "Option::is_none")]
    payment_date: Option<NaiveDate>,
    tranche: String,
    interest_due: Money,
    interest_paid: Money,
    interest_shortfall: Money,
    principal_due: Money,
    principal_paid: Money,
    principal_shortfall: Money,
    ending_balance: Money,
    cash_flow: Money,
    cash_reserve: Money,
}

/// End-of-run figures for one tranche. A tranche left with a balance has no
/// average life and reports it as "undefined".
#[derive(Debug, Serialize)]
struct TrancheSummary {
    name: String,
    notional: Money,
    coupon_rate: f64,
    irr: Option<f64>,
    dirr_bps: Option<f64>,
    rating: Option<LetterRating>,
    average_life: Value,
}

#[derive(Debug, Serialize)]
struct WaterfallReport {
    deal_name: String,
    payment_mode: String,
    pool_principal: Money,
    tranche_notional: Money,
    final_period: Period,
    defaults: usize,
    asset_periods: Vec<AssetRow>,
    liability_periods: Vec<LiabilityRow>,
    tranches: Vec<TrancheSummary>,
}

fn flatten_liabilities(run: &WaterfallRun, spec: &DealSpec) -> Vec<LiabilityRow> {
    run.liability_periods
        .iter()
        .flat_map(|lp| {
            lp.tranches.iter().map(move |t| LiabilityRow {
                period: lp.period,
                payment_date: spec.payment_date(lp.period),
                tranche: t.name.clone(),
                interest_due: t.interest_due,
                interest_paid: t.interest_paid,
                interest_shortfall: t.interest_shortfall,
                principal_due: t.principal_due,
                principal_paid: t.principal_paid,
                principal_shortfall: t.principal_shortfall,
                ending_balance: t.ending_balance,
                cash_flow: t.cash_flow,
                cash_reserve: lp.cash_reserve,
            })
        })
        .collect()
}

pub fn run_waterfall(args: WaterfallArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let pool = read_loans(&args.loans)?;
    let file = load_deal(args.deal.as_deref())?;
    let mut spec = file.deal;
    if let Some(mode) = args.mode.resolve() {
        spec.payment_mode = mode;
    }
    if args.closing_date.is_some() {
        spec.closing_date = args.closing_date;
    }

    let mut deal = spec.build(pool.total_principal())?;
    let seed = args.seed.or(file.pricing.seed);
    file.pricing.defaults.validate()?;
    let mut policy = file.pricing.defaults.policy_for_trial(seed, 0);
    let mut tracker = DefaultTracker::for_pool(&pool);
    let mut run = WaterfallRun {
        asset_periods: Vec::new(),
        liability_periods: Vec::new(),
    };
    drive_waterfall(&pool, &mut deal, &mut tracker, policy.as_mut(), |asset, d| {
        run.asset_periods.push(*asset);
        run.liability_periods.push(d.waterfall());
    })?;

    let mut warnings = Vec::new();
    let tranches = deal
        .iter()
        .map(|t| -> Result<TrancheSummary, AbsError> {
            let m = tranche_metrics(t)?;
            let average_life = match m.average_life {
                Some(al) => Value::from(al),
                None => {
                    warnings.push(format!("Tranche {} was not fully repaid", m.name));
                    Value::from("undefined")
                }
            };
            Ok(TrancheSummary {
                name: m.name,
                notional: m.notional,
                coupon_rate: m.coupon_rate,
                irr: m.irr,
                dirr_bps: m.dirr.map(dirr_bps_rounded),
                rating: m.dirr.map(rating_for_dirr),
                average_life,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let report = WaterfallReport {
        deal_name: spec.deal_name.clone(),
        payment_mode: spec.payment_mode.to_string(),
        pool_principal: pool.total_principal(),
        tranche_notional: deal.total_notional(),
        final_period: run.final_period(),
        defaults: tracker.num_defaulted(),
        asset_periods: run
            .asset_periods
            .iter()
            .map(|a| AssetRow {
                payment_date: spec.payment_date(a.period),
                record: *a,
            })
            .collect(),
        liability_periods: flatten_liabilities(&run, &spec),
        tranches,
    };
    let assumptions = serde_json::json!({
        "payment_mode": spec.payment_mode,
        "non_equity": spec.non_equity,
        "closing_date": spec.closing_date,
        "defaults": file.pricing.defaults,
        "seed": seed,
    });
    let output = with_metadata(
        "Single waterfall run of the pool through the tranche structure",
        &assumptions,
        warnings,
        start.elapsed().as_micros() as u64,
        report,
    );
    Ok(serde_json::to_value(output)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp(suffix: &str, body: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        f.write_all(body.as_bytes()).unwrap();
        f
    }

    const LOANS: &str = "\
id,type,face,rate,term,asset,value
1,Auto Loan,24000,0.09,36,Tesla,30000
2,Auto Loan,16000,0.10,24,Honda,20000
";

    const DEAL: &str = "\
deal_name: Test deal
closing_date: 2020-12-01
tranches:
  - { name: A, notional_share: 0.8, coupon_rate: 0.05, subordination: 1 }
  - { name: B, notional_share: 0.2, coupon_rate: 0.08, subordination: 2 }
";

    #[test]
    fn test_waterfall_report() {
        let loans = temp(".csv", LOANS);
        let deal = temp(".yaml", DEAL);
        let args = WaterfallArgs {
            loans: loans.path().to_string_lossy().into_owned(),
            deal: Some(deal.path().to_string_lossy().into_owned()),
            closing_date: None,
            mode: ModeOverride::default(),
            seed: None,
        };
        let value = run_waterfall(args).unwrap();
        let result = &value["result"];
        assert_eq!(result["final_period"], 36);
        assert_eq!(result["defaults"], 0);
        assert_eq!(result["asset_periods"][1]["payment_date"], "2021-01-01");
        // Two tranches per period, periods 0..=36
        assert_eq!(result["liability_periods"].as_array().unwrap().len(), 2 * 37);
        for t in result["tranches"].as_array().unwrap() {
            assert_eq!(t["rating"], "Aaa");
            assert!(t["average_life"].is_number());
        }
        assert!(value["warnings"].as_array().unwrap().is_empty());
    }
}
