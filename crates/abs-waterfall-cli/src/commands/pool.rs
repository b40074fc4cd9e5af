use clap::Args;
use serde::Serialize;
use serde_json::Value;
use std::time::Instant;

use abs_waterfall_core::loans::AssetPeriod;
use abs_waterfall_core::types::with_metadata;
use abs_waterfall_core::Period;

use crate::input::loans::read_loans;

/// Arguments for pool-level cash flows
#[derive(Args)]
pub struct PoolArgs {
    /// Path to the loans CSV
    #[arg(long)]
    pub loans: String,
    /// Period at which to measure WAR and WAM
    #[arg(long, default_value_t = 0)]
    pub period: Period,
}

#[derive(Debug, Serialize)]
struct PoolReport {
    loan_count: usize,
    total_principal: f64,
    measured_at: Period,
    weighted_average_rate: f64,
    weighted_average_maturity: f64,
    asset_periods: Vec<AssetPeriod>,
}

pub fn run_pool(args: PoolArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let pool = read_loans(&args.loans)?;
    let last = pool.iter().map(|l| l.term()).max().unwrap_or(0);

    let report = PoolReport {
        loan_count: pool.len(),
        total_principal: pool.total_principal(),
        measured_at: args.period,
        weighted_average_rate: pool.weighted_average_rate(args.period)?,
        weighted_average_maturity: pool.weighted_average_maturity(args.period)?,
        asset_periods: (0..=last).map(|p| pool.get_waterfall(p)).collect(),
    };
    let output = with_metadata(
        "Scheduled pool cash flows with every loan performing",
        &serde_json::json!({ "loans_file": args.loans }),
        Vec::new(),
        start.elapsed().as_micros() as u64,
        report,
    );
    Ok(serde_json::to_value(output)?)
}
