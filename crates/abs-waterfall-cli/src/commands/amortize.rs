use clap::Args;
use serde::Serialize;
use serde_json::Value;
use std::str::FromStr;
use std::time::Instant;

use abs_waterfall_core::assets::{Asset, AssetKind};
use abs_waterfall_core::loans::amortization::ScheduleRow;
use abs_waterfall_core::loans::{Loan, LoanKind};
use abs_waterfall_core::types::with_metadata;

use crate::input::loans::parse_rate;

/// Arguments for a single-loan amortization schedule
#[derive(Args)]
pub struct AmortizeArgs {
    /// Loan product, e.g. "auto loan" or "fixed rate mortgage"
    #[arg(long, default_value = "auto loan")]
    pub loan_type: String,
    /// Face value
    #[arg(long)]
    pub face: f64,
    /// Annual rate, or a step table "0:0.05;24:0.06" for variable products
    #[arg(long)]
    pub rate: String,
    /// Term in months
    #[arg(long)]
    pub term: u32,
    /// Collateral subtype, e.g. "car", "tesla", "primary home"
    #[arg(long, default_value = "car")]
    pub asset_type: String,
    /// Collateral value at origination (defaults to the face value)
    #[arg(long)]
    pub asset_value: Option<f64>,
}

#[derive(Debug, Serialize)]
struct AmortizationReport {
    loan_type: String,
    asset_type: String,
    face: f64,
    term: u32,
    monthly_payment: f64,
    total_payments: f64,
    total_interest: f64,
    schedule: Vec<ScheduleRow>,
}

pub fn run_amortize(args: AmortizeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let kind = LoanKind::from_str(&args.loan_type)?;
    let asset_kind = AssetKind::from_str(&args.asset_type)?;
    let asset = Asset::new(asset_kind, args.asset_value.unwrap_or(args.face))?;
    let loan = Loan::new(kind, asset, args.face, parse_rate(&args.rate)?, args.term)?;

    let report = AmortizationReport {
        loan_type: kind.to_string(),
        asset_type: asset_kind.to_string(),
        face: loan.face(),
        term: loan.term(),
        monthly_payment: loan.monthly_payment(1),
        total_payments: loan.total_payments(),
        total_interest: loan.total_interest(),
        schedule: loan.schedule(),
    };
    let assumptions = serde_json::json!({
        "rate": loan.rate_schedule(),
        "asset_value": loan.asset().initial_value(),
    });
    let output = with_metadata(
        "Level-payment amortization with closed-form balances",
        &assumptions,
        Vec::new(),
        start.elapsed().as_micros() as u64,
        report,
    );
    Ok(serde_json::to_value(output)?)
}
