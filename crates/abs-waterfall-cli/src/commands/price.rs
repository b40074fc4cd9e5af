use clap::Args;
use serde_json::Value;
use tracing::info;

use abs_waterfall_core::monte_carlo::{price_deal, PricingConfig};

use crate::commands::ModeOverride;
use crate::input::deal::{load_deal, DealFile};
use crate::input::loans::read_loans;

/// Arguments for Monte Carlo tranche pricing
#[derive(Args)]
pub struct PriceArgs {
    /// Path to the loans CSV
    #[arg(long)]
    pub loans: String,
    /// Path to a JSON or YAML deal file (stdin if omitted and piped)
    #[arg(long)]
    pub deal: Option<String>,
    /// Trials per inner batch
    #[arg(long)]
    pub trials: Option<usize>,
    /// Worker threads per batch
    #[arg(long)]
    pub workers: Option<usize>,
    /// Convergence tolerance on the weighted coupon change
    #[arg(long)]
    pub tolerance: Option<f64>,
    /// Give up after this many outer iterations
    #[arg(long)]
    pub max_iterations: Option<u32>,
    /// Base seed for default draws
    #[arg(long)]
    pub seed: Option<u64>,
    #[command(flatten)]
    pub mode: ModeOverride,
}

/// Flags win over the deal file's `pricing` block.
fn apply_overrides(file: &mut DealFile, args: &PriceArgs) {
    let config: &mut PricingConfig = &mut file.pricing;
    if let Some(n) = args.trials {
        config.num_trials = n;
    }
    if let Some(w) = args.workers {
        config.workers = w;
    }
    if let Some(t) = args.tolerance {
        config.tolerance = t;
    }
    if args.max_iterations.is_some() {
        config.max_iterations = args.max_iterations;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    if let Some(mode) = args.mode.resolve() {
        file.deal.payment_mode = mode;
    }
}

pub fn run_price(args: PriceArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let pool = read_loans(&args.loans)?;
    let mut file = load_deal(args.deal.as_deref())?;
    apply_overrides(&mut file, &args);
    info!(
        loans = pool.len(),
        trials = file.pricing.num_trials,
        workers = file.pricing.workers,
        mode = %file.deal.payment_mode,
        "pricing deal"
    );

    let result = price_deal(&pool, &file.deal, &file.pricing)?;
    Ok(serde_json::to_value(result)?)
}
