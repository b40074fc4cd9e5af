pub mod batch;
pub mod config;
pub mod defaults;
pub mod pricing;
pub mod trial;

pub use batch::{
    run_batch, simulate_waterfall, simulate_waterfall_parallel, BatchSummary, TrancheAverage,
};
pub use config::PricingConfig;
pub use defaults::{DefaultAssumption, HazardCurve, HazardStep};
pub use pricing::{
    calculate_yield, damped_coupons, price_deal, run_monte, PricingIteration, PricingOutput,
    TranchePricing,
};
pub use trial::{run_trial, TrialOutcome};
