pub mod deal;
pub mod engine;
pub mod metrics;
pub mod securities;
pub mod tranche;

pub use deal::{DealSpec, TrancheSpec};
pub use engine::{drive_waterfall, run_waterfall, WaterfallRun};
pub use metrics::{tranche_metrics, TrancheMetrics};
pub use securities::{LiabilityPeriod, PaymentMode, StructuredSecurities, TrancheRecord};
pub use tranche::{PaymentPhase, Tranche};
