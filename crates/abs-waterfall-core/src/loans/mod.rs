pub mod amortization;
pub mod defaults;
pub mod loan;
pub mod pool;
pub mod rate;
pub mod servicing;

pub use defaults::{DefaultDecision, DefaultPolicy, DefaultTracker, NoDefaults};
pub use loan::{Loan, LoanKind};
pub use pool::{AssetPeriod, LoanPool};
pub use rate::{RateSchedule, RateStep};
pub use servicing::{PrivateMortgageInsurance, ServicingAdjustment};
