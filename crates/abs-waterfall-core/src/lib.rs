pub mod assets;
pub mod error;
pub mod loans;
pub mod ratings;
pub mod time_value;
pub mod types;
pub mod waterfall;

#[cfg(feature = "monte_carlo")]
pub mod monte_carlo;

pub use error::AbsError;
pub use types::*;

/// Standard result type for all abs-waterfall computations
pub type AbsResult<T> = Result<T, AbsError>;
