use thiserror::Error;

#[derive(Debug, Error)]
pub enum AbsError {
    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Invariant violation on tranche {tranche} in period {period}: {reason}")]
    InvariantViolation {
        tranche: String,
        period: u32,
        reason: String,
    },

    #[error("No rate in effect at period {period}: the rate table has no entry at or before it")]
    RateLookup { period: u32 },

    #[error("Convergence failure: {function} did not converge after {iterations} iterations (delta: {last_delta})")]
    ConvergenceFailure {
        function: String,
        iterations: u32,
        last_delta: f64,
    },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Division by zero in {context}")]
    DivisionByZero { context: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl AbsError {
    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        AbsError::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for AbsError {
    fn from(e: serde_json::Error) -> Self {
        AbsError::SerializationError(e.to_string())
    }
}
