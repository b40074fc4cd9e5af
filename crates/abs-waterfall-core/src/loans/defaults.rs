//! Default injection for a single simulation trial.
//!
//! The pool itself is immutable. Which loans defaulted, and when, lives in a
//! [`DefaultTracker`] owned by the trial; a [`DefaultPolicy`] decides each
//! period whether a still-performing loan defaults and what it recovers.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::loans::loan::Loan;
use crate::loans::pool::LoanPool;
use crate::types::{Money, Period};

/// Outcome of assessing one loan for one period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DefaultDecision {
    pub defaulted: bool,
    /// Cash recovered in the default period. Ignored unless `defaulted`.
    pub recovery: Money,
}

impl DefaultDecision {
    pub fn performing() -> Self {
        Self::default()
    }

    pub fn charge_off(recovery: Money) -> Self {
        Self {
            defaulted: true,
            recovery,
        }
    }
}

/// Decides whether a performing loan defaults in a period.
///
/// `balance` is the loan's scheduled balance entering the period. A policy
/// is consulted at most once per loan per period, and never again for a
/// loan after it defaults.
pub trait DefaultPolicy: Send {
    fn assess(
        &mut self,
        period: Period,
        loan_index: usize,
        loan: &Loan,
        balance: Money,
    ) -> DefaultDecision;
}

/// Every loan performs to maturity.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDefaults;

impl DefaultPolicy for NoDefaults {
    fn assess(&mut self, _: Period, _: usize, _: &Loan, _: Money) -> DefaultDecision {
        DefaultDecision::performing()
    }
}

/// Per-trial record of default events, indexed like the pool's loans.
#[derive(Debug, Clone, Default)]
pub struct DefaultTracker {
    defaulted_at: Vec<Option<Period>>,
    recoveries: Vec<Money>,
}

impl DefaultTracker {
    pub fn new(num_loans: usize) -> Self {
        Self {
            defaulted_at: vec![None; num_loans],
            recoveries: vec![0.0; num_loans],
        }
    }

    pub fn for_pool(pool: &LoanPool) -> Self {
        Self::new(pool.len())
    }

    /// Ask `policy` about every loan still performing at `period`.
    /// Returns the number of new defaults.
    pub fn check_defaults(
        &mut self,
        period: Period,
        pool: &LoanPool,
        policy: &mut dyn DefaultPolicy,
    ) -> usize {
        if period == 0 {
            return 0;
        }
        if self.defaulted_at.len() != pool.len() {
            *self = Self::for_pool(pool);
        }
        let mut newly_defaulted = 0;
        for (idx, loan) in pool.loans().iter().enumerate() {
            if self.defaulted_at[idx].is_some() || period > loan.term() {
                continue;
            }
            let balance = loan.balance(period - 1);
            if balance <= 0.0 {
                continue;
            }
            let decision = policy.assess(period, idx, loan, balance);
            if decision.defaulted {
                self.defaulted_at[idx] = Some(period);
                self.recoveries[idx] = decision.recovery.max(0.0);
                newly_defaulted += 1;
            }
        }
        if newly_defaulted > 0 {
            debug!(period, newly_defaulted, "loans defaulted");
        }
        newly_defaulted
    }

    pub fn defaulted_at(&self, loan_index: usize) -> Option<Period> {
        self.defaulted_at.get(loan_index).copied().flatten()
    }

    /// True if the loan has stopped paying by `period`.
    pub fn is_defaulted(&self, loan_index: usize, period: Period) -> bool {
        matches!(self.defaulted_at(loan_index), Some(p) if p <= period)
    }

    /// Recovery realized by the loan, if it defaulted exactly at `period`.
    pub fn recovery_at(&self, loan_index: usize, period: Period) -> Money {
        match self.defaulted_at(loan_index) {
            Some(p) if p == period => self.recoveries[loan_index],
            _ => 0.0,
        }
    }

    pub fn num_defaulted(&self) -> usize {
        self.defaulted_at.iter().filter(|d| d.is_some()).count()
    }

    pub fn reset(&mut self) {
        self.defaulted_at.iter_mut().for_each(|d| *d = None);
        self.recoveries.iter_mut().for_each(|r| *r = 0.0);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
