use serde::{Deserialize, Serialize};

use crate::error::AbsError;
use crate::loans::defaults::DefaultTracker;
use crate::loans::loan::Loan;
use crate::types::{Money, Period, Rate};
use crate::AbsResult;

/// Asset-side cash signal for one period, as consumed by the waterfall.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AssetPeriod {
    pub period: Period,
    pub principal_due: Money,
    pub interest_due: Money,
    pub recoveries: Money,
    pub total_payment: Money,
    pub balance: Money,
}

impl AssetPeriod {
    /// Principal handed to the waterfall: scheduled principal plus any
    /// recoveries realized this period.
    pub fn principal_available(&self) -> Money {
        self.principal_due + self.recoveries
    }
}

/// An immutable collection of loans. Every total is a pure function of the
/// period.
#[derive(Debug, Clone, Default)]
pub struct LoanPool {
    loans: Vec<Loan>,
}

impl LoanPool {
    pub fn new(loans: Vec<Loan>) -> Self {
        Self { loans }
    }

    pub fn loans(&self) -> &[Loan] {
        &self.loans
    }

    pub fn len(&self) -> usize {
        self.loans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loans.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Loan> {
        self.loans.iter()
    }

    pub fn total_principal(&self) -> Money {
        self.loans.iter().map(Loan::face).sum()
    }

    pub fn total_balance(&self, period: Period) -> Money {
        self.loans.iter().map(|l| l.balance(period)).sum()
    }

    pub fn total_monthly_payment(&self, period: Period) -> Money {
        self.loans.iter().map(|l| l.monthly_payment(period)).sum()
    }

    pub fn total_principal_due(&self, period: Period) -> Money {
        self.loans.iter().map(|l| l.principal_due(period)).sum()
    }

    pub fn total_interest_due(&self, period: Period) -> Money {
        self.loans.iter().map(|l| l.interest_due(period)).sum()
    }

    /// Sum of every loan's recovery value, whether or not it defaulted.
    pub fn total_recoveries(&self, period: Period) -> Money {
        self.loans.iter().map(|l| l.recovery_value(period)).sum()
    }

    /// Loans with a positive balance at `period`.
    pub fn active_loans(&self, period: Period) -> Vec<&Loan> {
        self.loans.iter().filter(|l| l.balance(period) > 0.0).collect()
    }

    fn balance_weighted(
        &self,
        period: Period,
        what: &str,
        value: impl Fn(&Loan) -> f64,
    ) -> AbsResult<f64> {
        let (weighted, total) = self
            .active_loans(period)
            .into_iter()
            .fold((0.0, 0.0), |(w, t), loan| {
                let b = loan.balance(period);
                (w + b * value(loan), t + b)
            });
        if total <= 0.0 {
            return Err(AbsError::DivisionByZero {
                context: format!("{what} at period {period}: no active loan balance"),
            });
        }
        Ok(weighted / total)
    }

    /// Balance-weighted average annual rate of the active loans.
    pub fn weighted_average_rate(&self, period: Period) -> AbsResult<Rate> {
        self.balance_weighted(period, "weighted average rate", |l| l.rate(period))
    }

    /// Balance-weighted average remaining term of the active loans, in periods.
    pub fn weighted_average_maturity(&self, period: Period) -> AbsResult<f64> {
        self.balance_weighted(period, "weighted average maturity", |l| {
            f64::from(l.term().saturating_sub(period))
        })
    }

    /// Scheduled asset-side cash for `period`, assuming every loan performs.
    pub fn get_waterfall(&self, period: Period) -> AssetPeriod {
        AssetPeriod {
            period,
            principal_due: self.total_principal_due(period),
            interest_due: self.total_interest_due(period),
            recoveries: self.total_recoveries(period),
            total_payment: self.total_monthly_payment(period),
            balance: self.total_balance(period),
        }
    }

    /// Asset-side cash for `period` net of the defaults in `tracker`.
    ///
    /// A defaulted loan stops paying from its default period on and carries
    /// no balance; in the default period itself it contributes its
    /// recovery.
    pub fn cashflow_with_defaults(&self, period: Period, tracker: &DefaultTracker) -> AssetPeriod {
        let mut out = AssetPeriod {
            period,
            principal_due: 0.0,
            interest_due: 0.0,
            recoveries: 0.0,
            total_payment: 0.0,
            balance: 0.0,
        };
        for (idx, loan) in self.loans.iter().enumerate() {
            if tracker.is_defaulted(idx, period) {
                out.recoveries += tracker.recovery_at(idx, period);
                continue;
            }
            out.principal_due += loan.principal_due(period);
            out.interest_due += loan.interest_due(period);
            out.total_payment += loan.monthly_payment(period);
            out.balance += loan.balance(period);
        }
        out
    }
}

impl<'a> IntoIterator for &'a LoanPool {
    type Item = &'a Loan;
    type IntoIter = std::slice::Iter<'a, Loan>;

    fn into_iter(self) -> Self::IntoIter {
        self.loans.iter()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
