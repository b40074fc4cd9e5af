//! Closed-form level-payment amortization.
//!
//! All functions take the monthly rate `r`, so a variable-rate loan simply
//! passes the rate in effect for the period being evaluated.

use serde::{Deserialize, Serialize};

use crate::types::{Money, Period, Rate};

/// Convert an annual rate into a monthly rate.
pub fn monthly_rate(annual_rate: Rate) -> Rate {
    annual_rate / 12.0
}

/// Convert a monthly rate into an annual rate.
pub fn annual_rate(monthly_rate: Rate) -> Rate {
    monthly_rate * 12.0
}

/// Level payment on `face` over `term` periods at monthly rate `r`.
pub fn level_payment(face: Money, r: Rate, term: Period) -> Money {
    r * face / (1.0 - (1.0 + r).powi(-(term as i32)))
}

/// Remaining balance after `period` level payments of `payment`.
pub fn remaining_balance(face: Money, r: Rate, payment: Money, period: Period) -> Money {
    let growth = (1.0 + r).powi(period as i32);
    face * growth - payment * (growth - 1.0) / r
}

/// One row of a loan's amortization schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRow {
    pub period: Period,
    pub payment: Money,
    pub interest_due: Money,
    pub principal_due: Money,
    pub balance: Money,
    pub recovery_value: Money,
    pub equity: Money,
}
