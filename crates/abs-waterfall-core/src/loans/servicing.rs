//! Servicing adjustments layered on top of a loan's scheduled payment.
//!
//! A loan carries at most one adjustment. It sees the scheduled payment and
//! principal due for a period and returns the amounts actually billed.

use std::fmt;

use crate::types::{Money, Period};

/// Inputs available to an adjustment for one period.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServicingContext {
    pub period: Period,
    /// Scheduled balance at the end of `period`
    pub balance: Money,
    pub asset_initial_value: Money,
    pub payment: Money,
    pub principal_due: Money,
}

/// Adjusted payment and principal due.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServicedAmounts {
    pub payment: Money,
    pub principal_due: Money,
}

pub trait ServicingAdjustment: fmt::Debug + Send + Sync {
    fn adjust(&self, ctx: &ServicingContext) -> ServicedAmounts;
}

/// Private mortgage insurance.
///
/// While the balance exceeds `ltv_trigger` of the home's initial value the
/// borrower pays `monthly_premium_rate` of that value on top of the
/// scheduled payment. The premium comes out of principal due.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrivateMortgageInsurance {
    pub ltv_trigger: f64,
    pub monthly_premium_rate: f64,
}

impl Default for PrivateMortgageInsurance {
    fn default() -> Self {
        Self {
            ltv_trigger: 0.8,
            monthly_premium_rate: 0.000075,
        }
    }
}

impl PrivateMortgageInsurance {
    pub fn premium(&self, balance: Money, asset_initial_value: Money) -> Money {
        if balance > asset_initial_value * self.ltv_trigger {
            self.monthly_premium_rate * asset_initial_value
        } else {
            0.0
        }
    }
}

impl ServicingAdjustment for PrivateMortgageInsurance {
    fn adjust(&self, ctx: &ServicingContext) -> ServicedAmounts {
        let premium = self.premium(ctx.balance, ctx.asset_initial_value);
        ServicedAmounts {
            payment: ctx.payment + premium,
            principal_due: ctx.principal_due - premium,
        }
    }
}
