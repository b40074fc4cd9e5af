use serde::{Deserialize, Serialize};

use crate::error::AbsError;
use crate::types::{Money, Period, Rate};
use crate::AbsResult;

/// Balances at or below this magnitude are snapped to zero.
pub const BALANCE_EPSILON: Money = 1e-6;

/// Where a tranche stands within the current period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentPhase {
    AwaitingInterest,
    InterestPaid,
    PrincipalPaid,
    /// Terminal: the balance has reached zero
    PaidOff,
}

/// A bond class and its period-indexed payment ledger.
///
/// Every ledger sequence starts with a period-0 entry and grows by exactly
/// one entry per settled period, so index `p` always refers to period `p`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tranche {
    name: String,
    notional: Money,
    coupon_rate: Rate,
    subordination: u32,
    period: Period,
    interest_due: Vec<Money>,
    interest_paid: Vec<Money>,
    interest_shortfall: Vec<Money>,
    principal_due: Vec<Money>,
    principal_paid: Vec<Money>,
    principal_shortfall: Vec<Money>,
    balance: Vec<Money>,
    cash_flow: Vec<Money>,
}

impl Tranche {
    pub fn new(
        name: impl Into<String>,
        notional: Money,
        coupon_rate: Rate,
        subordination: u32,
    ) -> AbsResult<Self> {
        if !notional.is_finite() || notional <= 0.0 {
            return Err(AbsError::invalid("notional", "Tranche notional must be positive"));
        }
        validate_coupon(coupon_rate)?;
        let mut tranche = Self {
            name: name.into(),
            notional,
            coupon_rate,
            subordination,
            period: 0,
            interest_due: Vec::new(),
            interest_paid: Vec::new(),
            interest_shortfall: Vec::new(),
            principal_due: Vec::new(),
            principal_paid: Vec::new(),
            principal_shortfall: Vec::new(),
            balance: Vec::new(),
            cash_flow: Vec::new(),
        };
        tranche.reset();
        Ok(tranche)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn notional(&self) -> Money {
        self.notional
    }

    pub fn coupon_rate(&self) -> Rate {
        self.coupon_rate
    }

    pub fn subordination(&self) -> u32 {
        self.subordination
    }

    pub fn period(&self) -> Period {
        self.period
    }

    pub fn set_coupon_rate(&mut self, rate: Rate) -> AbsResult<()> {
        validate_coupon(rate)?;
        self.coupon_rate = rate;
        Ok(())
    }

    pub fn interest_due(&self) -> &[Money] {
        &self.interest_due
    }

    pub fn interest_paid(&self) -> &[Money] {
        &self.interest_paid
    }

    pub fn interest_shortfall(&self) -> &[Money] {
        &self.interest_shortfall
    }

    pub fn principal_due(&self) -> &[Money] {
        &self.principal_due
    }

    pub fn principal_paid(&self) -> &[Money] {
        &self.principal_paid
    }

    pub fn principal_shortfall(&self) -> &[Money] {
        &self.principal_shortfall
    }

    pub fn balance(&self) -> &[Money] {
        &self.balance
    }

    pub fn cash_flow(&self) -> &[Money] {
        &self.cash_flow
    }

    /// Latest recorded balance.
    pub fn notional_balance(&self) -> Money {
        self.balance.last().copied().unwrap_or(self.notional)
    }

    pub fn phase(&self) -> PaymentPhase {
        let p = self.period as usize;
        if self.notional_balance() == 0.0 {
            PaymentPhase::PaidOff
        } else if self.interest_paid.len() <= p {
            PaymentPhase::AwaitingInterest
        } else if self.principal_paid.len() <= p {
            PaymentPhase::InterestPaid
        } else {
            PaymentPhase::PrincipalPaid
        }
    }

    fn violation(&self, reason: impl Into<String>) -> AbsError {
        AbsError::InvariantViolation {
            tranche: self.name.clone(),
            period: self.period,
            reason: reason.into(),
        }
    }

    fn prev(&self) -> usize {
        self.period as usize - 1
    }

    fn check_amount(&self, what: &str, amount: Money) -> AbsResult<()> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(self.violation(format!("{what} must be a non-negative amount, got {amount}")));
        }
        if self.balance[self.prev()] == 0.0 && amount != 0.0 {
            return Err(self.violation(format!(
                "Tranche is fully paid off and cannot receive a {what} of {amount}"
            )));
        }
        Ok(())
    }

    /// Move to the next period. The current period must be fully settled.
    pub fn increase_period(&mut self) -> AbsResult<()> {
        if self.principal_paid.len() != self.period as usize + 1 {
            return Err(self.violation("Cannot advance before the period is settled"));
        }
        self.period += 1;
        Ok(())
    }

    /// Record and return this period's interest due: coupon on the prior
    /// balance plus any unpaid interest carried forward.
    pub fn accrue_interest(&mut self) -> AbsResult<Money> {
        if self.period == 0 {
            return Err(self.violation("No interest accrues at period 0"));
        }
        if self.interest_due.len() != self.period as usize {
            return Err(self.violation("Interest has already been accrued"));
        }
        let prev = self.prev();
        let due = self.balance[prev] * self.coupon_rate / 12.0 + self.interest_shortfall[prev];
        self.interest_due.push(due);
        Ok(due)
    }

    pub fn make_interest_payment(&mut self, amount: Money) -> AbsResult<()> {
        let p = self.period as usize;
        if self.period == 0 || self.interest_due.len() != p + 1 {
            return Err(self.violation("Interest payment before interest was accrued"));
        }
        if self.interest_paid.len() != p {
            return Err(self.violation("Interest payment has already been made"));
        }
        self.check_amount("interest payment", amount)?;
        self.interest_paid.push(amount);
        self.interest_shortfall.push(self.interest_due[p] - amount);
        Ok(())
    }

    pub fn set_principal_due(&mut self, amount: Money) -> AbsResult<()> {
        let p = self.period as usize;
        if self.period == 0 || self.interest_paid.len() != p + 1 {
            return Err(self.violation("Principal due set before the interest payment"));
        }
        if self.principal_due.len() != p {
            return Err(self.violation("Principal due has already been set"));
        }
        self.principal_due.push(amount);
        Ok(())
    }

    pub fn make_principal_payment(&mut self, amount: Money) -> AbsResult<()> {
        let p = self.period as usize;
        if self.period == 0 || self.interest_paid.len() != p + 1 {
            return Err(self.violation("Principal payment before the interest payment"));
        }
        if self.principal_due.len() != p + 1 {
            return Err(self.violation("Principal payment before principal due was set"));
        }
        if self.principal_paid.len() != p {
            return Err(self.violation("Principal payment has already been made"));
        }
        self.check_amount("principal payment", amount)?;

        self.principal_paid.push(amount);
        self.principal_shortfall.push(self.principal_due[p] - amount);
        let remaining = self.balance[p - 1] - amount;
        self.balance
            .push(if remaining.abs() > BALANCE_EPSILON { remaining } else { 0.0 });
        self.cash_flow.push(self.interest_paid[p] + amount);
        Ok(())
    }

    /// Restore the ledger to its period-0 state.
    pub fn reset(&mut self) {
        self.period = 0;
        for seq in [
            &mut self.interest_due,
            &mut self.interest_paid,
            &mut self.interest_shortfall,
            &mut self.principal_due,
            &mut self.principal_paid,
            &mut self.principal_shortfall,
        ] {
            seq.clear();
            seq.push(0.0);
        }
        self.balance.clear();
        self.balance.push(self.notional);
        self.cash_flow.clear();
        self.cash_flow.push(-self.notional);
    }
}

fn validate_coupon(rate: Rate) -> AbsResult<()> {
    if !rate.is_finite() || rate <= 0.0 {
        return Err(AbsError::invalid("coupon_rate", "Coupon rate must be positive"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn tranche() -> Tranche {
        Tranche::new("A", 1_200.0, 0.12, 1).unwrap()
    }

    fn settle(t: &mut Tranche, interest: Money, principal_due: Money, principal: Money) {
        t.increase_period().unwrap();
        t.accrue_interest().unwrap();
        t.make_interest_payment(interest).unwrap();
        t.set_principal_due(principal_due).unwrap();
        t.make_principal_payment(principal).unwrap();
    }

    #[test]
    fn test_initial_state() {
        let t = tranche();
        assert_eq!(t.balance(), &[1_200.0]);
        assert_eq!(t.cash_flow(), &[-1_200.0]);
        assert_eq!(t.interest_due(), &[0.0]);
        assert_eq!(t.phase(), PaymentPhase::PrincipalPaid);
    }

    #[test]
    fn test_full_period() {
        let mut t = tranche();
        t.increase_period().unwrap();
        assert_eq!(t.phase(), PaymentPhase::AwaitingInterest);
        assert_eq!(t.accrue_interest().unwrap(), 12.0);
        t.make_interest_payment(10.0).unwrap();
        assert_eq!(t.phase(), PaymentPhase::InterestPaid);
        t.set_principal_due(100.0).unwrap();
        t.make_principal_payment(100.0).unwrap();
        assert_eq!(t.phase(), PaymentPhase::PrincipalPaid);
        assert_eq!(t.interest_shortfall()[1], 2.0);
        assert_eq!(t.balance()[1], 1_100.0);
        assert_eq!(t.cash_flow()[1], 110.0);
    }

    #[test]
    fn test_interest_shortfall_carries_forward() {
        let mut t = tranche();
        settle(&mut t, 0.0, 0.0, 0.0);
        t.increase_period().unwrap();
        // 12 of new coupon plus 12 carried
        assert_eq!(t.accrue_interest().unwrap(), 24.0);
    }

    #[test]
    fn test_tiny_balance_snaps_to_zero() {
        let mut t = tranche();
        settle(&mut t, 12.0, 1_200.0, 1_200.0 - 5e-7);
        assert_eq!(t.notional_balance(), 0.0);
        assert_eq!(t.phase(), PaymentPhase::PaidOff);
    }

    #[test]
    fn test_double_interest_payment_fails() {
        let mut t = tranche();
        t.increase_period().unwrap();
        t.accrue_interest().unwrap();
        t.make_interest_payment(12.0).unwrap();
        let err = t.make_interest_payment(1.0).unwrap_err();
        assert!(matches!(err, AbsError::InvariantViolation { period: 1, .. }));
    }

    #[test]
    fn test_double_principal_payment_fails() {
        let mut t = tranche();
        settle(&mut t, 12.0, 100.0, 100.0);
        assert!(t.make_principal_payment(1.0).is_err());
    }

    #[test]
    fn test_principal_before_interest_fails() {
        let mut t = tranche();
        t.increase_period().unwrap();
        t.accrue_interest().unwrap();
        assert!(t.set_principal_due(10.0).is_err());
        assert!(t.make_principal_payment(10.0).is_err());
    }

    #[test]
    fn test_payment_at_period_zero_fails() {
        let mut t = tranche();
        assert!(t.accrue_interest().is_err());
        assert!(t.make_interest_payment(0.0).is_err());
    }

    #[test]
    fn test_paid_off_tranche_rejects_nonzero_payment() {
        let mut t = tranche();
        settle(&mut t, 12.0, 1_200.0, 1_200.0);
        t.increase_period().unwrap();
        assert_eq!(t.accrue_interest().unwrap(), 0.0);
        let err = t.make_interest_payment(5.0).unwrap_err();
        assert!(matches!(err, AbsError::InvariantViolation { .. }));
        // Zero payments keep the ledger aligned
        t.make_interest_payment(0.0).unwrap();
        t.set_principal_due(0.0).unwrap();
        t.make_principal_payment(0.0).unwrap();
        assert_eq!(t.balance().len(), 3);
    }

    #[test]
    fn test_cannot_advance_unsettled_period() {
        let mut t = tranche();
        t.increase_period().unwrap();
        assert!(t.increase_period().is_err());
    }

    #[test]
    fn test_reset_restores_period_zero() {
        let mut t = tranche();
        let fresh = t.clone();
        settle(&mut t, 12.0, 100.0, 100.0);
        settle(&mut t, 11.0, 100.0, 50.0);
        t.reset();
        assert_eq!(t, fresh);
    }

    #[test]
    fn test_invalid_construction() {
        assert!(Tranche::new("A", 0.0, 0.05, 1).is_err());
        assert!(Tranche::new("A", 100.0, 0.0, 1).is_err());
        assert!(Tranche::new("A", 100.0, f64::NAN, 1).is_err());
    }
}
