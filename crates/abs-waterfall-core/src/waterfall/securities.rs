use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::error::AbsError;
use crate::types::{Money, Period, Rate};
use crate::waterfall::tranche::Tranche;
use crate::AbsResult;

/// Principal allocation rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMode {
    /// Principal flows strictly top-down until exhausted
    #[default]
    Sequential,
    /// Principal is split by each tranche's share of original notional
    ProRata,
}

impl fmt::Display for PaymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentMode::Sequential => f.write_str("sequential"),
            PaymentMode::ProRata => f.write_str("pro_rata"),
        }
    }
}

impl FromStr for PaymentMode {
    type Err = AbsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "sequential" | "seq" => Ok(PaymentMode::Sequential),
            "pro_rata" | "prorata" => Ok(PaymentMode::ProRata),
            _ => Err(AbsError::invalid("payment_mode", format!("Unknown payment mode '{s}'"))),
        }
    }
}

/// One tranche's ledger entries for a single period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrancheRecord {
    pub name: String,
    pub subordination: u32,
    pub interest_due: Money,
    pub interest_paid: Money,
    pub interest_shortfall: Money,
    pub principal_due: Money,
    pub principal_paid: Money,
    pub principal_shortfall: Money,
    pub ending_balance: Money,
    pub cash_flow: Money,
}

/// Liability-side record for one period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiabilityPeriod {
    pub period: Period,
    pub tranches: Vec<TrancheRecord>,
    pub cash_reserve: Money,
}

/// A deal's tranches, kept in seniority order, plus the cash reserve that
/// carries between periods.
#[derive(Debug, Clone, Default)]
pub struct StructuredSecurities {
    tranches: Vec<Tranche>,
    /// Share of total original notional, aligned with `tranches`
    notional_shares: Vec<f64>,
    mode: PaymentMode,
    period: Period,
    cash_reserve: Money,
}

impl StructuredSecurities {
    pub fn new(mode: PaymentMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn add_tranche(&mut self, tranche: Tranche) -> AbsResult<()> {
        self.add_tranches([tranche])
    }

    /// Add tranches and re-sort by subordination. Only allowed before the
    /// first payment period.
    pub fn add_tranches(&mut self, tranches: impl IntoIterator<Item = Tranche>) -> AbsResult<()> {
        if self.period != 0 {
            return Err(AbsError::invalid(
                "tranches",
                format!("Cannot add tranches at period {}", self.period),
            ));
        }
        let mut incoming: Vec<Tranche> = tranches.into_iter().collect();
        for (i, t) in incoming.iter().enumerate() {
            let clash = self
                .tranches
                .iter()
                .chain(incoming[..i].iter())
                .any(|other| other.subordination() == t.subordination());
            if clash {
                return Err(AbsError::invalid(
                    "subordination",
                    format!("Subordination rank {} is used twice", t.subordination()),
                ));
            }
        }
        self.tranches.append(&mut incoming);
        self.tranches.sort_by_key(Tranche::subordination);

        let total = self.total_notional();
        self.notional_shares = self.tranches.iter().map(|t| t.notional() / total).collect();
        Ok(())
    }

    pub fn mode(&self) -> PaymentMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: PaymentMode) {
        self.mode = mode;
    }

    pub fn is_sequential(&self) -> bool {
        self.mode == PaymentMode::Sequential
    }

    pub fn set_sequential(&mut self, sequential: bool) {
        self.mode = if sequential {
            PaymentMode::Sequential
        } else {
            PaymentMode::ProRata
        };
    }

    pub fn tranches(&self) -> &[Tranche] {
        &self.tranches
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Tranche> {
        self.tranches.iter()
    }

    pub fn len(&self) -> usize {
        self.tranches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tranches.is_empty()
    }

    pub fn notional_shares(&self) -> &[f64] {
        &self.notional_shares
    }

    pub fn total_notional(&self) -> Money {
        self.tranches.iter().map(Tranche::notional).sum()
    }

    pub fn period(&self) -> Period {
        self.period
    }

    pub fn cash_reserve(&self) -> Money {
        self.cash_reserve
    }

    pub fn coupon_rates(&self) -> Vec<Rate> {
        self.tranches.iter().map(Tranche::coupon_rate).collect()
    }

    /// Set coupons in seniority order. The ledgers must be at period 0.
    pub fn set_coupon_rates(&mut self, rates: &[Rate]) -> AbsResult<()> {
        if rates.len() != self.tranches.len() {
            return Err(AbsError::invalid(
                "coupon_rates",
                format!("Expected {} rates, got {}", self.tranches.len(), rates.len()),
            ));
        }
        if self.period != 0 {
            return Err(AbsError::invalid("coupon_rates", "Reset the deal before repricing"));
        }
        for (tranche, &rate) in self.tranches.iter_mut().zip(rates) {
            tranche.set_coupon_rate(rate)?;
        }
        Ok(())
    }

    pub fn increase_period_for_all(&mut self) -> AbsResult<()> {
        for tranche in &mut self.tranches {
            tranche.increase_period()?;
        }
        self.period += 1;
        Ok(())
    }

    /// Allocate one period's asset cash across the tranches.
    ///
    /// Interest is paid senior first, then principal senior first, both out
    /// of a single pool of cash that includes the prior reserve. Whatever is
    /// left becomes the new reserve.
    pub fn make_payments(
        &mut self,
        interest_available: Money,
        principal_available: Money,
    ) -> AbsResult<()> {
        if self.period == 0 {
            return Err(AbsError::InvariantViolation {
                tranche: "*".into(),
                period: 0,
                reason: "No payments are made at period 0".into(),
            });
        }
        let prev = self.period as usize - 1;
        let mut cash = interest_available + principal_available + self.cash_reserve;

        for tranche in &mut self.tranches {
            let due = tranche.accrue_interest()?;
            let paid = pay(&mut cash, due);
            tranche.make_interest_payment(paid)?;
        }

        let mut principal_left = principal_available;
        for (tranche, share) in self.tranches.iter_mut().zip(&self.notional_shares) {
            let prior_balance = tranche.balance()[prev];
            let carried = tranche.principal_shortfall()[prev];
            let due = match self.mode {
                PaymentMode::Sequential => {
                    let due = prior_balance.min(principal_left + carried).max(0.0);
                    principal_left -= due;
                    due
                }
                PaymentMode::ProRata => prior_balance
                    .min(principal_available * share + carried)
                    .max(0.0),
            };
            tranche.set_principal_due(due)?;
            let paid = pay(&mut cash, due);
            tranche.make_principal_payment(paid)?;
        }

        if cash == 0.0 {
            debug!(period = self.period, "cash ran out");
        }
        self.cash_reserve = cash;
        Ok(())
    }

    /// Ledger entries for the current period.
    pub fn waterfall(&self) -> LiabilityPeriod {
        let p = self.period as usize;
        let at = |seq: &[Money]| seq.get(p).copied().unwrap_or(0.0);
        LiabilityPeriod {
            period: self.period,
            tranches: self
                .tranches
                .iter()
                .map(|t| TrancheRecord {
                    name: t.name().to_string(),
                    subordination: t.subordination(),
                    interest_due: at(t.interest_due()),
                    interest_paid: at(t.interest_paid()),
                    interest_shortfall: at(t.interest_shortfall()),
                    principal_due: at(t.principal_due()),
                    principal_paid: at(t.principal_paid()),
                    principal_shortfall: at(t.principal_shortfall()),
                    ending_balance: t.notional_balance(),
                    cash_flow: at(t.cash_flow()),
                })
                .collect(),
            cash_reserve: self.cash_reserve,
        }
    }

    pub fn reset_all(&mut self) {
        self.period = 0;
        self.cash_reserve = 0.0;
        for tranche in &mut self.tranches {
            tranche.reset();
        }
        debug!("tranches reset");
    }
}

/// Pay `due` out of `cash`, or whatever cash remains if that is less.
fn pay(cash: &mut Money, due: Money) -> Money {
    if *cash > due {
        *cash -= due;
        due
    } else {
        std::mem::replace(cash, 0.0)
    }
}

impl<'a> IntoIterator for &'a StructuredSecurities {
    type Item = &'a Tranche;
    type IntoIter = std::slice::Iter<'a, Tranche>;

    fn into_iter(self) -> Self::IntoIter {
        self.tranches.iter()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
