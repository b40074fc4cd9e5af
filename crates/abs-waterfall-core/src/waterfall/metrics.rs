use serde::{Deserialize, Serialize};

use crate::time_value::irr;
use crate::types::Rate;
use crate::waterfall::tranche::Tranche;
use crate::AbsResult;

/// DIRR below `coupon * DIRR_SNAP` is reported as exactly zero.
pub const DIRR_SNAP: f64 = 1e-6;

/// Yield and life measures for one tranche after a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrancheMetrics {
    pub name: String,
    pub subordination: u32,
    pub notional: f64,
    pub coupon_rate: Rate,
    /// Annualized IRR of the investor cash flows
    pub irr: Option<Rate>,
    /// Coupon minus annualized IRR
    pub dirr: Option<Rate>,
    /// Principal-weighted life in periods, absent if the tranche was not
    /// fully repaid
    pub average_life: Option<f64>,
}

/// Periodic IRR of the cash flows, scaled to an annual rate.
pub fn annualized_irr(cash_flows: &[f64], coupon_rate: Rate) -> AbsResult<Rate> {
    Ok(irr(cash_flows, coupon_rate / 12.0)? * 12.0)
}

pub fn dirr(coupon_rate: Rate, annual_irr: Rate) -> Rate {
    let d = coupon_rate - annual_irr;
    if d < coupon_rate * DIRR_SNAP {
        0.0
    } else {
        d
    }
}

/// `Σ p · principal_paid[p] / notional`, or `None` while a balance remains.
pub fn average_life(tranche: &Tranche) -> Option<f64> {
    if tranche.notional_balance() > 0.0 {
        return None;
    }
    let weighted: f64 = tranche
        .principal_paid()
        .iter()
        .enumerate()
        .map(|(p, paid)| p as f64 * paid)
        .sum();
    Some(weighted / tranche.notional())
}

/// Measure a tranche at the end of a run.
///
/// An IRR that cannot be solved is an error only for a tranche that was
/// repaid; an unrepaid tranche already makes the trial invalid.
pub fn tranche_metrics(tranche: &Tranche) -> AbsResult<TrancheMetrics> {
    let average_life = average_life(tranche);
    let coupon = tranche.coupon_rate();
    let irr = match annualized_irr(tranche.cash_flow(), coupon) {
        Ok(r) => Some(r),
        Err(e) if average_life.is_some() => return Err(e),
        Err(_) => None,
    };
    Ok(TrancheMetrics {
        name: tranche.name().to_string(),
        subordination: tranche.subordination(),
        notional: tranche.notional(),
        coupon_rate: coupon,
        irr,
        dirr: irr.map(|r| dirr(coupon, r)),
        average_life,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn settle(t: &mut Tranche, interest: f64, principal: f64) {
        t.increase_period().unwrap();
        t.accrue_interest().unwrap();
        t.make_interest_payment(interest).unwrap();
        t.set_principal_due(principal).unwrap();
        t.make_principal_payment(principal).unwrap();
    }

    #[test]
    fn test_full_coupon_gives_zero_dirr() {
        let mut t = Tranche::new("A", 1_000.0, 0.12, 1).unwrap();
        settle(&mut t, 10.0, 500.0);
        settle(&mut t, 5.0, 500.0);
        let m = tranche_metrics(&t).unwrap();
        assert_abs_diff_eq!(m.irr.unwrap(), 0.12, epsilon = 1e-9);
        assert_eq!(m.dirr, Some(0.0));
        assert_abs_diff_eq!(m.average_life.unwrap(), 1.5, epsilon = 1e-12);
    }

    #[test]
    fn test_missed_interest_shows_as_dirr() {
        let mut t = Tranche::new("B", 1_000.0, 0.12, 2).unwrap();
        settle(&mut t, 0.0, 1_000.0);
        let m = tranche_metrics(&t).unwrap();
        assert_abs_diff_eq!(m.irr.unwrap(), 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(m.dirr.unwrap(), 0.12, epsilon = 1e-9);
    }

    #[test]
    fn test_unrepaid_tranche_has_no_average_life() {
        let mut t = Tranche::new("B", 1_000.0, 0.12, 2).unwrap();
        settle(&mut t, 0.0, 0.0);
        let m = tranche_metrics(&t).unwrap();
        assert_eq!(m.average_life, None);
        assert_eq!(m.irr, None);
    }

    #[test]
    fn test_dirr_snap() {
        assert_eq!(dirr(0.05, 0.05 - 1e-9), 0.0);
        assert_eq!(dirr(0.05, 0.06), 0.0);
        assert_abs_diff_eq!(dirr(0.05, 0.04), 0.01, epsilon = 1e-15);
    }
}
