use crate::error::AbsError;
use crate::types::{Money, Rate};
use crate::AbsResult;

const CONVERGENCE_THRESHOLD: f64 = 1e-10;
const MAX_IRR_ITERATIONS: u32 = 100;
const MAX_BISECTION_ITERATIONS: u32 = 200;

/// Lower and upper bounds for the periodic rate search.
const RATE_FLOOR: f64 = -0.99;
const RATE_CAP: f64 = 1.0;

/// Net Present Value of a series of periodic cash flows
pub fn npv(rate: Rate, cash_flows: &[Money]) -> AbsResult<Money> {
    if rate <= -1.0 {
        return Err(AbsError::invalid(
            "rate",
            "Discount rate must be greater than -100%",
        ));
    }

    let one_plus_r = 1.0 + rate;
    let mut discount = 1.0;
    let mut result = 0.0;

    for (t, cf) in cash_flows.iter().enumerate() {
        if t > 0 {
            discount *= one_plus_r;
        }
        result += cf / discount;
    }

    Ok(result)
}

/// Internal Rate of Return of a periodic cash-flow stream.
///
/// Newton-Raphson from `guess`; when Newton stalls or leaves the
/// `[-99%, 100%]` bracket the root is bisected instead. The returned rate is
/// per period, not annualised.
pub fn irr(cash_flows: &[Money], guess: Rate) -> AbsResult<Rate> {
    if cash_flows.len() < 2 {
        return Err(AbsError::InsufficientData(
            "IRR requires at least 2 cash flows".into(),
        ));
    }

    let has_positive = cash_flows.iter().any(|cf| *cf > 0.0);
    let has_negative = cash_flows.iter().any(|cf| *cf < 0.0);
    if !has_positive || !has_negative {
        return Err(AbsError::ConvergenceFailure {
            function: "IRR".into(),
            iterations: 0,
            last_delta: cash_flows.iter().sum(),
        });
    }

    let mut rate = guess;

    for _ in 0..MAX_IRR_ITERATIONS {
        let (npv_val, dnpv) = npv_and_derivative(rate, cash_flows);

        if !npv_val.is_finite() || !dnpv.is_finite() {
            break;
        }
        if npv_val.abs() < CONVERGENCE_THRESHOLD {
            return Ok(rate);
        }
        if dnpv == 0.0 {
            break;
        }

        rate -= npv_val / dnpv;

        // Leaving the bracket means Newton is diverging
        if !(RATE_FLOOR..=RATE_CAP).contains(&rate) {
            break;
        }
    }

    bisect_irr(cash_flows)
}

fn npv_and_derivative(rate: Rate, cash_flows: &[Money]) -> (f64, f64) {
    let one_plus_r = 1.0 + rate;
    let mut discount = 1.0;
    let mut npv_val = 0.0;
    let mut dnpv = 0.0;

    for (t, cf) in cash_flows.iter().enumerate() {
        if t > 0 {
            discount *= one_plus_r;
            dnpv -= t as f64 * cf / (discount * one_plus_r);
        }
        npv_val += cf / discount;
    }

    (npv_val, dnpv)
}

fn bisect_irr(cash_flows: &[Money]) -> AbsResult<Rate> {
    let mut lo = RATE_FLOOR;
    let mut hi = RATE_CAP;
    let mut f_lo = npv(lo, cash_flows)?;
    let f_hi = npv(hi, cash_flows)?;

    if f_lo.signum() == f_hi.signum() {
        return Err(AbsError::ConvergenceFailure {
            function: "IRR".into(),
            iterations: MAX_IRR_ITERATIONS,
            last_delta: f_lo.abs().min(f_hi.abs()),
        });
    }

    let mut mid = 0.5 * (lo + hi);
    for _ in 0..MAX_BISECTION_ITERATIONS {
        mid = 0.5 * (lo + hi);
        let f_mid = npv(mid, cash_flows)?;
        if f_mid.abs() < CONVERGENCE_THRESHOLD || (hi - lo) < 1e-15 {
            return Ok(mid);
        }
        if f_mid.signum() == f_lo.signum() {
            lo = mid;
            f_lo = f_mid;
        } else {
            hi = mid;
        }
    }

    Ok(mid)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_npv_zero_rate_is_sum() {
        let flows = [-100.0, 30.0, 30.0, 50.0];
        assert_abs_diff_eq!(npv(0.0, &flows).unwrap(), 10.0, epsilon = 1e-12);
    }

    #[test]
    fn test_npv_rejects_rate_below_minus_one() {
        assert!(npv(-1.0, &[-1.0, 2.0]).is_err());
    }

    #[test]
    fn test_irr_single_period() {
        let r = irr(&[-100.0, 110.0], 0.01).unwrap();
        assert_abs_diff_eq!(r, 0.10, epsilon = 1e-9);
    }

    #[test]
    fn test_irr_level_annuity_matches_coupon() {
        // A 12-period annuity priced at 1% per period
        let r = 0.01;
        let n = 12;
        let pmt = r * 1000.0 / (1.0 - (1.0_f64 + r).powi(-n));
        let mut flows = vec![-1000.0];
        flows.extend(std::iter::repeat(pmt).take(n as usize));
        let result = irr(&flows, 0.05).unwrap();
        assert_abs_diff_eq!(result, r, epsilon = 1e-9);
    }

    #[test]
    fn test_irr_trailing_zeros_do_not_change_root() {
        let base = irr(&[-100.0, 60.0, 60.0], 0.01).unwrap();
        let padded = irr(&[-100.0, 60.0, 60.0, 0.0, 0.0, 0.0], 0.01).unwrap();
        assert_abs_diff_eq!(base, padded, epsilon = 1e-9);
    }

    #[test]
    fn test_irr_negative_return() {
        let r = irr(&[-100.0, 50.0, 40.0], 0.01).unwrap();
        assert!(r < 0.0);
        assert_abs_diff_eq!(npv(r, &[-100.0, 50.0, 40.0]).unwrap(), 0.0, epsilon = 1e-7);
    }

    #[test]
    fn test_irr_no_sign_change_fails() {
        let err = irr(&[-100.0, 0.0, 0.0], 0.01).unwrap_err();
        assert!(matches!(err, AbsError::ConvergenceFailure { .. }));
    }

    #[test]
    fn test_irr_requires_two_flows() {
        assert!(matches!(
            irr(&[-100.0], 0.01),
            Err(AbsError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_irr_bad_guess_falls_back_to_bisection() {
        let flows = [-100.0, 10.0, 10.0, 110.0];
        let r = irr(&flows, 50.0).unwrap();
        assert_abs_diff_eq!(r, 0.10, epsilon = 1e-8);
    }
}
