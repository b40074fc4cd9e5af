use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::assets::{Asset, AssetClass};
use crate::error::AbsError;
use crate::loans::amortization::{self, ScheduleRow};
use crate::loans::rate::RateSchedule;
use crate::loans::servicing::{PrivateMortgageInsurance, ServicingAdjustment, ServicingContext};
use crate::types::{Money, Period, Rate};
use crate::AbsResult;

/// Share of an asset's depreciated value recovered when a loan is charged off.
pub const RECOVERY_MULTIPLIER: f64 = 0.6;

/// Loan product. Determines which collateral is accepted and whether PMI
/// applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanKind {
    /// Plain fixed-rate loan on any collateral
    FixedRate,
    /// Plain variable-rate loan on any collateral
    VariableRate,
    AutoLoan,
    FixedMortgage,
    VariableMortgage,
}

impl LoanKind {
    pub fn required_asset_class(self) -> Option<AssetClass> {
        match self {
            LoanKind::FixedRate | LoanKind::VariableRate => None,
            LoanKind::AutoLoan => Some(AssetClass::Car),
            LoanKind::FixedMortgage | LoanKind::VariableMortgage => Some(AssetClass::House),
        }
    }

    pub fn is_variable_rate(self) -> bool {
        matches!(self, LoanKind::VariableRate | LoanKind::VariableMortgage)
    }

    pub fn is_mortgage(self) -> bool {
        matches!(self, LoanKind::FixedMortgage | LoanKind::VariableMortgage)
    }
}

impl fmt::Display for LoanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LoanKind::FixedRate => "Fixed Rate Loan",
            LoanKind::VariableRate => "Variable Rate Loan",
            LoanKind::AutoLoan => "Auto Loan",
            LoanKind::FixedMortgage => "Fixed Rate Mortgage",
            LoanKind::VariableMortgage => "Variable Rate Mortgage",
        };
        f.write_str(label)
    }
}

impl FromStr for LoanKind {
    type Err = AbsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "fixedrate" | "fixedrateloan" => Ok(LoanKind::FixedRate),
            "variablerate" | "variablerateloan" => Ok(LoanKind::VariableRate),
            "autoloan" | "auto" => Ok(LoanKind::AutoLoan),
            "fixedratemortgage" | "fixedmortgage" => Ok(LoanKind::FixedMortgage),
            "variableratemortgage" | "variablemortgage" => Ok(LoanKind::VariableMortgage),
            _ => Err(AbsError::invalid("loan_type", format!("Unknown loan type '{s}'"))),
        }
    }
}

/// An amortizing loan. Immutable once built; every schedule value is a
/// function of the period.
#[derive(Debug, Clone)]
pub struct Loan {
    kind: LoanKind,
    asset: Asset,
    face: Money,
    rate: RateSchedule,
    term: Period,
    servicing: Option<Arc<dyn ServicingAdjustment>>,
}

impl Loan {
    /// Build a loan, checking the collateral and rate type against the
    /// product. Mortgages carry PMI.
    pub fn new(
        kind: LoanKind,
        asset: Asset,
        face: Money,
        rate: RateSchedule,
        term: Period,
    ) -> AbsResult<Self> {
        if let Some(required) = kind.required_asset_class() {
            if asset.class() != required {
                return Err(AbsError::invalid(
                    "asset",
                    format!(
                        "{kind} requires {required:?} collateral, got {}",
                        asset.kind()
                    ),
                ));
            }
        }
        rate.validate()?;
        if kind.is_variable_rate() == rate.is_fixed() {
            return Err(AbsError::invalid(
                "rate",
                format!("{kind} does not accept this kind of rate schedule"),
            ));
        }
        if !face.is_finite() || face <= 0.0 {
            return Err(AbsError::invalid("face", "Face value must be positive"));
        }
        if term == 0 {
            return Err(AbsError::invalid("term", "Term must be at least one period"));
        }

        let servicing: Option<Arc<dyn ServicingAdjustment>> = if kind.is_mortgage() {
            Some(Arc::new(PrivateMortgageInsurance::default()))
        } else {
            None
        };

        Ok(Self {
            kind,
            asset,
            face,
            rate,
            term,
            servicing,
        })
    }

    pub fn auto_loan(car: Asset, face: Money, rate: Rate, term: Period) -> AbsResult<Self> {
        Self::new(LoanKind::AutoLoan, car, face, RateSchedule::fixed(rate)?, term)
    }

    pub fn fixed_mortgage(home: Asset, face: Money, rate: Rate, term: Period) -> AbsResult<Self> {
        Self::new(LoanKind::FixedMortgage, home, face, RateSchedule::fixed(rate)?, term)
    }

    pub fn variable_mortgage(
        home: Asset,
        face: Money,
        rate: RateSchedule,
        term: Period,
    ) -> AbsResult<Self> {
        Self::new(LoanKind::VariableMortgage, home, face, rate, term)
    }

    /// Replace (or remove) the servicing adjustment.
    pub fn with_servicing(mut self, servicing: Option<Arc<dyn ServicingAdjustment>>) -> Self {
        self.servicing = servicing;
        self
    }

    pub fn kind(&self) -> LoanKind {
        self.kind
    }

    pub fn asset(&self) -> &Asset {
        &self.asset
    }

    pub fn face(&self) -> Money {
        self.face
    }

    pub fn term(&self) -> Period {
        self.term
    }

    pub fn rate_schedule(&self) -> &RateSchedule {
        &self.rate
    }

    /// Annual rate in effect at `period`.
    pub fn rate(&self, period: Period) -> Rate {
        self.rate.effective_rate(period)
    }

    fn monthly_rate(&self, period: Period) -> Rate {
        amortization::monthly_rate(self.rate(period))
    }

    fn in_payment_window(&self, period: Period) -> bool {
        period > 0 && period <= self.term
    }

    /// Level payment before any servicing adjustment.
    pub fn scheduled_payment(&self, period: Period) -> Money {
        if !self.in_payment_window(period) {
            return 0.0;
        }
        amortization::level_payment(self.face, self.monthly_rate(period), self.term)
    }

    /// Scheduled balance at the end of `period`.
    pub fn balance(&self, period: Period) -> Money {
        if period >= self.term {
            return 0.0;
        }
        if period == 0 {
            return self.face;
        }
        let r = self.monthly_rate(period);
        amortization::remaining_balance(self.face, r, self.scheduled_payment(period), period)
    }

    pub fn interest_due(&self, period: Period) -> Money {
        if !self.in_payment_window(period) {
            return 0.0;
        }
        self.monthly_rate(period) * self.balance(period - 1)
    }

    fn scheduled_principal_due(&self, period: Period) -> Money {
        if !self.in_payment_window(period) {
            return 0.0;
        }
        self.scheduled_payment(period) - self.interest_due(period)
    }

    fn serviced(&self, period: Period) -> (Money, Money) {
        let payment = self.scheduled_payment(period);
        let principal_due = self.scheduled_principal_due(period);
        match (&self.servicing, self.in_payment_window(period)) {
            (Some(adjustment), true) => {
                let out = adjustment.adjust(&ServicingContext {
                    period,
                    balance: self.balance(period),
                    asset_initial_value: self.asset.initial_value(),
                    payment,
                    principal_due,
                });
                (out.payment, out.principal_due)
            }
            _ => (payment, principal_due),
        }
    }

    /// Amount billed to the borrower for `period`.
    pub fn monthly_payment(&self, period: Period) -> Money {
        self.serviced(period).0
    }

    pub fn principal_due(&self, period: Period) -> Money {
        self.serviced(period).1
    }

    pub fn total_payments(&self) -> Money {
        (1..=self.term).map(|p| self.monthly_payment(p)).sum()
    }

    pub fn total_interest(&self) -> Money {
        self.total_payments() - self.face
    }

    /// Cash recovered if the loan is charged off in `period`.
    pub fn recovery_value(&self, period: Period) -> Money {
        if !self.in_payment_window(period) {
            return 0.0;
        }
        self.asset.current_value(period) * RECOVERY_MULTIPLIER
    }

    /// Borrower's equity in the asset.
    pub fn equity(&self, period: Period) -> Money {
        self.asset.current_value(period) - self.balance(period)
    }

    /// Full schedule from period 0 through the term.
    pub fn schedule(&self) -> Vec<ScheduleRow> {
        (0..=self.term)
            .map(|p| ScheduleRow {
                period: p,
                payment: self.monthly_payment(p),
                interest_due: self.interest_due(p),
                principal_due: self.principal_due(p),
                balance: self.balance(p),
                recovery_value: self.recovery_value(p),
                equity: self.equity(p),
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AssetKind;
    use crate::loans::rate::RateStep;
    use approx::assert_abs_diff_eq;

    fn car(value: Money) -> Asset {
        Asset::new(AssetKind::Car, value).unwrap()
    }

    fn home(value: Money) -> Asset {
        Asset::new(AssetKind::PrimaryHome, value).unwrap()
    }

    fn reference_loan() -> Loan {
        Loan::auto_loan(car(2_000.0), 1_200.0, 0.12, 12).unwrap()
    }

    // Recursive reference formulas, used only as oracles. Each level
    // recurses once so the oracle stays linear in the period.
    fn balance_rcr(loan: &Loan, period: Period) -> Money {
        if period == 0 {
            loan.face()
        } else if period >= loan.term() {
            0.0
        } else {
            let prior = balance_rcr(loan, period - 1);
            let interest = loan.rate(period) / 12.0 * prior;
            prior - (loan.scheduled_payment(period) - interest)
        }
    }

    fn interest_due_rcr(loan: &Loan, period: Period) -> Money {
        if period == 0 || period > loan.term() {
            0.0
        } else {
            loan.rate(period) / 12.0 * balance_rcr(loan, period - 1)
        }
    }

    fn principal_due_rcr(loan: &Loan, period: Period) -> Money {
        if period == 0 || period > loan.term() {
            0.0
        } else {
            loan.scheduled_payment(period) - interest_due_rcr(loan, period)
        }
    }

    #[test]
    fn test_reference_loan_values() {
        let loan = reference_loan();
        assert_abs_diff_eq!(loan.monthly_payment(1), 106.6185, epsilon = 1e-3);
        assert_eq!(loan.balance(0), 1_200.0);
        assert_eq!(loan.balance(12), 0.0);
        assert_abs_diff_eq!(loan.interest_due(1), 12.0, epsilon = 1e-12);
    }

    #[test]
    fn test_outside_payment_window_is_zero() {
        let loan = reference_loan();
        assert_eq!(loan.monthly_payment(0), 0.0);
        assert_eq!(loan.monthly_payment(13), 0.0);
        assert_eq!(loan.interest_due(0), 0.0);
        assert_eq!(loan.principal_due(13), 0.0);
        assert_eq!(loan.recovery_value(0), 0.0);
        assert_eq!(loan.recovery_value(13), 0.0);
    }

    #[test]
    fn test_closed_form_matches_recursion() {
        let loan = Loan::auto_loan(car(30_000.0), 25_000.0, 0.07, 36).unwrap();
        for p in 0..=37 {
            assert_abs_diff_eq!(loan.balance(p), balance_rcr(&loan, p), epsilon = 1e-6);
            assert_abs_diff_eq!(loan.interest_due(p), interest_due_rcr(&loan, p), epsilon = 1e-6);
            assert_abs_diff_eq!(loan.principal_due(p), principal_due_rcr(&loan, p), epsilon = 1e-6);
        }
    }

    #[test]
    fn test_recursion_reaches_long_mortgage_terms() {
        let loan = Loan::fixed_mortgage(home(500_000.0), 300_000.0, 0.06, 360).unwrap();
        for p in [1, 120, 240, 359] {
            assert_abs_diff_eq!(loan.interest_due(p), interest_due_rcr(&loan, p), epsilon = 1e-6);
        }
    }

    #[test]
    fn test_invalid_rate_tables_never_reach_a_loan() {
        let no_opening_rate = serde_json::from_str::<RateSchedule>(
            r#"[{"from_period":6,"rate":0.05}]"#,
        );
        assert!(no_opening_rate.is_err());
        assert!(serde_json::from_str::<RateSchedule>("[]").is_err());
        assert!(serde_json::from_str::<RateSchedule>("0.0").is_err());

        let late_start = RateSchedule::stepped(vec![RateStep {
            from_period: 6,
            rate: 0.05,
        }]);
        assert!(matches!(late_start, Err(AbsError::RateLookup { period: 0 })));
        let zero = RateSchedule::fixed(0.0)
            .and_then(|r| Loan::new(LoanKind::AutoLoan, car(12_000.0), 10_000.0, r, 12));
        assert!(matches!(zero, Err(AbsError::InvalidInput { .. })));
    }

    #[test]
    fn test_new_accepts_validated_schedule() {
        let table = RateSchedule::stepped(vec![
            RateStep {
                from_period: 0,
                rate: 0.05,
            },
            RateStep {
                from_period: 6,
                rate: 0.06,
            },
        ])
        .unwrap();
        let loan = Loan::new(LoanKind::VariableMortgage, home(200_000.0), 100_000.0, table, 12)
            .unwrap();
        assert_eq!(loan.rate(0), 0.05);
        assert!(loan.monthly_payment(1).is_finite());
        assert_eq!(loan.rate(6), 0.06);
    }

    #[test]
    fn test_principal_sums_to_face() {
        let loan = Loan::auto_loan(car(30_000.0), 25_000.0, 0.07, 36).unwrap();
        let total: Money = (1..=36).map(|p| loan.principal_due(p)).sum();
        assert_abs_diff_eq!(total, 25_000.0, epsilon = 1e-6);
        assert_abs_diff_eq!(loan.total_interest(), loan.total_payments() - 25_000.0, epsilon = 1e-9);
    }

    #[test]
    fn test_recovery_value_uses_depreciated_asset() {
        let loan = reference_loan();
        let expected = loan.asset().current_value(6) * RECOVERY_MULTIPLIER;
        assert_abs_diff_eq!(loan.recovery_value(6), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_equity() {
        let loan = reference_loan();
        assert_abs_diff_eq!(loan.equity(0), 800.0, epsilon = 1e-9);
    }

    #[test]
    fn test_auto_loan_rejects_house() {
        let err = Loan::auto_loan(home(100_000.0), 50_000.0, 0.05, 60).unwrap_err();
        assert!(matches!(err, AbsError::InvalidInput { .. }));
    }

    #[test]
    fn test_mortgage_rejects_car() {
        assert!(Loan::fixed_mortgage(car(20_000.0), 15_000.0, 0.05, 360).is_err());
    }

    #[test]
    fn test_invalid_terms_rejected() {
        assert!(Loan::auto_loan(car(1.0), 0.0, 0.05, 12).is_err());
        assert!(Loan::auto_loan(car(1.0), 100.0, 0.05, 0).is_err());
        assert!(Loan::auto_loan(car(1.0), 100.0, 0.0, 12).is_err());
    }

    #[test]
    fn test_rate_kind_must_match_product() {
        let stepped = RateSchedule::stepped(vec![RateStep { from_period: 0, rate: 0.05 }]).unwrap();
        assert!(Loan::new(LoanKind::AutoLoan, car(1.0), 100.0, stepped, 12).is_err());
        let fixed = RateSchedule::fixed(0.05).unwrap();
        assert!(Loan::new(LoanKind::VariableMortgage, home(1.0), 100.0, fixed, 12).is_err());
    }

    #[test]
    fn test_mortgage_pmi_until_ltv_below_trigger() {
        // 95% LTV at origination, so PMI applies early and drops off later
        let loan = Loan::fixed_mortgage(home(100_000.0), 95_000.0, 0.06, 360).unwrap();
        let base = loan.scheduled_payment(1);
        assert_abs_diff_eq!(loan.monthly_payment(1), base + 7.5, epsilon = 1e-9);

        let late = 300;
        assert!(loan.balance(late) < 80_000.0);
        assert_abs_diff_eq!(loan.monthly_payment(late), base, epsilon = 1e-9);
        assert_abs_diff_eq!(
            loan.principal_due(1),
            base - loan.interest_due(1) - 7.5,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_pmi_not_charged_at_period_zero() {
        let loan = Loan::fixed_mortgage(home(100_000.0), 95_000.0, 0.06, 360).unwrap();
        assert_eq!(loan.monthly_payment(0), 0.0);
    }

    #[test]
    fn test_servicing_can_be_removed() {
        let loan = Loan::fixed_mortgage(home(100_000.0), 95_000.0, 0.06, 360)
            .unwrap()
            .with_servicing(None);
        assert_eq!(loan.monthly_payment(1), loan.scheduled_payment(1));
    }

    #[test]
    fn test_variable_mortgage_payment_follows_rate_table() {
        let table = RateSchedule::stepped(vec![
            RateStep { from_period: 0, rate: 0.04 },
            RateStep { from_period: 12, rate: 0.06 },
        ])
        .unwrap();
        let loan = Loan::variable_mortgage(home(500_000.0), 300_000.0, table, 360).unwrap();
        assert_eq!(loan.rate(11), 0.04);
        assert_eq!(loan.rate(12), 0.06);
        assert!(loan.scheduled_payment(12) > loan.scheduled_payment(11));
        assert_abs_diff_eq!(
            loan.interest_due(12),
            0.06 / 12.0 * loan.balance(11),
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_schedule_covers_term() {
        let rows = reference_loan().schedule();
        assert_eq!(rows.len(), 13);
        assert_eq!(rows[0].balance, 1_200.0);
        assert_eq!(rows[12].balance, 0.0);
    }

    #[test]
    fn test_parse_loan_kind() {
        assert_eq!("Auto Loan".parse::<LoanKind>().unwrap(), LoanKind::AutoLoan);
        assert_eq!(
            "Variable Rate Mortgage".parse::<LoanKind>().unwrap(),
            LoanKind::VariableMortgage
        );
        assert!("Payday".parse::<LoanKind>().is_err());
    }
}
