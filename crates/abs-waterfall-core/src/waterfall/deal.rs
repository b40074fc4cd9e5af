use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::AbsError;
use crate::types::{Money, Period, Rate};
use crate::waterfall::securities::{PaymentMode, StructuredSecurities};
use crate::waterfall::tranche::Tranche;
use crate::AbsResult;

/// Damping applied to the most senior class when none is configured.
pub const SENIOR_DAMPING: f64 = 1.2;
/// Damping applied to the most junior class when none is configured.
pub const JUNIOR_DAMPING: f64 = 0.8;

fn default_non_equity() -> f64 {
    0.95
}

/// One class of notes as configured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrancheSpec {
    pub name: String,
    /// Share of the total tranche notional
    pub notional_share: f64,
    /// Starting annual coupon
    pub coupon_rate: Rate,
    /// 1 = most senior
    pub subordination: u32,
    /// Coupon-update damping for this class
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub damping: Option<f64>,
}

/// A deal's liability structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealSpec {
    #[serde(default)]
    pub deal_name: String,
    #[serde(default)]
    pub payment_mode: PaymentMode,
    /// Share of pool principal sold as notes; the rest is retained equity
    #[serde(default = "default_non_equity")]
    pub non_equity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closing_date: Option<NaiveDate>,
    pub tranches: Vec<TrancheSpec>,
}

impl Default for DealSpec {
    /// Two classes: A takes 80% at 5%, B takes 20% at 8%.
    fn default() -> Self {
        Self {
            deal_name: String::new(),
            payment_mode: PaymentMode::Sequential,
            non_equity: default_non_equity(),
            closing_date: None,
            tranches: vec![
                TrancheSpec {
                    name: "A".into(),
                    notional_share: 0.8,
                    coupon_rate: 0.05,
                    subordination: 1,
                    damping: None,
                },
                TrancheSpec {
                    name: "B".into(),
                    notional_share: 0.2,
                    coupon_rate: 0.08,
                    subordination: 2,
                    damping: None,
                },
            ],
        }
    }
}

impl DealSpec {
    pub fn validate(&self) -> AbsResult<()> {
        if self.tranches.is_empty() {
            return Err(AbsError::invalid("tranches", "At least one tranche is required"));
        }
        if !(self.non_equity > 0.0 && self.non_equity <= 1.0) {
            return Err(AbsError::invalid("non_equity", "Must be in (0, 1]"));
        }
        for t in &self.tranches {
            if !(t.notional_share.is_finite() && t.notional_share > 0.0) {
                return Err(AbsError::invalid(
                    "notional_share",
                    format!("Tranche {} needs a positive share", t.name),
                ));
            }
            if let Some(d) = t.damping {
                if !(d.is_finite() && d > 0.0) {
                    return Err(AbsError::invalid(
                        "damping",
                        format!("Tranche {} needs a positive damping coefficient", t.name),
                    ));
                }
            }
        }
        let total: f64 = self.tranches.iter().map(|t| t.notional_share).sum();
        if (total - 1.0).abs() > 1e-6 {
            return Err(AbsError::invalid(
                "notional_share",
                format!("Tranche shares sum to {total}, expected 1.0"),
            ));
        }
        Ok(())
    }

    /// Size the tranches against a pool and assemble the deal.
    pub fn build(&self, pool_principal: Money) -> AbsResult<StructuredSecurities> {
        self.validate()?;
        let total_notional = pool_principal * self.non_equity;
        let tranches = self
            .tranches
            .iter()
            .map(|t| {
                Tranche::new(
                    t.name.clone(),
                    total_notional * t.notional_share,
                    t.coupon_rate,
                    t.subordination,
                )
            })
            .collect::<AbsResult<Vec<_>>>()?;
        let mut deal = StructuredSecurities::new(self.payment_mode);
        deal.add_tranches(tranches)?;
        Ok(deal)
    }

    /// Tranche specs in seniority order.
    pub fn by_seniority(&self) -> Vec<&TrancheSpec> {
        let mut sorted: Vec<&TrancheSpec> = self.tranches.iter().collect();
        sorted.sort_by_key(|t| t.subordination);
        sorted
    }

    /// Damping coefficient per tranche, in seniority order.
    pub fn damping_coefficients(&self) -> Vec<f64> {
        let sorted = self.by_seniority();
        let count = sorted.len();
        sorted
            .iter()
            .enumerate()
            .map(|(i, t)| t.damping.unwrap_or_else(|| default_damping(i, count)))
            .collect()
    }

    /// Calendar date of `period`, if the deal has a closing date.
    pub fn payment_date(&self, period: Period) -> Option<NaiveDate> {
        self.closing_date?.checked_add_months(Months::new(period))
    }
}

/// Linear from [`SENIOR_DAMPING`] at rank 0 to [`JUNIOR_DAMPING`] at the
/// most junior rank.
pub fn default_damping(rank: usize, count: usize) -> f64 {
    if count <= 1 {
        return SENIOR_DAMPING;
    }
    let t = rank as f64 / (count - 1) as f64;
    SENIOR_DAMPING * (1.0 - t) + JUNIOR_DAMPING * t
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
