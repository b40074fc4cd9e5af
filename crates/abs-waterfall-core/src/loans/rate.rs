use serde::{Deserialize, Serialize};

use crate::error::AbsError;
use crate::types::{Period, Rate};
use crate::AbsResult;

/// One entry of a variable-rate table: `rate` applies from `from_period` on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateStep {
    pub from_period: Period,
    pub rate: Rate,
}

/// Annual rate of a loan, either fixed or stepping at given periods.
///
/// Only built through [`RateSchedule::fixed`] and [`RateSchedule::stepped`].
/// A stepped schedule is kept sorted by `from_period` and always starts at
/// period 0, so every period resolves to a rate once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRateSchedule", into = "RawRateSchedule")]
pub struct RateSchedule {
    kind: RateKind,
}

#[derive(Debug, Clone, PartialEq)]
enum RateKind {
    Fixed(Rate),
    Stepped(Vec<RateStep>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawRateSchedule {
    Fixed(Rate),
    Stepped(Vec<RateStep>),
}

impl TryFrom<RawRateSchedule> for RateSchedule {
    type Error = AbsError;

    fn try_from(raw: RawRateSchedule) -> Result<Self, Self::Error> {
        match raw {
            RawRateSchedule::Fixed(rate) => RateSchedule::fixed(rate),
            RawRateSchedule::Stepped(steps) => RateSchedule::stepped(steps),
        }
    }
}

impl From<RateSchedule> for RawRateSchedule {
    fn from(schedule: RateSchedule) -> Self {
        match schedule.kind {
            RateKind::Fixed(rate) => RawRateSchedule::Fixed(rate),
            RateKind::Stepped(steps) => RawRateSchedule::Stepped(steps),
        }
    }
}

fn validate_rate(rate: Rate, field: &str) -> AbsResult<()> {
    // A zero rate would divide by zero in the annuity formula
    if !rate.is_finite() || rate <= 0.0 {
        return Err(AbsError::invalid(field, "Annual rate must be a positive number"));
    }
    Ok(())
}

impl RateSchedule {
    pub fn fixed(rate: Rate) -> AbsResult<Self> {
        validate_rate(rate, "rate")?;
        Ok(RateSchedule {
            kind: RateKind::Fixed(rate),
        })
    }

    /// Build a stepped schedule. Entries may arrive in any order; a table
    /// with no entry at period 0 is rejected.
    pub fn stepped(mut steps: Vec<RateStep>) -> AbsResult<Self> {
        if steps.is_empty() {
            return Err(AbsError::invalid("rate_table", "Rate table is empty"));
        }
        for step in &steps {
            validate_rate(step.rate, "rate_table")?;
        }
        steps.sort_by_key(|s| s.from_period);
        if steps.windows(2).any(|w| w[0].from_period == w[1].from_period) {
            return Err(AbsError::invalid(
                "rate_table",
                "Rate table has two entries for the same period",
            ));
        }
        lookup_step(&steps, 0)?;
        Ok(RateSchedule {
            kind: RateKind::Stepped(steps),
        })
    }

    /// Step table of a stepped schedule, sorted by period.
    pub fn steps(&self) -> Option<&[RateStep]> {
        match &self.kind {
            RateKind::Fixed(_) => None,
            RateKind::Stepped(steps) => Some(steps),
        }
    }

    /// Re-check the construction invariants: every rate positive and a rate
    /// in effect from period 0.
    pub fn validate(&self) -> AbsResult<()> {
        match &self.kind {
            RateKind::Fixed(rate) => validate_rate(*rate, "rate"),
            RateKind::Stepped(steps) => {
                for step in steps {
                    validate_rate(step.rate, "rate_table")?;
                }
                lookup_step(steps, 0).map(|_| ())
            }
        }
    }

    pub fn is_fixed(&self) -> bool {
        matches!(self.kind, RateKind::Fixed(_))
    }

    /// Annual rate in effect at `period`.
    pub fn rate_at(&self, period: Period) -> AbsResult<Rate> {
        match &self.kind {
            RateKind::Fixed(rate) => Ok(*rate),
            RateKind::Stepped(steps) => lookup_step(steps, period),
        }
    }

    /// Rate lookup for schedules built through the validating constructors.
    pub(crate) fn effective_rate(&self, period: Period) -> Rate {
        match &self.kind {
            RateKind::Fixed(rate) => *rate,
            RateKind::Stepped(steps) => {
                let idx = steps.partition_point(|s| s.from_period <= period);
                steps[idx.saturating_sub(1)].rate
            }
        }
    }
}

/// Rate of the latest step whose `from_period` does not exceed `period`.
/// `steps` must be sorted by `from_period`.
pub fn lookup_step(steps: &[RateStep], period: Period) -> AbsResult<Rate> {
    let idx = steps.partition_point(|s| s.from_period <= period);
    if idx == 0 {
        return Err(AbsError::RateLookup { period });
    }
    Ok(steps[idx - 1].rate)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn step(from_period: Period, rate: Rate) -> RateStep {
        RateStep { from_period, rate }
    }

    #[test]
    fn test_fixed_rate_is_period_invariant() {
        let s = RateSchedule::fixed(0.05).unwrap();
        assert_eq!(s.rate_at(0).unwrap(), 0.05);
        assert_eq!(s.rate_at(360).unwrap(), 0.05);
    }

    #[test]
    fn test_stepped_uses_latest_change_at_or_before_period() {
        let s = RateSchedule::stepped(vec![step(12, 0.06), step(0, 0.04), step(24, 0.08)]).unwrap();
        assert_eq!(s.rate_at(0).unwrap(), 0.04);
        assert_eq!(s.rate_at(11).unwrap(), 0.04);
        assert_eq!(s.rate_at(12).unwrap(), 0.06);
        assert_eq!(s.rate_at(23).unwrap(), 0.06);
        assert_eq!(s.rate_at(500).unwrap(), 0.08);
        assert_eq!(s.effective_rate(13), 0.06);
    }

    #[test]
    fn test_stepped_without_period_zero_rejected() {
        let err = RateSchedule::stepped(vec![step(3, 0.05)]).unwrap_err();
        assert!(matches!(err, AbsError::RateLookup { period: 0 }));
    }

    #[test]
    fn test_lookup_before_first_entry_fails() {
        let steps = [step(6, 0.05)];
        assert!(matches!(
            lookup_step(&steps, 5),
            Err(AbsError::RateLookup { period: 5 })
        ));
        assert_eq!(lookup_step(&steps, 6).unwrap(), 0.05);
    }

    #[test]
    fn test_zero_rate_rejected() {
        assert!(RateSchedule::fixed(0.0).is_err());
        assert!(RateSchedule::stepped(vec![step(0, 0.05), step(5, 0.0)]).is_err());
    }

    #[test]
    fn test_built_schedules_validate() {
        assert!(RateSchedule::fixed(0.05).unwrap().validate().is_ok());
        let s = RateSchedule::stepped(vec![step(24, 0.06), step(0, 0.05)]).unwrap();
        assert!(s.validate().is_ok());
        assert_eq!(s.steps().unwrap()[0], step(0, 0.05));
    }

    #[test]
    fn test_duplicate_periods_rejected() {
        assert!(RateSchedule::stepped(vec![step(0, 0.05), step(0, 0.06)]).is_err());
    }

    #[test]
    fn test_deserialize_validates() {
        let fixed: RateSchedule = serde_json::from_str("0.07").unwrap();
        assert_eq!(fixed, RateSchedule::fixed(0.07).unwrap());
        assert!(fixed.steps().is_none());

        let stepped: RateSchedule =
            serde_json::from_str(r#"[{"from_period":0,"rate":0.05},{"from_period":12,"rate":0.06}]"#)
                .unwrap();
        assert_eq!(stepped.rate_at(12).unwrap(), 0.06);

        let bad = serde_json::from_str::<RateSchedule>(r#"[{"from_period":1,"rate":0.05}]"#);
        assert!(bad.is_err());
    }
}
