//! Collateral assets backing the loans and their depreciation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AbsError;
use crate::types::{Money, Period, Rate};
use crate::AbsResult;

/// Broad asset class. Loan kinds accept only their own class of collateral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetClass {
    Car,
    House,
}

/// Concrete asset subtype, keyed to a fixed annual depreciation rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetKind {
    Car,
    MercedesBenz,
    Porsche,
    Tesla,
    Honda,
    PrimaryHome,
    VacationHome,
}

impl AssetKind {
    pub fn class(self) -> AssetClass {
        match self {
            AssetKind::Car
            | AssetKind::MercedesBenz
            | AssetKind::Porsche
            | AssetKind::Tesla
            | AssetKind::Honda => AssetClass::Car,
            AssetKind::PrimaryHome | AssetKind::VacationHome => AssetClass::House,
        }
    }

    /// Annual depreciation rate for the subtype.
    pub fn annual_depreciation_rate(self) -> Rate {
        match self {
            AssetKind::Car => 0.12,
            AssetKind::MercedesBenz => 0.05,
            AssetKind::Porsche => 0.08,
            AssetKind::Tesla => 0.10,
            AssetKind::Honda => 0.12,
            AssetKind::PrimaryHome => 0.07,
            AssetKind::VacationHome => 0.03,
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AssetKind::Car => "Car",
            AssetKind::MercedesBenz => "Mercedes Benz",
            AssetKind::Porsche => "Porsche",
            AssetKind::Tesla => "Tesla",
            AssetKind::Honda => "Honda",
            AssetKind::PrimaryHome => "Primary Home",
            AssetKind::VacationHome => "Vacation Home",
        };
        f.write_str(label)
    }
}

impl FromStr for AssetKind {
    type Err = AbsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "car" => Ok(AssetKind::Car),
            "mercedesbenz" | "mercedes" => Ok(AssetKind::MercedesBenz),
            "porsche" => Ok(AssetKind::Porsche),
            "tesla" => Ok(AssetKind::Tesla),
            "honda" => Ok(AssetKind::Honda),
            "primaryhome" => Ok(AssetKind::PrimaryHome),
            "vacationhome" => Ok(AssetKind::VacationHome),
            _ => Err(AbsError::invalid("asset_type", format!("Unknown asset type '{s}'"))),
        }
    }
}

/// Convert an annual depreciation rate into a monthly one.
pub fn monthly_depreciation_rate(annual: Rate) -> Rate {
    1.0 - (1.0 - annual).powf(1.0 / 12.0)
}

/// A depreciating asset securing a loan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    kind: AssetKind,
    initial_value: Money,
}

impl Asset {
    pub fn new(kind: AssetKind, initial_value: Money) -> AbsResult<Self> {
        if !initial_value.is_finite() || initial_value < 0.0 {
            return Err(AbsError::invalid(
                "asset_value",
                "Asset value must be a non-negative number",
            ));
        }
        Ok(Self {
            kind,
            initial_value,
        })
    }

    pub fn kind(&self) -> AssetKind {
        self.kind
    }

    pub fn class(&self) -> AssetClass {
        self.kind.class()
    }

    pub fn initial_value(&self) -> Money {
        self.initial_value
    }

    /// Value after `period` months of depreciation.
    pub fn current_value(&self, period: Period) -> Money {
        let monthly = monthly_depreciation_rate(self.kind.annual_depreciation_rate());
        self.initial_value * (1.0 - monthly).powi(period as i32)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
