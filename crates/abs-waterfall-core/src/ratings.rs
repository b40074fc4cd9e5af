//! Letter ratings from the default-adjusted yield reduction (DIRR).
//!
//! Thresholds are held as `Decimal` basis points so that the bucket edges
//! compare exactly; a DIRR sitting on an edge falls into the next bucket.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Moody's-style letter rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LetterRating {
    Aaa,
    Aa1,
    Aa2,
    Aa3,
    A1,
    A2,
    A3,
    Baa1,
    Baa2,
    Baa3,
    Ba1,
    Ba2,
    Ba3,
    B1,
    B2,
    B3,
    Caa,
    Ca,
    D,
}

impl fmt::Display for LetterRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Upper (exclusive) bound of each bucket in basis points, ascending.
const RATING_TABLE: [(Decimal, LetterRating); 18] = [
    (dec!(0.06), LetterRating::Aaa),
    (dec!(0.67), LetterRating::Aa1),
    (dec!(1.3), LetterRating::Aa2),
    (dec!(2.7), LetterRating::Aa3),
    (dec!(5.2), LetterRating::A1),
    (dec!(8.9), LetterRating::A2),
    (dec!(13), LetterRating::A3),
    (dec!(19), LetterRating::Baa1),
    (dec!(27), LetterRating::Baa2),
    (dec!(46), LetterRating::Baa3),
    (dec!(72), LetterRating::Ba1),
    (dec!(106), LetterRating::Ba2),
    (dec!(143), LetterRating::Ba3),
    (dec!(183), LetterRating::B1),
    (dec!(231), LetterRating::B2),
    (dec!(311), LetterRating::B3),
    (dec!(2500), LetterRating::Caa),
    (dec!(10000), LetterRating::Ca),
];

const BPS_PER_UNIT: Decimal = dec!(10000);

/// Convert a decimal DIRR (0.0001 = 1bp) into basis points.
pub fn dirr_to_bps(dirr: f64) -> Decimal {
    Decimal::from_f64(dirr)
        .map(|d| d * BPS_PER_UNIT)
        .unwrap_or(Decimal::MAX)
}

/// Basis points rounded to two places for reports.
pub fn dirr_bps_rounded(dirr: f64) -> f64 {
    dirr_to_bps(dirr).round_dp(2).to_f64().unwrap_or(f64::NAN)
}

/// Rating for a DIRR expressed as a decimal fraction.
///
/// Picks the smallest threshold strictly greater than the DIRR in basis
/// points. A DIRR of 1.0 (10,000bps) or more is in default.
pub fn rating_for_dirr(dirr: f64) -> LetterRating {
    if !dirr.is_finite() || dirr >= 1.0 {
        return LetterRating::D;
    }
    let bps = dirr_to_bps(dirr);
    RATING_TABLE
        .iter()
        .find(|(threshold, _)| *threshold > bps)
        .map(|(_, rating)| *rating)
        .unwrap_or(LetterRating::D)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_dirr_is_aaa() {
        assert_eq!(rating_for_dirr(0.0), LetterRating::Aaa);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        // Exactly 0.06bps belongs to the next bucket
        assert_eq!(rating_for_dirr(0.000006), LetterRating::Aa1);
        assert_eq!(rating_for_dirr(0.0000059), LetterRating::Aaa);
    }

    #[test]
    fn test_mid_table_buckets() {
        assert_eq!(rating_for_dirr(0.0010), LetterRating::A3); // 10bps
        assert_eq!(rating_for_dirr(0.0013), LetterRating::Baa1); // 13bps on the A3 edge
        assert_eq!(rating_for_dirr(0.0050), LetterRating::Ba1); // 50bps
        assert_eq!(rating_for_dirr(0.0311), LetterRating::Caa); // 311bps on the B3 edge
    }

    #[test]
    fn test_ca_and_default() {
        assert_eq!(rating_for_dirr(0.5), LetterRating::Ca);
        assert_eq!(rating_for_dirr(0.9999), LetterRating::Ca);
        assert_eq!(rating_for_dirr(1.0), LetterRating::D);
        assert_eq!(rating_for_dirr(3.0), LetterRating::D);
    }

    #[test]
    fn test_non_finite_dirr_is_default() {
        assert_eq!(rating_for_dirr(f64::NAN), LetterRating::D);
        assert_eq!(rating_for_dirr(f64::INFINITY), LetterRating::D);
    }

    #[test]
    fn test_table_is_ascending() {
        for pair in RATING_TABLE.windows(2) {
            assert!(pair[0].0 < pair[1].0);
        }
    }

    #[test]
    fn test_bps_rounding() {
        assert_eq!(dirr_bps_rounded(0.0012346), 12.35);
        assert_eq!(dirr_bps_rounded(0.0), 0.0);
    }

    #[test]
    fn test_display() {
        assert_eq!(LetterRating::Baa2.to_string(), "Baa2");
    }
}
