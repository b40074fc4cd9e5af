//! Loan-file loader.
//!
//! The file is a CSV with a header row and positional columns
//! `id, loan type, face, rate, term, asset type, asset value`. The rate is
//! either a single annual rate or a step table `period:rate;period:rate`.

use serde::Deserialize;
use std::str::FromStr;

use abs_waterfall_core::assets::{Asset, AssetKind};
use abs_waterfall_core::loans::{Loan, LoanKind, LoanPool, RateSchedule, RateStep};

use crate::input::file::resolve_path;

#[derive(Debug, Deserialize)]
struct LoanRow {
    id: String,
    loan_type: String,
    face: f64,
    rate: String,
    term: u32,
    asset_type: String,
    asset_value: f64,
}

/// Parse a rate column into a schedule.
pub fn parse_rate(raw: &str) -> Result<RateSchedule, Box<dyn std::error::Error>> {
    let raw = raw.trim();
    if !raw.contains(':') {
        let rate: f64 = raw.parse().map_err(|_| format!("Invalid rate '{raw}'"))?;
        return Ok(RateSchedule::fixed(rate)?);
    }
    let steps = raw
        .split(';')
        .filter(|s| !s.trim().is_empty())
        .map(|entry| -> Result<RateStep, Box<dyn std::error::Error>> {
            let (period, rate) = entry
                .split_once(':')
                .ok_or_else(|| format!("Invalid rate step '{entry}'"))?;
            Ok(RateStep {
                from_period: period
                    .trim()
                    .parse()
                    .map_err(|_| format!("Invalid period in '{entry}'"))?,
                rate: rate
                    .trim()
                    .parse()
                    .map_err(|_| format!("Invalid rate in '{entry}'"))?,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(RateSchedule::stepped(steps)?)
}

fn build_loan(row: LoanRow) -> Result<Loan, Box<dyn std::error::Error>> {
    let kind = LoanKind::from_str(&row.loan_type)?;
    let asset = Asset::new(AssetKind::from_str(&row.asset_type)?, row.asset_value)?;
    let rate = parse_rate(&row.rate)?;
    Ok(Loan::new(kind, asset, row.face, rate, row.term)?)
}

/// Parse loans from any CSV reader. Every row must be valid; the first bad
/// row aborts the load before any pool is built.
pub fn parse_loans<R: std::io::Read>(reader: R) -> Result<LoanPool, Box<dyn std::error::Error>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut loans = Vec::new();
    for (line, record) in rdr.records().enumerate() {
        let record = record?;
        let row: LoanRow = record
            .deserialize(None)
            .map_err(|e| format!("Loan file row {}: {}", line + 1, e))?;
        let id = row.id.clone();
        let loan = build_loan(row).map_err(|e| format!("Loan '{id}': {e}"))?;
        loans.push(loan);
    }
    if loans.is_empty() {
        return Err("Loan file contains no loans".into());
    }
    Ok(LoanPool::new(loans))
}

/// Load a loan pool from a CSV file.
pub fn read_loans(path: &str) -> Result<LoanPool, Box<dyn std::error::Error>> {
    let canonical = resolve_path(path)?;
    let file = std::fs::File::open(&canonical)
        .map_err(|e| format!("Failed to read '{}': {}", canonical.display(), e))?;
    parse_loans(file)
}
