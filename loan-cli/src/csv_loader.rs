//! CSV import of loan inputs and CSV export of the history log.
//!
//! ## Import format
//!
//! Headers are matched by name, so column order does not matter. Header
//! names are case-sensitive.
//!
//! | Column        | Required | Type    | Notes                                      |
//! |---------------|----------|---------|--------------------------------------------|
//! | `principal`   | yes      | decimal | Commas allowed when quoted: `"5,00,000"`   |
//! | `annual_rate` | yes      | decimal | Percent, e.g. `8.5`                        |
//! | `tenure`      | yes      | integer | In `tenure_unit`                           |
//! | `tenure_unit` | no       | string  | `months` (default) or `years`; `m`/`y` too |
//!
//! ```csv
//! principal,annual_rate,tenure,tenure_unit
//! 500000,8.5,20,years
//! 100000,10,12,
//! ```
//!
//! A bad row does not stop the import: each row comes back as its own
//! `Result`, tagged with its 1-based row number (header = row 0).
//!
//! ## Export format
//!
//! One row per history entry, newest first:
//! `id,created_at,principal,annual_rate,tenure_months,monthly_payment,total_interest,total_payment`.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use loan_core::{CalculationInput, HistoryEntry, TenureUnit};
use serde::{Deserialize, Serialize};

use crate::utils::{ParseAmountError, parse_amount};

const REQUIRED_COLUMNS: [&str; 3] = ["principal", "annual_rate", "tenure"];

// ---------------------------------------------------------------------------
// Serde-compatible rows that mirror the CSV layouts exactly
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CsvRow {
    principal: String,
    annual_rate: String,
    tenure: u32,
    tenure_unit: Option<String>,
}

#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    id: &'a str,
    created_at: String,
    principal: f64,
    annual_rate: f64,
    tenure_months: u32,
    monthly_payment: f64,
    total_interest: f64,
    total_payment: f64,
}

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Errors that can occur while loading or writing CSV data.
#[derive(Debug, thiserror::Error)]
pub enum CsvLoadError {
    /// Structural CSV failure or a cell that does not deserialize.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("cannot open '{path}': {source}")]
    Open {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("missing required column '{0}'")]
    MissingColumn(&'static str),

    #[error("row {row}: {field}: {source}")]
    InvalidAmount {
        field: &'static str,
        row: usize,
        #[source]
        source: ParseAmountError,
    },

    #[error("row {row}: unrecognised tenure unit '{unit}'")]
    InvalidTenureUnit { unit: String, row: usize },

    #[error("row {row}: tenure of {tenure} years is too long")]
    TenureOverflow { tenure: u32, row: usize },
}

/// One imported row, ready for the calculator.
#[derive(Debug, Clone, PartialEq)]
pub struct LoanRow {
    /// 1-based row number in the source file.
    pub row: usize,
    pub input: CalculationInput,
}

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

/// Convert a single CSV row into calculator input.
///
/// row_number is 1-based (for error messages).
fn convert_row(
    row: CsvRow,
    row_number: usize,
) -> Result<LoanRow, CsvLoadError> {
    let amount = |field: &'static str, value: &str| {
        parse_amount(value).map_err(|source| CsvLoadError::InvalidAmount {
            field,
            row: row_number,
            source,
        })
    };
    let principal = amount("principal", &row.principal)?;
    let annual_rate = amount("annual_rate", &row.annual_rate)?;

    let unit = match row.tenure_unit.as_deref().map(str::trim) {
        None | Some("") => TenureUnit::default(),
        Some(raw) => TenureUnit::parse(raw).ok_or_else(|| CsvLoadError::InvalidTenureUnit {
            unit: raw.to_string(),
            row: row_number,
        })?,
    };
    let tenure_months = unit.to_months(row.tenure).ok_or(CsvLoadError::TenureOverflow {
        tenure: row.tenure,
        row: row_number,
    })?;

    Ok(LoanRow {
        row: row_number,
        input: CalculationInput::new(principal, annual_rate, tenure_months),
    })
}

/// Parse CSV text into calculator inputs, one `Result` per data row, in
/// file order.
///
/// # Errors
///
/// The outer error is returned only when the header row is unreadable or
/// lacks a required column; row-level problems come back inline.
pub fn load_from_str(input: &str) -> Result<Vec<Result<LoanRow, CsvLoadError>>, CsvLoadError> {
    load_from_reader(input.as_bytes())
}

/// Like [`load_from_str`] but reads from a file path.
pub fn load_from_file(path: &Path) -> Result<Vec<Result<LoanRow, CsvLoadError>>, CsvLoadError> {
    let file = File::open(path).map_err(|source| CsvLoadError::Open {
        path: path.display().to_string(),
        source,
    })?;
    load_from_reader(file)
}

fn load_from_reader<R: io::Read>(
    reader: R
) -> Result<Vec<Result<LoanRow, CsvLoadError>>, CsvLoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(false)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            return Err(CsvLoadError::MissingColumn(column));
        }
    }

    Ok(reader
        .deserialize::<CsvRow>()
        .enumerate()
        .map(|(idx, result)| {
            let row_number = idx + 1;
            convert_row(result?, row_number)
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// Writes `entries` as CSV, in the order given.
pub fn write_history<W: Write>(
    writer: W,
    entries: &[HistoryEntry],
) -> Result<(), CsvLoadError> {
    let mut csv = csv::Writer::from_writer(writer);
    for entry in entries {
        csv.serialize(ExportRow {
            id: &entry.id,
            created_at: entry.created_at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            principal: entry.input.principal,
            annual_rate: entry.input.annual_interest_rate_percent,
            tenure_months: entry.input.tenure_months,
            monthly_payment: entry.result.monthly_payment,
            total_interest: entry.result.total_interest,
            total_payment: entry.result.total_payment,
        })?;
    }
    if entries.is_empty() {
        csv.write_record([
            "id",
            "created_at",
            "principal",
            "annual_rate",
            "tenure_months",
            "monthly_payment",
            "total_interest",
            "total_payment",
        ])?;
    }
    csv.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Writes `entries` as CSV to a new file at `path`, replacing any existing one.
pub fn export_to_file(
    path: &Path,
    entries: &[HistoryEntry],
) -> Result<(), CsvLoadError> {
    let file = File::create(path).map_err(|source| CsvLoadError::Open {
        path: path.display().to_string(),
        source,
    })?;
    write_history(file, entries)
}
