//! JSON layout of the persisted history slot.
//!
//! ```json
//! {
//!   "entries": [
//!     {
//!       "id": "6f1c…",
//!       "timestamp": 1760867400000,
//!       "principal": 500000,
//!       "annualInterestRate": 8.5,
//!       "tenureMonths": 240,
//!       "monthlyEMI": 4339.116166827673,
//!       "totalInterest": 541387.8800386416,
//!       "totalPayment": 1041387.8800386416
//!     }
//!   ]
//! }
//! ```
//!
//! Entries are newest first.

use std::collections::HashSet;

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{CalculationInput, CalculationResult, HistoryEntry};

/// Storage key the whole log is written under.
pub const HISTORY_KEY: &str = "loan-calculator-history";

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("malformed history document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("history entry {index} is invalid: {reason}")]
    InvalidEntry { index: usize, reason: String },
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedHistory {
    entries: Vec<PersistedEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedEntry {
    id: String,
    timestamp: i64,
    principal: f64,
    annual_interest_rate: f64,
    tenure_months: u32,
    #[serde(rename = "monthlyEMI")]
    monthly_emi: f64,
    total_interest: f64,
    total_payment: f64,
}

fn all_finite(values: &[f64]) -> bool {
    values.iter().all(|v| v.is_finite())
}

impl TryFrom<&HistoryEntry> for PersistedEntry {
    type Error = String;

    /// JSON has no encoding for NaN or infinity, so such values are
    /// refused here rather than written as `null`.
    fn try_from(entry: &HistoryEntry) -> Result<Self, Self::Error> {
        let result = &entry.result;
        if !all_finite(&[entry.input.principal, entry.input.annual_interest_rate_percent]) {
            return Err("non-finite input".to_string());
        }
        if !all_finite(&[result.monthly_payment, result.total_payment, result.total_interest]) {
            return Err("non-finite result".to_string());
        }

        Ok(Self {
            id: entry.id.clone(),
            timestamp: entry.created_at.timestamp_millis(),
            principal: entry.input.principal,
            annual_interest_rate: entry.input.annual_interest_rate_percent,
            tenure_months: entry.input.tenure_months,
            monthly_emi: entry.result.monthly_payment,
            total_interest: entry.result.total_interest,
            total_payment: entry.result.total_payment,
        })
    }
}

impl TryFrom<PersistedEntry> for HistoryEntry {
    type Error = String;

    fn try_from(row: PersistedEntry) -> Result<Self, Self::Error> {
        if row.id.trim().is_empty() {
            return Err("empty id".to_string());
        }

        let created_at = DateTime::from_timestamp_millis(row.timestamp)
            .ok_or_else(|| format!("timestamp {} out of range", row.timestamp))?;

        let input = CalculationInput::new(row.principal, row.annual_interest_rate, row.tenure_months);
        input.validate().map_err(|e| e.to_string())?;

        let result = CalculationResult {
            monthly_payment: row.monthly_emi,
            total_payment: row.total_payment,
            total_interest: row.total_interest,
        };
        if !all_finite(&[result.monthly_payment, result.total_payment, result.total_interest]) {
            return Err("non-finite result".to_string());
        }

        Ok(HistoryEntry {
            id: row.id,
            created_at,
            input,
            result,
        })
    }
}

/// Parses a persisted document into entries, newest first.
///
/// Every entry must be well-formed and ids must be unique; a single bad
/// entry rejects the whole document.
pub fn decode(payload: &str) -> Result<Vec<HistoryEntry>, SnapshotError> {
    let document: PersistedHistory = serde_json::from_str(payload)?;
    let mut seen = HashSet::with_capacity(document.entries.len());

    document
        .entries
        .into_iter()
        .enumerate()
        .map(|(index, row)| {
            let entry = HistoryEntry::try_from(row)
                .map_err(|reason| SnapshotError::InvalidEntry { index, reason })?;
            if !seen.insert(entry.id.clone()) {
                return Err(SnapshotError::InvalidEntry {
                    index,
                    reason: format!("duplicate id '{}'", entry.id),
                });
            }
            Ok(entry)
        })
        .collect()
}

/// Serializes entries (in the order given) into the persisted document.
///
/// Fails with [`SnapshotError::InvalidEntry`] if any entry holds a NaN or
/// infinite number, so nothing is written that [`decode`] would reject.
pub fn encode<'a>(
    entries: impl IntoIterator<Item = &'a HistoryEntry>
) -> Result<String, SnapshotError> {
    let entries = entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            PersistedEntry::try_from(entry)
                .map_err(|reason| SnapshotError::InvalidEntry { index, reason })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(serde_json::to_string(&PersistedHistory { entries })?)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    use super::*;

    fn sample_entry(id: &str) -> HistoryEntry {
        HistoryEntry {
            id: id.to_string(),
            created_at: Utc.timestamp_millis_opt(1_760_867_400_123).unwrap(),
            input: CalculationInput::new(500000.0, 8.5, 240),
            result: CalculationResult {
                monthly_payment: 4339.116166827673,
                total_payment: 1041387.8800386416,
                total_interest: 541387.8800386416,
            },
        }
    }

    const VALID_DOCUMENT: &str = r#"{
        "entries": [
            {
                "id": "b",
                "timestamp": 1760867400123,
                "principal": 500000,
                "annualInterestRate": 8.5,
                "tenureMonths": 240,
                "monthlyEMI": 4339.116166827673,
                "totalInterest": 541387.8800386416,
                "totalPayment": 1041387.8800386416
            },
            {
                "id": "a",
                "timestamp": 1760867300000,
                "principal": 100000,
                "annualInterestRate": 0,
                "tenureMonths": 10,
                "monthlyEMI": 10000,
                "totalInterest": 0,
                "totalPayment": 100000
            }
        ]
    }"#;

    // =========================================================================
    // encode
    // =========================================================================

    #[test]
    fn encode_uses_persisted_field_names() {
        let json = encode([&sample_entry("x")]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let entry = &value["entries"][0];

        assert_eq!(entry["id"], "x");
        assert_eq!(entry["timestamp"], 1_760_867_400_123_i64);
        assert_eq!(entry["annualInterestRate"], 8.5);
        assert_eq!(entry["tenureMonths"], 240);
        assert_eq!(entry["monthlyEMI"], 4339.116166827673);
        assert!(entry.get("totalInterest").is_some());
        assert!(entry.get("totalPayment").is_some());
    }

    #[test]
    fn encode_empty_log() {
        let none: [HistoryEntry; 0] = [];

        assert_eq!(encode(&none).unwrap(), r#"{"entries":[]}"#);
    }

    #[test]
    fn encode_refuses_infinite_result() {
        let mut overflowed = sample_entry("big");
        overflowed.result.monthly_payment = f64::INFINITY;
        overflowed.result.total_payment = f64::INFINITY;

        match encode([&sample_entry("ok"), &overflowed]) {
            Err(SnapshotError::InvalidEntry { index, reason }) => {
                assert_eq!(index, 1);
                assert_eq!(reason, "non-finite result");
            }
            other => panic!("expected InvalidEntry, got {other:?}"),
        }
    }

    #[test]
    fn encode_refuses_nan_anywhere() {
        let mut bad_interest = sample_entry("x");
        bad_interest.result.total_interest = f64::NAN;
        let mut bad_rate = sample_entry("y");
        bad_rate.input.annual_interest_rate_percent = f64::NAN;

        assert!(encode([&bad_interest]).is_err());
        assert!(encode([&bad_rate]).is_err());
    }

    // =========================================================================
    // decode
    // =========================================================================

    #[test]
    fn decode_preserves_document_order() {
        let entries = decode(VALID_DOCUMENT).unwrap();

        let ids: Vec<_> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(entries[1].input, CalculationInput::new(100000.0, 0.0, 10));
        assert_eq!(entries[1].result.monthly_payment, 10000.0);
    }

    #[test]
    fn decode_reads_what_encode_wrote() {
        let original = vec![sample_entry("2"), sample_entry("1")];

        let decoded = decode(&encode(&original).unwrap()).unwrap();

        assert_eq!(decoded, original);
    }

    #[test]
    fn decode_rejects_non_json() {
        assert!(matches!(decode("not json"), Err(SnapshotError::Json(_))));
    }

    #[test]
    fn decode_rejects_wrong_shape() {
        assert!(decode(r#"{"entries": {}}"#).is_err());
        assert!(decode(r#"[1, 2, 3]"#).is_err());
        assert!(decode(r#"{"entries": [{"id": "x"}]}"#).is_err());
    }

    #[test]
    fn decode_rejects_invalid_input_values() {
        let doc = VALID_DOCUMENT.replace("\"principal\": 100000", "\"principal\": -5");

        match decode(&doc) {
            Err(SnapshotError::InvalidEntry { index, reason }) => {
                assert_eq!(index, 1);
                assert!(reason.contains("principal"), "reason was {reason}");
            }
            other => panic!("expected InvalidEntry, got {other:?}"),
        }
    }

    #[test]
    fn decode_rejects_duplicate_ids() {
        let doc = VALID_DOCUMENT.replace("\"id\": \"a\"", "\"id\": \"b\"");

        assert!(matches!(
            decode(&doc),
            Err(SnapshotError::InvalidEntry { index: 1, .. })
        ));
    }

    #[test]
    fn decode_rejects_empty_id() {
        let doc = VALID_DOCUMENT.replace("\"id\": \"a\"", "\"id\": \"  \"");

        assert!(decode(&doc).is_err());
    }
}
