use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

/// Error returned when a typed amount cannot be parsed.
#[derive(Debug, Error)]
pub enum ParseAmountError {
    #[error("amount is empty")]
    Empty,

    #[error("invalid amount '{input}': {source}")]
    Invalid {
        input: String,
        #[source]
        source: rust_decimal::Error,
    },

    #[error("amount '{input}' has no floating-point equivalent")]
    OutOfRange { input: String },
}

/// Normalizes input for decimal parsing: trims whitespace and removes commas (thousands separator).
fn normalize_amount_input(s: &str) -> String {
    s.trim().replace(',', "")
}

/// Parses a string into a [`Decimal`].
///
/// Handles comma as thousands separator (e.g. `"1,234.56"`). Unlike optional
/// form fields, an empty amount is an error: every calculator input is required.
pub fn parse_decimal(s: &str) -> Result<Decimal, ParseAmountError> {
    let normalized = normalize_amount_input(s);
    if normalized.is_empty() {
        return Err(ParseAmountError::Empty);
    }
    normalized.parse().map_err(|e| {
        tracing::debug!(input = %s, "invalid amount: {}", e);
        ParseAmountError::Invalid {
            input: s.to_string(),
            source: e,
        }
    })
}

/// Parses a typed amount into the `f64` the calculator works in.
pub fn parse_amount(s: &str) -> Result<f64, ParseAmountError> {
    let amount = parse_decimal(s)?;
    amount.to_f64().ok_or_else(|| ParseAmountError::OutOfRange {
        input: s.to_string(),
    })
}

/// Formats `value` rounded half away from zero to `decimals` places, with
/// comma thousands separators (e.g. `1,041,387.88`).
///
/// Values outside the range of [`Decimal`] fall back to plain formatting.
pub fn format_amount(
    value: f64,
    decimals: u32,
) -> String {
    let Some(d) = Decimal::from_f64(value) else {
        return format!("{value:.prec$}", prec = decimals as usize);
    };
    let rounded = d.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero);
    let plain = format!("{rounded:.prec$}", prec = decimals as usize);

    let (sign, unsigned) = match plain.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", plain.as_str()),
    };
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (unsigned, None),
    };

    let mut grouped = String::with_capacity(plain.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    match frac_part {
        Some(frac) => format!("{sign}{grouped}.{frac}"),
        None => format!("{sign}{grouped}"),
    }
}

/// Formats a percentage rate without trailing zeros (e.g. `8.5%`).
pub fn format_rate(rate_percent: f64) -> String {
    match Decimal::from_f64(rate_percent) {
        Some(d) => format!("{}%", d.normalize()),
        None => format!("{rate_percent}%"),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    // ── parse_decimal / parse_amount ────────────────────────────────────

    #[test]
    fn parse_decimal_accepts_comma_thousands_separator() {
        assert_eq!(parse_decimal("1,234.56").unwrap(), dec!(1234.56));
        assert_eq!(parse_decimal("5,00,000").unwrap(), dec!(500000));
    }

    #[test]
    fn parse_decimal_trims_whitespace() {
        assert_eq!(parse_decimal("  8.5  ").unwrap(), dec!(8.5));
    }

    #[test]
    fn parse_decimal_empty_is_error() {
        assert!(matches!(parse_decimal(""), Err(ParseAmountError::Empty)));
        assert!(matches!(parse_decimal("  ,  "), Err(ParseAmountError::Empty)));
    }

    #[test]
    fn parse_decimal_invalid_returns_error() {
        assert!(matches!(
            parse_decimal("abc"),
            Err(ParseAmountError::Invalid { .. })
        ));
        assert!(parse_decimal("12.3.4").is_err());
    }

    #[test]
    fn parse_amount_matches_float_literal() {
        assert_eq!(parse_amount("500,000").unwrap(), 500000.0);
        assert_eq!(parse_amount("8.5").unwrap(), 8.5);
        assert!((parse_amount("1234.56").unwrap() - 1234.56).abs() < 1e-9);
        assert_eq!(parse_amount("0.1").unwrap(), 0.1);
    }

    #[test]
    fn parse_amount_converts_extreme_decimals_to_finite_values() {
        let max = parse_amount("79,228,162,514,264,337,593,543,950,335").unwrap();
        let tiny = parse_amount("0.0000000000000000000000000001").unwrap();
        let long = parse_amount("1.2345678901234567890123456789").unwrap();

        assert!(max.is_finite() && (max / 7.922_816_251_426_434e28 - 1.0).abs() < 1e-12);
        assert!(tiny > 0.0 && tiny < 1e-27);
        assert!((long - 1.234_567_890_123_456_7).abs() < 1e-12);
    }

    #[test]
    fn parse_amount_keeps_sign_for_validation() {
        assert_eq!(parse_amount("-100").unwrap(), -100.0);
    }

    // ── format_amount ───────────────────────────────────────────────────

    #[test]
    fn format_amount_groups_thousands() {
        assert_eq!(format_amount(1041387.8800386408, 2), "1,041,387.88");
        assert_eq!(format_amount(4339.11616682767, 2), "4,339.12");
        assert_eq!(format_amount(999.0, 2), "999.00");
        assert_eq!(format_amount(0.0, 2), "0.00");
    }

    #[test]
    fn format_amount_rounds_half_away_from_zero() {
        assert_eq!(format_amount(2.5, 0), "3");
        assert_eq!(format_amount(-2.5, 0), "-3");
        assert_eq!(format_amount(0.125, 2), "0.13");
    }

    #[test]
    fn format_amount_negative_values() {
        assert_eq!(format_amount(-1234567.891, 1), "-1,234,567.9");
    }

    #[test]
    fn format_amount_respects_decimals() {
        assert_eq!(format_amount(8791.58872300099, 0), "8,792");
        assert_eq!(format_amount(8791.58872300099, 4), "8,791.5887");
    }

    #[test]
    fn format_amount_out_of_range_falls_back() {
        assert_eq!(format_amount(1e30, 0), format!("{:.0}", 1e30));
    }

    #[test]
    fn format_rate_drops_trailing_zeros() {
        assert_eq!(format_rate(8.5), "8.5%");
        assert_eq!(format_rate(10.0), "10%");
        assert_eq!(format_rate(0.0), "0%");
    }
}
