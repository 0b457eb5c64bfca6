use serde::{Deserialize, Serialize};

/// Unit a tenure is entered in before it is converted to months.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenureUnit {
    #[default]
    Months,
    Years,
}

impl TenureUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Months => "months",
            Self::Years => "years",
        }
    }

    /// Accepts the long and short spellings, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "m" | "mo" | "month" | "months" => Some(Self::Months),
            "y" | "yr" | "year" | "years" => Some(Self::Years),
            _ => None,
        }
    }

    /// Converts `value` in this unit to a month count.
    ///
    /// Returns `None` when the month count does not fit in a `u32`.
    pub fn to_months(
        &self,
        value: u32,
    ) -> Option<u32> {
        match self {
            Self::Months => Some(value),
            Self::Years => value.checked_mul(12),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn years_convert_to_twelve_months_each() {
        assert_eq!(TenureUnit::Years.to_months(20), Some(240));
    }

    #[test]
    fn months_pass_through_unchanged() {
        assert_eq!(TenureUnit::Months.to_months(7), Some(7));
    }

    #[test]
    fn conversion_overflow_returns_none() {
        assert_eq!(TenureUnit::Years.to_months(u32::MAX), None);
    }

    #[test]
    fn parse_accepts_short_and_long_forms() {
        assert_eq!(TenureUnit::parse("Years"), Some(TenureUnit::Years));
        assert_eq!(TenureUnit::parse(" y "), Some(TenureUnit::Years));
        assert_eq!(TenureUnit::parse("mo"), Some(TenureUnit::Months));
        assert_eq!(TenureUnit::parse("weeks"), None);
    }

    #[test]
    fn as_str_round_trips_through_parse() {
        for unit in [TenureUnit::Months, TenureUnit::Years] {
            assert_eq!(TenureUnit::parse(unit.as_str()), Some(unit));
        }
    }
}
