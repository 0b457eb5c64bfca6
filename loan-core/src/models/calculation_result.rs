use serde::{Deserialize, Serialize};

/// Output of a payment calculation. Values are unrounded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalculationResult {
    pub monthly_payment: f64,
    /// `monthly_payment * tenure_months`
    pub total_payment: f64,
    /// `total_payment - principal`
    pub total_interest: f64,
}
