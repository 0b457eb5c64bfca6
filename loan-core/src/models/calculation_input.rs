use serde::{Deserialize, Serialize};

use crate::calculations::{CalculationError, PaymentCalculator};

/// The three values a payment calculation is made from.
///
/// Construction does not validate; [`crate::PaymentCalculator::compute_input`]
/// rejects values that break `principal > 0`, `rate >= 0` or `tenure > 0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalculationInput {
    /// Amount borrowed, in currency units.
    pub principal: f64,
    /// Nominal yearly rate as a percentage (8.5 means 8.5%).
    pub annual_interest_rate_percent: f64,
    /// Repayment period in months.
    pub tenure_months: u32,
}

impl CalculationInput {
    pub fn new(
        principal: f64,
        annual_interest_rate_percent: f64,
        tenure_months: u32,
    ) -> Self {
        Self {
            principal,
            annual_interest_rate_percent,
            tenure_months,
        }
    }

    /// Checks the same preconditions [`PaymentCalculator::compute`] does.
    pub fn validate(&self) -> Result<(), CalculationError> {
        PaymentCalculator::validate(
            self.principal,
            self.annual_interest_rate_percent,
            self.tenure_months,
        )
    }
}
