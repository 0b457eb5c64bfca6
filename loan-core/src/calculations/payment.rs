//! Fixed monthly installment (EMI) calculation.
//!
//! Given a principal `P`, an annual rate `R` in percent and a tenure of `n`
//! months, the calculation runs as follows:
//!
//! | Step | Description |
//! |------|-------------|
//! | 1    | Monthly rate `r = R / 12 / 100` |
//! | 2    | Growth factor `g = (1 + r)^n` |
//! | 3    | Monthly payment `P * r * g / (g - 1)`, or `P / n` when `R = 0` |
//! | 4    | Total payment: Step 3 × `n` |
//! | 5    | Total interest: Step 4 − `P` |
//!
//! All arithmetic is `f64` and nothing is rounded here. Rounding for display
//! belongs to the caller.
//!
//! # Example
//!
//! ```
//! use loan_core::calculations::PaymentCalculator;
//!
//! let result = PaymentCalculator::compute(100000.0, 0.0, 10).unwrap();
//!
//! assert_eq!(result.monthly_payment, 10000.0);
//! assert_eq!(result.total_payment, 100000.0);
//! assert_eq!(result.total_interest, 0.0);
//!
//! let result = PaymentCalculator::compute(500000.0, 8.5, 240).unwrap();
//! assert!((result.monthly_payment - 4339.1162).abs() < 1e-4);
//! ```

use std::fmt;

use thiserror::Error;

use crate::models::{CalculationInput, CalculationResult};

/// Names the input that failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputField {
    Principal,
    AnnualInterestRate,
    TenureMonths,
}

impl InputField {
    /// Field name as used in the persisted history layout.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Principal => "principal",
            Self::AnnualInterestRate => "annualInterestRate",
            Self::TenureMonths => "tenureMonths",
        }
    }
}

impl fmt::Display for InputField {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur during a payment calculation.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CalculationError {
    /// An input is outside its valid range. Nothing was computed.
    #[error("invalid input: {field}")]
    InvalidInput { field: InputField },
}

impl CalculationError {
    pub fn field(&self) -> InputField {
        match self {
            Self::InvalidInput { field } => *field,
        }
    }
}

/// Calculator for fixed monthly installments on a monthly-compounded loan.
///
/// Stateless; every call is independent and deterministic.
#[derive(Debug, Clone, Copy, Default)]
pub struct PaymentCalculator;

impl PaymentCalculator {
    /// Computes the monthly payment, total payment and total interest.
    ///
    /// # Errors
    ///
    /// Returns [`CalculationError::InvalidInput`] naming the first failing
    /// field if:
    /// - `principal` is not a finite number greater than zero
    /// - `annual_interest_rate_percent` is not a finite number of zero or more
    /// - `tenure_months` is zero
    pub fn compute(
        principal: f64,
        annual_interest_rate_percent: f64,
        tenure_months: u32,
    ) -> Result<CalculationResult, CalculationError> {
        Self::validate(principal, annual_interest_rate_percent, tenure_months)?;

        let months = f64::from(tenure_months);
        let monthly_rate = Self::monthly_rate(annual_interest_rate_percent);
        let monthly_payment = Self::monthly_payment(principal, monthly_rate, months);
        let total_payment = monthly_payment * months;
        let total_interest = total_payment - principal;

        Ok(CalculationResult {
            monthly_payment,
            total_payment,
            total_interest,
        })
    }

    /// Same as [`PaymentCalculator::compute`], taking the inputs as one value.
    pub fn compute_input(input: &CalculationInput) -> Result<CalculationResult, CalculationError> {
        Self::compute(
            input.principal,
            input.annual_interest_rate_percent,
            input.tenure_months,
        )
    }

    pub(crate) fn validate(
        principal: f64,
        annual_interest_rate_percent: f64,
        tenure_months: u32,
    ) -> Result<(), CalculationError> {
        // NaN fails both comparisons.
        if !(principal.is_finite() && principal > 0.0) {
            return Err(CalculationError::InvalidInput {
                field: InputField::Principal,
            });
        }
        if !(annual_interest_rate_percent.is_finite() && annual_interest_rate_percent >= 0.0) {
            return Err(CalculationError::InvalidInput {
                field: InputField::AnnualInterestRate,
            });
        }
        if tenure_months == 0 {
            return Err(CalculationError::InvalidInput {
                field: InputField::TenureMonths,
            });
        }
        Ok(())
    }

    /// Converts an annual percentage to a monthly decimal fraction.
    fn monthly_rate(annual_interest_rate_percent: f64) -> f64 {
        annual_interest_rate_percent / 12.0 / 100.0
    }

    /// Calculates the installment.
    ///
    /// A zero rate is linear repayment. A rate so small that `1 + r`
    /// rounds to 1 is treated the same way, since the formula would divide
    /// by zero.
    ///
    /// The formula is evaluated as `P * r / (1 - (1 + r)^-n)` so that a
    /// large but finite `(1 + r)^n` never overflows the product. When the
    /// power itself overflows, its reciprocal is zero and the payment is
    /// the limit `P * r`.
    fn monthly_payment(
        principal: f64,
        monthly_rate: f64,
        months: f64,
    ) -> f64 {
        if monthly_rate == 0.0 {
            return principal / months;
        }

        let growth = (1.0 + monthly_rate).powf(months);
        if growth == 1.0 {
            return principal / months;
        }
        principal * monthly_rate / (1.0 - growth.recip())
    }
}
