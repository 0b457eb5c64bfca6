//! Loan payment calculations.
//!
//! This module provides the fixed-installment calculation used for every
//! result the application shows or records.

pub mod payment;

pub use payment::{CalculationError, InputField, PaymentCalculator};
