use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::calculations::{CalculationError, PaymentCalculator};
use crate::models::{CalculationInput, CalculationResult};

/// One recorded calculation. Entries are created by
/// [`crate::HistoryStore::add`] and never change afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    /// Wall-clock time of insertion, millisecond precision. Display only;
    /// log order is insertion order.
    pub created_at: DateTime<Utc>,
    pub input: CalculationInput,
    /// Cached result as computed when the entry was added.
    pub result: CalculationResult,
}

impl HistoryEntry {
    /// Runs the stored input through the calculator again.
    pub fn recompute(&self) -> Result<CalculationResult, CalculationError> {
        PaymentCalculator::compute_input(&self.input)
    }
}
