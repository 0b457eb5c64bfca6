mod calculation_input;
mod calculation_result;
mod history_entry;
mod tenure_unit;

pub use calculation_input::CalculationInput;
pub use calculation_result::CalculationResult;
pub use history_entry::HistoryEntry;
pub use tenure_unit::TenureUnit;
