use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use loan_core::storage::{FileStoreFactory, MemoryStoreFactory, StorageConfig, StorageRegistry};
use loan_core::{
    CalculationInput, CalculationResult, HistoryEntry, HistoryStore, PaymentCalculator,
    PersistenceFailed,
};
use loan_db_sqlite::SqliteStoreFactory;
use tracing::{debug, warn};

use crate::csv_loader;
use crate::utils::{format_amount, format_rate};

/// Build the storage registry with every backend this binary knows about.
///
/// New backends should be added here; the rest of the application
/// remains unaware of which concrete store is in use.
pub fn build_registry() -> StorageRegistry {
    let mut registry = StorageRegistry::new();
    registry.register(Box::new(MemoryStoreFactory));
    registry.register(Box::new(FileStoreFactory));
    registry.register(Box::new(SqliteStoreFactory));
    registry
}

/// Opens the configured backend and wraps it in an uninitialized
/// [`HistoryStore`].
pub async fn open_history(config: &StorageConfig) -> Result<HistoryStore> {
    debug!(backend = %config.backend, location = %config.location, "opening history storage");
    let storage = build_registry()
        .create(config)
        .await
        .with_context(|| format!("cannot open '{}' storage", config.backend))?;
    Ok(HistoryStore::new(storage))
}

/// Outcome of a batch import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub added: usize,
    pub skipped: usize,
}

/// One command-line session over a history store. Every command writes its
/// user-facing output to `out`.
pub struct Session {
    store: HistoryStore,
    decimals: u32,
}

impl Session {
    pub fn new(
        store: HistoryStore,
        decimals: u32,
    ) -> Self {
        Self { store, decimals }
    }

    /// Loads the persisted log. A read failure is reported and the session
    /// continues with an empty log.
    pub async fn initialize(
        &mut self,
        out: &mut impl Write,
    ) -> Result<()> {
        if let Some(warning) = self.store.initialize().await {
            print_warning(out, &warning)?;
        }
        Ok(())
    }

    /// Computes `input`, prints the result and records it unless `save` is
    /// false.
    pub async fn calc(
        &mut self,
        input: CalculationInput,
        save: bool,
        out: &mut impl Write,
    ) -> Result<CalculationResult> {
        let result = PaymentCalculator::compute_input(&input).context("cannot calculate")?;
        self.print_result(out, &result)?;

        if save {
            let added = self.store.add(input, result).await;
            if let Some(warning) = &added.warning {
                print_warning(out, warning)?;
            }
            writeln!(out, "Saved as {}", added.value.id)?;
        }
        Ok(result)
    }

    pub fn list(
        &self,
        out: &mut impl Write,
    ) -> Result<()> {
        let entries = self.store.list();
        if entries.is_empty() {
            writeln!(out, "No calculations yet.")?;
            return Ok(());
        }

        writeln!(
            out,
            "{:<36}  {:<19}  {:>16}  {:>8}  {:>6}  {:>14}",
            "ID", "WHEN", "PRINCIPAL", "RATE", "MONTHS", "EMI"
        )?;
        for entry in &entries {
            writeln!(
                out,
                "{:<36}  {:<19}  {:>16}  {:>8}  {:>6}  {:>14}",
                entry.id,
                local_time(entry),
                format_amount(entry.input.principal, self.decimals),
                format_rate(entry.input.annual_interest_rate_percent),
                entry.input.tenure_months,
                format_amount(entry.result.monthly_payment, self.decimals),
            )?;
        }
        Ok(())
    }

    /// Prints one entry and checks its cached result against a fresh
    /// computation. An unknown id is reported, not an error.
    pub fn show(
        &self,
        id: &str,
        out: &mut impl Write,
    ) -> Result<()> {
        let Some(entry) = self.store.get(id) else {
            writeln!(out, "No calculation with id '{id}'.")?;
            return Ok(());
        };

        writeln!(out, "ID:               {}", entry.id)?;
        writeln!(out, "Calculated:       {}", local_time(entry))?;
        writeln!(
            out,
            "Principal:        {}",
            format_amount(entry.input.principal, self.decimals)
        )?;
        writeln!(
            out,
            "Annual rate:      {}",
            format_rate(entry.input.annual_interest_rate_percent)
        )?;
        writeln!(out, "Tenure:           {} months", entry.input.tenure_months)?;
        self.print_result(out, &entry.result)?;

        match entry.recompute() {
            Ok(fresh) if fresh == entry.result => {}
            Ok(fresh) => {
                warn!(id = %entry.id, "stored result differs from recomputation");
                writeln!(out, "Note: recalculating today gives:")?;
                self.print_result(out, &fresh)?;
            }
            Err(e) => {
                writeln!(out, "Note: stored inputs no longer compute ({e})")?;
            }
        }
        Ok(())
    }

    pub async fn clear(
        &mut self,
        out: &mut impl Write,
    ) -> Result<()> {
        let count = self.store.len();
        if let Some(warning) = self.store.clear().await {
            print_warning(out, &warning)?;
        }
        writeln!(out, "Cleared {count} calculation(s).")?;
        Ok(())
    }

    pub fn export(
        &self,
        path: &Path,
        out: &mut impl Write,
    ) -> Result<()> {
        let entries = self.store.list();
        csv_loader::export_to_file(path, &entries)
            .with_context(|| format!("cannot export history to '{}'", path.display()))?;
        writeln!(out, "Exported {} calculation(s) to {}", entries.len(), path.display())?;
        Ok(())
    }

    /// Computes and records every valid row of the CSV at `path`, in file
    /// order. Rows that fail to parse or compute are reported and skipped.
    pub async fn batch(
        &mut self,
        path: &Path,
        out: &mut impl Write,
    ) -> Result<BatchSummary> {
        let rows = csv_loader::load_from_file(path)
            .with_context(|| format!("cannot import '{}'", path.display()))?;

        let mut summary = BatchSummary::default();
        let mut last_warning = None;
        for row in rows {
            let loan = match row {
                Ok(loan) => loan,
                Err(e) => {
                    writeln!(out, "skipped: {e}")?;
                    summary.skipped += 1;
                    continue;
                }
            };
            let result = match PaymentCalculator::compute_input(&loan.input) {
                Ok(result) => result,
                Err(e) => {
                    writeln!(out, "skipped: row {}: {e}", loan.row)?;
                    summary.skipped += 1;
                    continue;
                }
            };

            let added = self.store.add(loan.input, result).await;
            writeln!(
                out,
                "row {}: EMI {} ({})",
                loan.row,
                format_amount(result.monthly_payment, self.decimals),
                added.value.id
            )?;
            if added.warning.is_some() {
                last_warning = added.warning;
            }
            summary.added += 1;
        }

        if let Some(warning) = &last_warning {
            print_warning(out, warning)?;
        }
        writeln!(out, "Added {}, skipped {}.", summary.added, summary.skipped)?;
        Ok(summary)
    }

    fn print_result(
        &self,
        out: &mut impl Write,
        result: &CalculationResult,
    ) -> Result<()> {
        writeln!(
            out,
            "Monthly payment:  {}",
            format_amount(result.monthly_payment, self.decimals)
        )?;
        writeln!(
            out,
            "Total interest:   {}",
            format_amount(result.total_interest, self.decimals)
        )?;
        writeln!(
            out,
            "Total payment:    {}",
            format_amount(result.total_payment, self.decimals)
        )?;
        Ok(())
    }
}

fn print_warning(
    out: &mut impl Write,
    warning: &PersistenceFailed,
) -> Result<()> {
    writeln!(out, "warning: {warning}")?;
    Ok(())
}

fn local_time(entry: &HistoryEntry) -> String {
    entry
        .created_at
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

#[cfg(test)]
mod tests {
    use loan_core::storage::MemoryStore;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    fn session() -> Session {
        Session::new(HistoryStore::new(Box::new(MemoryStore::new())), 2)
    }

    fn text(out: Vec<u8>) -> String {
        String::from_utf8(out).unwrap()
    }

    // ── registry ────────────────────────────────────────────────────────

    #[test]
    fn registry_knows_every_backend() {
        assert_eq!(build_registry().available_backends(), vec!["file", "memory", "sqlite"]);
    }

    #[tokio::test]
    async fn open_history_rejects_unknown_backend() {
        let config = StorageConfig {
            backend: "cloud".to_string(),
            location: String::new(),
        };

        let err = open_history(&config).await.err().expect("should fail");

        assert!(format!("{err:#}").contains("cloud"));
    }

    // ── calc ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn calc_prints_and_saves() {
        let mut session = session();
        let mut out = Vec::new();

        let result = session
            .calc(CalculationInput::new(500000.0, 8.5, 240), true, &mut out)
            .await
            .unwrap();

        assert!((result.monthly_payment - 4339.11616682767).abs() < 1e-6);
        let text = text(out);
        assert!(text.contains("Monthly payment:  4,339.12"), "{text}");
        assert!(text.contains("Total interest:   541,387.88"), "{text}");
        assert!(text.contains("Total payment:    1,041,387.88"), "{text}");
        assert!(text.contains("Saved as "), "{text}");
        assert_eq!(session.store.len(), 1);
    }

    #[tokio::test]
    async fn calc_without_save_leaves_history_alone() {
        let mut session = session();
        let mut out = Vec::new();

        session
            .calc(CalculationInput::new(100000.0, 0.0, 10), false, &mut out)
            .await
            .unwrap();

        assert!(session.store.is_empty());
        assert!(!text(out).contains("Saved as"));
    }

    #[tokio::test]
    async fn calc_rejects_invalid_input_without_saving() {
        let mut session = session();
        let mut out = Vec::new();

        let err = session
            .calc(CalculationInput::new(100000.0, -1.0, 10), true, &mut out)
            .await
            .unwrap_err();

        assert!(format!("{err:#}").contains("annualInterestRate"));
        assert!(session.store.is_empty());
    }

    #[tokio::test]
    async fn calc_reports_failed_save_but_keeps_entry() {
        let store = HistoryStore::new(Box::new(MemoryStore::with_quota(10)));
        let mut session = Session::new(store, 2);
        let mut out = Vec::new();

        session
            .calc(CalculationInput::new(1000.0, 5.0, 12), true, &mut out)
            .await
            .unwrap();

        assert!(text(out).contains("warning: history save did not persist"));
        assert_eq!(session.store.len(), 1);
    }

    // ── list / show ─────────────────────────────────────────────────────

    #[test]
    fn list_empty_history() {
        let mut out = Vec::new();

        session().list(&mut out).unwrap();

        assert_eq!(text(out), "No calculations yet.\n");
    }

    #[tokio::test]
    async fn list_shows_newest_first() {
        let mut session = session();
        let mut sink = Vec::new();
        session
            .calc(CalculationInput::new(1000.0, 5.0, 12), true, &mut sink)
            .await
            .unwrap();
        session
            .calc(CalculationInput::new(2000.0, 7.5, 24), true, &mut sink)
            .await
            .unwrap();

        let mut out = Vec::new();
        session.list(&mut out).unwrap();

        let text = text(out);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("ID"));
        assert!(lines[1].contains("2,000.00") && lines[1].contains("7.5%"));
        assert!(lines[2].contains("1,000.00") && lines[2].contains("5%"));
    }

    #[test]
    fn show_unknown_id_is_not_an_error() {
        let mut out = Vec::new();

        session().show("nope", &mut out).unwrap();

        assert_eq!(text(out), "No calculation with id 'nope'.\n");
    }

    #[tokio::test]
    async fn show_prints_entry_without_mismatch_note() {
        let mut session = session();
        let mut sink = Vec::new();
        session
            .calc(CalculationInput::new(100000.0, 10.0, 12), true, &mut sink)
            .await
            .unwrap();
        let id = session.store.list()[0].id.clone();

        let mut out = Vec::new();
        session.show(&id, &mut out).unwrap();

        let text = text(out);
        assert!(text.contains(&format!("ID:               {id}")));
        assert!(text.contains("Annual rate:      10%"));
        assert!(text.contains("Tenure:           12 months"));
        assert!(text.contains("Monthly payment:  8,791.59"));
        assert!(!text.contains("Note:"));
    }

    // ── clear / export ──────────────────────────────────────────────────

    #[tokio::test]
    async fn clear_empties_history() {
        let mut session = session();
        let mut sink = Vec::new();
        session
            .calc(CalculationInput::new(1000.0, 5.0, 12), true, &mut sink)
            .await
            .unwrap();

        let mut out = Vec::new();
        session.clear(&mut out).await.unwrap();

        assert_eq!(text(out), "Cleared 1 calculation(s).\n");
        assert!(session.store.is_empty());
    }

    #[tokio::test]
    async fn export_writes_csv_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.csv");
        let mut session = session();
        let mut sink = Vec::new();
        session
            .calc(CalculationInput::new(1000.0, 5.0, 12), true, &mut sink)
            .await
            .unwrap();

        let mut out = Vec::new();
        session.export(&path, &mut out).unwrap();

        let csv = std::fs::read_to_string(&path).unwrap();
        assert_eq!(csv.lines().count(), 2);
        assert!(text(out).starts_with("Exported 1 calculation(s)"));
    }

    // ── batch ───────────────────────────────────────────────────────────

    #[tokio::test]
    async fn batch_adds_valid_rows_and_skips_the_rest() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("loans.csv");
        std::fs::write(
            &path,
            "principal,annual_rate,tenure,tenure_unit\n\
             1000,5,12,\n\
             0,5,12,\n\
             oops,5,12,\n\
             2000,6,2,years\n",
        )
        .unwrap();
        let mut session = session();

        let mut out = Vec::new();
        let summary = session.batch(&path, &mut out).await.unwrap();

        assert_eq!(summary, BatchSummary { added: 2, skipped: 2 });
        let listed = session.store.list();
        assert_eq!(listed[0].input, CalculationInput::new(2000.0, 6.0, 24));
        assert_eq!(listed[1].input, CalculationInput::new(1000.0, 5.0, 12));

        let text = text(out);
        assert!(text.contains("skipped: row 2: invalid input: principal"), "{text}");
        assert!(text.contains("skipped: row 3: principal"), "{text}");
        assert!(text.ends_with("Added 2, skipped 2.\n"), "{text}");
    }

    #[tokio::test]
    async fn batch_missing_file_is_an_error() {
        let mut session = session();
        let mut out = Vec::new();

        assert!(
            session
                .batch(Path::new("/no/such/loans.csv"), &mut out)
                .await
                .is_err()
        );
    }
}
