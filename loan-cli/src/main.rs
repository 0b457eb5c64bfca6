use std::io;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::{debug, warn};

use loan_cli::app::{self, Session};
use loan_cli::config::CliConfig;
use loan_cli::logging;
use loan_cli::utils::parse_amount;
use loan_core::{CalculationInput, TenureUnit};

// ─── CLI definition ──────────────────────────────────────────────────────────

/// Loan EMI calculator with a persisted history of recent calculations.
#[derive(Debug, Parser)]
#[command(version)]
struct Cli {
    /// TOML config file. A missing file means defaults.
    #[arg(long, global = true, default_value = "loan-calculator.toml")]
    config: PathBuf,

    /// History storage backend (`memory`, `file` or `sqlite`).
    #[arg(long, global = true)]
    backend: Option<String>,

    /// Backend location: a directory for `file`, a database path or
    /// `:memory:` for `sqlite`.
    #[arg(long, global = true)]
    location: Option<String>,

    /// Decimal places shown for amounts.
    #[arg(long, global = true)]
    decimals: Option<u32>,

    /// Log at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compute the monthly payment for one loan.
    Calc(CalcArgs),

    /// Inspect or manage past calculations.
    History {
        #[command(subcommand)]
        command: HistoryCommand,
    },

    /// Compute and record every loan in a CSV file.
    Batch {
        /// CSV with `principal,annual_rate,tenure[,tenure_unit]` columns.
        file: PathBuf,
    },
}

#[derive(Debug, Args)]
struct CalcArgs {
    /// Amount borrowed. Commas are accepted as thousands separators.
    #[arg(long, allow_hyphen_values = true)]
    principal: String,

    /// Annual interest rate in percent, e.g. `8.5`.
    #[arg(long, allow_hyphen_values = true)]
    rate: String,

    /// Repayment period, in `--unit`.
    #[arg(long)]
    tenure: u32,

    /// Unit of `--tenure`: `months` or `years`.
    #[arg(long, default_value = "months", value_parser = parse_unit)]
    unit: TenureUnit,

    /// Do not record the calculation in history.
    #[arg(long)]
    no_save: bool,
}

#[derive(Debug, Subcommand)]
enum HistoryCommand {
    /// List past calculations, newest first.
    List,
    /// Show one calculation and check it against a fresh computation.
    Show { id: String },
    /// Delete every recorded calculation.
    Clear,
    /// Write the history to a CSV file.
    Export {
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn parse_unit(s: &str) -> Result<TenureUnit, String> {
    TenureUnit::parse(s).ok_or_else(|| format!("expected 'months' or 'years', got '{s}'"))
}

// ─── entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    let config = CliConfig::load(&cli.config)?;
    if let Some(level) = &config.logging.level {
        if !cli.verbose && !logging::env_filter_set() {
            logging::set_log_level(level)?;
        }
    }
    if let Some(file) = &config.logging.file {
        if let Err(error) = logging::enable_file_logging(file) {
            warn!(%error, "file logging disabled");
        }
    }

    let mut storage = config.storage_config();
    if let Some(backend) = cli.backend {
        storage.backend = backend;
    }
    if let Some(location) = cli.location {
        storage.location = location;
    }
    let decimals = cli.decimals.unwrap_or(config.display.decimals);

    debug!(backend = %storage.backend, decimals, "starting");
    let store = app::open_history(&storage).await?;
    let mut session = Session::new(store, decimals);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    session.initialize(&mut out).await?;

    match cli.command {
        Command::Calc(args) => {
            let principal = parse_amount(&args.principal).context("invalid --principal")?;
            let rate = parse_amount(&args.rate).context("invalid --rate")?;
            let tenure_months = args
                .unit
                .to_months(args.tenure)
                .context("--tenure is too long")?;
            let input = CalculationInput::new(principal, rate, tenure_months);
            session.calc(input, !args.no_save, &mut out).await?;
        }
        Command::History { command } => match command {
            HistoryCommand::List => session.list(&mut out)?,
            HistoryCommand::Show { id } => session.show(&id, &mut out)?,
            HistoryCommand::Clear => session.clear(&mut out).await?,
            HistoryCommand::Export { output } => session.export(&output, &mut out)?,
        },
        Command::Batch { file } => {
            session.batch(&file, &mut out).await?;
        }
    }

    Ok(())
}
