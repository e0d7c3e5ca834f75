//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use almanac_core::{LogSettings, Pipeline, StageLogger, StageProgress};
use almanac_shared::{AppConfig, Stage, StageReport, init_config, load_config, load_config_from};
use almanac_storage::Store;

/// Sample rows printed per table by `almanac check`.
const CHECK_SAMPLE_ROWS: usize = 5;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// almanac: league leader tables into a queryable database.
#[derive(Parser)]
#[command(
    name = "almanac",
    version,
    about = "Scrape yearly league leader tables, clean them, and load them into SQLite.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.almanac/almanac.toml).
    #[arg(long, global = true, env = "ALMANAC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

impl From<LogFormat> for almanac_core::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Text => Self::Text,
            LogFormat::Json => Self::Json,
        }
    }
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Scrape every discovered metric into raw CSV files.
    Scrape {
        /// Raw output directory.
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// First season (inclusive).
        #[arg(long)]
        from_year: Option<u16>,

        /// Last season (inclusive).
        #[arg(long)]
        to_year: Option<u16>,
    },

    /// Validate, normalize and deduplicate raw files.
    Clean {
        /// Raw input directory.
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Cleaned output directory.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Load cleaned files into the database, one table per metric.
    Load {
        /// Cleaned input directory.
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// SQLite database file.
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Run scrape, clean and load in order.
    Run,

    /// List every table with its row count, columns and sample rows.
    Check {
        /// SQLite database file.
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

fn default_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "almanac=info",
        1 => "almanac=debug",
        _ => "almanac=trace",
    }
}

/// Filter directives: `RUST_LOG` if set, else derived from `-v`.
fn log_filter(verbose: u8) -> String {
    std::env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| default_filter(verbose).to_string())
}

/// Initialize process-wide tracing for messages outside any stage.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(cli.verbose)));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let settings = |config: &AppConfig| LogSettings {
        filter: log_filter(cli.verbose),
        format: cli.log_format.into(),
        log_dir: Some(config.paths.log_dir.clone()),
        console: true,
    };

    match &cli.command {
        Command::Scrape {
            out,
            from_year,
            to_year,
        } => {
            let mut config = resolve_config(cli.config.as_deref())?;
            if let Some(out) = out {
                config.paths.raw_dir = out.clone();
            }
            if let Some(year) = from_year {
                config.source.first_year = *year;
            }
            if let Some(year) = to_year {
                config.source.last_year = *year;
            }
            cmd_stage(Stage::Scrape, config, &settings).await
        }
        Command::Clean { input, out } => {
            let mut config = resolve_config(cli.config.as_deref())?;
            if let Some(input) = input {
                config.paths.raw_dir = input.clone();
            }
            if let Some(out) = out {
                config.paths.cleaned_dir = out.clone();
            }
            cmd_stage(Stage::Clean, config, &settings).await
        }
        Command::Load { input, db } => {
            let mut config = resolve_config(cli.config.as_deref())?;
            if let Some(input) = input {
                config.paths.cleaned_dir = input.clone();
            }
            if let Some(db) = db {
                config.paths.database = db.clone();
            }
            cmd_stage(Stage::Load, config, &settings).await
        }
        Command::Run => {
            let config = resolve_config(cli.config.as_deref())?;
            cmd_run(config, &settings).await
        }
        Command::Check { db } => {
            let mut config = resolve_config(cli.config.as_deref())?;
            if let Some(db) = db {
                config.paths.database = db.clone();
            }
            cmd_check(&config.paths.database).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(cli.config.as_deref()),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command implementations
// ---------------------------------------------------------------------------

async fn cmd_stage(
    stage: Stage,
    config: AppConfig,
    settings: &dyn Fn(&AppConfig) -> LogSettings,
) -> Result<()> {
    let log_settings = settings(&config);
    let pipeline = Pipeline::new(config)?;
    let logger = StageLogger::new(stage, &log_settings)?;
    info!(%stage, run_id = %logger.run_id(), "starting stage");

    let reporter = CliProgress::new();
    let result = match stage {
        Stage::Scrape => pipeline.scrape(&logger, &reporter).await,
        Stage::Clean => pipeline.clean(&logger, &reporter).await,
        Stage::Load => pipeline.load(&logger, &reporter).await,
    };
    reporter.finish();
    let report = result?;

    let log_path = logger.log_path().map(Path::to_path_buf);
    drop(logger);
    print_summary(&report, &pipeline.config().paths.log_dir, log_path.as_deref())
}

async fn cmd_run(config: AppConfig, settings: &dyn Fn(&AppConfig) -> LogSettings) -> Result<()> {
    let log_settings = settings(&config);
    let pipeline = Pipeline::new(config)?;

    let reporter = CliProgress::new();
    let result = pipeline.run_all(&log_settings, &reporter).await;
    reporter.finish();

    for report in result? {
        print_summary(&report, &pipeline.config().paths.log_dir, None)?;
    }
    Ok(())
}

fn print_summary(report: &StageReport, log_dir: &Path, log_path: Option<&Path>) -> Result<()> {
    let report_path = report.write_json(log_dir)?;

    println!();
    println!(
        "  {} finished: {} completed, {} skipped, {} failed",
        report.stage,
        report.completed(),
        report.skipped(),
        report.failed()
    );
    for (item, error) in report.failures() {
        println!("    ✗ {item}: {error}");
    }
    println!("  Report: {}", report_path.display());
    if let Some(log_path) = log_path {
        println!("  Log:    {}", log_path.display());
    }
    println!();

    Ok(())
}

async fn cmd_check(db: &Path) -> Result<()> {
    if !db.exists() {
        return Err(eyre!("database not found: {}", db.display()));
    }
    let store = Store::open(db).await?;
    let tables = store.summarize(CHECK_SAMPLE_ROWS).await?;

    println!();
    println!("  Database: {}", db.display());
    println!("  Tables:   {}", tables.len());
    for table in &tables {
        println!();
        println!("  {} ({} rows)", table.name, table.rows);
        println!("    columns: {}", table.columns.join(", "));
        for row in &table.sample {
            println!("    {}", row.join(" | "));
        }
    }
    println!();

    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = resolve_config(path)?;
    config
        .validate()
        .map_err(|e| eyre!("configuration is invalid: {e}"))?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl StageProgress for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn item(&self, name: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("[{current}/{total}] {name}"));
    }

    fn done(&self, report: &StageReport) {
        self.spinner.set_message(format!(
            "{} done ({} failed)",
            report.stage,
            report.failed()
        ));
    }
}
