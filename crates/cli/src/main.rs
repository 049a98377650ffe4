mod args;
mod commands;
mod table;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use factmap_core::FilterSpec;
use tracing_subscriber::EnvFilter;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Analytics report downloader.
#[derive(Parser)]
#[command(name = "factmap", version, about = "Analytics report downloader")]
struct Cli {
    /// Path to a TOML config file (FACTMAP_* variables override it)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download every row of a report, paging past the row cap
    Report {
        /// Report id
        id: String,
        /// Column whose values identify a row; needed to page past the cap
        #[arg(long)]
        id_column: Option<String>,
        /// Extra filter as COLUMN|OP|VALUE; comma separated values match any
        #[arg(long = "filter", value_parser = args::parse_filter)]
        filters: Vec<FilterSpec>,
        /// Boolean filter logic, e.g. "1 AND (2 OR 3)"
        #[arg(long)]
        logic: Option<String>,
        /// Custom date range start (ISO or day-first)
        #[arg(long, value_parser = args::parse_date)]
        start: Option<time::Date>,
        /// Custom date range end (ISO or day-first)
        #[arg(long, value_parser = args::parse_date)]
        end: Option<time::Date>,
        /// Column the custom date range applies to
        #[arg(long)]
        date_column: Option<String>,
        /// Named duration, e.g. "Current FY"
        #[arg(long)]
        duration: Option<String>,
        /// Sort column, optionally suffixed with :asc or :desc
        #[arg(long, value_parser = args::parse_sort)]
        sort: Option<args::SortKey>,
        /// Save the server-rendered spreadsheet here instead of printing rows
        #[arg(long)]
        excel: Option<PathBuf>,
    },

    /// Print a report's grand total
    Total {
        /// Report id
        id: String,
    },

    /// Show a report's columns, groupings, filters and named durations
    Describe {
        /// Report id
        id: String,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.quiet);

    let config = match factmap_client::ClientConfig::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            report_error(&e.to_string(), cli.output, cli.quiet);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Report {
            id,
            id_column,
            filters,
            logic,
            start,
            end,
            date_column,
            duration,
            sort,
            excel,
        } => {
            let request = args::build_request(args::ReportArgs {
                id,
                id_column,
                filters,
                logic,
                start,
                end,
                date_column,
                duration,
                sort,
            });
            commands::report::cmd_report(&config, &request, excel.as_deref(), cli.output)
        }
        Commands::Total { id } => commands::total::cmd_total(&config, &id, cli.output),
        Commands::Describe { id } => commands::describe::cmd_describe(&config, &id, cli.output),
    };

    if let Err(e) = result {
        report_error(&e.to_string(), cli.output, cli.quiet);
        process::exit(1);
    }
}

/// Log to stderr, filtered by `FACTMAP_LOG` (default `warn`, `error` when
/// quiet).
fn init_logging(quiet: bool) {
    let default = if quiet { "error" } else { "warn" };
    let filter = EnvFilter::try_from_env("FACTMAP_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("error: {}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
