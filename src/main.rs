//! CLI entry point for payer_tally.
//!
//! Provides subcommands for ranking payers in a large payments export and
//! for ensemble-averaging gait-cycle joint angles.

use anyhow::Result;
use clap::{Parser, Subcommand};
use payer_tally::config::{
    DEFAULT_BATCH_SIZE, DEFAULT_TOP_N, GaitConfig, SummaryConfig, parse_delimiter,
};
use payer_tally::gait::{DEFAULT_METRICS, GaitColumns};
use payer_tally::output::OutputFormat;
use payer_tally::pipeline::{ensemble, summarize, write_ensemble, write_summary};
use payer_tally::reader::{
    ColumnMap, DEFAULT_CATEGORY_COLUMN, DEFAULT_ID_COLUMN, DEFAULT_MEASURE_COLUMN,
};
use payer_tally::summary::DEFAULT_OTHER_LABEL;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "payer_tally")]
#[command(about = "Chunked summaries of payments and gait data", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rank payers by payment count, folding the tail into one bucket
    Summarize {
        /// Payments CSV (may be .gz)
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// File to write the summary to; logged as JSON when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format; guessed from the output extension when omitted
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,

        /// Number of payers to keep before collapsing the rest
        #[arg(short = 'n', long, default_value_t = DEFAULT_TOP_N, env = "PAYER_TALLY_TOP_N")]
        top_n: usize,

        /// Rows per batch
        #[arg(short, long, default_value_t = DEFAULT_BATCH_SIZE, env = "PAYER_TALLY_BATCH_SIZE")]
        batch_size: usize,

        /// Stop after this many batches and summarize what was read
        #[arg(long)]
        max_batches: Option<usize>,

        /// Header of the payer column
        #[arg(long, default_value = DEFAULT_CATEGORY_COLUMN)]
        category_column: String,

        /// Header of the amount column
        #[arg(long, default_value = DEFAULT_MEASURE_COLUMN)]
        measure_column: String,

        /// Header of the record id column
        #[arg(long, default_value = DEFAULT_ID_COLUMN)]
        id_column: String,

        /// Ignore the record id column
        #[arg(long, default_value_t = false)]
        no_id: bool,

        /// Field delimiter (single character, or "tab")
        #[arg(short, long, default_value = ",")]
        delimiter: String,

        /// Label for the collapsed bucket
        #[arg(long, default_value = DEFAULT_OTHER_LABEL)]
        other_label: String,

        /// Divide written counts and sums by this (1000000 for millions)
        #[arg(long, default_value_t = 1.0)]
        scale: f64,
    },
    /// Ensemble-average joint angles over the gait cycle
    Gait {
        /// Tab-delimited kinematics tables, one or more
        #[arg(value_name = "FILE", required = true)]
        inputs: Vec<PathBuf>,

        /// File to write the ensemble to; logged as JSON when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format; guessed from the output extension when omitted
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,

        /// Metric columns to average (comma-separated)
        #[arg(
            short,
            long,
            value_delimiter = ',',
            default_values_t = DEFAULT_METRICS.iter().map(|m| m.to_string()).collect::<Vec<_>>()
        )]
        metrics: Vec<String>,

        /// Only keep these activities (comma-separated); all when omitted
        #[arg(short, long, value_delimiter = ',')]
        activities: Vec<String>,

        /// Lines to skip before the header when there is no endheader marker
        #[arg(long, default_value_t = 0)]
        skip_lines: usize,

        #[arg(long, default_value = "subject_id")]
        subject_column: String,

        #[arg(long, default_value = "activity")]
        activity_column: String,

        #[arg(long, default_value = "gait_perc")]
        gait_column: String,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/payer_tally.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("payer_tally.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Summarize {
            input,
            output,
            format,
            top_n,
            batch_size,
            max_batches,
            category_column,
            measure_column,
            id_column,
            no_id,
            delimiter,
            other_label,
            scale,
        } => {
            let config = SummaryConfig {
                output,
                format,
                columns: ColumnMap {
                    id: (!no_id).then_some(id_column),
                    category: category_column,
                    measure: measure_column,
                },
                delimiter: parse_delimiter(&delimiter)?,
                batch_size,
                max_batches,
                top_n,
                other_label,
                scale,
                ..SummaryConfig::new(input)
            };

            let run = summarize(&config)?;
            if run.truncated {
                warn!(batches = run.batches, "Summary covers a partial read of the input");
            }
            if run.rejected > 0 {
                warn!(
                    rejected = run.rejected,
                    records = run.records,
                    "Some records were malformed and left out"
                );
            }
            write_summary(&config, &run)?;
        }
        Commands::Gait {
            inputs,
            output,
            format,
            metrics,
            activities,
            skip_lines,
            subject_column,
            activity_column,
            gait_column,
        } => {
            let mut config = GaitConfig::new(inputs).with_columns(GaitColumns {
                subject: subject_column,
                activity: activity_column,
                gait_percent: gait_column,
            });
            config.output = output;
            config.format = format;
            config.loader.metrics = metrics;
            config.loader.activities = activities;
            config.loader.skip_lines = skip_lines;

            let run = ensemble(&config)?;
            if run.unsynced_rows > 0 {
                info!(rows = run.unsynced_rows, "Dropped frames outside a gait cycle");
            }
            write_ensemble(&config, &run)?;
        }
    }

    Ok(())
}
