//! End-to-end runs: read input, reduce, write the result table.

use anyhow::{Context, Result};
use chrono::Utc;
use std::fs::File;
use std::io::BufReader;
use tracing::{info, warn};

use crate::aggregator::StreamingAggregator;
use crate::config::{GaitConfig, SummaryConfig};
use crate::gait::{EnsembleAverager, EnsemblePoint};
use crate::output::{
    OutputFormat, SummaryDocument, print_json, print_pretty, summary_lines, write_csv, write_json,
};
use crate::reader::open_path;
use crate::summary::RankedSummary;

/// Result of a payer summary run.
#[derive(Debug, Clone)]
pub struct SummaryRun {
    pub summary: RankedSummary,
    pub rows_read: u64,
    pub batches: u64,
    pub records: u64,
    pub rejected: u64,
    /// Input was cut short by `max_batches`.
    pub truncated: bool,
}

/// Streams the input in batches and ranks the payers.
#[tracing::instrument(
    skip(config),
    fields(input = %config.input.display(), top_n = config.top_n, batch_size = config.batch_size)
)]
pub fn summarize(config: &SummaryConfig) -> Result<SummaryRun> {
    config.validate()?;

    let mut reader = open_path(
        &config.input,
        &config.columns,
        config.batch_size,
        config.delimiter,
    )
    .with_context(|| format!("Failed to open {}", config.input.display()))?;

    let mut aggregator = StreamingAggregator::with_other_label(&config.other_label);
    let mut truncated = false;

    for batch in reader.by_ref() {
        let batch = batch.with_context(|| {
            format!(
                "Failed reading {} after batch {}",
                config.input.display(),
                aggregator.batches()
            )
        })?;
        let report = aggregator.ingest(&batch);
        info!(
            batch = aggregator.batches(),
            rows = batch.len(),
            applied = report.applied,
            rejected = report.rejected.len(),
            "Batch processed"
        );

        if let Some(max) = config.max_batches {
            if aggregator.batches() >= max as u64 {
                truncated = true;
                info!(max_batches = max, "Batch limit reached, stopping early");
                break;
            }
        }
    }

    let summary = aggregator.finalize(config.top_n)?;
    if summary.is_empty() {
        warn!("No valid records were ingested; summary is empty");
    }

    info!(
        rows = reader.rows_read(),
        records = aggregator.records(),
        rejected = aggregator.rejected(),
        distinct = summary.distinct_categories,
        "Aggregation complete"
    );

    Ok(SummaryRun {
        summary,
        rows_read: reader.rows_read(),
        batches: aggregator.batches(),
        records: aggregator.records(),
        rejected: aggregator.rejected(),
        truncated,
    })
}

/// Writes the summary to the configured output, or logs it when none is set.
pub fn write_summary(config: &SummaryConfig, run: &SummaryRun) -> Result<()> {
    let lines = summary_lines(&run.summary, config.scale);
    print_pretty(&lines);

    let Some(path) = &config.output else {
        return print_json(&lines);
    };

    match config.effective_format() {
        OutputFormat::Csv => {
            write_csv(path, &lines)?;
        }
        OutputFormat::Json => {
            let source = config.input.display().to_string();
            let doc = SummaryDocument {
                generated_at: Utc::now(),
                source: &source,
                records: run.records,
                rejected: run.rejected,
                distinct_categories: run.summary.distinct_categories,
                scale: config.scale,
                rows: lines,
            };
            write_json(path, &doc)?;
        }
    }

    info!(path = %path.display(), "Summary written");
    Ok(())
}

/// Result of a gait ensemble run.
#[derive(Debug, Clone, Default)]
pub struct GaitRun {
    pub points: Vec<EnsemblePoint>,
    pub files: usize,
    pub samples: u64,
    pub unsynced_rows: u64,
    pub filtered_rows: u64,
    pub skipped_values: u64,
}

/// Loads every input table and ensemble-averages the selected metrics.
#[tracing::instrument(skip(config), fields(files = config.inputs.len()))]
pub fn ensemble(config: &GaitConfig) -> Result<GaitRun> {
    config.validate()?;

    let mut averager = EnsembleAverager::new();
    let mut run = GaitRun::default();

    for path in &config.inputs {
        let file = File::open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let table = config
            .loader
            .load(BufReader::new(file))
            .with_context(|| format!("Failed to load {}", path.display()))?;

        averager.observe_all(&table.samples);
        run.files += 1;
        run.samples += table.samples.len() as u64;
        run.unsynced_rows += table.unsynced_rows;
        run.filtered_rows += table.filtered_rows;
        run.skipped_values += table.skipped_values;
    }

    if averager.is_empty() {
        warn!("No gait samples survived filtering");
    }

    run.points = averager.finish();
    info!(
        files = run.files,
        samples = run.samples,
        points = run.points.len(),
        "Ensemble complete"
    );
    Ok(run)
}

pub fn write_ensemble(config: &GaitConfig, run: &GaitRun) -> Result<()> {
    let Some(path) = &config.output else {
        return print_json(&run.points);
    };

    match config.effective_format() {
        OutputFormat::Csv => {
            write_csv(path, &run.points)?;
        }
        OutputFormat::Json => write_json(path, &run.points)?,
    }

    info!(path = %path.display(), "Ensemble written");
    Ok(())
}
