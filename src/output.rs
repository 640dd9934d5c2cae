//! Output formatting and persistence for result tables.
//!
//! Supports pretty-printing to the log, JSON serialization, and CSV files.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::summary::RankedSummary;
use csv::WriterBuilder;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Output file format selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

impl OutputFormat {
    /// Picks a format from the file extension, falling back to CSV.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => OutputFormat::Json,
            _ => OutputFormat::Csv,
        }
    }
}

/// A summary row as written out, with the display divisor applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryLine {
    pub rank: Option<usize>,
    pub category: String,
    pub count: f64,
    pub sum: f64,
}

/// Envelope written for JSON summaries.
#[derive(Debug, Serialize)]
pub struct SummaryDocument<'a> {
    pub generated_at: DateTime<Utc>,
    pub source: &'a str,
    pub records: u64,
    pub rejected: u64,
    pub distinct_categories: usize,
    pub scale: f64,
    pub rows: Vec<SummaryLine>,
}

/// Presentation view of `summary`, each count and sum divided by `scale`.
///
/// The summary itself is left untouched.
pub fn summary_lines(summary: &RankedSummary, scale: f64) -> Vec<SummaryLine> {
    summary
        .rows()
        .map(|row| SummaryLine {
            rank: row.rank,
            category: row.category.clone(),
            count: row.count as f64 / scale,
            sum: row.sum / scale,
        })
        .collect()
}

/// Logs a value using Rust's debug pretty-print format.
pub fn print_pretty<T: std::fmt::Debug>(value: &T) {
    debug!("{:#?}", value);
}

/// Logs a value as pretty-printed JSON.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Writes `rows` to a fresh CSV file at `path`, header first.
pub fn write_csv<T, I>(path: &Path, rows: I) -> Result<usize>
where
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    let file = File::create(path)
        .with_context(|| format!("Failed to create output file {}", path.display()))?;
    let mut writer = WriterBuilder::new().has_headers(true).from_writer(file);

    let mut written = 0;
    for row in rows {
        writer.serialize(row)?;
        written += 1;
    }
    writer.flush()?;

    debug!(path = %path.display(), written, "CSV written");
    Ok(written)
}

/// Writes `value` as pretty JSON to `path`.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut file = File::create(path)
        .with_context(|| format!("Failed to create output file {}", path.display()))?;
    serde_json::to_writer_pretty(&mut file, value)?;
    file.write_all(b"\n")?;

    debug!(path = %path.display(), "JSON written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::DEFAULT_OTHER_LABEL;
    use crate::tally::Tally;
    use std::fs;

    fn sample_summary() -> RankedSummary {
        let mut tally = Tally::new();
        tally.record("A", 2_000_000.0);
        tally.record("A", 1_000_000.0);
        tally.record("B", 500_000.0);
        tally.record("C", 250_000.0);
        RankedSummary::from_tally(&tally, 1, DEFAULT_OTHER_LABEL).unwrap()
    }

    #[test]
    fn test_print_pretty_does_not_panic() {
        print_pretty(&sample_summary());
    }

    #[test]
    fn test_print_json_does_not_panic() {
        print_json(&sample_summary()).unwrap();
    }

    #[test]
    fn test_summary_lines_apply_scale() {
        let lines = summary_lines(&sample_summary(), 1_000_000.0);

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].category, "A");
        assert_eq!(lines[0].sum, 3.0);
        assert_eq!(lines[1].category, "Other");
        assert_eq!(lines[1].rank, None);
        assert_eq!(lines[1].sum, 0.75);
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(OutputFormat::from_path(Path::new("out.json")), OutputFormat::Json);
        assert_eq!(OutputFormat::from_path(Path::new("out.csv")), OutputFormat::Csv);
        assert_eq!(OutputFormat::from_path(Path::new("out")), OutputFormat::Csv);
    }

    #[test]
    fn test_write_csv_has_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.csv");

        let written = write_csv(&path, summary_lines(&sample_summary(), 1.0)).unwrap();
        assert_eq!(written, 2);

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "rank,category,count,sum");
        assert!(lines[2].starts_with(",Other,"));
    }

    #[test]
    fn test_write_json_round_trips_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");

        let doc = SummaryDocument {
            generated_at: Utc::now(),
            source: "payments.csv",
            records: 4,
            rejected: 0,
            distinct_categories: 3,
            scale: 1.0,
            rows: summary_lines(&sample_summary(), 1.0),
        };
        write_json(&path, &doc).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["records"], 4);
        assert_eq!(value["rows"][0]["category"], "A");
        assert_eq!(value["rows"][1]["rank"], serde_json::Value::Null);
    }
}
