//! Loads gait-annotated kinematics tables.
//!
//! The input is a tab-delimited table with identity columns (subject,
//! activity, gait percent) followed by one column per joint angle. OpenSim
//! style preambles ending in an `endheader` line are skipped automatically.

use csv::{ReaderBuilder, StringRecord, Trim};
use serde::Serialize;
use std::io::Read;
use thiserror::Error;
use tracing::{debug, info};

use super::{DEFAULT_METRICS, UNSYNCED_GAIT_PERCENT};

#[derive(Debug, Error)]
pub enum GaitError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error("column '{0}' not found in header")]
    MissingColumn(String),
    #[error("line {line}: missing value for '{column}'")]
    MissingField { line: u64, column: String },
    #[error("line {line}: gait percent '{value}' is not a number")]
    BadGaitPercent { line: u64, value: String },
}

/// Names of the identity columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GaitColumns {
    pub subject: String,
    pub activity: String,
    pub gait_percent: String,
}

impl Default for GaitColumns {
    fn default() -> Self {
        Self {
            subject: "subject_id".to_string(),
            activity: "activity".to_string(),
            gait_percent: "gait_perc".to_string(),
        }
    }
}

/// One metric value at one synchronised frame, in long form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GaitSample {
    pub subject: String,
    pub activity: String,
    pub gait_percent: i64,
    pub metric: String,
    pub value: f64,
}

/// Samples kept after filtering, plus what was dropped on the way.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct GaitTable {
    pub samples: Vec<GaitSample>,
    pub rows_read: u64,
    pub unsynced_rows: u64,
    pub filtered_rows: u64,
    pub skipped_values: u64,
}

/// Reads a kinematics table and melts the selected metrics to long form.
#[derive(Debug, Clone)]
pub struct GaitLoader {
    pub columns: GaitColumns,
    pub metrics: Vec<String>,
    pub activities: Vec<String>,
    pub skip_lines: usize,
}

impl Default for GaitLoader {
    fn default() -> Self {
        Self {
            columns: GaitColumns::default(),
            metrics: DEFAULT_METRICS.iter().map(|m| m.to_string()).collect(),
            activities: Vec::new(),
            skip_lines: 0,
        }
    }
}

struct Layout {
    subject: usize,
    activity: usize,
    gait_percent: usize,
    metrics: Vec<(usize, String)>,
}

impl GaitLoader {
    /// Loads every row of `reader`.
    ///
    /// Rows whose gait percent is the unsynced sentinel are dropped, as are
    /// rows for activities outside the configured list (when one is set).
    /// Metric cells that are blank or non-numeric are skipped and counted.
    pub fn load<R: Read>(&self, mut reader: R) -> Result<GaitTable, GaitError> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        let (body, preamble_lines) = self.strip_preamble(&text);

        let mut rdr = ReaderBuilder::new()
            .delimiter(b'\t')
            .trim(Trim::All)
            .has_headers(true)
            .from_reader(body.as_bytes());

        let layout = self.layout(rdr.headers()?)?;
        let mut table = GaitTable::default();
        let mut row = StringRecord::new();

        while rdr.read_record(&mut row)? {
            table.rows_read += 1;
            // csv counts from the header; report lines of the whole file
            let line = row.position().map(|p| p.line()).unwrap_or(table.rows_read + 1)
                + preamble_lines;

            let raw_pct = required(&row, layout.gait_percent, &self.columns.gait_percent, line)?;
            let pct = match raw_pct.parse::<f64>() {
                Ok(pct) if pct.is_finite() => pct,
                _ => {
                    return Err(GaitError::BadGaitPercent {
                        line,
                        value: raw_pct.to_string(),
                    });
                }
            };
            if pct == UNSYNCED_GAIT_PERCENT {
                table.unsynced_rows += 1;
                continue;
            }

            let activity = required(&row, layout.activity, &self.columns.activity, line)?;
            if !self.activities.is_empty() && !self.activities.iter().any(|a| a == activity) {
                table.filtered_rows += 1;
                continue;
            }
            let subject = required(&row, layout.subject, &self.columns.subject, line)?;

            for (index, metric) in &layout.metrics {
                match row.get(*index).and_then(|v| v.parse::<f64>().ok()) {
                    Some(value) if value.is_finite() => table.samples.push(GaitSample {
                        subject: subject.to_string(),
                        activity: activity.to_string(),
                        gait_percent: pct.trunc() as i64,
                        metric: metric.clone(),
                        value,
                    }),
                    _ => table.skipped_values += 1,
                }
            }
        }

        info!(
            rows = table.rows_read,
            samples = table.samples.len(),
            unsynced = table.unsynced_rows,
            filtered = table.filtered_rows,
            skipped = table.skipped_values,
            "Gait table loaded"
        );
        Ok(table)
    }

    /// Returns the text after the preamble and how many lines were dropped.
    fn strip_preamble<'a>(&self, text: &'a str) -> (&'a str, u64) {
        let mut offset = 0;
        for (i, line) in text.split_inclusive('\n').enumerate() {
            offset += line.len();
            if line.trim().eq_ignore_ascii_case("endheader") {
                debug!(offset, "Skipping preamble up to endheader");
                return (&text[offset..], i as u64 + 1);
            }
        }

        let mut offset = 0;
        let mut skipped = 0;
        for line in text.split_inclusive('\n').take(self.skip_lines) {
            offset += line.len();
            skipped += 1;
        }
        (&text[offset..], skipped)
    }

    fn layout(&self, headers: &StringRecord) -> Result<Layout, GaitError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| GaitError::MissingColumn(name.to_string()))
        };

        let metrics = self
            .metrics
            .iter()
            .map(|m| find(m.as_str()).map(|i| (i, m.clone())))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Layout {
            subject: find(self.columns.subject.as_str())?,
            activity: find(self.columns.activity.as_str())?,
            gait_percent: find(self.columns.gait_percent.as_str())?,
            metrics,
        })
    }
}

fn required<'r>(
    row: &'r StringRecord,
    index: usize,
    column: &str,
    line: u64,
) -> Result<&'r str, GaitError> {
    match row.get(index) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(GaitError::MissingField {
            line,
            column: column.to_string(),
        }),
    }
}
