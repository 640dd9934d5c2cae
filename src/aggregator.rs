//! Streaming categorical aggregation.
//!
//! Batches of [`RawRecord`]s are folded into a [`Tally`] one at a time.
//! Malformed records are rejected individually and reported back to the
//! caller; the rest of the batch is still applied.

use tracing::{debug, warn};

use crate::record::{RawRecord, RecordError};
use crate::summary::{DEFAULT_OTHER_LABEL, RankedSummary, SummaryError};
use crate::tally::Tally;

/// Outcome of a single [`StreamingAggregator::ingest`] call.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct IngestReport {
    pub applied: usize,
    pub rejected: Vec<RecordError>,
}

impl IngestReport {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// Owns the running tally plus counters for what it has seen.
#[derive(Debug, Clone)]
pub struct StreamingAggregator {
    tally: Tally,
    other_label: String,
    batches: u64,
    records: u64,
    rejected: u64,
}

impl Default for StreamingAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamingAggregator {
    pub fn new() -> Self {
        Self::with_other_label(DEFAULT_OTHER_LABEL)
    }

    pub fn with_other_label(label: &str) -> Self {
        Self {
            tally: Tally::new(),
            other_label: label.to_string(),
            batches: 0,
            records: 0,
            rejected: 0,
        }
    }

    /// Folds one batch into the tally.
    ///
    /// Every valid record bumps its category's count and adds its measure.
    /// Invalid ones are skipped and listed in the returned report.
    pub fn ingest(&mut self, batch: &[RawRecord]) -> IngestReport {
        let mut report = IngestReport::default();
        if batch.is_empty() {
            return report;
        }

        for (position, record) in batch.iter().enumerate() {
            match record.validate() {
                Ok((category, measure)) => {
                    self.tally.record(category, measure);
                    report.applied += 1;
                }
                Err(reason) => {
                    let err = RecordError {
                        position,
                        id: record.id.clone(),
                        reason,
                    };
                    debug!(error = %err, "Rejected record");
                    report.rejected.push(err);
                }
            }
        }

        self.batches += 1;
        self.records += report.applied as u64;
        self.rejected += report.rejected.len() as u64;

        if !report.is_clean() {
            warn!(
                batch = self.batches,
                applied = report.applied,
                rejected = report.rejected.len(),
                "Batch contained malformed records"
            );
        } else {
            debug!(batch = self.batches, applied = report.applied, "Batch ingested");
        }

        report
    }

    /// Combines another aggregator's totals into this one.
    pub fn merge(&mut self, other: &StreamingAggregator) {
        self.tally.merge(&other.tally);
        self.batches += other.batches;
        self.records += other.records;
        self.rejected += other.rejected;
    }

    /// Builds the ranked summary from the current totals.
    ///
    /// Borrows immutably, so calling it repeatedly yields the same result.
    pub fn finalize(&self, top_n: usize) -> Result<RankedSummary, SummaryError> {
        RankedSummary::from_tally(&self.tally, top_n, &self.other_label)
    }

    pub fn tally(&self) -> &Tally {
        &self.tally
    }

    pub fn batches(&self) -> u64 {
        self.batches
    }

    pub fn records(&self) -> u64 {
        self.records
    }

    pub fn rejected(&self) -> u64 {
        self.rejected
    }
}
