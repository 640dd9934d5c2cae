//! Ranked top-N summary with a collapsed "Other" bucket.

use serde::Serialize;
use std::cmp::Ordering;
use thiserror::Error;

use crate::tally::{CategoryTotals, Tally};

/// Label given to the collapsed bucket when none is configured.
pub const DEFAULT_OTHER_LABEL: &str = "Other";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SummaryError {
    #[error("top_n must be at least 1, got {0}")]
    InvalidTopN(usize),
}

/// One line of a [`RankedSummary`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    /// 1-based rank; `None` for the collapsed bucket.
    pub rank: Option<usize>,
    pub category: String,
    pub count: u64,
    pub sum: f64,
}

/// Top-N categories by count plus everything else folded into one bucket.
///
/// Built once from a frozen [`Tally`] and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedSummary {
    pub top_n: usize,
    pub distinct_categories: usize,
    pub top: Vec<SummaryRow>,
    pub other: SummaryRow,
}

impl RankedSummary {
    /// Ranks `tally` by count descending, ties broken by key ascending.
    ///
    /// # Errors
    ///
    /// Returns [`SummaryError::InvalidTopN`] when `top_n` is zero.
    pub fn from_tally(
        tally: &Tally,
        top_n: usize,
        other_label: &str,
    ) -> Result<Self, SummaryError> {
        if top_n == 0 {
            return Err(SummaryError::InvalidTopN(top_n));
        }

        let mut ranked: Vec<(&str, &CategoryTotals)> = tally.iter().collect();
        ranked.sort_by(|a, b| by_count_then_key(*a, *b));

        let mut other = CategoryTotals::default();
        for (_, totals) in ranked.iter().skip(top_n) {
            other.absorb(totals);
        }

        let top = ranked
            .iter()
            .take(top_n)
            .enumerate()
            .map(|(i, (category, totals))| SummaryRow {
                rank: Some(i + 1),
                category: category.to_string(),
                count: totals.count,
                sum: totals.sum,
            })
            .collect();

        Ok(Self {
            top_n,
            distinct_categories: tally.distinct(),
            top,
            other: SummaryRow {
                rank: None,
                category: other_label.to_string(),
                count: other.count,
                sum: other.sum,
            },
        })
    }

    /// True when no record was ever tallied.
    pub fn is_empty(&self) -> bool {
        self.distinct_categories == 0
    }

    /// Rows in presentation order: the top entries, then the collapsed
    /// bucket if anything fell outside the top-N.
    pub fn rows(&self) -> impl Iterator<Item = &SummaryRow> {
        let other = (self.distinct_categories > self.top.len()).then_some(&self.other);
        self.top.iter().chain(other)
    }

    pub fn total_count(&self) -> u64 {
        self.top.iter().map(|r| r.count).sum::<u64>() + self.other.count
    }

    pub fn total_sum(&self) -> f64 {
        self.top.iter().map(|r| r.sum).sum::<f64>() + self.other.sum
    }
}

fn by_count_then_key(a: (&str, &CategoryTotals), b: (&str, &CategoryTotals)) -> Ordering {
    b.1.count.cmp(&a.1.count).then_with(|| a.0.cmp(b.0))
}
