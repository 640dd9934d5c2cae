//! Running per-category totals.

use serde::Serialize;
use std::collections::HashMap;

/// Count and sum accumulated for one category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CategoryTotals {
    pub count: u64,
    pub sum: f64,
}

impl CategoryTotals {
    pub fn add(&mut self, measure: f64) {
        self.count += 1;
        self.sum += measure;
    }

    pub fn absorb(&mut self, other: &CategoryTotals) {
        self.count += other.count;
        self.sum += other.sum;
    }
}

/// Mapping from category key to its [`CategoryTotals`].
///
/// Keys are case-sensitive and only ever grow; nothing is decremented or
/// removed once inserted.
#[derive(Debug, Clone, Default)]
pub struct Tally {
    totals: HashMap<String, CategoryTotals>,
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one observation, inserting the key at zero on first sight.
    pub fn record(&mut self, category: &str, measure: f64) {
        // get_mut first so repeated keys don't allocate a String per row
        if let Some(totals) = self.totals.get_mut(category) {
            totals.add(measure);
        } else {
            let mut totals = CategoryTotals::default();
            totals.add(measure);
            self.totals.insert(category.to_string(), totals);
        }
    }

    /// Pairwise additive combination with another tally.
    pub fn merge(&mut self, other: &Tally) {
        for (key, totals) in &other.totals {
            self.totals.entry(key.clone()).or_default().absorb(totals);
        }
    }

    pub fn get(&self, category: &str) -> Option<&CategoryTotals> {
        self.totals.get(category)
    }

    pub fn distinct(&self) -> usize {
        self.totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CategoryTotals)> {
        self.totals.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Totals over every category.
    pub fn grand_total(&self) -> CategoryTotals {
        let mut total = CategoryTotals::default();
        for totals in self.totals.values() {
            total.absorb(totals);
        }
        total
    }
}
