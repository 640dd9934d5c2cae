//! Record shape shared by the reader and the aggregator.

use serde::Serialize;
use std::fmt;

/// One row as delivered by a reader, before coercion.
///
/// Category and measure stay as raw text so a bad value is reported for that
/// row alone instead of failing the whole batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RawRecord {
    pub id: Option<String>,
    pub category: Option<String>,
    pub measure: Option<String>,
}

impl RawRecord {
    pub fn new(id: Option<&str>, category: Option<&str>, measure: Option<&str>) -> Self {
        Self {
            id: id.map(str::to_string),
            category: category.map(str::to_string),
            measure: measure.map(str::to_string),
        }
    }

    /// Shorthand for a well-formed record with no id.
    pub fn valid(category: &str, measure: f64) -> Self {
        Self::new(None, Some(category), Some(&measure.to_string()))
    }

    /// Coerces the raw fields into a category key and a finite measure.
    pub fn validate(&self) -> Result<(&str, f64), MalformedReason> {
        // keys are taken verbatim; only blank ones are rejected
        let category = match self.category.as_deref() {
            Some(c) if !c.trim().is_empty() => c,
            _ => return Err(MalformedReason::MissingCategory),
        };

        let raw = match self.measure.as_deref().map(str::trim) {
            Some(m) if !m.is_empty() => m,
            _ => return Err(MalformedReason::MissingMeasure),
        };

        match raw.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok((category, v)),
            _ => Err(MalformedReason::NonNumericMeasure(raw.to_string())),
        }
    }
}

/// Why a record was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MalformedReason {
    MissingCategory,
    MissingMeasure,
    NonNumericMeasure(String),
}

impl fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedReason::MissingCategory => write!(f, "missing category"),
            MalformedReason::MissingMeasure => write!(f, "missing measure"),
            MalformedReason::NonNumericMeasure(raw) => write!(f, "non-numeric measure '{raw}'"),
        }
    }
}

/// A rejected record and where it sat in its batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordError {
    pub position: usize,
    pub id: Option<String>,
    pub reason: MalformedReason,
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "record {} (id {id}): {}", self.position, self.reason),
            None => write!(f, "record {}: {}", self.position, self.reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_numeric() {
        let record = RawRecord::new(Some("1"), Some("Acme"), Some(" 12.50 "));
        assert_eq!(record.validate(), Ok(("Acme", 12.5)));
    }

    #[test]
    fn test_validate_missing_category() {
        assert_eq!(
            RawRecord::new(None, None, Some("1")).validate(),
            Err(MalformedReason::MissingCategory)
        );
        assert_eq!(
            RawRecord::new(None, Some("   "), Some("1")).validate(),
            Err(MalformedReason::MissingCategory)
        );
    }

    #[test]
    fn test_validate_bad_measure() {
        assert_eq!(
            RawRecord::new(None, Some("A"), None).validate(),
            Err(MalformedReason::MissingMeasure)
        );
        assert_eq!(
            RawRecord::new(None, Some("A"), Some("bad")).validate(),
            Err(MalformedReason::NonNumericMeasure("bad".to_string()))
        );
        assert_eq!(
            RawRecord::new(None, Some("A"), Some("NaN")).validate(),
            Err(MalformedReason::NonNumericMeasure("NaN".to_string()))
        );
    }

    #[test]
    fn test_record_error_display() {
        let err = RecordError {
            position: 3,
            id: Some("r-9".to_string()),
            reason: MalformedReason::MissingMeasure,
        };
        assert_eq!(err.to_string(), "record 3 (id r-9): missing measure");
    }
}
