//! Validated run settings for both pipelines.
//!
//! The CLI fills these in; [`SummaryConfig::validate`] and
//! [`GaitConfig::validate`] run before any input file is opened.

use std::path::PathBuf;
use thiserror::Error;

use crate::gait::{GaitColumns, GaitLoader};
use crate::output::OutputFormat;
use crate::reader::ColumnMap;
use crate::summary::DEFAULT_OTHER_LABEL;

/// Rows per batch used by the original chunked load.
pub const DEFAULT_BATCH_SIZE: usize = 1_000_000;
pub const DEFAULT_TOP_N: usize = 10;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("top-n must be at least 1")]
    ZeroTopN,
    #[error("batch size must be at least 1")]
    ZeroBatchSize,
    #[error("max batches must be at least 1 when set")]
    ZeroMaxBatches,
    #[error("scale must be a positive number, got {0}")]
    BadScale(f64),
    #[error("delimiter must be a single ASCII character, got '{0}'")]
    BadDelimiter(String),
    #[error("at least one metric must be selected")]
    NoMetrics,
    #[error("other label must not be empty")]
    EmptyOtherLabel,
}

/// Parses a one-character delimiter; `\t` and `tab` both mean a tab.
pub fn parse_delimiter(raw: &str) -> Result<u8, ConfigError> {
    match raw {
        "\\t" | "tab" => Ok(b'\t'),
        s if s.len() == 1 && s.is_ascii() => Ok(s.as_bytes()[0]),
        other => Err(ConfigError::BadDelimiter(other.to_string())),
    }
}

/// Settings for the payer summary pipeline.
#[derive(Debug, Clone)]
pub struct SummaryConfig {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub format: Option<OutputFormat>,
    pub columns: ColumnMap,
    pub delimiter: u8,
    pub batch_size: usize,
    pub max_batches: Option<usize>,
    pub top_n: usize,
    pub other_label: String,
    pub scale: f64,
}

impl SummaryConfig {
    pub fn new(input: PathBuf) -> Self {
        Self {
            input,
            output: None,
            format: None,
            columns: ColumnMap::default(),
            delimiter: b',',
            batch_size: DEFAULT_BATCH_SIZE,
            max_batches: None,
            top_n: DEFAULT_TOP_N,
            other_label: DEFAULT_OTHER_LABEL.to_string(),
            scale: 1.0,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.top_n == 0 {
            return Err(ConfigError::ZeroTopN);
        }
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if self.max_batches == Some(0) {
            return Err(ConfigError::ZeroMaxBatches);
        }
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(ConfigError::BadScale(self.scale));
        }
        if self.other_label.trim().is_empty() {
            return Err(ConfigError::EmptyOtherLabel);
        }
        Ok(())
    }

    /// Explicit format if one was given, otherwise guessed from the output path.
    pub fn effective_format(&self) -> OutputFormat {
        match (self.format, &self.output) {
            (Some(format), _) => format,
            (None, Some(path)) => OutputFormat::from_path(path),
            (None, None) => OutputFormat::default(),
        }
    }
}

/// Settings for the gait ensemble pipeline.
#[derive(Debug, Clone)]
pub struct GaitConfig {
    pub inputs: Vec<PathBuf>,
    pub output: Option<PathBuf>,
    pub format: Option<OutputFormat>,
    pub loader: GaitLoader,
}

impl GaitConfig {
    pub fn new(inputs: Vec<PathBuf>) -> Self {
        Self {
            inputs,
            output: None,
            format: None,
            loader: GaitLoader::default(),
        }
    }

    pub fn with_columns(mut self, columns: GaitColumns) -> Self {
        self.loader.columns = columns;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.loader.metrics.is_empty() {
            return Err(ConfigError::NoMetrics);
        }
        Ok(())
    }

    pub fn effective_format(&self) -> OutputFormat {
        match (self.format, &self.output) {
            (Some(format), _) => format,
            (None, Some(path)) => OutputFormat::from_path(path),
            (None, None) => OutputFormat::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SummaryConfig::new(PathBuf::from("payments.csv"));
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.top_n, 10);
        assert_eq!(config.batch_size, 1_000_000);
    }

    #[test]
    fn test_rejects_zero_values() {
        let mut config = SummaryConfig::new(PathBuf::from("p.csv"));
        config.top_n = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroTopN));

        config.top_n = 5;
        config.batch_size = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroBatchSize));

        config.batch_size = 10;
        config.max_batches = Some(0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroMaxBatches));
    }

    #[test]
    fn test_rejects_bad_scale() {
        let mut config = SummaryConfig::new(PathBuf::from("p.csv"));
        config.scale = 0.0;
        assert_eq!(config.validate(), Err(ConfigError::BadScale(0.0)));
    }

    #[test]
    fn test_parse_delimiter() {
        assert_eq!(parse_delimiter(","), Ok(b','));
        assert_eq!(parse_delimiter("tab"), Ok(b'\t'));
        assert_eq!(parse_delimiter("\\t"), Ok(b'\t'));
        assert!(parse_delimiter(";;").is_err());
    }

    #[test]
    fn test_effective_format() {
        let mut config = SummaryConfig::new(PathBuf::from("p.csv"));
        assert_eq!(config.effective_format(), OutputFormat::Csv);

        config.output = Some(PathBuf::from("summary.json"));
        assert_eq!(config.effective_format(), OutputFormat::Json);

        config.format = Some(OutputFormat::Csv);
        assert_eq!(config.effective_format(), OutputFormat::Csv);
    }

    #[test]
    fn test_gait_requires_metrics() {
        let mut config = GaitConfig::new(vec![PathBuf::from("s001.tsv")]);
        assert_eq!(config.validate(), Ok(()));

        config.loader.metrics.clear();
        assert_eq!(config.validate(), Err(ConfigError::NoMetrics));
    }
}
