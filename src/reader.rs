//! Batched CSV reader with column projection.
//!
//! Only the id, category and measure columns are pulled out of each row, so
//! memory stays bounded by the batch size regardless of how wide or long the
//! source file is.

use csv::{ReaderBuilder, StringRecord};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use crate::record::RawRecord;

/// Column names for the CMS Open Payments general-payments export.
pub const DEFAULT_ID_COLUMN: &str = "Record_ID";
pub const DEFAULT_CATEGORY_COLUMN: &str =
    "Submitting_Applicable_Manufacturer_or_Applicable_GPO_Name";
pub const DEFAULT_MEASURE_COLUMN: &str = "Total_Amount_of_Payment_USDollars";

#[derive(Debug, Error)]
pub enum ReadError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error("column '{0}' not found in header")]
    MissingColumn(String),
    #[error("batch size must be at least 1")]
    InvalidBatchSize,
}

/// Which header names feed the [`RawRecord`] fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    pub id: Option<String>,
    pub category: String,
    pub measure: String,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            id: Some(DEFAULT_ID_COLUMN.to_string()),
            category: DEFAULT_CATEGORY_COLUMN.to_string(),
            measure: DEFAULT_MEASURE_COLUMN.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Projection {
    id: Option<usize>,
    category: usize,
    measure: usize,
}

impl Projection {
    fn resolve(headers: &StringRecord, columns: &ColumnMap) -> Result<Self, ReadError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| ReadError::MissingColumn(name.to_string()))
        };

        Ok(Self {
            id: columns.id.as_deref().map(find).transpose()?,
            category: find(columns.category.as_str())?,
            measure: find(columns.measure.as_str())?,
        })
    }

    fn project(&self, row: &StringRecord) -> RawRecord {
        let field = |i: usize| row.get(i).filter(|v| !v.is_empty()).map(str::to_string);
        RawRecord {
            id: self.id.and_then(field),
            category: field(self.category),
            measure: field(self.measure),
        }
    }
}

/// Finite, non-restartable iterator of record batches.
///
/// Stops for good after the first read error.
pub struct BatchReader<R: Read> {
    rdr: csv::Reader<R>,
    projection: Projection,
    batch_size: usize,
    row: StringRecord,
    rows_read: u64,
    done: bool,
}

impl<R: Read> BatchReader<R> {
    pub fn new(
        reader: R,
        columns: &ColumnMap,
        batch_size: usize,
        delimiter: u8,
    ) -> Result<Self, ReadError> {
        if batch_size == 0 {
            return Err(ReadError::InvalidBatchSize);
        }

        let mut rdr = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .from_reader(reader);

        let projection = Projection::resolve(rdr.headers()?, columns)?;
        debug!(?projection, batch_size, "Resolved column projection");

        Ok(Self {
            rdr,
            projection,
            batch_size,
            row: StringRecord::new(),
            rows_read: 0,
            done: false,
        })
    }

    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    fn next_batch(&mut self) -> Result<Vec<RawRecord>, ReadError> {
        let mut batch = Vec::with_capacity(self.batch_size.min(64 * 1024));
        while batch.len() < self.batch_size {
            if !self.rdr.read_record(&mut self.row)? {
                self.done = true;
                break;
            }
            self.rows_read += 1;
            batch.push(self.projection.project(&self.row));
        }
        Ok(batch)
    }
}

impl<R: Read> Iterator for BatchReader<R> {
    type Item = Result<Vec<RawRecord>, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.next_batch() {
            Ok(batch) if batch.is_empty() => None,
            Ok(batch) => Some(Ok(batch)),
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Opens `path` for batched reading, decompressing `.gz` files on the fly.
pub fn open_path(
    path: &Path,
    columns: &ColumnMap,
    batch_size: usize,
    delimiter: u8,
) -> Result<BatchReader<Box<dyn Read>>, ReadError> {
    let file = BufReader::new(File::open(path)?);
    let is_gzip = path.extension().and_then(|e| e.to_str()) == Some("gz");
    debug!(path = %path.display(), is_gzip, "Opening input");

    let source: Box<dyn Read> = if is_gzip {
        Box::new(MultiGzDecoder::new(file))
    } else {
        Box::new(file)
    };

    BatchReader::new(source, columns, batch_size, delimiter)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Record_ID,Physician_Specialty,Submitting_Applicable_Manufacturer_or_Applicable_GPO_Name,Total_Amount_of_Payment_USDollars
1,Cardiology,Acme Pharma,12.50
2,Oncology,Beta Devices,100
3,,Acme Pharma,
4,Oncology,,7.25
5,Oncology,Acme Pharma,3
";

    fn reader(batch_size: usize) -> BatchReader<&'static [u8]> {
        BatchReader::new(SAMPLE.as_bytes(), &ColumnMap::default(), batch_size, b',').unwrap()
    }

    #[test]
    fn test_projects_configured_columns() {
        let batches: Vec<_> = reader(10).collect::<Result<_, _>>().unwrap();

        assert_eq!(batches.len(), 1);
        assert_eq!(
            batches[0][0],
            RawRecord::new(Some("1"), Some("Acme Pharma"), Some("12.50"))
        );
        assert_eq!(batches[0][2].measure, None);
        assert_eq!(batches[0][3].category, None);
    }

    #[test]
    fn test_splits_into_batches() {
        let mut rdr = reader(2);
        let sizes: Vec<_> = rdr.by_ref().map(|b| b.unwrap().len()).collect();

        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(rdr.rows_read(), 5);
        assert!(rdr.next().is_none());
    }

    #[test]
    fn test_exact_multiple_has_no_trailing_empty_batch() {
        let data = "cat,amt\nA,1\nB,2\n";
        let columns = ColumnMap {
            id: None,
            category: "cat".to_string(),
            measure: "amt".to_string(),
        };
        let sizes: Vec<_> = BatchReader::new(data.as_bytes(), &columns, 2, b',')
            .unwrap()
            .map(|b| b.unwrap().len())
            .collect();

        assert_eq!(sizes, vec![2]);
    }

    #[test]
    fn test_missing_column_is_an_error() {
        let columns = ColumnMap {
            id: None,
            category: "payer".to_string(),
            measure: "amount".to_string(),
        };
        let err = BatchReader::new(SAMPLE.as_bytes(), &columns, 10, b',').err().unwrap();
        assert!(matches!(err, ReadError::MissingColumn(name) if name == "payer"));
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let err = BatchReader::new(SAMPLE.as_bytes(), &ColumnMap::default(), 0, b',')
            .err()
            .unwrap();
        assert!(matches!(err, ReadError::InvalidBatchSize));
    }

    #[test]
    fn test_ragged_row_stops_iteration() {
        let data = "cat,amt\nA,1\nB,2,extra\nC,3\n";
        let columns = ColumnMap {
            id: None,
            category: "cat".to_string(),
            measure: "amt".to_string(),
        };
        let mut rdr = BatchReader::new(data.as_bytes(), &columns, 10, b',').unwrap();

        assert!(matches!(rdr.next(), Some(Err(ReadError::Csv(_)))));
        assert!(rdr.next().is_none());
    }

    #[test]
    fn test_tab_delimited() {
        let data = "cat\tamt\nA\t1.5\n";
        let columns = ColumnMap {
            id: None,
            category: "cat".to_string(),
            measure: "amt".to_string(),
        };
        let batch = BatchReader::new(data.as_bytes(), &columns, 10, b'\t')
            .unwrap()
            .next()
            .unwrap()
            .unwrap();

        assert_eq!(batch[0], RawRecord::new(None, Some("A"), Some("1.5")));
    }
}
