//! Table storage (Arrow/Parquet/CSV)
//!
//! Datasets are read whole into Arrow record batches. The format is picked
//! from the file extension: `.parquet` goes through the Parquet reader,
//! everything else is read as CSV with a header row and an inferred schema.

use crate::{Error, Result};
use arrow::compute::concat_batches;
use arrow::csv::reader::Format;
use arrow::csv::ReaderBuilder;
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

/// Rows per batch when reading CSV
pub const CSV_BATCH_SIZE: usize = 8192;

/// Rows sampled for CSV schema inference
const SCHEMA_INFERENCE_ROWS: usize = 1000;

/// In-memory table made of one or more record batches sharing a schema
#[derive(Debug, Clone)]
pub struct StorageEngine {
    batches: Vec<RecordBatch>,
}

impl StorageEngine {
    /// Create a new storage engine from existing batches
    ///
    /// Useful for testing and benchmarking
    #[must_use]
    pub fn new(batches: Vec<RecordBatch>) -> Self {
        Self { batches }
    }

    /// Load a table, choosing the reader from the file extension
    ///
    /// # Errors
    /// Returns [`Error::Data`] if the file is missing or cannot be parsed
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let is_parquet = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("parquet"));

        if is_parquet {
            Self::load_parquet(path)
        } else {
            Self::load_csv(path)
        }
    }

    /// Load table from a CSV file with a header row
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut file = open_dataset(path)?;

        let (schema, sampled) = Format::default()
            .with_header(true)
            .infer_schema(&mut file, Some(SCHEMA_INFERENCE_ROWS))
            .map_err(|e| Error::Data(format!("Failed to infer CSV schema of {}: {e}", path.display())))?;
        file.seek(SeekFrom::Start(0))?;
        tracing::debug!(path = %path.display(), sampled, columns = schema.fields().len(), "inferred CSV schema");

        let reader = ReaderBuilder::new(Arc::new(schema))
            .with_header(true)
            .with_batch_size(CSV_BATCH_SIZE)
            .build(file)
            .map_err(|e| Error::Data(format!("Failed to create CSV reader: {e}")))?;

        let mut storage = Self::new(Vec::new());
        for batch in reader {
            let batch = batch
                .map_err(|e| Error::Data(format!("Failed to read CSV record batch: {e}")))?;
            storage.append_batch(batch)?;
        }

        Ok(storage)
    }

    /// Load table from Parquet file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load_parquet<P: AsRef<Path>>(path: P) -> Result<Self> {
        use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

        let file = open_dataset(path.as_ref())?;

        let builder = ParquetRecordBatchReaderBuilder::try_new(file).map_err(|e| {
            Error::Data(format!("Failed to parse Parquet file: {e}"))
        })?;

        let reader = builder.build().map_err(|e| {
            Error::Data(format!("Failed to create Parquet reader: {e}"))
        })?;

        // Read all batches into memory
        let mut storage = Self::new(Vec::new());
        for batch in reader {
            let batch = batch.map_err(|e| {
                Error::Data(format!("Failed to read record batch: {e}"))
            })?;
            storage.append_batch(batch)?;
        }

        Ok(storage)
    }

    /// Get all record batches
    #[must_use]
    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    /// Total number of rows across batches
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }

    /// Schema shared by all batches, if any batch exists
    #[must_use]
    pub fn schema(&self) -> Option<SchemaRef> {
        self.batches.first().map(RecordBatch::schema)
    }

    /// Append a batch, keeping every batch on one schema
    ///
    /// # Errors
    ///
    /// Returns error if batch schema doesn't match existing batches
    pub fn append_batch(&mut self, batch: RecordBatch) -> Result<()> {
        if let Some(existing_schema) = self.schema() {
            if batch.schema() != existing_schema {
                return Err(Error::Data(format!(
                    "Schema mismatch: expected {:?}, got {:?}",
                    existing_schema,
                    batch.schema()
                )));
            }
        }

        self.batches.push(batch);
        Ok(())
    }

    /// Concatenate all batches into a single batch
    ///
    /// # Errors
    /// Returns [`Error::Data`] if the table holds no batches
    pub fn to_single_batch(&self) -> Result<RecordBatch> {
        let schema = self
            .schema()
            .ok_or_else(|| Error::Data("Table contains no record batches".to_string()))?;
        Ok(concat_batches(&schema, &self.batches)?)
    }
}

fn open_dataset(path: &Path) -> Result<File> {
    File::open(path)
        .map_err(|e| Error::Data(format!("Failed to open dataset {}: {e}", path.display())))
}
