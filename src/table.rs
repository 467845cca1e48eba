//! The results table: a CSV-backed cache of extracted invoice fields.
//!
//! Rows are keyed by the image path string (`image_file`). A file whose key is
//! already present is never sent to the model again, which is what makes
//! reruns cheap: only new files, and files that failed last time, are
//! processed.
//!
//! The table is read once at start and written once at the end. Nothing is
//! persisted in between, so an interrupted run loses its own progress but
//! never the rows written by earlier runs.

use crate::error::AnnotatorError;
use crate::parse::Extraction;
use std::collections::HashMap;
use std::io;
use std::path::Path;
use tracing::{debug, error, info, warn};

/// Name of the key column.
pub const INDEX_COLUMN: &str = "image_file";

/// Data columns, in file order.
pub const DATA_COLUMNS: [&str; 6] = [
    "description",
    "total_amount",
    "currency",
    "invoice_date",
    "is_invoice_receipt",
    "confidence",
];

/// One row of the results table, without its key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvoiceRecord {
    pub description: String,
    pub total_amount: String,
    pub currency: String,
    pub invoice_date: String,
    pub is_invoice_receipt: String,
    pub confidence: String,
}

impl InvoiceRecord {
    fn fields(&self) -> [&str; 6] {
        [
            &self.description,
            &self.total_amount,
            &self.currency,
            &self.invoice_date,
            &self.is_invoice_receipt,
            &self.confidence,
        ]
    }
}

impl From<Extraction> for InvoiceRecord {
    fn from(e: Extraction) -> Self {
        Self {
            description: e.description,
            total_amount: e.total_amount,
            currency: e.currency,
            invoice_date: e.invoice_date,
            is_invoice_receipt: e.is_invoice_receipt,
            confidence: e.confidence,
        }
    }
}

/// Insertion-ordered map from image path to [`InvoiceRecord`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultsTable {
    rows: Vec<(String, InvoiceRecord)>,
    index: HashMap<String, usize>,
}

impl ResultsTable {
    /// An empty table with the fixed schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// The full column set: the key column followed by the data columns.
    pub fn columns() -> Vec<&'static str> {
        std::iter::once(INDEX_COLUMN)
            .chain(DATA_COLUMNS.iter().copied())
            .collect()
    }

    /// Load the table at `path`, or start empty.
    ///
    /// A missing file yields an empty table. A file that cannot be read or
    /// parsed is logged and also yields an empty table; the caller never sees
    /// the error.
    pub fn load_or_create(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.is_file() {
            info!("No results table at {}, starting empty", path.display());
            return Self::new();
        }

        match Self::load(path) {
            Ok(table) => {
                info!("Loaded {} rows from {}", table.len(), path.display());
                table
            }
            Err(e) => {
                error!("Error loading or creating results table: {}", e);
                Self::new()
            }
        }
    }

    /// Read the table at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AnnotatorError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| AnnotatorError::CacheReadFailed {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        Self::from_reader(file).map_err(|e| AnnotatorError::CacheReadFailed {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })
    }

    /// Parse a table from CSV text.
    ///
    /// Columns are matched by header name. A missing data column reads as
    /// empty strings and unknown columns are ignored. Without an
    /// `image_file` column no row can be keyed, so every row is dropped.
    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self, csv::Error> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .has_headers(true)
            .from_reader(reader);

        let headers = reader.headers()?.clone();
        let position = |name: &str| headers.iter().position(|h| h == name);
        let key_pos = position(INDEX_COLUMN);
        let data_pos: Vec<Option<usize>> = DATA_COLUMNS.iter().map(|c| position(c)).collect();

        if key_pos.is_none() {
            warn!("Results table has no '{}' column", INDEX_COLUMN);
        }

        let mut table = Self::new();
        let mut dropped = 0usize;
        for result in reader.records() {
            let record = result?;
            let cell = |pos: Option<usize>| {
                pos.and_then(|p| record.get(p))
                    .unwrap_or_default()
                    .to_string()
            };

            let key = cell(key_pos);
            if key.is_empty() {
                dropped += 1;
                continue;
            }

            let row = InvoiceRecord {
                description: cell(data_pos[0]),
                total_amount: cell(data_pos[1]),
                currency: cell(data_pos[2]),
                invoice_date: cell(data_pos[3]),
                is_invoice_receipt: cell(data_pos[4]),
                confidence: cell(data_pos[5]),
            };
            table.upsert(key, row);
        }

        if dropped > 0 {
            warn!("Dropped {} rows without an '{}' value", dropped, INDEX_COLUMN);
        }
        Ok(table)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether `key` is already in the index.
    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&InvoiceRecord> {
        self.index.get(key).map(|&i| &self.rows[i].1)
    }

    /// Insert a row, or overwrite the existing row with the same key in place.
    ///
    /// Returns `true` when the key was new.
    pub fn upsert(&mut self, key: impl Into<String>, record: InvoiceRecord) -> bool {
        let key = key.into();
        match self.index.get(&key) {
            Some(&i) => {
                self.rows[i].1 = record;
                false
            }
            None => {
                self.index.insert(key.clone(), self.rows.len());
                self.rows.push((key, record));
                true
            }
        }
    }

    /// Rows in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &InvoiceRecord)> {
        self.rows.iter().map(|(k, r)| (k.as_str(), r))
    }

    /// Serialise the table as CSV, header row first.
    pub fn write_to<W: io::Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(writer);

        writer.write_record(Self::columns())?;
        for (key, record) in &self.rows {
            writer.write_record(std::iter::once(key.as_str()).chain(record.fields()))?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Write the whole table to `path`.
    ///
    /// Uses atomic write (temp file + rename) so a failed write leaves the
    /// previous table intact.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), AnnotatorError> {
        let path = path.as_ref();
        let write_failed = |detail: String| AnnotatorError::CacheWriteFailed {
            path: path.to_path_buf(),
            detail,
        };

        let mut buf = Vec::new();
        self.write_to(&mut buf).map_err(|e| write_failed(e.to_string()))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| write_failed(e.to_string()))?;
        }

        let tmp_path = path.with_extension("csv.tmp");
        tokio::fs::write(&tmp_path, &buf)
            .await
            .map_err(|e| write_failed(e.to_string()))?;
        tokio::fs::rename(&tmp_path, path)
            .await
            .map_err(|e| write_failed(e.to_string()))?;

        debug!("Wrote {} rows ({} bytes) to {}", self.len(), buf.len(), path.display());
        Ok(())
    }
}
