//! Batch tables and their prediction summaries

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::Path;

use crate::types::scenario::FeatureStatistics;

/// A CSV table of scenarios kept as raw cells so it can be written back
/// unchanged alongside the predictions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl BatchTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Parse a CSV document with a header row
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::Headers)
            .from_reader(reader);

        let headers = csv_reader
            .headers()
            .context("Failed to read CSV header row")?
            .iter()
            .map(str::to_string)
            .collect();

        let mut rows = Vec::new();
        for (idx, record) in csv_reader.records().enumerate() {
            let record = record.with_context(|| format!("Failed to read CSV row {}", idx + 1))?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self { headers, rows })
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open batch file {}", path.display()))?;
        Self::from_reader(file)
    }

    /// Number of data rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Write a numeric column, one value per row.
    ///
    /// An existing column with the same header is overwritten in place;
    /// otherwise the column is appended.
    pub fn set_column(&mut self, name: &str, values: &[f64]) {
        debug_assert_eq!(values.len(), self.rows.len());
        match self.headers.iter().position(|h| h == name) {
            Some(idx) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    if row.len() <= idx {
                        row.resize(idx + 1, String::new());
                    }
                    row[idx] = value.to_string();
                }
            }
            None => {
                self.headers.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value.to_string());
                }
            }
        }
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(writer);
        csv_writer.write_record(&self.headers)?;
        for row in &self.rows {
            csv_writer.write_record(row)?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    pub fn write_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create output file {}", path.display()))?;
        self.write_csv(file)
    }

    pub fn to_csv_string(&self) -> Result<String> {
        let mut buffer = Vec::new();
        self.write_csv(&mut buffer)?;
        String::from_utf8(buffer).context("CSV output is not valid UTF-8")
    }

    /// One-row template with every feature at its mean
    pub fn template(feature_names: &[String], stats: &FeatureStatistics) -> Self {
        let row = feature_names
            .iter()
            .map(|name| {
                stats
                    .means
                    .get(name)
                    .map(|v| v.to_string())
                    .unwrap_or_default()
            })
            .collect();
        Self {
            headers: feature_names.to_vec(),
            rows: vec![row],
        }
    }
}

/// Aggregate statistics over a batch of predictions.
///
/// The statistics are `None` when the batch is empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub count: usize,
    pub mean: Option<f64>,
    /// Population standard deviation
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub range: Option<f64>,
}

/// Input table with the appended prediction column, plus the summary
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResult {
    pub table: BatchTable,
    pub predictions: Vec<f64>,
    pub summary: BatchSummary,
}
