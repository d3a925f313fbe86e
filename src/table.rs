//! # CSV Tables
//!
//! Feature tables, one per run:
//!
//! ```text
//! mz,intensity,0,1.5,3
//! 100.0501,14.2,0,3.1,0.4
//! ```
//!
//! Aligned tables, one column per sample, optionally preceded by annotation
//! descriptions:
//!
//! ```text
//! mz,adduct,isotope,control,patient
//! 100.0501,unknown adduct,unknown isotope,14.2,0
//! ```
//!
//! Empty cells read as 0.

use std::io::{Read, Write};

use crate::alignment::{AlignedRow, AlignmentError, Sample};
use crate::annotation::{Annotated, RelationKind};
use crate::feature::{ExtractError, Feature, FeatureSet};

/// Errors from table reading or writing
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    /// CSV encoding or decoding failed
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// I/O error during file operations
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Header is missing a required column
    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// A cell is not a number
    #[error("Invalid number '{value}' in row {row}, column '{column}'")]
    InvalidNumber {
        /// 1-based data row
        row: usize,
        /// Column header
        column: String,
        /// Cell text
        value: String,
    },

    /// The table does not form a valid feature set
    #[error("Invalid feature table: {0}")]
    FeatureSet(#[from] ExtractError),

    /// The table does not form a valid aligned sample
    #[error("Invalid aligned table: {0}")]
    Sample(#[from] AlignmentError),
}

fn parse_cell(value: Option<&str>, row: usize, column: &str) -> Result<f64, TableError> {
    let text = value.map(str::trim).unwrap_or("");
    if text.is_empty() {
        return Ok(0.0);
    }
    text.parse().map_err(|_| TableError::InvalidNumber {
        row,
        column: column.to_string(),
        value: text.to_string(),
    })
}

fn expect_column(headers: &csv::StringRecord, index: usize, name: &str) -> Result<(), TableError> {
    match headers.get(index) {
        Some(h) if h.trim().eq_ignore_ascii_case(name) => Ok(()),
        _ => Err(TableError::MissingColumn(name.to_string())),
    }
}

/// Write a feature set as `mz,intensity,<times…>`
pub fn write_feature_set<W: Write>(writer: W, feature_set: &FeatureSet) -> Result<(), TableError> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    let mut header = vec!["mz".to_string(), "intensity".to_string()];
    header.extend(feature_set.time().iter().map(|t| t.to_string()));
    csv_writer.write_record(&header)?;

    for feature in feature_set {
        let mut record = Vec::with_capacity(header.len());
        record.push(feature.mz.to_string());
        record.push(feature.total_intensity.to_string());
        record.extend(feature.intensity.iter().map(|v| v.to_string()));
        csv_writer.write_record(&record)?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Read a feature table written by [`write_feature_set`]
pub fn read_feature_set<R: Read>(reader: R, source: &str) -> Result<FeatureSet, TableError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    expect_column(&headers, 0, "mz")?;
    expect_column(&headers, 1, "intensity")?;

    let time = headers
        .iter()
        .skip(2)
        .map(|h| parse_cell(Some(h), 0, h))
        .collect::<Result<Vec<_>, _>>()?;

    let mut features = Vec::new();
    for (index, record) in csv_reader.records().enumerate() {
        let record = record?;
        let row = index + 1;
        let mz = parse_cell(record.get(0), row, "mz")?;
        let total = parse_cell(record.get(1), row, "intensity")?;
        let intensity = (0..time.len())
            .map(|i| parse_cell(record.get(i + 2), row, &headers[i + 2]))
            .collect::<Result<Vec<_>, _>>()?;
        features.push(Feature::new(mz, total, intensity));
    }

    log::debug!("Read {} features over {} time points", features.len(), time.len());
    Ok(FeatureSet::new(source, time, features)?)
}

/// Write an aligned table as `mz,<samples…>`
pub fn write_sample<W: Write>(writer: W, sample: &Sample) -> Result<(), TableError> {
    write_aligned(writer, sample, None)
}

/// Write an aligned table with one description column per annotated kind
pub fn write_annotated_sample<W: Write>(
    writer: W,
    annotated: &Annotated<Sample>,
) -> Result<(), TableError> {
    write_aligned(writer, annotated.table(), Some(annotated))
}

fn write_aligned<W: Write>(
    writer: W,
    sample: &Sample,
    annotated: Option<&Annotated<Sample>>,
) -> Result<(), TableError> {
    let kinds: &[RelationKind] = annotated.map(|a| a.kinds()).unwrap_or(&[]);
    let mut csv_writer = csv::Writer::from_writer(writer);

    let mut header = vec!["mz".to_string()];
    header.extend(kinds.iter().map(|k| k.to_string()));
    header.extend(sample.names().iter().cloned());
    csv_writer.write_record(&header)?;

    for (index, row) in sample.rows().iter().enumerate() {
        let mut record = Vec::with_capacity(header.len());
        record.push(row.mz.to_string());
        if let Some(annotated) = annotated {
            record.extend(kinds.iter().map(|&k| annotated.describe(index, k)));
        }
        record.extend(row.intensities.iter().map(|v| v.to_string()));
        csv_writer.write_record(&record)?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Read an aligned table, skipping any annotation columns
pub fn read_sample<R: Read>(reader: R) -> Result<Sample, TableError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    expect_column(&headers, 0, "mz")?;

    let mut first_sample = 1;
    for kind in [RelationKind::Adduct, RelationKind::Isotope] {
        if headers
            .get(first_sample)
            .is_some_and(|h| h.trim() == kind.to_string())
        {
            first_sample += 1;
        }
    }

    let names: Vec<String> = headers
        .iter()
        .skip(first_sample)
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for (index, record) in csv_reader.records().enumerate() {
        let record = record?;
        let row = index + 1;
        let mz = parse_cell(record.get(0), row, "mz")?;
        let intensities = names
            .iter()
            .enumerate()
            .map(|(i, name)| parse_cell(record.get(first_sample + i), row, name))
            .collect::<Result<Vec<_>, _>>()?;
        rows.push(AlignedRow { mz, intensities });
    }

    log::debug!("Read {} aligned rows for {} samples", rows.len(), names.len());
    Ok(Sample::new(names, rows)?)
}
