use crate::error::{Error, Result};
use csv::{ReaderBuilder, StringRecord, Trim};
use ndarray::{Array1, Array2};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{info, warn};

/// Number of protein expression columns in the mice dataset.
pub const DIMENSIONS: usize = 72;

/// Number of genotype/behaviour/treatment classes.
pub const CLASSES: usize = 8;

pub const DEFAULT_ID_COLUMN: &str = "MouseID";
pub const DEFAULT_LABEL_COLUMN: &str = "x";

/// Feature table as read from disk: identifiers plus the numeric columns.
#[derive(Debug, Clone)]
pub struct FeatureTable {
    pub ids: Vec<String>,
    pub feature_names: Vec<String>,
    pub values: Array2<f64>,
}

/// Features and 1-based class labels joined by row position.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub ids: Vec<String>,
    pub feature_names: Vec<String>,
    pub features: Array2<f64>,
    pub labels: Array1<usize>,
}

impl Dataset {
    pub fn n_samples(&self) -> usize {
        self.features.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    /// Preview of the first `rows` samples with at most `columns` feature
    /// columns.
    pub fn head(&self, rows: usize, columns: usize) -> Head<'_> {
        Head {
            dataset: self,
            rows: rows.min(self.n_samples()),
            columns: columns.min(self.n_features()),
        }
    }
}

pub struct Head<'a> {
    dataset: &'a Dataset,
    rows: usize,
    columns: usize,
}

impl fmt::Display for Head<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dataset = self.dataset;
        let elided = if self.columns < dataset.n_features() { "  ..." } else { "" };

        write!(f, "{:>12}", "id")?;
        for name in dataset.feature_names.iter().take(self.columns) {
            write!(f, " {:>12}", truncate(name, 12))?;
        }
        writeln!(f, "{elided} {:>6}", "class")?;

        let rows = dataset
            .ids
            .iter()
            .zip(dataset.features.rows())
            .zip(&dataset.labels)
            .take(self.rows);
        for ((id, values), label) in rows {
            write!(f, "{:>12}", truncate(id, 12))?;
            for value in values.iter().take(self.columns) {
                write!(f, " {value:>12.6}")?;
            }
            writeln!(f, "{elided} {label:>6}")?;
        }

        Ok(())
    }
}

fn truncate(value: &str, width: usize) -> &str {
    match value.char_indices().nth(width) {
        Some((index, _)) => &value[..index],
        None => value,
    }
}

fn reader<R: Read>(source: R) -> csv::Reader<R> {
    ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(source)
}

fn parse_value(record: &StringRecord, row: usize, index: usize, column: &str) -> Result<f64> {
    let raw = record.get(index).unwrap_or_default();

    raw.parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| Error::InvalidValue {
            row,
            column: column.to_string(),
            value: raw.to_string(),
        })
}

/// Reads the expression table. The identifier column is `id_column` when
/// the header names it and the first column otherwise; every other column
/// is a feature.
pub fn read_features<R: Read>(source: R, id_column: &str) -> Result<FeatureTable> {
    let mut reader = reader(source);
    let headers = reader.headers()?.clone();

    if headers.is_empty() {
        return Err(Error::MissingColumn(id_column.to_string()));
    }

    let id_index = headers.iter().position(|h| h == id_column).unwrap_or(0);
    let feature_columns: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|&(index, _)| index != id_index)
        .map(|(index, name)| (index, name.to_string()))
        .collect();

    let mut ids = Vec::new();
    let mut values = Vec::new();

    for (row, result) in reader.records().enumerate() {
        let record = result?;

        ids.push(record.get(id_index).unwrap_or_default().to_string());
        for (index, name) in &feature_columns {
            values.push(parse_value(&record, row, *index, name)?);
        }
    }

    let feature_names: Vec<String> = feature_columns.into_iter().map(|(_, name)| name).collect();
    let values = Array2::from_shape_vec((ids.len(), feature_names.len()), values)
        .map_err(|e| Error::shape(feature_names.len(), e))?;

    Ok(FeatureTable {
        ids,
        feature_names,
        values,
    })
}

/// Reads the class column, checking every label lies in `1..=classes`.
pub fn read_labels<R: Read>(source: R, column: &str, classes: usize) -> Result<Array1<usize>> {
    let mut reader = reader(source);
    let headers = reader.headers()?.clone();

    let index = headers
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| Error::MissingColumn(column.to_string()))?;

    let mut labels = Vec::new();

    for (row, result) in reader.records().enumerate() {
        let record = result?;
        let raw = record.get(index).unwrap_or_default();

        let label = raw.parse::<i64>().map_err(|_| Error::InvalidValue {
            row,
            column: column.to_string(),
            value: raw.to_string(),
        })?;

        match usize::try_from(label) {
            Ok(value) if (1..=classes).contains(&value) => labels.push(value),
            _ => {
                return Err(Error::LabelOutOfRange {
                    row,
                    label,
                    classes,
                })
            }
        }
    }

    Ok(Array1::from(labels))
}

/// Joins features and labels by position. Both sides must have the same
/// number of rows.
pub fn join(table: FeatureTable, labels: Array1<usize>) -> Result<Dataset> {
    if table.ids.len() != labels.len() {
        return Err(Error::RowCountMismatch {
            features: table.ids.len(),
            labels: labels.len(),
        });
    }
    if labels.is_empty() {
        return Err(Error::EmptyDataset);
    }

    Ok(Dataset {
        ids: table.ids,
        feature_names: table.feature_names,
        features: table.values,
        labels,
    })
}

pub fn load_dataset(
    features_path: &Path,
    labels_path: &Path,
    id_column: &str,
    label_column: &str,
) -> Result<Dataset> {
    let table = read_features(BufReader::new(File::open(features_path)?), id_column)?;
    let labels = read_labels(
        BufReader::new(File::open(labels_path)?),
        label_column,
        CLASSES,
    )?;

    let dataset = join(table, labels)?;

    if dataset.n_features() != DIMENSIONS {
        warn!(
            expected = DIMENSIONS,
            actual = dataset.n_features(),
            "unexpected number of expression columns"
        );
    }
    info!(
        samples = dataset.n_samples(),
        features = dataset.n_features(),
        "dataset loaded"
    );

    Ok(dataset)
}
