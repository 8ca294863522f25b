use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("missing required column `{0}`")]
    MissingColumn(String),

    /// A cell that should hold a number does not parse as one.
    #[error("invalid value {value:?} at row {row}, column `{column}`")]
    InvalidValue {
        row: usize,
        column: String,
        value: String,
    },

    #[error("label {label} at row {row} is outside 1..={classes}")]
    LabelOutOfRange {
        row: usize,
        label: i64,
        classes: usize,
    },

    #[error("row count mismatch: {features} feature rows vs {labels} label rows")]
    RowCountMismatch { features: usize, labels: usize },

    #[error("dataset is empty")]
    EmptyDataset,

    #[error("shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("decomposition failed: {0}")]
    Decomposition(String),
}

impl Error {
    pub(crate) fn shape(expected: impl ToString, actual: impl ToString) -> Self {
        Self::ShapeMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}
