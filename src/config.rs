use crate::error::{Error, Result};
use crate::network::TrainConfig;
use crate::parse::{DEFAULT_ID_COLUMN, DEFAULT_LABEL_COLUMN};
use std::path::PathBuf;

/// One classifier layout to train and compare.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSpec {
    pub name: String,
    /// Units per hidden ReLU layer, in order.
    pub hidden: Vec<usize>,
}

impl ModelSpec {
    pub fn new(name: impl Into<String>, hidden: &[usize]) -> Self {
        Self {
            name: name.into(),
            hidden: hidden.to_vec(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExperimentConfig {
    pub features_path: PathBuf,
    pub labels_path: PathBuf,
    pub id_column: String,
    pub label_column: String,
    pub seed: u64,
    pub test_fraction: f64,
    pub pca_components: usize,
    /// Dropout after every hidden layer.
    pub dropout: f64,
    pub train: TrainConfig,
    pub models: Vec<ModelSpec>,
    pub head_rows: usize,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            features_path: PathBuf::from("data3.csv"),
            labels_path: PathBuf::from("class3.csv"),
            id_column: DEFAULT_ID_COLUMN.to_string(),
            label_column: DEFAULT_LABEL_COLUMN.to_string(),
            seed: 42,
            test_fraction: 1.0 / 3.0,
            pca_components: 3,
            dropout: 0.2,
            train: TrainConfig::default(),
            models: vec![
                ModelSpec::new("model 1 (35)", &[35]),
                ModelSpec::new("model 2 (35-15)", &[35, 15]),
            ],
            head_rows: 5,
        }
    }
}

impl ExperimentConfig {
    pub fn validate(&self) -> Result<()> {
        let fraction = |name: &str, value: f64| {
            if value > 0.0 && value < 1.0 {
                Ok(())
            } else {
                Err(Error::InvalidConfig(format!(
                    "{name} must lie strictly between 0 and 1, got {value}"
                )))
            }
        };

        fraction("test fraction", self.test_fraction)?;
        fraction("validation split", self.train.validation_split)?;

        if !(0.0..1.0).contains(&self.dropout) {
            return Err(Error::InvalidConfig(format!(
                "dropout must lie in [0, 1), got {}",
                self.dropout
            )));
        }
        if self.train.epochs == 0 || self.train.batch_size == 0 {
            return Err(Error::InvalidConfig(
                "epochs and batch size must be positive".into(),
            ));
        }
        if !(self.train.learning_rate > 0.0 && self.train.learning_rate.is_finite()) {
            return Err(Error::InvalidConfig(format!(
                "learning rate must be positive, got {}",
                self.train.learning_rate
            )));
        }
        if self.train.early_stopping.is_some_and(|es| es.patience == 0) {
            return Err(Error::InvalidConfig("patience must be positive".into()));
        }
        if self.models.is_empty() {
            return Err(Error::InvalidConfig("no models to train".into()));
        }
        if self.pca_components == 0 {
            return Err(Error::InvalidConfig(
                "at least one principal component is required".into(),
            ));
        }

        Ok(())
    }
}
