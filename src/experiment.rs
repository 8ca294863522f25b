//! End-to-end run: load, explore, scale, split, train every configured
//! model and evaluate it on the held-out rows.

use crate::config::{ExperimentConfig, ModelSpec};
use crate::error::Result;
use crate::metrics::Evaluation;
use crate::network::{fit, History, Sequential, TrainConfig};
use crate::parse::{load_dataset, Dataset, CLASSES};
use crate::pca::Pca;
use crate::scaling::{shift_labels, MinMaxScaler, StandardScaler};
use crate::split::{train_test_split, Partition};
use crate::statistics::{
    class_frequencies, correlation_matrix, describe, strongest_correlations, Summary,
};
use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use tracing::info;

#[derive(Debug, Clone)]
pub struct Exploration {
    pub class_frequencies: BTreeMap<usize, usize>,
    pub summary: Summary,
    pub correlation: Array2<f64>,
    pub strongest_correlations: Vec<(String, String, f64)>,
    pub pca: Pca,
    /// Standardized samples projected onto the principal components.
    pub projection: Array2<f64>,
}

pub fn explore(dataset: &Dataset, pca_components: usize) -> Result<Exploration> {
    let features = dataset.features.view();

    let correlation = correlation_matrix(features);
    let strongest = strongest_correlations(&correlation, &dataset.feature_names, 5);

    let (_, standardized) = StandardScaler::fit_transform(features)?;
    let (pca, projection) = Pca::fit_transform(standardized.view(), pca_components)?;
    info!(
        components = pca_components,
        explained = pca.explained_variance_ratio.sum(),
        "principal components extracted"
    );

    Ok(Exploration {
        class_frequencies: class_frequencies(dataset.labels.view()),
        summary: describe(features, &dataset.feature_names),
        correlation,
        strongest_correlations: strongest,
        pca,
        projection,
    })
}

/// Model inputs: min-max scaled features, 0-based labels and the split.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub scaler: MinMaxScaler,
    pub features: Array2<f64>,
    pub labels: Array1<usize>,
    pub partition: Partition,
}

impl Prepared {
    pub fn train_features(&self) -> Array2<f64> {
        self.partition.train_rows(self.features.view())
    }

    pub fn test_features(&self) -> Array2<f64> {
        self.partition.test_rows(self.features.view())
    }

    pub fn train_labels(&self) -> Array1<usize> {
        self.partition.train_labels(self.labels.view())
    }

    pub fn test_labels(&self) -> Array1<usize> {
        self.partition.test_labels(self.labels.view())
    }
}

/// Scales on the full dataset before splitting, as the analysis did.
pub fn prepare(dataset: &Dataset, test_fraction: f64, seed: u64) -> Result<Prepared> {
    let (scaler, features) = MinMaxScaler::fit_transform(dataset.features.view())?;
    let labels = shift_labels(dataset.labels.view())?;
    let partition = train_test_split(dataset.n_samples(), test_fraction, seed)?;

    info!(
        train = partition.train.len(),
        test = partition.test.len(),
        "data split"
    );

    Ok(Prepared {
        scaler,
        features,
        labels,
        partition,
    })
}

#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub spec: ModelSpec,
    pub model: Sequential,
    pub history: History,
    pub evaluation: Evaluation,
}

pub fn train_and_evaluate(
    prepared: &Prepared,
    spec: &ModelSpec,
    dropout: f64,
    train: &TrainConfig,
    seed: u64,
) -> Result<TrainedModel> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut model = Sequential::classifier(
        prepared.features.ncols(),
        &spec.hidden,
        dropout,
        CLASSES,
        &mut rng,
    )?;
    info!(model = %spec.name, params = model.trainable_params(), "model built");

    let train_features = prepared.train_features();
    let train_labels = prepared.train_labels();
    let history = fit(
        &mut model,
        train_features.view(),
        train_labels.view(),
        train,
        &mut rng,
    )?;

    let test_labels = prepared.test_labels();
    let predicted = model.predict(prepared.test_features().view())?;
    let evaluation = Evaluation::new(
        spec.name.clone(),
        test_labels.view(),
        predicted.view(),
        CLASSES,
    )?;
    info!(model = %spec.name, accuracy = evaluation.accuracy(), "model evaluated");

    Ok(TrainedModel {
        spec: spec.clone(),
        model,
        history,
        evaluation,
    })
}

#[derive(Debug, Clone)]
pub struct ExperimentReport {
    pub exploration: Exploration,
    pub prepared: Prepared,
    pub models: Vec<TrainedModel>,
}

impl ExperimentReport {
    pub fn evaluations(&self) -> Vec<Evaluation> {
        self.models.iter().map(|m| m.evaluation.clone()).collect()
    }
}

pub fn run_on(dataset: &Dataset, config: &ExperimentConfig) -> Result<ExperimentReport> {
    config.validate()?;

    let exploration = explore(dataset, config.pca_components)?;
    let prepared = prepare(dataset, config.test_fraction, config.seed)?;

    let models = config
        .models
        .iter()
        .zip(0u64..)
        .map(|(spec, offset)| {
            train_and_evaluate(
                &prepared,
                spec,
                config.dropout,
                &config.train,
                config.seed.wrapping_add(offset),
            )
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ExperimentReport {
        exploration,
        prepared,
        models,
    })
}

pub fn run(config: &ExperimentConfig) -> Result<(Dataset, ExperimentReport)> {
    config.validate()?;

    let dataset = load_dataset(
        &config.features_path,
        &config.labels_path,
        &config.id_column,
        &config.label_column,
    )?;
    let report = run_on(&dataset, config)?;

    Ok((dataset, report))
}
