//! Mini-batch training loop with a held-out validation tail and early
//! stopping on validation accuracy.

use super::loss::{sparse_categorical_crossentropy, sparse_categorical_crossentropy_grad};
use super::model::{argmax_rows, Sequential};
use super::optimizer::Adam;
use crate::error::{Error, Result};
use crate::split::validation_split;
use ndarray::{ArrayView1, ArrayView2, Axis};
use rand::seq::SliceRandom;
use rand::Rng;
use std::fmt;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy)]
pub struct EarlyStopping {
    /// Epochs without a strict improvement in validation accuracy before
    /// training halts.
    pub patience: usize,
    pub restore_best_weights: bool,
}

#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub validation_split: f64,
    pub learning_rate: f64,
    pub early_stopping: Option<EarlyStopping>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: 50,
            batch_size: 32,
            validation_split: 0.2,
            learning_rate: 1e-3,
            early_stopping: Some(EarlyStopping {
                patience: 5,
                restore_best_weights: true,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochRecord {
    /// 1-based epoch number.
    pub epoch: usize,
    pub loss: f64,
    pub accuracy: f64,
    pub val_loss: f64,
    pub val_accuracy: f64,
}

impl fmt::Display for EpochRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "epoch {:3} | loss={:.4} accuracy={:.4} | val_loss={:.4} val_accuracy={:.4}",
            self.epoch, self.loss, self.accuracy, self.val_loss, self.val_accuracy
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct History {
    pub epochs: Vec<EpochRecord>,
    /// Epoch at which early stopping fired, if it did.
    pub stopped_epoch: Option<usize>,
    /// Epoch whose weights the model holds after training.
    pub best_epoch: Option<usize>,
}

impl History {
    pub fn last(&self) -> Option<&EpochRecord> {
        self.epochs.last()
    }

    pub fn best(&self) -> Option<&EpochRecord> {
        let best = self.best_epoch?;
        self.epochs.iter().find(|record| record.epoch == best)
    }
}

/// Early-stopping bookkeeping for one training run.
#[derive(Debug)]
pub(crate) struct Monitor {
    config: EarlyStopping,
    best: f64,
    best_epoch: usize,
    wait: usize,
    best_model: Option<Sequential>,
}

impl Monitor {
    pub(crate) fn new(config: EarlyStopping) -> Self {
        Self {
            config,
            best: f64::NEG_INFINITY,
            best_epoch: 0,
            wait: 0,
            best_model: None,
        }
    }

    /// Records the epoch's validation accuracy; returns true when training
    /// should stop.
    pub(crate) fn update(&mut self, epoch: usize, val_accuracy: f64, model: &Sequential) -> bool {
        if val_accuracy > self.best {
            self.best = val_accuracy;
            self.best_epoch = epoch;
            self.wait = 0;
            if self.config.restore_best_weights {
                self.best_model = Some(model.clone());
            }
            return false;
        }

        self.wait += 1;
        self.wait >= self.config.patience
    }

    /// Puts the best weights back into `model` when configured to. Only
    /// called once training has been halted.
    pub(crate) fn finish(self, model: &mut Sequential) -> Option<usize> {
        match self.best_model {
            Some(best) => {
                *model = best;
                Some(self.best_epoch)
            }
            None => None,
        }
    }
}

fn accuracy(predicted: ArrayView1<'_, usize>, truth: ArrayView1<'_, usize>) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let correct = predicted
        .iter()
        .zip(truth.iter())
        .filter(|(p, t)| p == t)
        .count();
    correct as f64 / truth.len() as f64
}

/// Loss and accuracy of `model` in inference mode.
pub fn evaluate(
    model: &Sequential,
    samples: ArrayView2<'_, f64>,
    labels: ArrayView1<'_, usize>,
) -> Result<(f64, f64)> {
    let probabilities = model.predict_proba(samples)?;
    let loss = sparse_categorical_crossentropy(probabilities.view(), labels);
    let predicted = argmax_rows(probabilities.view());

    Ok((loss, accuracy(predicted.view(), labels)))
}

fn check_labels(labels: ArrayView1<'_, usize>, classes: usize) -> Result<()> {
    match labels.iter().position(|&label| label >= classes) {
        Some(row) => Err(Error::LabelOutOfRange {
            row,
            label: i64::try_from(labels[row]).unwrap_or(i64::MAX),
            classes,
        }),
        None => Ok(()),
    }
}

/// Trains `model` in place and returns the per-epoch history.
///
/// The last `validation_split` fraction of rows is held out before any
/// shuffling; the remaining rows are reshuffled every epoch and consumed in
/// mini-batches. Labels are 0-based class indices.
pub fn fit<R: Rng + ?Sized>(
    model: &mut Sequential,
    samples: ArrayView2<'_, f64>,
    labels: ArrayView1<'_, usize>,
    config: &TrainConfig,
    rng: &mut R,
) -> Result<History> {
    if samples.nrows() != labels.len() {
        return Err(Error::RowCountMismatch {
            features: samples.nrows(),
            labels: labels.len(),
        });
    }
    if config.batch_size == 0 || config.epochs == 0 {
        return Err(Error::InvalidConfig(
            "epochs and batch size must be positive".into(),
        ));
    }
    check_labels(labels, model.outputs())?;

    let (fit_rows, validation_rows) = validation_split(samples.nrows(), config.validation_split)?;
    let validation_samples = samples.select(Axis(0), &validation_rows);
    let validation_labels = labels.select(Axis(0), &validation_rows);

    let mut optimizer = Adam::new(config.learning_rate);
    let mut monitor = config.early_stopping.map(Monitor::new);
    let mut history = History::default();
    let mut order = fit_rows;

    info!(
        train = order.len(),
        validation = validation_rows.len(),
        params = model.trainable_params(),
        "training started"
    );

    for epoch in 1..=config.epochs {
        order.shuffle(rng);

        let mut loss_sum = 0.0;
        let mut correct = 0.0;

        for (batch, rows) in order.chunks(config.batch_size).enumerate() {
            let batch_samples = samples.select(Axis(0), rows);
            let batch_labels = labels.select(Axis(0), rows);

            let (probabilities, cache) = model.forward_train(batch_samples.view(), rng)?;
            let loss = sparse_categorical_crossentropy(probabilities.view(), batch_labels.view());
            let predicted = argmax_rows(probabilities.view());

            let grad = sparse_categorical_crossentropy_grad(probabilities.view(), batch_labels.view());
            let gradients = model.backward(&cache, grad);
            optimizer.step(model, &gradients);

            loss_sum += loss * rows.len() as f64;
            correct += accuracy(predicted.view(), batch_labels.view()) * rows.len() as f64;
            debug!(epoch, batch, loss, "batch complete");
        }

        let seen = order.len() as f64;
        let (val_loss, val_accuracy) =
            evaluate(model, validation_samples.view(), validation_labels.view())?;

        let record = EpochRecord {
            epoch,
            loss: loss_sum / seen,
            accuracy: correct / seen,
            val_loss,
            val_accuracy,
        };
        info!("{record}");
        history.epochs.push(record);

        if let Some(monitor) = monitor.as_mut() {
            if monitor.update(epoch, val_accuracy, model) {
                info!(epoch, "early stopping");
                history.stopped_epoch = Some(epoch);
                break;
            }
        }
    }

    let restored = match monitor {
        Some(monitor) if history.stopped_epoch.is_some() => monitor.finish(model),
        _ => None,
    };
    history.best_epoch = restored.or_else(|| history.last().map(|record| record.epoch));
    if let Some(best) = history.best() {
        info!(epoch = best.epoch, val_accuracy = best.val_accuracy, "training finished");
    }

    Ok(history)
}
