//! Test-set evaluation: confusion matrix and per-class report.

use crate::error::{Error, Result};
use ndarray::{Array2, ArrayView1, Axis};
use std::fmt;

/// Counts indexed by `(true class, predicted class)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfusionMatrix {
    pub counts: Array2<usize>,
}

impl ConfusionMatrix {
    pub fn new(
        truth: ArrayView1<'_, usize>,
        predicted: ArrayView1<'_, usize>,
        classes: usize,
    ) -> Result<Self> {
        if truth.len() != predicted.len() {
            return Err(Error::shape(
                format!("{} predictions", truth.len()),
                format!("{} predictions", predicted.len()),
            ));
        }

        let mut counts = Array2::zeros((classes, classes));
        for (row, (&t, &p)) in truth.iter().zip(predicted.iter()).enumerate() {
            if t >= classes || p >= classes {
                return Err(Error::LabelOutOfRange {
                    row,
                    label: i64::try_from(t.max(p)).unwrap_or(i64::MAX),
                    classes,
                });
            }
            counts[(t, p)] += 1;
        }

        Ok(Self { counts })
    }

    pub fn classes(&self) -> usize {
        self.counts.nrows()
    }

    pub fn total(&self) -> usize {
        self.counts.sum()
    }

    pub fn correct(&self) -> usize {
        self.counts.diag().sum()
    }

    /// Row sums: number of test samples per true class.
    pub fn support(&self) -> Vec<usize> {
        self.counts.sum_axis(Axis(1)).to_vec()
    }

    /// Column sums: number of predictions per class.
    pub fn predicted(&self) -> Vec<usize> {
        self.counts.sum_axis(Axis(0)).to_vec()
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.correct(), self.total())
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.counts.axis_iter(Axis(0)) {
            let cells: Vec<String> = row.iter().map(|c| format!("{c:>4}")).collect();
            writeln!(f, "[{}]", cells.join(""))?;
        }
        Ok(())
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn f1(precision: f64, recall: f64) -> f64 {
    if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Precision, recall and F1 per class with macro and weighted averages.
/// Undefined ratios (no predictions or no samples for a class) count as 0.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationReport {
    pub classes: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
}

impl ClassificationReport {
    pub fn from_confusion(matrix: &ConfusionMatrix) -> Self {
        let support = matrix.support();
        let predicted = matrix.predicted();
        let total = matrix.total();

        let classes: Vec<ClassMetrics> = (0..matrix.classes())
            .map(|class| {
                let hits = matrix.counts[(class, class)];
                let precision = ratio(hits, predicted[class]);
                let recall = ratio(hits, support[class]);
                ClassMetrics {
                    precision,
                    recall,
                    f1: f1(precision, recall),
                    support: support[class],
                }
            })
            .collect();

        let count = classes.len().max(1) as f64;
        let macro_avg = ClassMetrics {
            precision: classes.iter().map(|c| c.precision).sum::<f64>() / count,
            recall: classes.iter().map(|c| c.recall).sum::<f64>() / count,
            f1: classes.iter().map(|c| c.f1).sum::<f64>() / count,
            support: total,
        };

        let weight = |value: fn(&ClassMetrics) -> f64| {
            classes
                .iter()
                .map(|c| value(c) * c.support as f64)
                .sum::<f64>()
                / total.max(1) as f64
        };
        let weighted_avg = ClassMetrics {
            precision: weight(|c| c.precision),
            recall: weight(|c| c.recall),
            f1: weight(|c| c.f1),
            support: total,
        };

        Self {
            accuracy: matrix.accuracy(),
            classes,
            macro_avg,
            weighted_avg,
        }
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:>14} {:>10} {:>10} {:>10} {:>10}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        writeln!(f)?;
        for (class, metrics) in self.classes.iter().enumerate() {
            writeln!(
                f,
                "{class:>14} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                metrics.precision, metrics.recall, metrics.f1, metrics.support
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>14} {:>10} {:>10} {:>10.2} {:>10}",
            "accuracy", "", "", self.accuracy, self.macro_avg.support
        )?;
        for (name, metrics) in [
            ("macro avg", &self.macro_avg),
            ("weighted avg", &self.weighted_avg),
        ] {
            writeln!(
                f,
                "{name:>14} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                metrics.precision, metrics.recall, metrics.f1, metrics.support
            )?;
        }
        Ok(())
    }
}

/// Everything measured for one model on the test partition.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub name: String,
    pub confusion: ConfusionMatrix,
    pub report: ClassificationReport,
}

impl Evaluation {
    pub fn new(
        name: impl Into<String>,
        truth: ArrayView1<'_, usize>,
        predicted: ArrayView1<'_, usize>,
        classes: usize,
    ) -> Result<Self> {
        let confusion = ConfusionMatrix::new(truth, predicted, classes)?;
        let report = ClassificationReport::from_confusion(&confusion);

        Ok(Self {
            name: name.into(),
            confusion,
            report,
        })
    }

    pub fn accuracy(&self) -> f64 {
        self.report.accuracy
    }
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Metrics for {}:", self.name)?;
        writeln!(f, "Confusion matrix:")?;
        write!(f, "{}", self.confusion)?;
        writeln!(f)?;
        writeln!(f, "Classification report:")?;
        write!(f, "{}", self.report)?;
        writeln!(f)?;
        write!(f, "Accuracy: {:.4}", self.accuracy())
    }
}

/// Side-by-side accuracy of several evaluated models.
#[derive(Debug, Clone)]
pub struct ModelComparison<'a> {
    pub evaluations: &'a [Evaluation],
}

impl ModelComparison<'_> {
    /// The model with the highest test accuracy; the first one on ties.
    pub fn best(&self) -> Option<&Evaluation> {
        self.evaluations.iter().fold(None, |best, current| match best {
            Some(best) if best.accuracy() >= current.accuracy() => Some(best),
            _ => Some(current),
        })
    }
}

impl fmt::Display for ModelComparison<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for evaluation in self.evaluations {
            writeln!(
                f,
                "{:<24} accuracy {:.4}  macro f1 {:.4}",
                evaluation.name,
                evaluation.accuracy(),
                evaluation.report.macro_avg.f1
            )?;
        }
        if let Some(best) = self.best() {
            write!(f, "best: {}", best.name)?;
        }
        Ok(())
    }
}
