use crate::error::{Error, Result};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use tracing::warn;

fn check_columns(expected: usize, samples: &ArrayView2<'_, f64>) -> Result<()> {
    if samples.ncols() == expected {
        Ok(())
    } else {
        Err(Error::shape(
            format!("{expected} columns"),
            format!("{} columns", samples.ncols()),
        ))
    }
}

/// Zero mean, unit variance per column. Used ahead of the PCA projection.
#[derive(Debug, Clone)]
pub struct StandardScaler {
    pub mean: Array1<f64>,
    /// Population standard deviation, 1.0 for constant columns.
    pub scale: Array1<f64>,
}

impl StandardScaler {
    pub fn fit(samples: ArrayView2<'_, f64>) -> Result<Self> {
        let mean = samples.mean_axis(Axis(0)).ok_or(Error::EmptyDataset)?;
        let scale = samples
            .std_axis(Axis(0), 0.0)
            .mapv(|std| if std > 0.0 { std } else { 1.0 });

        Ok(Self { mean, scale })
    }

    pub fn transform(&self, samples: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        check_columns(self.mean.len(), &samples)?;
        Ok((&samples - &self.mean) / &self.scale)
    }

    pub fn inverse_transform(&self, samples: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        check_columns(self.mean.len(), &samples)?;
        Ok(&samples * &self.scale + &self.mean)
    }

    pub fn fit_transform(samples: ArrayView2<'_, f64>) -> Result<(Self, Array2<f64>)> {
        let scaler = Self::fit(samples)?;
        let scaled = scaler.transform(samples)?;
        Ok((scaler, scaled))
    }
}

/// Maps each column onto [0, 1] using its observed range.
#[derive(Debug, Clone)]
pub struct MinMaxScaler {
    pub min: Array1<f64>,
    /// max - min, 1.0 for constant columns so they map to 0.
    pub range: Array1<f64>,
}

impl MinMaxScaler {
    pub fn fit(samples: ArrayView2<'_, f64>) -> Result<Self> {
        if samples.nrows() == 0 {
            return Err(Error::EmptyDataset);
        }

        let min = samples.fold_axis(Axis(0), f64::INFINITY, |acc, &x| acc.min(x));
        let max = samples.fold_axis(Axis(0), f64::NEG_INFINITY, |acc, &x| acc.max(x));

        let range = (&max - &min).mapv(|range| if range > 0.0 { range } else { 1.0 });
        let constant = (&max - &min).iter().filter(|&&r| r <= 0.0).count();
        if constant > 0 {
            warn!(columns = constant, "constant columns scale to zero");
        }

        Ok(Self { min, range })
    }

    pub fn transform(&self, samples: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        check_columns(self.min.len(), &samples)?;
        Ok((&samples - &self.min) / &self.range)
    }

    pub fn inverse_transform(&self, samples: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        check_columns(self.min.len(), &samples)?;
        Ok(&samples * &self.range + &self.min)
    }

    pub fn fit_transform(samples: ArrayView2<'_, f64>) -> Result<(Self, Array2<f64>)> {
        let scaler = Self::fit(samples)?;
        let scaled = scaler.transform(samples)?;
        Ok((scaler, scaled))
    }
}

/// Converts 1-based class labels into 0-based indices.
pub fn shift_labels(labels: ArrayView1<'_, usize>) -> Result<Array1<usize>> {
    labels
        .iter()
        .enumerate()
        .map(|(row, &label)| {
            label.checked_sub(1).ok_or(Error::LabelOutOfRange {
                row,
                label: 0,
                classes: crate::parse::CLASSES,
            })
        })
        .collect()
}
