//! Principal component projection used to visualize class separation.

use crate::error::{Error, Result};
use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::{Array1, Array2, ArrayView2, Axis};

#[derive(Debug, Clone)]
pub struct Pca {
    mean: Array1<f64>,
    /// One component per row, unit length, shape (n_components, n_features).
    pub components: Array2<f64>,
    pub explained_variance: Array1<f64>,
    pub explained_variance_ratio: Array1<f64>,
}

impl Pca {
    pub fn fit(samples: ArrayView2<'_, f64>, n_components: usize) -> Result<Self> {
        let (rows, columns) = samples.dim();

        if n_components == 0 || n_components > columns {
            return Err(Error::InvalidConfig(format!(
                "cannot extract {n_components} components from {columns} columns"
            )));
        }
        if rows < 2 {
            return Err(Error::Decomposition(format!(
                "need at least 2 samples, got {rows}"
            )));
        }

        let mean = samples.mean_axis(Axis(0)).ok_or(Error::EmptyDataset)?;
        let centered = &samples - &mean;
        let covariance = centered.t().dot(&centered) / (rows - 1) as f64;

        // ndarray is row-major; the covariance matrix is symmetric so the
        // element order does not matter for nalgebra's column-major layout.
        let covariance = DMatrix::from_vec(columns, columns, covariance.iter().copied().collect());
        let eigen = SymmetricEigen::try_new(covariance, f64::EPSILON, 0).ok_or_else(|| {
            Error::Decomposition("symmetric eigendecomposition did not converge".to_string())
        })?;

        let mut order: Vec<usize> = (0..columns).collect();
        order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));

        let total_variance: f64 = eigen.eigenvalues.iter().map(|v| v.max(0.0)).sum();

        let mut components = Array2::zeros((n_components, columns));
        let mut explained_variance = Array1::zeros(n_components);

        for (component, &index) in order.iter().take(n_components).enumerate() {
            let vector = eigen.eigenvectors.column(index);

            // Flip so the largest absolute loading is positive.
            let pivot = vector
                .iter()
                .copied()
                .max_by(|a, b| a.abs().total_cmp(&b.abs()))
                .unwrap_or(0.0);
            let sign = if pivot < 0.0 { -1.0 } else { 1.0 };

            for (feature, &loading) in vector.iter().enumerate() {
                components[(component, feature)] = sign * loading;
            }
            explained_variance[component] = eigen.eigenvalues[index].max(0.0);
        }

        let explained_variance_ratio = if total_variance > 0.0 {
            &explained_variance / total_variance
        } else {
            Array1::zeros(n_components)
        };

        Ok(Self {
            mean,
            components,
            explained_variance,
            explained_variance_ratio,
        })
    }

    pub fn transform(&self, samples: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        if samples.ncols() != self.mean.len() {
            return Err(Error::shape(
                format!("{} columns", self.mean.len()),
                format!("{} columns", samples.ncols()),
            ));
        }

        let centered = &samples - &self.mean;
        Ok(centered.dot(&self.components.t()))
    }

    pub fn fit_transform(
        samples: ArrayView2<'_, f64>,
        n_components: usize,
    ) -> Result<(Self, Array2<f64>)> {
        let pca = Self::fit(samples, n_components)?;
        let projected = pca.transform(samples)?;
        Ok((pca, projected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn first_component_follows_dominant_direction() {
        // Points spread along (1, 1) with small noise along (1, -1).
        let samples = array![
            [-2.0, -2.1],
            [-1.0, -0.9],
            [0.0, 0.1],
            [1.0, 0.9],
            [2.0, 2.1],
        ];

        let pca = Pca::fit(samples.view(), 2).unwrap();
        let first = pca.components.row(0);

        let expected = 1.0 / 2.0f64.sqrt();
        assert!((first[0] - expected).abs() < 0.05);
        assert!((first[1] - expected).abs() < 0.05);
        assert!(pca.explained_variance_ratio[0] > 0.95);
        assert!(pca.explained_variance[0] >= pca.explained_variance[1]);
    }

    #[test]
    fn components_are_orthonormal() {
        let samples = array![
            [1.0, 0.0, 2.0],
            [0.5, 1.5, 1.0],
            [2.0, 1.0, 0.0],
            [0.0, 2.0, 1.5],
            [1.5, 0.5, 0.5],
        ];

        let pca = Pca::fit(samples.view(), 3).unwrap();
        let gram = pca.components.dot(&pca.components.t());

        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((gram[(i, j)] - expected).abs() < 1e-9);
            }
        }
        assert!((pca.explained_variance_ratio.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn projection_is_centered() {
        let samples = array![[1.0, 2.0], [3.0, 5.0], [5.0, 4.0], [7.0, 9.0]];

        let (_, projected) = Pca::fit_transform(samples.view(), 1).unwrap();

        assert_eq!(projected.dim(), (4, 1));
        assert!(projected.sum().abs() < 1e-9);
    }

    #[test]
    fn rejects_too_many_components() {
        let samples = array![[1.0, 2.0], [3.0, 4.0]];
        assert!(matches!(
            Pca::fit(samples.view(), 3),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn transform_checks_column_count() {
        let samples = array![[1.0, 2.0], [3.0, 5.0], [4.0, 4.0]];
        let pca = Pca::fit(samples.view(), 1).unwrap();

        let wrong = array![[1.0, 2.0, 3.0]];
        assert!(pca.transform(wrong.view()).is_err());
    }
}
