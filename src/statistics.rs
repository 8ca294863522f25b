//! Descriptive statistics over the expression matrix.

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use std::collections::BTreeMap;
use std::fmt;

/// Per-column summary in the shape of a `describe()` table.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSummary {
    pub name: String,
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation (n - 1 denominator).
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

#[derive(Debug, Clone)]
pub struct Summary {
    pub columns: Vec<ColumnSummary>,
}

impl Summary {
    /// Keeps only the first `n` columns, for console output.
    pub fn first(&self, n: usize) -> Summary {
        Summary {
            columns: self.columns.iter().take(n).cloned().collect(),
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<16} {:>6} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10}",
            "column", "count", "mean", "std", "min", "25%", "50%", "75%", "max"
        )?;
        for c in &self.columns {
            let name: String = c.name.chars().take(16).collect();
            writeln!(
                f,
                "{name:<16} {:>6} {:>10.4} {:>10.4} {:>10.4} {:>10.4} {:>10.4} {:>10.4} {:>10.4}",
                c.count, c.mean, c.std, c.min, c.q25, c.median, c.q75, c.max
            )?;
        }
        Ok(())
    }
}

/// Linear interpolation between order statistics of an ascending slice.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }

    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    #[allow(clippy::cast_possible_truncation)]
    #[allow(clippy::cast_sign_loss)]
    let lower = position.floor() as usize;
    let upper = (lower + 1).min(sorted.len() - 1);
    let fraction = position - lower as f64;

    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

fn summarize(name: &str, column: ArrayView1<'_, f64>) -> ColumnSummary {
    let mut sorted = column.to_vec();
    sorted.sort_by(f64::total_cmp);

    let count = sorted.len();
    let mean = column.mean().unwrap_or(f64::NAN);
    let std = if count > 1 {
        column.std(1.0)
    } else {
        f64::NAN
    };

    ColumnSummary {
        name: name.to_string(),
        count,
        mean,
        std,
        min: sorted.first().copied().unwrap_or(f64::NAN),
        q25: quantile(&sorted, 0.25),
        median: quantile(&sorted, 0.5),
        q75: quantile(&sorted, 0.75),
        max: sorted.last().copied().unwrap_or(f64::NAN),
    }
}

pub fn describe(features: ArrayView2<'_, f64>, names: &[String]) -> Summary {
    let columns = features
        .axis_iter(Axis(1))
        .enumerate()
        .map(|(index, column)| {
            let name = names
                .get(index)
                .cloned()
                .unwrap_or_else(|| format!("column_{index}"));
            summarize(&name, column)
        })
        .collect();

    Summary { columns }
}

/// Number of samples per label value, in ascending label order.
pub fn class_frequencies(labels: ArrayView1<'_, usize>) -> BTreeMap<usize, usize> {
    let mut counts = BTreeMap::new();
    for &label in labels {
        *counts.entry(label).or_insert(0) += 1;
    }
    counts
}

/// Pearson correlation between every pair of columns.
///
/// A constant column has no defined correlation with anything else, so its
/// off-diagonal entries are `NaN`. The diagonal is always 1.
pub fn correlation_matrix(features: ArrayView2<'_, f64>) -> Array2<f64> {
    let columns = features.ncols();
    let Some(mean) = features.mean_axis(Axis(0)) else {
        return Array2::from_elem((columns, columns), f64::NAN);
    };

    let centered = &features - &mean;
    let covariance = centered.t().dot(&centered);
    let deviations = covariance.diag().mapv(f64::sqrt);

    Array2::from_shape_fn((columns, columns), |(i, j)| {
        if i == j {
            return 1.0;
        }
        let denominator = deviations[i] * deviations[j];
        if denominator > 0.0 {
            (covariance[(i, j)] / denominator).clamp(-1.0, 1.0)
        } else {
            f64::NAN
        }
    })
}

/// The `k` most strongly correlated column pairs by absolute value.
pub fn strongest_correlations(
    correlation: &Array2<f64>,
    names: &[String],
    k: usize,
) -> Vec<(String, String, f64)> {
    let mut pairs = Vec::new();
    for i in 0..correlation.nrows() {
        for j in (i + 1)..correlation.ncols() {
            let value = correlation[(i, j)];
            if !value.is_nan() {
                pairs.push((i, j, value));
            }
        }
    }

    pairs.sort_by(|a, b| b.2.abs().total_cmp(&a.2.abs()));
    pairs
        .into_iter()
        .take(k)
        .map(|(i, j, value)| (names[i].clone(), names[j].clone(), value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn quantiles_interpolate_linearly() {
        let sorted = [1.0, 2.0, 3.0, 4.0];

        assert!((quantile(&sorted, 0.0) - 1.0).abs() < 1e-12);
        assert!((quantile(&sorted, 0.25) - 1.75).abs() < 1e-12);
        assert!((quantile(&sorted, 0.5) - 2.5).abs() < 1e-12);
        assert!((quantile(&sorted, 1.0) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn describe_matches_hand_computed_values() {
        let features = array![[1.0, 10.0], [2.0, 10.0], [3.0, 10.0], [4.0, 10.0]];
        let names = vec!["a".to_string(), "b".to_string()];

        let summary = describe(features.view(), &names);
        let a = &summary.columns[0];

        assert_eq!(a.count, 4);
        assert!((a.mean - 2.5).abs() < 1e-12);
        assert!((a.std - (5.0f64 / 3.0).sqrt()).abs() < 1e-12);
        assert!((a.min - 1.0).abs() < 1e-12);
        assert!((a.median - 2.5).abs() < 1e-12);
        assert!((a.max - 4.0).abs() < 1e-12);
        assert!(summary.columns[1].std.abs() < 1e-12);
    }

    #[test]
    fn summary_display_has_header_and_rows() {
        let features = array![[1.0], [2.0]];
        let text = describe(features.view(), &["a".to_string()]).to_string();

        assert!(text.starts_with("column"));
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn counts_each_class() {
        let labels = array![1, 2, 2, 8, 8, 8];
        let counts = class_frequencies(labels.view());

        assert_eq!(counts.get(&1), Some(&1));
        assert_eq!(counts.get(&2), Some(&2));
        assert_eq!(counts.get(&8), Some(&3));
        assert_eq!(counts.values().sum::<usize>(), labels.len());
    }

    #[test]
    fn correlation_of_linear_columns() {
        let features = array![[1.0, 2.0, 4.0], [2.0, 4.0, 3.0], [3.0, 6.0, 2.0], [4.0, 8.0, 1.0]];

        let corr = correlation_matrix(features.view());

        assert!((corr[(0, 1)] - 1.0).abs() < 1e-12);
        assert!((corr[(0, 2)] + 1.0).abs() < 1e-12);
        assert!((corr[(1, 0)] - corr[(0, 1)]).abs() < 1e-12);
        for i in 0..3 {
            assert!((corr[(i, i)] - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn constant_column_correlates_as_nan() {
        let features = array![[1.0, 5.0], [2.0, 5.0], [3.0, 5.0]];
        let corr = correlation_matrix(features.view());

        assert!(corr[(0, 1)].is_nan());
        assert!((corr[(1, 1)] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn strongest_pairs_sorted_by_magnitude() {
        let corr = array![[1.0, 0.2, -0.9], [0.2, 1.0, 0.5], [-0.9, 0.5, 1.0]];
        let names: Vec<String> = ["a", "b", "c"].iter().map(ToString::to_string).collect();

        let top = strongest_correlations(&corr, &names, 2);

        assert_eq!(top[0], ("a".to_string(), "c".to_string(), -0.9));
        assert_eq!(top[1].2, 0.5);
    }
}
