use crate::error::{Error, Result};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Disjoint train/test row indices covering every sample exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

impl Partition {
    pub fn train_rows(&self, samples: ArrayView2<'_, f64>) -> Array2<f64> {
        samples.select(Axis(0), &self.train)
    }

    pub fn test_rows(&self, samples: ArrayView2<'_, f64>) -> Array2<f64> {
        samples.select(Axis(0), &self.test)
    }

    pub fn train_labels(&self, labels: ArrayView1<'_, usize>) -> Array1<usize> {
        labels.select(Axis(0), &self.train)
    }

    pub fn test_labels(&self, labels: ArrayView1<'_, usize>) -> Array1<usize> {
        labels.select(Axis(0), &self.test)
    }
}

fn check_fraction(fraction: f64) -> Result<()> {
    if fraction > 0.0 && fraction < 1.0 {
        Ok(())
    } else {
        Err(Error::InvalidConfig(format!(
            "split fraction {fraction} must lie strictly between 0 and 1"
        )))
    }
}

/// Shuffles `0..samples` with a seeded generator and puts the first
/// `ceil(samples * test_fraction)` indices in the test set. No
/// stratification: class balance per side is not guaranteed.
pub fn train_test_split(samples: usize, test_fraction: f64, seed: u64) -> Result<Partition> {
    check_fraction(test_fraction)?;

    #[allow(clippy::cast_possible_truncation)]
    #[allow(clippy::cast_sign_loss)]
    let test_size = (samples as f64 * test_fraction).ceil() as usize;
    if test_size == 0 || test_size >= samples {
        return Err(Error::InvalidConfig(format!(
            "cannot hold out {test_size} of {samples} samples for testing"
        )));
    }

    let mut indices: Vec<usize> = (0..samples).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let train = indices.split_off(test_size);

    Ok(Partition {
        train,
        test: indices,
    })
}

/// Holds out the trailing `floor(samples * fraction)` rows for validation
/// without reshuffling. Returns `(fit, validation)` row index ranges.
pub fn validation_split(samples: usize, fraction: f64) -> Result<(Vec<usize>, Vec<usize>)> {
    check_fraction(fraction)?;

    #[allow(clippy::cast_possible_truncation)]
    #[allow(clippy::cast_sign_loss)]
    let split_at = (samples as f64 * (1.0 - fraction)) as usize;
    if split_at == 0 || split_at >= samples {
        return Err(Error::InvalidConfig(format!(
            "validation fraction {fraction} leaves an empty side for {samples} samples"
        )));
    }

    let indices: Vec<usize> = (0..samples).collect();
    let (first, second) = indices.split_at(split_at);

    Ok((first.to_vec(), second.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn splits_one_third_for_testing() {
        let partition = train_test_split(1080, 1.0 / 3.0, 42).unwrap();

        assert_eq!(partition.test.len(), 360);
        assert_eq!(partition.train.len(), 720);
    }

    #[test]
    fn rounds_test_size_up() {
        let partition = train_test_split(10, 1.0 / 3.0, 42).unwrap();

        assert_eq!(partition.test.len(), 4);
        assert_eq!(partition.train.len(), 6);
    }

    #[test]
    fn different_seeds_shuffle_differently() {
        let a = train_test_split(100, 1.0 / 3.0, 42).unwrap();
        let b = train_test_split(100, 1.0 / 3.0, 43).unwrap();

        assert_ne!(a, b);
    }

    #[test]
    fn rejects_degenerate_fractions() {
        assert!(train_test_split(10, 0.0, 1).is_err());
        assert!(train_test_split(10, 1.0, 1).is_err());
        assert!(train_test_split(10, f64::NAN, 1).is_err());
        assert!(train_test_split(1, 0.5, 1).is_err());
    }

    #[test]
    fn validation_takes_the_tail() {
        let (fit, validation) = validation_split(10, 0.2).unwrap();

        assert_eq!(fit, (0..8).collect::<Vec<_>>());
        assert_eq!(validation, vec![8, 9]);
    }

    #[test]
    fn validation_split_of_training_partition() {
        let (fit, validation) = validation_split(720, 0.2).unwrap();

        assert_eq!(fit.len(), 576);
        assert_eq!(validation.len(), 144);
    }

    #[test]
    fn selects_partition_rows() {
        let samples = array![[0.0], [1.0], [2.0], [3.0]];
        let labels = array![0, 1, 2, 3];
        let partition = Partition {
            train: vec![3, 0],
            test: vec![1, 2],
        };

        assert_eq!(partition.train_rows(samples.view()), array![[3.0], [0.0]]);
        assert_eq!(partition.test_labels(labels.view()), array![1, 2]);
        assert_eq!(partition.train_labels(labels.view()), array![3, 0]);
        assert_eq!(partition.test_rows(samples.view()).nrows(), 2);
    }

    proptest! {
        #[test]
        fn partition_is_disjoint_and_complete(samples in 2usize..2000, seed in any::<u64>()) {
            let partition = train_test_split(samples, 1.0 / 3.0, seed).unwrap();

            let train: HashSet<usize> = partition.train.iter().copied().collect();
            let test: HashSet<usize> = partition.test.iter().copied().collect();

            prop_assert!(train.is_disjoint(&test));
            prop_assert_eq!(train.len() + test.len(), samples);
            prop_assert!(train.union(&test).all(|&i| i < samples));

            let expected = samples as f64 / 3.0;
            prop_assert!((partition.test.len() as f64 - expected).abs() <= 1.0);
        }

        #[test]
        fn same_seed_same_partition(samples in 2usize..500, seed in any::<u64>()) {
            let first = train_test_split(samples, 1.0 / 3.0, seed).unwrap();
            let second = train_test_split(samples, 1.0 / 3.0, seed).unwrap();

            prop_assert_eq!(first, second);
        }
    }
}
