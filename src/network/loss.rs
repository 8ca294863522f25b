use ndarray::{Array2, ArrayView1, ArrayView2};

const EPSILON: f64 = 1e-7;

/// Mean cross-entropy of softmax outputs against integer class labels.
pub fn sparse_categorical_crossentropy(
    probabilities: ArrayView2<'_, f64>,
    labels: ArrayView1<'_, usize>,
) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }

    let total: f64 = labels
        .iter()
        .enumerate()
        .map(|(row, &label)| -probabilities[(row, label)].clamp(EPSILON, 1.0 - EPSILON).ln())
        .sum();

    total / labels.len() as f64
}

/// Gradient of the mean cross-entropy with respect to the softmax logits:
/// `(p - onehot(y)) / batch`.
pub fn sparse_categorical_crossentropy_grad(
    probabilities: ArrayView2<'_, f64>,
    labels: ArrayView1<'_, usize>,
) -> Array2<f64> {
    let mut grad = probabilities.to_owned();
    for (row, &label) in labels.iter().enumerate() {
        grad[(row, label)] -= 1.0;
    }

    let batch = labels.len().max(1) as f64;
    grad / batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::activation::softmax;
    use ndarray::array;

    #[test]
    fn uniform_prediction_costs_log_classes() {
        let probabilities = Array2::from_elem((2, 8), 1.0 / 8.0);
        let labels = array![0, 7];

        let loss = sparse_categorical_crossentropy(probabilities.view(), labels.view());

        assert!((loss - 8.0f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn confident_wrong_prediction_is_clipped() {
        let probabilities = array![[1.0, 0.0]];
        let loss = sparse_categorical_crossentropy(probabilities.view(), array![1].view());

        assert!(loss.is_finite());
        assert!((loss + EPSILON.ln()).abs() < 1e-9);
    }

    #[test]
    fn gradient_matches_finite_differences() {
        let logits = array![[0.2, -0.4, 1.1], [0.5, 0.5, -0.3]];
        let labels = array![2, 0];

        let probabilities = softmax(logits.view());
        let grad = sparse_categorical_crossentropy_grad(probabilities.view(), labels.view());

        let epsilon = 1e-6;
        for i in 0..2 {
            for j in 0..3 {
                let mut shifted = logits.clone();
                shifted[(i, j)] += epsilon;
                let numeric = (sparse_categorical_crossentropy(
                    softmax(shifted.view()).view(),
                    labels.view(),
                ) - sparse_categorical_crossentropy(probabilities.view(), labels.view()))
                    / epsilon;

                assert!((numeric - grad[(i, j)]).abs() < 1e-4);
            }
        }
    }
}
