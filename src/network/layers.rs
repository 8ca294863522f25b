//! Dense and dropout layers.

use super::activation::Activation;
use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::Rng;

/// Fully-connected layer `a = act(x · W + b)` with a kernel of shape
/// `(inputs, units)`.
#[derive(Debug, Clone)]
pub struct Dense {
    pub kernel: Array2<f64>,
    pub bias: Array1<f64>,
    pub activation: Activation,
}

/// Gradients of the loss with respect to one dense layer's parameters.
#[derive(Debug, Clone)]
pub struct DenseGradients {
    pub kernel: Array2<f64>,
    pub bias: Array1<f64>,
}

impl Dense {
    /// Glorot-uniform kernel, zero bias.
    pub fn new<R: Rng + ?Sized>(
        inputs: usize,
        units: usize,
        activation: Activation,
        rng: &mut R,
    ) -> Self {
        let limit = (6.0 / (inputs + units) as f64).sqrt();
        let kernel = Array2::from_shape_simple_fn((inputs, units), || rng.gen_range(-limit..=limit));

        Self {
            kernel,
            bias: Array1::zeros(units),
            activation,
        }
    }

    pub fn inputs(&self) -> usize {
        self.kernel.nrows()
    }

    pub fn units(&self) -> usize {
        self.kernel.ncols()
    }

    pub fn param_count(&self) -> usize {
        self.kernel.len() + self.bias.len()
    }

    /// Returns the pre-activation `z` and the activation `a`.
    pub fn forward(&self, input: ArrayView2<'_, f64>) -> (Array2<f64>, Array2<f64>) {
        let pre_activation = input.dot(&self.kernel) + &self.bias;
        let activation = self.activation.apply(pre_activation.view());
        (pre_activation, activation)
    }

    /// Given `dL/da`, returns the parameter gradients and `dL/dx`.
    pub fn backward(
        &self,
        input: ArrayView2<'_, f64>,
        pre_activation: ArrayView2<'_, f64>,
        grad: Array2<f64>,
    ) -> (DenseGradients, Array2<f64>) {
        let delta = self.activation.backward(pre_activation, grad);

        let gradients = DenseGradients {
            kernel: input.t().dot(&delta),
            bias: delta.sum_axis(Axis(0)),
        };
        let input_grad = delta.dot(&self.kernel.t());

        (gradients, input_grad)
    }
}

/// Inverted dropout: during training each activation is zeroed with
/// probability `rate` and survivors are scaled by `1 / (1 - rate)`.
#[derive(Debug, Clone, Copy)]
pub struct Dropout {
    pub rate: f64,
}

impl Dropout {
    pub fn new(rate: f64) -> Self {
        Self { rate }
    }

    pub fn mask<R: Rng + ?Sized>(&self, shape: (usize, usize), rng: &mut R) -> Array2<f64> {
        if self.rate <= 0.0 {
            return Array2::ones(shape);
        }

        let keep = 1.0 - self.rate;
        let scale = 1.0 / keep;
        Array2::from_shape_simple_fn(shape, || {
            if rng.gen::<f64>() < keep {
                scale
            } else {
                0.0
            }
        })
    }
}

#[derive(Debug, Clone)]
pub enum Layer {
    Dense(Dense),
    Dropout(Dropout),
}

impl Layer {
    pub fn kind(&self) -> &'static str {
        match self {
            Layer::Dense(_) => "Dense",
            Layer::Dropout(_) => "Dropout",
        }
    }

    pub fn param_count(&self) -> usize {
        match self {
            Layer::Dense(dense) => dense.param_count(),
            Layer::Dropout(_) => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn dense_parameter_count() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        assert_eq!(Dense::new(72, 35, Activation::Relu, &mut rng).param_count(), 2555);
        assert_eq!(Dense::new(35, 8, Activation::Softmax, &mut rng).param_count(), 288);
        assert_eq!(Dense::new(35, 15, Activation::Relu, &mut rng).param_count(), 540);
        assert_eq!(Dense::new(15, 8, Activation::Softmax, &mut rng).param_count(), 128);
    }

    #[test]
    fn glorot_initialization_stays_within_limit() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let dense = Dense::new(72, 35, Activation::Relu, &mut rng);

        let limit = (6.0f64 / 107.0).sqrt();
        assert!(dense.kernel.iter().all(|w| w.abs() <= limit));
        assert!(dense.bias.iter().all(|b| *b == 0.0));
    }

    #[test]
    fn forward_computes_affine_map() {
        let dense = Dense {
            kernel: array![[1.0, -1.0], [2.0, 0.5]],
            bias: array![0.5, -3.0],
            activation: Activation::Relu,
        };

        let (z, a) = dense.forward(array![[1.0, 1.0]].view());

        assert_eq!(z, array![[3.5, -3.5]]);
        assert_eq!(a, array![[3.5, 0.0]]);
    }

    #[test]
    fn backward_matches_finite_differences() {
        let dense = Dense {
            kernel: array![[0.3, -0.2], [0.1, 0.4], [-0.5, 0.2]],
            bias: array![0.05, -0.1],
            activation: Activation::Linear,
        };
        let input = array![[1.0, 2.0, -1.0], [0.5, -0.5, 2.0]];

        // L = sum(a), so dL/da = 1.
        let (z, _) = dense.forward(input.view());
        let (gradients, _) = dense.backward(input.view(), z.view(), Array2::ones(z.dim()));

        let epsilon = 1e-6;
        let loss = |d: &Dense| d.forward(input.view()).1.sum();
        for i in 0..3 {
            for j in 0..2 {
                let mut shifted = dense.clone();
                shifted.kernel[(i, j)] += epsilon;
                let numeric = (loss(&shifted) - loss(&dense)) / epsilon;
                assert!((numeric - gradients.kernel[(i, j)]).abs() < 1e-4);
            }
        }
        assert_eq!(gradients.bias, array![2.0, 2.0]);
    }

    #[test]
    fn dropout_mask_scales_survivors() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mask = Dropout::new(0.2).mask((100, 50), &mut rng);

        let dropped = mask.iter().filter(|&&m| m == 0.0).count() as f64 / mask.len() as f64;
        assert!((dropped - 0.2).abs() < 0.03);
        assert!(mask.iter().all(|&m| m == 0.0 || (m - 1.25).abs() < 1e-12));
    }

    #[test]
    fn zero_rate_dropout_is_identity() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mask = Dropout::new(0.0).mask((3, 3), &mut rng);

        assert!(mask.iter().all(|&m| m == 1.0));
    }
}
