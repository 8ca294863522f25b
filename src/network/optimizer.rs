use super::layers::DenseGradients;
use super::model::Sequential;
use ndarray::{Array, Array1, Array2, Dimension, Zip};

#[derive(Debug, Clone)]
struct Moments {
    kernel_m: Array2<f64>,
    kernel_v: Array2<f64>,
    bias_m: Array1<f64>,
    bias_v: Array1<f64>,
}

/// Adam with bias-corrected first and second moment estimates.
#[derive(Debug, Clone)]
pub struct Adam {
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
    iterations: i32,
    moments: Vec<Moments>,
}

impl Adam {
    pub fn new(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-7,
            iterations: 0,
            moments: Vec::new(),
        }
    }

    pub fn iterations(&self) -> i32 {
        self.iterations
    }

    /// Applies one update. `gradients` holds one entry per dense layer, in
    /// layer order.
    pub fn step(&mut self, model: &mut Sequential, gradients: &[DenseGradients]) {
        if self.moments.is_empty() {
            self.moments = gradients
                .iter()
                .map(|g| Moments {
                    kernel_m: Array2::zeros(g.kernel.dim()),
                    kernel_v: Array2::zeros(g.kernel.dim()),
                    bias_m: Array1::zeros(g.bias.dim()),
                    bias_v: Array1::zeros(g.bias.dim()),
                })
                .collect();
        }

        self.iterations += 1;
        let correction1 = 1.0 - self.beta1.powi(self.iterations);
        let correction2 = 1.0 - self.beta2.powi(self.iterations);
        let coefficients = Coefficients {
            beta1: self.beta1,
            beta2: self.beta2,
            epsilon: self.epsilon,
            step_size: self.learning_rate * correction2.sqrt() / correction1,
        };

        for ((dense, gradient), moments) in model
            .dense_layers_mut()
            .zip(gradients)
            .zip(self.moments.iter_mut())
        {
            update(
                &mut dense.kernel,
                &gradient.kernel,
                &mut moments.kernel_m,
                &mut moments.kernel_v,
                coefficients,
            );
            update(
                &mut dense.bias,
                &gradient.bias,
                &mut moments.bias_m,
                &mut moments.bias_v,
                coefficients,
            );
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Coefficients {
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    step_size: f64,
}

fn update<D: Dimension>(
    parameter: &mut Array<f64, D>,
    gradient: &Array<f64, D>,
    m: &mut Array<f64, D>,
    v: &mut Array<f64, D>,
    c: Coefficients,
) {
    Zip::from(parameter)
        .and(gradient)
        .and(m)
        .and(v)
        .for_each(|w, &g, m, v| {
            *m = c.beta1 * *m + (1.0 - c.beta1) * g;
            *v = c.beta2 * *v + (1.0 - c.beta2) * g * g;
            *w -= c.step_size * *m / (v.sqrt() + c.epsilon);
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::activation::Activation;
    use crate::network::layers::{Dense, Layer};
    use ndarray::array;

    fn single_dense() -> Sequential {
        Sequential::from_layers(
            2,
            vec![Layer::Dense(Dense {
                kernel: array![[0.0], [0.0]],
                bias: array![0.0],
                activation: Activation::Linear,
            })],
        )
    }

    #[test]
    fn first_step_moves_by_learning_rate() {
        let mut model = single_dense();
        let mut adam = Adam::new(0.01);

        let gradients = vec![DenseGradients {
            kernel: array![[2.0], [-0.5]],
            bias: array![0.0],
        }];
        adam.step(&mut model, &gradients);

        // With bias correction the first step is lr * g / |g|.
        let dense = model.dense_layers().next().unwrap();
        assert!((dense.kernel[(0, 0)] + 0.01).abs() < 1e-6);
        assert!((dense.kernel[(1, 0)] - 0.01).abs() < 1e-6);
        assert!(dense.bias[0].abs() < 1e-12);
        assert_eq!(adam.iterations(), 1);
    }

    #[test]
    fn minimizes_a_quadratic() {
        let mut model = single_dense();
        let mut adam = Adam::new(0.05);
        let target = array![[1.5], [-2.0]];

        for _ in 0..2000 {
            let dense = model.dense_layers().next().unwrap();
            let gradients = vec![DenseGradients {
                kernel: 2.0 * (&dense.kernel - &target),
                bias: array![0.0],
            }];
            adam.step(&mut model, &gradients);
        }

        let dense = model.dense_layers().next().unwrap();
        assert!((dense.kernel[(0, 0)] - 1.5).abs() < 5e-2);
        assert!((dense.kernel[(1, 0)] + 2.0).abs() < 5e-2);
    }
}
