use ndarray::{Array2, ArrayView2, Axis};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Linear,
    Relu,
    /// Row-wise normalized exponential. Only valid on the output layer,
    /// where its gradient is folded into the cross-entropy gradient.
    Softmax,
}

impl Activation {
    pub fn apply(self, pre_activation: ArrayView2<'_, f64>) -> Array2<f64> {
        match self {
            Activation::Linear => pre_activation.to_owned(),
            Activation::Relu => pre_activation.mapv(|z| z.max(0.0)),
            Activation::Softmax => softmax(pre_activation),
        }
    }

    /// Chain rule through the activation, given `dL/da` and the cached `z`.
    pub fn backward(self, pre_activation: ArrayView2<'_, f64>, mut grad: Array2<f64>) -> Array2<f64> {
        match self {
            Activation::Linear | Activation::Softmax => grad,
            Activation::Relu => {
                grad.zip_mut_with(&pre_activation, |g, &z| {
                    if z <= 0.0 {
                        *g = 0.0;
                    }
                });
                grad
            }
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Activation::Linear => "linear",
            Activation::Relu => "relu",
            Activation::Softmax => "softmax",
        };
        f.write_str(name)
    }
}

pub fn softmax(logits: ArrayView2<'_, f64>) -> Array2<f64> {
    let mut output = logits.to_owned();

    for mut row in output.axis_iter_mut(Axis(0)) {
        let max = row.fold(f64::NEG_INFINITY, |acc, &x| acc.max(x));
        row.mapv_inplace(|x| (x - max).exp());
        let sum = row.sum();

        if sum.is_finite() && sum > 0.0 {
            row /= sum;
        } else {
            let uniform = 1.0 / row.len() as f64;
            row.fill(uniform);
        }
    }

    output
}
