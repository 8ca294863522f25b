use super::activation::Activation;
use super::layers::{Dense, DenseGradients, Dropout, Layer};
use crate::error::{Error, Result};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::Rng;
use std::fmt;

/// A feed-forward stack of layers applied in order.
#[derive(Debug, Clone)]
pub struct Sequential {
    inputs: usize,
    layers: Vec<Layer>,
}

#[derive(Debug, Clone, Copy)]
enum LayerSpec {
    Dense { units: usize, activation: Activation },
    Dropout { rate: f64 },
}

#[derive(Debug, Clone)]
pub struct SequentialBuilder {
    inputs: usize,
    specs: Vec<LayerSpec>,
}

impl SequentialBuilder {
    pub fn dense(mut self, units: usize, activation: Activation) -> Self {
        self.specs.push(LayerSpec::Dense { units, activation });
        self
    }

    pub fn dropout(mut self, rate: f64) -> Self {
        self.specs.push(LayerSpec::Dropout { rate });
        self
    }

    pub fn build<R: Rng + ?Sized>(self, rng: &mut R) -> Result<Sequential> {
        if self.inputs == 0 {
            return Err(Error::InvalidConfig("model needs at least one input".into()));
        }

        match self.specs.last() {
            Some(LayerSpec::Dense { .. }) => {}
            _ => {
                return Err(Error::InvalidConfig(
                    "model must end with a dense layer".into(),
                ))
            }
        }

        let last = self.specs.len() - 1;
        let mut width = self.inputs;
        let mut layers = Vec::with_capacity(self.specs.len());

        for (index, spec) in self.specs.into_iter().enumerate() {
            match spec {
                LayerSpec::Dense { units, activation } => {
                    if units == 0 {
                        return Err(Error::InvalidConfig(format!(
                            "dense layer {index} has no units"
                        )));
                    }
                    if activation == Activation::Softmax && index != last {
                        return Err(Error::InvalidConfig(
                            "softmax is only supported on the output layer".into(),
                        ));
                    }
                    layers.push(Layer::Dense(Dense::new(width, units, activation, rng)));
                    width = units;
                }
                LayerSpec::Dropout { rate } => {
                    if !(0.0..1.0).contains(&rate) {
                        return Err(Error::InvalidConfig(format!(
                            "dropout rate {rate} must lie in [0, 1)"
                        )));
                    }
                    layers.push(Layer::Dropout(Dropout::new(rate)));
                }
            }
        }

        Ok(Sequential {
            inputs: self.inputs,
            layers,
        })
    }
}

/// Activations cached by a training-mode forward pass.
#[derive(Debug)]
pub(crate) struct ForwardCache {
    /// Input to every layer, in layer order.
    inputs: Vec<Array2<f64>>,
    /// Pre-activation for dense layers, dropout mask for dropout layers.
    states: Vec<Array2<f64>>,
}

impl Sequential {
    pub fn builder(inputs: usize) -> SequentialBuilder {
        SequentialBuilder {
            inputs,
            specs: Vec::new(),
        }
    }

    /// Hidden dense layers with ReLU, each followed by dropout, then a
    /// softmax output with one unit per class.
    pub fn classifier<R: Rng + ?Sized>(
        inputs: usize,
        hidden: &[usize],
        dropout: f64,
        classes: usize,
        rng: &mut R,
    ) -> Result<Self> {
        let mut builder = Self::builder(inputs);
        for &units in hidden {
            builder = builder.dense(units, Activation::Relu);
            if dropout > 0.0 {
                builder = builder.dropout(dropout);
            }
        }
        builder.dense(classes, Activation::Softmax).build(rng)
    }

    #[cfg(test)]
    pub(crate) fn from_layers(inputs: usize, layers: Vec<Layer>) -> Self {
        Self { inputs, layers }
    }

    pub fn outputs(&self) -> usize {
        self.dense_layers().last().map_or(self.inputs, Dense::units)
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn dense_layers(&self) -> impl Iterator<Item = &Dense> {
        self.layers.iter().filter_map(|layer| match layer {
            Layer::Dense(dense) => Some(dense),
            Layer::Dropout(_) => None,
        })
    }

    pub fn dense_layers_mut(&mut self) -> impl Iterator<Item = &mut Dense> {
        self.layers.iter_mut().filter_map(|layer| match layer {
            Layer::Dense(dense) => Some(dense),
            Layer::Dropout(_) => None,
        })
    }

    pub fn trainable_params(&self) -> usize {
        self.layers.iter().map(Layer::param_count).sum()
    }

    fn check_inputs(&self, samples: &ArrayView2<'_, f64>) -> Result<()> {
        if samples.ncols() == self.inputs {
            Ok(())
        } else {
            Err(Error::shape(
                format!("(batch, {})", self.inputs),
                format!("({}, {})", samples.nrows(), samples.ncols()),
            ))
        }
    }

    /// Inference-mode forward pass; dropout is the identity.
    pub fn predict_proba(&self, samples: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        self.check_inputs(&samples)?;

        let mut current = samples.to_owned();
        for layer in &self.layers {
            if let Layer::Dense(dense) = layer {
                current = dense.forward(current.view()).1;
            }
        }
        Ok(current)
    }

    /// Index of the most probable class for every row.
    pub fn predict(&self, samples: ArrayView2<'_, f64>) -> Result<Array1<usize>> {
        let probabilities = self.predict_proba(samples)?;
        Ok(argmax_rows(probabilities.view()))
    }

    /// Training-mode forward pass with fresh dropout masks.
    pub(crate) fn forward_train<R: Rng + ?Sized>(
        &self,
        samples: ArrayView2<'_, f64>,
        rng: &mut R,
    ) -> Result<(Array2<f64>, ForwardCache)> {
        self.check_inputs(&samples)?;

        let mut cache = ForwardCache {
            inputs: Vec::with_capacity(self.layers.len()),
            states: Vec::with_capacity(self.layers.len()),
        };
        let mut current = samples.to_owned();

        for layer in &self.layers {
            let next = match layer {
                Layer::Dense(dense) => {
                    let (pre_activation, activation) = dense.forward(current.view());
                    cache.states.push(pre_activation);
                    activation
                }
                Layer::Dropout(dropout) => {
                    let mask = dropout.mask(current.dim(), rng);
                    let dropped = &current * &mask;
                    cache.states.push(mask);
                    dropped
                }
            };
            cache.inputs.push(current);
            current = next;
        }

        Ok((current, cache))
    }

    /// Backpropagates `grad` (loss gradient at the output layer's logits
    /// when it is softmax, at its activations otherwise). Returns one
    /// gradient per dense layer in layer order.
    pub(crate) fn backward(&self, cache: &ForwardCache, grad: Array2<f64>) -> Vec<DenseGradients> {
        let mut gradients = Vec::new();
        let mut grad = grad;

        for (index, layer) in self.layers.iter().enumerate().rev() {
            let input = cache.inputs[index].view();
            let state = cache.states[index].view();

            grad = match layer {
                Layer::Dense(dense) => {
                    let (parameters, input_grad) = dense.backward(input, state, grad);
                    gradients.push(parameters);
                    input_grad
                }
                Layer::Dropout(_) => grad * state,
            };
        }

        gradients.reverse();
        gradients
    }

    pub fn summary(&self) -> ModelSummary {
        let mut rows = Vec::with_capacity(self.layers.len());
        let mut dense_index = 0;
        let mut dropout_index = 0;
        let mut width = self.inputs;

        for layer in &self.layers {
            let (name, activation) = match layer {
                Layer::Dense(dense) => {
                    width = dense.units();
                    dense_index += 1;
                    (indexed_name("dense", dense_index), Some(dense.activation))
                }
                Layer::Dropout(_) => {
                    dropout_index += 1;
                    (indexed_name("dropout", dropout_index), None)
                }
            };
            rows.push(SummaryRow {
                name,
                kind: layer.kind(),
                activation,
                output_units: width,
                params: layer.param_count(),
            });
        }

        ModelSummary {
            rows,
            total_params: self.trainable_params(),
        }
    }
}

fn indexed_name(base: &str, index: usize) -> String {
    if index == 1 {
        base.to_string()
    } else {
        format!("{base}_{}", index - 1)
    }
}

pub fn argmax_rows(probabilities: ArrayView2<'_, f64>) -> Array1<usize> {
    probabilities
        .axis_iter(Axis(0))
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0, f64::NEG_INFINITY), |best, (index, &p)| {
                    if p > best.1 {
                        (index, p)
                    } else {
                        best
                    }
                })
                .0
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct SummaryRow {
    pub name: String,
    pub kind: &'static str,
    /// `None` for layers without an activation.
    pub activation: Option<Activation>,
    pub output_units: usize,
    pub params: usize,
}

/// Per-layer output shapes and parameter counts.
#[derive(Debug, Clone)]
pub struct ModelSummary {
    pub rows: Vec<SummaryRow>,
    pub total_params: usize,
}

impl fmt::Display for ModelSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "-".repeat(72);
        writeln!(f, "{rule}")?;
        writeln!(
            f,
            "{:<28} {:<18} {:<12} {:>10}",
            "Layer (type)", "Output Shape", "Activation", "Param #"
        )?;
        writeln!(f, "{}", "=".repeat(72))?;
        for row in &self.rows {
            let layer = format!("{} ({})", row.name, row.kind);
            let shape = format!("(None, {})", row.output_units);
            let activation = row
                .activation
                .map_or_else(|| "-".to_string(), |activation| activation.to_string());
            writeln!(f, "{layer:<28} {shape:<18} {activation:<12} {:>10}", row.params)?;
        }
        writeln!(f, "{}", "=".repeat(72))?;
        writeln!(f, "Total params: {}", self.total_params)?;
        writeln!(f, "Trainable params: {}", self.total_params)?;
        writeln!(f, "Non-trainable params: 0")?;
        write!(f, "{rule}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::loss::sparse_categorical_crossentropy_grad;
    use ndarray::array;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(42)
    }

    #[test]
    fn one_hidden_layer_has_2843_parameters() {
        let model = Sequential::classifier(72, &[35], 0.2, 8, &mut rng()).unwrap();

        assert_eq!(model.trainable_params(), 2843);
        assert_eq!(model.layers().len(), 3);
        assert_eq!(model.outputs(), 8);
    }

    #[test]
    fn two_hidden_layers_have_3223_parameters() {
        let model = Sequential::classifier(72, &[35, 15], 0.2, 8, &mut rng()).unwrap();

        assert_eq!(model.trainable_params(), 3223);
        assert_eq!(model.layers().len(), 5);
    }

    #[test]
    fn summary_lists_layers_and_totals() {
        let model = Sequential::classifier(72, &[35], 0.2, 8, &mut rng()).unwrap();
        let summary = model.summary();

        let names: Vec<&str> = summary.rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["dense", "dropout", "dense_1"]);
        let params: Vec<usize> = summary.rows.iter().map(|r| r.params).collect();
        assert_eq!(params, vec![2555, 0, 288]);
        assert_eq!(summary.rows[1].output_units, 35);
        let activations: Vec<Option<Activation>> = summary.rows.iter().map(|r| r.activation).collect();
        assert_eq!(
            activations,
            vec![Some(Activation::Relu), None, Some(Activation::Softmax)]
        );

        let text = summary.to_string();
        assert!(text.contains("Total params: 2843"));
        assert!(text.contains("(None, 8)"));
        assert!(text.contains("softmax"));
    }

    #[test]
    fn builder_rejects_invalid_layouts() {
        assert!(Sequential::builder(4).build(&mut rng()).is_err());
        assert!(Sequential::builder(4)
            .dense(3, Activation::Relu)
            .dropout(0.5)
            .build(&mut rng())
            .is_err());
        assert!(Sequential::builder(4)
            .dense(3, Activation::Relu)
            .dropout(1.0)
            .dense(2, Activation::Softmax)
            .build(&mut rng())
            .is_err());
        assert!(Sequential::builder(4)
            .dense(3, Activation::Softmax)
            .dense(2, Activation::Softmax)
            .build(&mut rng())
            .is_err());
        assert!(Sequential::builder(4)
            .dense(0, Activation::Relu)
            .dense(2, Activation::Softmax)
            .build(&mut rng())
            .is_err());
    }

    #[test]
    fn predictions_are_distributions() {
        let model = Sequential::classifier(5, &[4, 3], 0.2, 3, &mut rng()).unwrap();
        let samples = Array2::from_shape_fn((6, 5), |(i, j)| (i * 5 + j) as f64 / 30.0);

        let probabilities = model.predict_proba(samples.view()).unwrap();
        assert_eq!(probabilities.dim(), (6, 3));
        for row in probabilities.axis_iter(Axis(0)) {
            assert!((row.sum() - 1.0).abs() < 1e-12);
        }

        let predicted = model.predict(samples.view()).unwrap();
        assert!(predicted.iter().all(|&c| c < 3));
    }

    #[test]
    fn predict_rejects_wrong_width() {
        let model = Sequential::classifier(5, &[4], 0.0, 3, &mut rng()).unwrap();
        assert!(matches!(
            model.predict(Array2::zeros((2, 4)).view()),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn argmax_picks_first_maximum() {
        let probabilities = array![[0.1, 0.7, 0.2], [0.4, 0.4, 0.2], [0.0, 0.0, 1.0]];
        assert_eq!(argmax_rows(probabilities.view()), array![1, 0, 2]);
    }

    #[test]
    fn backward_matches_finite_differences() {
        // No dropout so the training forward pass is deterministic.
        let model = Sequential::classifier(3, &[4], 0.0, 3, &mut rng()).unwrap();
        let samples = array![[0.2, 0.8, 0.1], [0.9, 0.3, 0.5]];
        let labels = array![2, 0];

        let loss = |m: &Sequential| {
            let probabilities = m.predict_proba(samples.view()).unwrap();
            crate::network::loss::sparse_categorical_crossentropy(
                probabilities.view(),
                labels.view(),
            )
        };

        let (output, cache) = model.forward_train(samples.view(), &mut rng()).unwrap();
        let grad = sparse_categorical_crossentropy_grad(output.view(), labels.view());
        let gradients = model.backward(&cache, grad);
        assert_eq!(gradients.len(), 2);

        let epsilon = 1e-6;
        for (layer, expected) in gradients.iter().enumerate() {
            for ((i, j), &analytic) in expected.kernel.indexed_iter() {
                let mut shifted = model.clone();
                shifted.dense_layers_mut().nth(layer).unwrap().kernel[(i, j)] += epsilon;
                let numeric = (loss(&shifted) - loss(&model)) / epsilon;
                assert!((numeric - analytic).abs() < 1e-4, "layer {layer} ({i}, {j})");
            }
        }
    }
}
