use ndarray::{Array1, Array2, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Fully connected layer with its weight matrix laid out as
/// `(outputs, inputs)`.
#[derive(Debug, Clone)]
pub struct DenseLayer {
    pub weights: Array2<f64>,
    pub biases: Array1<f64>,
}

impl DenseLayer {
    fn new(inputs: usize, outputs: usize, rng: &mut impl Rng) -> Self {
        // Xavier uniform init keeps activations from saturating early
        let limit = (6.0 / (inputs + outputs) as f64).sqrt();
        let weights =
            Array2::from_shape_fn((outputs, inputs), |_| rng.gen_range(-limit..=limit));
        Self {
            weights,
            biases: Array1::zeros(outputs),
        }
    }
}

/// Small feed-forward regression network: ReLU hidden layers, a single
/// linear output unit, trained by full-batch gradient descent on MSE.
#[derive(Debug, Clone)]
pub struct DenseNetwork {
    layers: Vec<DenseLayer>,
}

impl DenseNetwork {
    pub fn new(input_size: usize, hidden_layers: usize, hidden_units: usize) -> Self {
        let mut rng = rand::thread_rng();
        let mut layers = Vec::with_capacity(hidden_layers + 1);
        let mut width = input_size;
        for _ in 0..hidden_layers {
            layers.push(DenseLayer::new(width, hidden_units, &mut rng));
            width = hidden_units;
        }
        layers.push(DenseLayer::new(width, 1, &mut rng));
        Self { layers }
    }

    pub fn input_size(&self) -> usize {
        self.layers[0].weights.ncols()
    }

    /// Predict a single normalized output for one normalized input row.
    pub fn forward(&self, input: &Array1<f64>) -> f64 {
        let (activations, _) = self.forward_pass(input);
        activations.last().map(|a| a[0]).unwrap_or(0.0)
    }

    /// One full-batch gradient descent step; returns the epoch's MSE.
    pub fn train_epoch(
        &mut self,
        inputs: &Array2<f64>,
        targets: &Array1<f64>,
        learning_rate: f64,
    ) -> f64 {
        let n = inputs.nrows();
        if n == 0 {
            return 0.0;
        }

        let mut grad_w: Vec<Array2<f64>> = self
            .layers
            .iter()
            .map(|l| Array2::zeros(l.weights.raw_dim()))
            .collect();
        let mut grad_b: Vec<Array1<f64>> = self
            .layers
            .iter()
            .map(|l| Array1::zeros(l.biases.raw_dim()))
            .collect();

        let mut loss = 0.0;
        for i in 0..n {
            let x = inputs.row(i).to_owned();
            let (activations, pre_activations) = self.forward_pass(&x);
            let prediction = activations.last().unwrap()[0];
            let error = prediction - targets[i];
            loss += error * error;

            // Output layer is linear, so the output delta is the error
            let mut delta = Array1::from_elem(1, error);
            for layer in (0..self.layers.len()).rev() {
                let outer = delta
                    .view()
                    .insert_axis(Axis(1))
                    .dot(&activations[layer].view().insert_axis(Axis(0)));
                grad_w[layer] += &outer;
                grad_b[layer] += &delta;

                if layer > 0 {
                    let back = self.layers[layer].weights.t().dot(&delta);
                    delta = back * pre_activations[layer - 1].mapv(relu_derivative);
                }
            }
        }

        let scale = learning_rate / n as f64;
        for (layer, (gw, gb)) in self.layers.iter_mut().zip(grad_w.iter().zip(&grad_b)) {
            layer.weights.scaled_add(-scale, gw);
            layer.biases.scaled_add(-scale, gb);
        }

        loss / n as f64
    }

    /// Forward pass keeping per-layer activations (index 0 is the input)
    /// and hidden pre-activations for backpropagation.
    fn forward_pass(&self, input: &Array1<f64>) -> (Vec<Array1<f64>>, Vec<Array1<f64>>) {
        let hidden_count = self.layers.len() - 1;
        let mut activations = Vec::with_capacity(self.layers.len() + 1);
        let mut pre_activations = Vec::with_capacity(hidden_count);
        activations.push(input.clone());

        for (i, layer) in self.layers.iter().enumerate() {
            let z = layer.weights.dot(activations.last().unwrap()) + &layer.biases;
            if i < hidden_count {
                pre_activations.push(z.clone());
                activations.push(z.mapv(relu));
            } else {
                activations.push(z);
            }
        }

        (activations, pre_activations)
    }
}

fn relu(z: f64) -> f64 {
    z.max(0.0)
}

fn relu_derivative(z: f64) -> f64 {
    if z > 0.0 {
        1.0
    } else {
        0.0
    }
}

/// Serializable weight dump, mirroring the in-memory layer layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkWeights {
    pub layers: Vec<LayerWeights>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerWeights {
    pub weights: Vec<Vec<f64>>,
    pub biases: Vec<f64>,
}

impl From<&DenseNetwork> for NetworkWeights {
    fn from(network: &DenseNetwork) -> Self {
        let layers = network
            .layers
            .iter()
            .map(|l| LayerWeights {
                weights: l.weights.outer_iter().map(|row| row.to_vec()).collect(),
                biases: l.biases.to_vec(),
            })
            .collect();
        Self { layers }
    }
}

impl TryFrom<&NetworkWeights> for DenseNetwork {
    type Error = anyhow::Error;

    fn try_from(dump: &NetworkWeights) -> Result<Self, Self::Error> {
        let mut layers = Vec::with_capacity(dump.layers.len());
        for layer in &dump.layers {
            let rows = layer.weights.len();
            let cols = layer.weights.first().map(|r| r.len()).unwrap_or(0);
            let flat: Vec<f64> = layer.weights.iter().flatten().copied().collect();
            let weights = Array2::from_shape_vec((rows, cols), flat)?;
            if layer.biases.len() != rows {
                anyhow::bail!(
                    "layer has {} bias values for {} output units",
                    layer.biases.len(),
                    rows
                );
            }
            layers.push(DenseLayer {
                weights,
                biases: Array1::from_vec(layer.biases.clone()),
            });
        }
        if layers.is_empty() {
            anyhow::bail!("weight dump contains no layers");
        }
        Ok(Self { layers })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_shapes() {
        let net = DenseNetwork::new(10, 2, 10);
        assert_eq!(net.layers.len(), 3);
        assert_eq!(net.layers[0].weights.shape(), &[10, 10]);
        assert_eq!(net.layers[2].weights.shape(), &[1, 10]);
        assert_eq!(net.input_size(), 10);
    }

    #[test]
    fn test_loss_decreases_on_learnable_target() {
        // y = mean(x) is exactly representable by the linear paths
        let inputs = Array2::from_shape_fn((40, 4), |(i, j)| ((i + j) % 7) as f64 / 7.0);
        let targets = Array1::from_shape_fn(40, |i| {
            (0..4).map(|j| inputs[[i, j]]).sum::<f64>() / 4.0
        });

        let mut net = DenseNetwork::new(4, 1, 8);
        let first = net.train_epoch(&inputs, &targets, 0.1);
        let mut last = first;
        for _ in 0..200 {
            last = net.train_epoch(&inputs, &targets, 0.1);
        }
        assert!(last.is_finite());
        assert!(last < first, "loss did not improve: {} -> {}", first, last);
    }

    #[test]
    fn test_weight_dump_round_trip() {
        let net = DenseNetwork::new(5, 1, 6);
        let dump = NetworkWeights::from(&net);
        let restored = DenseNetwork::try_from(&dump).unwrap();

        let x = Array1::from_vec(vec![0.1, 0.2, 0.3, 0.4, 0.5]);
        assert!((net.forward(&x) - restored.forward(&x)).abs() < 1e-12);
    }
}
