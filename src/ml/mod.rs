pub mod engine;
pub mod network;

pub use engine::DenseEngine;
pub use network::{DenseNetwork, NetworkWeights};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Scalar knobs forwarded to the trainer. `window_size` is the width of
/// every input row (the price window, or the feature count for the
/// trade-history pipeline).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hyperparameters {
    pub window_size: usize,
    pub epochs: usize,
    pub learning_rate: f64,
    pub hidden_layers: usize,
}

/// Per-epoch progress event, delivered exactly once per epoch, in order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochEvent {
    pub epoch: usize,
    pub loss: f64,
}

pub type EpochCallback<'a> = &'a mut (dyn FnMut(EpochEvent) + Send);

/// Min/max descriptor needed to map model outputs back to price units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Normalization {
    pub input_min: Vec<f64>,
    pub input_max: Vec<f64>,
    pub label_min: f64,
    pub label_max: f64,
}

impl Normalization {
    /// Per-column input min/max plus the label range.
    pub fn fit(inputs: &[Vec<f64>], labels: &[f64]) -> Result<Self> {
        let width = inputs
            .first()
            .map(|row| row.len())
            .ok_or_else(|| anyhow!("cannot fit normalization on empty inputs"))?;

        let mut input_min = vec![f64::INFINITY; width];
        let mut input_max = vec![f64::NEG_INFINITY; width];
        for row in inputs {
            for (j, &v) in row.iter().enumerate() {
                input_min[j] = input_min[j].min(v);
                input_max[j] = input_max[j].max(v);
            }
        }

        let label_min = labels.iter().copied().fold(f64::INFINITY, f64::min);
        let label_max = labels.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Ok(Self {
            input_min,
            input_max,
            label_min,
            label_max,
        })
    }

    pub fn normalize_row(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .enumerate()
            .map(|(j, &v)| scale(v, self.input_min[j], self.input_max[j]))
            .collect()
    }

    pub fn normalize_label(&self, label: f64) -> f64 {
        scale(label, self.label_min, self.label_max)
    }

    pub fn denormalize_label(&self, normalized: f64) -> f64 {
        normalized * (self.label_max - self.label_min) + self.label_min
    }
}

// Constant columns map to 0 instead of dividing by a zero span
fn scale(value: f64, min: f64, max: f64) -> f64 {
    let span = max - min;
    if span.abs() < 1e-12 {
        0.0
    } else {
        (value - min) / span
    }
}

/// A fitted network plus the normalization descriptor required to
/// denormalize its predictions. Opaque to the pipeline layer.
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub network: DenseNetwork,
    pub normalize: Normalization,
}

#[derive(Debug, Serialize, Deserialize)]
struct ModelDump {
    network: NetworkWeights,
    normalize: Normalization,
}

impl TrainedModel {
    pub fn save_to_json(&self) -> Result<String> {
        let dump = ModelDump {
            network: NetworkWeights::from(&self.network),
            normalize: self.normalize.clone(),
        };
        Ok(serde_json::to_string(&dump)?)
    }

    pub fn load_from_json(json: &str) -> Result<Self> {
        let dump: ModelDump = serde_json::from_str(json)?;
        Ok(Self {
            network: DenseNetwork::try_from(&dump.network)?,
            normalize: dump.normalize,
        })
    }
}

/// Capability interface over the numeric engine: fit a model, then run
/// inference with it. Any concrete numeric binding satisfies it.
#[async_trait]
pub trait ModelEngine: Send + Sync {
    /// Train a model. Suspends between epochs so the caller can observe
    /// progress through `on_epoch`; events arrive synchronously with the
    /// training loop, once per epoch, in epoch order.
    async fn fit(
        &self,
        inputs: &[Vec<f64>],
        labels: &[f64],
        hyper: Hyperparameters,
        on_epoch: EpochCallback<'_>,
    ) -> Result<TrainedModel>;

    /// Run inference; outputs are denormalized to original price scale.
    fn predict(&self, inputs: &[Vec<f64>], model: &TrainedModel) -> Vec<f64>;
}
