use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use ndarray::{Array1, Array2};
use tracing::{debug, info};

use super::{
    DenseNetwork, EpochCallback, EpochEvent, Hyperparameters, ModelEngine, Normalization,
    TrainedModel,
};

/// Feed-forward engine backed by [`DenseNetwork`].
///
/// Hidden width defaults to the input width; the trade-history pipeline
/// overrides it to match its wider reference architecture.
#[derive(Debug, Clone, Default)]
pub struct DenseEngine {
    hidden_units: Option<usize>,
}

impl DenseEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hidden_units(hidden_units: usize) -> Self {
        Self {
            hidden_units: Some(hidden_units),
        }
    }
}

#[async_trait]
impl ModelEngine for DenseEngine {
    async fn fit(
        &self,
        inputs: &[Vec<f64>],
        labels: &[f64],
        hyper: Hyperparameters,
        on_epoch: EpochCallback<'_>,
    ) -> Result<TrainedModel> {
        validate_shapes(inputs, labels, hyper)?;

        let normalize = Normalization::fit(inputs, labels)?;
        let n = inputs.len();
        let width = hyper.window_size;

        let mut x = Array2::zeros((n, width));
        for (i, row) in inputs.iter().enumerate() {
            let normalized = normalize.normalize_row(row);
            for (j, v) in normalized.into_iter().enumerate() {
                x[[i, j]] = v;
            }
        }
        let y = Array1::from_iter(labels.iter().map(|&l| normalize.normalize_label(l)));

        let hidden_units = self.hidden_units.unwrap_or(width);
        let mut network = DenseNetwork::new(width, hyper.hidden_layers, hidden_units);

        info!(
            samples = n,
            width,
            epochs = hyper.epochs,
            learning_rate = hyper.learning_rate,
            hidden_layers = hyper.hidden_layers,
            "training dense model"
        );

        for epoch in 0..hyper.epochs {
            let loss = network.train_epoch(&x, &y, hyper.learning_rate);
            if !loss.is_finite() {
                bail!("training diverged at epoch {}: loss is not finite", epoch);
            }
            debug!(epoch, loss, "epoch complete");
            on_epoch(EpochEvent { epoch, loss });
            // Suspend between epochs so progress stays observable
            tokio::task::yield_now().await;
        }

        Ok(TrainedModel { network, normalize })
    }

    fn predict(&self, inputs: &[Vec<f64>], model: &TrainedModel) -> Vec<f64> {
        inputs
            .iter()
            .map(|row| {
                let normalized = Array1::from_vec(model.normalize.normalize_row(row));
                let output = model.network.forward(&normalized);
                model.normalize.denormalize_label(output)
            })
            .collect()
    }
}

fn validate_shapes(inputs: &[Vec<f64>], labels: &[f64], hyper: Hyperparameters) -> Result<()> {
    if inputs.is_empty() {
        return Err(anyhow!("no training inputs"));
    }
    if inputs.len() != labels.len() {
        return Err(anyhow!(
            "{} inputs but {} labels",
            inputs.len(),
            labels.len()
        ));
    }
    if hyper.epochs == 0 {
        return Err(anyhow!("epochs must be >= 1"));
    }
    if hyper.learning_rate <= 0.0 {
        return Err(anyhow!("learning_rate must be > 0"));
    }
    if let Some(bad) = inputs.iter().position(|row| row.len() != hyper.window_size) {
        return Err(anyhow!(
            "input row {} has width {}, expected {}",
            bad,
            inputs[bad].len(),
            hyper.window_size
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy_data(n: usize, width: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
        let inputs: Vec<Vec<f64>> = (0..n)
            .map(|i| (0..width).map(|j| ((i + j) % 10) as f64 + 1.0).collect())
            .collect();
        let labels = inputs
            .iter()
            .map(|row| row.iter().sum::<f64>() / width as f64)
            .collect();
        (inputs, labels)
    }

    fn hyper(width: usize, epochs: usize) -> Hyperparameters {
        Hyperparameters {
            window_size: width,
            epochs,
            learning_rate: 0.05,
            hidden_layers: 1,
        }
    }

    #[tokio::test]
    async fn test_epoch_events_in_order_exactly_once() {
        let (inputs, labels) = toy_data(30, 5);
        let engine = DenseEngine::new();

        let mut events = Vec::new();
        engine
            .fit(&inputs, &labels, hyper(5, 8), &mut |e| events.push(e))
            .await
            .unwrap();

        assert_eq!(events.len(), 8);
        for (i, event) in events.iter().enumerate() {
            assert_eq!(event.epoch, i);
            assert!(event.loss.is_finite());
        }
    }

    #[tokio::test]
    async fn test_loss_trends_down() {
        let (inputs, labels) = toy_data(40, 4);
        let engine = DenseEngine::new();

        let mut losses = Vec::new();
        engine
            .fit(&inputs, &labels, hyper(4, 150), &mut |e| losses.push(e.loss))
            .await
            .unwrap();

        assert!(losses.last().unwrap() < losses.first().unwrap());
    }

    #[tokio::test]
    async fn test_predictions_are_in_price_scale() {
        let (inputs, labels) = toy_data(50, 4);
        let engine = DenseEngine::new();
        let model = engine
            .fit(&inputs, &labels, hyper(4, 300), &mut |_| {})
            .await
            .unwrap();

        let preds = engine.predict(&inputs, &model);
        assert_eq!(preds.len(), inputs.len());
        // Labels live in [1, 10]; after denormalization predictions
        // should be near that range, not in [0, 1]
        let mean_pred: f64 = preds.iter().sum::<f64>() / preds.len() as f64;
        let mean_label: f64 = labels.iter().sum::<f64>() / labels.len() as f64;
        assert!((mean_pred - mean_label).abs() < mean_label);
    }

    #[tokio::test]
    async fn test_shape_errors() {
        let engine = DenseEngine::new();
        let err = engine
            .fit(&[], &[], hyper(4, 5), &mut |_| {})
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no training inputs"));

        let err = engine
            .fit(&[vec![1.0, 2.0]], &[1.5], hyper(4, 5), &mut |_| {})
            .await
            .unwrap_err();
        assert!(err.to_string().contains("width"));
    }

    #[tokio::test]
    async fn test_divergence_surfaces_as_error() {
        let (inputs, labels) = toy_data(30, 4);
        let engine = DenseEngine::new();
        let hp = Hyperparameters {
            window_size: 4,
            epochs: 500,
            learning_rate: 1e6,
            hidden_layers: 2,
        };
        let result = engine.fit(&inputs, &labels, hp, &mut |_| {}).await;
        assert!(result.is_err());
    }
}
