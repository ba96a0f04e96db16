use tracing::info;

use crate::ml::{EpochCallback, Hyperparameters, ModelEngine, TrainedModel};
use crate::types::TradeDay;

use super::PipelineError;

/// Build supervised examples from a trade history: each day's volume,
/// min, max and first price predict the *next* day's last price, so the
/// final day has no label and the first label is dropped.
pub fn build_examples(days: &[TradeDay]) -> Result<(Vec<Vec<f64>>, Vec<f64>), PipelineError> {
    if days.len() < 2 {
        return Err(PipelineError::NotEnoughHistory {
            needed: 2,
            got: days.len(),
        });
    }
    let inputs = days[..days.len() - 1]
        .iter()
        .map(|d| d.to_features().to_vec())
        .collect();
    let labels = days[1..].iter().map(|d| d.last_price).collect();
    Ok((inputs, labels))
}

/// Next-day price model over trade-history features, with iterative
/// multi-day projection.
pub struct TradeHistoryForecaster<E: ModelEngine> {
    engine: E,
    model: Option<TrainedModel>,
}

impl<E: ModelEngine> TradeHistoryForecaster<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            model: None,
        }
    }

    pub fn model(&self) -> Option<&TrainedModel> {
        self.model.as_ref()
    }

    pub async fn train(
        &mut self,
        days: &[TradeDay],
        epochs: usize,
        learning_rate: f64,
        hidden_layers: usize,
        on_epoch: EpochCallback<'_>,
    ) -> Result<(), PipelineError> {
        let (inputs, labels) = build_examples(days)?;
        let hyper = Hyperparameters {
            window_size: TradeDay::NUM_FEATURES,
            epochs,
            learning_rate,
            hidden_layers,
        };
        let model = self.engine.fit(&inputs, &labels, hyper, on_epoch).await?;
        info!(samples = inputs.len(), "trade-history model trained");
        self.model = Some(model);
        Ok(())
    }

    /// Predicted last price for the day following `day`.
    pub fn predict_next(&self, day: &TradeDay) -> Result<f64, PipelineError> {
        let model = self.model.as_ref().ok_or(PipelineError::NotTrained)?;
        let outputs = self.engine.predict(&[day.to_features().to_vec()], model);
        Ok(outputs[0])
    }

    /// Project `days` steps ahead, feeding each prediction back in as the
    /// next day's first-price feature while volume and min/max stay at
    /// their last observed values.
    pub fn predict_later_days(
        &self,
        start: &TradeDay,
        days: usize,
    ) -> Result<Vec<f64>, PipelineError> {
        let model = self.model.as_ref().ok_or(PipelineError::NotTrained)?;

        let mut features = start.to_features().to_vec();
        let mut futures = Vec::with_capacity(days);
        for _ in 0..days {
            let predicted = self.engine.predict(&[features.clone()], model)[0];
            futures.push(predicted);
            features[3] = predicted;
        }
        Ok(futures)
    }
}
