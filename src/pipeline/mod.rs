pub mod trade_history;

pub use trade_history::TradeHistoryForecaster;

use chrono::{Days, NaiveDate};
use thiserror::Error;
use tracing::info;

use crate::dataset::{compute_windows, Dataset, SplitError, TrainTestSplit};
use crate::ml::{EpochCallback, Hyperparameters, ModelEngine, TrainedModel};
use crate::types::PriceSeries;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no price series loaded")]
    NoSeries,
    #[error("SMA dataset not computed")]
    NoDataset,
    #[error("model not trained")]
    NotTrained,
    #[error("a training run is already in flight for this model")]
    TrainingInProgress,
    #[error("window size must be >= 1")]
    InvalidWindow,
    #[error("trade history needs at least {needed} days, got {got}")]
    NotEnoughHistory { needed: usize, got: usize },
    #[error(transparent)]
    Split(#[from] SplitError),
    #[error("model engine: {0}")]
    Engine(#[from] anyhow::Error),
}

/// Forward projection: one predicted price per holdout example, plus the
/// calendar dates it is plotted against. The date axis carries one extra
/// day beyond the predictions, so `dates.len() == predictions.len() + 1`.
#[derive(Debug, Clone)]
pub struct ForwardPrediction {
    pub predictions: Vec<f64>,
    pub dates: Vec<NaiveDate>,
}

impl ForwardPrediction {
    /// Predictions paired with their dates.
    pub fn dated_points(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.dates.iter().copied().zip(self.predictions.iter().copied())
    }
}

/// Explicit pipeline context: the loaded series, the windowed dataset and
/// the trained model live here instead of in module-level globals, so the
/// windowing, split and engine layers stay pure.
///
/// Stages gate on each other (loaded -> SMA computed -> trained); each
/// operation fails if its predecessor's output is absent.
/// Loading a new series or changing the window drops the downstream
/// artifacts.
pub struct ForecastSession<E: ModelEngine> {
    engine: E,
    window_size: usize,
    training_size_pct: f64,
    series: Option<PriceSeries>,
    dataset: Option<Dataset>,
    model: Option<TrainedModel>,
    training_in_flight: bool,
}

impl<E: ModelEngine> ForecastSession<E> {
    pub fn new(
        engine: E,
        window_size: usize,
        training_size_pct: f64,
    ) -> Result<Self, PipelineError> {
        if window_size == 0 {
            return Err(PipelineError::InvalidWindow);
        }
        if !(0.0..=100.0).contains(&training_size_pct) || training_size_pct.is_nan() {
            return Err(SplitError::InvalidPercent(training_size_pct).into());
        }
        Ok(Self {
            engine,
            window_size,
            training_size_pct,
            series: None,
            dataset: None,
            model: None,
            training_in_flight: false,
        })
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn series(&self) -> Option<&PriceSeries> {
        self.series.as_ref()
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_ref()
    }

    pub fn model(&self) -> Option<&TrainedModel> {
        self.model.as_ref()
    }

    /// Install a freshly loaded series, discarding downstream artifacts.
    pub fn load_series(&mut self, series: PriceSeries) {
        self.series = Some(series);
        self.dataset = None;
        self.model = None;
    }

    /// Change the window, discarding the dataset and model built with
    /// the previous one.
    pub fn set_window_size(&mut self, window_size: usize) -> Result<(), PipelineError> {
        if window_size == 0 {
            return Err(PipelineError::InvalidWindow);
        }
        self.window_size = window_size;
        self.dataset = None;
        self.model = None;
        Ok(())
    }

    /// Window the loaded series into SMA-labeled examples. A window
    /// longer than the series yields an empty dataset, not an error.
    pub fn compute_sma(&mut self) -> Result<&Dataset, PipelineError> {
        let series = self.series.as_ref().ok_or(PipelineError::NoSeries)?;
        let dataset = compute_windows(series, self.window_size);
        info!(
            examples = dataset.len(),
            window_size = self.window_size,
            "computed SMA dataset"
        );
        self.model = None;
        Ok(self.dataset.insert(dataset))
    }

    /// The dataset partitioned at the training percentage, with one cut
    /// index shared by inputs, labels and aligned timestamps.
    pub fn split(&self) -> Result<TrainTestSplit, PipelineError> {
        let series = self.series.as_ref().ok_or(PipelineError::NoSeries)?;
        let dataset = self.dataset.as_ref().ok_or(PipelineError::NoDataset)?;
        Ok(TrainTestSplit::new(
            dataset,
            series,
            self.window_size,
            self.training_size_pct,
        )?)
    }

    /// Slice the dataset to the training prefix, fit a model through the
    /// engine and keep it. Epoch events are forwarded unmodified. Only
    /// one training run may be in flight against this session's model.
    pub async fn train(
        &mut self,
        epochs: usize,
        learning_rate: f64,
        hidden_layers: usize,
        on_epoch: EpochCallback<'_>,
    ) -> Result<(), PipelineError> {
        if self.training_in_flight {
            return Err(PipelineError::TrainingInProgress);
        }
        let split = self.split()?;
        let hyper = Hyperparameters {
            window_size: self.window_size,
            epochs,
            learning_rate,
            hidden_layers,
        };

        self.training_in_flight = true;
        let result = self
            .engine
            .fit(&split.train_inputs, &split.train_labels, hyper, on_epoch)
            .await;
        self.training_in_flight = false;

        self.model = Some(result?);
        info!(trained_on = split.train_inputs.len(), "model trained");
        Ok(())
    }

    /// Inference over both sides of the split, in order: predictions for
    /// the training prefix and for the holdout suffix.
    pub fn evaluate(&self) -> Result<(Vec<f64>, Vec<f64>), PipelineError> {
        let model = self.model.as_ref().ok_or(PipelineError::NotTrained)?;
        let split = self.split()?;
        let train = self.engine.predict(&split.train_inputs, model);
        let holdout = self.engine.predict(&split.holdout_inputs, model);
        Ok((train, holdout))
    }

    /// Predict one point per holdout example and build the forward date
    /// axis: consecutive calendar days starting the day after the last
    /// known timestamp, one per prediction plus one.
    pub fn predict_forward(&self) -> Result<ForwardPrediction, PipelineError> {
        let model = self.model.as_ref().ok_or(PipelineError::NotTrained)?;
        let split = self.split()?;
        let predictions = self.engine.predict(&split.holdout_inputs, model);

        let last_known = self
            .series
            .as_ref()
            .and_then(|s| s.last())
            .ok_or(PipelineError::NoSeries)?
            .timestamp;
        let dates = (1..=predictions.len() as u64 + 1)
            .map(|offset| last_known + Days::new(offset))
            .collect();

        Ok(ForwardPrediction { predictions, dates })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::DenseEngine;
    use crate::types::PricePoint;
    use chrono::NaiveDate;

    fn series(n: usize) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        PriceSeries::new(
            (0..n)
                .map(|i| {
                    let wave = (i as f64 / 5.0).sin() * 2.0;
                    PricePoint::new(start + Days::new(i as u64), 50.0 + wave + i as f64 * 0.1)
                })
                .collect(),
        )
    }

    fn session() -> ForecastSession<DenseEngine> {
        ForecastSession::new(DenseEngine::new(), 10, 70.0).unwrap()
    }

    #[test]
    fn test_stage_gating() {
        let mut s = session();
        assert!(matches!(s.compute_sma(), Err(PipelineError::NoSeries)));

        s.load_series(series(40));
        assert!(matches!(s.split(), Err(PipelineError::NoDataset)));
        s.compute_sma().unwrap();
        assert!(matches!(s.evaluate(), Err(PipelineError::NotTrained)));
        assert!(matches!(
            s.predict_forward(),
            Err(PipelineError::NotTrained)
        ));
    }

    #[test]
    fn test_invalid_construction() {
        assert!(matches!(
            ForecastSession::new(DenseEngine::new(), 0, 70.0),
            Err(PipelineError::InvalidWindow)
        ));
        assert!(matches!(
            ForecastSession::new(DenseEngine::new(), 10, 101.0),
            Err(PipelineError::Split(SplitError::InvalidPercent(_)))
        ));
    }

    #[test]
    fn test_reload_drops_downstream_artifacts() {
        let mut s = session();
        s.load_series(series(40));
        s.compute_sma().unwrap();
        assert!(s.dataset().is_some());

        s.load_series(series(50));
        assert!(s.dataset().is_none());
        assert!(s.model().is_none());

        s.compute_sma().unwrap();
        s.set_window_size(12).unwrap();
        assert!(s.dataset().is_none());
    }

    #[test]
    fn test_oversized_window_yields_empty_dataset() {
        let mut s = ForecastSession::new(DenseEngine::new(), 100, 70.0).unwrap();
        s.load_series(series(40));
        let ds = s.compute_sma().unwrap();
        assert!(ds.is_empty());
    }

    #[tokio::test]
    async fn test_full_session_flow() {
        let mut s = session();
        s.load_series(series(80));
        let examples = s.compute_sma().unwrap().len();
        assert_eq!(examples, 71);

        let mut epochs_seen = Vec::new();
        s.train(20, 0.05, 1, &mut |e| epochs_seen.push(e.epoch))
            .await
            .unwrap();
        assert_eq!(epochs_seen, (0..20).collect::<Vec<_>>());

        let cut = (0.7 * 71.0f64).floor() as usize;
        let (train_preds, holdout_preds) = s.evaluate().unwrap();
        assert_eq!(train_preds.len(), cut);
        assert_eq!(holdout_preds.len(), 71 - cut);
    }

    #[tokio::test]
    async fn test_forward_dates_one_more_than_predictions() {
        let mut s = session();
        let data = series(80);
        let last_known = data.last().unwrap().timestamp;
        s.load_series(data);
        s.compute_sma().unwrap();
        s.train(10, 0.05, 1, &mut |_| {}).await.unwrap();

        let forward = s.predict_forward().unwrap();
        assert_eq!(forward.dates.len(), forward.predictions.len() + 1);
        assert_eq!(forward.dates[0], last_known + Days::new(1));
        for pair in forward.dates.windows(2) {
            assert_eq!(pair[1], pair[0] + Days::new(1));
        }
        assert_eq!(
            forward.dated_points().count(),
            forward.predictions.len()
        );
    }

    #[tokio::test]
    async fn test_train_recovers_after_failure() {
        let mut s = session();
        s.load_series(series(80));
        s.compute_sma().unwrap();

        // Absurd learning rate diverges; the in-flight guard must reset
        let failed = s.train(200, 1e9, 2, &mut |_| {}).await;
        assert!(failed.is_err());

        s.train(10, 0.05, 1, &mut |_| {}).await.unwrap();
        assert!(s.model().is_some());
    }
}
