//! Predictors (spec §4.4): four forecasting strategies dispatched
//! concurrently by `PredictionEngine`, each scoring its own confidence.

mod exponential_smoothing;
mod linear_regression;
mod moving_average;
mod seasonal;
mod store;

pub use exponential_smoothing::ExponentialSmoothingPredictor;
pub use linear_regression::LinearRegressionPredictor;
pub use moving_average::MovingAveragePredictor;
pub use seasonal::SeasonalPredictor;
pub use store::PredictionStore;

use crate::error::{OperatorError, Result};
use crate::history::HistoryWindow;
use crate::model::Prediction;
use chrono::Duration;
use std::time::Duration as StdDuration;
use tracing::warn;

/// A forecasting strategy over a container's usage history.
pub trait Predictor: Send + Sync {
    /// Minimum sample count required before `predict` will produce output.
    fn min_data_points(&self) -> usize;

    /// Reject malformed input before attempting to fit: non-finite values,
    /// zero timestamps, or fewer than `min_data_points` samples.
    fn validate_data(&self, history: &HistoryWindow) -> Result<()> {
        if history.len() < self.min_data_points() {
            return Err(OperatorError::InsufficientHistory {
                identity: history
                    .newest()
                    .map(|s| s.identity.clone())
                    .unwrap_or_else(|| crate::identity::ContainerIdentity::new("", "", "")),
                have: history.len(),
                need: self.min_data_points(),
            });
        }
        for sample in history.iter() {
            if !sample.cpu_millicores.is_finite() || !sample.memory_bytes.is_finite() {
                return Err(OperatorError::InsufficientHistory {
                    identity: sample.identity.clone(),
                    have: history.len(),
                    need: self.min_data_points(),
                });
            }
            if sample.timestamp.timestamp() == 0 {
                return Err(OperatorError::InsufficientHistory {
                    identity: sample.identity.clone(),
                    have: history.len(),
                    need: self.min_data_points(),
                });
            }
        }
        Ok(())
    }

    /// Forecast CPU and memory usage at each requested horizon.
    fn predict(&self, history: &HistoryWindow, horizons: &[Duration]) -> Result<Vec<Prediction>>;

    fn method_name(&self) -> &'static str;
}

/// Runs every enabled predictor concurrently, filters by confidence, and
/// returns predictions sorted by confidence desc then horizon asc.
pub struct PredictionEngine {
    predictors: Vec<Box<dyn Predictor>>,
    deadline: StdDuration,
    confidence_threshold: f64,
}

impl PredictionEngine {
    pub fn new(confidence_threshold: f64) -> Self {
        Self {
            predictors: vec![
                Box::new(MovingAveragePredictor::default()),
                Box::new(ExponentialSmoothingPredictor::default()),
                Box::new(LinearRegressionPredictor::default()),
                Box::new(SeasonalPredictor::default()),
            ],
            deadline: StdDuration::from_secs(30),
            confidence_threshold,
        }
    }

    pub fn with_deadline(mut self, deadline: StdDuration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Dispatch every predictor against the same history/horizons,
    /// bounded by `deadline`. A predictor that errors (e.g.
    /// `InsufficientHistory`) simply contributes nothing; it never fails
    /// the whole batch.
    pub async fn predict_all(
        &self,
        history: &HistoryWindow,
        horizons: &[Duration],
    ) -> Vec<Prediction> {
        let deadline = self.deadline;
        let futures = self.predictors.iter().map(|predictor| {
            let result = predictor.predict(history, horizons);
            async move { result }
        });

        let joined = tokio::time::timeout(deadline, futures::future::join_all(futures)).await;

        let results = match joined {
            Ok(results) => results,
            Err(_) => {
                warn!("prediction engine deadline exceeded, returning partial results");
                return Vec::new();
            }
        };

        let mut predictions: Vec<Prediction> = results
            .into_iter()
            .filter_map(|r| match r {
                Ok(preds) => Some(preds),
                Err(e) => {
                    warn!(error = %e, "predictor skipped");
                    None
                }
            })
            .flatten()
            .filter(|p| p.confidence >= self.confidence_threshold)
            .collect();

        predictions.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.horizon.cmp(&b.horizon))
        });

        predictions
    }
}

/// Shared interval-margin helper: two-sided t-value approximation used by
/// the moving-average and linear-regression predictors.
pub(crate) fn t_value(n: usize) -> f64 {
    if n < 30 {
        2.0
    } else {
        1.96
    }
}
