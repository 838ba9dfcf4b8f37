use crate::error::Result;
use crate::history::HistoryWindow;
use crate::model::{Dimension, Interval, Prediction};
use chrono::{Duration, Utc};

const MIN_DATA_POINTS: usize = 4;

/// Holt two-parameter exponential smoothing: a level/trend pair updated
/// one sample at a time, forecast linearly from the final state.
pub struct ExponentialSmoothingPredictor {
    alpha: f64,
    beta: f64,
}

impl Default for ExponentialSmoothingPredictor {
    fn default() -> Self {
        Self {
            alpha: 0.3,
            beta: 0.1,
        }
    }
}

struct HoltFit {
    level: f64,
    trend: f64,
    mae: f64,
}

fn fit(alpha: f64, beta: f64, values: &[f64]) -> HoltFit {
    let mut level = values[0];
    let mut trend = values[1] - values[0];
    let mut abs_errors = Vec::with_capacity(values.len().saturating_sub(1));

    for &observed in &values[1..] {
        let forecast = level + trend;
        abs_errors.push((observed - forecast).abs());
        let new_level = alpha * observed + (1.0 - alpha) * (level + trend);
        trend = beta * (new_level - level) + (1.0 - beta) * trend;
        level = new_level;
    }

    let mae = if abs_errors.is_empty() {
        0.0
    } else {
        abs_errors.iter().sum::<f64>() / abs_errors.len() as f64
    };

    HoltFit { level, trend, mae }
}

fn confidence_for(fit: &HoltFit) -> f64 {
    if fit.level.abs() < f64::EPSILON {
        return 0.0;
    }
    let relative_error = (fit.mae / fit.level.abs()).min(1.0);
    (1.0 - relative_error).clamp(0.0, 1.0)
}

impl super::Predictor for ExponentialSmoothingPredictor {
    fn min_data_points(&self) -> usize {
        MIN_DATA_POINTS
    }

    fn predict(&self, history: &HistoryWindow, horizons: &[Duration]) -> Result<Vec<Prediction>> {
        self.validate_data(history)?;

        let samples: Vec<&crate::model::Sample> = history.iter().collect();
        let identity = samples.last().unwrap().identity.clone();
        let cpu_values: Vec<f64> = samples.iter().map(|s| s.cpu_millicores).collect();
        let mem_values: Vec<f64> = samples.iter().map(|s| s.memory_bytes).collect();

        let cpu_fit = fit(self.alpha, self.beta, &cpu_values);
        let mem_fit = fit(self.alpha, self.beta, &mem_values);

        let sample_interval = average_interval_steps(&samples);
        let generated_at = Utc::now();

        let mut out = Vec::with_capacity(horizons.len() * 2);
        for horizon in horizons {
            let steps = if sample_interval > 0.0 {
                (horizon.num_seconds() as f64 / sample_interval).max(1.0)
            } else {
                1.0
            };
            for (dimension, fit) in [(Dimension::Cpu, &cpu_fit), (Dimension::Memory, &mem_fit)] {
                let value = (fit.level + steps * fit.trend).max(0.0);
                let margin = 1.96 * fit.mae * (1.0 + 0.1 * steps.sqrt());
                out.push(Prediction {
                    identity: identity.clone(),
                    dimension,
                    value,
                    horizon: *horizon,
                    confidence: confidence_for(fit),
                    interval: Interval {
                        lower: (value - margin).max(0.0),
                        upper: value + margin,
                        pct: 0.95,
                    },
                    method: self.method_name().to_string(),
                    generated_at,
                });
            }
        }
        Ok(out)
    }

    fn method_name(&self) -> &'static str {
        "exponential_smoothing"
    }
}

/// Average spacing between consecutive samples, in seconds. Used to
/// convert a horizon duration into a number of forecast steps.
fn average_interval_steps(samples: &[&crate::model::Sample]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }
    let span = (samples.last().unwrap().timestamp - samples[0].timestamp).num_seconds() as f64;
    span / (samples.len() - 1) as f64
}

#[cfg(test)]
mod tests {
    use super::super::Predictor;
    use super::*;
    use crate::identity::ContainerIdentity;
    use crate::model::Sample;
    use chrono::TimeZone;

    fn window_with(cpu: &[f64]) -> HistoryWindow {
        let identity = ContainerIdentity::new("ns", "pod", "c");
        let mut window = HistoryWindow::new();
        for (i, v) in cpu.iter().enumerate() {
            window.insert(Sample {
                timestamp: Utc.timestamp_opt(1000 + i as i64 * 60, 0).unwrap(),
                identity: identity.clone(),
                cpu_millicores: *v,
                memory_bytes: *v * 1_000_000.0,
            });
        }
        window
    }

    #[test]
    fn below_min_data_points_errors() {
        let predictor = ExponentialSmoothingPredictor::default();
        let window = window_with(&[1.0, 2.0, 3.0]);
        assert!(predictor.predict(&window, &[Duration::minutes(5)]).is_err());
    }

    #[test]
    fn flat_series_has_high_confidence_and_flat_forecast() {
        let predictor = ExponentialSmoothingPredictor::default();
        let window = window_with(&[100.0, 100.0, 100.0, 100.0, 100.0]);
        let preds = predictor.predict(&window, &[Duration::minutes(10)]).unwrap();
        let cpu_pred = preds.iter().find(|p| p.dimension == Dimension::Cpu).unwrap();
        assert!((cpu_pred.value - 100.0).abs() < 1.0);
        assert!(cpu_pred.confidence > 0.9);
    }
}
