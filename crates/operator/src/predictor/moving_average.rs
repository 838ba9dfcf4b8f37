use super::t_value;
use crate::error::Result;
use crate::history::HistoryWindow;
use crate::model::{Dimension, Interval, Prediction};
use chrono::{Duration, Utc};

/// Mean of the last `window` samples. Confidence rewards low variance and
/// a larger sample count, saturating once the window is full.
pub struct MovingAveragePredictor {
    window: usize,
}

impl Default for MovingAveragePredictor {
    fn default() -> Self {
        Self { window: 5 }
    }
}

const MIN_DATA_POINTS: usize = 3;

struct Stats {
    mean: f64,
    variance: f64,
    n: usize,
}

fn stats(values: &[f64]) -> Stats {
    let n = values.len();
    let mean = values.iter().sum::<f64>() / n as f64;
    let variance = if n > 1 {
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64
    } else {
        0.0
    };
    Stats { mean, variance, n }
}

fn confidence_for(stats: &Stats) -> f64 {
    let cv = if stats.mean.abs() > f64::EPSILON {
        (stats.variance.sqrt() / stats.mean).abs()
    } else {
        0.0
    };
    let variance_component = (1.0 - cv).clamp(0.0, 1.0);
    let sample_component = (stats.n as f64 / 10.0).min(1.0);
    (0.5 * variance_component + 0.5 * sample_component).clamp(0.0, 1.0)
}

impl super::Predictor for MovingAveragePredictor {
    fn min_data_points(&self) -> usize {
        MIN_DATA_POINTS
    }

    fn predict(&self, history: &HistoryWindow, horizons: &[Duration]) -> Result<Vec<Prediction>> {
        self.validate_data(history)?;

        let effective_window = self.window.max(MIN_DATA_POINTS).min(history.len());
        let tail: Vec<&crate::model::Sample> =
            history.iter().rev().take(effective_window).collect();
        let identity = tail[0].identity.clone();

        let cpu_values: Vec<f64> = tail.iter().map(|s| s.cpu_millicores).collect();
        let mem_values: Vec<f64> = tail.iter().map(|s| s.memory_bytes).collect();
        let cpu_stats = stats(&cpu_values);
        let mem_stats = stats(&mem_values);

        let generated_at = Utc::now();
        let mut out = Vec::with_capacity(horizons.len() * 2);
        for horizon in horizons {
            for (dimension, stats, value) in [
                (Dimension::Cpu, &cpu_stats, cpu_stats.mean),
                (Dimension::Memory, &mem_stats, mem_stats.mean),
            ] {
                let tv = t_value(stats.n);
                let margin = tv * (stats.variance / stats.n as f64).sqrt();
                out.push(Prediction {
                    identity: identity.clone(),
                    dimension,
                    value: value.max(0.0),
                    horizon: *horizon,
                    confidence: confidence_for(stats),
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
        "moving_average"
    }
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
                timestamp: Utc.timestamp_opt(100 + i as i64 * 10, 0).unwrap(),
                identity: identity.clone(),
                cpu_millicores: *v,
                memory_bytes: *v * 1_000_000.0,
            });
        }
        window
    }

    #[test]
    fn below_min_data_points_errors() {
        let predictor = MovingAveragePredictor::default();
        let window = window_with(&[1.0, 2.0]);
        assert!(predictor.predict(&window, &[Duration::minutes(5)]).is_err());
    }

    #[test]
    fn at_min_data_points_succeeds() {
        let predictor = MovingAveragePredictor::default();
        let window = window_with(&[100.0, 100.0, 100.0]);
        let preds = predictor.predict(&window, &[Duration::minutes(5)]).unwrap();
        assert!(!preds.is_empty());
        let cpu_pred = preds.iter().find(|p| p.dimension == Dimension::Cpu).unwrap();
        assert_eq!(cpu_pred.value, 100.0);
        assert!(cpu_pred.confidence > 0.9);
    }
}
