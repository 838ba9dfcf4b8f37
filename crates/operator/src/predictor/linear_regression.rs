use super::t_value;
use crate::error::Result;
use crate::history::HistoryWindow;
use crate::model::{Dimension, Interval, Prediction};
use chrono::{Duration, Utc};

const MIN_DATA_POINTS: usize = 3;

/// Ordinary least squares over `x = seconds since window start`. Falls
/// back to a flat mean when `x` has no spread (all samples at the same
/// instant — degenerate but not an error).
pub struct LinearRegressionPredictor;

impl Default for LinearRegressionPredictor {
    fn default() -> Self {
        Self
    }
}

struct Fit {
    slope: f64,
    intercept: f64,
    r_squared: f64,
    residual_std_error: f64,
    n: usize,
}

fn fit(xs: &[f64], ys: &[f64]) -> Fit {
    let n = xs.len();
    let mean_x = xs.iter().sum::<f64>() / n as f64;
    let mean_y = ys.iter().sum::<f64>() / n as f64;

    let mut num = 0.0;
    let mut den = 0.0;
    for i in 0..n {
        num += (xs[i] - mean_x) * (ys[i] - mean_y);
        den += (xs[i] - mean_x).powi(2);
    }

    if den.abs() < f64::EPSILON {
        return Fit {
            slope: 0.0,
            intercept: mean_y,
            r_squared: 0.0,
            residual_std_error: 0.0,
            n,
        };
    }

    let slope = num / den;
    let intercept = mean_y - slope * mean_x;

    let mut ss_res = 0.0;
    let mut ss_tot = 0.0;
    for i in 0..n {
        let predicted = intercept + slope * xs[i];
        ss_res += (ys[i] - predicted).powi(2);
        ss_tot += (ys[i] - mean_y).powi(2);
    }

    let r_squared = if ss_tot.abs() < f64::EPSILON {
        1.0
    } else {
        (1.0 - ss_res / ss_tot).clamp(0.0, 1.0)
    };

    let residual_std_error = if n > 2 {
        (ss_res / (n - 2) as f64).sqrt()
    } else {
        0.0
    };

    Fit {
        slope,
        intercept,
        r_squared,
        residual_std_error,
        n,
    }
}

impl super::Predictor for LinearRegressionPredictor {
    fn min_data_points(&self) -> usize {
        MIN_DATA_POINTS
    }

    fn predict(&self, history: &HistoryWindow, horizons: &[Duration]) -> Result<Vec<Prediction>> {
        self.validate_data(history)?;

        let samples: Vec<&crate::model::Sample> = history.iter().collect();
        let identity = samples.last().unwrap().identity.clone();
        let start = samples[0].timestamp;
        let xs: Vec<f64> = samples
            .iter()
            .map(|s| (s.timestamp - start).num_seconds() as f64)
            .collect();
        let cpu_ys: Vec<f64> = samples.iter().map(|s| s.cpu_millicores).collect();
        let mem_ys: Vec<f64> = samples.iter().map(|s| s.memory_bytes).collect();

        let cpu_fit = fit(&xs, &cpu_ys);
        let mem_fit = fit(&xs, &mem_ys);
        let last_x = *xs.last().unwrap();

        let generated_at = Utc::now();
        let mut out = Vec::with_capacity(horizons.len() * 2);
        for horizon in horizons {
            let x = last_x + horizon.num_seconds() as f64;
            for (dimension, fit) in [(Dimension::Cpu, &cpu_fit), (Dimension::Memory, &mem_fit)] {
                let value = (fit.intercept + fit.slope * x).max(0.0);
                let tv = t_value(fit.n);
                let margin = tv * fit.residual_std_error;
                out.push(Prediction {
                    identity: identity.clone(),
                    dimension,
                    value,
                    horizon: *horizon,
                    confidence: fit.r_squared * (0.5 + 0.5 * (fit.n as f64 / 20.0).min(1.0)),
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
        "linear_regression"
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
                timestamp: Utc.timestamp_opt(1000 + i as i64 * 60, 0).unwrap(),
                identity: identity.clone(),
                cpu_millicores: *v,
                memory_bytes: *v * 1_000_000.0,
            });
        }
        window
    }

    #[test]
    fn perfectly_linear_series_has_high_confidence() {
        let predictor = LinearRegressionPredictor::default();
        let window = window_with(&[100.0, 110.0, 120.0, 130.0, 140.0]);
        let preds = predictor.predict(&window, &[Duration::minutes(1)]).unwrap();
        let cpu_pred = preds.iter().find(|p| p.dimension == Dimension::Cpu).unwrap();
        assert!(cpu_pred.confidence > 0.9);
        assert!(cpu_pred.value > 140.0);
    }

    #[test]
    fn degenerate_same_timestamp_falls_back_to_mean() {
        let identity = ContainerIdentity::new("ns", "pod", "c");
        let mut window = HistoryWindow::new();
        for v in [10.0, 20.0, 30.0] {
            window.insert(Sample {
                timestamp: Utc.timestamp_opt(1000, 0).unwrap(),
                identity: identity.clone(),
                cpu_millicores: v,
                memory_bytes: v,
            });
        }
        let predictor = LinearRegressionPredictor::default();
        let preds = predictor.predict(&window, &[Duration::minutes(1)]).unwrap();
        let cpu_pred = preds.iter().find(|p| p.dimension == Dimension::Cpu).unwrap();
        assert!((cpu_pred.value - 20.0).abs() < 1e-6);
    }
}
