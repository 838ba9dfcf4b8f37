use crate::error::{OperatorError, Result};
use crate::history::HistoryWindow;
use crate::model::{Dimension, Interval, Prediction};
use chrono::{Datelike, Duration, Timelike, Utc};

/// Minimum history span for a seasonal fit to be meaningful. Sample-count
/// minimums don't capture this predictor's real requirement — it needs
/// calendar coverage, not just a handful of points — so `validate_data`
/// checks span directly rather than relying on `min_data_points` alone.
const MIN_HISTORY_SPAN: Duration = Duration::days(3);
/// Floor on raw sample count, in case the window somehow has wide span but
/// very few samples.
const MIN_DATA_POINTS: usize = 3;

/// Extracts per-hour-of-day and per-day-of-week averages, blends them with
/// a trend term, and guards against a terminal spike throwing off the
/// trend extrapolation.
pub struct SeasonalPredictor;

impl Default for SeasonalPredictor {
    fn default() -> Self {
        Self
    }
}

fn hour_of_day_mean(samples: &[&crate::model::Sample], hour: u32, value_of: impl Fn(&crate::model::Sample) -> f64) -> Option<f64> {
    let matching: Vec<f64> = samples
        .iter()
        .filter(|s| s.timestamp.hour() == hour)
        .map(|s| value_of(s))
        .collect();
    if matching.is_empty() {
        None
    } else {
        Some(matching.iter().sum::<f64>() / matching.len() as f64)
    }
}

fn day_of_week_mean(
    samples: &[&crate::model::Sample],
    weekday: chrono::Weekday,
    value_of: impl Fn(&crate::model::Sample) -> f64,
) -> Option<f64> {
    let matching: Vec<f64> = samples
        .iter()
        .filter(|s| s.timestamp.weekday() == weekday)
        .map(|s| value_of(s))
        .collect();
    if matching.is_empty() {
        None
    } else {
        Some(matching.iter().sum::<f64>() / matching.len() as f64)
    }
}

fn overall_mean(samples: &[&crate::model::Sample], value_of: impl Fn(&crate::model::Sample) -> f64) -> f64 {
    let values: Vec<f64> = samples.iter().map(|s| value_of(s)).collect();
    values.iter().sum::<f64>() / values.len() as f64
}

fn terminal_spike(samples: &[&crate::model::Sample], value_of: impl Fn(&crate::model::Sample) -> f64) -> bool {
    let last = match samples.last() {
        Some(s) => value_of(s),
        None => return false,
    };
    let prefix_len = (samples.len() / 10).max(1);
    let prefix_mean = overall_mean(&samples[..prefix_len], &value_of);
    prefix_mean > 0.0 && last > 1.5 * prefix_mean
}

fn forecast_dimension(
    samples: &[&crate::model::Sample],
    target_hour: u32,
    target_weekday: chrono::Weekday,
    value_of: impl Fn(&crate::model::Sample) -> f64 + Copy,
) -> (f64, f64) {
    let mean = overall_mean(samples, value_of);
    let hour_component = hour_of_day_mean(samples, target_hour, value_of).unwrap_or(mean);
    let day_component = day_of_week_mean(samples, target_weekday, value_of).unwrap_or(mean);
    let baseline = 0.7 * hour_component + 0.3 * day_component;

    let trend = if terminal_spike(samples, value_of) {
        0.0
    } else {
        let half = samples.len() / 2;
        if half == 0 {
            0.0
        } else {
            let first_half_mean = overall_mean(&samples[..half], value_of);
            let second_half_mean = overall_mean(&samples[half..], value_of);
            second_half_mean - first_half_mean
        }
    };

    (baseline, trend)
}

impl super::Predictor for SeasonalPredictor {
    fn min_data_points(&self) -> usize {
        MIN_DATA_POINTS
    }

    fn validate_data(&self, history: &HistoryWindow) -> Result<()> {
        if history.len() < MIN_DATA_POINTS {
            return Err(OperatorError::InsufficientHistory {
                identity: history
                    .newest()
                    .map(|s| s.identity.clone())
                    .unwrap_or_else(|| crate::identity::ContainerIdentity::new("", "", "")),
                have: history.len(),
                need: MIN_DATA_POINTS,
            });
        }
        let oldest = history.iter().next().unwrap();
        let newest = history.newest().unwrap();
        let span = newest.timestamp - oldest.timestamp;
        if span < MIN_HISTORY_SPAN {
            return Err(OperatorError::InsufficientHistory {
                identity: newest.identity.clone(),
                have: history.len(),
                need: MIN_DATA_POINTS,
            });
        }
        Ok(())
    }

    fn predict(&self, history: &HistoryWindow, horizons: &[Duration]) -> Result<Vec<Prediction>> {
        self.validate_data(history)?;

        let samples: Vec<&crate::model::Sample> = history.iter().collect();
        let identity = samples.last().unwrap().identity.clone();
        let generated_at = Utc::now();

        let mut out = Vec::with_capacity(horizons.len() * 2);
        for horizon in horizons {
            let target_time = generated_at + *horizon;
            let target_hour = target_time.hour();
            let target_weekday = target_time.weekday();

            for dimension in [Dimension::Cpu, Dimension::Memory] {
                let value_of = move |s: &crate::model::Sample| match dimension {
                    Dimension::Cpu => s.cpu_millicores,
                    Dimension::Memory => s.memory_bytes,
                };
                let (baseline, trend) =
                    forecast_dimension(&samples, target_hour, target_weekday, value_of);
                let value = (baseline + trend).max(0.0);
                let mean = overall_mean(&samples, value_of);
                let variance = samples
                    .iter()
                    .map(|s| (value_of(s) - mean).powi(2))
                    .sum::<f64>()
                    / samples.len() as f64;
                let margin = 1.96 * variance.sqrt();

                // Confidence rewards having enough same-hour/same-weekday
                // observations to trust the seasonal components.
                let hour_count = samples.iter().filter(|s| s.timestamp.hour() == target_hour).count();
                let day_count = samples
                    .iter()
                    .filter(|s| s.timestamp.weekday() == target_weekday)
                    .count();
                let coverage = ((hour_count.min(10) as f64 / 10.0) * 0.5)
                    + ((day_count.min(10) as f64 / 10.0) * 0.5);

                out.push(Prediction {
                    identity: identity.clone(),
                    dimension,
                    value,
                    horizon: *horizon,
                    confidence: coverage.clamp(0.0, 1.0),
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
        "seasonal"
    }
}

#[cfg(test)]
mod tests {
    use super::super::Predictor;
    use super::*;
    use crate::identity::ContainerIdentity;
    use crate::model::Sample;
    use chrono::TimeZone;

    #[test]
    fn below_min_span_errors() {
        let identity = ContainerIdentity::new("ns", "pod", "c");
        let mut window = HistoryWindow::new();
        for i in 0..5 {
            window.insert(Sample {
                timestamp: Utc.timestamp_opt(1000 + i * 60, 0).unwrap(),
                identity: identity.clone(),
                cpu_millicores: 10.0,
                memory_bytes: 10.0,
            });
        }
        let predictor = SeasonalPredictor::default();
        assert!(predictor.predict(&window, &[Duration::hours(1)]).is_err());
    }

    #[test]
    fn sufficient_span_succeeds() {
        let identity = ContainerIdentity::new("ns", "pod", "c");
        let mut window = HistoryWindow::new();
        let start = Utc.timestamp_opt(0, 0).unwrap();
        for i in 0..100 {
            window.insert(Sample {
                timestamp: start + Duration::hours(i),
                identity: identity.clone(),
                cpu_millicores: 100.0,
                memory_bytes: 100_000_000.0,
            });
        }
        let predictor = SeasonalPredictor::default();
        let preds = predictor.predict(&window, &[Duration::hours(2)]).unwrap();
        assert!(!preds.is_empty());
    }
}
