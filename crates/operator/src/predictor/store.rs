//! Prediction storage (spec §4.4): predictions are optionally retained
//! independently of the usage history they were computed from, with their
//! own 24h retention and an hourly cleanup sweep evicting by both
//! `HistoryStore`'s and this store's policies.

use crate::model::{Dimension, Prediction};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::BTreeMap;

pub const DEFAULT_RETENTION: ChronoDuration = ChronoDuration::hours(24);

/// Predictions generated for one container, most recent batch last.
#[derive(Default)]
struct ContainerPredictions {
    entries: Vec<Prediction>,
}

/// Keyed by container identity string, mirroring `HistoryStore`. Retention
/// is independent of (and typically much shorter than) the usage history
/// it was derived from: a stale forecast is worse than none.
pub struct PredictionStore {
    by_container: BTreeMap<String, ContainerPredictions>,
    retention: ChronoDuration,
}

impl PredictionStore {
    pub fn new() -> Self {
        Self::with_retention(DEFAULT_RETENTION)
    }

    pub fn with_retention(retention: ChronoDuration) -> Self {
        Self {
            by_container: BTreeMap::new(),
            retention,
        }
    }

    /// Record a fresh batch of predictions for one container, replacing any
    /// prior prediction for the same (dimension, horizon) pair.
    pub fn record(&mut self, identity_key: &str, predictions: Vec<Prediction>) {
        let slot = self
            .by_container
            .entry(identity_key.to_string())
            .or_default();
        for fresh in predictions {
            slot.entries.retain(|existing| {
                !(existing.dimension == fresh.dimension && existing.horizon == fresh.horizon)
            });
            slot.entries.push(fresh);
        }
    }

    /// The freshest non-expired prediction for a dimension, closest horizon
    /// first.
    pub fn latest(&self, identity_key: &str, dimension: Dimension) -> Option<&Prediction> {
        let now = Utc::now();
        self.by_container.get(identity_key).and_then(|slot| {
            slot.entries
                .iter()
                .filter(|p| p.dimension == dimension && !self.is_expired(p, now))
                .min_by_key(|p| p.horizon)
        })
    }

    pub fn for_container(&self, identity_key: &str) -> &[Prediction] {
        self.by_container
            .get(identity_key)
            .map(|slot| slot.entries.as_slice())
            .unwrap_or(&[])
    }

    fn is_expired(&self, prediction: &Prediction, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(prediction.generated_at) > self.retention
    }

    /// Hourly cleanup: drop expired predictions and any container left with
    /// none. Mirrors `HistoryStore::cleanup`'s cadence (spec §4.4).
    pub fn cleanup(&mut self) {
        let now = Utc::now();
        let retention = self.retention;
        self.by_container.retain(|_, slot| {
            slot.entries
                .retain(|p| now.signed_duration_since(p.generated_at) <= retention);
            !slot.entries.is_empty()
        });
    }
}

impl Default for PredictionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::ContainerIdentity;
    use chrono::Duration;

    fn prediction(dimension: Dimension, horizon_mins: i64, generated_at: DateTime<Utc>) -> Prediction {
        Prediction {
            identity: ContainerIdentity::new("ns", "pod", "c"),
            dimension,
            value: 100.0,
            horizon: Duration::minutes(horizon_mins),
            confidence: 0.8,
            interval: crate::model::Interval {
                lower: 90.0,
                upper: 110.0,
                pct: 0.95,
            },
            method: "moving_average".to_string(),
            generated_at,
        }
    }

    #[test]
    fn latest_returns_closest_horizon_for_dimension() {
        let mut store = PredictionStore::new();
        let now = Utc::now();
        store.record(
            "ns/pod/c",
            vec![
                prediction(Dimension::Cpu, 30, now),
                prediction(Dimension::Cpu, 10, now),
                prediction(Dimension::Memory, 10, now),
            ],
        );
        let latest = store.latest("ns/pod/c", Dimension::Cpu).unwrap();
        assert_eq!(latest.horizon, Duration::minutes(10));
    }

    #[test]
    fn record_replaces_same_dimension_and_horizon() {
        let mut store = PredictionStore::new();
        let now = Utc::now();
        store.record("ns/pod/c", vec![prediction(Dimension::Cpu, 10, now)]);
        let mut replacement = prediction(Dimension::Cpu, 10, now);
        replacement.value = 200.0;
        store.record("ns/pod/c", vec![replacement]);
        assert_eq!(store.for_container("ns/pod/c").len(), 1);
        assert_eq!(store.latest("ns/pod/c", Dimension::Cpu).unwrap().value, 200.0);
    }

    #[test]
    fn cleanup_evicts_expired_predictions_and_empty_containers() {
        let mut store = PredictionStore::with_retention(Duration::hours(1));
        let stale = Utc::now() - Duration::hours(2);
        store.record("ns/pod/c", vec![prediction(Dimension::Cpu, 10, stale)]);
        store.cleanup();
        assert!(store.for_container("ns/pod/c").is_empty());
        assert!(store.latest("ns/pod/c", Dimension::Cpu).is_none());
    }
}
