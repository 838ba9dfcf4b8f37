//! History store (spec §4.4): a bounded, time-ordered ring of usage
//! samples per container. Bounded by both sample count and age; eviction
//! is amortized O(1) from the head.

use crate::model::Sample;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::{BTreeMap, VecDeque};

pub const DEFAULT_CAPACITY: usize = 12_000;
pub const DEFAULT_MAX_AGE: ChronoDuration = ChronoDuration::days(7);

/// Samples older than this relative to the newest sample currently stored
/// may still be inserted in timestamp order; anything older is dropped as
/// stale rather than reordering a large deque.
const OUT_OF_ORDER_GRACE: ChronoDuration = ChronoDuration::minutes(1);

/// One container's bounded sample history.
pub struct HistoryWindow {
    samples: VecDeque<Sample>,
    capacity: usize,
    max_age: ChronoDuration,
}

impl HistoryWindow {
    pub fn new() -> Self {
        Self::with_bounds(DEFAULT_CAPACITY, DEFAULT_MAX_AGE)
    }

    pub fn with_bounds(capacity: usize, max_age: ChronoDuration) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            max_age,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn newest(&self) -> Option<&Sample> {
        self.samples.back()
    }

    /// Insert `sample` in timestamp order. In-order appends are O(1).
    /// Out-of-order samples within the grace period are inserted by
    /// timestamp (O(n) worst case, rare in practice); samples older than
    /// the grace period relative to the newest stored sample are dropped.
    pub fn insert(&mut self, sample: Sample) {
        match self.samples.back() {
            None => self.samples.push_back(sample),
            Some(latest) if sample.timestamp >= latest.timestamp => {
                self.samples.push_back(sample)
            }
            Some(latest) => {
                if latest.timestamp - sample.timestamp > OUT_OF_ORDER_GRACE {
                    return;
                }
                let pos = self
                    .samples
                    .iter()
                    .position(|s| s.timestamp > sample.timestamp)
                    .unwrap_or(self.samples.len());
                self.samples.insert(pos, sample);
            }
        }
        self.evict();
    }

    /// Evict from the head until both the count and age bounds are
    /// satisfied.
    pub fn evict(&mut self) {
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
        if let Some(newest) = self.samples.back().map(|s| s.timestamp) {
            let cutoff = newest - self.max_age;
            while let Some(oldest) = self.samples.front() {
                if oldest.timestamp < cutoff {
                    self.samples.pop_front();
                } else {
                    break;
                }
            }
        }
    }

    /// All samples with `timestamp >= since`, in timestamp order.
    pub fn since(&self, since: DateTime<Utc>) -> Vec<&Sample> {
        let start = self
            .samples
            .partition_point(|s| s.timestamp < since);
        self.samples.iter().skip(start).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    /// Clone the current samples out so a caller can work with them without
    /// holding whatever lock guards the owning `HistoryStore` across an
    /// `.await` point (predictors run concurrently via `PredictionEngine`).
    pub fn samples_snapshot(&self) -> Vec<Sample> {
        self.samples.iter().cloned().collect()
    }

    /// Rebuild a window from a snapshot taken via `samples_snapshot`. The
    /// input is assumed already ordered and within bounds.
    pub fn from_snapshot(samples: Vec<Sample>, capacity: usize, max_age: ChronoDuration) -> Self {
        Self {
            samples: samples.into(),
            capacity,
            max_age,
        }
    }
}

impl Default for HistoryWindow {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-container history, keyed by workload-scoped container identity
/// string so callers don't need `ContainerIdentity` to implement a custom
/// map key ordering beyond what it already derives.
#[derive(Default)]
pub struct HistoryStore {
    windows: BTreeMap<String, HistoryWindow>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, sample: Sample) {
        let key = sample.identity.to_string();
        self.windows.entry(key).or_insert_with(HistoryWindow::new).insert(sample);
    }

    pub fn window(&self, identity_key: &str) -> Option<&HistoryWindow> {
        self.windows.get(identity_key)
    }

    /// Hourly cleanup: re-run eviction on every window. Cheap because
    /// `evict` is a no-op once bounds are already satisfied.
    pub fn cleanup(&mut self) {
        for window in self.windows.values_mut() {
            window.evict();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::ContainerIdentity;

    fn sample(identity: &ContainerIdentity, secs: i64, cpu: f64) -> Sample {
        Sample {
            timestamp: DateTime::<Utc>::from_timestamp(secs, 0).unwrap(),
            identity: identity.clone(),
            cpu_millicores: cpu,
            memory_bytes: 0.0,
        }
    }

    #[test]
    fn in_order_append_is_ordered() {
        let identity = ContainerIdentity::new("ns", "pod", "c");
        let mut window = HistoryWindow::new();
        for i in 0..5 {
            window.insert(sample(&identity, i * 10, i as f64));
        }
        assert_eq!(window.len(), 5);
        assert_eq!(window.newest().unwrap().cpu_millicores, 4.0);
    }

    #[test]
    fn out_of_order_within_grace_is_inserted_by_timestamp() {
        let identity = ContainerIdentity::new("ns", "pod", "c");
        let mut window = HistoryWindow::new();
        window.insert(sample(&identity, 100, 1.0));
        window.insert(sample(&identity, 130, 2.0));
        window.insert(sample(&identity, 110, 1.5));

        let ordered: Vec<f64> = window.iter().map(|s| s.cpu_millicores).collect();
        assert_eq!(ordered, vec![1.0, 1.5, 2.0]);
    }

    #[test]
    fn out_of_order_beyond_grace_is_dropped() {
        let identity = ContainerIdentity::new("ns", "pod", "c");
        let mut window = HistoryWindow::new();
        window.insert(sample(&identity, 1000, 1.0));
        window.insert(sample(&identity, 100, 99.0));
        assert_eq!(window.len(), 1);
    }

    #[test]
    fn count_bound_evicts_from_head() {
        let identity = ContainerIdentity::new("ns", "pod", "c");
        let mut window = HistoryWindow::with_bounds(3, ChronoDuration::days(7));
        for i in 0..10 {
            window.insert(sample(&identity, i * 10, i as f64));
        }
        assert_eq!(window.len(), 3);
        assert_eq!(window.newest().unwrap().cpu_millicores, 9.0);
    }

    #[test]
    fn age_bound_evicts_stale_samples() {
        let identity = ContainerIdentity::new("ns", "pod", "c");
        let mut window = HistoryWindow::with_bounds(DEFAULT_CAPACITY, ChronoDuration::seconds(100));
        window.insert(sample(&identity, 0, 1.0));
        window.insert(sample(&identity, 50, 2.0));
        window.insert(sample(&identity, 200, 3.0));
        assert_eq!(window.len(), 2);
    }

    #[test]
    fn since_query_returns_matching_tail() {
        let identity = ContainerIdentity::new("ns", "pod", "c");
        let mut window = HistoryWindow::new();
        for i in 0..5 {
            window.insert(sample(&identity, i * 10, i as f64));
        }
        let cutoff = DateTime::<Utc>::from_timestamp(20, 0).unwrap();
        let tail = window.since(cutoff);
        assert_eq!(tail.len(), 3);
    }
}
