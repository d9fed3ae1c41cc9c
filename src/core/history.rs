//! Bounded per-tick history for charts and export

use chrono::{DateTime, Utc};
use quai_dash_types::ReconciledView;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// One reconcile tick, reduced to the charted series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub at: DateTime<Utc>,
    pub hash_rate: Option<f64>,
    pub power: Option<f64>,
    pub temperature: Option<f64>,
    pub block_height: Option<u64>,
    pub share_rate: Option<f64>,
}

impl HistoryPoint {
    pub fn from_view(view: &ReconciledView) -> Self {
        Self {
            at: view.generated_at,
            hash_rate: view.local_hash_rate.get(),
            power: view.power_usage.get(),
            temperature: view.max_gpu_temperature(),
            block_height: view.block_height.get(),
            share_rate: view.derived.share_rate,
        }
    }
}

/// Ring of the most recent history points
#[derive(Debug, Clone)]
pub struct History {
    points: VecDeque<HistoryPoint>,
    capacity: usize,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            points: VecDeque::with_capacity(capacity.min(4096)),
            capacity,
        }
    }

    pub fn push(&mut self, point: HistoryPoint) {
        if self.capacity == 0 {
            return;
        }
        while self.points.len() >= self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(point);
    }

    pub fn record(&mut self, view: &ReconciledView) {
        self.push(HistoryPoint::from_view(view));
    }

    /// Change the capacity, dropping the oldest points if it shrank
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        while self.points.len() > capacity {
            self.points.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points oldest first
    pub fn iter(&self) -> impl Iterator<Item = &HistoryPoint> {
        self.points.iter()
    }

    pub fn to_vec(&self) -> Vec<HistoryPoint> {
        self.points.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use quai_dash_types::{Reading, SourceKind};

    fn view_at(secs: i64, height: u64) -> ReconciledView {
        let at = Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap();
        let mut view = ReconciledView::empty(at);
        view.block_height = Reading::known(height, SourceKind::Node, at);
        view
    }

    #[test]
    fn test_ring_drops_oldest() {
        let mut history = History::new(3);
        for i in 0..5 {
            history.record(&view_at(i, 100 + i as u64));
        }
        let heights: Vec<_> = history.iter().map(|p| p.block_height).collect();
        assert_eq!(heights, vec![Some(102), Some(103), Some(104)]);
    }

    #[test]
    fn test_unknown_metrics_stay_unknown() {
        let mut history = History::new(10);
        history.record(&ReconciledView::empty(Utc::now()));
        let point = &history.to_vec()[0];
        assert_eq!(point.hash_rate, None);
        assert_eq!(point.block_height, None);
    }

    #[test]
    fn test_shrinking_capacity() {
        let mut history = History::new(5);
        for i in 0..5 {
            history.record(&view_at(i, i as u64));
        }
        history.set_capacity(2);
        assert_eq!(history.len(), 2);
        assert_eq!(history.iter().next().and_then(|p| p.block_height), Some(3));
    }
}
