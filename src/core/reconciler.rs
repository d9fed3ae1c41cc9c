//! Merge per-source slots into the reconciled view
//!
//! For every metric the freshest-ranked source wins: candidates are ordered
//! by effective precedence (Explorer, Prometheus, RPC, Simulated), and any
//! snapshot older than its source's freshness window is skipped entirely.
//! RPC-derived explorer snapshots are ranked and aged as node data.

use chrono::{DateTime, Utc};
use quai_dash_core::{is_fresh, SlotSet, HASHES_PER_DIFFICULTY_UNIT, SYNC_STATUS_FRESHNESS};
use quai_dash_types::{
    DerivedMetrics, MetricsSnapshot, Reading, ReconciledView, SourceKind, SourceReport,
    SourceStatus, SourcesConfig,
};
use std::time::Duration;

/// Fresh snapshots, best first
struct Candidates<'a> {
    ranked: Vec<&'a MetricsSnapshot>,
}

impl<'a> Candidates<'a> {
    fn collect(
        slots: &'a SlotSet,
        sources: &SourcesConfig,
        cap: Option<Duration>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut ranked: Vec<&MetricsSnapshot> = SourceKind::BY_PRECEDENCE
            .iter()
            .filter_map(|&kind| {
                let entry = slots.get(kind)?;
                // RPC-derived data ages like node data
                let ranked_as = entry.snapshot.as_ref()?.effective_kind();
                let window = sources.freshness_window(ranked_as);
                let window = cap.map_or(window, |cap| window.min(cap));
                entry.fresh_snapshot(window, now)
            })
            .collect();
        // Stable: equal precedence keeps the newer capture first
        ranked.sort_by(|a, b| {
            b.effective_precedence()
                .cmp(&a.effective_precedence())
                .then(b.captured_at.cmp(&a.captured_at))
        });
        Self { ranked }
    }

    fn pick<T>(&self, read: impl Fn(&'a MetricsSnapshot) -> Option<T>) -> Reading<T> {
        self.ranked
            .iter()
            .find_map(|&snapshot| {
                read(snapshot)
                    .map(|value| Reading::known(value, snapshot.source, snapshot.captured_at))
            })
            .unwrap_or(Reading::Unknown)
    }
}

fn source_report(
    slots: &SlotSet,
    sources: &SourcesConfig,
    kind: SourceKind,
    now: DateTime<Utc>,
) -> SourceReport {
    let entry = slots.get(kind);
    let snapshot = entry.and_then(|entry| entry.snapshot.as_ref());
    let ranked_as = snapshot.map_or(kind, MetricsSnapshot::effective_kind);
    let window = sources.freshness_window(ranked_as);
    let status = if !sources.is_enabled(kind) {
        SourceStatus::NotConfigured
    } else {
        match snapshot {
            Some(snapshot) if is_fresh(snapshot.captured_at, window, now) => {
                SourceStatus::Connected
            }
            Some(_) => SourceStatus::Stale,
            None => SourceStatus::Offline,
        }
    };
    SourceReport {
        kind,
        status,
        last_update: snapshot.map(|snapshot| snapshot.captured_at),
        last_error: entry.and_then(|entry| entry.last_error.clone()),
    }
}

/// Expected seconds until the rig finds a block
pub fn time_to_block(difficulty: f64, hash_rate: f64) -> Option<f64> {
    if hash_rate > 0.0 && difficulty > 0.0 {
        Some(difficulty / (hash_rate * HASHES_PER_DIFFICULTY_UNIT))
    } else {
        None
    }
}

/// Chance of finding a block within `tick`
pub fn block_probability(hash_rate: f64, tick: Duration, difficulty: f64) -> Option<f64> {
    if difficulty > 0.0 && hash_rate >= 0.0 {
        Some((hash_rate * tick.as_secs_f64() / difficulty).min(1.0))
    } else {
        None
    }
}

/// Hash rate per kilowatt
pub fn efficiency(hash_rate: f64, power_watts: f64) -> Option<f64> {
    if power_watts > 0.0 {
        Some(hash_rate / (power_watts / 1000.0))
    } else {
        None
    }
}

/// Build the view from a slot set
///
/// Never fails: an empty slot set yields a view with every metric unknown.
/// Mining totals, share rate and running averages are left for
/// `MiningState::observe`, which owns the state they need.
pub fn reconcile(
    slots: &SlotSet,
    sources: &SourcesConfig,
    tick: Duration,
    now: DateTime<Utc>,
) -> ReconciledView {
    let fresh = Candidates::collect(slots, sources, None, now);
    let sync = Candidates::collect(slots, sources, Some(SYNC_STATUS_FRESHNESS), now);

    let mut view = ReconciledView::empty(now);
    view.block_height = fresh.pick(|s| s.block_height);
    view.difficulty = fresh.pick(|s| s.difficulty);
    view.block_time = fresh.pick(|s| s.block_time);
    view.network_hash_rate = fresh.pick(|s| s.network_hash_rate);
    view.peer_count = fresh.pick(|s| s.peer_count);
    view.sync_status = sync.pick(|s| s.sync_status);
    view.gas_price = fresh.pick(|s| s.gas_price);
    view.pending_tx_count = fresh.pick(|s| s.pending_tx_count);
    view.local_hash_rate = fresh.pick(|s| s.local_hash_rate);
    view.power_usage = fresh.pick(|s| s.power_usage);
    view.accepted_shares = fresh.pick(|s| s.accepted_shares);
    view.rejected_shares = fresh.pick(|s| s.rejected_shares);
    view.mining = fresh.pick(|s| s.mining);
    view.gpus = fresh.pick(|s| (!s.gpus.is_empty()).then(|| s.gpus.clone()));

    let difficulty = view.difficulty.get();
    let hash_rate = view.local_hash_rate.get();
    view.derived = DerivedMetrics {
        time_to_block: difficulty.zip(hash_rate).and_then(|(d, h)| time_to_block(d, h)),
        block_probability: difficulty
            .zip(hash_rate)
            .and_then(|(d, h)| block_probability(h, tick, d)),
        efficiency: hash_rate
            .zip(view.power_usage.get())
            .and_then(|(h, p)| efficiency(h, p)),
        ..DerivedMetrics::default()
    };

    view.sources = SourceKind::BY_PRECEDENCE
        .iter()
        .map(|&kind| source_report(slots, sources, kind, now))
        .collect();
    view
}
