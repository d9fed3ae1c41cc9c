//! Per-source data slots
//!
//! Each poller owns a `SlotWriter` for its own source and nothing else. The
//! reconciler reads every slot at once through `SlotStore::snapshot`, which
//! clones the table so no lock is held while a view is built.

use chrono::{DateTime, Utc};
use log::debug;
use quai_dash_types::{MetricsSnapshot, SourceKind};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use thiserror::Error;

/// Why a snapshot was refused by its slot
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SlotError {
    #[error("{writer} writer cannot publish a {snapshot} snapshot")]
    WrongSource {
        writer: SourceKind,
        snapshot: SourceKind,
    },

    #[error("snapshot captured at {attempted} is older than the stored one from {current}")]
    OutOfOrder {
        current: DateTime<Utc>,
        attempted: DateTime<Utc>,
    },

    #[error("real data has been observed, simulated data is no longer accepted")]
    RealDataPresent,
}

/// Everything known about one source
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SlotEntry {
    /// Most recent accepted snapshot
    pub snapshot: Option<MetricsSnapshot>,
    /// Whether the source is enabled with a usable configuration
    pub configured: bool,
    /// Error from the most recent poll, cleared by the next success
    pub last_error: Option<String>,
    pub last_attempt: Option<DateTime<Utc>>,
    pub successes: u64,
}

impl SlotEntry {
    /// Snapshot if it is no older than `window` at `now`
    pub fn fresh_snapshot(&self, window: Duration, now: DateTime<Utc>) -> Option<&MetricsSnapshot> {
        self.snapshot
            .as_ref()
            .filter(|snapshot| is_fresh(snapshot.captured_at, window, now))
    }
}

/// Whether something captured at `captured_at` is still within `window`
///
/// A capture time in the future (clock skew between hosts) counts as fresh.
pub fn is_fresh(captured_at: DateTime<Utc>, window: Duration, now: DateTime<Utc>) -> bool {
    match now.signed_duration_since(captured_at).to_std() {
        Ok(age) => age <= window,
        Err(_) => true,
    }
}

#[derive(Debug, Default)]
struct SlotTable {
    entries: BTreeMap<SourceKind, SlotEntry>,
    real_data_seen: bool,
}

/// Point-in-time copy of every slot
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SlotSet {
    entries: BTreeMap<SourceKind, SlotEntry>,
    real_data_seen: bool,
}

impl SlotSet {
    /// Build a slot set directly from snapshots (one per source)
    pub fn from_snapshots(snapshots: impl IntoIterator<Item = MetricsSnapshot>) -> Self {
        let mut set = Self::default();
        for snapshot in snapshots {
            if snapshot.source.is_external() {
                set.real_data_seen = true;
            }
            let entry = set.entries.entry(snapshot.source).or_default();
            entry.configured = true;
            entry.successes += 1;
            entry.last_attempt = Some(snapshot.captured_at);
            entry.snapshot = Some(snapshot);
        }
        set
    }

    pub fn get(&self, kind: SourceKind) -> Option<&SlotEntry> {
        self.entries.get(&kind)
    }

    /// True once any external source has published successfully
    pub fn real_data_seen(&self) -> bool {
        self.real_data_seen
    }

    pub fn is_empty(&self) -> bool {
        self.entries.values().all(|entry| entry.snapshot.is_none())
    }
}

/// Shared table of per-source slots
#[derive(Debug, Clone, Default)]
pub struct SlotStore {
    inner: Arc<RwLock<SlotTable>>,
}

impl SlotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write handle for one source's slot
    pub fn writer(&self, kind: SourceKind) -> SlotWriter {
        SlotWriter {
            kind,
            store: self.clone(),
        }
    }

    /// Clone of every slot, for reconciliation
    pub fn snapshot(&self) -> SlotSet {
        let table = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        SlotSet {
            entries: table.entries.clone(),
            real_data_seen: table.real_data_seen,
        }
    }

    pub fn real_data_seen(&self) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .real_data_seen
    }

    /// Restore the "real data seen" flag (e.g. from persisted state)
    pub fn mark_real_data_seen(&self) {
        let mut table = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        table.real_data_seen = true;
        if let Some(entry) = table.entries.get_mut(&SourceKind::Simulated) {
            entry.snapshot = None;
        }
    }

    fn with_entry<R>(&self, kind: SourceKind, f: impl FnOnce(&mut SlotTable) -> R) -> R {
        let mut table = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        table.entries.entry(kind).or_default();
        f(&mut table)
    }
}

/// Write access to exactly one slot
#[derive(Debug, Clone)]
pub struct SlotWriter {
    kind: SourceKind,
    store: SlotStore,
}

impl SlotWriter {
    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    /// Store a new snapshot
    ///
    /// Snapshots older than the stored one are refused, as is simulated data
    /// once any external source has delivered.
    pub fn publish(&self, snapshot: MetricsSnapshot) -> Result<(), SlotError> {
        if snapshot.source != self.kind {
            return Err(SlotError::WrongSource {
                writer: self.kind,
                snapshot: snapshot.source,
            });
        }

        let kind = self.kind;
        self.store.with_entry(kind, |table| {
            if kind == SourceKind::Simulated && table.real_data_seen {
                return Err(SlotError::RealDataPresent);
            }

            let entry = table.entries.entry(kind).or_default();
            if let Some(current) = &entry.snapshot {
                if snapshot.captured_at < current.captured_at {
                    return Err(SlotError::OutOfOrder {
                        current: current.captured_at,
                        attempted: snapshot.captured_at,
                    });
                }
            }

            entry.last_attempt = Some(snapshot.captured_at);
            entry.last_error = None;
            entry.successes += 1;
            entry.snapshot = Some(snapshot);

            if kind.is_external() && !table.real_data_seen {
                debug!("First real data from {}, retiring simulated data", kind);
                table.real_data_seen = true;
                if let Some(simulated) = table.entries.get_mut(&SourceKind::Simulated) {
                    simulated.snapshot = None;
                }
            }
            Ok(())
        })
    }

    /// Note a failed poll; the previous snapshot stays and ages out on its own
    pub fn record_failure(&self, message: impl Into<String>, at: DateTime<Utc>) {
        let message = message.into();
        self.store.with_entry(self.kind, |table| {
            if let Some(entry) = table.entries.get_mut(&self.kind) {
                entry.last_attempt = Some(at);
                entry.last_error = Some(message);
            }
        });
    }

    /// Mark the slot as enabled or disabled
    ///
    /// Disabling drops the stored snapshot so nothing stale lingers.
    pub fn set_configured(&self, configured: bool) {
        self.store.with_entry(self.kind, |table| {
            if let Some(entry) = table.entries.get_mut(&self.kind) {
                entry.configured = configured;
                if !configured {
                    entry.snapshot = None;
                    entry.last_error = None;
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn snapshot(kind: SourceKind, secs: i64) -> MetricsSnapshot {
        let mut snapshot = MetricsSnapshot::new(kind, at(secs));
        snapshot.block_height = Some(100 + secs as u64);
        snapshot
    }

    #[test]
    fn test_publish_and_read_back() {
        let store = SlotStore::new();
        let writer = store.writer(SourceKind::Node);
        writer.publish(snapshot(SourceKind::Node, 0)).unwrap();

        let set = store.snapshot();
        let entry = set.get(SourceKind::Node).unwrap();
        assert_eq!(entry.snapshot.as_ref().unwrap().block_height, Some(100));
        assert_eq!(entry.successes, 1);
        assert!(set.real_data_seen());
    }

    #[test]
    fn test_writer_only_writes_own_slot() {
        let store = SlotStore::new();
        let writer = store.writer(SourceKind::Prometheus);
        let result = writer.publish(snapshot(SourceKind::Explorer, 0));
        assert!(matches!(result, Err(SlotError::WrongSource { .. })));
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn test_older_snapshot_is_refused() {
        let store = SlotStore::new();
        let writer = store.writer(SourceKind::Node);
        writer.publish(snapshot(SourceKind::Node, 10)).unwrap();
        writer.publish(snapshot(SourceKind::Node, 10)).unwrap();

        let result = writer.publish(snapshot(SourceKind::Node, 5));
        assert!(matches!(result, Err(SlotError::OutOfOrder { .. })));
        let set = store.snapshot();
        assert_eq!(
            set.get(SourceKind::Node).unwrap().snapshot.as_ref().unwrap().captured_at,
            at(10)
        );
    }

    #[test]
    fn test_simulated_never_overwrites_after_real_data() {
        let store = SlotStore::new();
        let simulated = store.writer(SourceKind::Simulated);
        let node = store.writer(SourceKind::Node);

        simulated.publish(snapshot(SourceKind::Simulated, 0)).unwrap();
        node.publish(snapshot(SourceKind::Node, 1)).unwrap();

        assert_eq!(
            simulated.publish(snapshot(SourceKind::Simulated, 2)),
            Err(SlotError::RealDataPresent)
        );
        let set = store.snapshot();
        assert!(set.get(SourceKind::Simulated).unwrap().snapshot.is_none());
    }

    #[test]
    fn test_failure_keeps_previous_snapshot() {
        let store = SlotStore::new();
        let writer = store.writer(SourceKind::Explorer);
        writer.publish(snapshot(SourceKind::Explorer, 0)).unwrap();
        writer.record_failure("network unreachable: connection refused", at(5));

        let set = store.snapshot();
        let entry = set.get(SourceKind::Explorer).unwrap();
        assert!(entry.snapshot.is_some());
        assert_eq!(
            entry.last_error.as_deref(),
            Some("network unreachable: connection refused")
        );
    }

    #[test]
    fn test_fresh_snapshot_window() {
        let entry = SlotSet::from_snapshots([snapshot(SourceKind::Node, 0)])
            .get(SourceKind::Node)
            .cloned()
            .unwrap();
        assert!(entry.fresh_snapshot(Duration::from_secs(30), at(30)).is_some());
        assert!(entry.fresh_snapshot(Duration::from_secs(30), at(31)).is_none());
    }
}
