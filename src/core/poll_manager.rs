//! Poll manager for scheduling and coordinating source pollers
//!
//! Every source runs as its own task on its own interval. A tick that fires
//! while the previous poll is still in flight is skipped, never queued.

use anyhow::Result;
use chrono::Utc;
use log::{debug, error, trace};
use quai_dash_core::{
    BoxedMetricsSource, LogLevel, MetricsSnapshot, PollError, Registry, SlotError, SlotWriter,
    SourceKind, SourcesConfig,
};
use quai_dash_rpc::ErrorClass;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use super::AppContext;

/// Control handle for one running poller
pub struct PollHandle {
    kind: SourceKind,
    task: JoinHandle<()>,
    interval_tx: watch::Sender<Duration>,
    wake: Arc<Notify>,
    in_flight: Arc<AtomicBool>,
}

impl PollHandle {
    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    /// Change the poll interval; the next tick follows the new period
    pub fn reschedule(&self, interval: Duration) {
        self.interval_tx.send_replace(interval.max(Duration::from_millis(1)));
    }

    /// Poll immediately unless a poll is already running
    pub fn poll_now(&self) {
        if !self.is_in_flight() {
            self.wake.notify_one();
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn cancel(&self) {
        self.task.abort();
        self.in_flight.store(false, Ordering::Release);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

fn make_interval(period: Duration) -> Interval {
    let mut interval = tokio::time::interval_at(Instant::now(), period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

fn failure_key(kind: SourceKind) -> String {
    format!("poll:{}", kind)
}

struct Poller {
    ctx: Arc<AppContext>,
    source: BoxedMetricsSource,
    writer: SlotWriter,
    in_flight: Arc<AtomicBool>,
    /// Sources config under which the source reported itself unconfigured
    idle_under: Option<SourcesConfig>,
}

impl Poller {
    async fn run(mut self, mut interval_rx: watch::Receiver<Duration>, wake: Arc<Notify>) {
        let kind = self.writer.kind();
        let mut period = *interval_rx.borrow_and_update();
        let mut configured_period = period;
        let mut interval = make_interval(period);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = wake.notified() => {}
                changed = interval_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    period = *interval_rx.borrow_and_update();
                    trace!("{} poller rescheduled to {:?}", kind, period);
                    interval = make_interval(period);
                    continue;
                }
            }

            let config = self.ctx.config();
            let sources = &config.sources;

            let wanted = sources.update_interval(kind);
            if wanted != configured_period {
                configured_period = wanted;
                period = wanted;
                interval = make_interval(period);
            }

            self.tick(sources).await;
            // next tick a full period after this poll ended
            interval.reset();
        }
        debug!("{} poller stopped", kind);
    }

    async fn tick(&mut self, sources: &SourcesConfig) {
        let kind = self.writer.kind();
        let enabled = sources.is_enabled(kind);
        self.writer.set_configured(enabled);
        if !enabled {
            self.idle_under = None;
            return;
        }
        if self.idle_under.as_ref() == Some(sources) {
            trace!("{} stays idle until its configuration changes", kind);
            return;
        }
        self.idle_under = None;

        self.in_flight.store(true, Ordering::Release);
        let started = std::time::Instant::now();
        let result = self.source.poll(sources).await;
        self.in_flight.store(false, Ordering::Release);
        trace!("{} poll took {:?}", kind, started.elapsed());

        match result {
            Ok(snapshot) => self.publish(snapshot),
            Err(err) => self.fail(err, sources),
        }
    }

    fn publish(&mut self, snapshot: MetricsSnapshot) {
        let kind = self.writer.kind();
        match self.writer.publish(snapshot) {
            Ok(()) => {
                let mut events = self.ctx.events().lock().unwrap_or_else(PoisonError::into_inner);
                events.report_recovery(
                    &failure_key(kind),
                    Some(kind),
                    format!("{} source recovered", self.source.metadata().name),
                );
            }
            Err(SlotError::RealDataPresent) => {
                trace!("Simulated snapshot dropped, real data present");
            }
            Err(err @ SlotError::OutOfOrder { .. }) => debug!("{} snapshot refused: {}", kind, err),
            Err(err) => error!("{} snapshot refused: {}", kind, err),
        }
    }

    fn fail(&mut self, err: PollError, sources: &SourcesConfig) {
        let kind = self.writer.kind();
        let class = err.class();
        if class == ErrorClass::Configuration {
            self.idle_under = Some(sources.clone());
        }
        self.writer.record_failure(err.to_string(), Utc::now());

        let level = match class {
            ErrorClass::Protocol => LogLevel::Error,
            ErrorClass::Transport | ErrorClass::Configuration => LogLevel::Warning,
        };
        let mut events = self.ctx.events().lock().unwrap_or_else(PoisonError::into_inner);
        events.report_failure(
            &failure_key(kind),
            Some(kind),
            level,
            format!("{} source failed: {}", self.source.metadata().name, err),
        );
    }
}

/// Owns one poller task per registered source
pub struct PollManager {
    ctx: Arc<AppContext>,
    registry: Registry,
    handles: HashMap<SourceKind, PollHandle>,
}

impl PollManager {
    pub fn new(ctx: Arc<AppContext>, registry: Registry) -> Self {
        Self {
            ctx,
            registry,
            handles: HashMap::new(),
        }
    }

    /// Start a poller for every registered source
    ///
    /// Disabled sources still get a task; it idles until enabled.
    pub fn start_all(&mut self) -> Result<()> {
        for kind in self.registry.list_sources() {
            if self.handles.contains_key(&kind) {
                continue;
            }
            let source = self.registry.create_source(kind)?;
            self.spawn(source);
        }
        Ok(())
    }

    /// Run `source` in its own task, replacing any poller of the same kind
    pub fn spawn(&mut self, source: BoxedMetricsSource) -> &PollHandle {
        let kind = source.kind();
        if let Some(previous) = self.handles.remove(&kind) {
            previous.cancel();
        }

        let period = self.ctx.config().sources.update_interval(kind);
        let (interval_tx, interval_rx) = watch::channel(period);
        let wake = Arc::new(Notify::new());
        let in_flight = Arc::new(AtomicBool::new(false));
        let poller = Poller {
            ctx: self.ctx.clone(),
            writer: self.ctx.slots().writer(kind),
            source,
            in_flight: in_flight.clone(),
            idle_under: None,
        };
        let task = tokio::spawn(poller.run(interval_rx, wake.clone()));
        debug!("{} poller started every {:?}", kind, period);

        self.handles.entry(kind).or_insert(PollHandle {
            kind,
            task,
            interval_tx,
            wake,
            in_flight,
        })
    }

    pub fn handle(&self, kind: SourceKind) -> Option<&PollHandle> {
        self.handles.get(&kind)
    }

    /// Kinds with a poller task
    pub fn running(&self) -> Vec<SourceKind> {
        let mut kinds: Vec<_> = self.handles.keys().copied().collect();
        kinds.sort();
        kinds
    }

    pub fn stop_all(&mut self) {
        for (kind, handle) in self.handles.drain() {
            handle.cancel();
            trace!("{} poller cancelled", kind);
        }
    }
}

impl Drop for PollManager {
    fn drop(&mut self) {
        self.stop_all();
    }
}
