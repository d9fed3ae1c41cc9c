//! Reconcile loop driver
//!
//! One tick rebuilds the view from the slots, folds it into the mining state,
//! raises temperature alerts, records history and publishes the result.

use anyhow::Result;
use chrono::{DateTime, Utc};
use log::trace;
use quai_dash_core::LogLevel;
use quai_dash_types::{Preferences, ReconciledView};
use std::path::Path;
use std::sync::{Arc, PoisonError};

use super::export::{export_to_path, ExportFormat};
use super::history::History;
use super::mining_state::{MiningState, MiningTotals};
use super::reconciler::reconcile;
use super::AppContext;
use crate::config::JsonStore;

const TOTALS_FILE: &str = "totals.json";

/// Store for mining totals kept next to the config file
pub fn totals_store(config_dir: &Path) -> JsonStore<MiningTotals> {
    JsonStore::new(config_dir.join(TOTALS_FILE))
}

pub struct Dashboard {
    ctx: Arc<AppContext>,
    mining: MiningState,
    history: History,
}

impl Dashboard {
    pub fn new(ctx: Arc<AppContext>, totals: MiningTotals, started_at: DateTime<Utc>) -> Self {
        let history = History::new(ctx.config().reconcile.history_length);
        Self {
            ctx,
            mining: MiningState::restore(totals, started_at),
            history,
        }
    }

    pub fn context(&self) -> &Arc<AppContext> {
        &self.ctx
    }

    pub fn totals(&self) -> &MiningTotals {
        self.mining.totals()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Run one reconcile pass and publish the view
    pub fn tick(&mut self, now: DateTime<Utc>) -> Arc<ReconciledView> {
        let config = self.ctx.config();
        let tick = config.reconcile.tick_interval();
        let slots = self.ctx.slots().snapshot();

        let mut view = reconcile(&slots, &config.sources, tick, now);
        self.mining.observe(&mut view, config.reconcile.block_reward, now);
        self.check_temperatures(&view, &config.preferences);

        self.history.set_capacity(config.reconcile.history_length);
        self.history.record(&view);
        trace!("Reconciled view at {}", now);
        self.ctx.publish_view(view)
    }

    fn check_temperatures(&self, view: &ReconciledView, preferences: &Preferences) {
        if !preferences.notifications_enabled {
            return;
        }
        let (Some(gpus), source) = (view.gpus.value(), view.gpus.source()) else {
            return;
        };
        let threshold = preferences.temperature_threshold;
        let mut events = self.ctx.events().lock().unwrap_or_else(PoisonError::into_inner);
        for gpu in gpus {
            let key = format!("temperature:{}", gpu.name);
            if gpu.temperature > threshold {
                events.report_failure(
                    &key,
                    source,
                    LogLevel::Warning,
                    format!("{} is above the {:.0}°C threshold", gpu.name, threshold),
                );
            } else {
                events.report_recovery(
                    &key,
                    source,
                    format!("{} is back below {:.0}°C", gpu.name, threshold),
                );
            }
        }
    }

    /// Write the latest view and the history to `path`
    pub fn export(&self, path: &Path, format: ExportFormat) -> Result<()> {
        let view = self.ctx.latest_view();
        export_to_path(path, format, &view, &self.history.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use chrono::TimeZone;
    use quai_dash_core::{MetricsSnapshot, SourceKind};
    use quai_dash_types::{GpuConfig, GpuReading};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn simulated_context() -> Arc<AppContext> {
        let mut config = AppConfig::default();
        config.sources.node.enabled = false;
        config.sources.prometheus.enabled = false;
        config.sources.explorer.enabled = false;
        config.sources.simulation.enabled = true;
        config.preferences.notifications_enabled = true;
        config.preferences.temperature_threshold = 80.0;
        AppContext::new(config)
    }

    fn publish_gpu(ctx: &AppContext, secs: i64, temperature: f64) {
        let mut gpu = GpuReading::at_target(&GpuConfig::new("RTX 3080"));
        gpu.temperature = temperature;
        let mut snapshot = MetricsSnapshot::new(SourceKind::Simulated, at(secs));
        snapshot.local_hash_rate = Some(gpu.hash_rate);
        snapshot.gpus = vec![gpu];
        let writer = ctx.slots().writer(SourceKind::Simulated);
        writer.set_configured(true);
        writer.publish(snapshot).unwrap();
    }

    fn warnings(ctx: &AppContext) -> usize {
        ctx.events()
            .lock()
            .unwrap()
            .entries()
            .filter(|entry| entry.level == LogLevel::Warning)
            .count()
    }

    #[test]
    fn test_tick_publishes_and_records_history() {
        let ctx = simulated_context();
        let mut receiver = ctx.subscribe();
        let mut dashboard = Dashboard::new(ctx.clone(), MiningTotals::default(), at(0));

        publish_gpu(&ctx, 0, 60.0);
        let view = dashboard.tick(at(1));
        assert!(view.local_hash_rate.is_known());
        assert!(receiver.has_changed().unwrap());
        assert_eq!(receiver.borrow_and_update().generated_at, at(1));
        assert_eq!(dashboard.history().len(), 1);
        assert_eq!(view.totals.uptime_secs, 1);
    }

    #[test]
    fn test_hot_gpu_warns_once_then_recovers() {
        let ctx = simulated_context();
        let mut dashboard = Dashboard::new(ctx.clone(), MiningTotals::default(), at(0));

        publish_gpu(&ctx, 0, 85.0);
        dashboard.tick(at(1));
        publish_gpu(&ctx, 1, 86.0);
        dashboard.tick(at(2));
        assert_eq!(warnings(&ctx), 1);

        publish_gpu(&ctx, 2, 70.0);
        dashboard.tick(at(3));
        let events = ctx.events().lock().unwrap().recent(1);
        assert_eq!(events[0].level, LogLevel::Info);
        assert!(events[0].message.contains("back below"));
    }

    #[test]
    fn test_no_alerts_when_notifications_off() {
        let ctx = simulated_context();
        ctx.update_config(|config| config.preferences.notifications_enabled = false);
        let mut dashboard = Dashboard::new(ctx.clone(), MiningTotals::default(), at(0));

        publish_gpu(&ctx, 0, 95.0);
        dashboard.tick(at(1));
        assert_eq!(warnings(&ctx), 0);
    }

    #[test]
    fn test_totals_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = totals_store(dir.path());
        assert_eq!(store.load(), MiningTotals::default());

        let totals = MiningTotals {
            accepted_shares: 12,
            rejected_shares: 1,
            rewards_accrued: 0.5,
        };
        store.save(&totals).unwrap();
        assert_eq!(store.load(), totals);
    }
}
