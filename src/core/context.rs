//! Application context shared by pollers, the reconcile loop and presentation

use arc_swap::ArcSwap;
use chrono::Utc;
use quai_dash_core::{EventLog, SharedEventLog, SlotStore};
use quai_dash_types::ReconciledView;
use std::sync::Arc;
use tokio::sync::watch;

use crate::config::AppConfig;

/// Everything the running core shares
///
/// Configuration is swapped atomically and read once per tick. Pollers get a
/// slot writer for their own source; only the reconcile loop reads the whole
/// slot store.
pub struct AppContext {
    config: ArcSwap<AppConfig>,
    slots: SlotStore,
    events: SharedEventLog,
    view_tx: watch::Sender<Arc<ReconciledView>>,
}

impl AppContext {
    pub fn new(config: AppConfig) -> Arc<Self> {
        let (view_tx, _) = watch::channel(Arc::new(ReconciledView::empty(Utc::now())));
        Arc::new(Self {
            config: ArcSwap::from_pointee(config),
            slots: SlotStore::new(),
            events: EventLog::shared(),
            view_tx,
        })
    }

    /// Current configuration
    pub fn config(&self) -> Arc<AppConfig> {
        self.config.load_full()
    }

    /// Replace the configuration; pollers pick it up on their next tick
    pub fn set_config(&self, config: AppConfig) {
        self.config.store(Arc::new(config));
    }

    /// Apply a change to a copy of the current configuration and swap it in
    pub fn update_config(&self, f: impl Fn(&mut AppConfig)) {
        self.config.rcu(|current| {
            let mut next = AppConfig::clone(&**current);
            f(&mut next);
            next
        });
    }

    pub fn slots(&self) -> &SlotStore {
        &self.slots
    }

    pub fn events(&self) -> &SharedEventLog {
        &self.events
    }

    /// Receive every view published from now on
    pub fn subscribe(&self) -> watch::Receiver<Arc<ReconciledView>> {
        self.view_tx.subscribe()
    }

    /// Latest published view
    pub fn latest_view(&self) -> Arc<ReconciledView> {
        self.view_tx.borrow().clone()
    }

    pub fn publish_view(&self, view: ReconciledView) -> Arc<ReconciledView> {
        let view = Arc::new(view);
        self.view_tx.send_replace(view.clone());
        view
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_config_swaps_atomically() {
        let ctx = AppContext::new(AppConfig::default());
        let before = ctx.config();
        ctx.update_config(|config| config.sources.prometheus.enabled = true);

        assert!(!before.sources.prometheus.enabled);
        assert!(ctx.config().sources.prometheus.enabled);
    }

    #[tokio::test]
    async fn test_subscribers_see_published_views() {
        let ctx = AppContext::new(AppConfig::default());
        let mut rx = ctx.subscribe();

        let mut view = ReconciledView::empty(Utc::now());
        view.totals.accepted_shares = 3;
        ctx.publish_view(view);

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().totals.accepted_shares, 3);
        assert_eq!(ctx.latest_view().totals.accepted_shares, 3);
    }
}
