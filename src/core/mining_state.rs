//! Mining state carried across reconcile ticks
//!
//! Share counters reported by sources are cumulative; this turns them into
//! per-tick deltas, keeps the 60 second share window, accrues expected
//! rewards and feeds the running averages.

use chrono::{DateTime, Utc};
use log::debug;
use quai_dash_core::{SourceKind, SHARE_RATE_WINDOW};
use quai_dash_types::{MiningSummary, ReconciledView};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::reconciler::block_probability;
use super::running_average::RunningAverage;

/// Totals that survive restarts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MiningTotals {
    #[serde(default)]
    pub accepted_shares: u64,
    #[serde(default)]
    pub rejected_shares: u64,
    /// QUAI
    #[serde(default)]
    pub rewards_accrued: f64,
}

/// Last cumulative counter seen, per source
#[derive(Debug, Clone, Copy, PartialEq)]
struct CounterBaseline {
    source: SourceKind,
    value: u64,
}

impl CounterBaseline {
    /// Increase since the previous reading, `None` when the counter restarted or
    /// now comes from another source
    fn advance(previous: &mut Option<Self>, source: SourceKind, value: u64) -> Option<u64> {
        let delta = match *previous {
            Some(base) if base.source == source && value >= base.value => Some(value - base.value),
            _ => None,
        };
        *previous = Some(Self { source, value });
        delta
    }
}

#[derive(Debug, Clone)]
pub struct MiningState {
    started_at: DateTime<Utc>,
    last_tick: Option<DateTime<Utc>>,
    totals: MiningTotals,
    accepted_baseline: Option<CounterBaseline>,
    rejected_baseline: Option<CounterBaseline>,
    /// (time, shares accepted at that time) within the share window
    recent_shares: VecDeque<(DateTime<Utc>, u64)>,
    hash_rate: RunningAverage,
    power: RunningAverage,
    temperature: RunningAverage,
}

impl MiningState {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self::restore(MiningTotals::default(), started_at)
    }

    /// Continue from persisted totals
    pub fn restore(totals: MiningTotals, started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            last_tick: None,
            totals,
            accepted_baseline: None,
            rejected_baseline: None,
            recent_shares: VecDeque::new(),
            hash_rate: RunningAverage::new(),
            power: RunningAverage::new(),
            temperature: RunningAverage::new(),
        }
    }

    pub fn totals(&self) -> &MiningTotals {
        &self.totals
    }

    /// Record `count` accepted shares found at `at`
    pub fn record_shares(&mut self, at: DateTime<Utc>, count: u64) {
        if count == 0 {
            return;
        }
        self.totals.accepted_shares += count;
        self.recent_shares.push_back((at, count));
    }

    /// Accepted shares per minute over the trailing window ending at `now`
    pub fn share_rate(&mut self, now: DateTime<Utc>) -> f64 {
        let window = chrono::Duration::from_std(SHARE_RATE_WINDOW)
            .unwrap_or_else(|_| chrono::Duration::seconds(60));
        let cutoff = now - window;
        while let Some(&(at, _)) = self.recent_shares.front() {
            if at > cutoff {
                break;
            }
            self.recent_shares.pop_front();
        }
        let count: u64 = self
            .recent_shares
            .iter()
            .filter(|(at, _)| *at <= now)
            .map(|(_, count)| count)
            .sum();
        count as f64 * 60.0 / SHARE_RATE_WINDOW.as_secs_f64()
    }

    /// Fold one reconciled view into the state and fill in its mining fields
    pub fn observe(&mut self, view: &mut ReconciledView, block_reward: f64, now: DateTime<Utc>) {
        if let (Some(value), Some(source)) =
            (view.accepted_shares.get(), view.accepted_shares.source())
        {
            let baseline = &mut self.accepted_baseline;
            if let Some(delta) = CounterBaseline::advance(baseline, source, value) {
                self.record_shares(now, delta);
            }
        }
        if let (Some(value), Some(source)) =
            (view.rejected_shares.get(), view.rejected_shares.source())
        {
            let baseline = &mut self.rejected_baseline;
            if let Some(delta) = CounterBaseline::advance(baseline, source, value) {
                self.totals.rejected_shares += delta;
            }
        }

        let elapsed = self
            .last_tick
            .and_then(|last| now.signed_duration_since(last).to_std().ok());
        self.last_tick = Some(now);

        let hash_rate = view.local_hash_rate.get();
        if let (Some(elapsed), Some(hash_rate), Some(difficulty)) =
            (elapsed, hash_rate, view.difficulty.get())
        {
            if let Some(probability) = block_probability(hash_rate, elapsed, difficulty) {
                self.totals.rewards_accrued += probability * block_reward;
            }
        }

        if let Some(hash_rate) = hash_rate {
            self.hash_rate.push(hash_rate);
        }
        if let Some(power) = view.power_usage.get() {
            self.power.push(power);
        }
        if let Some(temperature) = view.max_gpu_temperature() {
            self.temperature.push(temperature);
        }

        view.derived.share_rate = Some(self.share_rate(now));
        view.derived.average_hash_rate = self.hash_rate.mean();
        view.derived.average_power = self.power.mean();
        view.derived.average_temperature = self.temperature.mean();
        view.totals = MiningSummary {
            accepted_shares: self.totals.accepted_shares,
            rejected_shares: self.totals.rejected_shares,
            rewards_accrued: self.totals.rewards_accrued,
            uptime_secs: now
                .signed_duration_since(self.started_at)
                .num_seconds()
                .max(0) as u64,
        };
        debug!(
            "Mining totals: {} accepted, {} rejected, {:.6} QUAI",
            self.totals.accepted_shares, self.totals.rejected_shares, self.totals.rewards_accrued
        );
    }
}
