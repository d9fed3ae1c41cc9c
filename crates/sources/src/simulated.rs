//! Simulated GPU rig
//!
//! Produces plausible readings while no real source is configured. Each GPU
//! value follows a bounded random walk pulled back toward its configured
//! target, and the share counters grow with the simulated hash rate.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quai_dash_core::{MetricsSource, PollError, SourceMetadata};
use quai_dash_types::{
    GpuConfig, GpuReading, MetricField, MetricsSnapshot, SimulationConfig, SourceKind,
    SourcesConfig,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Fraction of the distance to target recovered each step
const REVERSION: f64 = 0.2;
const MIN_FAN: f64 = 30.0;
const MAX_FAN: f64 = 100.0;

/// One bounded random-walk step
fn walk(rng: &mut StdRng, current: f64, target: f64, step: f64, min: f64, max: f64) -> f64 {
    let noise = if step > 0.0 {
        rng.gen_range(-step..step)
    } else {
        0.0
    };
    let next = current + (target - current) * REVERSION + noise;
    next.clamp(min, max)
}

fn step_gpu(rng: &mut StdRng, config: &GpuConfig, reading: &mut GpuReading) {
    let base_hash = config.base_hash_rate.max(0.0);
    let base_power = config.base_power.max(0.0);
    let max_temp = config.max_temp.max(config.target_temp);

    reading.hash_rate = walk(
        rng,
        reading.hash_rate,
        base_hash,
        base_hash * 0.02,
        base_hash * 0.9,
        base_hash * 1.1,
    );
    reading.power = walk(
        rng,
        reading.power,
        base_power,
        base_power * 0.02,
        base_power * 0.9,
        base_power * 1.1,
    );
    reading.temperature = walk(
        rng,
        reading.temperature,
        config.target_temp,
        1.5,
        config.target_temp - 10.0,
        max_temp,
    );
    // Fans chase temperature above target
    let fan_target = 50.0 + (reading.temperature - config.target_temp) * 5.0;
    reading.fan_speed = walk(rng, reading.fan_speed, fan_target, 2.0, MIN_FAN, MAX_FAN);
    reading.memory_temp = walk(
        rng,
        reading.memory_temp,
        reading.temperature + 10.0,
        1.0,
        reading.temperature,
        max_temp + 15.0,
    );
}

pub struct SimulatedSource {
    metadata: SourceMetadata,
    rng: Option<(Option<u64>, StdRng)>,
    gpus: Vec<GpuReading>,
    /// Fractional shares carried between steps
    pending_shares: f64,
    /// Fraction of a reject carried into the next step
    pending_rejects: f64,
    accepted: u64,
    rejected: u64,
    last_step: Option<DateTime<Utc>>,
}

impl SimulatedSource {
    pub fn new() -> Self {
        Self {
            metadata: SourceMetadata {
                kind: SourceKind::Simulated,
                name: "Simulation".to_string(),
                description: "Generated readings for a rig with no live data source".to_string(),
                provides: vec![
                    MetricField::LocalHashRate,
                    MetricField::PowerUsage,
                    MetricField::AcceptedShares,
                    MetricField::RejectedShares,
                ],
            },
            rng: None,
            gpus: Vec::new(),
            pending_shares: 0.0,
            pending_rejects: 0.0,
            accepted: 0,
            rejected: 0,
            last_step: None,
        }
    }

    fn rng(&mut self, seed: Option<u64>) -> &mut StdRng {
        if self.rng.as_ref().map(|(s, _)| *s) != Some(seed) {
            let rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            self.rng = Some((seed, rng));
        }
        &mut self.rng.get_or_insert_with(|| (seed, StdRng::from_entropy())).1
    }

    /// Advance the simulation to `now`
    pub(crate) fn step(
        &mut self,
        config: &SimulationConfig,
        now: DateTime<Utc>,
    ) -> MetricsSnapshot {
        let same_rig = self.gpus.len() == config.gpus.len()
            && self
                .gpus
                .iter()
                .zip(&config.gpus)
                .all(|(reading, gpu)| reading.name == gpu.name);
        if !same_rig {
            self.gpus = config.gpus.iter().map(GpuReading::at_target).collect();
        }

        let mut gpus = std::mem::take(&mut self.gpus);
        let rng = self.rng(config.seed);
        for (gpu, reading) in config.gpus.iter().zip(gpus.iter_mut()) {
            step_gpu(rng, gpu, reading);
        }

        let hash_rate: f64 = gpus.iter().map(|g| g.hash_rate).sum();
        let power: f64 = gpus.iter().map(|g| g.power).sum();

        let elapsed = self
            .last_step
            .map(|last| now.signed_duration_since(last).num_milliseconds().max(0) as f64 / 1000.0)
            .unwrap_or(0.0);
        self.last_step = Some(now);

        if config.share_difficulty > 0.0 {
            self.pending_shares += hash_rate * elapsed / config.share_difficulty;
            let found = self.pending_shares.floor();
            self.pending_shares -= found;

            // split in bulk; the share count can be huge at low difficulty
            self.pending_rejects += found * config.reject_ratio.clamp(0.0, 1.0);
            let rejected = self.pending_rejects.floor().min(found);
            self.pending_rejects -= rejected;

            self.rejected = self.rejected.saturating_add(rejected as u64);
            self.accepted = self.accepted.saturating_add((found - rejected) as u64);
        }

        let mut snapshot = MetricsSnapshot::new(SourceKind::Simulated, now);
        snapshot.local_hash_rate = Some(hash_rate);
        snapshot.power_usage = Some(power);
        snapshot.accepted_shares = Some(self.accepted);
        snapshot.rejected_shares = Some(self.rejected);
        snapshot.mining = Some(!gpus.is_empty());
        snapshot.gpus = gpus.clone();
        self.gpus = gpus;
        snapshot
    }
}

impl Default for SimulatedSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricsSource for SimulatedSource {
    fn metadata(&self) -> &SourceMetadata {
        &self.metadata
    }

    async fn poll(&mut self, config: &SourcesConfig) -> Result<MetricsSnapshot, PollError> {
        if config.simulation.gpus.is_empty() {
            return Err(PollError::NotConfigured("no simulated GPUs".to_string()));
        }
        Ok(self.step(&config.simulation, Utc::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn seeded() -> SimulationConfig {
        SimulationConfig {
            seed: Some(7),
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn test_walk_stays_within_bounds() {
        let config = seeded();
        let mut source = SimulatedSource::new();
        let start = Utc::now();
        for i in 0..500 {
            let snapshot = source.step(&config, start + Duration::seconds(i * 2));
            for (gpu, reading) in config.gpus.iter().zip(&snapshot.gpus) {
                assert!(reading.temperature <= gpu.max_temp, "{:?}", reading);
                assert!(reading.hash_rate >= gpu.base_hash_rate * 0.9);
                assert!(reading.hash_rate <= gpu.base_hash_rate * 1.1);
                assert!((MIN_FAN..=MAX_FAN).contains(&reading.fan_speed));
            }
        }
    }

    #[test]
    fn test_same_seed_same_readings() {
        let config = seeded();
        let start = Utc::now();
        let mut a = SimulatedSource::new();
        let mut b = SimulatedSource::new();
        for i in 0..10 {
            let at = start + Duration::seconds(i);
            assert_eq!(a.step(&config, at).gpus, b.step(&config, at).gpus);
        }
    }

    #[test]
    fn test_shares_follow_hash_rate() {
        let config = SimulationConfig {
            reject_ratio: 0.0,
            ..seeded()
        };
        let mut source = SimulatedSource::new();
        let start = Utc::now();
        let first = source.step(&config, start);
        assert_eq!(first.accepted_shares, Some(0));

        // ~57 MH/s for 10 minutes at 4e9 hashes per share is about 8.5 shares
        let later = source.step(&config, start + Duration::minutes(10));
        let accepted = later.accepted_shares.unwrap();
        assert!((7..=10).contains(&accepted), "accepted {}", accepted);
        assert_eq!(later.rejected_shares, Some(0));
        assert_eq!(later.mining, Some(true));
    }

    #[test]
    fn test_low_difficulty_step_completes() {
        let config = SimulationConfig {
            share_difficulty: 1.0,
            reject_ratio: 0.25,
            ..seeded()
        };
        let mut source = SimulatedSource::new();
        let start = Utc::now();
        source.step(&config, start);

        let later = source.step(&config, start + Duration::seconds(60));
        let expected = (later.local_hash_rate.unwrap() * 60.0).floor() as u64;
        let accepted = later.accepted_shares.unwrap();
        let rejected = later.rejected_shares.unwrap();
        assert!(expected > 1_000_000_000);
        assert!((accepted + rejected).abs_diff(expected) <= 1);
        assert!(rejected.abs_diff(expected / 4) <= 1, "rejected {}", rejected);
    }

    #[test]
    fn test_gpu_list_change_resets_readings() {
        let mut config = seeded();
        let mut source = SimulatedSource::new();
        source.step(&config, Utc::now());
        config.gpus = vec![GpuConfig::new("Arc A770")];
        let snapshot = source.step(&config, Utc::now());
        assert_eq!(snapshot.gpus.len(), 1);
        assert_eq!(snapshot.gpus[0].name, "Arc A770");
    }

    #[tokio::test]
    async fn test_no_gpus_is_not_configured() {
        let mut config = SourcesConfig::default();
        config.simulation.gpus.clear();
        let mut source = SimulatedSource::new();
        assert!(matches!(
            source.poll(&config).await,
            Err(PollError::NotConfigured(_))
        ));
    }
}
