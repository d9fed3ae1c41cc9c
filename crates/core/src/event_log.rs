//! Bounded event log with failure deduplication
//!
//! Pollers report failures under a key. A failure is logged when it first
//! appears or its message changes; repeats are suppressed until a recovery
//! is reported for the same key.

use chrono::{DateTime, Utc};
use log::{error, info, warn};
use quai_dash_types::SourceKind;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Entries kept before the oldest is dropped
pub const EVENT_LOG_CAPACITY: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub at: DateTime<Utc>,
    pub level: LogLevel,
    pub source: Option<SourceKind>,
    pub message: String,
}

/// Event log shared between pollers and presentation
pub type SharedEventLog = Arc<Mutex<EventLog>>;

#[derive(Debug)]
pub struct EventLog {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    /// Currently active failure message per key
    active_failures: HashMap<String, String>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::with_capacity(EVENT_LOG_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(EVENT_LOG_CAPACITY)),
            capacity: capacity.max(1),
            active_failures: HashMap::new(),
        }
    }

    pub fn shared() -> SharedEventLog {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Append an entry and mirror it to the `log` facade
    pub fn push(
        &mut self,
        level: LogLevel,
        source: Option<SourceKind>,
        message: impl Into<String>,
    ) {
        let message = message.into();
        let tag = source.map(|s| s.as_str()).unwrap_or("core");
        match level {
            LogLevel::Info => info!("[{}] {}", tag, message),
            LogLevel::Warning => warn!("[{}] {}", tag, message),
            LogLevel::Error => error!("[{}] {}", tag, message),
        }

        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(LogEntry {
            at: Utc::now(),
            level,
            source,
            message,
        });
    }

    /// Record a failure under `key`; returns whether an entry was written
    pub fn report_failure(
        &mut self,
        key: &str,
        source: Option<SourceKind>,
        level: LogLevel,
        message: impl Into<String>,
    ) -> bool {
        let message = message.into();
        if self.active_failures.get(key) == Some(&message) {
            return false;
        }
        self.active_failures.insert(key.to_string(), message.clone());
        self.push(level, source, message);
        true
    }

    /// Clear the failure under `key`; returns whether one was active
    pub fn report_recovery(
        &mut self,
        key: &str,
        source: Option<SourceKind>,
        message: impl Into<String>,
    ) -> bool {
        if self.active_failures.remove(key).is_none() {
            return false;
        }
        self.push(LogLevel::Info, source, message);
        true
    }

    pub fn is_failing(&self, key: &str) -> bool {
        self.active_failures.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    /// Newest `n` entries, oldest first
    pub fn recent(&self, n: usize) -> Vec<LogEntry> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).cloned().collect()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}
