use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::RecipeSettings;
use crate::ipc::protocol::Event;

#[derive(Clone, Debug, PartialEq)]
pub enum ExchangeOutcome {
    Answered,
    Retried { attempt: u32, reason: String },
    Failed,
}

#[derive(Clone, Debug)]
pub struct ExchangeRecord {
    pub timestamp: Instant,
    pub event: Event,
    pub outcome: ExchangeOutcome,
}

// Most recent socket exchanges, oldest dropped first
#[derive(Clone)]
pub struct DiagnosticLog {
    entries: Arc<RwLock<VecDeque<ExchangeRecord>>>,
    max_size: usize,
}

impl DiagnosticLog {
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            entries: Arc::new(RwLock::new(VecDeque::with_capacity(max_size))),
            max_size,
        }
    }

    pub fn write(&self, event: Event, outcome: ExchangeOutcome) {
        let mut log = self.entries.write();
        log.push_back(ExchangeRecord {
            timestamp: Instant::now(),
            event,
            outcome,
        });
        if log.len() > self.max_size {
            log.pop_front();
        }
    }

    pub fn read_all(&self) -> Vec<ExchangeRecord> {
        self.entries.read().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

/// Settings that may change while devices are in use.
#[derive(Clone, Debug, PartialEq)]
pub struct LinkSettings {
    pub socket_attempts: u32,
    pub read_timeout: Duration,
    pub command_delay: Option<Duration>,
    pub poll_interval: Duration,
}

impl From<&RecipeSettings> for LinkSettings {
    fn from(cfg: &RecipeSettings) -> Self {
        Self {
            socket_attempts: cfg.socket_attempts.max(1),
            read_timeout: cfg.read_timeout(),
            command_delay: cfg.command_delay(),
            poll_interval: cfg.poll_interval(),
        }
    }
}

// Shared by the session and every device handle cloned from it
#[derive(Clone)]
pub struct SettingsBuffer {
    data: Arc<Mutex<LinkSettings>>,
}

impl SettingsBuffer {
    pub fn new(settings: LinkSettings) -> Self {
        Self {
            data: Arc::new(Mutex::new(settings)),
        }
    }

    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut LinkSettings),
    {
        let mut settings = self.data.lock();
        f(&mut settings);
    }

    pub fn get(&self) -> LinkSettings {
        self.data.lock().clone()
    }
}

impl Default for SettingsBuffer {
    fn default() -> Self {
        Self::new(LinkSettings::from(&RecipeSettings::default()))
    }
}
