//! Simulated process models.
//!
//! With simulated devices nothing physical links a pump to a balance or a
//! pH probe. A [`ProcessModel`] closes that loop: each step reads the
//! actuators and writes simulated rates of change into the sensors.
//! [`spawn_model`] runs a model on its own thread.

pub mod filling;
pub mod ph_reaction;

use crossbeam::channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

pub use filling::FillingModel;
pub use ph_reaction::{PhReactionModel, Reaction};

pub trait ProcessModel: Send + 'static {
    fn name(&self) -> &str;

    /// One model update. Errors other than a lost connection are counted
    /// and the model keeps running.
    fn step(&mut self) -> Result<()>;
}

pub struct ModelStats {
    pub cycles: AtomicU64,
    pub failures: AtomicU64,
    pub shutdown: AtomicBool,
}

impl ModelStats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            cycles: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            shutdown: AtomicBool::new(false),
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ModelEvent {
    Stepped { cycle: u64, elapsed: Duration },
    Failed { cycle: u64, reason: String },
    Stopped { reason: Option<String> },
}

/// Running model. Dropping the handle signals shutdown without joining.
pub struct ModelHandle {
    name: String,
    stats: Arc<ModelStats>,
    events: Receiver<ModelEvent>,
    thread: Option<thread::JoinHandle<()>>,
}

impl ModelHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cycles(&self) -> u64 {
        self.stats.cycles.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.stats.failures.load(Ordering::Relaxed)
    }

    /// Step notifications; the oldest are dropped when nobody reads them.
    pub fn events(&self) -> &Receiver<ModelEvent> {
        &self.events
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub fn stop(mut self) -> Result<()> {
        self.stats.shutdown.store(true, Ordering::Relaxed);
        match self.thread.take().map(thread::JoinHandle::join) {
            Some(Err(_)) => Err(Error::Model(format!("`{}` panicked", self.name))),
            _ => Ok(()),
        }
    }
}

impl Drop for ModelHandle {
    fn drop(&mut self) {
        self.stats.shutdown.store(true, Ordering::Relaxed);
    }
}

const EVENT_BUFFER: usize = 64;
const SHUTDOWN_POLL: Duration = Duration::from_millis(10);

fn publish(tx: &Sender<ModelEvent>, rx: &Receiver<ModelEvent>, event: ModelEvent) {
    if let Err(TrySendError::Full(event)) = tx.try_send(event) {
        let _ = rx.try_recv();
        let _ = tx.try_send(event);
    }
}

/// Runs `model` every `interval` until the handle is stopped or the
/// connection to the application is lost.
pub fn spawn_model<M: ProcessModel>(mut model: M, interval: Duration) -> ModelHandle {
    let stats = ModelStats::new();
    let stats_clone = stats.clone();
    let (tx, rx) = bounded(EVENT_BUFFER);
    let rx_clone = rx.clone();
    let name = model.name().to_string();

    let thread = thread::spawn(move || {
        let stats = stats_clone;
        let mut cycle = 0u64;
        tracing::info!(model = model.name(), ?interval, "model started");

        let reason = loop {
            if stats.shutdown.load(Ordering::Relaxed) {
                break None;
            }
            let cycle_start = Instant::now();

            match model.step() {
                Ok(()) => {
                    stats.cycles.fetch_add(1, Ordering::Relaxed);
                    publish(&tx, &rx_clone, ModelEvent::Stepped { cycle, elapsed: cycle_start.elapsed() });
                }
                Err(Error::Io(e)) => break Some(e.to_string()),
                Err(e) => {
                    stats.failures.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(model = model.name(), cycle, error = %e, "model step failed");
                    publish(&tx, &rx_clone, ModelEvent::Failed { cycle, reason: e.to_string() });
                }
            }
            cycle += 1;

            // Sleep out the rest of the interval, watching the shutdown flag
            while cycle_start.elapsed() < interval && !stats.shutdown.load(Ordering::Relaxed) {
                thread::sleep(SHUTDOWN_POLL.min(interval - cycle_start.elapsed()));
            }
        };

        match &reason {
            Some(r) => tracing::error!(model = model.name(), reason = %r, "model stopped"),
            None => tracing::info!(model = model.name(), cycles = cycle, "model stopped"),
        }
        publish(&tx, &rx_clone, ModelEvent::Stopped { reason });
    });

    ModelHandle {
        name,
        stats,
        events: rx,
        thread: Some(thread),
    }
}

/// Rounds `v` to `decimals` places.
pub(crate) fn round_to(v: f64, decimals: i32) -> f64 {
    let f = 10f64.powi(decimals);
    (v * f).round() / f
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    struct Counting {
        fail_every: u64,
        fatal_at: Option<u64>,
        n: u64,
    }

    impl ProcessModel for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        fn step(&mut self) -> Result<()> {
            self.n += 1;
            if Some(self.n) == self.fatal_at {
                return Err(Error::Io(io::ErrorKind::ConnectionAborted.into()));
            }
            if self.n % self.fail_every == 0 {
                return Err(Error::NoSimValues("counting".into()));
            }
            Ok(())
        }
    }

    #[test]
    fn runs_until_stopped() {
        let handle = spawn_model(
            Counting {
                fail_every: 3,
                fatal_at: None,
                n: 0,
            },
            Duration::from_millis(1),
        );
        let deadline = Instant::now() + Duration::from_secs(5);
        while handle.cycles() < 6 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(handle.is_running());
        assert!(handle.failures() >= 2);
        handle.stop().unwrap();
    }

    #[test]
    fn lost_connection_stops_the_model() {
        let handle = spawn_model(
            Counting {
                fail_every: u64::MAX,
                fatal_at: Some(2),
                n: 0,
            },
            Duration::from_millis(1),
        );
        let stopped = handle
            .events()
            .iter()
            .find_map(|e| match e {
                ModelEvent::Stopped { reason } => Some(reason),
                _ => None,
            })
            .unwrap();
        assert!(stopped.is_some());
        assert_eq!(handle.cycles(), 1);
        handle.stop().unwrap();
    }

    #[test]
    fn rounding() {
        assert_eq!(round_to(0.123456, 4), 0.1235);
        assert_eq!(round_to(-0.03249, 4), -0.0325);
    }
}
