//! Dosing reaction seen by a pH probe.
//!
//! Each probe node has its own [`Reaction`]: the pH rate of change grows
//! with the dose rate of its pump and drifts slowly over time, and the
//! probe only sees a dose rate change after the reaction's time constant.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use super::{round_to, ProcessModel};
use crate::device::{PeristalticPump, PhProbe};
use crate::error::Result;

/// (pH/s)/(mL/min)
pub const DOSE_SLOPE: f64 = 0.095;
/// (pH/s)/(mL/min)/s
pub const SLOPE_DRIFT: f64 = 0.000005;
pub const ROC_BOUNDS: (f64, f64) = (-0.5, 0.5);

#[derive(Clone, Debug)]
pub struct Reaction {
    pub time_constant: Duration,
    /// Rate of change with no dosing, pH/s.
    pub roc_offset: f64,
    started: Instant,
    last_roc: Option<f64>,
    pending: VecDeque<(Instant, f64)>,
}

impl Reaction {
    pub fn new<R: Rng>(rng: &mut R, started: Instant) -> Self {
        let time_constant_s = round_to(rng.gen_range(2.0..6.0), 3);
        Self {
            time_constant: Duration::from_secs_f64(time_constant_s),
            roc_offset: round_to(rng.gen_range(-1.95 / 60.0..-0.95 / 60.0), 4),
            started,
            last_roc: None,
            pending: VecDeque::new(),
        }
    }

    /// Rate of change for `ml_min`, `elapsed` into the reaction.
    pub fn rate_of_change(&self, ml_min: f64, elapsed: Duration) -> f64 {
        let slope = DOSE_SLOPE + elapsed.as_secs_f64() * SLOPE_DRIFT;
        let roc = (self.roc_offset + slope * ml_min).clamp(ROC_BOUNDS.0, ROC_BOUNDS.1);
        round_to(roc, 4)
    }

    /// Queues the dose rate seen at `now` and applies every queued rate whose
    /// delay has passed.
    pub fn observe(&mut self, ml_min: f64, now: Instant) -> Option<f64> {
        self.pending.push_back((now + self.time_constant, ml_min));
        while let Some(&(due, rate)) = self.pending.front() {
            if due > now {
                break;
            }
            self.pending.pop_front();
            self.last_roc = Some(self.rate_of_change(rate, due.saturating_duration_since(self.started)));
        }
        self.last_roc
    }

    pub fn last_roc(&self) -> Option<f64> {
        self.last_roc
    }
}

/// Pump `i` doses into the vessel measured by probe node `i`.
pub struct PhReactionModel {
    pumps: Vec<PeristalticPump>,
    probe: PhProbe,
    reactions: Vec<Reaction>,
}

impl PhReactionModel {
    pub fn new(pumps: Vec<PeristalticPump>, probe: PhProbe, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let now = Instant::now();
        let reactions = (0..probe.len()).map(|_| Reaction::new(&mut rng, now)).collect();
        Self {
            pumps,
            probe,
            reactions,
        }
    }

    pub fn reactions(&self) -> &[Reaction] {
        &self.reactions
    }
}

impl ProcessModel for PhReactionModel {
    fn name(&self) -> &str {
        "ph_reaction"
    }

    fn step(&mut self) -> Result<()> {
        let mut rates = Vec::with_capacity(self.reactions.len());
        for i in 0..self.reactions.len() {
            let rate = match self.pumps.get(i) {
                Some(pump) => pump.get_ml_min()?.first().copied().unwrap_or(0.0),
                None => 0.0,
            };
            rates.push(rate);
        }

        let now = Instant::now();
        let roc: Vec<Option<f64>> = self
            .reactions
            .iter_mut()
            .zip(rates)
            .map(|(r, rate)| r.observe(rate, now))
            .collect();
        tracing::trace!(?roc, "ph rates of change");
        self.probe.set_sim_rates_of_change(&roc)
    }
}
