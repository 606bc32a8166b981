use super::ProcessModel;
use crate::device::{Balance, PeristalticPump};
use crate::error::{Error, Result};

/// Weight gain (g/s) from a pump rate in mL/min, taking 1 g/mL.
pub fn filling_rate(ml_min: f64) -> f64 {
    ml_min / 60.0
}

/// A pump filling a vessel that sits on a balance.
pub struct FillingModel {
    pump: PeristalticPump,
    pump_index: usize,
    balance: Balance,
    balance_index: usize,
}

impl FillingModel {
    pub fn new(pump: PeristalticPump, pump_index: usize, balance: Balance, balance_index: usize) -> Result<Self> {
        if pump_index >= pump.len() {
            return Err(Error::CommandIndex {
                index: pump_index,
                len: pump.len(),
            });
        }
        if balance_index >= balance.len() {
            return Err(Error::CommandIndex {
                index: balance_index,
                len: balance.len(),
            });
        }
        Ok(Self {
            pump,
            pump_index,
            balance,
            balance_index,
        })
    }
}

impl ProcessModel for FillingModel {
    fn name(&self) -> &str {
        "filling"
    }

    fn step(&mut self) -> Result<()> {
        let ml_min = self.pump.get_ml_min()?[self.pump_index];
        let mut roc = vec![None; self.balance.len()];
        roc[self.balance_index] = Some(filling_rate(ml_min));
        self.balance.set_sim_rates_of_change(&roc)
    }
}
