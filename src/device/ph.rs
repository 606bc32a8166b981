use super::{device_handle, DeviceType};
use crate::error::Result;
use crate::pid::{AccessorData, AccessorKind};

device_handle!(PhProbe, DeviceType::PhProbe, sim: true);

impl PhProbe {
    pub fn value(&self, index: usize) -> Result<Option<f64>> {
        Ok(self.get_all_values()?.get(index).copied().flatten())
    }

    pub fn get_all_values(&self) -> Result<Vec<Option<f64>>> {
        self.extract_live("v")
    }

    pub fn ph(&self) -> Result<Vec<Option<f64>>> {
        self.get_all_values()
    }

    pub fn set_sim_values(&self, values: &[Option<f64>]) -> Result<()> {
        self.set_sim_data(Some(values), None, None, 1.0)
    }

    /// Rates of change in pH/s.
    pub fn set_sim_rates_of_change(&self, roc: &[Option<f64>]) -> Result<()> {
        self.set_sim_data(None, Some(roc), None, 1.0)
    }

    pub fn set_sim_noise(&self, noise: &[Option<f64>]) -> Result<()> {
        self.set_sim_data(None, None, Some(noise), 1.0)
    }

    pub fn to_pid_process_value(&self, index: usize) -> Result<AccessorData> {
        self.accessor(AccessorKind::Ph, 0, index)
    }
}
