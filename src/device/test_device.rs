//! Simulated device used to exercise a setup without hardware.

use super::{device_handle, DeviceType};
use crate::error::Result;

device_handle!(TestDevice, DeviceType::TestDevice, sim: true);

impl TestDevice {
    pub fn get_all_values(&self) -> Result<Vec<Option<f64>>> {
        self.extract_live("v")
    }

    pub fn set_values(&self, values: &[Option<f64>]) -> Result<()> {
        self.set_sim_data(Some(values), None, None, 1.0)
    }

    /// Rates of change in units/s.
    pub fn set_roc(&self, roc: &[Option<f64>]) -> Result<()> {
        self.set_sim_data(None, Some(roc), None, 1.0)
    }
}
