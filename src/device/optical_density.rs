//! Optical density probe.
//!
//! Each probe reports three values: optical density (`od`), transmitted
//! intensity (`t`) and 90 degree scattered intensity (`n`).

use super::{device_handle, DeviceType};
use crate::error::Result;

device_handle!(OpticalDensityProbe, DeviceType::OpticalDensityProbe, sim: true);

/// One probe reading.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct OpticalDensityReading {
    pub optical_density: Option<f64>,
    pub transmitted: Option<f64>,
    pub ninety_deg: Option<f64>,
}

impl OpticalDensityProbe {
    pub fn value(&self, index: usize) -> Result<Option<OpticalDensityReading>> {
        Ok(self.get_all_values()?.get(index).copied())
    }

    pub fn get_all_values(&self) -> Result<Vec<OpticalDensityReading>> {
        Ok(self
            .extract_live_many(&["od", "t", "n"])?
            .into_iter()
            .map(|v| OpticalDensityReading {
                optical_density: v[0],
                transmitted: v[1],
                ninety_deg: v[2],
            })
            .collect())
    }

    pub fn optical_density(&self) -> Result<Vec<Option<f64>>> {
        Ok(self.get_all_values()?.iter().map(|r| r.optical_density).collect())
    }

    pub fn transmitted(&self) -> Result<Vec<Option<f64>>> {
        Ok(self.get_all_values()?.iter().map(|r| r.transmitted).collect())
    }

    pub fn ninety_deg(&self) -> Result<Vec<Option<f64>>> {
        Ok(self.get_all_values()?.iter().map(|r| r.ninety_deg).collect())
    }

    pub fn set_sim_values(&self, values: &[Option<f64>]) -> Result<()> {
        self.set_sim_data(Some(values), None, None, 1.0)
    }

    pub fn set_sim_rates_of_change(&self, roc: &[Option<f64>]) -> Result<()> {
        self.set_sim_data(None, Some(roc), None, 1.0)
    }

    pub fn set_sim_noise(&self, noise: &[Option<f64>]) -> Result<()> {
        self.set_sim_data(None, None, Some(noise), 1.0)
    }
}
