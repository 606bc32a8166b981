//! Mass flow meter. Readings are reported in uL/min.

use super::{device_handle, DeviceType};
use crate::error::Result;
use crate::pid::{AccessorData, AccessorKind};
use crate::units::MassFlowUnits;

device_handle!(MassFlowMeter, DeviceType::MassFlowMeter, sim: true);

impl MassFlowMeter {
    pub fn get_all_values(&self) -> Result<Vec<Option<f64>>> {
        self.extract_live("v")
    }

    pub fn ul_min(&self) -> Result<Vec<Option<f64>>> {
        self.get_all_values()
    }

    pub fn ml_min(&self) -> Result<Vec<Option<f64>>> {
        self.in_units(MassFlowUnits::MlMin)
    }

    pub fn ul_hr(&self) -> Result<Vec<Option<f64>>> {
        self.in_units(MassFlowUnits::UlHr)
    }

    pub fn ml_hr(&self) -> Result<Vec<Option<f64>>> {
        self.in_units(MassFlowUnits::MlHr)
    }

    fn in_units(&self, units: MassFlowUnits) -> Result<Vec<Option<f64>>> {
        let k = MassFlowUnits::conversion(MassFlowUnits::UlMin, units);
        Ok(self.get_all_values()?.into_iter().map(|v| v.map(|v| v * k)).collect())
    }

    /// Simulated data given in `units`, sent in uL/min.
    pub fn set_sim_data(
        &self,
        values: Option<&[Option<f64>]>,
        roc: Option<&[Option<f64>]>,
        noise: Option<&[Option<f64>]>,
        units: MassFlowUnits,
    ) -> Result<()> {
        let scale = MassFlowUnits::conversion(units, MassFlowUnits::UlMin);
        self.device.set_sim_data(values, roc, noise, scale)
    }

    pub fn set_sim_values(&self, values: &[Option<f64>], units: MassFlowUnits) -> Result<()> {
        self.set_sim_data(Some(values), None, None, units)
    }

    pub fn set_sim_rates_of_change(&self, roc: &[Option<f64>], units: MassFlowUnits) -> Result<()> {
        self.set_sim_data(None, Some(roc), None, units)
    }

    pub fn set_sim_noise(&self, noise: &[Option<f64>], units: MassFlowUnits) -> Result<()> {
        self.set_sim_data(None, None, Some(noise), units)
    }

    pub fn to_pid_process_value(&self, index: usize) -> Result<AccessorData> {
        self.accessor(AccessorKind::MassFlow, MassFlowUnits::UlMin.code(), index)
    }
}
