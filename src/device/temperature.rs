//! Temperature sensor. Readings are reported in degrees Celsius.
//!
//! Absolute values are converted with the unit offset; rates of change and
//! noise are differences and only scale.

use super::{device_handle, DeviceType};
use crate::error::Result;
use crate::pid::{AccessorData, AccessorKind};
use crate::units::TemperatureUnits;

device_handle!(TemperatureProbe, DeviceType::TemperatureProbe, sim: true);

fn map(src: Option<&[Option<f64>]>, f: impl Fn(f64) -> f64) -> Option<Vec<Option<f64>>> {
    src.map(|s| s.iter().map(|v| v.map(&f)).collect())
}

impl TemperatureProbe {
    pub fn get_all_values(&self) -> Result<Vec<Option<f64>>> {
        self.extract_live("v")
    }

    pub fn celsius(&self) -> Result<Vec<Option<f64>>> {
        self.get_all_values()
    }

    pub fn fahrenheit(&self) -> Result<Vec<Option<f64>>> {
        self.in_units(TemperatureUnits::Fahrenheit)
    }

    pub fn kelvin(&self) -> Result<Vec<Option<f64>>> {
        self.in_units(TemperatureUnits::Kelvin)
    }

    pub fn in_units(&self, units: TemperatureUnits) -> Result<Vec<Option<f64>>> {
        Ok(self
            .get_all_values()?
            .into_iter()
            .map(|v| v.map(|c| units.convert_celsius(c)))
            .collect())
    }

    /// Simulated data given in `units`, sent in Celsius.
    pub fn set_sim_data(
        &self,
        values: Option<&[Option<f64>]>,
        roc: Option<&[Option<f64>]>,
        noise: Option<&[Option<f64>]>,
        units: TemperatureUnits,
    ) -> Result<()> {
        let degree = units.degree_in_celsius();
        let values = map(values, |v| units.to_celsius(v));
        let roc = map(roc, |v| v * degree);
        let noise = map(noise, |v| v * degree);
        self.device
            .set_sim_data(values.as_deref(), roc.as_deref(), noise.as_deref(), 1.0)
    }

    pub fn set_sim_values(&self, values: &[Option<f64>], units: TemperatureUnits) -> Result<()> {
        self.set_sim_data(Some(values), None, None, units)
    }

    pub fn set_sim_rates_of_change(&self, roc: &[Option<f64>], units: TemperatureUnits) -> Result<()> {
        self.set_sim_data(None, Some(roc), None, units)
    }

    pub fn set_sim_noise(&self, noise: &[Option<f64>], units: TemperatureUnits) -> Result<()> {
        self.set_sim_data(None, None, Some(noise), units)
    }

    pub fn to_pid_process_value(&self, index: usize) -> Result<AccessorData> {
        self.accessor(AccessorKind::Temperature, TemperatureUnits::Celsius.code(), index)
    }
}
