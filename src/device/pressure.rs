//! Pressure transducer. Readings are reported in torr; the unit accessors
//! convert on the way out and the simulation setters convert on the way in.

use serde_json::json;

use super::{device_handle, DeviceType};
use crate::error::Result;
use crate::ipc::Action;
use crate::pid::{AccessorData, AccessorKind};
use crate::units::{convert_pressure_values, PressureUnits};

device_handle!(PressureTransducer, DeviceType::PressureTransducer, sim: true);

impl PressureTransducer {
    pub fn tare(&self, index: usize, record: Option<bool>) -> Result<()> {
        let commands = self.single_node(index, json!(1))?;
        self.send_command(&self.to_payload(Action::Tare, json!({ "commands": commands }), record))?;
        Ok(())
    }

    /// Reading of one input, in torr. `None` when the input reports nothing.
    pub fn value(&self, index: usize) -> Result<Option<f64>> {
        Ok(self.get_all_values()?.get(index).copied().flatten())
    }

    pub fn get_all_values(&self) -> Result<Vec<Option<f64>>> {
        self.extract_live("v")
    }

    pub fn torr(&self) -> Result<Vec<Option<f64>>> {
        self.get_all_values()
    }

    pub fn psi(&self) -> Result<Vec<Option<f64>>> {
        self.in_units(PressureUnits::Psi)
    }

    pub fn atm(&self) -> Result<Vec<Option<f64>>> {
        self.in_units(PressureUnits::Atmosphere)
    }

    pub fn pascal(&self) -> Result<Vec<Option<f64>>> {
        self.in_units(PressureUnits::Pascal)
    }

    pub fn bar(&self) -> Result<Vec<Option<f64>>> {
        self.in_units(PressureUnits::Bar)
    }

    fn in_units(&self, units: PressureUnits) -> Result<Vec<Option<f64>>> {
        Ok(convert_pressure_values(&self.torr()?, PressureUnits::Torr, units))
    }

    /// Simulated data given in `units`, sent in torr.
    pub fn set_sim_data(
        &self,
        values: Option<&[Option<f64>]>,
        roc: Option<&[Option<f64>]>,
        noise: Option<&[Option<f64>]>,
        units: PressureUnits,
    ) -> Result<()> {
        let scale = PressureUnits::conversion(units, PressureUnits::Torr);
        self.device.set_sim_data(values, roc, noise, scale)
    }

    pub fn set_sim_values(&self, values: &[Option<f64>], units: PressureUnits) -> Result<()> {
        self.set_sim_data(Some(values), None, None, units)
    }

    pub fn set_sim_rates_of_change(&self, roc: &[Option<f64>], units: PressureUnits) -> Result<()> {
        self.set_sim_data(None, Some(roc), None, units)
    }

    pub fn set_sim_noise(&self, noise: &[Option<f64>], units: PressureUnits) -> Result<()> {
        self.set_sim_data(None, None, Some(noise), units)
    }

    pub fn to_pid_process_value(&self, index: usize) -> Result<AccessorData> {
        self.accessor(AccessorKind::Pressure, PressureUnits::Torr.code(), index)
    }
}
