use serde_json::json;

use super::{device_handle, DeviceType};
use crate::error::Result;
use crate::ipc::Action;
use crate::pid::{AccessorData, AccessorKind};
use crate::units::WeightUnits;

device_handle!(Balance, DeviceType::Balance, sim: true);

impl Balance {
    /// Tares one balance input.
    pub fn tare(&self, index: usize, record: Option<bool>) -> Result<()> {
        let commands = self.single_node(index, json!(1))?;
        self.send_command(&self.to_payload(Action::Tare, json!({ "commands": commands }), record))?;
        Ok(())
    }

    /// Weight of every input, in grams.
    pub fn grams(&self) -> Result<Vec<f64>> {
        self.require_live("g")
    }

    pub fn milligrams(&self) -> Result<Vec<f64>> {
        self.in_units(WeightUnits::Milligrams)
    }

    pub fn kilograms(&self) -> Result<Vec<f64>> {
        self.in_units(WeightUnits::Kilograms)
    }

    pub fn in_units(&self, units: WeightUnits) -> Result<Vec<f64>> {
        Ok(self.grams()?.into_iter().map(|g| units.convert_grams(g)).collect())
    }

    pub fn set_sim_values(&self, values: &[Option<f64>]) -> Result<()> {
        self.set_sim_data(Some(values), None, None, 1.0)
    }

    /// Rates of change in g/s.
    pub fn set_sim_rates_of_change(&self, roc: &[Option<f64>]) -> Result<()> {
        self.set_sim_data(None, Some(roc), None, 1.0)
    }

    pub fn set_sim_noise(&self, noise: &[Option<f64>]) -> Result<()> {
        self.set_sim_data(None, None, Some(noise), 1.0)
    }

    pub fn to_pid_process_value(&self, index: usize) -> Result<AccessorData> {
        self.accessor(AccessorKind::Weight, WeightUnits::Grams.code(), index)
    }
}
