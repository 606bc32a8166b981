use serde_json::{json, Value};

use super::{device_handle, Command, DeviceType};
use crate::error::Result;
use crate::ipc::Action;
use crate::pid::{AccessorData, AccessorKind};

/// Solenoid valves are either closed (0) or open (1).
#[derive(Clone, Debug, PartialEq)]
pub struct SetPositionCommand {
    pub position: u8,
}

impl Command for SetPositionCommand {
    fn to_command(&self) -> Value {
        json!(self.position)
    }
}

device_handle!(SolenoidValve, DeviceType::SolenoidValve, sim: false);

impl SolenoidValve {
    pub fn set_position(&self, commands: &[Option<SetPositionCommand>], record: Option<bool>) -> Result<()> {
        self.send_commands(Action::SetValvePosition, commands, record)
    }

    /// Any non-zero `position` opens the valve.
    pub fn make_set_position_command(position: u8) -> SetPositionCommand {
        SetPositionCommand {
            position: u8::from(position != 0),
        }
    }

    pub fn get_position(&self) -> Result<Vec<f64>> {
        self.require_live("p")
    }

    pub fn is_open(&self) -> Result<Vec<bool>> {
        Ok(self.get_position()?.into_iter().map(|p| p > 0.0).collect())
    }

    pub fn to_pid_control_value(&self, index: usize) -> Result<AccessorData> {
        self.accessor(AccessorKind::Position, 0, index)
    }
}
