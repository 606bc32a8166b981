use serde_json::{json, Value};

use super::{device_handle, Command, DeviceType};
use crate::error::Result;
use crate::ipc::Action;
use crate::pid::{AccessorData, AccessorKind};

/// Target opening of a pinch valve, 0.0 (closed) to 1.0 (open).
#[derive(Clone, Debug, PartialEq)]
pub struct SetPositionCommand {
    pub pct_open: f64,
}

impl Command for SetPositionCommand {
    fn to_command(&self) -> Value {
        json!(self.pct_open)
    }
}

device_handle!(PinchValve, DeviceType::PinchValve, sim: false);

impl PinchValve {
    pub fn set_position(&self, commands: &[Option<SetPositionCommand>], record: Option<bool>) -> Result<()> {
        self.send_commands(Action::SetValvePosition, commands, record)
    }

    pub fn make_set_position_command(pct_open: f64) -> SetPositionCommand {
        SetPositionCommand { pct_open }
    }

    pub fn get_pct_open(&self) -> Result<Vec<f64>> {
        self.require_live("p")
    }

    pub fn to_pid_control_value(&self, index: usize) -> Result<AccessorData> {
        self.accessor(AccessorKind::Position, 0, index)
    }
}
