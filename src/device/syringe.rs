//! Syringe pump. Shares the rate and finite-amount units of the
//! peristaltic pump; direction is infuse or withdraw.

use serde_json::{json, Value};

use super::pump::{ChangeSpeedCommand, FiniteUnits, Mode, RateUnits, StopCommand};
use super::{device_handle, Command, DeviceType};
use crate::error::Result;
use crate::ipc::Action;
use crate::pid::{AccessorData, AccessorKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Stopped = 0,
    Infusing = 1,
    Withdrawing = 2,
}

impl Status {
    pub fn reverse(self) -> Status {
        match self {
            Status::Infusing => Status::Withdrawing,
            Status::Withdrawing => Status::Infusing,
            Status::Stopped => Status::Stopped,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StartCommand {
    pub mode: Mode,
    pub direction: Status,
    pub rate_value: f64,
    pub rate_units: RateUnits,
    pub finite_value: Option<f64>,
    pub finite_units: Option<FiniteUnits>,
}

impl StartCommand {
    pub fn with_finite(mut self, value: f64, units: FiniteUnits) -> Self {
        self.mode = Mode::Finite;
        self.finite_value = Some(value);
        self.finite_units = Some(units);
        self
    }
}

impl Command for StartCommand {
    fn to_command(&self) -> Value {
        json!([
            self.mode as u8,
            self.direction as u8,
            self.rate_units as u8,
            self.rate_value,
            self.finite_value,
            self.finite_units.map(|u| u as u8),
        ])
    }
}

device_handle!(SyringePump, DeviceType::SyringePump, sim: false);

impl SyringePump {
    pub fn start(&self, commands: &[Option<StartCommand>], record: Option<bool>) -> Result<()> {
        self.send_commands(Action::Start, commands, record)
    }

    pub fn change_speed(&self, commands: &[Option<ChangeSpeedCommand>], record: Option<bool>) -> Result<()> {
        self.send_commands(Action::ChangeSpeed, commands, record)
    }

    /// Stops the nodes with a command, or every node when `commands` is `None`.
    pub fn stop(&self, commands: Option<&[Option<StopCommand>]>) -> Result<()> {
        match commands {
            Some(commands) => self.send_commands(Action::Stop, commands, None),
            None => {
                let all: Vec<Option<StopCommand>> = (0..self.len()).map(|_| Some(StopCommand { stop: 1 })).collect();
                self.send_commands(Action::Stop, &all, None)
            }
        }
    }

    pub fn make_start_command(mode: Mode, rate_units: RateUnits, rate_value: f64, direction: Status) -> StartCommand {
        StartCommand {
            mode,
            direction,
            rate_value,
            rate_units,
            finite_value: None,
            finite_units: None,
        }
    }

    /// Displacement rate of every node, in uL/min.
    pub fn get_ul_min(&self) -> Result<Vec<f64>> {
        self.require_live("um")
    }

    pub fn to_pid_control_value(&self, index: usize) -> Result<AccessorData> {
        self.accessor(AccessorKind::SyringeRate, RateUnits::UlMin as u8, index)
    }

    /// Drives the direction of a node rather than its rate.
    pub fn to_pid_status_value(&self, index: usize) -> Result<AccessorData> {
        self.accessor(AccessorKind::SyringeStatus, 0, index)
    }
}
