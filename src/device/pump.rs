//! Peristaltic pump.

use serde::Serialize;
use serde_json::{json, Value};

use super::{device_handle, Command, DeviceType};
use crate::error::Result;
use crate::ipc::Action;
use crate::pid::{AccessorData, AccessorKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Continuous = 0,
    Finite = 1,
}

/// Pump status, also used to pick a direction when starting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Stopped = 0,
    Clockwise = 1,
    CounterClockwise = 2,
}

impl Status {
    /// Opposite direction; `Stopped` stays `Stopped`.
    pub fn reverse(self) -> Status {
        match self {
            Status::Clockwise => Status::CounterClockwise,
            Status::CounterClockwise => Status::Clockwise,
            Status::Stopped => Status::Stopped,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateUnits {
    Rpm = 0,
    UlMin = 1,
    UlHr = 2,
    MlMin = 3,
    MlHr = 4,
}

/// Units of the amount to deliver in [`Mode::Finite`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FiniteUnits {
    Steps = 0,
    Seconds = 1,
    Minutes = 2,
    Degrees = 3,
    Ml = 4,
    Ul = 5,
    Revolutions = 6,
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

#[derive(Clone, Debug, PartialEq)]
pub struct StopCommand {
    pub stop: u8,
}

impl Command for StopCommand {
    fn to_command(&self) -> Value {
        json!(self.stop)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChangeSpeedCommand {
    pub rate_value: f64,
    pub rate_units: RateUnits,
}

impl Command for ChangeSpeedCommand {
    fn to_command(&self) -> Value {
        json!([self.rate_units as u8, self.rate_value])
    }
}

/// Stepper motor calibration. `None` fields are left unchanged.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct StepperMotorConfig {
    pub rev_per_ml: Option<f64>,
    pub steps_per_rev: Option<u32>,
}

impl Command for StepperMotorConfig {
    fn to_command(&self) -> Value {
        json!({ "rev_per_ml": self.rev_per_ml, "steps_per_rev": self.steps_per_rev })
    }
}

device_handle!(PeristalticPump, DeviceType::PeristalticPump, sim: false);

impl PeristalticPump {
    /// Starts the nodes with a command, in finite or continuous mode.
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
                let all: Vec<Option<StopCommand>> =
                    (0..self.len()).map(|_| Some(Self::make_stop_command())).collect();
                self.send_commands(Action::Stop, &all, None)
            }
        }
    }

    pub fn set_config(&self, configs: &[Option<StepperMotorConfig>]) -> Result<()> {
        self.send_commands(Action::SetConfig, configs, None)
    }

    /// Continuous-mode start command; chain [`StartCommand::with_finite`]
    /// for a finite run.
    pub fn make_start_command(
        mode: Mode,
        direction: Status,
        rate_value: f64,
        rate_units: RateUnits,
    ) -> StartCommand {
        StartCommand {
            mode,
            direction,
            rate_value,
            rate_units,
            finite_value: None,
            finite_units: None,
        }
    }

    pub fn make_stop_command() -> StopCommand {
        StopCommand { stop: 1 }
    }

    pub fn make_change_speed_command(rate_value: f64, rate_units: RateUnits) -> ChangeSpeedCommand {
        ChangeSpeedCommand {
            rate_value,
            rate_units,
        }
    }

    /// Displacement rate of every node, in mL/min.
    pub fn get_ml_min(&self) -> Result<Vec<f64>> {
        self.require_live("mm")
    }

    pub fn to_pid_control_value(&self, index: usize) -> Result<AccessorData> {
        self.accessor(AccessorKind::PeristalticRate, RateUnits::MlMin as u8, index)
    }
}
