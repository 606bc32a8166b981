//! PID controller definitions.
//!
//! The control loop itself runs inside the Aqueduct application. A recipe
//! describes a controller - which device value to read ([`AccessorData`]
//! for the process value), which to drive (the control value), a setpoint
//! and one or more gain [`Schedule`]s - and registers it with
//! [`Aqueduct::pid_controller`](crate::Aqueduct::pid_controller). The
//! returned [`PidController`] edits or deletes the running controller.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{Error, Result};
use crate::ipc::{Connection, Event};

/// What an accessor reads or drives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum AccessorKind {
    MassFlow = 0,
    Ph = 1,
    Pressure = 2,
    Temperature = 3,
    Weight = 4,
    PeristalticRate = 5,
    SyringeRate = 6,
    PeristalticStatus = 7,
    SyringeStatus = 8,
    Position = 9,
}

impl TryFrom<u8> for AccessorKind {
    type Error = String;

    fn try_from(v: u8) -> std::result::Result<Self, Self::Error> {
        use AccessorKind::*;
        Ok(match v {
            0 => MassFlow,
            1 => Ph,
            2 => Pressure,
            3 => Temperature,
            4 => Weight,
            5 => PeristalticRate,
            6 => SyringeRate,
            7 => PeristalticStatus,
            8 => SyringeStatus,
            9 => Position,
            other => return Err(format!("unknown accessor kind {other}")),
        })
    }
}

impl From<AccessorKind> for u8 {
    fn from(k: AccessorKind) -> u8 {
        k as u8
    }
}

/// A single value of a single device node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AccessorData {
    pub kind: AccessorKind,
    pub units: u8,
    pub device_id: u64,
    pub index: usize,
}

/// Gains and limits used while a schedule is active.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleParameters {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    pub bias: f64,
    pub p_limit: Option<f64>,
    pub i_limit: Option<f64>,
    pub d_limit: Option<f64>,
    /// Error band inside which the output is held.
    pub dead_zone: Option<f64>,
    /// Largest output change per update.
    pub delta_limit: Option<f64>,
    /// Error band inside which the integral accumulates.
    pub integral_valid: Option<f64>,
}

pub type Controller = ScheduleParameters;

/// When a schedule applies. Every range that is set must contain the
/// current value; a schedule with no ranges always applies.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConstraints {
    pub error: Option<(f64, f64)>,
    pub control: Option<(f64, f64)>,
    pub process: Option<(f64, f64)>,
}

pub type ControllerSchedule = ScheduleConstraints;

/// Partial update of [`ScheduleParameters`]; `None` keeps the current value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParameterUpdate {
    pub kp: Option<f64>,
    pub ki: Option<f64>,
    pub kd: Option<f64>,
    pub bias: Option<f64>,
    pub p_limit: Option<f64>,
    pub i_limit: Option<f64>,
    pub d_limit: Option<f64>,
    pub dead_zone: Option<f64>,
    pub delta_limit: Option<f64>,
    pub integral_valid: Option<f64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub parameters: ScheduleParameters,
    pub constraints: ScheduleConstraints,
}

impl Schedule {
    pub fn new(parameters: ScheduleParameters, constraints: ScheduleConstraints) -> Self {
        Self {
            parameters,
            constraints,
        }
    }

    pub fn change_parameters(&mut self, update: &ParameterUpdate) {
        let p = &mut self.parameters;
        macro_rules! apply {
            ($($field:ident),*) => { $(if let Some(v) = update.$field { p.$field = v; })* };
        }
        macro_rules! apply_opt {
            ($($field:ident),*) => { $(if let Some(v) = update.$field { p.$field = Some(v); })* };
        }
        apply!(kp, ki, kd, bias);
        apply_opt!(p_limit, i_limit, d_limit, dead_zone, delta_limit, integral_valid);
    }

    fn validate(&self, index: usize) -> Result<()> {
        let p = &self.parameters;
        for (name, v) in [("kp", p.kp), ("ki", p.ki), ("kd", p.kd), ("bias", p.bias)] {
            if !v.is_finite() {
                return Err(Error::InvalidPid(format!("schedule {index}: {name} is not finite")));
            }
        }
        let limits = [
            ("p_limit", p.p_limit),
            ("i_limit", p.i_limit),
            ("d_limit", p.d_limit),
            ("dead_zone", p.dead_zone),
            ("delta_limit", p.delta_limit),
            ("integral_valid", p.integral_valid),
        ];
        for (name, limit) in limits {
            if let Some(v) = limit {
                if !(v >= 0.0) {
                    return Err(Error::InvalidPid(format!("schedule {index}: {name} must be >= 0, got {v}")));
                }
            }
        }
        let c = &self.constraints;
        for (name, range) in [("error", c.error), ("control", c.control), ("process", c.process)] {
            if let Some((lo, hi)) = range {
                if !(lo <= hi) {
                    return Err(Error::InvalidPid(format!("schedule {index}: {name} range ({lo}, {hi}) is inverted")));
                }
            }
        }
        Ok(())
    }
}

pub const DEFAULT_UPDATE_INTERVAL_MS: u64 = 1000;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pid {
    /// A disabled controller outputs nothing.
    pub enabled: bool,
    pub update_interval_ms: u64,
    pub setpoint: f64,
    /// Bounds applied to the final output; `None` leaves a side open.
    pub output_limits: (Option<f64>, Option<f64>),
    pub schedule: Vec<Schedule>,
}

impl Pid {
    pub fn new(setpoint: f64) -> Self {
        Self {
            enabled: false,
            update_interval_ms: DEFAULT_UPDATE_INTERVAL_MS,
            setpoint,
            output_limits: (None, None),
            schedule: Vec::new(),
        }
    }

    pub fn add_schedule(&mut self, schedule: Schedule) {
        self.schedule.push(schedule);
    }

    pub fn validate(&self) -> Result<()> {
        if !self.setpoint.is_finite() {
            return Err(Error::InvalidPid("setpoint is not finite".into()));
        }
        if self.update_interval_ms == 0 {
            return Err(Error::InvalidPid("update interval must be positive".into()));
        }
        if let (Some(lo), Some(hi)) = self.output_limits {
            if !(lo <= hi) {
                return Err(Error::InvalidPid(format!("output limits ({lo}, {hi}) are inverted")));
            }
        }
        if self.schedule.is_empty() {
            return Err(Error::InvalidPid("at least one schedule is required".into()));
        }
        self.schedule
            .iter()
            .enumerate()
            .try_for_each(|(i, s)| s.validate(i))
    }
}

/// A controller registered with the Aqueduct application.
#[derive(Debug)]
pub struct PidController {
    id: u64,
    name: Option<String>,
    input: AccessorData,
    output: AccessorData,
    pid: Pid,
    conn: Connection,
}

impl PidController {
    pub(crate) fn create(
        conn: Connection,
        name: Option<String>,
        input: AccessorData,
        output: AccessorData,
        pid: Pid,
    ) -> Result<Self> {
        pid.validate()?;
        let body = Self::body(name.as_deref(), &input, &output, &pid);
        let payload = conn.send_and_wait(
            Event::CreatePidController,
            json!({ "user_id": conn.user_id(), "controller": body }),
        )?;
        let id = payload
            .get("id")
            .and_then(Value::as_u64)
            .ok_or_else(|| Error::Rejected {
                event: Event::CreatePidController.to_string(),
                message: "response carries no controller id".into(),
            })?;
        tracing::info!(id, name = ?name, setpoint = pid.setpoint, "pid controller created");

        Ok(Self {
            id,
            name,
            input,
            output,
            pid,
            conn,
        })
    }

    fn body(name: Option<&str>, input: &AccessorData, output: &AccessorData, pid: &Pid) -> Value {
        json!({ "name": name, "input": input, "output": output, "pid": pid })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn input(&self) -> &AccessorData {
        &self.input
    }

    pub fn output(&self) -> &AccessorData {
        &self.output
    }

    pub fn pid(&self) -> &Pid {
        &self.pid
    }

    pub fn to_json(&self) -> Result<String> {
        let body = Self::body(self.name.as_deref(), &self.input, &self.output, &self.pid);
        Ok(serde_json::to_string(&body)?)
    }

    pub fn change_setpoint(&mut self, setpoint: f64) -> Result<()> {
        self.edit(|pid| pid.setpoint = setpoint)
    }

    pub fn enable(&mut self) -> Result<()> {
        self.edit(|pid| pid.enabled = true)
    }

    pub fn disable(&mut self) -> Result<()> {
        self.edit(|pid| pid.enabled = false)
    }

    pub fn set_output_limits(&mut self, limits: (Option<f64>, Option<f64>)) -> Result<()> {
        self.edit(|pid| pid.output_limits = limits)
    }

    pub fn change_parameters(&mut self, schedule_index: usize, update: &ParameterUpdate) -> Result<()> {
        let len = self.pid.schedule.len();
        if schedule_index >= len {
            return Err(Error::ScheduleIndex {
                index: schedule_index,
                len,
            });
        }
        self.edit(|pid| pid.schedule[schedule_index].change_parameters(update))
    }

    /// Applies `f` to a copy, validates and sends it; the local definition
    /// only changes once the application accepted it.
    fn edit(&mut self, f: impl FnOnce(&mut Pid)) -> Result<()> {
        let mut pid = self.pid.clone();
        f(&mut pid);
        pid.validate()?;
        self.conn.send_and_wait(
            Event::EditPidController,
            json!({ "user_id": self.conn.user_id(), "id": self.id, "pid": pid }),
        )?;
        self.pid = pid;
        Ok(())
    }

    pub fn delete(self) -> Result<()> {
        self.conn.send_and_wait(
            Event::DeletePidController,
            json!({ "user_id": self.conn.user_id(), "id": self.id }),
        )?;
        tracing::info!(id = self.id, "pid controller deleted");
        Ok(())
    }
}
