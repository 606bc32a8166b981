//! Device module - the base device shared by every concrete device type.
//!
//! A [`Device`] is a handle onto one device of the setup loaded from the
//! Aqueduct application. Concrete devices ([`PeristalticPump`],
//! [`PressureTransducer`], ...) wrap it and dereference to it, so the
//! command helpers below are available on all of them.

pub mod balance;
pub mod mass_flow;
pub mod optical_density;
pub mod ph;
pub mod pressure;
pub mod pump;
pub mod solenoid;
pub mod syringe;
pub mod temperature;
pub mod test_device;
pub mod valve;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::ipc::{Action, Connection, Event};
use crate::pid::{AccessorData, AccessorKind};

pub use balance::Balance;
pub use mass_flow::MassFlowMeter;
pub use optical_density::OpticalDensityProbe;
pub use ph::PhProbe;
pub use pressure::PressureTransducer;
pub use pump::PeristalticPump;
pub use solenoid::SolenoidValve;
pub use syringe::SyringePump;
pub use temperature::TemperatureProbe;
pub use test_device::TestDevice;
pub use valve::PinchValve;

/// Delay after each command sent to hardware-backed devices.
pub const HARDWARE_COMMAND_DELAY: Duration = Duration::from_millis(10);

/// One live data entry per device node, e.g. `{"mm": 2.0}`.
pub type LiveEntry = Map<String, Value>;

/// How a device is connected to the Aqueduct application.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Interface {
    Sim = 0,
    Can = 1,
    Ethernet = 2,
    Serial = 3,
}

impl TryFrom<u8> for Interface {
    type Error = String;

    fn try_from(v: u8) -> std::result::Result<Self, Self::Error> {
        match v {
            0 => Ok(Interface::Sim),
            1 => Ok(Interface::Can),
            2 => Ok(Interface::Ethernet),
            3 => Ok(Interface::Serial),
            other => Err(format!("unknown interface {other}")),
        }
    }
}

impl From<Interface> for u8 {
    fn from(i: Interface) -> u8 {
        i as u8
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeviceType {
    PeristalticPump,
    Balance,
    PressureTransducer,
    PinchValve,
    PhProbe,
    OpticalDensityProbe,
    SyringePump,
    SolenoidValve,
    MassFlowMeter,
    TemperatureProbe,
    TestDevice,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::PeristalticPump => "peristaltic_pump",
            DeviceType::Balance => "balance",
            DeviceType::PressureTransducer => "pressure_transducer",
            DeviceType::PinchValve => "pinch_valve",
            DeviceType::PhProbe => "ph_probe",
            DeviceType::OpticalDensityProbe => "optical_density_probe",
            DeviceType::SyringePump => "syringe_pump",
            DeviceType::SolenoidValve => "solenoid_valve",
            DeviceType::MassFlowMeter => "mass_flow_meter",
            DeviceType::TemperatureProbe => "temperature_probe",
            DeviceType::TestDevice => "test_device",
        }
    }
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeviceBase {
    pub device_id: u64,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub interface: Interface,
}

/// Full device record as reported by `get_setup` / `get_device`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct DeviceSnapshot {
    pub base: DeviceBase,
    #[serde(default)]
    pub live: Vec<LiveEntry>,
    #[serde(default)]
    pub stat: Vec<Value>,
    #[serde(default)]
    pub config: Vec<Value>,
}

/// Per-node command. `None` slots leave a node untouched.
pub trait Command {
    fn to_command(&self) -> Value;
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CommandPayload {
    pub user_id: String,
    pub device_id: u64,
    pub action: Action,
    pub command: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<bool>,
}

/// Implemented by every concrete device so the registry can hand out typed
/// handles.
pub trait DeviceKind: Sized {
    const TYPE: DeviceType;

    fn from_device(device: Device) -> Self;
}

#[derive(Clone, Debug)]
pub struct Device {
    base: DeviceBase,
    len: usize,
    has_sim_values: bool,
    conn: Connection,
}

impl Device {
    pub fn new(snapshot: DeviceSnapshot, conn: Connection) -> Self {
        Self {
            len: snapshot.live.len(),
            base: snapshot.base,
            has_sim_values: false,
            conn,
        }
    }

    pub(crate) fn with_sim_values(mut self) -> Self {
        self.has_sim_values = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.base.name
    }

    pub fn device_id(&self) -> u64 {
        self.base.device_id
    }

    pub fn kind(&self) -> &str {
        &self.base.kind
    }

    pub fn interface(&self) -> Interface {
        self.base.interface
    }

    /// Number of nodes (inputs/outputs) of the device.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn has_sim_values(&self) -> bool {
        self.has_sim_values
    }

    /// Session-wide delay if one was set, otherwise none for simulated
    /// devices and [`HARDWARE_COMMAND_DELAY`] for real ones.
    pub fn command_delay(&self) -> Duration {
        match self.conn.settings().get().command_delay {
            Some(delay) => delay,
            None if self.base.interface == Interface::Sim => Duration::ZERO,
            None => HARDWARE_COMMAND_DELAY,
        }
    }

    /// One empty command slot per node.
    pub fn make_commands<C>(&self) -> Vec<Option<C>> {
        (0..self.len).map(|_| None).collect()
    }

    pub fn set_command<C>(&self, commands: &mut [Option<C>], index: usize, command: C) -> Result<()> {
        match commands.get_mut(index) {
            Some(slot) => {
                *slot = Some(command);
                Ok(())
            }
            None => Err(Error::CommandIndex {
                index,
                len: commands.len(),
            }),
        }
    }

    pub fn map_commands<C: Command>(commands: &[Option<C>]) -> Vec<Value> {
        commands
            .iter()
            .map(|c| c.as_ref().map_or(Value::Null, Command::to_command))
            .collect()
    }

    pub fn to_payload(&self, action: Action, command: Value, record: Option<bool>) -> CommandPayload {
        CommandPayload {
            user_id: self.base.user_id.clone(),
            device_id: self.base.device_id,
            action,
            command,
            record,
        }
    }

    pub fn send_command(&self, payload: &CommandPayload) -> Result<Value> {
        tracing::debug!(device = %self.base.name, action = ?payload.action, "device action");
        self.conn
            .send_and_wait_paced(Event::DeviceAction, serde_json::to_value(payload)?, self.command_delay())
    }

    /// Sends `{"commands": [...]}` for `action`.
    pub(crate) fn send_commands<C: Command>(
        &self,
        action: Action,
        commands: &[Option<C>],
        record: Option<bool>,
    ) -> Result<()> {
        let command = json!({ "commands": Self::map_commands(commands) });
        self.send_command(&self.to_payload(action, command, record))?;
        Ok(())
    }

    /// `null` for every node except `index`, which gets `value`.
    pub(crate) fn single_node(&self, index: usize, value: Value) -> Result<Vec<Value>> {
        let mut commands = vec![Value::Null; self.len];
        match commands.get_mut(index) {
            Some(slot) => *slot = value,
            None => return Err(Error::CommandIndex { index, len: self.len }),
        }
        Ok(commands)
    }

    fn identity(&self) -> Value {
        json!({
            "user_id": self.base.user_id,
            "device_id": self.base.device_id,
        })
    }

    fn is_for_me(&self, payload: &Value) -> bool {
        payload.get("device_id").and_then(Value::as_u64) == Some(self.base.device_id)
            && payload.get("user_id").and_then(Value::as_str) == Some(self.base.user_id.as_str())
    }

    fn foreign(&self, event: Event) -> Error {
        Error::Rejected {
            event: event.to_string(),
            message: format!("response is not for device `{}`", self.base.name),
        }
    }

    /// Full device record: base, live, stat and config.
    pub fn get(&self) -> Result<DeviceSnapshot> {
        let mut payload = self.conn.send_and_wait(Event::GetDevice, self.identity())?;
        let device = payload
            .get_mut("device")
            .map(Value::take)
            .ok_or_else(|| self.foreign(Event::GetDevice))?;
        let snapshot: DeviceSnapshot = serde_json::from_value(device)?;
        if snapshot.base.device_id != self.base.device_id || snapshot.base.user_id != self.base.user_id {
            return Err(self.foreign(Event::GetDevice));
        }
        Ok(snapshot)
    }

    pub fn get_live(&self) -> Result<Vec<LiveEntry>> {
        let mut payload = self.conn.send_and_wait(Event::GetDeviceLive, self.identity())?;
        if !self.is_for_me(&payload) {
            return Err(self.foreign(Event::GetDeviceLive));
        }
        let live = payload.get_mut("live").map(Value::take).unwrap_or(Value::Null);
        Ok(serde_json::from_value(live)?)
    }

    /// `key` of every node's live entry, `None` where absent.
    pub fn extract_live(&self, key: &str) -> Result<Vec<Option<f64>>> {
        let live = self.get_live()?;
        Ok((0..self.len)
            .map(|i| live.get(i).and_then(|e| e.get(key)).and_then(Value::as_f64))
            .collect())
    }

    pub fn extract_live_many(&self, keys: &[&str]) -> Result<Vec<Vec<Option<f64>>>> {
        let live = self.get_live()?;
        Ok((0..self.len)
            .map(|i| {
                keys.iter()
                    .map(|k| live.get(i).and_then(|e| e.get(*k)).and_then(Value::as_f64))
                    .collect()
            })
            .collect())
    }

    /// Like [`extract_live`](Self::extract_live) but every node must report `key`.
    pub fn require_live(&self, key: &str) -> Result<Vec<f64>> {
        self.extract_live(key)?
            .into_iter()
            .enumerate()
            .map(|(index, v)| {
                v.ok_or_else(|| Error::MissingLiveValue {
                    device: self.base.name.clone(),
                    key: key.to_string(),
                    index,
                })
            })
            .collect()
    }

    pub fn update_record(&self, record: bool) -> Result<()> {
        self.send_command(&self.to_payload(Action::UpdateRecord, Value::Null, Some(record)))?;
        Ok(())
    }

    /// Drops the recorded history of the device. The application
    /// acknowledges with a `device_action` reply.
    pub fn clear_recorded(&self) -> Result<()> {
        self.conn.send_and_wait_for(
            Event::ClearDeviceRecordable,
            Event::DeviceAction,
            self.identity(),
            self.command_delay(),
        )?;
        Ok(())
    }

    /// Sets simulated values, rates of change and noise, one
    /// `(value, roc, noise)` triple per node. Each present entry is
    /// multiplied by `scale`; missing entries are sent as `null` and leave
    /// the simulator's current setting alone.
    pub fn set_sim_data(
        &self,
        values: Option<&[Option<f64>]>,
        roc: Option<&[Option<f64>]>,
        noise: Option<&[Option<f64>]>,
        scale: f64,
    ) -> Result<()> {
        if !self.has_sim_values {
            return Err(Error::NoSimValues(self.base.name.clone()));
        }
        let pick = |src: Option<&[Option<f64>]>, i: usize| src.and_then(|s| s.get(i).copied().flatten()).map(|v| v * scale);
        let triples: Vec<(Option<f64>, Option<f64>, Option<f64>)> = (0..self.len)
            .map(|i| (pick(values, i), pick(roc, i), pick(noise, i)))
            .collect();

        self.send_command(&self.to_payload(Action::SetSimValues, serde_json::to_value(triples)?, None))?;
        Ok(())
    }

    pub(crate) fn accessor(&self, kind: AccessorKind, units: u8, index: usize) -> Result<AccessorData> {
        if index >= self.len {
            return Err(Error::CommandIndex { index, len: self.len });
        }
        Ok(AccessorData {
            kind,
            units,
            device_id: self.base.device_id,
            index,
        })
    }
}

/// Wraps `$name` around a [`Device`] of type `$ty`.
macro_rules! device_handle {
    ($name:ident, $ty:expr, sim: $sim:expr) => {
        #[derive(Clone, Debug)]
        pub struct $name {
            device: $crate::device::Device,
        }

        impl $crate::device::DeviceKind for $name {
            const TYPE: $crate::device::DeviceType = $ty;

            fn from_device(device: $crate::device::Device) -> Self {
                let device = if $sim { device.with_sim_values() } else { device };
                Self { device }
            }
        }

        impl std::ops::Deref for $name {
            type Target = $crate::device::Device;

            fn deref(&self) -> &Self::Target {
                &self.device
            }
        }
    };
}
pub(crate) use device_handle;

/// Devices of the current setup, by name.
#[derive(Clone, Debug, Default)]
pub struct DeviceRegistry {
    devices: BTreeMap<String, Device>,
}

impl DeviceRegistry {
    pub fn from_snapshots(snapshots: Vec<DeviceSnapshot>, conn: &Connection) -> Self {
        let devices = snapshots
            .into_iter()
            .map(|s| (s.base.name.clone(), Device::new(s, conn.clone())))
            .collect();
        Self { devices }
    }

    pub fn get<T: DeviceKind>(&self, name: &str) -> Result<T> {
        let device = self
            .devices
            .get(name)
            .ok_or_else(|| Error::UnknownDevice(name.to_string()))?;
        if device.kind() != T::TYPE.as_str() {
            return Err(Error::WrongDeviceType {
                name: name.to_string(),
                expected: T::TYPE.as_str(),
                actual: device.kind().to_string(),
            });
        }
        Ok(T::from_device(device.clone()))
    }

    pub fn get_any(&self, name: &str) -> Option<&Device> {
        self.devices.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.devices.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
