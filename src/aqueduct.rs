//! The recipe session.
//!
//! An [`Aqueduct`] owns the connection to the application, keeps the device
//! registry of the current setup and hands out devices, PID controllers
//! and UI objects that share its connection.

use serde::Serialize;
use serde_json::{json, Value};
use std::net::TcpStream;
use std::time::Duration;

use crate::config::RecipeSettings;
use crate::device::{DeviceKind, DeviceRegistry, DeviceSnapshot, DeviceType};
use crate::error::Result;
use crate::ipc::{Connection, DiagnosticLog, Event, LinkSettings, SettingsBuffer};
use crate::metrics::MetricsReport;
use crate::params::InitParams;
use crate::pid::{AccessorData, Pid, PidController};
use crate::ui::{Dtype, InputOptions, Prompt, Recordable, Setpoint, UserInput};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

#[derive(Debug)]
pub struct Aqueduct {
    conn: Connection,
    devices: DeviceRegistry,
}

impl Aqueduct {
    /// Connects with default settings.
    pub fn connect(user_id: &str, addr: &str, port: u16, register_process: bool) -> Result<Self> {
        Self::connect_with(user_id, addr, port, register_process, &RecipeSettings::default())
    }

    pub fn connect_with(
        user_id: &str,
        addr: &str,
        port: u16,
        register_process: bool,
        settings: &RecipeSettings,
    ) -> Result<Self> {
        tracing::info!(user_id, addr, port, "connecting to aqueduct");
        let stream = TcpStream::connect((addr, port))?;
        Self::from_stream(stream, user_id, register_process, settings)
    }

    pub fn from_params(params: &InitParams, settings: &RecipeSettings) -> Result<Self> {
        Self::connect_with(
            &params.user_id,
            &params.ip_address,
            params.port,
            params.register_process,
            settings,
        )
    }

    /// Session over an already open stream.
    pub fn from_stream(
        stream: TcpStream,
        user_id: &str,
        register_process: bool,
        settings: &RecipeSettings,
    ) -> Result<Self> {
        let conn = Connection::from_stream(
            stream,
            user_id,
            SettingsBuffer::new(LinkSettings::from(settings)),
            DiagnosticLog::new(settings.diagnostic_log_size),
        )?;
        let aq = Self {
            conn,
            devices: DeviceRegistry::default(),
        };
        if register_process {
            aq.register_process()?;
        }
        Ok(aq)
    }

    fn register_process(&self) -> Result<()> {
        let pid = std::process::id();
        self.conn.send_and_wait(
            Event::RegisterProcess,
            json!({ "user_id": self.conn.user_id(), "pid": pid }),
        )?;
        tracing::info!(pid, "process registered");
        Ok(())
    }

    pub fn user_id(&self) -> &str {
        self.conn.user_id()
    }

    /// Starts the session. `init` asks the application to reset the setup;
    /// the current setup is loaded either way.
    pub fn initialize(&mut self, init: bool) -> Result<()> {
        self.conn.send_and_wait(
            Event::Initialize,
            json!({ "user_id": self.conn.user_id(), "init": init }),
        )?;
        self.get_setup()?;
        Ok(())
    }

    /// Delay after each command, for every device of the session.
    pub fn set_command_delay(&self, delay: Duration) {
        self.conn.settings().update(|s| s.command_delay = Some(delay));
    }

    pub fn clear_setup(&mut self) -> Result<()> {
        self.conn
            .send_and_wait(Event::ClearSetup, json!({ "user_id": self.conn.user_id() }))?;
        self.devices = DeviceRegistry::default();
        Ok(())
    }

    /// Adds a simulated device with `size` nodes. Call [`get_setup`](Self::get_setup)
    /// afterwards to get a handle.
    pub fn add_device(&self, kind: DeviceType, name: &str, size: usize) -> Result<()> {
        self.conn.send_and_wait(
            Event::AddDevice,
            json!({
                "user_id": self.conn.user_id(),
                "type": kind.as_str(),
                "name": name,
                "size": size,
            }),
        )?;
        tracing::debug!(%kind, name, size, "device added");
        Ok(())
    }

    /// Reloads the setup and rebuilds the device registry.
    pub fn get_setup(&mut self) -> Result<&DeviceRegistry> {
        let mut payload = self
            .conn
            .send_and_wait(Event::GetSetup, json!({ "user_id": self.conn.user_id() }))?;
        let devices = payload.get_mut("devices").map(Value::take).unwrap_or(Value::Null);
        let snapshots: Vec<DeviceSnapshot> = match devices {
            Value::Null => Vec::new(),
            other => serde_json::from_value(other)?,
        };
        self.devices = DeviceRegistry::from_snapshots(snapshots, &self.conn);
        tracing::info!(devices = self.devices.len(), "setup loaded");
        Ok(&self.devices)
    }

    pub fn devices(&self) -> &DeviceRegistry {
        &self.devices
    }

    pub fn device<T: DeviceKind>(&self, name: &str) -> Result<T> {
        self.devices.get(name)
    }

    /// Sends `message` to the application log and emits it locally.
    pub fn log(&self, level: LogLevel, message: &str) -> Result<()> {
        match level {
            LogLevel::Debug => tracing::debug!(target: "aqueduct::recipe", "{message}"),
            LogLevel::Info => tracing::info!(target: "aqueduct::recipe", "{message}"),
            LogLevel::Warning => tracing::warn!(target: "aqueduct::recipe", "{message}"),
            LogLevel::Error => tracing::error!(target: "aqueduct::recipe", "{message}"),
            LogLevel::Critical => tracing::error!(target: "aqueduct::recipe", critical = true, "{message}"),
        }
        self.conn.send_and_wait(
            Event::Log,
            json!({ "user_id": self.conn.user_id(), "level": level, "message": message }),
        )?;
        Ok(())
    }

    pub fn debug(&self, message: &str) -> Result<()> {
        self.log(LogLevel::Debug, message)
    }

    pub fn info(&self, message: &str) -> Result<()> {
        self.log(LogLevel::Info, message)
    }

    pub fn warning(&self, message: &str) -> Result<()> {
        self.log(LogLevel::Warning, message)
    }

    pub fn error(&self, message: &str) -> Result<()> {
        self.log(LogLevel::Error, message)
    }

    pub fn critical(&self, message: &str) -> Result<()> {
        self.log(LogLevel::Critical, message)
    }

    /// Registers a controller driving `control` so that `process` follows
    /// the setpoint of `pid`.
    pub fn pid_controller(
        &self,
        name: &str,
        process: AccessorData,
        control: AccessorData,
        pid: Pid,
    ) -> Result<PidController> {
        PidController::create(self.conn.clone(), Some(name.to_string()), process, control, pid)
    }

    pub fn setpoint(&self, name: &str, value: impl Into<Value>, dtype: Dtype) -> Result<Setpoint> {
        Setpoint::create(self.conn.clone(), name, value.into(), dtype)
    }

    pub fn recordable(&self, name: &str, value: impl Into<Value>, dtype: Dtype) -> Result<Recordable> {
        Recordable::create(self.conn.clone(), name, value.into(), dtype)
    }

    /// Shows `message`; with `pause_recipe` this returns once the user
    /// dismissed it.
    pub fn prompt(&self, message: &str, pause_recipe: bool) -> Result<Prompt> {
        Prompt::create(self.conn.clone(), message, pause_recipe)
    }

    pub fn input(&self, message: &str, options: InputOptions) -> Result<UserInput> {
        UserInput::create(self.conn.clone(), message, options)
    }

    pub fn metrics(&self) -> MetricsReport {
        self.conn.metrics().report()
    }

    pub fn diagnostics(&self) -> &DiagnosticLog {
        self.conn.diagnostics()
    }
}
