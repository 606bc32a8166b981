//! Wire format spoken with the Aqueduct application.
//!
//! Requests are `[command, [event, payload]]`, responses `[event, payload]`,
//! one JSON document per line.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SocketCommand {
    SocketMessage,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Event {
    RegisterProcess,
    Initialize,
    ClearSetup,
    AddDevice,
    GetSetup,
    GetDevice,
    GetDeviceLive,
    DeviceAction,
    ClearDeviceRecordable,
    Log,
    CreatePidController,
    EditPidController,
    DeletePidController,
    Setpoint,
    GetSetpoint,
    Recordable,
    UpdateRecordable,
    ClearRecordable,
    Prompt,
    GetPrompt,
    Input,
    GetInput,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::RegisterProcess => "register_process",
            Event::Initialize => "initialize",
            Event::ClearSetup => "clear_setup",
            Event::AddDevice => "add_device",
            Event::GetSetup => "get_setup",
            Event::GetDevice => "get_device",
            Event::GetDeviceLive => "get_device_live",
            Event::DeviceAction => "device_action",
            Event::ClearDeviceRecordable => "clear_device_recordable",
            Event::Log => "log",
            Event::CreatePidController => "create_pid_controller",
            Event::EditPidController => "edit_pid_controller",
            Event::DeletePidController => "delete_pid_controller",
            Event::Setpoint => "setpoint",
            Event::GetSetpoint => "get_setpoint",
            Event::Recordable => "recordable",
            Event::UpdateRecordable => "update_recordable",
            Event::ClearRecordable => "clear_recordable",
            Event::Prompt => "prompt",
            Event::GetPrompt => "get_prompt",
            Event::Input => "input",
            Event::GetInput => "get_input",
        }
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Device actions carried by [`Event::DeviceAction`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Start,
    Stop,
    ChangeSpeed,
    SetValvePosition,
    Tare,
    UpdateRecord,
    SetSimValues,
    SetConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request(pub SocketCommand, pub (Event, Value));

impl Request {
    pub fn new(event: Event, payload: Value) -> Self {
        Self(SocketCommand::SocketMessage, (event, payload))
    }

    pub fn event(&self) -> Event {
        self.1 .0
    }

    pub fn payload(&self) -> &Value {
        &self.1 .1
    }

    /// Encodes the request as a single newline-terminated line.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut line = serde_json::to_vec(self)?;
        line.push(b'\n');
        Ok(line)
    }

    pub fn decode(line: &str) -> Result<Self> {
        Ok(serde_json::from_str(line.trim_end())?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response(pub Event, pub Value);

impl Response {
    pub fn decode(line: &str) -> Result<Self> {
        Ok(serde_json::from_str(line.trim_end())?)
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut line = serde_json::to_vec(self)?;
        line.push(b'\n');
        Ok(line)
    }

    /// Splits off the payload, turning an `{"error": ...}` payload into
    /// [`Error::Rejected`]. The application sends payloads as JSON text
    /// inside a string; a string that is not JSON is returned as is.
    pub fn into_payload(self) -> Result<Value> {
        let Response(event, payload) = self;
        let payload = match payload {
            Value::String(text) => serde_json::from_str(&text).unwrap_or(Value::String(text)),
            other => other,
        };
        if let Some(message) = payload.get("error").and_then(Value::as_str) {
            return Err(Error::Rejected {
                event: event.to_string(),
                message: message.to_string(),
            });
        }
        Ok(payload)
    }
}
