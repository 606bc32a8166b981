//! User interaction objects: setpoints, recordables, prompts and inputs
//! shown in the Aqueduct UI.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::thread;

use crate::error::{Error, Result};
use crate::ipc::{Connection, Event};

/// Declared type of a UI value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dtype {
    Int,
    Float,
    Bool,
    Str,
}

impl Dtype {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dtype::Int => "int",
            Dtype::Float => "float",
            Dtype::Bool => "bool",
            Dtype::Str => "str",
        }
    }

    /// Normalizes `value` to this type. Integers are accepted where floats
    /// are expected; anything else must match exactly.
    pub fn coerce(&self, name: &str, value: Value) -> Result<Value> {
        let ok = match (self, &value) {
            (Dtype::Int, Value::Number(n)) => n.is_i64() || n.is_u64(),
            (Dtype::Float, Value::Number(_)) => true,
            (Dtype::Bool, Value::Bool(_)) => true,
            (Dtype::Str, Value::String(_)) => true,
            _ => false,
        };
        if !ok {
            return Err(Error::InvalidValue {
                name: name.to_string(),
                dtype: self.as_str(),
                value: value.to_string(),
            });
        }
        Ok(match (self, value) {
            (Dtype::Float, Value::Number(n)) => n.as_f64().map_or(Value::Null, |f| json!(f)),
            (_, v) => v,
        })
    }
}

/// Value set by the user in the UI and read by the recipe.
#[derive(Debug)]
pub struct Setpoint {
    name: String,
    dtype: Dtype,
    conn: Connection,
}

impl Setpoint {
    pub(crate) fn create(conn: Connection, name: &str, value: Value, dtype: Dtype) -> Result<Self> {
        let value = dtype.coerce(name, value)?;
        conn.send_and_wait(
            Event::Setpoint,
            json!({
                "user_id": conn.user_id(),
                "setpoint": { "name": name, "value": value, "dtype": dtype },
            }),
        )?;
        Ok(Self {
            name: name.to_string(),
            dtype,
            conn,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dtype(&self) -> Dtype {
        self.dtype
    }

    /// Current value as set in the UI.
    pub fn value(&self) -> Result<Value> {
        let mut payload = self.conn.send_and_wait(
            Event::GetSetpoint,
            json!({ "user_id": self.conn.user_id(), "name": self.name }),
        )?;
        let value = payload.get_mut("value").map(Value::take).unwrap_or(Value::Null);
        self.dtype.coerce(&self.name, value)
    }

    pub fn as_f64(&self) -> Result<f64> {
        let v = self.value()?;
        v.as_f64().ok_or_else(|| self.mismatch(&v))
    }

    pub fn as_i64(&self) -> Result<i64> {
        let v = self.value()?;
        v.as_i64().ok_or_else(|| self.mismatch(&v))
    }

    pub fn as_bool(&self) -> Result<bool> {
        let v = self.value()?;
        v.as_bool().ok_or_else(|| self.mismatch(&v))
    }

    fn mismatch(&self, v: &Value) -> Error {
        Error::InvalidValue {
            name: self.name.clone(),
            dtype: self.dtype.as_str(),
            value: v.to_string(),
        }
    }
}

/// Value published by the recipe and recorded by the application.
#[derive(Debug)]
pub struct Recordable {
    name: String,
    dtype: Dtype,
    conn: Connection,
}

impl Recordable {
    pub(crate) fn create(conn: Connection, name: &str, value: Value, dtype: Dtype) -> Result<Self> {
        let value = dtype.coerce(name, value)?;
        conn.send_and_wait(
            Event::Recordable,
            json!({
                "user_id": conn.user_id(),
                "recordable": { "name": name, "value": value, "dtype": dtype },
            }),
        )?;
        Ok(Self {
            name: name.to_string(),
            dtype,
            conn,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn update(&self, value: impl Into<Value>) -> Result<()> {
        let value = self.dtype.coerce(&self.name, value.into())?;
        self.conn.send_and_wait(
            Event::UpdateRecordable,
            json!({ "user_id": self.conn.user_id(), "name": self.name, "value": value }),
        )?;
        Ok(())
    }

    /// Drops the recorded history.
    pub fn clear(&self) -> Result<()> {
        self.conn.send_and_wait(
            Event::ClearRecordable,
            json!({ "user_id": self.conn.user_id(), "name": self.name }),
        )?;
        Ok(())
    }
}

fn created_id(event: Event, payload: &Value) -> Result<u64> {
    payload.get("id").and_then(Value::as_u64).ok_or_else(|| Error::Rejected {
        event: event.to_string(),
        message: "response carries no id".into(),
    })
}

/// Message shown to the user. A pausing prompt holds the recipe until it
/// is dismissed.
#[derive(Debug)]
pub struct Prompt {
    id: u64,
    message: String,
    pause_recipe: bool,
    conn: Connection,
}

impl Prompt {
    pub(crate) fn create(conn: Connection, message: &str, pause_recipe: bool) -> Result<Self> {
        let payload = conn.send_and_wait(
            Event::Prompt,
            json!({
                "user_id": conn.user_id(),
                "prompt": { "message": message, "pause_recipe": pause_recipe },
            }),
        )?;
        let prompt = Self {
            id: created_id(Event::Prompt, &payload)?,
            message: message.to_string(),
            pause_recipe,
            conn,
        };
        if pause_recipe {
            prompt.wait()?;
        }
        Ok(prompt)
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn pause_recipe(&self) -> bool {
        self.pause_recipe
    }

    /// True until the user dismisses the prompt.
    pub fn is_active(&self) -> Result<bool> {
        let payload = self.conn.send_and_wait(
            Event::GetPrompt,
            json!({ "user_id": self.conn.user_id(), "id": self.id }),
        )?;
        Ok(payload.get("active").and_then(Value::as_bool).unwrap_or(false))
    }

    pub fn wait(&self) -> Result<()> {
        tracing::info!(message = %self.message, "waiting for prompt");
        while self.is_active()? {
            thread::sleep(self.conn.settings().get().poll_interval);
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    #[default]
    Text,
    Table,
    /// CSV upload; the value is the parsed file.
    Csv,
}

impl InputType {
    /// Table and CSV values come back as JSON text.
    pub fn is_structured(&self) -> bool {
        matches!(self, InputType::Table | InputType::Csv)
    }
}

/// One row of a table input.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InputRow {
    pub name: String,
    pub hint: String,
    pub value: Value,
    pub dtype: Dtype,
}

/// Options of [`Aqueduct::input`](crate::Aqueduct::input).
#[derive(Clone, Debug, PartialEq)]
pub struct InputOptions {
    pub pause_recipe: bool,
    pub dtype: Dtype,
    pub input_type: InputType,
    pub rows: Vec<InputRow>,
}

impl Default for InputOptions {
    fn default() -> Self {
        Self {
            pause_recipe: true,
            dtype: Dtype::Str,
            input_type: InputType::Text,
            rows: Vec::new(),
        }
    }
}

/// Value requested from the user.
#[derive(Debug)]
pub struct UserInput {
    id: u64,
    message: String,
    options: InputOptions,
    conn: Connection,
}

impl UserInput {
    pub(crate) fn create(conn: Connection, message: &str, options: InputOptions) -> Result<Self> {
        let payload = conn.send_and_wait(
            Event::Input,
            json!({
                "user_id": conn.user_id(),
                "input": {
                    "message": message,
                    "pause_recipe": options.pause_recipe,
                    "dtype": options.dtype,
                    "input_type": options.input_type,
                    "rows": options.rows,
                },
            }),
        )?;
        Ok(Self {
            id: created_id(Event::Input, &payload)?,
            message: message.to_string(),
            options,
            conn,
        })
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    fn fetch(&self) -> Result<Option<Value>> {
        let mut payload = self.conn.send_and_wait(
            Event::GetInput,
            json!({ "user_id": self.conn.user_id(), "id": self.id }),
        )?;
        match payload.get_mut("value").map(Value::take) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(text)) if self.options.input_type.is_structured() => {
                Ok(Some(serde_json::from_str(&text)?))
            }
            Some(v) if self.options.input_type.is_structured() => Ok(Some(v)),
            Some(v) => self.options.dtype.coerce(&self.message, v).map(Some),
        }
    }

    pub fn is_set(&self) -> Result<bool> {
        Ok(self.fetch()?.is_some())
    }

    /// Value entered by the user. A pausing input blocks until one is
    /// entered; otherwise `None` means nothing has been entered yet.
    pub fn get_value(&self) -> Result<Option<Value>> {
        loop {
            let value = self.fetch()?;
            if value.is_some() || !self.options.pause_recipe {
                return Ok(value);
            }
            thread::sleep(self.conn.settings().get().poll_interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dtype_names() {
        assert_eq!(serde_json::to_value(Dtype::Float).unwrap(), json!("float"));
        let d: Dtype = serde_json::from_value(json!("str")).unwrap();
        assert_eq!(d, Dtype::Str);
        assert_eq!(serde_json::to_value(InputType::Table).unwrap(), json!("table"));
        assert_eq!(serde_json::to_value(InputType::Csv).unwrap(), json!("csv"));
        assert!(InputType::Csv.is_structured());
        assert!(!InputType::Text.is_structured());
    }

    #[test]
    fn coercion() {
        assert_eq!(Dtype::Float.coerce("x", json!(50)).unwrap(), json!(50.0));
        assert_eq!(Dtype::Int.coerce("x", json!(3)).unwrap(), json!(3));
        assert_eq!(Dtype::Bool.coerce("x", json!(true)).unwrap(), json!(true));

        assert!(matches!(
            Dtype::Int.coerce("x", json!(1.5)),
            Err(Error::InvalidValue { dtype: "int", .. })
        ));
        assert!(Dtype::Str.coerce("x", json!(1)).is_err());
        assert!(Dtype::Bool.coerce("x", Value::Null).is_err());
    }
}
