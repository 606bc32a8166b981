//! Error types for the Aqueduct recipe client

use thiserror::Error;

/// Result type alias for Aqueduct operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to the Aqueduct application
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Socket error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A frame could not be encoded or a payload did not have the expected shape
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Settings file could not be parsed
    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    /// No matching response after every attempt
    #[error("no `{event}` response after {attempts} attempts")]
    NoResponse { event: String, attempts: u32 },

    /// The application answered with an error payload
    #[error("`{event}` rejected: {message}")]
    Rejected { event: String, message: String },

    #[error("no device named `{0}` in the setup")]
    UnknownDevice(String),

    #[error("device `{name}` is a {actual}, not a {expected}")]
    WrongDeviceType {
        name: String,
        expected: &'static str,
        actual: String,
    },

    #[error("command index {index} larger than device size {len}")]
    CommandIndex { index: usize, len: usize },

    #[error("{0} does not have simulated values")]
    NoSimValues(String),

    #[error("{device}: no `{key}` value for node {index}")]
    MissingLiveValue {
        device: String,
        key: String,
        index: usize,
    },

    #[error("invalid PID definition: {0}")]
    InvalidPid(String),

    #[error("schedule index {index} out of range ({len} schedules)")]
    ScheduleIndex { index: usize, len: usize },

    /// A UI value does not match its declared type
    #[error("`{name}` expects a {dtype} value, got {value}")]
    InvalidValue {
        name: String,
        dtype: &'static str,
        value: String,
    },

    /// A background process model stopped with an error
    #[error("process model stopped: {0}")]
    Model(String),
}
