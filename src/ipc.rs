//! IPC module - socket link to the Aqueduct application

pub mod connection;
pub mod protocol;
pub mod shared_resource;

pub use connection::Connection;
pub use protocol::{Action, Event, Request, Response};
pub use shared_resource::{DiagnosticLog, ExchangeOutcome, ExchangeRecord, LinkSettings, SettingsBuffer};
