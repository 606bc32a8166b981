//! Recipe client for the Aqueduct Fluidics application.
//!
//! A recipe connects to a running Aqueduct application over TCP, loads the
//! device setup, drives pumps and valves, reads sensors and registers PID
//! controllers that the application then runs.

pub mod aqueduct;
pub mod config;
pub mod device;
pub mod error;
pub mod ipc;
pub mod metrics;
pub mod params;
pub mod pid;
pub mod sim;
pub mod ui;
pub mod units;

pub use aqueduct::{Aqueduct, LogLevel};
pub use config::{load_config, RecipeSettings};
pub use device::{Device, DeviceKind, DeviceRegistry, DeviceType, Interface};
pub use error::{Error, Result};
pub use params::InitParams;
pub use pid::{AccessorData, AccessorKind, Controller, ControllerSchedule, Pid, PidController, Schedule};
