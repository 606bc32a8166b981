//! Connects to the Aqueduct application, loads the setup and reports what
//! it finds. Recipes built on the library start the same way.

use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use aqueduct::{load_config, Aqueduct, InitParams, RecipeSettings};

fn run(params: &InitParams) -> aqueduct::Result<()> {
    let settings = match &params.config {
        Some(path) => load_config(path)?,
        None => RecipeSettings::default(),
    };

    let mut aq = Aqueduct::from_params(params, &settings)?;
    aq.initialize(params.init)?;

    for name in aq.devices().names() {
        if let Some(device) = aq.devices().get_any(name) {
            tracing::info!(name, kind = device.kind(), nodes = device.len(), interface = ?device.interface(), "device");
        }
    }
    aq.info(&format!("recipe `{}` ready", aq.user_id()))?;

    let report = aq.metrics();
    tracing::info!(
        exchanges = report.exchanges,
        retries = report.retries,
        failures = report.failures,
        p50 = ?report.round_trip_p50,
        p99 = ?report.round_trip_p99,
        "link metrics"
    );
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let params = InitParams::parse_args();
    tracing::debug!(?params, "start-up parameters");

    match run(&params) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "recipe failed");
            ExitCode::FAILURE
        }
    }
}
