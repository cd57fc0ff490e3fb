//! Simulated pilot fleet: connects N aircraft, streams their telemetry,
//! and applies any commands the coordinator forwards.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use rand::Rng;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use airsep_cli::scenario::{self, ScenarioAircraft};
use airsep_core::Aircraft;
use airsep_sdk::PilotClient;

#[derive(Parser, Debug)]
#[command(name = "pilot_sim", about = "Simulated pilot fleet for the AIRSEP coordinator")]
struct Args {
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Coordinator telemetry port
    #[arg(long, default_value_t = 7401)]
    port: u16,

    /// Number of randomly placed aircraft when no scenario is given
    #[arg(long, default_value_t = 2)]
    count: usize,

    /// JSON array of initial aircraft states
    #[arg(long)]
    scenario: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
    let args = Args::parse();

    let starts = match &args.scenario {
        Some(path) => scenario::load(path)?,
        None => random_fleet(args.count),
    };

    let (shutdown_tx, _) = watch::channel(false);
    let mut fleet = Vec::new();
    for start in starts {
        let mut pilot = match &start.id {
            Some(id) => PilotClient::connect_as(&args.host, args.port, id.clone()).await?,
            None => PilotClient::connect(&args.host, args.port).await?,
        };
        {
            let state = pilot.state();
            let mut state = state.lock().expect("aircraft state poisoned");
            start.apply(&mut state);
        }
        pilot.take_off();
        tracing::info!(id = %pilot.id(), "airborne");

        let mut shutdown = shutdown_tx.subscribe();
        fleet.push(tokio::spawn(async move {
            loop {
                let command = tokio::select! {
                    command = pilot.next_command() => command,
                    _ = shutdown.changed() => break,
                };
                match command {
                    Some(payload) => handle_command(&pilot, &payload),
                    None => break,
                }
            }
            pilot.land().await;
        }));
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("landing the fleet");
    let _ = shutdown_tx.send(true);
    for pilot in fleet {
        let _ = pilot.await;
    }
    Ok(())
}

fn handle_command(pilot: &PilotClient, payload: &str) {
    let state = pilot.state();
    let mut state = state.lock().expect("aircraft state poisoned");
    if scenario::apply_command(&mut state, payload) {
        tracing::info!(id = state.id(), payload, "applied command");
    } else {
        tracing::warn!(id = state.id(), payload, "ignoring unknown command");
    }
}

fn random_fleet(count: usize) -> Vec<ScenarioAircraft> {
    let mut rng = rand::rng();
    (0..count)
        .map(|_| ScenarioAircraft {
            id: None,
            x_km: rng.random_range(-50.0..50.0),
            y_km: rng.random_range(-50.0..50.0),
            altitude_km: rng.random_range(2.0..10.0),
            yaw_deg: rng.random_range(0.0..360.0),
            speed_kmh: rng.random_range(400.0..900.0),
        })
        .collect()
}
