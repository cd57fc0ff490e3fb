//! Terminal monitor: prints the broadcast feed, with an optional
//! one-shot lock-and-command.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use airsep_core::Aircraft;
use airsep_sdk::{ConsoleClient, ConsoleEvent};

#[derive(Parser, Debug)]
#[command(name = "monitor", about = "Subscribe to the AIRSEP broadcast feed")]
struct Args {
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Coordinator console port
    #[arg(long, default_value_t = 7402)]
    port: u16,

    /// Acquire the command lock for this aircraft after connecting
    #[arg(long)]
    lock: Option<String>,

    /// Payload to push once the lock is granted (requires --lock)
    #[arg(long, requires = "lock")]
    command: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();
    let args = Args::parse();

    let mut console = ConsoleClient::connect(&args.host, args.port).await?;
    if let Some(id) = &args.lock {
        console.lock(id);
    }

    loop {
        let event = tokio::select! {
            event = console.next_event() => event,
            _ = tokio::signal::ctrl_c() => break,
        };
        let Some(event) = event else {
            tracing::warn!("feed closed by the coordinator");
            break;
        };
        print_event(&console, event, args.command.as_deref());
    }

    console.close().await;
    Ok(())
}

fn print_event(console: &ConsoleClient, event: ConsoleEvent, command: Option<&str>) {
    match event {
        ConsoleEvent::AirplaneList(fleet) => {
            println!("-- {} aircraft --", fleet.len());
            for ap in &fleet {
                println!(
                    "{:8} pos=({:8.2}, {:8.2}) alt={:6.3} km hdg={:5.1} spd={:5.0} km/h {:?}",
                    ap.id(),
                    ap.position().x,
                    ap.position().y,
                    ap.altitude(),
                    ap.yaw(),
                    ap.speed(),
                    ap.threat(),
                );
            }
        }
        ConsoleEvent::CollisionList(pairs) => {
            for pair in &pairs {
                println!("!! {} <-> {}: {:?}", pair.a, pair.b, pair.level);
            }
        }
        ConsoleEvent::Alert(text) => println!("ALERT: {text}"),
        ConsoleEvent::LockAck(id) => {
            println!("lock granted for {id}");
            if let Some(payload) = command {
                console.command(&id, payload);
            }
        }
        ConsoleEvent::ReleaseAck(id) => println!("lock released for {id}"),
    }
}
