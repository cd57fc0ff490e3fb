use anyhow::Result;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use airsep_server::{Config, Server};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::from_default_env()
                .add_directive("airsep_server=debug".parse()?)
                .add_directive("airsep_net=info".parse()?),
        )
        .init();

    let config = Config::from_env();
    let rules = config.load_rules()?;
    let server = Server::start(&config, rules).await?;
    tracing::info!(
        telemetry_port = server.telemetry_port(),
        console_port = server.console_port(),
        "coordinator ready",
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested");
    server.shutdown().await;
    Ok(())
}
