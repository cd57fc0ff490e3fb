//! Wires the listeners to the coordinator task.

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use airsep_core::{CollisionEngine, SeparationRules};
use airsep_net::{Listener, NetError, Role};

use crate::config::Config;
use crate::coordinator::Coordinator;

/// A running coordinator: two listeners plus the actor task.
pub struct Server {
    telemetry: Listener,
    console: Listener,
    shutdown: watch::Sender<bool>,
    coordinator: JoinHandle<()>,
}

impl Server {
    pub async fn start(config: &Config, rules: SeparationRules) -> Result<Server, NetError> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let telemetry = Listener::bind(
            config.telemetry_port,
            Role::Telemetry,
            events_tx.clone(),
            config.read_timeout,
        )
        .await?;
        let console = Listener::bind(
            config.console_port,
            Role::Console,
            events_tx,
            config.read_timeout,
        )
        .await?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let coordinator = Coordinator::new(CollisionEngine::new(rules));
        let coordinator = tokio::spawn(coordinator.run(events_rx, config.tick, shutdown_rx));

        Ok(Server { telemetry, console, shutdown: shutdown_tx, coordinator })
    }

    pub fn telemetry_port(&self) -> u16 {
        self.telemetry.local_addr().port()
    }

    pub fn console_port(&self) -> u16 {
        self.console.local_addr().port()
    }

    /// Stop the actor first so no handler runs against a closing
    /// transport, then tear both listeners down.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.coordinator.await;
        self.telemetry.shutdown().await;
        self.console.shutdown().await;
        tracing::info!("coordinator stopped");
    }
}
