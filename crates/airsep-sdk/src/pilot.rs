//! Pilot-side client: owns one aircraft and streams its telemetry.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::Rng;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use airsep_core::wire;
use airsep_core::{Aircraft, AircraftState};
use airsep_net::{Connection, NetError, NetEvent, Role};

/// Telemetry cadence while airborne.
const STREAM_PERIOD: Duration = Duration::from_millis(500);

/// One pilot process: a connection to the coordinator's telemetry port
/// plus the aircraft it flies. Commands forwarded by the coordinator
/// surface through [`next_command`](PilotClient::next_command).
pub struct PilotClient {
    conn: Arc<Connection>,
    state: Arc<Mutex<AircraftState>>,
    commands: mpsc::UnboundedReceiver<String>,
    stream_task: Option<JoinHandle<()>>,
    relay_task: JoinHandle<()>,
}

impl PilotClient {
    /// Connect with a generated `AP-XY` identity.
    pub async fn connect(host: &str, port: u16) -> Result<PilotClient, NetError> {
        Self::connect_as(host, port, random_id()).await
    }

    pub async fn connect_as(
        host: &str,
        port: u16,
        id: impl Into<String>,
    ) -> Result<PilotClient, NetError> {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let conn = Connection::connect(host, port, Role::Telemetry, events_tx).await?;

        // Command payloads arrive verbatim, one per line.
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let relay_task = tokio::spawn(async move {
            while let Some(event) = events_rx.recv().await {
                match event {
                    NetEvent::Line { line, .. } => {
                        let _ = cmd_tx.send(line);
                    }
                    NetEvent::Closed { .. } => break,
                    NetEvent::Accepted(_) => {}
                }
            }
        });

        Ok(PilotClient {
            conn,
            state: Arc::new(Mutex::new(AircraftState::new(id))),
            commands: cmd_rx,
            stream_task: None,
            relay_task,
        })
    }

    /// Shared handle to the flown aircraft. Callers may adjust attitude
    /// and speed at any time; the next telemetry record picks it up.
    pub fn state(&self) -> Arc<Mutex<AircraftState>> {
        self.state.clone()
    }

    pub fn id(&self) -> String {
        self.state.lock().expect("aircraft state poisoned").id().to_string()
    }

    /// Start streaming: every 500 ms, advance the aircraft along its
    /// heading and send one telemetry record. Idempotent.
    pub fn take_off(&mut self) {
        if self.stream_task.is_some() {
            return;
        }
        let conn = self.conn.clone();
        let state = self.state.clone();
        self.stream_task = Some(tokio::spawn(async move {
            let mut ticker = time::interval(STREAM_PERIOD);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if conn.is_closed() {
                    break;
                }
                let record = {
                    let mut state = state.lock().expect("aircraft state poisoned");
                    state.advance(STREAM_PERIOD.as_secs_f64());
                    wire::encode_telemetry(&*state)
                };
                conn.send(record);
            }
        }));
    }

    /// Next command payload forwarded by the coordinator, verbatim.
    /// `None` once the connection is gone.
    pub async fn next_command(&mut self) -> Option<String> {
        self.commands.recv().await
    }

    /// Stop streaming and tear the connection down.
    pub async fn land(mut self) {
        if let Some(task) = self.stream_task.take() {
            task.abort();
            let _ = task.await;
        }
        self.conn.close();
        self.conn.join().await;
        let _ = self.relay_task.await;
        tracing::debug!("pilot landed");
    }
}

fn random_id() -> String {
    let mut rng = rand::rng();
    format!("AP-{}{}", rng.random_range(0..10), rng.random_range(0..10))
}
