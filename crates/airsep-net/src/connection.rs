//! One socket, three tasks: reader, writer, heartbeat.
//!
//! Inbound lines are dispatched to the owner over a channel, never via
//! synchronous callbacks across tasks. Outbound lines go through an
//! unbounded FIFO queue drained whole by the writer before each flush.
//! Socket failures are folded into the close path; the only operation
//! that reports an error is the initial connect.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use airsep_core::wire::{is_heartbeat, HEARTBEAT_LINE};

/// Keepalive cadence; low enough to defeat idle-connection timeouts.
const HEARTBEAT_PERIOD: Duration = Duration::from_secs(5);

/// Default per-read deadline. Twice the heartbeat period, so a live peer
/// never trips it.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique connection identifier.
pub type ConnId = u64;

/// Which listener a connection belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Pilot-side: streams telemetry records.
    Telemetry,
    /// Operator-side: lock arbitration, commands, broadcast feed.
    Console,
}

/// Transport events delivered to the owning component.
#[derive(Debug, Clone)]
pub enum NetEvent {
    /// A listener accepted a new client.
    Accepted(Arc<Connection>),
    /// One complete non-heartbeat line arrived.
    Line { conn: Arc<Connection>, line: String },
    /// The connection tore down. Sent exactly once per connection.
    Closed { conn: Arc<Connection> },
}

#[derive(Debug, Error)]
pub enum NetError {
    #[error("failed to connect to {host}:{port}")]
    Connect {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },
    #[error("failed to bind listener on port {port}")]
    Bind {
        port: u16,
        #[source]
        source: io::Error,
    },
}

/// A live transport connection. Cheap to share; all methods take `&self`.
#[derive(Debug)]
pub struct Connection {
    id: ConnId,
    role: Role,
    peer: Option<SocketAddr>,
    outbound: mpsc::UnboundedSender<String>,
    shutdown: watch::Sender<bool>,
    closed: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Connection {
    /// Dial the coordinator. The one place a transport error surfaces.
    pub async fn connect(
        host: &str,
        port: u16,
        role: Role,
        events: mpsc::UnboundedSender<NetEvent>,
    ) -> Result<Arc<Connection>, NetError> {
        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|source| NetError::Connect { host: host.to_string(), port, source })?;
        Ok(Self::spawn(stream, role, events, DEFAULT_READ_TIMEOUT))
    }

    /// Wrap an established stream and start its reader, writer and
    /// heartbeat tasks.
    pub fn spawn(
        stream: TcpStream,
        role: Role,
        events: mpsc::UnboundedSender<NetEvent>,
        read_timeout: Duration,
    ) -> Arc<Connection> {
        let peer = stream.peer_addr().ok();
        let (read_half, write_half) = stream.into_split();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let conn = Arc::new(Connection {
            id: NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed),
            role,
            peer,
            outbound: out_tx.clone(),
            shutdown: shutdown_tx,
            closed: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
        });

        let reader = tokio::spawn(read_loop(
            conn.clone(),
            read_half,
            events,
            read_timeout,
            shutdown_rx.clone(),
        ));
        let writer = tokio::spawn(write_loop(write_half, out_rx, shutdown_rx.clone()));
        let heartbeat = tokio::spawn(heartbeat_loop(out_tx, shutdown_rx));

        conn.tasks
            .lock()
            .expect("connection task list poisoned")
            .extend([reader, writer, heartbeat]);
        conn
    }

    pub fn id(&self) -> ConnId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Enqueue one line for sending. Non-blocking, FIFO per connection,
    /// callable from any task. Silently dropped once the connection is
    /// closed.
    pub fn send(&self, line: impl Into<String>) {
        let _ = self.outbound.send(line.into());
    }

    /// Signal teardown. Idempotent and safe from any task, including this
    /// connection's own reader: it only flips the shutdown flag, the
    /// tasks unwind on their own.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::debug!(conn = self.id, peer = ?self.peer, "closing connection");
        let _ = self.shutdown.send(true);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Wait for the reader, writer and heartbeat tasks to finish. Must be
    /// called from outside those tasks; owners call it after [`close`].
    ///
    /// [`close`]: Connection::close
    pub async fn join(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut tasks = self.tasks.lock().expect("connection task list poisoned");
            tasks.drain(..).collect()
        };
        for handle in handles {
            let _ = handle.await;
        }
    }
}

async fn read_loop(
    conn: Arc<Connection>,
    read_half: OwnedReadHalf,
    events: mpsc::UnboundedSender<NetEvent>,
    read_timeout: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut lines = BufReader::new(read_half).lines();

    loop {
        let next = tokio::select! {
            next = time::timeout(read_timeout, lines.next_line()) => next,
            _ = shutdown.changed() => break,
        };

        match next {
            Ok(Ok(Some(line))) => {
                if is_heartbeat(&line) {
                    continue;
                }
                if events.send(NetEvent::Line { conn: conn.clone(), line }).is_err() {
                    break;
                }
            }
            Ok(Ok(None)) => {
                tracing::debug!(conn = conn.id, "peer closed the connection");
                break;
            }
            Ok(Err(err)) => {
                tracing::debug!(conn = conn.id, %err, "read failed");
                break;
            }
            Err(_) => {
                tracing::debug!(conn = conn.id, "read timed out");
                break;
            }
        }
    }

    conn.close();
    let _ = events.send(NetEvent::Closed { conn });
}

async fn write_loop(
    write_half: OwnedWriteHalf,
    mut queue: mpsc::UnboundedReceiver<String>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut writer = BufWriter::new(write_half);

    'outer: loop {
        let first = tokio::select! {
            line = queue.recv() => match line {
                Some(line) => line,
                None => break,
            },
            _ = shutdown.changed() => break,
        };

        // Drain everything queued so far, in arrival order, then flush once.
        let mut pending = vec![first];
        while let Ok(line) = queue.try_recv() {
            pending.push(line);
        }

        for line in &pending {
            if writer.write_all(line.as_bytes()).await.is_err()
                || writer.write_all(b"\n").await.is_err()
            {
                break 'outer;
            }
        }
        if writer.flush().await.is_err() {
            break;
        }
    }

    let _ = writer.shutdown().await;
}

async fn heartbeat_loop(
    outbound: mpsc::UnboundedSender<String>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = time::interval(HEARTBEAT_PERIOD);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if outbound.send(HEARTBEAT_LINE.to_string()).is_err() {
                    break;
                }
            }
            _ = shutdown.changed() => break,
        }
    }
}
