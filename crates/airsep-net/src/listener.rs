//! Accepts clients and wraps each in a [`Connection`].

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::connection::{Connection, NetError, NetEvent, Role};

/// A bound acceptor. Owns every connection it spawns; `shutdown` closes
/// and joins them all before returning.
pub struct Listener {
    role: Role,
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    accept_task: Mutex<Option<JoinHandle<()>>>,
    connections: Arc<Mutex<Vec<Arc<Connection>>>>,
}

impl Listener {
    /// Bind on all interfaces. Port 0 picks an ephemeral port; read it
    /// back from [`local_addr`](Listener::local_addr).
    pub async fn bind(
        port: u16,
        role: Role,
        events: mpsc::UnboundedSender<NetEvent>,
        read_timeout: Duration,
    ) -> Result<Listener, NetError> {
        let socket = TcpListener::bind(("0.0.0.0", port))
            .await
            .map_err(|source| NetError::Bind { port, source })?;
        let local_addr = socket
            .local_addr()
            .map_err(|source| NetError::Bind { port, source })?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let connections = Arc::new(Mutex::new(Vec::new()));
        let accept_task = tokio::spawn(accept_loop(
            socket,
            role,
            events,
            read_timeout,
            connections.clone(),
            shutdown_rx,
        ));

        tracing::info!(?role, %local_addr, "listening");
        Ok(Listener {
            role,
            local_addr,
            shutdown: shutdown_tx,
            accept_task: Mutex::new(Some(accept_task)),
            connections,
        })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting, then close and join every connection this listener
    /// spawned.
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(true);
        let accept_task = self.accept_task.lock().expect("accept task poisoned").take();
        if let Some(task) = accept_task {
            let _ = task.await;
        }

        let connections: Vec<Arc<Connection>> = {
            let mut guard = self.connections.lock().expect("connection list poisoned");
            guard.drain(..).collect()
        };
        for conn in connections {
            conn.close();
            conn.join().await;
        }
        tracing::info!(role = ?self.role, "listener stopped");
    }
}

async fn accept_loop(
    socket: TcpListener,
    role: Role,
    events: mpsc::UnboundedSender<NetEvent>,
    read_timeout: Duration,
    connections: Arc<Mutex<Vec<Arc<Connection>>>>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let stream = tokio::select! {
            accepted = socket.accept() => match accepted {
                Ok((stream, _)) => stream,
                Err(err) => {
                    tracing::warn!(%err, "accept failed");
                    continue;
                }
            },
            _ = shutdown.changed() => break,
        };

        let conn = Connection::spawn(stream, role, events.clone(), read_timeout);
        tracing::debug!(conn = conn.id(), ?role, peer = ?conn.peer(), "accepted client");

        {
            let mut guard = connections.lock().expect("connection list poisoned");
            guard.retain(|existing: &Arc<Connection>| !existing.is_closed());
            guard.push(conn.clone());
        }

        if events.send(NetEvent::Accepted(conn)).is_err() {
            break;
        }
    }
}
