//! The coordinator: a single-writer actor over all shared state.
//!
//! One task owns the aircraft registry, the lock table and the monitor
//! set. Transport events and the broadcast tick are multiplexed through
//! one `select!` loop, so every broadcast and collision sweep derives
//! from the same registry snapshot and no handler ever races another.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio::time::{self, MissedTickBehavior};

use airsep_core::wire::{self, hint, Message};
use airsep_core::{Aircraft, AircraftState, CollisionEngine};
use airsep_net::{ConnId, Connection, NetEvent, Role};

const DENIED: &str = "Action denied";

struct AircraftEntry {
    conn: Arc<Connection>,
    state: AircraftState,
    last_update: DateTime<Utc>,
}

pub struct Coordinator {
    engine: CollisionEngine,
    /// Registered aircraft, keyed by id. An entry exists from the first
    /// valid telemetry record until its connection closes.
    registry: HashMap<String, AircraftEntry>,
    /// Command locks: aircraft id to the console connection holding it.
    locks: HashMap<String, ConnId>,
    /// Connected consoles, all of which receive every broadcast.
    monitors: HashMap<ConnId, Arc<Connection>>,
}

impl Coordinator {
    pub fn new(engine: CollisionEngine) -> Self {
        Self {
            engine,
            registry: HashMap::new(),
            locks: HashMap::new(),
            monitors: HashMap::new(),
        }
    }

    /// Run until shutdown is signalled or the event channel closes.
    pub async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<NetEvent>,
        tick: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = time::interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },
                _ = ticker.tick() => self.tick(),
                _ = shutdown.changed() => break,
            }
        }

        for entry in self.registry.values() {
            entry.conn.close();
        }
        for monitor in self.monitors.values() {
            monitor.close();
        }
    }

    fn handle_event(&mut self, event: NetEvent) {
        match event {
            NetEvent::Accepted(conn) => {
                if conn.role() == Role::Console {
                    self.monitors.insert(conn.id(), conn);
                }
                // Telemetry clients register on their first valid record.
            }
            NetEvent::Line { conn, line } => match conn.role() {
                Role::Telemetry => self.handle_telemetry(conn, &line),
                Role::Console => self.handle_console(&conn, &line),
            },
            NetEvent::Closed { conn } => match conn.role() {
                Role::Telemetry => self.handle_pilot_closed(conn.id()),
                Role::Console => self.handle_console_closed(conn.id()),
            },
        }
    }

    fn handle_telemetry(&mut self, conn: Arc<Connection>, line: &str) {
        let update = match wire::decode_telemetry(line) {
            Ok(update) => update,
            Err(err) => {
                tracing::warn!(conn = conn.id(), %err, "dropping malformed telemetry line");
                return;
            }
        };

        match self.registry.entry(update.id().to_string()) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                entry.state.apply_telemetry(&update);
                entry.last_update = Utc::now();
            }
            Entry::Vacant(slot) => {
                tracing::info!(id = update.id(), conn = conn.id(), "aircraft joined");
                slot.insert(AircraftEntry { conn, state: update, last_update: Utc::now() });
            }
        }
    }

    fn handle_console(&mut self, conn: &Arc<Connection>, line: &str) {
        let msg = match Message::decode(line) {
            Ok(msg) => msg,
            Err(err) => {
                tracing::warn!(conn = conn.id(), %err, "dropping malformed console line");
                return;
            }
        };

        // Hints are independent bits; honor each one present.
        if msg.has(hint::LOCK) {
            self.handle_lock(conn, &msg);
        }
        if msg.has(hint::COMMAND) {
            self.handle_command(conn, &msg);
        }
        if msg.has(hint::RELEASE) {
            self.handle_release(conn, &msg);
        }
    }

    fn target_id(msg: &Message) -> Option<&str> {
        msg.to.as_deref().map(str::trim).filter(|id| !id.is_empty())
    }

    /// Grant the lock only for a known aircraft that nobody holds,
    /// including the requester. Everything else is denied.
    fn handle_lock(&mut self, conn: &Arc<Connection>, msg: &Message) {
        let Some(id) = Self::target_id(msg) else {
            conn.send(Message::alert(DENIED).encode());
            return;
        };

        if self.registry.contains_key(id) && !self.locks.contains_key(id) {
            self.locks.insert(id.to_string(), conn.id());
            conn.send(Message::lock_ack(msg.from.as_deref(), id).encode());
            tracing::debug!(id, console = conn.id(), "lock granted");
        } else {
            conn.send(Message::alert(DENIED).encode());
            tracing::debug!(id, console = conn.id(), "lock denied");
        }
    }

    /// Forward the command payload to the aircraft, verbatim, if and only
    /// if this console holds the lock. A command with no payload forwards
    /// nothing but is still an authorized no-op.
    fn handle_command(&mut self, conn: &Arc<Connection>, msg: &Message) {
        let Some(id) = Self::target_id(msg) else {
            conn.send(Message::alert(DENIED).encode());
            return;
        };

        if self.locks.get(id).copied() != Some(conn.id()) {
            conn.send(Message::alert(DENIED).encode());
            return;
        }
        if let (Some(entry), Some(payload)) = (self.registry.get(id), msg.data.as_deref()) {
            entry.conn.send(payload);
            tracing::debug!(id, console = conn.id(), payload, "command forwarded");
        }
    }

    fn handle_release(&mut self, conn: &Arc<Connection>, msg: &Message) {
        let Some(id) = Self::target_id(msg) else {
            conn.send(Message::alert(DENIED).encode());
            return;
        };

        if self.locks.get(id).copied() == Some(conn.id()) {
            self.locks.remove(id);
            conn.send(Message::release_ack(msg.from.as_deref(), id).encode());
            tracing::debug!(id, console = conn.id(), "lock released");
        } else {
            conn.send(Message::alert(DENIED).encode());
        }
    }

    /// A telemetry connection died: drop its aircraft and free any lock
    /// held on them, telling the holder the lock is gone.
    fn handle_pilot_closed(&mut self, conn_id: ConnId) {
        let departed: Vec<String> = self
            .registry
            .iter()
            .filter(|(_, entry)| entry.conn.id() == conn_id)
            .map(|(id, _)| id.clone())
            .collect();

        for id in departed {
            if let Some(entry) = self.registry.remove(&id) {
                tracing::info!(%id, last_update = %entry.last_update, "aircraft departed");
            }
            if let Some(holder) = self.locks.remove(&id) {
                tracing::info!(%id, console = holder, "releasing lock on departed aircraft");
                if let Some(console) = self.monitors.get(&holder) {
                    console.send(Message::release_ack(None, &id).encode());
                }
            }
        }
    }

    /// A console died: forget it and free every lock it held.
    fn handle_console_closed(&mut self, conn_id: ConnId) {
        self.monitors.remove(&conn_id);
        let before = self.locks.len();
        self.locks.retain(|_, holder| *holder != conn_id);
        let released = before - self.locks.len();
        if released > 0 {
            tracing::info!(console = conn_id, released, "released locks of departed console");
        }
    }

    /// One broadcast cycle: sweep the registry, stamp threat flags, then
    /// send the fleet list and collision list to every monitor.
    fn tick(&mut self) {
        let report = {
            let snapshot: Vec<&AircraftState> =
                self.registry.values().map(|entry| &entry.state).collect();
            self.engine.assess(&snapshot)
        };

        for entry in self.registry.values_mut() {
            entry.state.set_threat(report.level_for(entry.state.id()));
        }
        for violation in &report.violations {
            tracing::error!(
                a = %violation.a,
                b = %violation.b,
                distance_km = violation.distance_km,
                "fatal separation violation",
            );
        }

        if self.monitors.is_empty() {
            return;
        }

        let fleet: String = self
            .registry
            .values()
            .map(|entry| wire::encode_telemetry(&entry.state))
            .collect();
        let fleet_line = Message::airplane_list(fleet).encode();
        let collision_line =
            Message::collision_list(wire::encode_collision_list(&report.flagged)).encode();
        let alerts: Vec<String> = report
            .violations
            .iter()
            .map(|v| {
                Message::alert(&format!(
                    "Separation violation: {} and {} at {:.3} km",
                    v.a, v.b, v.distance_km
                ))
                .encode()
            })
            .collect();

        for monitor in self.monitors.values() {
            monitor.send(fleet_line.clone());
            monitor.send(collision_line.clone());
            for alert in &alerts {
                monitor.send(alert.clone());
            }
        }
    }
}
