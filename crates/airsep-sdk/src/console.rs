//! Console-side client: lock arbitration, commands, and the broadcast
//! feed, decoded into typed events.

use std::sync::Arc;

use tokio::sync::mpsc;

use airsep_core::conflict::PairFlag;
use airsep_core::wire::{self, hint, Message};
use airsep_core::{Aircraft, AircraftState};
use airsep_net::{Connection, NetError, NetEvent, Role};

/// One decoded line from the coordinator's console channel.
#[derive(Debug, Clone)]
pub enum ConsoleEvent {
    /// Full fleet snapshot from the broadcast tick.
    AirplaneList(Vec<AircraftState>),
    /// Flagged pairs from the same sweep as the fleet snapshot.
    CollisionList(Vec<PairFlag>),
    /// Operator-facing alert text, denials included.
    Alert(String),
    /// The lock on this aircraft id was granted to us.
    LockAck(String),
    /// Our lock on this aircraft id is gone, whether we released it or
    /// the aircraft departed.
    ReleaseAck(String),
}

pub struct ConsoleClient {
    conn: Arc<Connection>,
    events: mpsc::UnboundedReceiver<NetEvent>,
    locked: Vec<String>,
}

impl ConsoleClient {
    pub async fn connect(host: &str, port: u16) -> Result<ConsoleClient, NetError> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let conn = Connection::connect(host, port, Role::Console, events_tx).await?;
        Ok(ConsoleClient { conn, events: events_rx, locked: Vec::new() })
    }

    /// Request the command lock for an aircraft. The answer arrives as a
    /// [`ConsoleEvent::LockAck`] or an [`ConsoleEvent::Alert`] denial.
    pub fn lock(&self, id: &str) {
        self.conn.send(Message::lock(id).encode());
    }

    pub fn release(&self, id: &str) {
        self.conn.send(Message::release(id).encode());
    }

    pub fn command(&self, id: &str, payload: &str) {
        self.conn.send(Message::command(id, payload).encode());
    }

    /// Aircraft ids this console currently believes it holds locks for.
    pub fn locked(&self) -> &[String] {
        &self.locked
    }

    /// Next decoded feed event; `None` once the connection is gone.
    pub async fn next_event(&mut self) -> Option<ConsoleEvent> {
        loop {
            match self.events.recv().await? {
                NetEvent::Line { line, .. } => {
                    let msg = match Message::decode(&line) {
                        Ok(msg) => msg,
                        Err(err) => {
                            tracing::warn!(%err, "dropping malformed feed line");
                            continue;
                        }
                    };
                    if let Some(event) = translate(&mut self.locked, msg) {
                        return Some(event);
                    }
                }
                NetEvent::Closed { .. } => return None,
                NetEvent::Accepted(_) => {}
            }
        }
    }

    pub async fn close(self) {
        self.conn.close();
        self.conn.join().await;
    }
}

/// Turn one envelope into a feed event, maintaining the held-lock set as
/// acks and fleet snapshots go by.
fn translate(locked: &mut Vec<String>, msg: Message) -> Option<ConsoleEvent> {
    if msg.has(hint::ALERT) {
        return Some(ConsoleEvent::Alert(msg.data?));
    }
    if msg.has(hint::LOCK_ACK) {
        let id = msg.to?;
        if !locked.contains(&id) {
            locked.push(id.clone());
        }
        return Some(ConsoleEvent::LockAck(id));
    }
    if msg.has(hint::RELEASE_ACK) {
        let id = msg.to?;
        locked.retain(|held| held != &id);
        return Some(ConsoleEvent::ReleaseAck(id));
    }
    if msg.has(hint::AIRPLANE_LIST) {
        let fleet = wire::decode_telemetry_stream(msg.data.as_deref().unwrap_or(""));
        // A lock never outlives its aircraft; drop ids missing from the
        // snapshot.
        locked.retain(|id| fleet.iter().any(|ap| ap.id() == id));
        return Some(ConsoleEvent::AirplaneList(fleet));
    }
    if msg.has(hint::COLLISION_LIST) {
        let pairs = wire::decode_collision_list(msg.data.as_deref().unwrap_or(""));
        return Some(ConsoleEvent::CollisionList(pairs));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_set_follows_acks() {
        let mut locked = Vec::new();

        let granted = translate(&mut locked, Message::lock_ack(None, "AP-01"));
        assert!(matches!(granted, Some(ConsoleEvent::LockAck(id)) if id == "AP-01"));
        // A duplicate ack does not double-track.
        translate(&mut locked, Message::lock_ack(None, "AP-01"));
        assert_eq!(locked, ["AP-01"]);

        let released = translate(&mut locked, Message::release_ack(None, "AP-01"));
        assert!(matches!(released, Some(ConsoleEvent::ReleaseAck(id)) if id == "AP-01"));
        assert!(locked.is_empty());
    }

    #[test]
    fn fleet_snapshot_drops_locks_on_departed_aircraft() {
        let mut locked = vec!["AP-01".to_string(), "AP-02".to_string()];

        let only_one = wire::encode_telemetry(&AircraftState::new("AP-02"));
        let event = translate(&mut locked, Message::airplane_list(only_one));

        match event {
            Some(ConsoleEvent::AirplaneList(fleet)) => {
                assert_eq!(fleet.len(), 1);
                assert_eq!(fleet[0].id(), "AP-02");
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(locked, ["AP-02"]);
    }

    #[test]
    fn alert_and_collision_payloads_decode() {
        let mut locked = Vec::new();

        let alert = translate(&mut locked, Message::alert("Action denied"));
        assert!(matches!(alert, Some(ConsoleEvent::Alert(text)) if text == "Action denied"));

        let event = translate(
            &mut locked,
            Message::collision_list("AP-01;AP-02;1".to_string()),
        );
        match event {
            Some(ConsoleEvent::CollisionList(pairs)) => {
                assert_eq!(pairs.len(), 1);
                assert_eq!(pairs[0].a, "AP-01");
            }
            other => panic!("unexpected event {other:?}"),
        }

        // An unrelated hint translates to nothing.
        assert!(translate(&mut locked, Message::new(hint::LOCK)).is_none());
    }
}
