//! End-to-end coordinator tests over real sockets: pilots stream raw
//! telemetry lines, consoles go through the client library.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

use airsep_core::wire::{encode_telemetry, hint, is_heartbeat, Message};
use airsep_core::{Aircraft, AircraftState, SeparationRules, ThreatLevel, Vector3};
use airsep_sdk::{ConsoleClient, ConsoleEvent, PilotClient};
use airsep_server::{Config, Server};

const WAIT: Duration = Duration::from_secs(5);

async fn start_server() -> Server {
    let config = Config {
        telemetry_port: 0,
        console_port: 0,
        tick: Duration::from_millis(100),
        ..Config::default()
    };
    Server::start(&config, SeparationRules::default())
        .await
        .expect("server start")
}

/// Raw pilot socket that registers one aircraft at the given spot.
async fn raw_pilot(server: &Server, state: &AircraftState) -> TcpStream {
    let mut stream = TcpStream::connect(("127.0.0.1", server.telemetry_port()))
        .await
        .expect("pilot connect");
    send_telemetry(&mut stream, state).await;
    stream
}

async fn send_telemetry(stream: &mut TcpStream, state: &AircraftState) {
    let line = format!("{}\n", encode_telemetry(state));
    stream.write_all(line.as_bytes()).await.expect("pilot write");
    stream.flush().await.expect("pilot flush");
}

fn parked_at(id: &str, x: f64, y: f64, alt: f64) -> AircraftState {
    let mut ap = AircraftState::new(id);
    ap.set_position(Vector3::new(x, y, alt));
    ap
}

/// Next event that is not part of the periodic broadcast.
async fn next_reply(console: &mut ConsoleClient) -> ConsoleEvent {
    timeout(WAIT, async {
        loop {
            match console.next_event().await.expect("feed closed") {
                ConsoleEvent::AirplaneList(_) | ConsoleEvent::CollisionList(_) => continue,
                event => return event,
            }
        }
    })
    .await
    .expect("timed out waiting for a reply")
}

/// Block until a broadcast mentions the aircraft, returning its snapshot.
async fn wait_for_aircraft(console: &mut ConsoleClient, id: &str) -> AircraftState {
    timeout(WAIT, async {
        loop {
            if let ConsoleEvent::AirplaneList(fleet) =
                console.next_event().await.expect("feed closed")
            {
                if let Some(ap) = fleet.iter().find(|ap| ap.id() == id) {
                    return ap.clone();
                }
            }
        }
    })
    .await
    .expect("aircraft never appeared in a broadcast")
}

#[tokio::test]
async fn lock_is_exclusive_until_released() {
    let server = start_server().await;
    let _pilot = raw_pilot(&server, &parked_at("AP-77", 0.0, 0.0, 5.0)).await;

    let mut first = ConsoleClient::connect("127.0.0.1", server.console_port())
        .await
        .unwrap();
    let mut second = ConsoleClient::connect("127.0.0.1", server.console_port())
        .await
        .unwrap();
    wait_for_aircraft(&mut first, "AP-77").await;

    first.lock("AP-77");
    assert!(matches!(next_reply(&mut first).await, ConsoleEvent::LockAck(id) if id == "AP-77"));
    assert_eq!(first.locked(), ["AP-77"]);

    // Held locks deny everyone, the holder's re-request included.
    second.lock("AP-77");
    assert!(matches!(next_reply(&mut second).await, ConsoleEvent::Alert(_)));
    first.lock("AP-77");
    assert!(matches!(next_reply(&mut first).await, ConsoleEvent::Alert(_)));

    // Only the holder may release.
    second.release("AP-77");
    assert!(matches!(next_reply(&mut second).await, ConsoleEvent::Alert(_)));
    first.release("AP-77");
    assert!(
        matches!(next_reply(&mut first).await, ConsoleEvent::ReleaseAck(id) if id == "AP-77")
    );
    assert!(first.locked().is_empty());

    // Released means available again.
    second.lock("AP-77");
    assert!(matches!(next_reply(&mut second).await, ConsoleEvent::LockAck(id) if id == "AP-77"));

    server.shutdown().await;
}

#[tokio::test]
async fn lock_on_unknown_aircraft_is_denied() {
    let server = start_server().await;
    let mut console = ConsoleClient::connect("127.0.0.1", server.console_port())
        .await
        .unwrap();

    console.lock("AP-99");
    assert!(matches!(next_reply(&mut console).await, ConsoleEvent::Alert(_)));
    assert!(console.locked().is_empty());

    server.shutdown().await;
}

#[tokio::test]
async fn commands_forward_verbatim_only_under_lock() {
    let server = start_server().await;
    let pilot = raw_pilot(&server, &parked_at("AP-10", 0.0, 0.0, 5.0)).await;

    let mut console = ConsoleClient::connect("127.0.0.1", server.console_port())
        .await
        .unwrap();
    wait_for_aircraft(&mut console, "AP-10").await;

    // Without the lock the command is refused and nothing reaches the
    // pilot.
    console.command("AP-10", "spd:500");
    assert!(matches!(next_reply(&mut console).await, ConsoleEvent::Alert(_)));

    console.lock("AP-10");
    assert!(matches!(next_reply(&mut console).await, ConsoleEvent::LockAck(_)));
    console.command("AP-10", "hdg:270");

    let mut lines = BufReader::new(pilot).lines();
    let payload = timeout(WAIT, async {
        loop {
            let line = lines.next_line().await.expect("pilot read").expect("pilot eof");
            if !is_heartbeat(&line) {
                return line;
            }
        }
    })
    .await
    .expect("command never reached the pilot");
    assert_eq!(payload, "hdg:270");

    server.shutdown().await;
}

#[tokio::test]
async fn pilot_disconnect_removes_aircraft_and_frees_its_lock() {
    let server = start_server().await;
    let pilot = raw_pilot(&server, &parked_at("AP-20", 0.0, 0.0, 5.0)).await;

    let mut console = ConsoleClient::connect("127.0.0.1", server.console_port())
        .await
        .unwrap();
    wait_for_aircraft(&mut console, "AP-20").await;
    console.lock("AP-20");
    assert!(matches!(next_reply(&mut console).await, ConsoleEvent::LockAck(_)));

    drop(pilot);

    // The holder is told its lock is gone.
    assert!(
        matches!(next_reply(&mut console).await, ConsoleEvent::ReleaseAck(id) if id == "AP-20")
    );
    assert!(console.locked().is_empty());

    // And subsequent snapshots no longer carry the aircraft.
    timeout(WAIT, async {
        loop {
            if let ConsoleEvent::AirplaneList(fleet) =
                console.next_event().await.expect("feed closed")
            {
                if !fleet.iter().any(|ap| ap.id() == "AP-20") {
                    return;
                }
            }
        }
    })
    .await
    .expect("departed aircraft kept appearing");

    server.shutdown().await;
}

#[tokio::test]
async fn console_disconnect_frees_its_locks() {
    let server = start_server().await;
    let _pilot = raw_pilot(&server, &parked_at("AP-30", 0.0, 0.0, 5.0)).await;

    let mut first = ConsoleClient::connect("127.0.0.1", server.console_port())
        .await
        .unwrap();
    wait_for_aircraft(&mut first, "AP-30").await;
    first.lock("AP-30");
    assert!(matches!(next_reply(&mut first).await, ConsoleEvent::LockAck(_)));
    first.close().await;

    // The release is processed asynchronously; retry until granted.
    let mut second = ConsoleClient::connect("127.0.0.1", server.console_port())
        .await
        .unwrap();
    timeout(WAIT, async {
        loop {
            second.lock("AP-30");
            match next_reply(&mut second).await {
                ConsoleEvent::LockAck(id) => {
                    assert_eq!(id, "AP-30");
                    return;
                }
                ConsoleEvent::Alert(_) => {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
    })
    .await
    .expect("lock never freed after console disconnect");

    server.shutdown().await;
}

#[tokio::test]
async fn converging_aircraft_are_flagged_in_the_broadcast() {
    let server = start_server().await;

    // Same flight level, 5 km apart, flying head-on along x.
    let a = parked_at("AP-40", 0.0, 0.0, 5.0);
    let mut b = parked_at("AP-41", 5.0, 0.0, 5.0);
    b.set_yaw(180.0);
    let _pa = raw_pilot(&server, &a).await;
    let _pb = raw_pilot(&server, &b).await;

    let mut console = ConsoleClient::connect("127.0.0.1", server.console_port())
        .await
        .unwrap();

    // Both flags land in the same sweep: the snapshot carries WARN bits
    // and the collision list names the pair.
    let flagged = timeout(WAIT, async {
        loop {
            if let ConsoleEvent::AirplaneList(fleet) =
                console.next_event().await.expect("feed closed")
            {
                if fleet.len() == 2 && fleet.iter().all(|ap| ap.threat() == ThreatLevel::Warn) {
                    return fleet;
                }
            }
        }
    })
    .await
    .expect("warn flags never appeared");
    assert!(flagged.iter().any(|ap| ap.id() == "AP-40"));

    let pairs = timeout(WAIT, async {
        loop {
            if let ConsoleEvent::CollisionList(pairs) =
                console.next_event().await.expect("feed closed")
            {
                if !pairs.is_empty() {
                    return pairs;
                }
            }
        }
    })
    .await
    .expect("collision list stayed empty");
    assert_eq!(pairs[0].a, "AP-40");
    assert_eq!(pairs[0].b, "AP-41");
    assert_eq!(pairs[0].level, ThreatLevel::Warn);

    server.shutdown().await;
}

#[tokio::test]
async fn fatal_separation_raises_an_alert() {
    let server = start_server().await;
    let _pa = raw_pilot(&server, &parked_at("AP-50", 0.0, 0.0, 5.0)).await;
    let _pb = raw_pilot(&server, &parked_at("AP-51", 0.03, 0.0, 5.0)).await;

    let mut console = ConsoleClient::connect("127.0.0.1", server.console_port())
        .await
        .unwrap();

    let text = timeout(WAIT, async {
        loop {
            if let ConsoleEvent::Alert(text) = console.next_event().await.expect("feed closed") {
                return text;
            }
        }
    })
    .await
    .expect("violation alert never arrived");
    assert!(text.contains("AP-50"), "unexpected alert {text:?}");
    assert!(text.contains("AP-51"), "unexpected alert {text:?}");

    server.shutdown().await;
}

#[tokio::test]
async fn malformed_lines_are_dropped_without_killing_the_connection() {
    let server = start_server().await;

    let mut pilot = TcpStream::connect(("127.0.0.1", server.telemetry_port()))
        .await
        .unwrap();
    pilot.write_all(b"pln::<garbage>\n").await.unwrap();
    send_telemetry(&mut pilot, &parked_at("AP-60", 1.0, 2.0, 5.0)).await;

    let mut console = ConsoleClient::connect("127.0.0.1", server.console_port())
        .await
        .unwrap();
    let snapshot = wait_for_aircraft(&mut console, "AP-60").await;
    assert_eq!(snapshot.position().x, 1.0);

    // Garbage on the console channel is dropped the same way: a raw
    // socket that leads with junk still gets its lock granted.
    let mut raw = TcpStream::connect(("127.0.0.1", server.console_port()))
        .await
        .unwrap();
    raw.write_all(b"not an envelope\n").await.unwrap();
    raw.write_all(format!("{}\n", Message::lock("AP-60").encode()).as_bytes())
        .await
        .unwrap();
    raw.flush().await.unwrap();

    let mut lines = BufReader::new(raw).lines();
    timeout(WAIT, async {
        loop {
            let line = lines.next_line().await.expect("console read").expect("console eof");
            if is_heartbeat(&line) {
                continue;
            }
            let msg = Message::decode(&line).expect("undecodable feed line");
            if msg.has(hint::LOCK_ACK) {
                assert_eq!(msg.to.as_deref(), Some("AP-60"));
                return;
            }
        }
    })
    .await
    .expect("lock ack never arrived after garbage line");

    server.shutdown().await;
}

#[tokio::test]
async fn pilot_client_streams_and_receives_commands() {
    let server = start_server().await;

    let mut pilot = PilotClient::connect_as("127.0.0.1", server.telemetry_port(), "AP-70")
        .await
        .unwrap();
    {
        let state = pilot.state();
        let mut state = state.lock().unwrap();
        state.set_position(Vector3::new(10.0, -10.0, 6.0));
        state.set_speed(720.0);
        state.set_yaw(90.0);
    }
    pilot.take_off();

    let mut console = ConsoleClient::connect("127.0.0.1", server.console_port())
        .await
        .unwrap();
    let seen = wait_for_aircraft(&mut console, "AP-70").await;
    assert_eq!(seen.speed(), 720.0);

    console.lock("AP-70");
    assert!(matches!(next_reply(&mut console).await, ConsoleEvent::LockAck(_)));
    console.command("AP-70", "alt:7.5");

    let command = timeout(WAIT, pilot.next_command())
        .await
        .expect("command never arrived")
        .expect("pilot feed closed");
    assert_eq!(command, "alt:7.5");

    pilot.land().await;
    server.shutdown().await;
}
