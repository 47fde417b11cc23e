//! State machine tests against a scripted in-memory transport
//!
//! The worker thread runs for real; the transport is a pair of queues the
//! test fills and inspects, so no broker or network is needed.

use msb_client::{
    binding, ClientStatus, ConfigValue, MsbClient, MsbConfig, MsbError, Priority, PrimitiveFormat,
    PrimitiveType, ServiceClass, ServiceDescriptor, Transport,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

#[derive(Default)]
struct Script {
    reachable: bool,
    connected: bool,
    fail_initialise: bool,
    fail_sends: bool,
    connects: usize,
    inbound: VecDeque<String>,
    sent: Vec<String>,
    pollers: HashSet<ThreadId>,
}

#[derive(Clone)]
struct ScriptedTransport(Arc<Mutex<Script>>);

impl ScriptedTransport {
    fn new() -> Self {
        Self(Arc::new(Mutex::new(Script {
            reachable: true,
            ..Default::default()
        })))
    }

    fn push(&self, frame: &str) {
        self.0.lock().inbound.push_back(frame.to_string());
    }

    fn sent(&self) -> Vec<String> {
        self.0.lock().sent.clone()
    }

    fn sent_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.sent().into_iter().filter(|s| s.starts_with(prefix)).collect()
    }

    fn drop_link(&self) {
        let mut script = self.0.lock();
        script.reachable = false;
        script.connected = false;
    }

    fn restore_link(&self) {
        self.0.lock().reachable = true;
    }

    fn connects(&self) -> usize {
        self.0.lock().connects
    }
}

impl Transport for ScriptedTransport {
    fn initialise(&mut self) -> msb_client::Result<()> {
        if self.0.lock().fail_initialise {
            return Err(MsbError::Tls("no trust anchors".into()));
        }
        Ok(())
    }

    fn connect(&mut self) -> msb_client::Result<()> {
        let mut script = self.0.lock();
        script.connects += 1;
        if !script.reachable {
            return Err(MsbError::Transport("unreachable".into()));
        }
        script.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.0.lock().connected = false;
    }

    fn deinitialise(&mut self) {}

    fn is_ready(&mut self, _timeout: Duration) -> bool {
        let script = self.0.lock();
        script.connected && script.reachable
    }

    fn send_text(&mut self, text: &str) -> msb_client::Result<()> {
        let mut script = self.0.lock();
        if script.fail_sends {
            return Err(MsbError::Transport("send failed".into()));
        }
        script.sent.push(text.to_string());
        Ok(())
    }

    fn receive_text(&mut self) -> Option<String> {
        let mut script = self.0.lock();
        script.pollers.insert(thread::current().id());
        script.inbound.pop_front()
    }
}

fn test_config() -> MsbConfig {
    MsbConfig::new("ws://localhost:8085")
        .unwrap()
        .cycle_pause(Duration::from_millis(1))
        .settle_delays(Duration::ZERO, Duration::from_millis(1))
        .reconnect_interval(Duration::from_millis(50))
}

fn service() -> ServiceDescriptor {
    ServiceDescriptor::new(
        "2b7d4d7a-47a4-4d7e-8b6a-33c0f3a2b1c9",
        "token-1",
        ServiceClass::SmartObject,
        "Thermometer",
        "Room temperature",
    )
}

fn client_with(config: MsbConfig) -> (MsbClient, ScriptedTransport) {
    let transport = ScriptedTransport::new();
    let client = MsbClient::with_transport(config, service(), transport.clone()).unwrap();
    client
        .add_event("temp", "Temperature", "", PrimitiveType::Number, PrimitiveFormat::Double, false)
        .unwrap();
    client.add_empty_event("alarm", "Alarm", "").unwrap();
    (client, transport)
}

fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        thread::sleep(Duration::from_millis(2));
    }
}

fn wait_for_status(client: &MsbClient, status: ClientStatus) {
    wait_until(&format!("status {}", status), || client.status() == status);
}

/// Run until the broker has acknowledged the registration
fn registered(client: &MsbClient, transport: &ScriptedTransport) {
    client.run().unwrap();
    wait_for_status(client, ClientStatus::Connected);
    transport.push("IO_CONNECTED");
    wait_until("registration", || !transport.sent_with_prefix("R ").is_empty());
    transport.push("IO_REGISTERED");
    wait_for_status(client, ClientStatus::Registered);
}

fn body(frame: &str) -> Value {
    serde_json::from_str(&frame[2..]).unwrap()
}

#[test]
fn test_registration_handshake() {
    let (client, transport) = client_with(test_config());

    registered(&client, &transport);

    let registration = body(&transport.sent_with_prefix("R ")[0]);
    assert_eq!(registration["uuid"], "2b7d4d7a-47a4-4d7e-8b6a-33c0f3a2b1c9");
    assert_eq!(registration["@class"], "SMART_OBJECT");
    assert_eq!(registration["events"][0]["eventId"], "temp");
    assert_eq!(registration["events"][0]["@id"], 0);
    assert_eq!(registration["events"][1]["eventId"], "alarm");
    assert_eq!(registration["events"][1]["@id"], 1);
    assert_eq!(client.previous_status(), ClientStatus::Connected);

    client.halt().unwrap();
}

#[test]
fn test_publish_reaches_transport() {
    let (client, transport) = client_with(test_config());
    registered(&client, &transport);

    assert!(client.publish("temp", Priority::High, 21.5, None));
    assert!(client.publish_empty("alarm", Priority::Low, Some("abc-123")));
    wait_until("two events", || transport.sent_with_prefix("E ").len() == 2);

    let events = transport.sent_with_prefix("E ");
    let temp = body(&events[0]);
    assert_eq!(temp["eventId"], "temp");
    assert_eq!(temp["priority"], 2);
    assert_eq!(temp["dataObject"], 21.5);
    assert!(uuid::Uuid::parse_str(temp["correlationId"].as_str().unwrap()).is_ok());

    let alarm = body(&events[1]);
    assert_eq!(alarm["correlationId"], "abc-123");
    assert!(alarm.get("dataObject").is_none());

    client.halt().unwrap();
}

#[test]
fn test_admission_control_bounds_outgoing_queue() {
    let (client, transport) = client_with(test_config().queue_depths(100, 2));
    registered(&client, &transport);
    transport.0.lock().fail_sends = true;

    let accepted: Vec<bool> = (0..3)
        .map(|i| client.publish("temp", Priority::Low, i as f64, None))
        .collect();

    assert_eq!(accepted, vec![true, true, false]);
    assert_eq!(client.pending_events(), 2);

    // the head is retried once sending works again
    transport.0.lock().fail_sends = false;
    wait_until("queue drained", || client.pending_events() == 0);
    assert_eq!(transport.sent_with_prefix("E ").len(), 2);

    client.halt().unwrap();
}

#[test]
fn test_events_dropped_before_registration() {
    let (client, _transport) = client_with(test_config());
    client.run().unwrap();
    wait_for_status(&client, ClientStatus::Connected);

    assert!(!client.publish("temp", Priority::Low, 1.0, None));
    assert!(!client.publish("unknown", Priority::Low, 1.0, None));

    client.set_event_cache(true);
    assert!(client.publish("temp", Priority::Low, 1.0, None));

    client.halt().unwrap();
}

#[test]
fn test_sockjs_framed_handshake() {
    let (client, transport) = client_with(test_config().sockjs_framing());
    client.run().unwrap();
    wait_for_status(&client, ClientStatus::Connected);

    transport.push("o");
    transport.push("h");
    transport.push("a[\"IO_CONNECTED\"]");
    wait_until("framed registration", || !transport.sent_with_prefix("[\"R {").is_empty());
    assert_eq!(client.status(), ClientStatus::Connected);

    transport.push("a[\"IO_REGISTERED\"]");
    wait_for_status(&client, ClientStatus::Registered);

    client.halt().unwrap();
}

#[test]
fn test_function_call_publishes_response() {
    let (client, transport) = client_with(test_config());
    client
        .add_event("echoed", "Echoed", "", PrimitiveType::String, PrimitiveFormat::None, false)
        .unwrap();
    client
        .add_function(
            "echo",
            "Echo",
            "",
            PrimitiveType::String,
            PrimitiveFormat::None,
            false,
            |client, call, _| {
                let text = call["functionParameters"]["dataObject"].as_str().unwrap_or_default();
                let correlation_id = call["correlationId"].as_str();
                client.publish("echoed", Priority::Medium, text, correlation_id);
            },
            None,
        )
        .unwrap();
    client.add_response_event("echo", "echoed").unwrap();
    client.forward_complete_call();
    registered(&client, &transport);

    transport.push(r#"C {"functionId":"echo","functionParameters":{"dataObject":"hello"},"correlationId":"c-7"}"#);
    wait_until("echo response", || !transport.sent_with_prefix("E ").is_empty());

    let response = body(&transport.sent_with_prefix("E ")[0]);
    assert_eq!(response["eventId"], "echoed");
    assert_eq!(response["dataObject"], "hello");
    assert_eq!(response["correlationId"], "c-7");

    client.halt().unwrap();
}

#[test]
fn test_config_change_through_the_loop() {
    let (client, transport) = client_with(test_config());
    let threshold = binding(0i32);
    client
        .add_config_param("threshold", ConfigValue::Int32(threshold.clone()))
        .unwrap();
    client.add_config_param("label", ConfigValue::String("old".into())).unwrap();
    registered(&client, &transport);

    transport.push(r#"K {"parameters":{"threshold":{"type":"INTEGER","format":"INT32","value":42}}}"#);
    wait_until("threshold applied", || *threshold.read() == 42);

    transport.push(r#"K {"parameters":{"label":{"type":"STRING","value":"new"}}}"#);
    wait_until("label applied", || {
        matches!(client.config_param_value("label"), Some(ConfigValue::String(s)) if s == "new")
    });

    client.halt().unwrap();
}

#[test]
fn test_ping_answered() {
    let (client, transport) = client_with(test_config());
    client.run().unwrap();
    wait_for_status(&client, ClientStatus::Connected);

    transport.push("ping");
    wait_until("pong", || transport.sent().contains(&"pong".to_string()));

    client.halt().unwrap();
}

#[test]
fn test_lost_link_reconnects() {
    let (client, transport) = client_with(test_config());
    registered(&client, &transport);

    transport.drop_link();
    wait_for_status(&client, ClientStatus::Connecting);
    assert_eq!(client.previous_status(), ClientStatus::Registered);

    transport.restore_link();
    wait_for_status(&client, ClientStatus::Connected);

    client.halt().unwrap();
}

#[test]
fn test_reconnect_attempts_are_spaced() {
    let (client, transport) = client_with(test_config().reconnect_interval(Duration::from_secs(10)));
    registered(&client, &transport);
    let before = transport.connects();

    transport.drop_link();
    wait_for_status(&client, ClientStatus::Connecting);
    thread::sleep(Duration::from_millis(200));

    assert_eq!(transport.connects(), before + 1);

    client.halt().unwrap();
}

#[test]
fn test_lost_link_without_reconnect() {
    let (client, transport) = client_with(test_config().no_reconnect());
    registered(&client, &transport);

    transport.drop_link();
    wait_for_status(&client, ClientStatus::Unconnected);

    transport.restore_link();
    thread::sleep(Duration::from_millis(50));
    assert_eq!(client.status(), ClientStatus::Unconnected);

    client.halt().unwrap();
}

#[test]
fn test_initialise_failure_is_error_state() {
    let (client, transport) = client_with(test_config());
    transport.0.lock().fail_initialise = true;

    client.run().unwrap();
    wait_for_status(&client, ClientStatus::Error);
    assert_eq!(transport.connects(), 0);

    client.halt().unwrap();
}

#[test]
fn test_halt_closes_from_any_state() {
    let (client, transport) = client_with(test_config());
    transport.drop_link();

    client.run().unwrap();
    wait_for_status(&client, ClientStatus::Connecting);
    assert!(client.queues_allocated());

    client.halt().unwrap();

    assert_eq!(client.status(), ClientStatus::Closed);
    assert!(!client.queues_allocated());
    assert!(!client.is_running());
}

#[test]
fn test_run_twice_and_restart() {
    let (client, transport) = client_with(test_config());

    client.run().unwrap();
    assert!(matches!(client.run(), Err(MsbError::AlreadyRunning)));
    client.halt().unwrap();
    assert!(matches!(client.halt(), Err(MsbError::NotRunning)));

    registered(&client, &transport);
    client.halt().unwrap();
    assert_eq!(client.status(), ClientStatus::Closed);
}

#[test]
fn test_halt_from_callback() {
    let (client, transport) = client_with(test_config());
    client
        .add_empty_function("stop", "Stop", "", |client, _, _| client.halt().unwrap(), None)
        .unwrap();
    registered(&client, &transport);

    transport.push(r#"C {"functionId":"stop","functionParameters":{}}"#);

    wait_for_status(&client, ClientStatus::Closed);
    wait_until("queues released", || !client.queues_allocated());
}

#[test]
fn test_run_refused_until_halted_worker_exits() {
    let (client, transport) = client_with(test_config());
    let restart = Arc::new(Mutex::new(None));
    let outcome = restart.clone();
    client
        .add_empty_function(
            "restart",
            "Restart",
            "",
            move |client, _, _| {
                client.halt().unwrap();
                *outcome.lock() = Some(client.run());
            },
            None,
        )
        .unwrap();
    registered(&client, &transport);

    transport.push(r#"C {"functionId":"restart","functionParameters":{}}"#);
    wait_for_status(&client, ClientStatus::Closed);
    wait_until("worker exit", || !client.is_running());
    assert!(matches!(*restart.lock(), Some(Err(MsbError::AlreadyRunning))));

    transport.0.lock().pollers.clear();
    client.run().unwrap();
    wait_for_status(&client, ClientStatus::Connected);
    thread::sleep(Duration::from_millis(50));
    assert_eq!(transport.0.lock().pollers.len(), 1);

    client.halt().unwrap();
    assert_eq!(client.status(), ClientStatus::Closed);
}

#[tokio::test]
async fn test_state_receiver_sees_registration() {
    let (client, transport) = client_with(test_config());
    let mut rx = client.state_receiver();

    client.run().unwrap();
    let script = transport.clone();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            rx.changed().await.unwrap();
            let status = *rx.borrow();
            match status {
                ClientStatus::Connected => {
                    script.push("IO_CONNECTED");
                    script.push("IO_REGISTERED");
                }
                ClientStatus::Registered => break,
                _ => {}
            }
        }
    })
    .await
    .unwrap();

    client.halt().unwrap();
}
