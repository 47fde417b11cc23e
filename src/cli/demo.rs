//! The demo service: a heartbeat counter and an echo function

use msb_client::{binding, Binding, ConfigValue, MsbClient, Priority, PrimitiveFormat, PrimitiveType};
use serde_json::Value;
use tracing::info;

pub const HEARTBEAT: &str = "heartbeat";
pub const ECHOED: &str = "echoed";
pub const ECHO: &str = "echo";
pub const INTERVAL_PARAM: &str = "heartbeatInterval";

/// Handles the demo keeps after registering its service
pub struct DemoService {
    /// Heartbeat interval in seconds, changed by the broker
    pub interval: Binding<i32>,
}

pub fn demo_service(client: &MsbClient, interval_secs: i32) -> msb_client::Result<DemoService> {
    client.add_event(
        HEARTBEAT,
        "Heartbeat",
        "Counter published every interval",
        PrimitiveType::Integer,
        PrimitiveFormat::Int64,
        false,
    )?;
    client.add_event(
        ECHOED,
        "Echoed",
        "Answer to an echo call",
        PrimitiveType::String,
        PrimitiveFormat::None,
        false,
    )?;
    client.add_function(
        ECHO,
        "Echo",
        "Publishes its parameter back as echoed",
        PrimitiveType::String,
        PrimitiveFormat::None,
        false,
        echo,
        None,
    )?;
    client.add_response_event(ECHO, ECHOED)?;

    let interval = binding(interval_secs);
    client.add_config_param(INTERVAL_PARAM, ConfigValue::Int32(interval.clone()))?;

    // echo answers with the caller's correlation id
    client.forward_complete_call();

    Ok(DemoService { interval })
}

fn echo(client: &MsbClient, call: &Value, _: Option<&msb_client::CallContext>) {
    let parameters = &call["functionParameters"];
    let text = match parameters.get("dataObject").and_then(Value::as_str) {
        Some(text) => text.to_string(),
        None => parameters.to_string(),
    };
    let correlation_id = call.get("correlationId").and_then(Value::as_str);

    info!(text = %text, correlation_id, "Echo");
    client.publish(ECHOED, Priority::Medium, text, correlation_id);
}
