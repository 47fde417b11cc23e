//! Handling of one inbound frame

use super::state::ClientStatus;
use super::MsbClient;
use crate::protocol::messages::PONG;
use crate::protocol::sockjs::{self, SockJsFrame};
use crate::protocol::{classify, ControlMessage, InboundMessage};
use serde_json::Value;
use std::borrow::Cow;
use tracing::{debug, info, trace, warn};

impl MsbClient {
    /// Classify one raw frame and act on it.
    ///
    /// Nothing here fails: unknown or malformed frames are logged and dropped.
    pub(crate) fn dispatch(&self, frame: &str) {
        let text: Cow<'_, str> = if self.inner.settings.read().sockjs_framing {
            match sockjs::parse_frame(frame) {
                SockJsFrame::Open => {
                    debug!("SockJS session open");
                    return;
                }
                SockJsFrame::Heartbeat => {
                    trace!("SockJS heartbeat");
                    return;
                }
                SockJsFrame::Close => {
                    warn!("SockJS session closed by broker");
                    self.inner.set_status(ClientStatus::Connecting);
                    return;
                }
                SockJsFrame::Message(text) => Cow::Owned(text),
            }
        } else {
            Cow::Borrowed(frame)
        };

        self.inner.debug_line(format_args!("Received: {}", text));

        match classify(&text) {
            InboundMessage::Ping => {
                if let Err(e) = self.inner.send_text(PONG) {
                    warn!("Failed to answer ping: {}", e);
                }
            }
            InboundMessage::Control(ControlMessage::IoConnected) => {
                self.inner.set_status(ClientStatus::Connected);
                if let Err(e) = self.register() {
                    warn!("Registration failed: {}", e);
                }
            }
            InboundMessage::Control(ControlMessage::IoRegistered) => {
                info!("Service registered");
                self.inner.set_status(ClientStatus::Registered);
            }
            InboundMessage::Control(message) if message.as_str().starts_with("NIO") => {
                warn!(message = %message, "Broker reported an error");
            }
            InboundMessage::Control(message) => {
                debug!(message = %message, "Control message");
            }
            InboundMessage::FunctionCall(body) => self.handle_function_call(&body),
            InboundMessage::ConfigChange(body) => self.handle_config_change(&body),
            InboundMessage::UnknownTag(tag) => {
                debug!(tag = %tag, "Message with unknown tag ignored");
            }
            InboundMessage::Malformed(reason) => {
                debug!("Malformed message ignored: {}", reason);
            }
        }
    }

    fn handle_function_call(&self, body: &Value) {
        let common = self.inner.common_callback.read().clone();
        if let Some(callback) = common {
            callback(self, body);
        }

        let Some(function_id) = body.get("functionId").and_then(Value::as_str) else {
            debug!("Function call without functionId ignored");
            return;
        };

        // clone the handler out so callbacks may edit the registry
        let handler = self.inner.description.read().function_handler(function_id);
        let Some((callback, context)) = handler else {
            debug!(function = function_id, "Call for unknown function ignored");
            return;
        };

        debug!(function = function_id, "Function call");
        if self.inner.settings.read().forward_complete_call {
            callback(self, body, context.as_ref());
        } else {
            let parameters = body.get("functionParameters").unwrap_or(&Value::Null);
            callback(self, parameters, context.as_ref());
        }
    }

    fn handle_config_change(&self, body: &Value) {
        // the callback sees the values from before the change
        let callback = self.inner.config_callback.read().clone();
        if let Some(callback) = callback {
            callback(self, body);
        }

        let applied = match body.get("parameters") {
            Some(parameters) => self.inner.description.write().apply_config_change(parameters),
            None => None,
        };
        match &applied {
            Some(name) => info!(param = %name, "Configuration parameter changed"),
            None => debug!("Configuration change matched no parameter"),
        }
    }
}
