//! Broker message vocabulary and inbound classification

use serde_json::Value;
use std::fmt;

/// Tag of the registration message carrying the self-description
pub const REGISTER_TAG: char = 'R';
/// Tag of an outbound event envelope
pub const EVENT_TAG: char = 'E';
/// Tag of an inbound function call
pub const FUNCTION_CALL_TAG: char = 'C';
/// Tag of an inbound configuration change
pub const CONFIG_CHANGE_TAG: char = 'K';

pub const PING: &str = "ping";
pub const PONG: &str = "pong";

/// Control tokens sent by the broker without a JSON body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    Io,
    Nio,
    IoConnected,
    IoRegistered,
    IoPublished,
    NioAlreadyConnected,
    NioRegistrationError,
    NioUnexpectedRegistrationError,
    NioUnauthorizedConnection,
    NioEventForwardingError,
    NioUnexpectedEventForwardingError,
}

impl ControlMessage {
    pub const ALL: [ControlMessage; 11] = [
        ControlMessage::Io,
        ControlMessage::Nio,
        ControlMessage::IoConnected,
        ControlMessage::IoRegistered,
        ControlMessage::IoPublished,
        ControlMessage::NioAlreadyConnected,
        ControlMessage::NioRegistrationError,
        ControlMessage::NioUnexpectedRegistrationError,
        ControlMessage::NioUnauthorizedConnection,
        ControlMessage::NioEventForwardingError,
        ControlMessage::NioUnexpectedEventForwardingError,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ControlMessage::Io => "IO",
            ControlMessage::Nio => "NIO",
            ControlMessage::IoConnected => "IO_CONNECTED",
            ControlMessage::IoRegistered => "IO_REGISTERED",
            ControlMessage::IoPublished => "IO_PUBLISHED",
            ControlMessage::NioAlreadyConnected => "NIO_ALREADY_CONNECTED",
            ControlMessage::NioRegistrationError => "NIO_REGISTRATION_ERROR",
            ControlMessage::NioUnexpectedRegistrationError => "NIO_UNEXPECTED_REGISTRATION_ERROR",
            ControlMessage::NioUnauthorizedConnection => "NIO_UNAUTHORIZED_CONNECTION",
            ControlMessage::NioEventForwardingError => "NIO_EVENT_FORWARDING_ERROR",
            ControlMessage::NioUnexpectedEventForwardingError => {
                "NIO_UNEXPECTED_EVENT_FORWARDING_ERROR"
            }
        }
    }

    /// Exact match against the vocabulary
    pub fn parse(text: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|m| m.as_str() == text)
    }
}

impl fmt::Display for ControlMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An inbound message after SockJS unwrapping
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    Ping,
    Control(ControlMessage),
    /// `C` body: `functionId`, `functionParameters`, `correlationId`
    FunctionCall(Value),
    /// `K` body: `parameters`
    ConfigChange(Value),
    /// Data message with a tag this client does not handle
    UnknownTag(char),
    /// Data message whose body is not JSON or that has no body at all
    Malformed(String),
}

/// Classify one unwrapped text frame
pub fn classify(text: &str) -> InboundMessage {
    if text.starts_with(PING) {
        return InboundMessage::Ping;
    }
    if let Some(control) = ControlMessage::parse(text) {
        return InboundMessage::Control(control);
    }

    let text = text.replace("\\/", "/");
    let mut chars = text.chars();
    let Some(tag) = chars.next() else {
        return InboundMessage::Malformed(text);
    };
    let body = match chars.next() {
        Some(' ') => chars.as_str(),
        _ => return InboundMessage::Malformed(text),
    };

    match tag {
        FUNCTION_CALL_TAG | CONFIG_CHANGE_TAG => match serde_json::from_str::<Value>(body) {
            Ok(value) if tag == FUNCTION_CALL_TAG => InboundMessage::FunctionCall(value),
            Ok(value) => InboundMessage::ConfigChange(value),
            Err(_) => InboundMessage::Malformed(text),
        },
        other => InboundMessage::UnknownTag(other),
    }
}

/// `<tag> <body>`
pub fn frame(tag: char, body: &str) -> String {
    let mut out = String::with_capacity(body.len() + 2);
    out.push(tag);
    out.push(' ');
    out.push_str(body);
    out
}
