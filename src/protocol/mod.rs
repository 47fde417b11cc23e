//! MSB wire protocol
//!
//! Every message is `<tag> <json>` text, except the broker's bare control
//! tokens and `ping`/`pong`. SockJS framing may be layered underneath.

pub mod envelope;
pub mod messages;
pub mod sockjs;

pub use envelope::{EventEnvelope, Priority};
pub use messages::{classify, ControlMessage, InboundMessage};
pub use sockjs::SockJsFrame;
