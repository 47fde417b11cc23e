//! Transport collaborator
//!
//! The state machine only needs a text pipe it can poll; [`Transport`] is that
//! seam. [`WebSocketTransport`] is the network implementation, tests plug in
//! scripted ones.

mod endpoint;
mod tls;
mod websocket;

pub use endpoint::{Endpoint, DEFAULT_PATH, DEFAULT_PORT, DEFAULT_TLS_PORT};
pub use tls::{client_config, TlsMaterial};
pub use websocket::WebSocketTransport;

use crate::error::Result;
use std::time::Duration;

/// Text transport driven by the client's state machine
///
/// All calls are made from the worker thread. None of them may block for
/// longer than the timeouts the transport was configured with.
pub trait Transport: Send {
    /// Prepare resources (TLS configuration) before the first connect
    fn initialise(&mut self) -> Result<()>;

    /// Start (or restart) a connection attempt
    fn connect(&mut self) -> Result<()>;

    fn disconnect(&mut self);

    /// Release what [`initialise`](Transport::initialise) acquired
    fn deinitialise(&mut self);

    /// Whether the link can carry messages, waiting at most `timeout`
    fn is_ready(&mut self, timeout: Duration) -> bool;

    fn send_text(&mut self, text: &str) -> Result<()>;

    /// Non-blocking poll for one inbound text message
    fn receive_text(&mut self) -> Option<String>;

    /// Client certificate, key and trust anchors for secure endpoints
    fn set_tls_material(&mut self, _material: TlsMaterial) -> Result<()> {
        Ok(())
    }

    fn set_hostname_verification(&mut self, _verify: bool) {}

    /// Target a different endpoint from the next connect on
    fn set_endpoint(&mut self, _endpoint: Endpoint) {}
}
