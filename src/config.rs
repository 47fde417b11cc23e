//! Configuration for the MSB client

use crate::error::Result;
use crate::transport::{Endpoint, TlsMaterial};
use std::time::Duration;

/// Tunables of the client and its state machine
#[derive(Debug, Clone)]
pub struct MsbConfig {
    /// Broker endpoint
    pub endpoint: Endpoint,

    /// Reconnect when an established link is lost
    pub reconnect: bool,

    /// Minimum spacing of connect attempts after a lost link
    pub reconnect_interval: Duration,

    /// Sleep at the end of every state machine cycle
    pub cycle_pause: Duration,

    /// Settle time after initialising the transport
    pub startup_delay: Duration,

    /// Settle time after issuing a connect
    pub connect_poll_delay: Duration,

    /// Upper bound for readiness checks and the connect handshake
    pub ready_timeout: Duration,

    /// Serialized events of this length or more are dropped
    pub max_message_size: usize,

    /// Depth of the inbound queue
    pub max_incoming: usize,

    /// Depth of the outbound queue
    pub max_outgoing: usize,

    /// Wrap and unwrap every frame in SockJS framing
    pub sockjs_framing: bool,

    /// Hand function callbacks the whole call instead of only its parameters
    pub forward_complete_call: bool,

    /// Accept events into the outbound queue before the service is registered
    pub event_cache: bool,

    /// Client certificate and key for secure endpoints
    pub tls: Option<TlsMaterial>,

    /// Check that the broker certificate was issued for the host name
    pub verify_hostname: bool,

    /// Forward debug lines to the debug sink
    pub debug: bool,
}

impl MsbConfig {
    /// Configuration for the broker at `url`, see [`Endpoint::parse`]
    pub fn new(url: &str) -> Result<Self> {
        Ok(Self::from_endpoint(Endpoint::parse(url)?))
    }

    pub fn from_endpoint(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            reconnect: true,
            reconnect_interval: Duration::from_secs(10),
            cycle_pause: Duration::from_millis(10),
            startup_delay: Duration::from_secs(1),
            connect_poll_delay: Duration::from_millis(100),
            ready_timeout: Duration::from_secs(1),
            max_message_size: 1_000_000,
            max_incoming: 100,
            max_outgoing: 100,
            sockjs_framing: false,
            forward_complete_call: false,
            event_cache: false,
            tls: None,
            verify_hostname: true,
            debug: false,
        }
    }

    /// Disable automatic reconnection
    pub fn no_reconnect(mut self) -> Self {
        self.reconnect = false;
        self
    }

    pub fn reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    pub fn cycle_pause(mut self, pause: Duration) -> Self {
        self.cycle_pause = pause;
        self
    }

    /// Set the settle delays after initialising and after a connect attempt
    pub fn settle_delays(mut self, startup: Duration, connect_poll: Duration) -> Self {
        self.startup_delay = startup;
        self.connect_poll_delay = connect_poll;
        self
    }

    pub fn ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    pub fn max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Set the inbound and outbound queue depths
    pub fn queue_depths(mut self, incoming: usize, outgoing: usize) -> Self {
        self.max_incoming = incoming;
        self.max_outgoing = outgoing;
        self
    }

    pub fn sockjs_framing(mut self) -> Self {
        self.sockjs_framing = true;
        self
    }

    pub fn forward_complete_call(mut self) -> Self {
        self.forward_complete_call = true;
        self
    }

    pub fn event_cache(mut self) -> Self {
        self.event_cache = true;
        self
    }

    pub fn tls(mut self, material: TlsMaterial) -> Self {
        self.tls = Some(material);
        self
    }

    /// Accept broker certificates issued for another host name (development only)
    pub fn dangerous_skip_hostname_verify(mut self) -> Self {
        self.verify_hostname = false;
        self
    }

    /// `Origin` header of the websocket handshake
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.endpoint.origin = Some(origin.into());
        self
    }

    pub fn debug(mut self) -> Self {
        self.debug = true;
        self
    }
}
