//! Client status and the cell that publishes it

use parking_lot::Mutex;
use std::fmt;
use tokio::sync::watch;

/// Status of the connection state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientStatus {
    /// Constructed, transport not yet initialised
    Created,
    /// Transport initialised
    Initialised,
    /// Connect issued, waiting for the link
    Connecting,
    /// Link up, service not registered
    Connected,
    /// Service registered with the broker
    Registered,
    /// Link lost and reconnect disabled
    Unconnected,
    /// Transport could not be initialised
    Error,
    /// State machine exited
    Closed,
}

impl ClientStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ClientStatus::Created => "CREATED",
            ClientStatus::Initialised => "INITIALISED",
            ClientStatus::Connecting => "CONNECTING",
            ClientStatus::Connected => "CONNECTED",
            ClientStatus::Registered => "REGISTERED",
            ClientStatus::Unconnected => "UNCONNECTED",
            ClientStatus::Error => "ERROR",
            ClientStatus::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for ClientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current and previous status, readable from any thread
pub(crate) struct StatusCell {
    tx: watch::Sender<ClientStatus>,
    rx: watch::Receiver<ClientStatus>,
    previous: Mutex<ClientStatus>,
}

impl StatusCell {
    pub(crate) fn new(initial: ClientStatus) -> Self {
        let (tx, rx) = watch::channel(initial);
        Self {
            tx,
            rx,
            previous: Mutex::new(initial),
        }
    }

    pub(crate) fn get(&self) -> ClientStatus {
        *self.rx.borrow()
    }

    pub(crate) fn previous(&self) -> ClientStatus {
        *self.previous.lock()
    }

    pub(crate) fn receiver(&self) -> watch::Receiver<ClientStatus> {
        self.rx.clone()
    }

    /// Returns the status that was replaced
    pub(crate) fn set(&self, status: ClientStatus) -> ClientStatus {
        let mut previous = self.previous.lock();
        let old = self.get();
        if old != status {
            *previous = old;
            let _ = self.tx.send(status);
        }
        old
    }
}
