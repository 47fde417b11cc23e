//! Connection state machine and the worker thread that drives it

use super::state::ClientStatus;
use super::{framed, ClientInner, MsbClient};
use crate::error::{MsbError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

const WORKER_NAME: &str = "msb-state-machine";

/// Settings read once per cycle
#[derive(Debug, Clone, Copy)]
struct Cycle {
    pause: Duration,
    startup_delay: Duration,
    connect_poll_delay: Duration,
    ready_timeout: Duration,
    reconnect: bool,
    reconnect_interval: Duration,
    sockjs: bool,
}

impl ClientInner {
    fn cycle(&self) -> Cycle {
        let s = self.settings.read();
        Cycle {
            pause: s.cycle_pause,
            startup_delay: s.startup_delay,
            connect_poll_delay: s.connect_poll_delay,
            ready_timeout: s.ready_timeout,
            reconnect: s.reconnect,
            reconnect_interval: s.reconnect_interval,
            sockjs: s.sockjs_framing,
        }
    }
}

/// When the next connect attempt may be made.
///
/// Initial connects poll every cycle; after a lost link attempts are spaced
/// by the reconnect interval, the first one immediately.
#[derive(Debug, Default)]
struct ConnectSchedule {
    after_loss: bool,
    next_attempt: Option<Instant>,
}

impl ConnectSchedule {
    fn link_lost(&mut self) {
        self.after_loss = true;
        self.next_attempt = None;
    }

    fn link_up(&mut self) {
        self.after_loss = false;
        self.next_attempt = None;
    }

    fn due(&self, now: Instant) -> bool {
        self.next_attempt.map_or(true, |at| now >= at)
    }

    fn attempted(&mut self, now: Instant, interval: Duration) {
        if self.after_loss {
            self.next_attempt = Some(now + interval);
        }
    }
}

/// One run of the state machine and its own exit flag
pub(super) struct Worker {
    handle: JoinHandle<()>,
    exit: Arc<AtomicBool>,
}

/// Leaves the client closed when the worker exits, panics included
struct Teardown<'a>(&'a ClientInner);

impl Drop for Teardown<'_> {
    fn drop(&mut self) {
        let inner = self.0;
        inner.incoming.close();
        inner.outgoing.close();
        {
            let mut transport = inner.transport.lock();
            transport.disconnect();
            transport.deinitialise();
        }
        inner.set_status(ClientStatus::Closed);
        info!("State machine stopped");
    }
}

impl MsbClient {
    /// Start the state machine on its worker thread.
    ///
    /// Opens both queues. A client that was halted before starts over from
    /// [`ClientStatus::Created`]. Fails with [`MsbError::AlreadyRunning`]
    /// while a worker is alive, including one told to halt from its own
    /// callback that has not exited yet.
    pub fn run(&self) -> Result<()> {
        let mut worker = self.inner.worker.lock();
        if let Some(previous) = worker.take() {
            if !previous.handle.is_finished() {
                *worker = Some(previous);
                return Err(MsbError::AlreadyRunning);
            }
            if previous.handle.join().is_err() {
                warn!("Previous state machine worker panicked");
            }
        }

        self.inner.incoming.open();
        self.inner.outgoing.open();
        if self.status() == ClientStatus::Closed {
            self.inner.set_status(ClientStatus::Created);
        }

        let exit = Arc::new(AtomicBool::new(false));
        let client = self.clone();
        let flag = exit.clone();
        let handle = thread::Builder::new()
            .name(WORKER_NAME.into())
            .spawn(move || state_machine(client, &flag))?;
        *worker = Some(Worker { handle, exit });

        info!(endpoint = %self.inner.settings.read().endpoint, "State machine started");
        Ok(())
    }

    /// Stop the state machine and wait for the worker to exit.
    ///
    /// Afterwards both queues are closed, the transport is disconnected and
    /// the status is [`ClientStatus::Closed`]. Called from inside a callback
    /// (on the worker itself) it only requests the exit; the worker finishes
    /// once the callback returns.
    pub fn halt(&self) -> Result<()> {
        let mut slot = self.inner.worker.lock();
        let worker = slot.take().ok_or(MsbError::NotRunning)?;
        worker.exit.store(true, Ordering::SeqCst);

        if worker.handle.thread().id() == thread::current().id() {
            debug!("Halt requested from the worker thread");
            *slot = Some(worker);
            return Ok(());
        }
        drop(slot);
        worker.handle.join().map_err(|_| MsbError::WorkerPanicked)
    }

    /// Whether the worker thread is running
    pub fn is_running(&self) -> bool {
        self.inner.worker.lock().as_ref().is_some_and(|w| !w.handle.is_finished())
    }
}

fn state_machine(client: MsbClient, exit: &AtomicBool) {
    let inner = &*client.inner;
    let _teardown = Teardown(inner);
    let mut schedule = ConnectSchedule::default();

    while !exit.load(Ordering::SeqCst) {
        let cycle = inner.cycle();

        match inner.status.get() {
            ClientStatus::Created => initialise(inner, &cycle),
            ClientStatus::Initialised => {
                if let Err(e) = inner.transport.lock().connect() {
                    debug!("Connect attempt failed: {}", e);
                }
                inner.set_status(ClientStatus::Connecting);
            }
            ClientStatus::Connecting => connecting(inner, &cycle, &mut schedule),
            status @ (ClientStatus::Connected | ClientStatus::Registered) => {
                exchange(&client, &cycle, status, &mut schedule)
            }
            ClientStatus::Unconnected | ClientStatus::Error | ClientStatus::Closed => {}
        }

        thread::sleep(cycle.pause);
    }
}

fn initialise(inner: &ClientInner, cycle: &Cycle) {
    let result = inner.transport.lock().initialise();
    match result {
        Ok(()) => {
            inner.set_status(ClientStatus::Initialised);
            thread::sleep(cycle.startup_delay);
        }
        Err(e) => {
            warn!("Transport initialisation failed: {}", e);
            inner.set_status(ClientStatus::Error);
        }
    }
}

fn connecting(inner: &ClientInner, cycle: &Cycle, schedule: &mut ConnectSchedule) {
    let mut transport = inner.transport.lock();
    if transport.is_ready(cycle.ready_timeout) {
        drop(transport);
        schedule.link_up();
        inner.set_status(ClientStatus::Connected);
        return;
    }

    let now = Instant::now();
    if !schedule.due(now) {
        return;
    }
    if let Err(e) = transport.connect() {
        debug!("Connect attempt failed: {}", e);
        inner.debug_line(format_args!("Connect attempt failed: {}", e));
    }
    drop(transport);

    schedule.attempted(now, cycle.reconnect_interval);
    thread::sleep(cycle.connect_poll_delay);
}

/// Shared body of `Connected` and `Registered`: poll one inbound message,
/// send one outbound message once registered, dispatch one inbound message
fn exchange(client: &MsbClient, cycle: &Cycle, status: ClientStatus, schedule: &mut ConnectSchedule) {
    let inner = &*client.inner;
    {
        let mut transport = inner.transport.lock();
        if !transport.is_ready(cycle.ready_timeout) {
            drop(transport);
            if cycle.reconnect {
                warn!("Link lost, reconnecting");
                schedule.link_lost();
                inner.set_status(ClientStatus::Connecting);
            } else {
                warn!("Link lost");
                inner.set_status(ClientStatus::Unconnected);
            }
            return;
        }

        if let Some(text) = transport.receive_text() {
            trace!(len = text.len(), "Received frame");
            if !inner.incoming.push(text) {
                debug!(depth = inner.incoming.len(), "Incoming queue full, frame dropped");
            }
        }

        if status == ClientStatus::Registered {
            if let Some(head) = inner.outgoing.front() {
                match transport.send_text(&framed(&head, cycle.sockjs)) {
                    Ok(()) => {
                        inner.outgoing.pop();
                    }
                    Err(e) => debug!("Send failed, keeping message queued: {}", e),
                }
            }
        }
    }

    if let Some(text) = inner.incoming.pop() {
        client.dispatch(&text);
    }
}
