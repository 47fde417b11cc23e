//! MSB client handle
//!
//! [`MsbClient`] owns the self-description, the two message queues and the
//! transport. Callers register events, functions and configuration
//! parameters, then [`run`](MsbClient::run) the state machine; from then on
//! the worker thread connects, registers, drains the queues and dispatches
//! inbound calls while any thread may publish.

mod dispatch;
mod machine;
mod publish;
mod queue;
mod state;

pub use publish::EventData;
pub use state::ClientStatus;

use crate::config::MsbConfig;
use crate::description::{
    CallContext, ConfigValue, DescriptorUpdate, FunctionCallback, PrimitiveFormat, PrimitiveType,
    ServiceDescription, ServiceDescriptor,
};
use crate::error::{MsbError, Result};
use crate::protocol::messages::{frame, REGISTER_TAG};
use crate::protocol::{sockjs, Priority};
use crate::transport::{Endpoint, TlsMaterial, Transport, WebSocketTransport};
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use machine::Worker;
use queue::BoundedQueue;
use serde_json::Value;
use state::StatusCell;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

/// Callback for whole inbound messages (every function call, or every
/// configuration change)
pub type MessageCallback = Arc<dyn Fn(&MsbClient, &Value) + Send + Sync>;

/// Receiver of human-readable debug lines
pub type DebugSink = Arc<dyn Fn(&str) + Send + Sync>;

struct ClientInner {
    settings: RwLock<MsbConfig>,
    status: StatusCell,
    description: RwLock<ServiceDescription>,
    transport: Mutex<Box<dyn Transport>>,
    incoming: BoundedQueue,
    outgoing: BoundedQueue,
    common_callback: RwLock<Option<MessageCallback>>,
    config_callback: RwLock<Option<MessageCallback>>,
    debug_sink: RwLock<Option<DebugSink>>,
    worker: Mutex<Option<Worker>>,
}

/// MSB service client
///
/// Cheaply cloneable; all clones share one connection. The worker thread
/// holds a clone while running, so call [`halt`](Self::halt) (or
/// [`shutdown`](Self::shutdown)) to stop it.
#[derive(Clone)]
pub struct MsbClient {
    inner: Arc<ClientInner>,
}

impl fmt::Debug for MsbClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MsbClient")
            .field("uuid", &self.inner.description.read().descriptor().uuid)
            .field("status", &self.status())
            .finish()
    }
}

/// `text` as sent on the wire
pub(crate) fn framed(text: &str, sockjs: bool) -> Cow<'_, str> {
    if sockjs {
        Cow::Owned(sockjs::wrap(text))
    } else {
        Cow::Borrowed(text)
    }
}

impl ClientInner {
    fn set_status(&self, status: ClientStatus) {
        let old = self.status.set(status);
        if old != status {
            debug!(from = %old, to = %status, "Status changed");
            self.debug_line(format_args!("Status {} -> {}", old, status));
        }
    }

    /// Send one message right away, bypassing the outbound queue
    fn send_text(&self, text: &str) -> Result<()> {
        let sockjs = self.settings.read().sockjs_framing;
        self.transport.lock().send_text(&framed(text, sockjs))
    }

    /// Forward a line to the debug sink when debug output is on
    fn debug_line(&self, args: fmt::Arguments<'_>) {
        if !self.settings.read().debug {
            return;
        }
        let sink = self.debug_sink.read().clone();
        if let Some(sink) = sink {
            sink(&args.to_string());
        }
    }
}

impl MsbClient {
    /// Create a client talking websocket to `config.endpoint`
    pub fn new(config: MsbConfig, service: ServiceDescriptor) -> Result<Self> {
        let transport = WebSocketTransport::new(config.endpoint.clone()).connect_timeout(config.ready_timeout);
        Self::with_transport(config, service, transport)
    }

    /// Create a client over a caller-supplied transport
    pub fn with_transport(
        config: MsbConfig,
        service: ServiceDescriptor,
        transport: impl Transport + 'static,
    ) -> Result<Self> {
        let mut transport: Box<dyn Transport> = Box::new(transport);
        if let Some(material) = config.tls.clone() {
            transport.set_tls_material(material)?;
        }
        transport.set_hostname_verification(config.verify_hostname);

        info!(uuid = %service.uuid, name = %service.name, endpoint = %config.endpoint, "Created MSB client");

        let inner = Arc::new(ClientInner {
            incoming: BoundedQueue::new(config.max_incoming),
            outgoing: BoundedQueue::new(config.max_outgoing),
            settings: RwLock::new(config),
            status: StatusCell::new(ClientStatus::Created),
            description: RwLock::new(ServiceDescription::new(service)),
            transport: Mutex::new(transport),
            common_callback: RwLock::new(None),
            config_callback: RwLock::new(None),
            debug_sink: RwLock::new(None),
            worker: Mutex::new(None),
        });

        Ok(Self { inner })
    }

    /// Halt the state machine if it runs and release the transport
    pub fn shutdown(self) -> Result<()> {
        match self.halt() {
            Ok(()) | Err(MsbError::NotRunning) => {}
            Err(e) => return Err(e),
        }
        let mut transport = self.inner.transport.lock();
        transport.disconnect();
        transport.deinitialise();
        Ok(())
    }

    pub fn status(&self) -> ClientStatus {
        self.inner.status.get()
    }

    pub fn previous_status(&self) -> ClientStatus {
        self.inner.status.previous()
    }

    /// Get a receiver for status changes
    pub fn state_receiver(&self) -> watch::Receiver<ClientStatus> {
        self.inner.status.receiver()
    }

    /// Number of events waiting to be sent
    pub fn pending_events(&self) -> usize {
        self.inner.outgoing.len()
    }

    /// Whether the message queues exist; they do only while the state machine runs
    pub fn queues_allocated(&self) -> bool {
        self.inner.incoming.is_open() || self.inner.outgoing.is_open()
    }

    // Manual transport control. The state machine does all of this on its
    // own; these leave the status untouched.

    pub fn initialise(&self) -> Result<()> {
        self.inner.transport.lock().initialise()
    }

    pub fn connect(&self) -> Result<()> {
        self.inner.transport.lock().connect()
    }

    pub fn disconnect(&self) {
        self.inner.transport.lock().disconnect();
    }

    pub fn deinitialise(&self) {
        self.inner.transport.lock().deinitialise();
    }

    /// Whether the transport can carry messages, waiting at most `timeout`
    pub fn connection_ready(&self, timeout: Duration) -> bool {
        self.inner.transport.lock().is_ready(timeout)
    }

    /// Send the self-description to the broker
    pub fn register(&self) -> Result<()> {
        let body = self.inner.description.read().to_json().to_string();
        info!(
            uuid = %self.inner.description.read().descriptor().uuid,
            len = body.len(),
            "Registering service"
        );
        self.inner.debug_line(format_args!("Registering: {}", body));
        self.inner.send_text(&frame(REGISTER_TAG, &body))
    }

    // Runtime settings

    pub fn set_reconnect(&self, enabled: bool) {
        self.inner.settings.write().reconnect = enabled;
    }

    pub fn set_reconnect_interval(&self, interval: Duration) {
        self.inner.settings.write().reconnect_interval = interval;
    }

    /// Accept events into the outbound queue before registration
    pub fn set_event_cache(&self, enabled: bool) {
        self.inner.settings.write().event_cache = enabled;
    }

    pub fn set_max_message_size(&self, size: usize) {
        self.inner.settings.write().max_message_size = size;
    }

    pub fn set_queue_depths(&self, incoming: usize, outgoing: usize) {
        let mut settings = self.inner.settings.write();
        settings.max_incoming = incoming;
        settings.max_outgoing = outgoing;
        self.inner.incoming.set_capacity(incoming);
        self.inner.outgoing.set_capacity(outgoing);
    }

    pub fn set_cycle_pause(&self, pause: Duration) {
        self.inner.settings.write().cycle_pause = pause;
    }

    pub fn set_sockjs_framing(&self, enabled: bool) {
        self.inner.settings.write().sockjs_framing = enabled;
    }

    /// Use the SockJS websocket path of a known session and turn framing on
    pub fn use_sockjs_path(&self, server_id: &str, session_id: &str, transport: &str) {
        self.set_endpoint_path(sockjs::path(server_id, session_id, transport));
    }

    /// Use a freshly generated SockJS websocket path and turn framing on
    pub fn generate_sockjs_path(&self) {
        self.set_endpoint_path(sockjs::generate_path());
    }

    fn set_endpoint_path(&self, path: String) {
        let endpoint = {
            let mut settings = self.inner.settings.write();
            settings.endpoint.path = path;
            settings.sockjs_framing = true;
            settings.endpoint.clone()
        };
        debug!(path = %endpoint.path, "SockJS path");
        self.inner.transport.lock().set_endpoint(endpoint);
    }

    /// Client certificate, key and optional CA for secure endpoints
    pub fn assign_tls_certs(&self, material: TlsMaterial) -> Result<()> {
        self.inner.transport.lock().set_tls_material(material.clone())?;
        self.inner.settings.write().tls = Some(material);
        Ok(())
    }

    pub fn set_hostname_verification(&self, verify: bool) {
        self.inner.transport.lock().set_hostname_verification(verify);
        self.inner.settings.write().verify_hostname = verify;
    }

    /// Hand function callbacks the whole call message
    pub fn forward_complete_call(&self) {
        self.inner.settings.write().forward_complete_call = true;
    }

    /// Hand function callbacks only `functionParameters` (the default)
    pub fn forward_parameters_only(&self) {
        self.inner.settings.write().forward_complete_call = false;
    }

    pub fn set_debug(&self, enabled: bool) {
        self.inner.settings.write().debug = enabled;
    }

    pub fn set_debug_sink<F>(&self, sink: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        *self.inner.debug_sink.write() = Some(Arc::new(sink));
    }

    /// Called with every function call body before the function's own callback
    pub fn set_common_callback<F>(&self, callback: F)
    where
        F: Fn(&MsbClient, &Value) + Send + Sync + 'static,
    {
        *self.inner.common_callback.write() = Some(Arc::new(callback));
    }

    /// Called with every configuration change body before it is applied, so
    /// bound values still hold their old contents
    pub fn set_config_change_callback<F>(&self, callback: F)
    where
        F: Fn(&MsbClient, &Value) + Send + Sync + 'static,
    {
        *self.inner.config_callback.write() = Some(Arc::new(callback));
    }

    // Retargeting

    /// Point the client at another broker URL, see [`Endpoint::parse`].
    /// Takes effect on the next connect.
    pub fn change_url(&self, url: &str, origin: Option<&str>) -> Result<()> {
        let mut endpoint = Endpoint::parse(url)?;
        endpoint.origin = origin.map(str::to_string);
        self.change_address(endpoint);
        Ok(())
    }

    pub fn change_address(&self, endpoint: Endpoint) {
        info!(endpoint = %endpoint, "Changing broker address");
        self.inner.settings.write().endpoint = endpoint.clone();
        self.inner.transport.lock().set_endpoint(endpoint);
    }

    /// Replace any subset of the service descriptor
    pub fn change_self_description(&self, update: DescriptorUpdate) {
        self.inner.description.write().update_descriptor(update);
    }

    // Self-description

    /// Read access to the registries. Hold it briefly: dispatch waits on it.
    pub fn description(&self) -> RwLockReadGuard<'_, ServiceDescription> {
        self.inner.description.read()
    }

    /// The self-description sent at registration
    pub fn self_description(&self) -> Value {
        self.inner.description.read().to_json()
    }

    pub fn add_event(
        &self,
        id: &str,
        name: &str,
        description: &str,
        ty: PrimitiveType,
        format: PrimitiveFormat,
        is_array: bool,
    ) -> Result<u32> {
        self.inner
            .description
            .write()
            .add_event(id, name, description, ty, format, is_array)
    }

    pub fn add_empty_event(&self, id: &str, name: &str, description: &str) -> Result<u32> {
        self.inner.description.write().add_empty_event(id, name, description)
    }

    pub fn add_complex_event(&self, id: &str, name: &str, description: &str, data_format: Value) -> Result<u32> {
        self.inner
            .description
            .write()
            .add_complex_event(id, name, description, data_format)
    }

    pub fn add_event_from_str(&self, id: &str, name: &str, description: &str, data_format: &str) -> Result<u32> {
        self.inner
            .description
            .write()
            .add_event_from_str(id, name, description, data_format)
    }

    pub fn remove_event(&self, id: &str) -> bool {
        self.inner.description.write().remove_event(id)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_function<F>(
        &self,
        id: &str,
        name: &str,
        description: &str,
        ty: PrimitiveType,
        format: PrimitiveFormat,
        is_array: bool,
        callback: F,
        context: Option<CallContext>,
    ) -> Result<u32>
    where
        F: Fn(&MsbClient, &Value, Option<&CallContext>) + Send + Sync + 'static,
    {
        let callback: FunctionCallback = Arc::new(callback);
        self.inner
            .description
            .write()
            .add_function(id, name, description, ty, format, is_array, callback, context)
    }

    pub fn add_empty_function<F>(
        &self,
        id: &str,
        name: &str,
        description: &str,
        callback: F,
        context: Option<CallContext>,
    ) -> Result<u32>
    where
        F: Fn(&MsbClient, &Value, Option<&CallContext>) + Send + Sync + 'static,
    {
        self.inner
            .description
            .write()
            .add_empty_function(id, name, description, Arc::new(callback), context)
    }

    pub fn add_complex_function<F>(
        &self,
        id: &str,
        name: &str,
        description: &str,
        data_format: Value,
        callback: F,
        context: Option<CallContext>,
    ) -> Result<u32>
    where
        F: Fn(&MsbClient, &Value, Option<&CallContext>) + Send + Sync + 'static,
    {
        self.inner
            .description
            .write()
            .add_complex_function(id, name, description, data_format, Arc::new(callback), context)
    }

    pub fn add_function_from_str<F>(
        &self,
        id: &str,
        name: &str,
        description: &str,
        data_format: &str,
        callback: F,
        context: Option<CallContext>,
    ) -> Result<u32>
    where
        F: Fn(&MsbClient, &Value, Option<&CallContext>) + Send + Sync + 'static,
    {
        self.inner
            .description
            .write()
            .add_function_from_str(id, name, description, data_format, Arc::new(callback), context)
    }

    pub fn remove_function(&self, id: &str) -> bool {
        self.inner.description.write().remove_function(id)
    }

    pub fn add_response_event(&self, function_id: &str, event_id: &str) -> Result<()> {
        self.inner.description.write().add_response_event(function_id, event_id)
    }

    pub fn remove_response_event(&self, function_id: &str, event_id: &str) -> Result<bool> {
        self.inner.description.write().remove_response_event(function_id, event_id)
    }

    pub fn add_config_param(&self, name: &str, value: ConfigValue) -> Result<()> {
        self.inner.description.write().add_config_param(name, value)
    }

    pub fn add_config_param_from_object(&self, object: &Value) -> Result<()> {
        self.inner.description.write().add_config_param_from_object(object)
    }

    pub fn add_config_param_from_str(&self, text: &str) -> Result<()> {
        self.inner.description.write().add_config_param_from_str(text)
    }

    pub fn remove_config_param(&self, name: &str) -> bool {
        self.inner.description.write().remove_config_param(name)
    }

    /// Binding of a configuration parameter, e.g. to read one created from
    /// a structured object
    pub fn config_param_value(&self, name: &str) -> Option<ConfigValue> {
        self.inner
            .description
            .read()
            .config_param(name)
            .map(|p| p.value().clone())
    }

    pub fn change_config_param_value(&self, name: &str, value: ConfigValue) -> Result<()> {
        self.inner.description.write().change_config_param_value(name, value)
    }

    // Publishing. Each returns whether the event was queued.

    /// Publish a typed payload; it must match the event's declared type
    pub fn publish(
        &self,
        event_id: &str,
        priority: Priority,
        data: impl Into<EventData>,
        correlation_id: Option<&str>,
    ) -> bool {
        self.inner
            .publish_event(event_id, priority, Some(data.into()), correlation_id)
    }

    /// Publish without a `dataObject`
    pub fn publish_empty(&self, event_id: &str, priority: Priority, correlation_id: Option<&str>) -> bool {
        self.inner.publish_event(event_id, priority, None, correlation_id)
    }

    /// Publish a pre-built `dataObject`
    pub fn publish_complex(
        &self,
        event_id: &str,
        priority: Priority,
        data: Value,
        correlation_id: Option<&str>,
    ) -> bool {
        self.inner
            .publish_event(event_id, priority, Some(EventData::Json(data)), correlation_id)
    }

    /// Publish a `dataObject` given as JSON text; unparsable text is dropped
    pub fn publish_from_str(
        &self,
        event_id: &str,
        priority: Priority,
        data: &str,
        correlation_id: Option<&str>,
    ) -> bool {
        match serde_json::from_str::<Value>(data) {
            Ok(value) => self.publish_complex(event_id, priority, value, correlation_id),
            Err(e) => {
                debug!(event = event_id, "Unparsable event payload dropped: {}", e);
                false
            }
        }
    }
}
