//! Poll-based websocket transport over a non-blocking socket

use super::endpoint::Endpoint;
use super::tls::{client_config, TlsMaterial};
use super::Transport;
use crate::error::{MsbError, Result};
use rustls::ClientConfig;
use std::io::ErrorKind;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use tungstenite::client::IntoClientRequest;
use tungstenite::http::HeaderValue;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Connector, Message, WebSocket};

type Socket = WebSocket<MaybeTlsStream<TcpStream>>;

/// Websocket connection to the broker
///
/// `connect` performs the TCP connect and the websocket handshake with
/// blocking I/O bounded by the connect timeout; afterwards the socket is
/// switched to non-blocking mode so `receive_text` never waits.
pub struct WebSocketTransport {
    endpoint: Endpoint,
    connect_timeout: Duration,
    tls_material: Option<TlsMaterial>,
    verify_hostname: bool,
    tls_config: Option<Arc<ClientConfig>>,
    socket: Option<Socket>,
}

impl WebSocketTransport {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            connect_timeout: Duration::from_secs(1),
            tls_material: None,
            verify_hostname: true,
            tls_config: None,
            socket: None,
        }
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn resolve(&self) -> Result<SocketAddr> {
        let addrs = (self.endpoint.address.as_str(), self.endpoint.port)
            .to_socket_addrs()
            .map_err(|e| MsbError::Transport(format!("resolving {}: {}", self.endpoint.address, e)))?;

        let mut fallback = None;
        for addr in addrs {
            if addr.is_ipv6() == self.endpoint.use_ipv6 {
                return Ok(addr);
            }
            fallback.get_or_insert(addr);
        }
        fallback.ok_or_else(|| MsbError::Transport(format!("no address for {}", self.endpoint.address)))
    }

    fn open(&self) -> Result<Socket> {
        let addr = self.resolve()?;
        let stream = TcpStream::connect_timeout(&addr, self.connect_timeout)?;
        stream.set_read_timeout(Some(self.connect_timeout))?;
        stream.set_write_timeout(Some(self.connect_timeout))?;
        stream.set_nodelay(true)?;

        let mut request = self
            .endpoint
            .request_url()
            .into_client_request()
            .map_err(|e| MsbError::Transport(e.to_string()))?;
        if let Some(origin) = &self.endpoint.origin {
            let value = HeaderValue::from_str(origin)
                .map_err(|e| MsbError::Transport(format!("origin header: {}", e)))?;
            request.headers_mut().insert("Origin", value);
        }

        let connector = if self.endpoint.tls {
            let config = self
                .tls_config
                .clone()
                .ok_or_else(|| MsbError::Tls("transport not initialised".into()))?;
            Some(Connector::Rustls(config))
        } else {
            Some(Connector::Plain)
        };

        let (socket, response) = tungstenite::client_tls_with_config(request, stream, None, connector)
            .map_err(|e| MsbError::Transport(format!("handshake with {}: {}", self.endpoint, e)))?;
        debug!(status = %response.status(), "Websocket handshake complete");

        set_nonblocking(&socket)?;
        Ok(socket)
    }

    fn drop_socket(&mut self, reason: &str) {
        if self.socket.take().is_some() {
            warn!(endpoint = %self.endpoint, "Websocket closed: {}", reason);
        }
    }
}

fn set_nonblocking(socket: &Socket) -> Result<()> {
    match socket.get_ref() {
        MaybeTlsStream::Plain(stream) => stream.set_nonblocking(true)?,
        MaybeTlsStream::Rustls(stream) => stream.get_ref().set_nonblocking(true)?,
        _ => {}
    }
    Ok(())
}

impl Transport for WebSocketTransport {
    fn initialise(&mut self) -> Result<()> {
        if self.endpoint.tls {
            self.tls_config = Some(client_config(self.tls_material.as_ref(), self.verify_hostname)?);
        }
        Ok(())
    }

    fn connect(&mut self) -> Result<()> {
        if self.socket.is_some() {
            return Ok(());
        }
        info!(endpoint = %self.endpoint, "Connecting");
        let socket = self.open()?;
        self.socket = Some(socket);
        Ok(())
    }

    fn disconnect(&mut self) {
        if let Some(mut socket) = self.socket.take() {
            let _ = socket.close(None);
            let _ = socket.flush();
            debug!(endpoint = %self.endpoint, "Disconnected");
        }
    }

    fn deinitialise(&mut self) {
        self.tls_config = None;
    }

    /// The handshake completes inside `connect`, so there is nothing to wait for
    fn is_ready(&mut self, _timeout: Duration) -> bool {
        self.socket.as_ref().is_some_and(|s| s.can_write())
    }

    fn send_text(&mut self, text: &str) -> Result<()> {
        let Some(socket) = self.socket.as_mut() else {
            return Err(MsbError::NotConnected);
        };
        match socket.send(Message::text(text.to_string())) {
            Ok(()) => Ok(()),
            // queued inside tungstenite, written on a later flush
            Err(tungstenite::Error::Io(ref e)) if e.kind() == ErrorKind::WouldBlock => Ok(()),
            Err(e) => {
                let msg = e.to_string();
                self.drop_socket(&msg);
                Err(MsbError::Transport(msg))
            }
        }
    }

    fn receive_text(&mut self) -> Option<String> {
        let socket = self.socket.as_mut()?;
        // push out whatever an earlier send left buffered
        match socket.flush() {
            Ok(()) => {}
            Err(tungstenite::Error::Io(ref e)) if e.kind() == ErrorKind::WouldBlock => {}
            Err(e) => {
                self.drop_socket(&e.to_string());
                return None;
            }
        }
        match socket.read() {
            Ok(Message::Text(text)) => Some(text.to_string()),
            Ok(Message::Binary(bytes)) => String::from_utf8(bytes.to_vec()).ok(),
            Ok(Message::Close(frame)) => {
                let reason = frame.map(|f| f.to_string()).unwrap_or_else(|| "close frame".into());
                self.drop_socket(&reason);
                None
            }
            Ok(_) => None,
            Err(tungstenite::Error::Io(ref e)) if e.kind() == ErrorKind::WouldBlock => None,
            Err(e) => {
                self.drop_socket(&e.to_string());
                None
            }
        }
    }

    fn set_tls_material(&mut self, material: TlsMaterial) -> Result<()> {
        material.check()?;
        self.tls_material = Some(material);
        Ok(())
    }

    fn set_hostname_verification(&mut self, verify: bool) {
        self.verify_hostname = verify;
    }

    fn set_endpoint(&mut self, endpoint: Endpoint) {
        self.disconnect();
        self.endpoint = endpoint;
    }
}
