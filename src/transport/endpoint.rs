//! Broker endpoint and URL resolution

use crate::error::{MsbError, Result};
use std::fmt;
use url::{Host, Url};

pub const DEFAULT_PATH: &str = "/websocket/data/websocket";
pub const DEFAULT_TLS_PORT: u16 = 8084;
pub const DEFAULT_PORT: u16 = 8085;

/// Where and how to open the websocket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub use_ipv6: bool,
    /// Address to open the TCP connection to
    pub address: String,
    pub port: u16,
    /// Host name used for the handshake and for TLS server name checks
    pub hostname: String,
    pub path: String,
    pub tls: bool,
    /// `Origin` header of the handshake
    pub origin: Option<String>,
}

impl Endpoint {
    pub fn new(address: impl Into<String>, port: u16, path: impl Into<String>, tls: bool) -> Self {
        let address = address.into();
        Self {
            use_ipv6: address.contains(':'),
            hostname: address.clone(),
            address,
            port,
            path: path.into(),
            tls,
            origin: None,
        }
    }

    pub fn ipv6(mut self, use_ipv6: bool) -> Self {
        self.use_ipv6 = use_ipv6;
        self
    }

    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Resolve a broker URL such as `wss://broker:8084/websocket/data/websocket`
    ///
    /// A missing scheme means `ws`. `http`/`https` are accepted as aliases of
    /// `ws`/`wss`. Without a port the secure schemes use 8084 (`https`: 443)
    /// and the plain ones 8085 (`http`: 80). Without a path the default
    /// websocket path is used.
    pub fn parse(raw: &str) -> Result<Self> {
        let with_scheme = if raw.contains("://") {
            raw.to_string()
        } else {
            format!("ws://{}", raw)
        };
        let url = Url::parse(&with_scheme).map_err(|e| MsbError::InvalidUrl(format!("{}: {}", raw, e)))?;

        let (tls, default_port) = match url.scheme() {
            "wss" => (true, DEFAULT_TLS_PORT),
            "https" => (true, 443),
            "ws" => (false, DEFAULT_PORT),
            "http" => (false, 80),
            other => {
                return Err(MsbError::InvalidUrl(format!(
                    "{}: unsupported scheme {}",
                    raw, other
                )))
            }
        };

        let (address, use_ipv6) = match url.host() {
            Some(Host::Domain(d)) => (d.to_string(), false),
            Some(Host::Ipv4(ip)) => (ip.to_string(), false),
            Some(Host::Ipv6(ip)) => (ip.to_string(), true),
            None => return Err(MsbError::InvalidUrl(format!("{}: missing host", raw))),
        };

        let port = explicit_port(&url, &with_scheme).unwrap_or(default_port);

        let mut path = match url.path() {
            "" | "/" => DEFAULT_PATH.to_string(),
            p => p.to_string(),
        };
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }

        Ok(Self {
            use_ipv6,
            hostname: address.clone(),
            address,
            port,
            path,
            tls,
            origin: None,
        })
    }

    /// URL of the websocket handshake request
    pub fn request_url(&self) -> String {
        let scheme = if self.tls { "wss" } else { "ws" };
        let host = if self.hostname.contains(':') {
            format!("[{}]", self.hostname)
        } else {
            self.hostname.clone()
        };
        format!("{}://{}:{}{}", scheme, host, self.port, self.path)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.request_url())
    }
}

/// `Url::port` hides a port equal to the scheme's well-known one, which is
/// not our default, so look at the authority as written.
fn explicit_port(url: &Url, raw: &str) -> Option<u16> {
    url.port().or_else(|| {
        let authority = raw.split("://").nth(1)?.split(['/', '?', '#']).next()?;
        let after_host = &authority[authority.rfind(']').unwrap_or(0)..];
        let (_, port) = after_host.rsplit_once(':')?;
        port.parse().ok()
    })
}
