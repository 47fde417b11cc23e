//! MSB Rust Client
//!
//! A client for the MSB publish/subscribe message bus. A process describes
//! itself as a service with typed events, callable functions and live-bound
//! configuration parameters, registers with the broker over a WebSocket
//! (optionally SockJS-framed) and keeps the link up on a background state
//! machine.
//!
//! # Example
//!
//! ```no_run
//! use msb_client::{
//!     MsbClient, MsbConfig, Priority, PrimitiveFormat, PrimitiveType, ServiceClass,
//!     ServiceDescriptor,
//! };
//!
//! fn main() -> msb_client::Result<()> {
//!     let config = MsbConfig::new("ws://localhost:8085")?;
//!     let service = ServiceDescriptor::new(
//!         "76499546-4a30-4c4c-bd9c-e6e8e9b5b7a4",
//!         "token-1",
//!         ServiceClass::SmartObject,
//!         "thermometer",
//!         "Room temperature",
//!     );
//!     let client = MsbClient::new(config, service)?;
//!
//!     client.add_event("temp", "Temperature", "Current value", PrimitiveType::Number, PrimitiveFormat::Double, false)?;
//!     client.add_empty_function("reset", "Reset", "", |_client, _params, _ctx| {
//!         println!("reset requested");
//!     }, None)?;
//!
//!     client.run()?;
//!
//!     // Queued once the service is registered
//!     client.publish("temp", Priority::Low, 21.5, None);
//!
//!     client.halt()?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod description;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod transport;

pub use client::{ClientStatus, DebugSink, EventData, MessageCallback, MsbClient};
pub use config::MsbConfig;
pub use description::{
    binding, Binding, CallContext, ConfigParam, ConfigValue, DescriptorUpdate, EventDefinition,
    FunctionDefinition, PrimitiveFormat, PrimitiveType, ServiceClass, ServiceDescription,
    ServiceDescriptor,
};
pub use error::{MsbError, Result};
pub use protocol::Priority;
pub use transport::{Endpoint, TlsMaterial, Transport, WebSocketTransport};
