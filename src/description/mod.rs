//! Self-description object model
//!
//! A service announces its events, functions and configuration parameters to
//! the broker in a single JSON document. [`ServiceDescription`] owns the three
//! registries and produces that document.

mod config_param;
mod event;
mod function;
mod service;
mod types;

pub use config_param::{binding, Binding, ConfigParam, ConfigValue};
pub use event::{EventDefinition, EventShape};
pub use function::{CallContext, FunctionCallback, FunctionDefinition};
pub use service::{DescriptorUpdate, ServiceClass, ServiceDescription, ServiceDescriptor};
pub use types::{PrimitiveFormat, PrimitiveType};
