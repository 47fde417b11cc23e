//! Function definitions (inbound remote calls)

use super::types::{array_schema, data_object_schema, primitive_schema, PrimitiveFormat, PrimitiveType};
use crate::client::MsbClient;
use serde_json::{Map, Value};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Opaque caller context handed back on every invocation of a function
pub type CallContext = Arc<dyn Any + Send + Sync>;

/// Handler for incoming function calls
///
/// Receives the client (so it can publish response events), either the whole
/// call body or only its `functionParameters`, and the context registered
/// with the function.
pub type FunctionCallback = Arc<dyn Fn(&MsbClient, &Value, Option<&CallContext>) + Send + Sync>;

/// One function of the service
#[derive(Clone)]
pub struct FunctionDefinition {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) data_format: Value,
    pub(crate) callback: FunctionCallback,
    pub(crate) context: Option<CallContext>,
    pub(crate) at_id: u32,
    pub(crate) response_events: Vec<u32>,
}

impl FunctionDefinition {
    pub(crate) fn structured(
        id: &str,
        name: &str,
        description: &str,
        data_format: Value,
        callback: FunctionCallback,
        context: Option<CallContext>,
        at_id: u32,
    ) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            data_format,
            callback,
            context,
            at_id,
            response_events: Vec::new(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn typed(
        id: &str,
        name: &str,
        description: &str,
        ty: PrimitiveType,
        format: PrimitiveFormat,
        is_array: bool,
        callback: FunctionCallback,
        context: Option<CallContext>,
        at_id: u32,
    ) -> Self {
        // array parameters are not wrapped in `dataObject`
        let data_format = if is_array {
            array_schema(ty, format)
        } else {
            data_object_schema(primitive_schema(ty, format))
        };
        Self::structured(id, name, description, data_format, callback, context, at_id)
    }

    pub(crate) fn empty(
        id: &str,
        name: &str,
        description: &str,
        callback: FunctionCallback,
        context: Option<CallContext>,
        at_id: u32,
    ) -> Self {
        Self::structured(
            id,
            name,
            description,
            Value::Object(Map::new()),
            callback,
            context,
            at_id,
        )
    }

    /// Link a response event; a reference already present is not added twice
    pub(crate) fn add_response_event(&mut self, event_at_id: u32) {
        if !self.response_events.contains(&event_at_id) {
            self.response_events.push(event_at_id);
        }
    }

    pub(crate) fn remove_response_event(&mut self, event_at_id: u32) -> bool {
        let before = self.response_events.len();
        self.response_events.retain(|id| *id != event_at_id);
        self.response_events.len() != before
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn data_format(&self) -> &Value {
        &self.data_format
    }

    pub fn at_id(&self) -> u32 {
        self.at_id
    }

    /// `@id`s of the linked response events, in link order
    pub fn response_events(&self) -> &[u32] {
        &self.response_events
    }
}

impl fmt::Debug for FunctionDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDefinition")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("description", &self.description)
            .field("data_format", &self.data_format)
            .field("at_id", &self.at_id)
            .field("response_events", &self.response_events)
            .field("has_context", &self.context.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn noop() -> FunctionCallback {
        Arc::new(|_, _, _| {})
    }

    #[test]
    fn test_typed_function_schema() {
        let f = FunctionDefinition::typed(
            "F1",
            "Function1",
            "desc",
            PrimitiveType::Integer,
            PrimitiveFormat::Int32,
            false,
            noop(),
            None,
            0,
        );
        assert_eq!(
            f.data_format(),
            &json!({"dataObject": {"type": "integer", "format": "int32"}})
        );
    }

    #[test]
    fn test_typed_array_function_schema_is_unwrapped() {
        let f = FunctionDefinition::typed(
            "F2",
            "Function2",
            "desc",
            PrimitiveType::Bool,
            PrimitiveFormat::None,
            true,
            noop(),
            None,
            1,
        );
        assert_eq!(
            f.data_format(),
            &json!({"type": "array", "items": {"type": "boolean"}})
        );
    }

    #[test]
    fn test_response_events_are_a_set() {
        let mut f = FunctionDefinition::empty("F0", "Function0", "desc", noop(), None, 0);
        f.add_response_event(2);
        f.add_response_event(0);
        f.add_response_event(2);

        assert_eq!(f.response_events(), &[2, 0]);
        assert!(f.remove_response_event(2));
        assert!(!f.remove_response_event(2));
        assert_eq!(f.response_events(), &[0]);
    }

    #[test]
    fn test_debug_hides_callback() {
        let ctx: CallContext = Arc::new(5u8);
        let f = FunctionDefinition::empty("F0", "Function0", "desc", noop(), Some(ctx), 0);
        let debug = format!("{:?}", f);
        assert!(debug.contains("F0"));
        assert!(debug.contains("has_context: true"));
    }
}
