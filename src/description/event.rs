//! Event definitions (outbound notifications)

use super::types::{array_schema, data_object_schema, primitive_schema, PrimitiveFormat, PrimitiveType};
use serde_json::{Map, Value};

/// How the payload of an event is typed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventShape {
    /// A single primitive value
    Scalar {
        ty: PrimitiveType,
        format: PrimitiveFormat,
    },
    /// An array of primitive values
    Array {
        item: PrimitiveType,
        format: PrimitiveFormat,
    },
    /// A pre-built structured value described only by its schema
    Structured,
}

/// One event of the service
#[derive(Debug, Clone)]
pub struct EventDefinition {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) shape: EventShape,
    pub(crate) data_format: Value,
    pub(crate) at_id: u32,
}

impl EventDefinition {
    /// Event with a primitive (or array of primitive) payload
    pub(crate) fn typed(
        id: &str,
        name: &str,
        description: &str,
        ty: PrimitiveType,
        format: PrimitiveFormat,
        is_array: bool,
        at_id: u32,
    ) -> Self {
        let (shape, data_format) = if is_array {
            (
                EventShape::Array { item: ty, format },
                data_object_schema(array_schema(ty, format)),
            )
        } else {
            (
                EventShape::Scalar { ty, format },
                data_object_schema(primitive_schema(ty, format)),
            )
        };

        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            shape,
            data_format,
            at_id,
        }
    }

    /// Event whose payload is described by a caller-supplied schema
    pub(crate) fn structured(
        id: &str,
        name: &str,
        description: &str,
        data_format: Value,
        at_id: u32,
    ) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            shape: EventShape::Structured,
            data_format,
            at_id,
        }
    }

    /// Event without payload
    pub(crate) fn empty(id: &str, name: &str, description: &str, at_id: u32) -> Self {
        Self::structured(id, name, description, Value::Object(Map::new()), at_id)
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

    pub fn shape(&self) -> EventShape {
        self.shape
    }

    /// Declared primitive type; `Array` for array events and `String` for structured ones
    pub fn primitive_type(&self) -> PrimitiveType {
        match self.shape {
            EventShape::Scalar { ty, .. } => ty,
            EventShape::Array { .. } => PrimitiveType::Array,
            EventShape::Structured => PrimitiveType::String,
        }
    }

    pub fn format(&self) -> PrimitiveFormat {
        match self.shape {
            EventShape::Scalar { format, .. } => format,
            _ => PrimitiveFormat::None,
        }
    }

    /// Item type and format, only for array events
    pub fn array_item(&self) -> Option<(PrimitiveType, PrimitiveFormat)> {
        match self.shape {
            EventShape::Array { item, format } => Some((item, format)),
            _ => None,
        }
    }

    pub fn data_format(&self) -> &Value {
        &self.data_format
    }

    /// Reference id used by functions to name their response events
    pub fn at_id(&self) -> u32 {
        self.at_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_typed_scalar_event() {
        let ev = EventDefinition::typed(
            "Ev1",
            "Event1",
            "desc",
            PrimitiveType::Integer,
            PrimitiveFormat::Int32,
            false,
            0,
        );

        assert_eq!(ev.primitive_type(), PrimitiveType::Integer);
        assert_eq!(ev.format(), PrimitiveFormat::Int32);
        assert_eq!(ev.array_item(), None);
        assert_eq!(
            ev.data_format(),
            &json!({"dataObject": {"type": "integer", "format": "int32"}})
        );
    }

    #[test]
    fn test_typed_array_event() {
        let ev = EventDefinition::typed(
            "Ev2",
            "Event2",
            "desc",
            PrimitiveType::String,
            PrimitiveFormat::None,
            true,
            3,
        );

        assert_eq!(ev.primitive_type(), PrimitiveType::Array);
        assert_eq!(ev.format(), PrimitiveFormat::None);
        assert_eq!(ev.array_item(), Some((PrimitiveType::String, PrimitiveFormat::None)));
        assert_eq!(
            ev.data_format(),
            &json!({"dataObject": {"type": "array", "items": {"type": "string"}}})
        );
        assert_eq!(ev.at_id(), 3);
    }

    #[test]
    fn test_empty_event_has_empty_schema() {
        let ev = EventDefinition::empty("Ev0", "Event0", "desc", 0);
        assert_eq!(ev.shape(), EventShape::Structured);
        assert_eq!(ev.data_format(), &json!({}));
    }
}
