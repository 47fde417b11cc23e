//! Publish pipeline: payload encoding, envelope, admission into the outbound queue

use super::state::ClientStatus;
use super::ClientInner;
use crate::description::{EventDefinition, EventShape, PrimitiveFormat, PrimitiveType};
use crate::protocol::{EventEnvelope, Priority};
use serde_json::Value;
use tracing::{debug, trace, warn};

/// Payload of a published event
#[derive(Debug, Clone, PartialEq)]
pub enum EventData {
    Int32(i32),
    Int64(i64),
    Float(f32),
    Double(f64),
    Bool(bool),
    String(String),
    Int32Array(Vec<i32>),
    Int64Array(Vec<i64>),
    DoubleArray(Vec<f64>),
    BoolArray(Vec<bool>),
    StringArray(Vec<String>),
    /// Pre-built value, sent as is whatever the event declares
    Json(Value),
}

macro_rules! event_data_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for EventData {
            fn from(v: $ty) -> Self {
                EventData::$variant(v)
            }
        })*
    };
}

event_data_from! {
    i32 => Int32,
    i64 => Int64,
    f32 => Float,
    f64 => Double,
    bool => Bool,
    String => String,
    Vec<i32> => Int32Array,
    Vec<i64> => Int64Array,
    Vec<f64> => DoubleArray,
    Vec<bool> => BoolArray,
    Vec<String> => StringArray,
    Value => Json,
}

impl From<&str> for EventData {
    fn from(v: &str) -> Self {
        EventData::String(v.to_string())
    }
}

/// Encode `data` as the `dataObject` of `event`, or `None` if the payload
/// does not fit the event's declared type
pub(crate) fn encode(event: &EventDefinition, data: EventData) -> Option<Value> {
    use EventData as D;
    use PrimitiveFormat as F;
    use PrimitiveType as T;

    if let D::Json(value) = data {
        return Some(value);
    }

    match event.shape() {
        EventShape::Scalar { ty, format } => match (ty, format, data) {
            (T::Integer, F::Int32, D::Int32(v)) => Some(v.into()),
            (T::Integer, F::Int64, D::Int64(v)) => Some(v.into()),
            (T::Integer, F::Int64, D::Int32(v)) => Some(v.into()),
            (T::Number, F::Float | F::Double, D::Double(v)) => Some(v.into()),
            (T::Number, F::Float | F::Double, D::Float(v)) => Some((v as f64).into()),
            (T::Number, F::Byte, D::Int32(v)) => Some(v.into()),
            (T::Bool, _, D::Bool(v)) => Some(v.into()),
            (T::String, _, D::String(v)) => Some(v.into()),
            _ => None,
        },
        EventShape::Array { item, format } => {
            let encoded: Value = match (item, format, data) {
                (T::Integer, F::Int32, D::Int32Array(v)) => v.into(),
                (T::Integer, F::Int64, D::Int64Array(v)) => v.into(),
                (T::Integer, F::Int64, D::Int32Array(v)) => v.into(),
                (T::Number, F::Float | F::Double, D::DoubleArray(v)) => v.into(),
                (T::Number, F::Byte, D::Int32Array(v)) => v.into(),
                (T::Bool, _, D::BoolArray(v)) => v.into(),
                (T::String, _, D::StringArray(v)) => v.into(),
                _ => return None,
            };
            match encoded.as_array() {
                Some(items) if !items.is_empty() => Some(encoded),
                _ => None,
            }
        }
        EventShape::Structured => None,
    }
}

impl ClientInner {
    /// Build the envelope for `event_id` and offer it to the outbound queue.
    ///
    /// The message is admitted only when the service is registered (or the
    /// event cache is on), the queue has room and the serialized message is
    /// shorter than the maximum message size. Returns whether it was queued.
    pub(crate) fn publish_event(
        &self,
        event_id: &str,
        priority: Priority,
        data: Option<EventData>,
        correlation_id: Option<&str>,
    ) -> bool {
        let (uuid, data_object) = {
            let description = self.description.read();
            let Some(event) = description.event(event_id) else {
                debug!(event = event_id, "Publish to unknown event dropped");
                return false;
            };
            let data_object = match data {
                Some(data) => match encode(event, data) {
                    Some(value) => Some(value),
                    None => {
                        warn!(
                            event = event_id,
                            ty = %event.primitive_type(),
                            "Payload does not match event type, publish dropped"
                        );
                        return false;
                    }
                },
                None => None,
            };
            (description.descriptor().uuid.clone(), data_object)
        };

        let envelope = EventEnvelope::new(event_id, &uuid, priority, correlation_id, data_object);
        let wire = match envelope.to_wire() {
            Ok(wire) => wire,
            Err(e) => {
                warn!(event = event_id, "Failed to serialize event: {}", e);
                return false;
            }
        };

        let (max_size, cache) = {
            let settings = self.settings.read();
            (settings.max_message_size, settings.event_cache)
        };
        if self.status.get() != ClientStatus::Registered && !cache {
            debug!(event = event_id, status = %self.status.get(), "Not registered, event dropped");
            return false;
        }

        let len = wire.len();
        let queued = self.outgoing.push_if(wire, |w| w.len() < max_size);
        if queued {
            trace!(event = event_id, correlation_id = %envelope.correlation_id, "Event queued");
        } else {
            debug!(
                event = event_id,
                len,
                depth = self.outgoing.len(),
                "Outgoing queue full or message too large, event dropped"
            );
            self.debug_line(format_args!("Event {} dropped by admission control", event_id));
        }
        queued
    }
}
