//! Primitive data types and formats used in data-format schemas

use serde_json::{json, Map, Value};
use std::fmt;

/// Primitive data type of an event, function or configuration parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Integer,
    Number,
    String,
    Bool,
    Array,
}

impl PrimitiveType {
    /// Lower-case name used inside data-format schemas
    pub fn schema_name(self) -> &'static str {
        match self {
            PrimitiveType::Integer => "integer",
            PrimitiveType::Number => "number",
            PrimitiveType::String => "string",
            PrimitiveType::Bool => "boolean",
            PrimitiveType::Array => "array",
        }
    }

    /// Upper-case name used in the configuration section and in `K` messages
    pub fn wire_name(self) -> &'static str {
        match self {
            PrimitiveType::Integer => "INTEGER",
            PrimitiveType::Number => "NUMBER",
            PrimitiveType::String => "STRING",
            PrimitiveType::Bool => "BOOLEAN",
            PrimitiveType::Array => "ARRAY",
        }
    }

    /// Parse the `MSB_*` names used by structured configuration-parameter input
    pub fn from_msb_name(name: &str) -> Option<Self> {
        match name {
            "MSB_INTEGER" => Some(PrimitiveType::Integer),
            "MSB_NUMBER" => Some(PrimitiveType::Number),
            "MSB_STRING" => Some(PrimitiveType::String),
            "MSB_BOOL" => Some(PrimitiveType::Bool),
            "MSB_ARRAY" => Some(PrimitiveType::Array),
            _ => None,
        }
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Primitive data format refining a [`PrimitiveType`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveFormat {
    Int32,
    Int64,
    Float,
    Double,
    Byte,
    Date,
    DateTime,
    None,
}

impl PrimitiveFormat {
    /// Lower-case schema name, `None` for [`PrimitiveFormat::None`]
    pub fn schema_name(self) -> Option<&'static str> {
        match self {
            PrimitiveFormat::Int32 => Some("int32"),
            PrimitiveFormat::Int64 => Some("int64"),
            PrimitiveFormat::Float => Some("float"),
            PrimitiveFormat::Double => Some("double"),
            PrimitiveFormat::Byte => Some("byte"),
            PrimitiveFormat::Date => Some("date"),
            PrimitiveFormat::DateTime => Some("date-time"),
            PrimitiveFormat::None => None,
        }
    }

    /// Upper-case wire name, `None` for [`PrimitiveFormat::None`]
    pub fn wire_name(self) -> Option<&'static str> {
        match self {
            PrimitiveFormat::Int32 => Some("INT32"),
            PrimitiveFormat::Int64 => Some("INT64"),
            PrimitiveFormat::Float => Some("FLOAT"),
            PrimitiveFormat::Double => Some("DOUBLE"),
            PrimitiveFormat::Byte => Some("BYTE"),
            PrimitiveFormat::Date => Some("DATE"),
            PrimitiveFormat::DateTime => Some("DATE-TIME"),
            PrimitiveFormat::None => None,
        }
    }

    pub fn from_msb_name(name: &str) -> Option<Self> {
        match name {
            "MSB_INT32" => Some(PrimitiveFormat::Int32),
            "MSB_INT64" => Some(PrimitiveFormat::Int64),
            "MSB_FLOAT" => Some(PrimitiveFormat::Float),
            "MSB_DOUBLE" => Some(PrimitiveFormat::Double),
            "MSB_BYTE" => Some(PrimitiveFormat::Byte),
            "MSB_DATE" => Some(PrimitiveFormat::Date),
            "MSB_DATE_TIME" => Some(PrimitiveFormat::DateTime),
            "MSB_NONE" => Some(PrimitiveFormat::None),
            _ => None,
        }
    }
}

/// `{"type": .., "format"?: ..}` for one primitive
pub(crate) fn primitive_schema(ty: PrimitiveType, format: PrimitiveFormat) -> Value {
    let mut obj = Map::new();
    obj.insert("type".to_string(), Value::from(ty.schema_name()));
    if let Some(f) = format.schema_name() {
        obj.insert("format".to_string(), Value::from(f));
    }
    Value::Object(obj)
}

/// `{"type": "array", "items": {..}}`
pub(crate) fn array_schema(item: PrimitiveType, format: PrimitiveFormat) -> Value {
    json!({
        "type": "array",
        "items": primitive_schema(item, format),
    })
}

/// Wrap a schema under the `dataObject` key
pub(crate) fn data_object_schema(inner: Value) -> Value {
    json!({ "dataObject": inner })
}
