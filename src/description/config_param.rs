//! Configuration parameters bound to caller-owned storage
//!
//! A parameter does not copy its value: it holds a [`Binding`] the caller also
//! keeps, so a configuration change from the broker is visible to the caller
//! immediately. Strings are the exception and are owned by the registry.

use super::types::{PrimitiveFormat, PrimitiveType};
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;

/// Shared storage cell for a configuration value
pub type Binding<T> = Arc<RwLock<T>>;

/// Create a new storage cell to bind a configuration parameter to
pub fn binding<T>(value: T) -> Binding<T> {
    Arc::new(RwLock::new(value))
}

/// The active value reference of a configuration parameter
#[derive(Debug, Clone)]
pub enum ConfigValue {
    Bool(Binding<bool>),
    Int32(Binding<i32>),
    Int64(Binding<i64>),
    Float(Binding<f32>),
    Double(Binding<f64>),
    /// Owned by the registry, replaced wholesale on every change
    String(String),
}

impl ConfigValue {
    pub fn primitive_type(&self) -> PrimitiveType {
        match self {
            ConfigValue::Bool(_) => PrimitiveType::Bool,
            ConfigValue::Int32(_) | ConfigValue::Int64(_) => PrimitiveType::Integer,
            ConfigValue::Float(_) | ConfigValue::Double(_) => PrimitiveType::Number,
            ConfigValue::String(_) => PrimitiveType::String,
        }
    }

    pub fn format(&self) -> PrimitiveFormat {
        match self {
            ConfigValue::Int32(_) => PrimitiveFormat::Int32,
            ConfigValue::Int64(_) => PrimitiveFormat::Int64,
            ConfigValue::Float(_) => PrimitiveFormat::Float,
            ConfigValue::Double(_) => PrimitiveFormat::Double,
            ConfigValue::Bool(_) | ConfigValue::String(_) => PrimitiveFormat::None,
        }
    }

    /// Current value as it appears in the self-description
    pub fn to_json(&self) -> Value {
        match self {
            ConfigValue::Bool(b) => Value::from(*b.read()),
            ConfigValue::Int32(i) => Value::from(*i.read()),
            ConfigValue::Int64(i) => Value::from(*i.read()),
            ConfigValue::Float(f) => Value::from(*f.read() as f64),
            ConfigValue::Double(d) => Value::from(*d.read()),
            ConfigValue::String(s) => Value::from(s.as_str()),
        }
    }

    fn same_kind(&self, other: &ConfigValue) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// One configuration parameter of the service
#[derive(Debug, Clone)]
pub struct ConfigParam {
    pub(crate) name: String,
    pub(crate) value: ConfigValue,
}

impl ConfigParam {
    pub(crate) fn new(name: &str, value: ConfigValue) -> Self {
        Self {
            name: name.to_string(),
            value,
        }
    }

    /// Build a parameter from the structured input form
    /// `{"Name", "PrimitiveType": "MSB_*", "PrimitiveFormat": "MSB_*", "value"}`,
    /// allocating fresh storage for the value.
    pub(crate) fn from_object(object: &Value) -> Option<Self> {
        let name = object.get("Name")?.as_str()?;
        let ty = PrimitiveType::from_msb_name(object.get("PrimitiveType")?.as_str()?)?;
        let format = object
            .get("PrimitiveFormat")
            .and_then(Value::as_str)
            .and_then(PrimitiveFormat::from_msb_name)
            .unwrap_or(PrimitiveFormat::None);
        let raw = object.get("value")?;

        let value = match (ty, format) {
            (PrimitiveType::Integer, PrimitiveFormat::Int32) => {
                ConfigValue::Int32(binding(json_i32(raw)?))
            }
            (PrimitiveType::Integer, PrimitiveFormat::Int64) => {
                ConfigValue::Int64(binding(json_i64(raw)?))
            }
            (PrimitiveType::Number, PrimitiveFormat::Float) => {
                ConfigValue::Float(binding(json_f64(raw)? as f32))
            }
            (PrimitiveType::Number, PrimitiveFormat::Double) => {
                ConfigValue::Double(binding(json_f64(raw)?))
            }
            (PrimitiveType::String, PrimitiveFormat::None) => {
                ConfigValue::String(json_string(raw))
            }
            (PrimitiveType::Bool, PrimitiveFormat::None) => ConfigValue::Bool(binding(json_bool(raw)?)),
            _ => return None,
        };

        Some(Self::new(name, value))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &ConfigValue {
        &self.value
    }

    pub fn primitive_type(&self) -> PrimitiveType {
        self.value.primitive_type()
    }

    pub fn format(&self) -> PrimitiveFormat {
        self.value.format()
    }

    /// Point the parameter at different storage of the same kind
    pub(crate) fn rebind(&mut self, value: ConfigValue) -> bool {
        if !self.value.same_kind(&value) {
            return false;
        }
        self.value = value;
        true
    }

    /// Apply one `{type, format?, value}` entry of a configuration-change
    /// message, writing through the bound storage. Returns whether a value was
    /// written.
    pub(crate) fn apply_change(&mut self, change: &Value) -> bool {
        let (Some(ty), Some(raw)) = (change.get("type").and_then(Value::as_str), change.get("value")) else {
            return false;
        };
        let format = change.get("format").and_then(Value::as_str);

        match (ty, format, &mut self.value) {
            ("BOOLEAN", _, ConfigValue::Bool(cell)) => write_cell(cell, json_bool(raw)),
            ("STRING", _, ConfigValue::String(owned)) => {
                *owned = json_string(raw);
                true
            }
            ("INTEGER", Some("INT32"), ConfigValue::Int32(cell)) => write_cell(cell, json_i32(raw)),
            ("INTEGER", Some("INT64"), ConfigValue::Int64(cell)) => write_cell(cell, json_i64(raw)),
            ("NUMBER", Some("FLOAT"), ConfigValue::Float(cell)) => {
                write_cell(cell, json_f64(raw).map(|v| v as f32))
            }
            ("NUMBER", Some("DOUBLE"), ConfigValue::Double(cell)) => write_cell(cell, json_f64(raw)),
            _ => false,
        }
    }
}

fn write_cell<T>(cell: &Binding<T>, value: Option<T>) -> bool {
    match value {
        Some(v) => {
            *cell.write() = v;
            true
        }
        None => false,
    }
}

fn json_bool(raw: &Value) -> Option<bool> {
    match raw {
        Value::Bool(b) => Some(*b),
        Value::String(s) => Some(s.eq_ignore_ascii_case("true")),
        Value::Number(n) => n.as_i64().map(|i| i != 0),
        _ => None,
    }
}

fn json_i64(raw: &Value) -> Option<i64> {
    match raw {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn json_i32(raw: &Value) -> Option<i32> {
    json_i64(raw).map(|v| v.clamp(i32::MIN as i64, i32::MAX as i64) as i32)
}

fn json_f64(raw: &Value) -> Option<f64> {
    match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn json_string(raw: &Value) -> String {
    match raw {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
