//! Service self-description: descriptor, registries and the wire serializer

use super::config_param::{ConfigParam, ConfigValue};
use super::event::EventDefinition;
use super::function::{CallContext, FunctionCallback, FunctionDefinition};
use super::types::{PrimitiveFormat, PrimitiveType};
use crate::error::{MsbError, Result};
use crate::registry::Registry;
use serde_json::{json, Map, Value};
use std::fmt;
use tracing::debug;

/// Kind of service announced to the broker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceClass {
    Application,
    SmartObject,
}

impl ServiceClass {
    pub fn as_str(self) -> &'static str {
        match self {
            ServiceClass::Application => "APPLICATION",
            ServiceClass::SmartObject => "SMART_OBJECT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "APPLICATION" => Some(ServiceClass::Application),
            "SMART_OBJECT" => Some(ServiceClass::SmartObject),
            _ => None,
        }
    }
}

impl fmt::Display for ServiceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub uuid: String,
    pub token: String,
    pub class: ServiceClass,
    pub name: String,
    pub description: String,
}

impl ServiceDescriptor {
    pub fn new(
        uuid: impl Into<String>,
        token: impl Into<String>,
        class: ServiceClass,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            uuid: uuid.into(),
            token: token.into(),
            class,
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Partial replacement of a [`ServiceDescriptor`]; unset fields are kept
#[derive(Debug, Clone, Default)]
pub struct DescriptorUpdate {
    pub uuid: Option<String>,
    pub token: Option<String>,
    pub class: Option<ServiceClass>,
    pub name: Option<String>,
    pub description: Option<String>,
}

impl DescriptorUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uuid(mut self, uuid: impl Into<String>) -> Self {
        self.uuid = Some(uuid.into());
        self
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn class(mut self, class: ServiceClass) -> Self {
        self.class = Some(class);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// The service's events, functions and configuration, with reference-id counters
#[derive(Debug)]
pub struct ServiceDescription {
    descriptor: ServiceDescriptor,
    events: Registry<EventDefinition>,
    functions: Registry<FunctionDefinition>,
    params: Registry<ConfigParam>,
    next_event_at_id: u32,
    next_function_at_id: u32,
}

impl ServiceDescription {
    pub fn new(descriptor: ServiceDescriptor) -> Self {
        Self {
            descriptor,
            events: Registry::new(),
            functions: Registry::new(),
            params: Registry::new(),
            next_event_at_id: 0,
            next_function_at_id: 0,
        }
    }

    pub fn descriptor(&self) -> &ServiceDescriptor {
        &self.descriptor
    }

    pub fn update_descriptor(&mut self, update: DescriptorUpdate) {
        let d = &mut self.descriptor;
        if let Some(uuid) = update.uuid {
            d.uuid = uuid;
        }
        if let Some(token) = update.token {
            d.token = token;
        }
        if let Some(class) = update.class {
            d.class = class;
        }
        if let Some(name) = update.name {
            d.name = name;
        }
        if let Some(description) = update.description {
            d.description = description;
        }
    }

    /// Add an event with a primitive payload; returns its `@id`
    pub fn add_event(
        &mut self,
        id: &str,
        name: &str,
        description: &str,
        ty: PrimitiveType,
        format: PrimitiveFormat,
        is_array: bool,
    ) -> Result<u32> {
        let at_id = self.next_event_at_id;
        self.insert_event(EventDefinition::typed(id, name, description, ty, format, is_array, at_id))
    }

    /// Add an event without payload
    pub fn add_empty_event(&mut self, id: &str, name: &str, description: &str) -> Result<u32> {
        let at_id = self.next_event_at_id;
        self.insert_event(EventDefinition::empty(id, name, description, at_id))
    }

    /// Add an event whose data format is a caller-built schema
    pub fn add_complex_event(
        &mut self,
        id: &str,
        name: &str,
        description: &str,
        data_format: Value,
    ) -> Result<u32> {
        let at_id = self.next_event_at_id;
        self.insert_event(EventDefinition::structured(id, name, description, data_format, at_id))
    }

    /// Like [`add_complex_event`](Self::add_complex_event) with the schema as JSON text
    pub fn add_event_from_str(
        &mut self,
        id: &str,
        name: &str,
        description: &str,
        data_format: &str,
    ) -> Result<u32> {
        let schema: Value = serde_json::from_str(data_format)?;
        self.add_complex_event(id, name, description, schema)
    }

    fn insert_event(&mut self, event: EventDefinition) -> Result<u32> {
        let at_id = event.at_id;
        let id = event.id.clone();
        self.events
            .insert(id.clone(), event)
            .map_err(|_| MsbError::DuplicateEntry { kind: "event", id })?;
        self.next_event_at_id += 1;
        Ok(at_id)
    }

    /// Remove an event and drop it from every function's response events
    pub fn remove_event(&mut self, id: &str) -> bool {
        let Some(event) = self.events.remove(id) else {
            return false;
        };
        for function in self.functions.values_mut() {
            if function.remove_response_event(event.at_id) {
                debug!(event = id, function = %function.id, "Unlinked removed response event");
            }
        }
        true
    }

    pub fn event(&self, id: &str) -> Option<&EventDefinition> {
        self.events.get(id)
    }

    pub fn events(&self) -> impl Iterator<Item = &EventDefinition> {
        self.events.values()
    }

    /// Add a function taking a primitive parameter; returns its `@id`
    #[allow(clippy::too_many_arguments)]
    pub fn add_function(
        &mut self,
        id: &str,
        name: &str,
        description: &str,
        ty: PrimitiveType,
        format: PrimitiveFormat,
        is_array: bool,
        callback: FunctionCallback,
        context: Option<CallContext>,
    ) -> Result<u32> {
        let at_id = self.next_function_at_id;
        self.insert_function(FunctionDefinition::typed(
            id,
            name,
            description,
            ty,
            format,
            is_array,
            callback,
            context,
            at_id,
        ))
    }

    /// Add a function without parameters
    pub fn add_empty_function(
        &mut self,
        id: &str,
        name: &str,
        description: &str,
        callback: FunctionCallback,
        context: Option<CallContext>,
    ) -> Result<u32> {
        let at_id = self.next_function_at_id;
        self.insert_function(FunctionDefinition::empty(id, name, description, callback, context, at_id))
    }

    /// Add a function whose data format is a caller-built schema
    pub fn add_complex_function(
        &mut self,
        id: &str,
        name: &str,
        description: &str,
        data_format: Value,
        callback: FunctionCallback,
        context: Option<CallContext>,
    ) -> Result<u32> {
        let at_id = self.next_function_at_id;
        self.insert_function(FunctionDefinition::structured(
            id,
            name,
            description,
            data_format,
            callback,
            context,
            at_id,
        ))
    }

    /// Like [`add_complex_function`](Self::add_complex_function) with the schema as JSON text
    pub fn add_function_from_str(
        &mut self,
        id: &str,
        name: &str,
        description: &str,
        data_format: &str,
        callback: FunctionCallback,
        context: Option<CallContext>,
    ) -> Result<u32> {
        let schema: Value = serde_json::from_str(data_format)?;
        self.add_complex_function(id, name, description, schema, callback, context)
    }

    fn insert_function(&mut self, function: FunctionDefinition) -> Result<u32> {
        let at_id = function.at_id;
        let id = function.id.clone();
        self.functions
            .insert(id.clone(), function)
            .map_err(|_| MsbError::DuplicateEntry { kind: "function", id })?;
        self.next_function_at_id += 1;
        Ok(at_id)
    }

    pub fn remove_function(&mut self, id: &str) -> bool {
        self.functions.remove(id).is_some()
    }

    pub fn function(&self, id: &str) -> Option<&FunctionDefinition> {
        self.functions.get(id)
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionDefinition> {
        self.functions.values()
    }

    /// Callback and context of a function, cloned out so the caller can
    /// release the registry before invoking it
    pub(crate) fn function_handler(&self, id: &str) -> Option<(FunctionCallback, Option<CallContext>)> {
        self.functions
            .get(id)
            .map(|f| (f.callback.clone(), f.context.clone()))
    }

    /// Declare `event_id` as a response event of `function_id`
    pub fn add_response_event(&mut self, function_id: &str, event_id: &str) -> Result<()> {
        let event_at_id = self.event_at_id(event_id)?;
        self.function_mut(function_id)?.add_response_event(event_at_id);
        Ok(())
    }

    /// Returns whether the link existed
    pub fn remove_response_event(&mut self, function_id: &str, event_id: &str) -> Result<bool> {
        let event_at_id = self.event_at_id(event_id)?;
        Ok(self.function_mut(function_id)?.remove_response_event(event_at_id))
    }

    fn event_at_id(&self, event_id: &str) -> Result<u32> {
        self.events
            .get(event_id)
            .map(|e| e.at_id)
            .ok_or_else(|| MsbError::UnknownEntry {
                kind: "event",
                id: event_id.to_string(),
            })
    }

    fn function_mut(&mut self, function_id: &str) -> Result<&mut FunctionDefinition> {
        self.functions
            .get_mut(function_id)
            .ok_or_else(|| MsbError::UnknownEntry {
                kind: "function",
                id: function_id.to_string(),
            })
    }

    /// Add a configuration parameter bound to `value`
    pub fn add_config_param(&mut self, name: &str, value: ConfigValue) -> Result<()> {
        self.insert_param(ConfigParam::new(name, value))
    }

    /// Add a configuration parameter from its structured form
    /// (`Name`, `PrimitiveType`, `PrimitiveFormat`, `value`)
    pub fn add_config_param_from_object(&mut self, object: &Value) -> Result<()> {
        let param = ConfigParam::from_object(object).ok_or_else(|| {
            let name = object.get("Name").and_then(Value::as_str).unwrap_or("<unnamed>");
            MsbError::TypeMismatch(name.to_string())
        })?;
        self.insert_param(param)
    }

    pub fn add_config_param_from_str(&mut self, text: &str) -> Result<()> {
        let object: Value = serde_json::from_str(text)?;
        self.add_config_param_from_object(&object)
    }

    fn insert_param(&mut self, param: ConfigParam) -> Result<()> {
        let name = param.name.clone();
        self.params
            .insert(name.clone(), param)
            .map_err(|_| MsbError::DuplicateEntry {
                kind: "configuration parameter",
                id: name,
            })
    }

    pub fn remove_config_param(&mut self, name: &str) -> bool {
        self.params.remove(name).is_some()
    }

    pub fn config_param(&self, name: &str) -> Option<&ConfigParam> {
        self.params.get(name)
    }

    pub fn config_params(&self) -> impl Iterator<Item = &ConfigParam> {
        self.params.values()
    }

    /// Point an existing parameter at new storage of the same kind
    pub fn change_config_param_value(&mut self, name: &str, value: ConfigValue) -> Result<()> {
        let param = self.params.get_mut(name).ok_or_else(|| MsbError::UnknownEntry {
            kind: "configuration parameter",
            id: name.to_string(),
        })?;
        let expected = param.primitive_type();
        if !param.rebind(value) {
            return Err(MsbError::TypeMismatch(format!("{} (holds {})", name, expected)));
        }
        Ok(())
    }

    /// Apply the `parameters` object of a configuration-change message.
    ///
    /// Scanning stops at the first parameter name known to the registry,
    /// whether or not its value could be written. Returns that name.
    pub(crate) fn apply_config_change(&mut self, parameters: &Value) -> Option<String> {
        let changes = parameters.as_object()?;
        for (name, change) in changes {
            if let Some(param) = self.params.get_mut(name) {
                let written = param.apply_change(change);
                debug!(param = %name, written, "Configuration change");
                return Some(name.clone());
            }
        }
        None
    }

    /// The self-description sent with the registration message
    pub fn to_json(&self) -> Value {
        let functions: Vec<Value> = self
            .functions
            .values()
            .map(|f| {
                let mut entry = Map::new();
                entry.insert("@id".into(), f.at_id.into());
                entry.insert("functionId".into(), f.id.as_str().into());
                entry.insert("name".into(), f.name.as_str().into());
                insert_description(&mut entry, &f.description);
                entry.insert("dataFormat".into(), f.data_format.clone());
                entry.insert("responseEvents".into(), json!(f.response_events));
                Value::Object(entry)
            })
            .collect();

        let events: Vec<Value> = self
            .events
            .values()
            .map(|e| {
                let mut entry = Map::new();
                entry.insert("@id".into(), e.at_id.into());
                entry.insert("eventId".into(), e.id.as_str().into());
                entry.insert("name".into(), e.name.as_str().into());
                insert_description(&mut entry, &e.description);
                entry.insert("dataFormat".into(), e.data_format.clone());
                Value::Object(entry)
            })
            .collect();

        let mut parameters = Map::new();
        for param in self.params.values() {
            let mut entry = Map::new();
            entry.insert("type".into(), Value::from(param.primitive_type().wire_name()));
            entry.insert("value".into(), param.value.to_json());
            if let Some(format) = param.format().wire_name() {
                entry.insert("format".into(), Value::from(format));
            }
            parameters.insert(param.name.clone(), Value::Object(entry));
        }

        json!({
            "uuid": self.descriptor.uuid,
            "token": self.descriptor.token,
            "name": self.descriptor.name,
            "@class": self.descriptor.class.as_str(),
            "description": self.descriptor.description,
            "functions": functions,
            "events": events,
            "configuration": { "parameters": parameters },
        })
    }
}

/// Events and functions without a description leave the key out
fn insert_description(entry: &mut Map<String, Value>, description: &str) {
    if !description.is_empty() {
        entry.insert("description".into(), description.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::description::config_param::binding;
    use std::sync::Arc;

    fn service() -> ServiceDescription {
        ServiceDescription::new(ServiceDescriptor::new(
            "76499a2e-1b4a-4bb4-9e7d-8f3a9d7a3a11",
            "token-1",
            ServiceClass::SmartObject,
            "Test Service",
            "Service under test",
        ))
    }

    fn noop() -> FunctionCallback {
        Arc::new(|_, _, _| {})
    }

    #[test]
    fn test_at_ids_follow_insertion_order() {
        let mut s = service();
        assert_eq!(s.add_empty_event("E0", "Event0", "d").unwrap(), 0);
        assert_eq!(
            s.add_event("E1", "Event1", "d", PrimitiveType::Integer, PrimitiveFormat::Int32, false)
                .unwrap(),
            1
        );
        assert_eq!(s.add_complex_event("E2", "Event2", "d", json!({"x": 1})).unwrap(), 2);
        assert_eq!(s.add_empty_function("F0", "Function0", "d", noop(), None).unwrap(), 0);

        let desc = s.to_json();
        let ids: Vec<&str> = desc["events"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["eventId"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["E0", "E1", "E2"]);
        for (i, e) in desc["events"].as_array().unwrap().iter().enumerate() {
            assert_eq!(e["@id"], json!(i));
        }
        assert_eq!(desc["functions"][0]["@id"], json!(0));
    }

    #[test]
    fn test_duplicate_does_not_consume_at_id() {
        let mut s = service();
        s.add_empty_event("E0", "Event0", "d").unwrap();

        let err = s.add_empty_event("E0", "Again", "d").unwrap_err();
        assert!(matches!(err, MsbError::DuplicateEntry { kind: "event", .. }));
        assert_eq!(s.add_empty_event("E1", "Event1", "d").unwrap(), 1);
    }

    #[test]
    fn test_at_ids_are_not_reused_after_removal() {
        let mut s = service();
        s.add_empty_event("E0", "Event0", "d").unwrap();
        assert!(s.remove_event("E0"));
        assert!(!s.remove_event("E0"));
        assert_eq!(s.add_empty_event("E0", "Event0", "d").unwrap(), 1);
    }

    #[test]
    fn test_response_event_linkage_round_trip() {
        let mut s = service();
        s.add_empty_event("E0", "Event0", "d").unwrap();
        s.add_empty_event("E1", "Event1", "d").unwrap();
        s.add_empty_function("F0", "Function0", "d", noop(), None).unwrap();

        s.add_response_event("F0", "E1").unwrap();
        assert_eq!(s.to_json()["functions"][0]["responseEvents"], json!([1]));

        assert!(s.remove_event("E1"));
        assert!(s.event("E1").is_none());
        assert_eq!(s.to_json()["functions"][0]["responseEvents"], json!([]));
    }

    #[test]
    fn test_linkage_requires_known_entries() {
        let mut s = service();
        s.add_empty_event("E0", "Event0", "d").unwrap();

        assert!(matches!(
            s.add_response_event("F9", "E0"),
            Err(MsbError::UnknownEntry { kind: "function", .. })
        ));
        s.add_empty_function("F0", "Function0", "d", noop(), None).unwrap();
        assert!(matches!(
            s.add_response_event("F0", "E9"),
            Err(MsbError::UnknownEntry { kind: "event", .. })
        ));
        assert!(!s.remove_response_event("F0", "E0").unwrap());
    }

    #[test]
    fn test_schema_from_str() {
        let mut s = service();
        s.add_event_from_str("E0", "Event0", "d", r#"{"dataObject":{"type":"string"}}"#)
            .unwrap();
        assert_eq!(
            s.event("E0").unwrap().data_format(),
            &json!({"dataObject": {"type": "string"}})
        );

        let err = s.add_function_from_str("F0", "Function0", "d", "{not json", noop(), None);
        assert!(matches!(err, Err(MsbError::InvalidSchema(_))));
        assert!(s.function("F0").is_none());
    }

    #[test]
    fn test_self_description_layout() {
        let mut s = service();
        s.add_event("E0", "Event0", "first", PrimitiveType::Number, PrimitiveFormat::Float, false)
            .unwrap();
        s.add_function("F0", "Function0", "call", PrimitiveType::String, PrimitiveFormat::None, false, noop(), None)
            .unwrap();
        s.add_config_param("p1", ConfigValue::Int32(binding(3))).unwrap();
        s.add_config_param("p2", ConfigValue::String("abc".into())).unwrap();
        s.add_config_param("p3", ConfigValue::Bool(binding(true))).unwrap();

        let desc = s.to_json();
        let keys: Vec<&str> = desc.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec!["uuid", "token", "name", "@class", "description", "functions", "events", "configuration"]
        );
        assert_eq!(desc["@class"], json!("SMART_OBJECT"));
        assert_eq!(
            desc["functions"][0],
            json!({
                "@id": 0,
                "functionId": "F0",
                "name": "Function0",
                "description": "call",
                "dataFormat": {"dataObject": {"type": "string"}},
                "responseEvents": []
            })
        );
        assert_eq!(
            desc["configuration"]["parameters"],
            json!({
                "p1": {"type": "INTEGER", "value": 3, "format": "INT32"},
                "p2": {"type": "STRING", "value": "abc"},
                "p3": {"type": "BOOLEAN", "value": true}
            })
        );
        let params: Vec<&str> = desc["configuration"]["parameters"]
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(params, vec!["p1", "p2", "p3"]);
    }

    #[test]
    fn test_empty_descriptions_are_omitted() {
        let mut s = service();
        s.add_empty_event("E0", "Event0", "").unwrap();
        s.add_empty_function("F0", "Function0", "", noop(), None).unwrap();

        let desc = s.to_json();
        let event_keys: Vec<&str> = desc["events"][0].as_object().unwrap().keys().map(String::as_str).collect();
        let function_keys: Vec<&str> = desc["functions"][0]
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();

        assert_eq!(event_keys, vec!["@id", "eventId", "name", "dataFormat"]);
        assert_eq!(function_keys, vec!["@id", "functionId", "name", "dataFormat", "responseEvents"]);
        assert_eq!(desc["description"], json!("Service under test"));
    }

    #[test]
    fn test_config_change_applies_first_known_param_only() {
        let mut s = service();
        let a = binding(1i32);
        let b = binding(2i32);
        s.add_config_param("a", ConfigValue::Int32(a.clone())).unwrap();
        s.add_config_param("b", ConfigValue::Int32(b.clone())).unwrap();

        let applied = s.apply_config_change(&json!({
            "unknown": {"type": "INTEGER", "format": "INT32", "value": 0},
            "a": {"type": "INTEGER", "format": "INT32", "value": 10},
            "b": {"type": "INTEGER", "format": "INT32", "value": 20}
        }));

        assert_eq!(applied.as_deref(), Some("a"));
        assert_eq!(*a.read(), 10);
        assert_eq!(*b.read(), 2);
    }

    #[test]
    fn test_change_config_param_value() {
        let mut s = service();
        s.add_config_param("p1", ConfigValue::Int64(binding(1))).unwrap();

        s.change_config_param_value("p1", ConfigValue::Int64(binding(99))).unwrap();
        assert_eq!(s.config_param("p1").unwrap().value().to_json(), json!(99));

        assert!(matches!(
            s.change_config_param_value("p1", ConfigValue::Double(binding(1.0))),
            Err(MsbError::TypeMismatch(_))
        ));
        assert!(matches!(
            s.change_config_param_value("nope", ConfigValue::Int64(binding(1))),
            Err(MsbError::UnknownEntry { .. })
        ));
    }

    #[test]
    fn test_config_param_from_str() {
        let mut s = service();
        s.add_config_param_from_str(
            r#"{"Name":"enabled","PrimitiveType":"MSB_BOOL","PrimitiveFormat":"MSB_NONE","value":false}"#,
        )
        .unwrap();
        assert_eq!(
            s.config_param("enabled").unwrap().primitive_type(),
            PrimitiveType::Bool
        );
        assert!(s.remove_config_param("enabled"));
        assert!(!s.remove_config_param("enabled"));
    }

    #[test]
    fn test_update_descriptor_keeps_unset_fields() {
        let mut s = service();
        s.update_descriptor(DescriptorUpdate::new().name("Renamed").class(ServiceClass::Application));

        let d = s.descriptor();
        assert_eq!(d.name, "Renamed");
        assert_eq!(d.class, ServiceClass::Application);
        assert_eq!(d.token, "token-1");
    }
}
