//! Resource schemas and mutation validation.
//!
//! Every mutation is checked against its resource schema before it is
//! queued, so malformed payloads never reach durable storage.

use crate::{error::Result, Error, Mutation, OperationKind, RecordKey, ResourceName};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default name of the field that identifies a record.
pub const DEFAULT_KEY_FIELD: &str = "id";

/// Field types supported in schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Int,
    Float,
    Bool,
    Timestamp,
    /// Arbitrary nested JSON
    Json,
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldType::String => write!(f, "String"),
            FieldType::Int => write!(f, "Int"),
            FieldType::Float => write!(f, "Float"),
            FieldType::Bool => write!(f, "Bool"),
            FieldType::Timestamp => write!(f, "Timestamp"),
            FieldType::Json => write!(f, "Json"),
        }
    }
}

/// Definition of a field in a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDef {
    /// Field name
    pub name: String,
    /// Field type
    pub field_type: FieldType,
    /// Whether inserts must provide this field
    pub required: bool,
}

impl FieldDef {
    /// Create a new required field definition.
    pub fn required(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: true,
        }
    }

    /// Create a new optional field definition.
    pub fn optional(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
        }
    }

    /// Validate a JSON value against this field definition.
    ///
    /// With `enforce_required` unset (partial updates), absent fields pass.
    pub fn validate(&self, value: Option<&serde_json::Value>, enforce_required: bool) -> Result<()> {
        let required = self.required && enforce_required;
        match value {
            None if required => Err(Error::MissingRequiredField(self.name.clone())),
            None => Ok(()),
            Some(serde_json::Value::Null) if self.required => {
                Err(Error::MissingRequiredField(self.name.clone()))
            }
            Some(serde_json::Value::Null) => Ok(()),
            Some(v) => self.validate_type(v),
        }
    }

    fn validate_type(&self, value: &serde_json::Value) -> Result<()> {
        let valid = match self.field_type {
            FieldType::String => value.is_string(),
            FieldType::Int => value.is_i64() || value.is_u64(),
            FieldType::Float => value.is_f64() || value.is_i64() || value.is_u64(),
            FieldType::Bool => value.is_boolean(),
            // Epoch millis or an RFC 3339 string
            FieldType::Timestamp => value.is_u64() || value.is_i64() || value.is_string(),
            FieldType::Json => true,
        };

        if valid {
            Ok(())
        } else {
            Err(Error::TypeMismatch {
                field: self.name.clone(),
                expected: self.field_type.to_string(),
                got: json_type_name(value).to_string(),
            })
        }
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "Null",
        serde_json::Value::Bool(_) => "Bool",
        serde_json::Value::Number(n) if n.is_i64() || n.is_u64() => "Int",
        serde_json::Value::Number(_) => "Float",
        serde_json::Value::String(_) => "String",
        serde_json::Value::Array(_) => "Array",
        serde_json::Value::Object(_) => "Object",
    }
}

/// Schema for a single resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSchema {
    /// Resource name
    pub name: ResourceName,
    /// Field holding the record key
    pub key_field: String,
    /// Field definitions
    pub fields: Vec<FieldDef>,
}

impl ResourceSchema {
    /// Create a resource schema keyed by [`DEFAULT_KEY_FIELD`].
    pub fn new(name: impl Into<ResourceName>, fields: Vec<FieldDef>) -> Self {
        Self {
            name: name.into(),
            key_field: DEFAULT_KEY_FIELD.to_string(),
            fields,
        }
    }

    /// Use a different key field.
    pub fn with_key_field(mut self, key_field: impl Into<String>) -> Self {
        self.key_field = key_field.into();
        self
    }

    /// Validate the field values of a payload.
    pub fn validate_payload(&self, payload: &serde_json::Value, enforce_required: bool) -> Result<()> {
        let obj = payload
            .as_object()
            .ok_or_else(|| Error::InvalidPayload("payload must be an object".into()))?;

        for field in &self.fields {
            field.validate(obj.get(&field.name), enforce_required)?;
        }

        Ok(())
    }

    /// Extract the record key from a payload.
    ///
    /// Returns `Ok(None)` when the key field is absent or null, and an error
    /// when it holds something other than a non-empty string or an integer.
    pub fn extract_key(&self, payload: &serde_json::Value) -> Result<Option<RecordKey>> {
        let value = match payload.get(&self.key_field) {
            None | Some(serde_json::Value::Null) => return Ok(None),
            Some(v) => v,
        };

        match value {
            // Dot segments would be collapsed out of a record URL.
            serde_json::Value::String(s) if matches!(s.as_str(), "." | "..") => {
                Err(Error::InvalidPayload(format!("record key '{s}' is not allowed")))
            }
            serde_json::Value::String(s) if !s.trim().is_empty() => Ok(Some(RecordKey::new(s.as_str()))),
            serde_json::Value::Number(n) if n.is_i64() || n.is_u64() => {
                Ok(Some(RecordKey::new(n.to_string())))
            }
            other => Err(Error::TypeMismatch {
                field: self.key_field.clone(),
                expected: "record key".into(),
                got: json_type_name(other).to_string(),
            }),
        }
    }

    /// Validate a raw payload and turn it into a typed [`Mutation`].
    pub fn build_mutation(&self, kind: OperationKind, payload: serde_json::Value) -> Result<Mutation> {
        if !payload.is_object() {
            return Err(Error::InvalidPayload("payload must be an object".into()));
        }

        let key = self.extract_key(&payload)?;
        let require_key = || {
            key.clone().ok_or_else(|| Error::MissingKey {
                resource: self.name.clone(),
                field: self.key_field.clone(),
            })
        };

        match kind {
            OperationKind::Insert => {
                self.validate_payload(&payload, true)?;
                Ok(Mutation::Insert { key, payload })
            }
            OperationKind::Update => {
                let key = require_key()?;
                self.validate_payload(&payload, false)?;
                Ok(Mutation::Update { key, payload })
            }
            OperationKind::Delete => Ok(Mutation::Delete { key: require_key()? }),
        }
    }
}

/// Schema for every resource the queue accepts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    /// Resource schemas by name
    pub resources: HashMap<ResourceName, ResourceSchema>,
}

impl Schema {
    /// Create an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource to the schema.
    pub fn add_resource(&mut self, resource: ResourceSchema) -> &mut Self {
        self.resources.insert(resource.name.clone(), resource);
        self
    }

    /// Builder-style method to add a resource.
    pub fn with_resource(mut self, resource: ResourceSchema) -> Self {
        self.add_resource(resource);
        self
    }

    /// Get a resource schema by name.
    pub fn get_resource(&self, name: &str) -> Option<&ResourceSchema> {
        self.resources.get(name)
    }

    /// Validate a mutation request against the schema.
    pub fn build_mutation(
        &self,
        resource: &str,
        kind: OperationKind,
        payload: serde_json::Value,
    ) -> Result<Mutation> {
        self.resources
            .get(resource)
            .ok_or_else(|| Error::UnknownResource(resource.to_string()))?
            .build_mutation(kind, payload)
    }
}
