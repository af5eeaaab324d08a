//! Recursive argument schema: declares defaults and constraints for a tool's
//! input, fills unspecified fields before a handler runs, and projects to
//! JSON Schema for `tools/list`.

use crate::errors::FieldErrors;
use serde_json::{Map, Value};

#[derive(Debug, Clone)]
pub enum ArgumentSchema {
    String { default: Option<String>, enum_values: Option<Vec<String>> },
    Number { default: Option<f64>, minimum: Option<f64>, maximum: Option<f64> },
    Integer { default: Option<i64>, minimum: Option<i64>, maximum: Option<i64> },
    Boolean { default: Option<bool> },
    Array { items: Box<ArgumentSchema>, default: Option<Value> },
    Object { fields: Vec<FieldSpec> },
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub schema: ArgumentSchema,
    pub required: bool,
}

impl ArgumentSchema {
    pub fn string(default: Option<&str>) -> Self {
        Self::String { default: default.map(str::to_string), enum_values: None }
    }

    pub fn string_enum(default: &str, values: &[&str]) -> Self {
        Self::String {
            default: Some(default.to_string()),
            enum_values: Some(values.iter().map(|s| s.to_string()).collect()),
        }
    }

    pub fn number(default: Option<f64>) -> Self {
        Self::Number { default, minimum: None, maximum: None }
    }

    pub fn number_range(default: Option<f64>, minimum: f64, maximum: f64) -> Self {
        Self::Number { default, minimum: Some(minimum), maximum: Some(maximum) }
    }

    pub fn integer(default: Option<i64>) -> Self {
        Self::Integer { default, minimum: None, maximum: None }
    }

    pub fn integer_range(default: Option<i64>, minimum: i64, maximum: i64) -> Self {
        Self::Integer { default, minimum: Some(minimum), maximum: Some(maximum) }
    }

    pub fn boolean(default: Option<bool>) -> Self {
        Self::Boolean { default }
    }

    pub fn string_array(default: Option<Value>) -> Self {
        Self::Array { items: Box::new(Self::string(None)), default }
    }

    pub fn object(fields: Vec<FieldSpec>) -> Self {
        Self::Object { fields }
    }

    /// Fills `value` in place with declared defaults for any field left
    /// unspecified, then validates types and constraints. Every failing
    /// field is recorded under `path` rather than aborting at the first
    /// error, so the caller sees the complete list of problems at once.
    pub fn validate_and_fill(&self, value: &mut Value, path: &str, errors: &mut FieldErrors) {
        match self {
            Self::String { default, enum_values } => {
                if value.is_null() {
                    if let Some(d) = default {
                        *value = Value::String(d.clone());
                    }
                }
                match value.as_str() {
                    Some(s) => {
                        if let Some(allowed) = enum_values {
                            if !allowed.iter().any(|a| a == s) {
                                errors.0.push((path.to_string(), format!("must be one of {allowed:?}")));
                            }
                        }
                    }
                    None => errors.0.push((path.to_string(), "must be a string".to_string())),
                }
            }
            Self::Number { default, minimum, maximum } => {
                if value.is_null() {
                    if let Some(d) = default {
                        *value = Value::from(*d);
                    }
                }
                match value.as_f64() {
                    Some(n) => {
                        if let Some(min) = minimum {
                            if n < *min {
                                errors.0.push((path.to_string(), format!("must be >= {min}")));
                            }
                        }
                        if let Some(max) = maximum {
                            if n > *max {
                                errors.0.push((path.to_string(), format!("must be <= {max}")));
                            }
                        }
                    }
                    None => errors.0.push((path.to_string(), "must be a number".to_string())),
                }
            }
            Self::Integer { default, minimum, maximum } => {
                if value.is_null() {
                    if let Some(d) = default {
                        *value = Value::from(*d);
                    }
                }
                match value.as_i64() {
                    Some(n) => {
                        if let Some(min) = minimum {
                            if n < *min {
                                errors.0.push((path.to_string(), format!("must be >= {min}")));
                            }
                        }
                        if let Some(max) = maximum {
                            if n > *max {
                                errors.0.push((path.to_string(), format!("must be <= {max}")));
                            }
                        }
                    }
                    None => errors.0.push((path.to_string(), "must be an integer".to_string())),
                }
            }
            Self::Boolean { default } => {
                if value.is_null() {
                    if let Some(d) = default {
                        *value = Value::Bool(*d);
                    }
                }
                if !value.is_null() && !value.is_boolean() {
                    errors.0.push((path.to_string(), "must be a boolean".to_string()));
                }
            }
            Self::Array { items, default } => {
                if value.is_null() {
                    if let Some(d) = default {
                        *value = d.clone();
                    } else {
                        *value = Value::Array(Vec::new());
                    }
                }
                match value.clone().as_array() {
                    Some(arr) => {
                        let mut filled = Vec::with_capacity(arr.len());
                        for (i, item) in arr.iter().enumerate() {
                            let mut item = item.clone();
                            items.validate_and_fill(&mut item, &format!("{path}[{i}]"), errors);
                            filled.push(item);
                        }
                        *value = Value::Array(filled);
                    }
                    None => errors.0.push((path.to_string(), "must be an array".to_string())),
                }
            }
            Self::Object { fields } => {
                if value.is_null() {
                    *value = Value::Object(Map::new());
                }
                let Some(obj) = value.as_object_mut() else {
                    errors.0.push((path.to_string(), "must be an object".to_string()));
                    return;
                };
                for field in fields {
                    let mut entry = obj.get(field.name).cloned().unwrap_or(Value::Null);
                    let field_path = if path.is_empty() {
                        field.name.to_string()
                    } else {
                        format!("{path}.{}", field.name)
                    };

                    // A declared default always takes priority over the
                    // required check: a required field is only actually
                    // missing if nothing would fill it in.
                    if entry.is_null() && !has_default(&field.schema) {
                        if field.required {
                            errors.0.push((field_path, "is required".to_string()));
                        }
                        continue;
                    }

                    field.schema.validate_and_fill(&mut entry, &field_path, errors);
                    obj.insert(field.name.to_string(), entry);
                }
            }
        }
    }

    pub fn to_json_schema(&self) -> Value {
        match self {
            Self::String { default, enum_values } => {
                let mut obj = Map::new();
                obj.insert("type".to_string(), Value::String("string".to_string()));
                if let Some(d) = default {
                    obj.insert("default".to_string(), Value::String(d.clone()));
                }
                if let Some(values) = enum_values {
                    obj.insert("enum".to_string(), Value::Array(values.iter().map(|v| Value::String(v.clone())).collect()));
                }
                Value::Object(obj)
            }
            Self::Number { default, minimum, maximum } => {
                let mut obj = Map::new();
                obj.insert("type".to_string(), Value::String("number".to_string()));
                if let Some(d) = default {
                    obj.insert("default".to_string(), Value::from(*d));
                }
                if let Some(m) = minimum {
                    obj.insert("minimum".to_string(), Value::from(*m));
                }
                if let Some(m) = maximum {
                    obj.insert("maximum".to_string(), Value::from(*m));
                }
                Value::Object(obj)
            }
            Self::Integer { default, minimum, maximum } => {
                let mut obj = Map::new();
                obj.insert("type".to_string(), Value::String("integer".to_string()));
                if let Some(d) = default {
                    obj.insert("default".to_string(), Value::from(*d));
                }
                if let Some(m) = minimum {
                    obj.insert("minimum".to_string(), Value::from(*m));
                }
                if let Some(m) = maximum {
                    obj.insert("maximum".to_string(), Value::from(*m));
                }
                Value::Object(obj)
            }
            Self::Boolean { default } => {
                let mut obj = Map::new();
                obj.insert("type".to_string(), Value::String("boolean".to_string()));
                if let Some(d) = default {
                    obj.insert("default".to_string(), Value::Bool(*d));
                }
                Value::Object(obj)
            }
            Self::Array { items, default } => {
                let mut obj = Map::new();
                obj.insert("type".to_string(), Value::String("array".to_string()));
                obj.insert("items".to_string(), items.to_json_schema());
                if let Some(d) = default {
                    obj.insert("default".to_string(), d.clone());
                }
                Value::Object(obj)
            }
            Self::Object { fields } => {
                let mut properties = Map::new();
                let mut required = Vec::new();
                for field in fields {
                    properties.insert(field.name.to_string(), field.schema.to_json_schema());
                    if field.required {
                        required.push(Value::String(field.name.to_string()));
                    }
                }
                let mut obj = Map::new();
                obj.insert("type".to_string(), Value::String("object".to_string()));
                obj.insert("properties".to_string(), Value::Object(properties));
                if !required.is_empty() {
                    obj.insert("required".to_string(), Value::Array(required));
                }
                Value::Object(obj)
            }
        }
    }
}

fn has_default(schema: &ArgumentSchema) -> bool {
    match schema {
        ArgumentSchema::String { default, .. } => default.is_some(),
        ArgumentSchema::Number { default, .. } => default.is_some(),
        ArgumentSchema::Integer { default, .. } => default.is_some(),
        ArgumentSchema::Boolean { default } => default.is_some(),
        ArgumentSchema::Array { default, .. } => default.is_some(),
        ArgumentSchema::Object { .. } => false,
    }
}
