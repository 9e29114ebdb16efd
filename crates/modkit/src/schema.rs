// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-type configuration schemas.
//!
//! A module type can declare which `config` keys it expects and their JSON
//! type. The factory checks a declaration against the schema before calling
//! the constructor, so a typo in a config file is reported by key name
//! instead of surfacing as a half-configured driver.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// JSON type expected for a config key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Integer,
    /// Integer or floating point.
    Number,
    String,
    Boolean,
    Object,
    Array,
}

impl FieldType {
    fn matches(self, value: &Value) -> bool {
        match self {
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::String => value.is_string(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Integer => "integer",
            Self::Number => "number",
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        };
        f.write_str(name)
    }
}

/// Rule for one config key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRule {
    #[serde(rename = "type")]
    pub field_type: FieldType,

    #[serde(default)]
    pub required: bool,
}

/// A config key that does not satisfy its rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaViolation {
    #[error("missing required key '{key}'")]
    Missing { key: String },

    #[error("invalid type for key '{key}': expected {expected}, got {found}")]
    WrongType {
        key: String,
        expected: FieldType,
        found: &'static str,
    },

    #[error("config must be an object, got {found}")]
    NotAnObject { found: &'static str },
}

/// Expected keys of a module's `config` object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigSchema {
    fields: BTreeMap<String, FieldRule>,
}

impl ConfigSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a required key.
    pub fn required(mut self, key: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.insert(
            key.into(),
            FieldRule {
                field_type,
                required: true,
            },
        );
        self
    }

    /// Add an optional key; checked only when present.
    pub fn optional(mut self, key: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.insert(
            key.into(),
            FieldRule {
                field_type,
                required: false,
            },
        );
        self
    }

    /// Parse a schema from `{"key": {"type": "integer", "required": true}}`.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Check `config`, returning every violation (empty when valid).
    pub fn validate(&self, config: &Value) -> Vec<SchemaViolation> {
        let Some(object) = config.as_object() else {
            return vec![SchemaViolation::NotAnObject {
                found: json_type_name(config),
            }];
        };

        let mut violations = Vec::new();
        for (key, rule) in &self.fields {
            match object.get(key) {
                None if rule.required => violations.push(SchemaViolation::Missing { key: key.clone() }),
                None => {}
                Some(value) if !rule.field_type.matches(value) => {
                    violations.push(SchemaViolation::WrongType {
                        key: key.clone(),
                        expected: rule.field_type,
                        found: json_type_name(value),
                    });
                }
                Some(_) => {}
            }
        }
        violations
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn led_schema() -> ConfigSchema {
        ConfigSchema::new()
            .required("resource", FieldType::Object)
            .optional("blink_interval_ms", FieldType::Integer)
    }

    #[test]
    fn test_valid_config() {
        let config = json!({"resource": {"type": "gpio", "pin": 13}, "blink_interval_ms": 250});
        assert!(led_schema().validate(&config).is_empty());
    }

    #[test]
    fn test_missing_and_wrong_type() {
        let config = json!({"blink_interval_ms": "fast"});
        let violations = led_schema().validate(&config);
        assert_eq!(
            violations,
            vec![
                SchemaViolation::WrongType {
                    key: "blink_interval_ms".into(),
                    expected: FieldType::Integer,
                    found: "string",
                },
                SchemaViolation::Missing {
                    key: "resource".into()
                },
            ]
        );
        assert_eq!(
            violations[1].to_string(),
            "missing required key 'resource'"
        );
    }

    #[test]
    fn test_number_accepts_integer() {
        let schema = ConfigSchema::new().required("gain", FieldType::Number);
        assert!(schema.validate(&json!({"gain": 2})).is_empty());
        assert!(schema.validate(&json!({"gain": 2.5})).is_empty());

        let schema = ConfigSchema::new().required("count", FieldType::Integer);
        assert_eq!(schema.validate(&json!({"count": 2.5})).len(), 1);
    }

    #[test]
    fn test_non_object_config() {
        let violations = led_schema().validate(&json!([1, 2]));
        assert_eq!(violations, vec![SchemaViolation::NotAnObject { found: "array" }]);
    }

    #[test]
    fn test_schema_from_json() {
        let schema = ConfigSchema::from_json(
            r#"{"resource": {"type": "object", "required": true}, "long_press_ms": {"type": "integer"}}"#,
        )
        .expect("parse");
        assert!(!schema.is_empty());
        assert_eq!(schema.validate(&json!({})).len(), 1);
    }
}
