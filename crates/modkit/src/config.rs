// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! System configuration.
//!
//! ```json
//! {
//!   "modules": [
//!     {
//!       "type": "LedModule",
//!       "instance_name": "status_led",
//!       "config": {
//!         "resource": { "type": "gpio", "pin": 13 },
//!         "blink_interval_ms": 500
//!       }
//!     },
//!     {
//!       "type": "Display",
//!       "config": { "resource": { "type": "i2c", "address": "0x3C" } }
//!     }
//!   ]
//! }
//! ```
//!
//! A declaration may carry a single `resource` object or a `resources`
//! array. Identifiers are integers, hex strings (`"0x3C"`) or decimal
//! strings.
//!
//! Only the top level is strict. Each entry of `modules` is read leniently:
//! a non-object entry or a non-string `type`/`instance_name` loads as an
//! absent field, so the orchestrator skips that one declaration.

use crate::ledger::{ResourceId, ResourceKind};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Module declarations, in instantiation order.
    pub modules: Vec<ModuleDeclaration>,
}

impl SystemConfig {
    /// Parse a JSON document.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Strict check used by tooling.
    ///
    /// The orchestrator itself is lenient (it skips bad declarations with a
    /// warning); this reports the first problem as an error instead.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();

        for (i, decl) in self.modules.iter().enumerate() {
            let (Some(_), Some(instance)) = (&decl.type_name, decl.instance_name()) else {
                return Err(ConfigError::Invalid(format!(
                    "Module {} has no 'type'",
                    i
                )));
            };

            if !seen.insert(instance) {
                return Err(ConfigError::Invalid(format!(
                    "Module {} reuses instance name '{}'",
                    i, instance
                )));
            }

            for request in decl.resource_requests() {
                match request {
                    ResourceRequest::Valid { .. } => {}
                    ResourceRequest::UnknownKind(kind) => {
                        return Err(ConfigError::Invalid(format!(
                            "Module '{}' declares unknown resource type '{}'",
                            instance, kind
                        )));
                    }
                    ResourceRequest::Malformed(reason) => {
                        return Err(ConfigError::Invalid(format!(
                            "Module '{}' has a malformed resource: {}",
                            instance, reason
                        )));
                    }
                }
            }
        }

        Ok(())
    }

    /// Append a declaration.
    pub fn add_module(&mut self, decl: ModuleDeclaration) {
        self.modules.push(decl);
    }
}

/// One entry of `modules`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value")]
pub struct ModuleDeclaration {
    /// Registered module type. Declarations without it are skipped.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,

    /// Unique instance name; defaults to the type name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_name: Option<String>,

    /// Module-specific settings, including resource blocks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
}

impl ModuleDeclaration {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: Some(type_name.into()),
            instance_name: None,
            config: None,
        }
    }

    /// Set the instance name.
    pub fn named(mut self, instance_name: impl Into<String>) -> Self {
        self.instance_name = Some(instance_name.into());
        self
    }

    /// Set the module config object.
    pub fn with_config(mut self, config: Value) -> Self {
        self.config = Some(config);
        self
    }

    /// `instance_name`, falling back to `type`.
    pub fn instance_name(&self) -> Option<&str> {
        self.instance_name
            .as_deref()
            .or(self.type_name.as_deref())
    }

    /// Parse every resource block of this declaration.
    pub fn resource_requests(&self) -> Vec<ResourceRequest> {
        let Some(config) = self.config.as_ref().and_then(Value::as_object) else {
            return Vec::new();
        };

        let mut blocks: Vec<&Value> = Vec::new();
        if let Some(single) = config.get("resource") {
            blocks.push(single);
        }
        match config.get("resources") {
            Some(Value::Array(list)) => blocks.extend(list.iter()),
            Some(_) => {
                return vec![ResourceRequest::Malformed(
                    "'resources' must be an array".into(),
                )]
            }
            None => {}
        }

        blocks.into_iter().map(ResourceRequest::parse).collect()
    }
}

impl From<Value> for ModuleDeclaration {
    fn from(value: Value) -> Self {
        let mut fields = match value {
            Value::Object(fields) => fields,
            other => {
                tracing::warn!("Module declaration is not an object: {}", other);
                return Self::default();
            }
        };

        Self {
            type_name: string_field(&mut fields, "type"),
            instance_name: string_field(&mut fields, "instance_name"),
            config: fields.remove("config").filter(|v| !v.is_null()),
        }
    }
}

fn string_field(fields: &mut Map<String, Value>, key: &str) -> Option<String> {
    match fields.remove(key)? {
        Value::String(s) => Some(s),
        Value::Null => None,
        other => {
            tracing::warn!("Module declaration '{}' is not a string ({}), ignored", key, other);
            None
        }
    }
}

/// Outcome of parsing one resource block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceRequest {
    /// A well-formed request.
    Valid { kind: ResourceKind, id: ResourceId },
    /// `type` is not one of gpio/i2c/spi/uart/adc/dac.
    UnknownKind(String),
    /// Anything else wrong with the block.
    Malformed(String),
}

impl ResourceRequest {
    fn parse(block: &Value) -> Self {
        let Some(block) = block.as_object() else {
            return Self::Malformed("resource block must be an object".into());
        };

        let Some(kind_name) = block.get("type").and_then(Value::as_str) else {
            return Self::Malformed("resource block has no 'type'".into());
        };

        let Some(kind) = ResourceKind::from_config_name(kind_name) else {
            return Self::UnknownKind(kind_name.to_string());
        };

        match id_field(block, kind) {
            Ok(id) => Self::Valid { kind, id },
            Err(reason) => Self::Malformed(reason),
        }
    }
}

fn id_field(block: &Map<String, Value>, kind: ResourceKind) -> Result<ResourceId, String> {
    let key = kind.id_key();
    let value = block
        .get(key)
        .ok_or_else(|| format!("{} resource has no '{}'", kind.config_name(), key))?;
    parse_resource_id(value)
}

/// Parse an identifier given as an integer, `"0x.."` hex string or decimal
/// string.
pub fn parse_resource_id(value: &Value) -> Result<ResourceId, String> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .and_then(|v| ResourceId::try_from(v).ok())
            .ok_or_else(|| format!("'{}' is not a valid identifier", n)),
        Value::String(s) => {
            let s = s.trim();
            let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                Some(hex) => ResourceId::from_str_radix(hex, 16),
                None => s.parse::<ResourceId>(),
            };
            parsed.map_err(|_| format!("'{}' is not a valid identifier", s))
        }
        other => Err(format!("identifier must be a number or string, got {}", other)),
    }
}
