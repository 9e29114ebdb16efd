// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Module factory: type name → constructor.

use crate::context::Context;
use crate::module::{Module, ModuleError};
use crate::schema::ConfigSchema;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Builds a module from its instance name and `config` object.
pub type ModuleConstructor =
    Arc<dyn Fn(&str, &Value, &Context) -> Result<Box<dyn Module>, ModuleError> + Send + Sync>;

#[derive(Clone)]
struct Registration {
    constructor: ModuleConstructor,
    schema: Option<ConfigSchema>,
}

/// Registry of module types.
#[derive(Default)]
pub struct ModuleFactory {
    registry: Mutex<BTreeMap<String, Registration>>,
}

impl ModuleFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `constructor` for `type_name`. The last registration wins.
    pub fn register_type<F>(&self, type_name: &str, constructor: F)
    where
        F: Fn(&str, &Value, &Context) -> Result<Box<dyn Module>, ModuleError>
            + Send
            + Sync
            + 'static,
    {
        self.insert(type_name, Arc::new(constructor), None);
    }

    /// Register `constructor` with a config schema checked before each
    /// construction.
    pub fn register_type_with_schema<F>(&self, type_name: &str, schema: ConfigSchema, constructor: F)
    where
        F: Fn(&str, &Value, &Context) -> Result<Box<dyn Module>, ModuleError>
            + Send
            + Sync
            + 'static,
    {
        self.insert(type_name, Arc::new(constructor), Some(schema));
    }

    fn insert(&self, type_name: &str, constructor: ModuleConstructor, schema: Option<ConfigSchema>) {
        self.registry.lock().insert(
            type_name.to_string(),
            Registration {
                constructor,
                schema,
            },
        );
        tracing::debug!(module_type = type_name, "module type registered");
    }

    /// Instantiate `type_name`.
    ///
    /// `None` (with an error log) when the type is unknown, the config
    /// violates the type's schema, or the constructor fails.
    pub fn create(
        &self,
        type_name: &str,
        instance_name: &str,
        config: &Value,
        ctx: &Context,
    ) -> Option<Box<dyn Module>> {
        let Some(registration) = self.registry.lock().get(type_name).cloned() else {
            tracing::error!("Unknown module type '{}'", type_name);
            return None;
        };

        if let Some(schema) = &registration.schema {
            let violations = schema.validate(config);
            if !violations.is_empty() {
                for violation in &violations {
                    tracing::error!(
                        "Invalid config for '{}' ({}): {}",
                        instance_name,
                        type_name,
                        violation
                    );
                }
                return None;
            }
        }

        tracing::debug!(module_type = type_name, instance = instance_name, "creating module");
        match (registration.constructor)(instance_name, config, ctx) {
            Ok(module) => Some(module),
            Err(e) => {
                tracing::error!(
                    "Failed to create '{}' ({}): {}",
                    instance_name,
                    type_name,
                    e
                );
                None
            }
        }
    }

    pub fn is_registered(&self, type_name: &str) -> bool {
        self.registry.lock().contains_key(type_name)
    }

    /// Registered type names, sorted.
    pub fn types(&self) -> Vec<String> {
        self.registry.lock().keys().cloned().collect()
    }
}

impl fmt::Debug for ModuleFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleFactory")
            .field("types", &self.types())
            .finish()
    }
}
