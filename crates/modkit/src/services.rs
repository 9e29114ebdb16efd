// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Named service registry.
//!
//! Lets one module call another directly without holding a reference to it
//! at construction time. Entries are weak and typed:
//!
//! - the registry never keeps a provider alive, so a lookup after the
//!   providing module was dropped fails with [`ServiceError::Expired`]
//!   instead of handing out a dangling handle;
//! - a lookup with the wrong type fails with [`ServiceError::TypeMismatch`].

use parking_lot::Mutex;
use std::any::{self, Any};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};
use thiserror::Error;

/// Service lookup errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("service '{0}' not found")]
    NotFound(String),

    #[error("service '{name}' is a {found}, not a {expected}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("service '{0}' provider has been dropped")]
    Expired(String),
}

#[derive(Clone)]
struct ServiceEntry {
    handle: Weak<dyn Any + Send + Sync>,
    type_name: &'static str,
}

/// Name → weak typed handle table.
#[derive(Default)]
pub struct ServiceRegistry {
    services: Mutex<BTreeMap<String, ServiceEntry>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `service` under `name`, replacing any previous entry.
    pub fn provide<T>(&self, name: &str, service: &Arc<T>)
    where
        T: Any + Send + Sync,
    {
        let erased: Arc<dyn Any + Send + Sync> = service.clone();
        let entry = ServiceEntry {
            handle: Arc::downgrade(&erased),
            type_name: any::type_name::<T>(),
        };
        if self
            .services
            .lock()
            .insert(name.to_string(), entry)
            .is_some()
        {
            tracing::debug!(service = name, "service replaced");
        } else {
            tracing::debug!(service = name, "service provided");
        }
    }

    /// Look up `name` as a `T`.
    pub fn get<T>(&self, name: &str) -> Result<Arc<T>, ServiceError>
    where
        T: Any + Send + Sync,
    {
        let entry = self
            .services
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(name.to_string()))?;

        let strong = entry
            .handle
            .upgrade()
            .ok_or_else(|| ServiceError::Expired(name.to_string()))?;

        strong.downcast::<T>().map_err(|_| ServiceError::TypeMismatch {
            name: name.to_string(),
            expected: any::type_name::<T>(),
            found: entry.type_name,
        })
    }

    /// `true` if an entry exists under `name` (live or expired).
    pub fn contains(&self, name: &str) -> bool {
        self.services.lock().contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.services.lock().keys().cloned().collect()
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("names", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct Thermometer {
        reads: AtomicU32,
    }

    impl Thermometer {
        fn read(&self) -> u32 {
            self.reads.fetch_add(1, Ordering::SeqCst) + 20
        }
    }

    struct Display;

    #[test]
    fn test_provide_and_get() {
        let registry = ServiceRegistry::new();
        let thermo = Arc::new(Thermometer::default());
        registry.provide("thermo", &thermo);

        let found = registry.get::<Thermometer>("thermo").expect("get");
        assert_eq!(found.read(), 20);
        assert_eq!(thermo.reads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_not_found() {
        let registry = ServiceRegistry::new();
        assert_eq!(
            registry.get::<Thermometer>("ghost").err(),
            Some(ServiceError::NotFound("ghost".into()))
        );
    }

    #[test]
    fn test_type_mismatch() {
        let registry = ServiceRegistry::new();
        let display = Arc::new(Display);
        registry.provide("screen", &display);

        match registry.get::<Thermometer>("screen") {
            Err(ServiceError::TypeMismatch { name, found, .. }) => {
                assert_eq!(name, "screen");
                assert!(found.ends_with("Display"));
            }
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_registry_does_not_own_provider() {
        let registry = ServiceRegistry::new();
        let thermo = Arc::new(Thermometer::default());
        registry.provide("thermo", &thermo);
        drop(thermo);

        assert!(registry.contains("thermo"));
        assert_eq!(
            registry.get::<Thermometer>("thermo").err(),
            Some(ServiceError::Expired("thermo".into()))
        );
    }

    #[test]
    fn test_later_provide_overwrites() {
        let registry = ServiceRegistry::new();
        let first = Arc::new(Thermometer::default());
        let second = Arc::new(Thermometer::default());
        registry.provide("thermo", &first);
        registry.provide("thermo", &second);

        let found = registry.get::<Thermometer>("thermo").expect("get");
        assert!(Arc::ptr_eq(&found, &second));
        assert_eq!(registry.names(), vec!["thermo".to_string()]);
    }
}
