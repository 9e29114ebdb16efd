// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reference modules for modkit
//!
//! - [`LedModule`]: on/off/blink LED, provides a service, handles console
//!   commands and reacts to button events
//! - [`ButtonModule`]: debounced push button posting short and long press
//!   events
//!
//! Both read their pin from the standard `resource` block:
//!
//! ```json
//! {"modules": [
//!   {"type": "LedModule", "instance_name": "lamp1",
//!    "config": {"resource": {"type": "gpio", "pin": 13}, "blink_interval_ms": 250}},
//!   {"type": "ButtonModule", "instance_name": "btn",
//!    "config": {"resource": {"type": "gpio", "pin": 4}, "long_press_ms": 800}}
//! ]}
//! ```

pub mod button;
pub mod led;

pub use button::{ButtonModule, LONG_PRESS_EVENT, SHORT_PRESS_EVENT};
pub use led::{LedController, LedModule, LedState};

use modkit::config::parse_resource_id;
use modkit::{ModuleError, ModuleFactory, PinId};
use serde_json::Value;

/// Register every module type of this crate.
pub fn register_all(factory: &ModuleFactory) {
    led::register(factory);
    button::register(factory);
}

/// `config.resource.pin`.
pub(crate) fn resource_pin(config: &Value) -> Result<PinId, ModuleError> {
    let pin = config
        .get("resource")
        .and_then(|r| r.get("pin"))
        .ok_or_else(|| ModuleError::MissingField("resource.pin".into()))?;
    parse_resource_id(pin).map_err(|reason| ModuleError::invalid("resource.pin", reason))
}

/// Optional millisecond setting, `default` when absent.
pub(crate) fn millis_field(config: &Value, key: &str, default: u64) -> Result<u64, ModuleError> {
    match config.get(key) {
        None => Ok(default),
        Some(value) => value
            .as_u64()
            .ok_or_else(|| ModuleError::invalid(key, format!("expected milliseconds, got {}", value))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resource_pin() {
        assert_eq!(
            resource_pin(&json!({"resource": {"type": "gpio", "pin": 13}})).expect("pin"),
            13
        );
        assert_eq!(
            resource_pin(&json!({"resource": {"type": "gpio", "pin": "0x0D"}})).expect("pin"),
            13
        );
        assert!(matches!(
            resource_pin(&json!({})),
            Err(ModuleError::MissingField(_))
        ));
        assert!(matches!(
            resource_pin(&json!({"resource": {"pin": "D13"}})),
            Err(ModuleError::InvalidField { .. })
        ));
    }

    #[test]
    fn test_millis_field() {
        assert_eq!(millis_field(&json!({}), "long_press_ms", 1000).expect("default"), 1000);
        assert_eq!(
            millis_field(&json!({"long_press_ms": 750}), "long_press_ms", 1000).expect("value"),
            750
        );
        assert!(millis_field(&json!({"long_press_ms": -5}), "long_press_ms", 1000).is_err());
    }

    #[test]
    fn test_register_all() {
        let factory = ModuleFactory::new();
        register_all(&factory);
        assert_eq!(
            factory.types(),
            vec!["ButtonModule".to_string(), "LedModule".to_string()]
        );
    }
}
