// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Debounced push button (active low, internal pull-up).
//!
//! Posts [`SHORT_PRESS_EVENT`] on release when the press was shorter than
//! `long_press_ms`, or [`LONG_PRESS_EVENT`] once as soon as the press
//! crosses it. Both carry the button's instance name as a `String` payload.

use crate::{millis_field, resource_pin};
use modkit::{ConfigSchema, Context, FieldType, Level, Module, ModuleError, ModuleFactory, PinId, PinMode};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub const TYPE_NAME: &str = "ButtonModule";

pub const SHORT_PRESS_EVENT: &str = "button_short_press";
pub const LONG_PRESS_EVENT: &str = "button_long_press";

pub const DEFAULT_LONG_PRESS_MS: u64 = 1000;
pub const DEFAULT_DEBOUNCE_MS: u64 = 50;

#[derive(Debug)]
pub struct ButtonModule {
    instance: String,
    pin: PinId,
    long_press_ms: u64,
    debounce_ms: u64,

    last_reading: Level,
    stable: Level,
    last_change_ms: u64,
    press_start_ms: u64,
    long_press_fired: bool,
    pressed: Arc<AtomicBool>,
}

impl ButtonModule {
    pub fn new(instance: &str, config: &Value) -> Result<Self, ModuleError> {
        Ok(Self {
            instance: instance.to_string(),
            pin: resource_pin(config)?,
            long_press_ms: millis_field(config, "long_press_ms", DEFAULT_LONG_PRESS_MS)?,
            debounce_ms: millis_field(config, "debounce_ms", DEFAULT_DEBOUNCE_MS)?,
            last_reading: Level::High,
            stable: Level::High,
            last_change_ms: 0,
            press_start_ms: 0,
            long_press_fired: false,
            pressed: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn schema() -> ConfigSchema {
        ConfigSchema::new()
            .required("resource", FieldType::Object)
            .optional("long_press_ms", FieldType::Integer)
            .optional("debounce_ms", FieldType::Integer)
    }

    /// Debounced state.
    pub fn is_pressed(&self) -> bool {
        self.pressed.load(Ordering::Relaxed)
    }

    fn on_stable_change(&mut self, now: u64, ctx: &Context) {
        if self.stable == Level::Low {
            self.press_start_ms = now;
            self.long_press_fired = false;
            self.pressed.store(true, Ordering::Relaxed);
            tracing::debug!(instance = %self.instance, "button press started");
        } else {
            self.pressed.store(false, Ordering::Relaxed);
            if !self.long_press_fired {
                tracing::info!("{}: short press detected, posting event", self.instance);
                ctx.bus().publish_with(SHORT_PRESS_EVENT, &self.instance);
            }
            self.press_start_ms = 0;
        }
    }
}

impl Module for ButtonModule {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    fn instance_name(&self) -> &str {
        &self.instance
    }

    fn init(&mut self, ctx: &Context) {
        ctx.hal().pin_mode(self.pin, PinMode::InputPullup);
        tracing::info!("{}: initialized on pin {}", self.instance, self.pin);
    }

    fn register_commands(&mut self, ctx: &Context) {
        let pressed = Arc::clone(&self.pressed);
        ctx.commands().register_command(&self.instance, "state", move |_| {
            if pressed.load(Ordering::Relaxed) {
                "PRESSED".to_string()
            } else {
                "RELEASED".to_string()
            }
        });
    }

    fn poll(&mut self, ctx: &Context) {
        let now = ctx.now_ms();
        let reading = ctx.hal().digital_read(self.pin);

        if reading != self.last_reading {
            self.last_change_ms = now;
        }

        if now.wrapping_sub(self.last_change_ms) > self.debounce_ms && reading != self.stable {
            self.stable = reading;
            self.on_stable_change(now, ctx);
        }

        if self.stable == Level::Low
            && !self.long_press_fired
            && now.wrapping_sub(self.press_start_ms) > self.long_press_ms
        {
            self.long_press_fired = true;
            tracing::info!("{}: long press detected, posting event", self.instance);
            ctx.bus().publish_with(LONG_PRESS_EVENT, &self.instance);
        }

        self.last_reading = reading;
    }
}

pub(crate) fn register(factory: &ModuleFactory) {
    factory.register_type_with_schema(TYPE_NAME, ButtonModule::schema(), |instance, config, _ctx| {
        Ok(Box::new(ButtonModule::new(instance, config)?) as Box<dyn Module>)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use modkit::{ManualClock, Payload, SimulatedHal};
    use parking_lot::Mutex;
    use serde_json::json;

    struct Rig {
        ctx: Context,
        hal: Arc<SimulatedHal>,
        clock: Arc<ManualClock>,
        button: ButtonModule,
        events: Arc<Mutex<Vec<(String, String)>>>,
    }

    fn rig() -> Rig {
        let hal = Arc::new(SimulatedHal::new());
        let clock = Arc::new(ManualClock::new(0));
        let ctx = Context::new(hal.clone(), clock.clone());

        let events = Arc::new(Mutex::new(Vec::new()));
        for event in [SHORT_PRESS_EVENT, LONG_PRESS_EVENT] {
            let events = Arc::clone(&events);
            ctx.bus().subscribe(event, move |payload: Option<&Payload>| {
                let from = payload
                    .and_then(|p| p.downcast_ref::<String>())
                    .cloned()
                    .unwrap_or_default();
                events.lock().push((event.to_string(), from));
            });
        }

        let mut button = ButtonModule::new("btn", &json!({"resource": {"type": "gpio", "pin": 4}}))
            .expect("button");
        button.init(&ctx);
        button.register_commands(&ctx);

        Rig {
            ctx,
            hal,
            clock,
            button,
            events,
        }
    }

    impl Rig {
        fn poll_at(&mut self, t: u64) {
            self.clock.set(t);
            self.button.poll(&self.ctx);
        }
    }

    #[test]
    fn test_idle_reads_released() {
        let mut rig = rig();
        rig.poll_at(0);
        rig.poll_at(500);
        assert!(!rig.button.is_pressed());
        assert!(rig.events.lock().is_empty());
        assert_eq!(rig.ctx.commands().execute("btn state"), "RELEASED");
    }

    #[test]
    fn test_short_press() {
        let mut rig = rig();
        rig.poll_at(0);

        rig.hal.set_input(4, Level::Low);
        rig.poll_at(10);
        rig.poll_at(40);
        assert!(!rig.button.is_pressed());
        rig.poll_at(61);
        assert!(rig.button.is_pressed());
        assert_eq!(rig.ctx.commands().execute("btn state"), "PRESSED");

        rig.hal.set_input(4, Level::High);
        rig.poll_at(200);
        rig.poll_at(251);
        assert!(!rig.button.is_pressed());
        assert_eq!(
            *rig.events.lock(),
            vec![(SHORT_PRESS_EVENT.to_string(), "btn".to_string())]
        );
    }

    #[test]
    fn test_bounce_is_ignored() {
        let mut rig = rig();
        rig.poll_at(0);
        for (t, level) in [(10, Level::Low), (20, Level::High), (30, Level::Low), (40, Level::High)] {
            rig.hal.set_input(4, level);
            rig.poll_at(t);
        }
        rig.poll_at(200);
        assert!(!rig.button.is_pressed());
        assert!(rig.events.lock().is_empty());
    }

    #[test]
    fn test_long_press_fires_once() {
        let mut rig = rig();
        rig.poll_at(0);

        rig.hal.set_input(4, Level::Low);
        rig.poll_at(10);
        rig.poll_at(61);
        rig.poll_at(1000);
        assert!(rig.events.lock().is_empty());
        rig.poll_at(1062);
        rig.poll_at(2500);

        rig.hal.set_input(4, Level::High);
        rig.poll_at(2600);
        rig.poll_at(2700);
        assert_eq!(
            *rig.events.lock(),
            vec![(LONG_PRESS_EVENT.to_string(), "btn".to_string())]
        );
    }

    #[test]
    fn test_custom_thresholds() {
        let button = ButtonModule::new(
            "b",
            &json!({"resource": {"pin": 4}, "long_press_ms": 300, "debounce_ms": 20}),
        )
        .expect("button");
        assert_eq!(button.long_press_ms, 300);
        assert_eq!(button.debounce_ms, 20);
        assert!(ButtonModule::new("b", &json!({"resource": {"pin": 4}, "debounce_ms": "x"})).is_err());
    }
}
