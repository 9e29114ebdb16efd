// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! LED module: off / on / blinking.
//!
//! The LED logic lives in [`LedController`], shared through an `Arc`: the
//! module owns the strong reference, while the service registry, event
//! subscriptions and console commands only hold weak ones. Once the module
//! is dropped they all go quiet.
//!
//! Console commands (`<instance> <command>`): `on`, `off`, `toggle`,
//! `blink [ms]`, `status`.
//!
//! Events: `button_short_press` toggles blinking/off, `button_long_press`
//! toggles on/off. With `"button": "<instance>"` in the config, only presses
//! of that button are handled.

use crate::button::{LONG_PRESS_EVENT, SHORT_PRESS_EVENT};
use crate::{millis_field, resource_pin};
use modkit::{
    ConfigSchema, Context, FieldType, Hal, Level, Module, ModuleError, ModuleFactory, Payload,
    PinId, PinMode, Scheduler, TaskHandle,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Weak};

pub const TYPE_NAME: &str = "LedModule";

pub const DEFAULT_BLINK_INTERVAL_MS: u64 = 500;

/// Output state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedState {
    Off,
    On,
    Blinking,
}

impl fmt::Display for LedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Off => write!(f, "OFF"),
            Self::On => write!(f, "ON"),
            Self::Blinking => write!(f, "BLINKING"),
        }
    }
}

struct LedInner {
    state: LedState,
    interval_ms: u64,
    task: Option<TaskHandle>,
}

/// State machine driving one LED pin. Registered as service
/// `"LedModule:<instance>"`.
pub struct LedController {
    instance: String,
    pin: PinId,
    hal: Arc<dyn Hal>,
    scheduler: Arc<Scheduler>,
    inner: Mutex<LedInner>,
}

impl LedController {
    fn new(instance: &str, pin: PinId, interval_ms: u64, ctx: &Context) -> Self {
        Self {
            instance: instance.to_string(),
            pin,
            hal: Arc::clone(ctx.hal()),
            scheduler: Arc::clone(ctx.scheduler()),
            inner: Mutex::new(LedInner {
                state: LedState::Off,
                interval_ms,
                task: None,
            }),
        }
    }

    pub fn turn_on(&self) {
        self.set_state(LedState::On);
    }

    pub fn turn_off(&self) {
        self.set_state(LedState::Off);
    }

    /// Start blinking, optionally with a new half-period.
    ///
    /// A new interval restarts the blink task if it is already running.
    pub fn blink(&self, interval_ms: Option<u64>) {
        let mut inner = self.inner.lock();
        let changed = match interval_ms {
            Some(ms) if ms != inner.interval_ms => {
                inner.interval_ms = ms;
                true
            }
            _ => false,
        };
        if inner.state != LedState::Blinking || changed {
            self.transition(&mut inner, LedState::Blinking);
        }
    }

    /// Off when lit or blinking, on when off. Returns the new state.
    pub fn toggle(&self) -> LedState {
        let mut inner = self.inner.lock();
        let next = match inner.state {
            LedState::Off => LedState::On,
            LedState::On | LedState::Blinking => LedState::Off,
        };
        self.transition(&mut inner, next);
        next
    }

    pub fn state(&self) -> LedState {
        self.inner.lock().state
    }

    pub fn interval_ms(&self) -> u64 {
        self.inner.lock().interval_ms
    }

    pub fn pin(&self) -> PinId {
        self.pin
    }

    pub fn instance_name(&self) -> &str {
        &self.instance
    }

    fn handle_short_press(&self) {
        let mut inner = self.inner.lock();
        let next = if inner.state == LedState::Blinking {
            LedState::Off
        } else {
            LedState::Blinking
        };
        self.transition(&mut inner, next);
    }

    fn handle_long_press(&self) {
        let mut inner = self.inner.lock();
        let next = if inner.state == LedState::On {
            LedState::Off
        } else {
            LedState::On
        };
        self.transition(&mut inner, next);
    }

    fn set_state(&self, next: LedState) {
        let mut inner = self.inner.lock();
        if inner.state != next {
            self.transition(&mut inner, next);
        }
    }

    fn transition(&self, inner: &mut LedInner, next: LedState) {
        if let Some(handle) = inner.task.take() {
            self.scheduler.cancel(handle);
        }
        inner.state = next;

        match next {
            LedState::Off => self.hal.digital_write(self.pin, Level::Low),
            LedState::On => self.hal.digital_write(self.pin, Level::High),
            LedState::Blinking => {
                let hal = Arc::clone(&self.hal);
                let pin = self.pin;
                let handle = self.scheduler.schedule_recurring(inner.interval_ms, move || {
                    let level = hal.digital_read(pin);
                    hal.digital_write(pin, !level);
                });
                inner.task = Some(handle);
            }
        }
        tracing::info!(instance = %self.instance, state = %next, "LED state changed");
    }

    /// Cancel blinking and park the pin low.
    fn stop(&self) {
        let mut inner = self.inner.lock();
        if let Some(handle) = inner.task.take() {
            self.scheduler.cancel(handle);
        }
        inner.state = LedState::Off;
        self.hal.digital_write(self.pin, Level::Low);
    }
}

impl fmt::Debug for LedController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("LedController")
            .field("instance", &self.instance)
            .field("pin", &self.pin)
            .field("state", &inner.state)
            .field("interval_ms", &inner.interval_ms)
            .finish()
    }
}

/// The module wrapper owning the controller.
#[derive(Debug)]
pub struct LedModule {
    controller: Arc<LedController>,
    button: Option<String>,
}

impl LedModule {
    pub fn new(instance: &str, config: &Value, ctx: &Context) -> Result<Self, ModuleError> {
        let pin = resource_pin(config)?;
        let interval_ms = millis_field(config, "blink_interval_ms", DEFAULT_BLINK_INTERVAL_MS)?;
        if interval_ms == 0 {
            return Err(ModuleError::invalid("blink_interval_ms", "must be positive"));
        }
        let button = config
            .get("button")
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(Self {
            controller: Arc::new(LedController::new(instance, pin, interval_ms, ctx)),
            button,
        })
    }

    /// Service name under which the controller is published.
    pub fn service_name(instance: &str) -> String {
        format!("{}:{}", TYPE_NAME, instance)
    }

    pub fn controller(&self) -> &Arc<LedController> {
        &self.controller
    }

    pub fn schema() -> ConfigSchema {
        ConfigSchema::new()
            .required("resource", FieldType::Object)
            .optional("blink_interval_ms", FieldType::Integer)
            .optional("button", FieldType::String)
    }

    fn subscribe(&self, ctx: &Context, event: &str, on_press: fn(&LedController)) {
        let weak = Arc::downgrade(&self.controller);
        let button = self.button.clone();
        ctx.bus().subscribe(event, move |payload: Option<&Payload>| {
            if let Some(wanted) = &button {
                let from = payload.and_then(|p| p.downcast_ref::<String>());
                if from != Some(wanted) {
                    return;
                }
            }
            if let Some(led) = weak.upgrade() {
                on_press(&led);
            }
        });
    }

    fn command(
        &self,
        ctx: &Context,
        command: &str,
        run: impl Fn(&LedController, &[String]) -> String + Send + Sync + 'static,
    ) {
        let weak: Weak<LedController> = Arc::downgrade(&self.controller);
        let instance = self.controller.instance.clone();
        ctx.commands()
            .register_command(&self.controller.instance, command, move |args| {
                match weak.upgrade() {
                    Some(led) => run(&led, args),
                    None => format!("ERROR: LED '{}' is no longer available.", instance),
                }
            });
    }
}

impl Module for LedModule {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    fn instance_name(&self) -> &str {
        &self.controller.instance
    }

    fn init(&mut self, ctx: &Context) {
        let led = &self.controller;
        ctx.hal().pin_mode(led.pin, PinMode::Output);
        ctx.hal().digital_write(led.pin, Level::Low);

        let service = Self::service_name(&led.instance);
        ctx.services().provide(&service, led);
        tracing::info!(
            "{}: initialized on pin {} and provided service '{}'",
            led.instance,
            led.pin,
            service
        );
    }

    fn start(&mut self, ctx: &Context) {
        self.subscribe(ctx, SHORT_PRESS_EVENT, LedController::handle_short_press);
        self.subscribe(ctx, LONG_PRESS_EVENT, LedController::handle_long_press);
        tracing::debug!(instance = %self.controller.instance, "subscribed to button events");
    }

    fn register_commands(&mut self, ctx: &Context) {
        self.command(ctx, "on", |led, _| {
            led.turn_on();
            "OK".to_string()
        });
        self.command(ctx, "off", |led, _| {
            led.turn_off();
            "OK".to_string()
        });
        self.command(ctx, "toggle", |led, _| format!("OK: {}", led.toggle()));
        self.command(ctx, "blink", |led, args| match args.first() {
            None => {
                led.blink(None);
                format!("OK: blinking every {} ms", led.interval_ms())
            }
            Some(arg) => match arg.parse::<u64>() {
                Ok(ms) if ms > 0 => {
                    led.blink(Some(ms));
                    format!("OK: blinking every {} ms", ms)
                }
                _ => format!("ERROR: Invalid interval '{}'.", arg),
            },
        });
        self.command(ctx, "status", |led, _| match led.state() {
            LedState::Blinking => format!("BLINKING ({} ms)", led.interval_ms()),
            state => state.to_string(),
        });
    }

    fn shutdown(&mut self, _ctx: &Context) {
        self.controller.stop();
    }
}

pub(crate) fn register(factory: &ModuleFactory) {
    factory.register_type_with_schema(TYPE_NAME, LedModule::schema(), |instance, config, ctx| {
        Ok(Box::new(LedModule::new(instance, config, ctx)?) as Box<dyn Module>)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use modkit::{ManualClock, SimulatedHal};
    use serde_json::json;

    struct Rig {
        ctx: Context,
        hal: Arc<SimulatedHal>,
        clock: Arc<ManualClock>,
    }

    fn rig() -> Rig {
        let hal = Arc::new(SimulatedHal::new());
        let clock = Arc::new(ManualClock::new(0));
        let ctx = Context::new(hal.clone(), clock.clone());
        Rig { ctx, hal, clock }
    }

    fn led(rig: &Rig, config: Value) -> LedModule {
        let mut module = LedModule::new("lamp1", &config, &rig.ctx).expect("led");
        module.init(&rig.ctx);
        module.start(&rig.ctx);
        module.register_commands(&rig.ctx);
        module
    }

    fn tick(rig: &Rig, ms: u64) {
        let now = rig.clock.advance(ms);
        rig.ctx.scheduler().poll(now);
    }

    #[test]
    fn test_init_drives_low_and_provides_service() {
        let rig = rig();
        let module = led(&rig, json!({"resource": {"type": "gpio", "pin": 13}}));

        assert_eq!(rig.hal.pin(13).and_then(|p| p.mode), Some(PinMode::Output));
        assert_eq!(rig.hal.level(13), Level::Low);

        let service = rig
            .ctx
            .services()
            .get::<LedController>("LedModule:lamp1")
            .expect("service");
        assert!(Arc::ptr_eq(&service, module.controller()));
    }

    #[test]
    fn test_commands() {
        let rig = rig();
        let _module = led(&rig, json!({"resource": {"type": "gpio", "pin": 13}}));
        let commands = rig.ctx.commands();

        assert_eq!(commands.execute("lamp1 on"), "OK");
        assert_eq!(rig.hal.level(13), Level::High);
        assert_eq!(commands.execute("lamp1 status"), "ON");
        assert_eq!(commands.execute("lamp1 toggle"), "OK: OFF");
        assert_eq!(rig.hal.level(13), Level::Low);
        assert_eq!(commands.execute("lamp1 blink 100"), "OK: blinking every 100 ms");
        assert_eq!(commands.execute("lamp1 status"), "BLINKING (100 ms)");
        assert_eq!(commands.execute("lamp1 blink fast"), "ERROR: Invalid interval 'fast'.");
        assert_eq!(commands.execute("lamp1 off"), "OK");
        assert_eq!(commands.execute("lamp1 status"), "OFF");
    }

    #[test]
    fn test_blinking_toggles_pin() {
        let rig = rig();
        let module = led(
            &rig,
            json!({"resource": {"type": "gpio", "pin": 2}, "blink_interval_ms": 100}),
        );
        module.controller().blink(None);

        tick(&rig, 50);
        assert_eq!(rig.hal.level(2), Level::Low);
        tick(&rig, 50);
        assert_eq!(rig.hal.level(2), Level::High);
        tick(&rig, 100);
        assert_eq!(rig.hal.level(2), Level::Low);

        module.controller().turn_off();
        let transitions = rig.hal.transitions(2);
        tick(&rig, 500);
        assert_eq!(rig.hal.transitions(2), transitions);
        assert!(rig.ctx.scheduler().is_empty());
    }

    #[test]
    fn test_button_events() {
        let rig = rig();
        let module = led(&rig, json!({"resource": {"type": "gpio", "pin": 13}}));
        let bus = rig.ctx.bus();

        bus.publish(SHORT_PRESS_EVENT);
        assert_eq!(module.controller().state(), LedState::Blinking);
        bus.publish(SHORT_PRESS_EVENT);
        assert_eq!(module.controller().state(), LedState::Off);
        bus.publish(LONG_PRESS_EVENT);
        assert_eq!(module.controller().state(), LedState::On);
        bus.publish(LONG_PRESS_EVENT);
        assert_eq!(module.controller().state(), LedState::Off);
    }

    #[test]
    fn test_bound_button_filters_events() {
        let rig = rig();
        let module = led(
            &rig,
            json!({"resource": {"type": "gpio", "pin": 13}, "button": "btn_a"}),
        );
        let bus = rig.ctx.bus();

        bus.publish_with(LONG_PRESS_EVENT, &"btn_b".to_string());
        assert_eq!(module.controller().state(), LedState::Off);
        bus.publish(LONG_PRESS_EVENT);
        assert_eq!(module.controller().state(), LedState::Off);
        bus.publish_with(LONG_PRESS_EVENT, &"btn_a".to_string());
        assert_eq!(module.controller().state(), LedState::On);
    }

    #[test]
    fn test_shutdown_and_drop() {
        let rig = rig();
        let mut module = led(&rig, json!({"resource": {"type": "gpio", "pin": 13}}));
        module.controller().blink(None);
        assert_eq!(rig.ctx.scheduler().len(), 1);

        module.shutdown(&rig.ctx);
        assert!(rig.ctx.scheduler().is_empty());
        assert_eq!(rig.hal.level(13), Level::Low);

        drop(module);
        assert_eq!(
            rig.ctx.commands().execute("lamp1 on"),
            "ERROR: LED 'lamp1' is no longer available."
        );
        assert!(rig
            .ctx
            .services()
            .get::<LedController>("LedModule:lamp1")
            .is_err());
        assert_eq!(rig.ctx.bus().publish(SHORT_PRESS_EVENT), 1);
    }

    #[test]
    fn test_config_errors() {
        let rig = rig();
        assert!(matches!(
            LedModule::new("x", &json!({}), &rig.ctx),
            Err(ModuleError::MissingField(_))
        ));
        assert!(LedModule::new(
            "x",
            &json!({"resource": {"pin": 1}, "blink_interval_ms": 0}),
            &rig.ctx
        )
        .is_err());
    }
}
