// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Simulator console commands, registered on the `sim` instance.
//!
//! ```text
//! sim pin 4 low        # drive a simulated input
//! sim read 13          # read a pin level
//! sim services         # registered service names
//! sim resources        # ledger reservations
//! sim types            # registered module types
//! sim id               # device id
//! sim help             # every instance and its commands
//! ```

use modkit::{Context, DeviceIdentity, Level, PinId, SimulatedHal};
use std::sync::{Arc, Weak};

/// Instance name the simulator's own commands live under.
pub const SIM_INSTANCE: &str = "sim";

pub fn register(ctx: &Context, hal: &Arc<SimulatedHal>, identity: Arc<DeviceIdentity>) {
    let commands = ctx.commands();

    let h = Arc::clone(hal);
    commands.register_command(SIM_INSTANCE, "pin", move |args| {
        let [pin, level] = args else {
            return "ERROR: usage: sim pin <n> <high|low>".to_string();
        };
        let Some(pin) = parse_pin(pin) else {
            return format!("ERROR: Invalid pin '{}'.", pin);
        };
        let level = match level.as_str() {
            "high" | "1" => Level::High,
            "low" | "0" => Level::Low,
            other => return format!("ERROR: Invalid level '{}'.", other),
        };
        h.set_input(pin, level);
        format!("OK: pin {} {}", pin, level)
    });

    let h = Arc::clone(hal);
    commands.register_command(SIM_INSTANCE, "read", move |args| {
        match args.first().and_then(|a| parse_pin(a)) {
            Some(pin) => h.level(pin).to_string(),
            None => "ERROR: usage: sim read <n>".to_string(),
        }
    });

    let services = Arc::downgrade(ctx.services());
    commands.register_command(SIM_INSTANCE, "services", move |_| {
        upgrade(&services, |s| list(s.names()))
    });

    let ledger = Arc::downgrade(ctx.ledger());
    commands.register_command(SIM_INSTANCE, "resources", move |_| {
        upgrade(&ledger, |l| {
            list(
                l.reservations()
                    .into_iter()
                    .map(|r| format!("{} {} -> {}", r.kind.config_name(), r.id, r.owner))
                    .collect(),
            )
        })
    });

    let factory = Arc::downgrade(ctx.factory());
    commands.register_command(SIM_INSTANCE, "types", move |_| {
        upgrade(&factory, |f| list(f.types()))
    });

    commands.register_command(SIM_INSTANCE, "id", move |_| identity.unique_id().to_string());

    let router = Arc::downgrade(commands);
    commands.register_command(SIM_INSTANCE, "help", move |_| {
        upgrade(&router, |r| {
            r.instances()
                .into_iter()
                .map(|instance| format!("{}: {}", instance, r.commands_for(&instance).join(" ")))
                .collect::<Vec<_>>()
                .join(" | ")
        })
    });
}

fn parse_pin(text: &str) -> Option<PinId> {
    text.parse().ok()
}

fn list(items: Vec<String>) -> String {
    if items.is_empty() {
        "(none)".to_string()
    } else {
        items.join(", ")
    }
}

// Handlers hold components weakly: the router that stores them is one.
fn upgrade<T>(weak: &Weak<T>, f: impl FnOnce(&T) -> String) -> String {
    match weak.upgrade() {
        Some(inner) => f(&inner),
        None => "ERROR: system is shutting down.".to_string(),
    }
}
