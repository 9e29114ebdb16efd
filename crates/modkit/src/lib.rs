// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! modkit: cooperative module orchestration for embedded devices
//!
//! An application is split into independent *modules* (sensor drivers,
//! actuators, UI handlers) declared in a JSON configuration. The
//! orchestrator reserves their hardware resources without conflicts,
//! builds them through a factory and drives them on one polling loop.
//!
//! # Architecture
//!
//! ```text
//! config JSON ──► Orchestrator ──► ResourceLedger (lock pins/addresses)
//!                     │
//!                     ├──► ModuleFactory ──► Box<dyn Module>
//!                     │
//!                     └──► init → start → register_commands → poll loop
//!                                                             │
//!                                                        Scheduler
//!
//! modules talk laterally through: EventBus · ServiceRegistry · CommandRouter
//! ```
//!
//! # Features
//!
//! - **Resource Ledger**: exclusive reservation of pins, bus addresses and
//!   ports, conflicts detected before any module is built
//! - **Scheduler**: non-blocking one-shot and recurring tasks
//! - **Event Bus**: synchronous publish/subscribe with typed payloads
//! - **Service Registry**: named weak handles to shared objects
//! - **Command Router**: `"<instance> <command> [args...]"` text console
//!
//! # Quick Start
//!
//! ```rust
//! use modkit::{Context, ManualClock, Module, Orchestrator, SimulatedHal};
//! use std::sync::Arc;
//!
//! struct Heartbeat {
//!     name: String,
//! }
//!
//! impl Module for Heartbeat {
//!     fn type_name(&self) -> &str {
//!         "Heartbeat"
//!     }
//!     fn instance_name(&self) -> &str {
//!         &self.name
//!     }
//! }
//!
//! let ctx = Context::new(Arc::new(SimulatedHal::new()), Arc::new(ManualClock::new(0)));
//! ctx.factory().register_type("Heartbeat", |name, _config, _ctx| {
//!     Ok(Box::new(Heartbeat { name: name.to_string() }) as Box<dyn Module>)
//! });
//!
//! let mut system = Orchestrator::new(ctx);
//! system
//!     .begin(r#"{"modules": [{"type": "Heartbeat", "instance_name": "hb"}]}"#)
//!     .expect("begin");
//! system.poll();
//! assert!(system.is_running());
//! ```

pub mod bus;
pub mod commands;
pub mod config;
pub mod context;
pub mod factory;
pub mod hal;
pub mod identity;
pub mod isolation;
pub mod ledger;
pub mod module;
pub mod orchestrator;
pub mod scheduler;
pub mod schema;
pub mod services;

pub use bus::{EventBus, Payload, MAX_REENTRANT_DEPTH};
pub use commands::CommandRouter;
pub use config::{ConfigError, ModuleDeclaration, ResourceRequest, SystemConfig};
pub use context::Context;
pub use factory::ModuleFactory;
pub use hal::{Clock, Hal, Level, ManualClock, PinId, PinMode, SimulatedHal, SystemClock};
pub use identity::{DeviceIdentity, FileIdSource, FixedIdSource, IdSource, RandomIdSource};
pub use ledger::{Reservation, ResourceGuard, ResourceId, ResourceKind, ResourceLedger};
pub use module::{Module, ModuleError};
pub use orchestrator::{BeginError, Orchestrator, SystemState};
pub use scheduler::{Scheduler, TaskHandle};
pub use schema::{ConfigSchema, FieldType, SchemaViolation};
pub use services::{ServiceError, ServiceRegistry};
