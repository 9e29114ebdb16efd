// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Runtime context.
//!
//! One `Context` is built by the application entry point and handed to the
//! orchestrator, to every module constructor and to every lifecycle call.
//! It holds the single instance of each shared component; cloning it clones
//! the handles, not the components.

use crate::bus::EventBus;
use crate::commands::CommandRouter;
use crate::factory::ModuleFactory;
use crate::hal::{Clock, Hal};
use crate::ledger::ResourceLedger;
use crate::scheduler::Scheduler;
use crate::services::ServiceRegistry;
use std::fmt;
use std::sync::Arc;

/// Shared components of one device.
#[derive(Clone)]
pub struct Context {
    ledger: Arc<ResourceLedger>,
    scheduler: Arc<Scheduler>,
    bus: Arc<EventBus>,
    services: Arc<ServiceRegistry>,
    commands: Arc<CommandRouter>,
    factory: Arc<ModuleFactory>,
    hal: Arc<dyn Hal>,
    clock: Arc<dyn Clock>,
}

impl Context {
    /// Build fresh components over the given hardware collaborators.
    pub fn new(hal: Arc<dyn Hal>, clock: Arc<dyn Clock>) -> Self {
        Self {
            ledger: Arc::new(ResourceLedger::new()),
            scheduler: Arc::new(Scheduler::new(Arc::clone(&clock))),
            bus: Arc::new(EventBus::new()),
            services: Arc::new(ServiceRegistry::new()),
            commands: Arc::new(CommandRouter::new()),
            factory: Arc::new(ModuleFactory::new()),
            hal,
            clock,
        }
    }

    pub fn ledger(&self) -> &Arc<ResourceLedger> {
        &self.ledger
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn services(&self) -> &Arc<ServiceRegistry> {
        &self.services
    }

    pub fn commands(&self) -> &Arc<CommandRouter> {
        &self.commands
    }

    pub fn factory(&self) -> &Arc<ModuleFactory> {
        &self.factory
    }

    pub fn hal(&self) -> &Arc<dyn Hal> {
        &self.hal
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Shorthand for `clock().now_ms()`.
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("ledger", &self.ledger)
            .field("scheduler", &self.scheduler)
            .field("bus", &self.bus)
            .field("services", &self.services)
            .field("commands", &self.commands)
            .field("factory", &self.factory)
            .finish_non_exhaustive()
    }
}
