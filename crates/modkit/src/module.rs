// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The module capability set.

use crate::config::ConfigError;
use crate::context::Context;
use thiserror::Error;

/// A self-contained functional unit driven by the orchestrator.
///
/// Lifecycle calls happen in phases across *all* modules: every `init`,
/// then every `start`, then every `register_commands`, then `poll` once per
/// loop iteration. So `start` may rely on every module being initialized,
/// and `register_commands` on every module being started.
///
/// No call may block. Work that has to wait goes through the
/// [`Scheduler`](crate::scheduler::Scheduler).
pub trait Module: Send {
    /// Module type name, as registered with the factory.
    fn type_name(&self) -> &str;

    /// Unique instance name from the configuration.
    fn instance_name(&self) -> &str;

    /// One-time hardware setup (pin modes, service registration).
    fn init(&mut self, _ctx: &Context) {}

    /// Start active behaviour: schedule tasks, subscribe to events.
    fn start(&mut self, _ctx: &Context) {}

    /// Register console commands with the command router.
    fn register_commands(&mut self, _ctx: &Context) {}

    /// Called on every loop iteration.
    fn poll(&mut self, _ctx: &Context) {}

    /// Teardown: cancel tasks, park outputs. Reservations made on the
    /// module's behalf are released by the orchestrator afterwards.
    fn shutdown(&mut self, _ctx: &Context) {}
}

/// Errors raised by module constructors.
#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("missing config field '{0}'")]
    MissingField(String),

    #[error("invalid config field '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Other(String),
}

impl ModuleError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
