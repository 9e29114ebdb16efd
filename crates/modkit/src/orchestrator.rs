// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Orchestrator: configuration → running system.
//!
//! `begin` runs four phases, each over the whole declaration list:
//!
//! 1. parse the JSON configuration,
//! 2. reserve every declared hardware resource in the ledger,
//! 3. instantiate every declared module through the factory,
//! 4. `init` all, then `start` all, then `register_commands` all.
//!
//! A resource conflict in phase 2 stops everything before any module is
//! built: the system sits in [`SystemState::Error`] and `poll` does nothing.
//! Declaration-level problems (unknown type, missing type, duplicate
//! instance name, bad resource block) are logged and skipped. Declarations
//! dropped for a missing type or a reused name reserve nothing; one whose
//! module fails to build gives its reservations back.

use crate::config::{ConfigError, ModuleDeclaration, ResourceRequest, SystemConfig};
use crate::context::Context;
use crate::isolation;
use crate::module::Module;
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use thiserror::Error;

/// Lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemState {
    Uninitialized,
    ResourcesLocking,
    Instantiating,
    Initializing,
    Starting,
    RegisteringCommands,
    Running,
    /// Terminal until shutdown: configuration could not be parsed or a
    /// resource conflict was found.
    Error,
    /// After `shutdown`.
    Stopped,
}

impl fmt::Display for SystemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::ResourcesLocking => "resources-locking",
            Self::Instantiating => "instantiating",
            Self::Initializing => "initializing",
            Self::Starting => "starting",
            Self::RegisteringCommands => "registering-commands",
            Self::Running => "running",
            Self::Error => "error",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Why `begin` did not reach [`SystemState::Running`].
#[derive(Debug, Error)]
pub enum BeginError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{0} resource conflict(s) detected")]
    ResourceConflicts(usize),

    #[error("begin called in state '{0}'")]
    InvalidState(SystemState),
}

/// Owns the modules and drives their lifecycle.
pub struct Orchestrator {
    ctx: Context,
    state: SystemState,
    modules: Vec<Box<dyn Module>>,
    /// Owners that reserved resources during `begin`.
    owners: BTreeSet<String>,
}

impl Orchestrator {
    pub fn new(ctx: Context) -> Self {
        Self {
            ctx,
            state: SystemState::Uninitialized,
            modules: Vec::new(),
            owners: BTreeSet::new(),
        }
    }

    /// Parse `config_text` and bring the system up.
    ///
    /// On failure the state is [`SystemState::Error`] (except for
    /// [`BeginError::InvalidState`], which leaves the state untouched).
    pub fn begin(&mut self, config_text: &str) -> Result<(), BeginError> {
        self.ensure_uninitialized()?;

        match SystemConfig::from_json(config_text) {
            Ok(config) => self.begin_with(config),
            Err(e) => {
                tracing::error!("Failed to parse system configuration: {}", e);
                self.state = SystemState::Error;
                Err(e.into())
            }
        }
    }

    /// Bring the system up from an already parsed configuration.
    pub fn begin_with(&mut self, config: SystemConfig) -> Result<(), BeginError> {
        self.ensure_uninitialized()?;
        tracing::info!(modules = config.modules.len(), "System startup");

        let accepted = accepted_declarations(&config);

        self.state = SystemState::ResourcesLocking;
        let conflicts = self.reserve_resources(&accepted);
        if conflicts > 0 {
            tracing::error!(
                "{} resource conflict(s), system halted. Check the configuration.",
                conflicts
            );
            self.state = SystemState::Error;
            return Err(BeginError::ResourceConflicts(conflicts));
        }

        self.state = SystemState::Instantiating;
        self.instantiate(&accepted);

        self.state = SystemState::Initializing;
        self.run_phase("init", |m, ctx| m.init(ctx));

        self.state = SystemState::Starting;
        self.run_phase("start", |m, ctx| m.start(ctx));

        self.state = SystemState::RegisteringCommands;
        self.run_phase("register_commands", |m, ctx| m.register_commands(ctx));

        self.state = SystemState::Running;
        tracing::info!(modules = self.modules.len(), "System running");
        Ok(())
    }

    fn ensure_uninitialized(&self) -> Result<(), BeginError> {
        if self.state == SystemState::Uninitialized {
            Ok(())
        } else {
            tracing::warn!(state = %self.state, "begin ignored: system already started");
            Err(BeginError::InvalidState(self.state))
        }
    }

    /// Reserve every declared resource. Returns the number of conflicts.
    ///
    /// Every declaration is visited even after a conflict, so one run
    /// reports all of them.
    fn reserve_resources(&mut self, accepted: &[Accepted<'_>]) -> usize {
        let ledger = self.ctx.ledger();
        let mut conflicts = 0;

        for entry in accepted {
            let owner = entry.instance;
            for request in entry.decl.resource_requests() {
                match request {
                    ResourceRequest::Valid { kind, id } => {
                        if ledger.lock(kind, id, owner) {
                            self.owners.insert(owner.to_string());
                        } else {
                            conflicts += 1;
                        }
                    }
                    ResourceRequest::UnknownKind(kind) => {
                        tracing::warn!(
                            "Unknown resource type '{}' for module '{}', skipped",
                            kind,
                            owner
                        );
                    }
                    ResourceRequest::Malformed(reason) => {
                        tracing::warn!(
                            "Malformed resource for module '{}' ({}), skipped",
                            owner,
                            reason
                        );
                    }
                }
            }
        }
        conflicts
    }

    fn instantiate(&mut self, accepted: &[Accepted<'_>]) {
        for entry in accepted {
            let (type_name, instance) = (entry.type_name, entry.instance);
            let module_config = module_config(entry.decl, instance);
            match self
                .ctx
                .factory()
                .create(type_name, instance, &module_config, &self.ctx)
            {
                Some(module) => {
                    tracing::info!(instance, module_type = type_name, "module created");
                    self.modules.push(module);
                }
                None => {
                    if self.owners.remove(instance) {
                        let released = self.ctx.ledger().release_owner(instance);
                        tracing::debug!(instance, released, "resources of unbuilt module released");
                    }
                }
            }
        }
    }

    fn run_phase(&mut self, phase: &str, call: impl Fn(&mut dyn Module, &Context)) {
        tracing::debug!(phase, modules = self.modules.len(), "lifecycle phase");
        let ctx = &self.ctx;
        for module in &mut self.modules {
            call_isolated(module.as_mut(), phase, |m| call(m, ctx));
        }
    }

    /// One loop iteration: run due scheduler tasks, then poll every module
    /// in registration order. No-op unless running.
    pub fn poll(&mut self) {
        if self.state != SystemState::Running {
            return;
        }

        self.ctx.scheduler().poll(self.ctx.now_ms());

        let ctx = &self.ctx;
        for module in &mut self.modules {
            call_isolated(module.as_mut(), "poll", |m| m.poll(ctx));
        }
    }

    /// Tear down: `shutdown` every module in reverse order, drop it, then
    /// release every reservation made during `begin`. Idempotent.
    pub fn shutdown(&mut self) {
        if matches!(self.state, SystemState::Uninitialized | SystemState::Stopped) {
            return;
        }
        tracing::info!(modules = self.modules.len(), "System shutdown");

        while let Some(mut module) = self.modules.pop() {
            let ctx = &self.ctx;
            call_isolated(module.as_mut(), "shutdown", |m| m.shutdown(ctx));
        }

        let ledger = self.ctx.ledger();
        for owner in std::mem::take(&mut self.owners) {
            let released = ledger.release_owner(&owner);
            tracing::debug!(owner = %owner, released, "resources released");
        }

        self.state = SystemState::Stopped;
    }

    pub fn state(&self) -> SystemState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SystemState::Running
    }

    /// Instance names in registration order.
    pub fn module_names(&self) -> Vec<String> {
        self.modules
            .iter()
            .map(|m| m.instance_name().to_string())
            .collect()
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("state", &self.state)
            .field("modules", &self.module_names())
            .finish_non_exhaustive()
    }
}

/// A declaration that passed the name checks.
struct Accepted<'a> {
    decl: &'a ModuleDeclaration,
    type_name: &'a str,
    instance: &'a str,
}

/// Drop declarations without a `type` and later reuses of an instance
/// name, before anything is reserved on their behalf.
fn accepted_declarations(config: &SystemConfig) -> Vec<Accepted<'_>> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut accepted = Vec::with_capacity(config.modules.len());

    for decl in &config.modules {
        let (Some(type_name), Some(instance)) = (decl.type_name.as_deref(), decl.instance_name())
        else {
            tracing::warn!("Module declaration without 'type', skipped");
            continue;
        };

        if !seen.insert(instance) {
            tracing::warn!(
                "Duplicate instance name '{}' ({}), skipped",
                instance,
                type_name
            );
            continue;
        }

        accepted.push(Accepted {
            decl,
            type_name,
            instance,
        });
    }
    accepted
}

/// The declaration's `config`, or an empty object (with a warning) when absent.
fn module_config(decl: &ModuleDeclaration, instance: &str) -> Value {
    match &decl.config {
        Some(config) => config.clone(),
        None => {
            tracing::warn!("Module '{}' has no 'config' object, using empty", instance);
            Value::Object(Map::new())
        }
    }
}

fn call_isolated(module: &mut dyn Module, phase: &str, f: impl FnOnce(&mut dyn Module)) {
    let instance = module.instance_name().to_string();
    if let Err(reason) = isolation::catch(|| f(module)) {
        tracing::error!(instance = %instance, phase, %reason, "module panicked, continuing");
    }
}
