// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Instance-scoped command router.
//!
//! Modules register handlers under `(instance name, command name)`. A text
//! line `"<instance_name> <command> [args...]"` (from a serial console, a
//! network shell, ...) is routed to the matching handler, which returns a
//! single-line result.
//!
//! # Tokenizing
//!
//! The line is split on every single space, so repeated spaces yield empty
//! arguments: `"lamp1 blink  200"` passes `["", "200"]` to `blink`. A
//! trailing space does not add a final empty token, and an empty line has no
//! tokens at all. Callers strip line terminators before `execute`.

use crate::isolation;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Command handler: positional arguments in, result line out.
pub type CommandHandler = Arc<dyn Fn(&[String]) -> String + Send + Sync>;

/// Result for a line with fewer than two tokens.
pub const INVALID_FORMAT: &str =
    "ERROR: Invalid command format. Expected '<instance_name> <command> [args...]'.";

/// Result for an unknown `(instance, command)` pair.
pub const NOT_FOUND: &str = "ERROR: Command not found.";

/// Result when the handler panicked.
pub const HANDLER_FAILED: &str = "ERROR: Command failed.";

/// `(instance, command) → handler` table.
#[derive(Default)]
pub struct CommandRouter {
    handlers: Mutex<BTreeMap<(String, String), CommandHandler>>,
}

impl CommandRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `command` on `instance`.
    ///
    /// An existing handler for the same pair is replaced with a warning.
    /// Always returns `true`.
    pub fn register_command<F>(&self, instance: &str, command: &str, handler: F) -> bool
    where
        F: Fn(&[String]) -> String + Send + Sync + 'static,
    {
        let key = (instance.to_string(), command.to_string());
        let previous = self.handlers.lock().insert(key, Arc::new(handler));
        if previous.is_some() {
            tracing::warn!(
                "Command '{}' is already registered for instance '{}', overwriting",
                command,
                instance
            );
        } else {
            tracing::debug!(instance, command, "command registered");
        }
        true
    }

    /// Parse and run one command line.
    pub fn execute(&self, line: &str) -> String {
        let mut segments = tokenize(line);
        if segments.len() < 2 {
            return INVALID_FORMAT.to_string();
        }

        let args = segments.split_off(2);
        let command = segments.pop().unwrap_or_default();
        let instance = segments.pop().unwrap_or_default();

        let handler = self
            .handlers
            .lock()
            .get(&(instance.clone(), command.clone()))
            .cloned();

        match handler {
            Some(handler) => {
                tracing::info!("Executing command '{}' for instance '{}'", command, instance);
                isolation::run_isolated(&command, || handler(&args))
                    .unwrap_or_else(|| HANDLER_FAILED.to_string())
            }
            None => {
                tracing::warn!("Command '{}' not found for instance '{}'", command, instance);
                NOT_FOUND.to_string()
            }
        }
    }

    /// Commands registered for `instance`, sorted.
    pub fn commands_for(&self, instance: &str) -> Vec<String> {
        self.handlers
            .lock()
            .keys()
            .filter(|(owner, _)| owner == instance)
            .map(|(_, command)| command.clone())
            .collect()
    }

    /// Instances with at least one command, sorted and deduplicated.
    pub fn instances(&self) -> Vec<String> {
        let mut instances: Vec<String> = self
            .handlers
            .lock()
            .keys()
            .map(|(owner, _)| owner.clone())
            .collect();
        instances.dedup();
        instances
    }
}

impl fmt::Debug for CommandRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRouter")
            .field("commands", &self.handlers.lock().len())
            .finish()
    }
}

/// Split on single spaces, dropping only a final empty segment.
fn tokenize(line: &str) -> Vec<String> {
    let mut segments: Vec<String> = line.split(' ').map(str::to_string).collect();
    if segments.last().is_some_and(String::is_empty) {
        segments.pop();
    }
    segments
}
