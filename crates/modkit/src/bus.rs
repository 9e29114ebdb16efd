// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Synchronous publish/subscribe event bus.
//!
//! Event names are flat strings. `publish` runs every subscriber of that
//! name, in subscription order, before returning. Publishing an event nobody
//! listens to is not an error.
//!
//! Payloads are borrowed `dyn Any` values; subscribers downcast to the type
//! they expect and ignore anything else.
//!
//! A subscriber that publishes the event it is handling recurses. Nesting of
//! the same event is capped at [`MAX_REENTRANT_DEPTH`]; deeper publishes are
//! dropped with a warning.

use crate::isolation;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Event payload as seen by subscribers.
pub type Payload = dyn Any + Send + Sync;

/// Event subscriber.
pub type EventCallback = Arc<dyn Fn(Option<&Payload>) + Send + Sync>;

/// Maximum nested dispatches of one event name.
pub const MAX_REENTRANT_DEPTH: usize = 4;

/// Publish/subscribe dispatcher keyed by event name.
#[derive(Default)]
pub struct EventBus {
    listeners: Mutex<HashMap<String, Vec<EventCallback>>>,
    dispatching: Mutex<HashMap<String, usize>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `callback` to the subscribers of `event`.
    pub fn subscribe<F>(&self, event: &str, callback: F)
    where
        F: Fn(Option<&Payload>) + Send + Sync + 'static,
    {
        self.listeners
            .lock()
            .entry(event.to_string())
            .or_default()
            .push(Arc::new(callback));
        tracing::debug!(event, "new listener subscribed");
    }

    /// Publish `event` without payload. Returns the number of subscribers run.
    pub fn publish(&self, event: &str) -> usize {
        self.dispatch(event, None)
    }

    /// Publish `event` with a borrowed payload.
    pub fn publish_with<T>(&self, event: &str, payload: &T) -> usize
    where
        T: Any + Send + Sync,
    {
        self.dispatch(event, Some(payload as &Payload))
    }

    /// Number of subscribers of `event`.
    pub fn subscriber_count(&self, event: &str) -> usize {
        self.listeners.lock().get(event).map_or(0, Vec::len)
    }

    fn dispatch(&self, event: &str, payload: Option<&Payload>) -> usize {
        // Subscribers added while dispatching see the next publish.
        let callbacks = match self.listeners.lock().get(event) {
            Some(list) => list.clone(),
            None => {
                tracing::trace!(event, "no listeners");
                return 0;
            }
        };

        {
            let mut dispatching = self.dispatching.lock();
            let depth = dispatching.entry(event.to_string()).or_insert(0);
            if *depth >= MAX_REENTRANT_DEPTH {
                tracing::warn!(
                    event,
                    depth = *depth,
                    "re-entrant publish dropped"
                );
                return 0;
            }
            *depth += 1;
        }

        tracing::debug!(event, listeners = callbacks.len(), "posting event");
        for callback in &callbacks {
            isolation::run_isolated(event, || callback(payload));
        }

        let mut dispatching = self.dispatching.lock();
        if let Some(depth) = dispatching.get_mut(event) {
            *depth -= 1;
            if *depth == 0 {
                dispatching.remove(event);
            }
        }
        callbacks.len()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listeners = self.listeners.lock();
        let mut events: Vec<_> = listeners.keys().collect();
        events.sort();
        f.debug_struct("EventBus").field("events", &events).finish()
    }
}
