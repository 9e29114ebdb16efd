// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Panic containment for callbacks.
//!
//! Scheduled tasks, event handlers, command handlers and module lifecycle
//! calls all run user code on the one poll loop. A panic in any of them is
//! caught here, logged, and the loop carries on with the next callback.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Run `f`, returning the panic message instead of unwinding.
pub fn catch<R>(f: impl FnOnce() -> R) -> Result<R, String> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| panic_message(payload.as_ref()))
}

/// Run `f`, logging a panic against `label`. `None` if it panicked.
pub fn run_isolated<R>(label: &str, f: impl FnOnce() -> R) -> Option<R> {
    match catch(f) {
        Ok(value) => Some(value),
        Err(reason) => {
            tracing::error!(callback = label, %reason, "callback panicked, continuing");
            None
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catch_ok() {
        assert_eq!(catch(|| 7), Ok(7));
    }

    #[test]
    fn test_catch_str_panic() {
        let err = catch(|| -> u8 { panic!("boom") }).unwrap_err();
        assert_eq!(err, "boom");
    }

    #[test]
    fn test_catch_formatted_panic() {
        let pin = 13;
        let err = catch(|| -> u8 { panic!("pin {} stuck", pin) }).unwrap_err();
        assert_eq!(err, "pin 13 stuck");
    }

    #[test]
    fn test_run_isolated_returns_none_on_panic() {
        assert_eq!(run_isolated("test", || 1), Some(1));
        assert_eq!(run_isolated("test", || -> i32 { panic!("x") }), None);
    }
}
