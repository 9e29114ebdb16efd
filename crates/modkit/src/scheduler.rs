// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Non-blocking cooperative task scheduler.
//!
//! Modules never sleep. Anything that has to happen "later" is registered
//! here and fired from [`Scheduler::poll`], which the orchestrator calls once
//! per loop iteration.
//!
//! # Timing
//!
//! A task is due when `now - last_run >= interval`. The baseline is the
//! registration time, so nothing fires on the poll it was scheduled in
//! (unless the interval is zero). A recurring task resets `last_run` to the
//! poll time, not to `last_run + interval`: a slow loop drifts instead of
//! bursting to catch up.
//!
//! # Re-entrancy
//!
//! Due tasks are copied out under the lock and run with the lock released,
//! so callbacks may schedule and cancel freely. Tasks added during a poll
//! are first considered on the next poll; a task cancelled by an earlier
//! callback of the same poll does not fire.

use crate::hal::Clock;
use crate::isolation;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Scheduled callback.
pub type TaskCallback = Arc<dyn Fn() + Send + Sync>;

/// Cancellation handle. Unique for the scheduler's lifetime, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskHandle(u64);

impl TaskHandle {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct ScheduledTask {
    handle: TaskHandle,
    interval_ms: u64,
    last_run: u64,
    callback: TaskCallback,
    recurring: bool,
}

struct SchedulerInner {
    tasks: Vec<ScheduledTask>,
    next_handle: u64,
}

/// Millisecond task scheduler driven by [`Scheduler::poll`].
pub struct Scheduler {
    clock: Arc<dyn Clock>,
    inner: Mutex<SchedulerInner>,
    panicked: AtomicU64,
}

impl Scheduler {
    /// Create a scheduler reading registration times from `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            inner: Mutex::new(SchedulerInner {
                tasks: Vec::new(),
                next_handle: 1,
            }),
            panicked: AtomicU64::new(0),
        }
    }

    /// Run `callback` once, `delay_ms` after now.
    pub fn schedule_once<F>(&self, delay_ms: u64, callback: F) -> TaskHandle
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.push(delay_ms, Arc::new(callback), false)
    }

    /// Run `callback` every `interval_ms`, first firing one interval from now.
    pub fn schedule_recurring<F>(&self, interval_ms: u64, callback: F) -> TaskHandle
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.push(interval_ms, Arc::new(callback), true)
    }

    fn push(&self, interval_ms: u64, callback: TaskCallback, recurring: bool) -> TaskHandle {
        let now = self.clock.now_ms();
        let mut inner = self.inner.lock();
        let handle = TaskHandle(inner.next_handle);
        inner.next_handle += 1;
        inner.tasks.push(ScheduledTask {
            handle,
            interval_ms,
            last_run: now,
            callback,
            recurring,
        });
        tracing::debug!(
            %handle,
            interval_ms,
            recurring,
            "task scheduled"
        );
        handle
    }

    /// Remove a pending task.
    ///
    /// `false` if the handle is unknown, already fired (one-shot) or already
    /// cancelled.
    pub fn cancel(&self, handle: TaskHandle) -> bool {
        let mut inner = self.inner.lock();
        match inner.tasks.iter().position(|t| t.handle == handle) {
            Some(pos) => {
                inner.tasks.remove(pos);
                tracing::debug!(%handle, "task cancelled");
                true
            }
            None => false,
        }
    }

    /// Check whether `handle` is still scheduled.
    pub fn is_pending(&self, handle: TaskHandle) -> bool {
        self.inner.lock().tasks.iter().any(|t| t.handle == handle)
    }

    /// Number of pending tasks.
    pub fn len(&self) -> usize {
        self.inner.lock().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Callbacks that panicked since creation.
    pub fn panicked_count(&self) -> u64 {
        self.panicked.load(Ordering::Relaxed)
    }

    /// Fire every task due at `now`. Returns the number of callbacks run.
    pub fn poll(&self, now: u64) -> usize {
        let due: Vec<(TaskHandle, TaskCallback)> = {
            let inner = self.inner.lock();
            inner
                .tasks
                .iter()
                .filter(|t| now.wrapping_sub(t.last_run) >= t.interval_ms)
                .map(|t| (t.handle, Arc::clone(&t.callback)))
                .collect()
        };

        let mut fired = 0;
        for (handle, callback) in due {
            if !self.is_pending(handle) {
                continue;
            }

            tracing::trace!(%handle, "executing task");
            if isolation::run_isolated("scheduled task", || callback()).is_none() {
                self.panicked.fetch_add(1, Ordering::Relaxed);
            }
            fired += 1;

            let mut inner = self.inner.lock();
            if let Some(pos) = inner.tasks.iter().position(|t| t.handle == handle) {
                if inner.tasks[pos].recurring {
                    inner.tasks[pos].last_run = now;
                } else {
                    inner.tasks.remove(pos);
                }
            }
        }
        fired
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("tasks", &self.len())
            .field("panicked", &self.panicked_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::ManualClock;
    use std::sync::atomic::AtomicUsize;

    fn scheduler_at(start: u64) -> (Arc<ManualClock>, Scheduler) {
        let clock = Arc::new(ManualClock::new(start));
        let scheduler = Scheduler::new(clock.clone());
        (clock, scheduler)
    }

    fn counter() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        (count, move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_recurring_fires_at_interval() {
        let (_clock, scheduler) = scheduler_at(0);
        let (count, cb) = counter();
        scheduler.schedule_recurring(10, cb);

        let mut fired_at = Vec::new();
        for now in [0, 5, 10, 15, 20] {
            let before = count.load(Ordering::SeqCst);
            scheduler.poll(now);
            if count.load(Ordering::SeqCst) > before {
                fired_at.push(now);
            }
        }
        assert_eq!(fired_at, vec![10, 20]);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_recurring_drifts_instead_of_catching_up() {
        let (_clock, scheduler) = scheduler_at(0);
        let (count, cb) = counter();
        scheduler.schedule_recurring(10, cb);

        // One late poll fires once, then the next deadline is 35 + 10.
        assert_eq!(scheduler.poll(35), 1);
        assert_eq!(scheduler.poll(40), 0);
        assert_eq!(scheduler.poll(45), 1);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_once_fires_once_and_is_removed() {
        let (_clock, scheduler) = scheduler_at(100);
        let (count, cb) = counter();
        let handle = scheduler.schedule_once(50, cb);

        scheduler.poll(149);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        scheduler.poll(150);
        scheduler.poll(300);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!scheduler.is_pending(handle));
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_baseline_is_registration_time() {
        let (clock, scheduler) = scheduler_at(0);
        clock.set(1_000);
        let (count, cb) = counter();
        scheduler.schedule_recurring(100, cb);

        scheduler.poll(1_050);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        scheduler.poll(1_100);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cancel_semantics() {
        let (_clock, scheduler) = scheduler_at(0);
        let (count, cb) = counter();

        assert!(!scheduler.cancel(TaskHandle(999)));

        let once = scheduler.schedule_once(1, || {});
        scheduler.poll(1);
        assert!(!scheduler.cancel(once), "already fired");

        let pending = scheduler.schedule_recurring(10, cb);
        assert!(scheduler.cancel(pending));
        assert!(!scheduler.cancel(pending), "idempotent");
        scheduler.poll(100);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_handles_are_monotonic() {
        let (_clock, scheduler) = scheduler_at(0);
        let a = scheduler.schedule_once(1, || {});
        let b = scheduler.schedule_once(1, || {});
        scheduler.cancel(a);
        let c = scheduler.schedule_once(1, || {});
        assert!(a < b && b < c);
    }

    #[test]
    fn test_callback_can_schedule_during_poll() {
        let (_clock, scheduler) = scheduler_at(0);
        let scheduler = Arc::new(scheduler);
        let (count, cb) = counter();
        let cb = Arc::new(cb);

        let s = Arc::clone(&scheduler);
        scheduler.schedule_once(0, move || {
            let cb = Arc::clone(&cb);
            s.schedule_once(0, move || cb());
        });

        assert_eq!(scheduler.poll(0), 1);
        assert_eq!(count.load(Ordering::SeqCst), 0, "new task waits for next poll");
        assert_eq!(scheduler.poll(0), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_callback_cancels_later_task_in_same_poll() {
        let (_clock, scheduler) = scheduler_at(0);
        let scheduler = Arc::new(scheduler);
        let (count, cb) = counter();

        let victim = Arc::new(Mutex::new(None::<TaskHandle>));
        let s = Arc::clone(&scheduler);
        let v = Arc::clone(&victim);
        scheduler.schedule_once(5, move || {
            if let Some(handle) = *v.lock() {
                s.cancel(handle);
            }
        });
        *victim.lock() = Some(scheduler.schedule_once(5, cb));

        assert_eq!(scheduler.poll(5), 1);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_panicking_task_is_isolated() {
        let (_clock, scheduler) = scheduler_at(0);
        let (count, cb) = counter();
        let bad = scheduler.schedule_recurring(10, || panic!("sensor timeout"));
        scheduler.schedule_recurring(10, cb);

        assert_eq!(scheduler.poll(10), 2);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.panicked_count(), 1);
        assert!(scheduler.is_pending(bad), "recurring task stays scheduled");
    }

    #[test]
    fn test_panicking_once_is_removed() {
        let (_clock, scheduler) = scheduler_at(0);
        let bad = scheduler.schedule_once(1, || panic!("boom"));
        scheduler.poll(1);
        assert!(!scheduler.is_pending(bad));
    }
}
