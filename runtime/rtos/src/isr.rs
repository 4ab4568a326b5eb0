//! Interrupt context model
//!
//! Code running inside [`run`] is treated as interrupt context: it must not
//! block, and the primitives' blocking operations assert as much. Posting to a
//! primitive from interrupt context goes through the `*_from_isr` variants,
//! which record in the [`IsrContext`] whether a waiting task was made ready.
//! The handler then calls [`yield_from_isr`] before returning so the woken
//! task runs as soon as the interrupt exits.

use core::sync::atomic::{AtomicU64, Ordering};
use std::cell::Cell;
use std::thread;

thread_local! {
    static IN_ISR: Cell<bool> = const { Cell::new(false) };
}

static YIELD_REQUESTS: AtomicU64 = AtomicU64::new(0);

/// Per-interrupt bookkeeping handed to from-interrupt operations
#[derive(Debug, Default)]
pub struct IsrContext {
    higher_priority_task_woken: bool,
}

impl IsrContext {
    fn new() -> Self {
        Self::default()
    }

    /// Record that an operation made a blocked task ready
    pub fn note_task_woken(&mut self) {
        self.higher_priority_task_woken = true;
    }

    /// Whether a context switch should be requested on exit
    pub fn higher_priority_task_woken(&self) -> bool {
        self.higher_priority_task_woken
    }
}

struct IsrScope {
    outer: bool,
}

impl IsrScope {
    fn enter() -> Self {
        let outer = IN_ISR.with(|flag| flag.replace(true));
        Self { outer }
    }
}

impl Drop for IsrScope {
    fn drop(&mut self) {
        IN_ISR.with(|flag| flag.set(self.outer));
    }
}

/// Execute `handler` in interrupt context
///
/// Nested calls are allowed (nested interrupts); the flag is restored on exit,
/// including when the handler panics.
pub fn run<R>(handler: impl FnOnce(&mut IsrContext) -> R) -> R {
    let _scope = IsrScope::enter();
    let mut ctx = IsrContext::new();
    handler(&mut ctx)
}

/// Check whether the caller is running in interrupt context
pub fn in_isr() -> bool {
    IN_ISR.with(Cell::get)
}

/// Request a context switch if the interrupt woke a task
///
/// Clears the woken flag, so calling it twice requests at most one switch.
pub fn yield_from_isr(ctx: &mut IsrContext) {
    if core::mem::take(&mut ctx.higher_priority_task_woken) {
        YIELD_REQUESTS.fetch_add(1, Ordering::Relaxed);
        thread::yield_now();
    }
}

/// Number of context switches requested from interrupt context so far
pub fn yield_requests() -> u64 {
    YIELD_REQUESTS.load(Ordering::Relaxed)
}

/// Panic if called from interrupt context
///
/// Blocking in an interrupt handler would stall the whole system; this is a
/// programming error, not a runtime condition.
#[track_caller]
pub(crate) fn assert_task_context(operation: &str) {
    assert!(!in_isr(), "{operation} may block and cannot be called from interrupt context");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_sets_and_restores_flag() {
        assert!(!in_isr());
        run(|_| {
            assert!(in_isr());
            run(|_| assert!(in_isr()));
            assert!(in_isr());
        });
        assert!(!in_isr());
    }

    #[test]
    fn test_flag_restored_after_panic() {
        let result = std::panic::catch_unwind(|| run(|_| panic!("handler fault")));
        assert!(result.is_err());
        assert!(!in_isr());
    }

    #[test]
    fn test_yield_only_when_woken() {
        let before = yield_requests();
        run(|ctx| yield_from_isr(ctx));

        run(|ctx| {
            ctx.note_task_woken();
            assert!(ctx.higher_priority_task_woken());
            yield_from_isr(ctx);
            assert!(!ctx.higher_priority_task_woken());
            yield_from_isr(ctx);
        });
        // Other tests may request yields concurrently
        assert!(yield_requests() >= before + 1);
    }

    #[test]
    #[should_panic(expected = "cannot be called from interrupt context")]
    fn test_blocking_in_isr_panics() {
        run(|_| assert_task_context("probe"));
    }
}
