//! Binary mutex with priority-ordered hand-off
//!
//! Exactly one task holds the mutex at a time. Blocked tasks are granted the
//! mutex highest priority first, FIFO among equal priorities. A task that
//! arrives while others are already waiting queues behind them rather than
//! barging in on a release.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use crate::isr;
use crate::task::{current_priority, current_task, Priority, TaskId};
use crate::{Result, RtosError, Timeout};

#[derive(Debug)]
struct Waiter {
    task: TaskId,
    priority: Priority,
    seq: u64,
}

#[derive(Debug, Default)]
struct MutexState {
    holder: Option<TaskId>,
    waiters: Vec<Waiter>,
    next_seq: u64,
}

impl MutexState {
    /// Sequence number of the waiter that should be granted next
    fn next_in_line(&self) -> Option<u64> {
        self.waiters
            .iter()
            .max_by(|a, b| a.priority.cmp(&b.priority).then(b.seq.cmp(&a.seq)))
            .map(|w| w.seq)
    }

    fn remove(&mut self, seq: u64) {
        self.waiters.retain(|w| w.seq != seq);
    }
}

/// Binary mutex
#[derive(Debug, Default)]
pub struct BinaryMutex {
    state: Mutex<MutexState>,
    released: Condvar,
}

impl BinaryMutex {
    /// Create an unlocked mutex
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MutexState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take the mutex, blocking up to `timeout`
    ///
    /// # Errors
    /// Returns `RtosError::Timeout` if the mutex could not be taken in time
    ///
    /// # Panics
    /// Panics when called from interrupt context
    pub fn take(&self, timeout: Timeout) -> Result<()> {
        isr::assert_task_context("BinaryMutex::take");

        let me = current_task();
        let mut state = self.state();

        if state.holder.is_none() && state.waiters.is_empty() {
            state.holder = Some(me);
            return Ok(());
        }
        if !timeout.may_block() {
            return Err(RtosError::Timeout);
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        state.waiters.push(Waiter {
            task: me,
            priority: current_priority(),
            seq,
        });

        let deadline = timeout.deadline();
        loop {
            if state.holder.is_none() && state.next_in_line() == Some(seq) {
                state.remove(seq);
                state.holder = Some(me);
                return Ok(());
            }

            state = match deadline {
                None => self.released.wait(state).unwrap_or_else(PoisonError::into_inner),
                Some(at) => {
                    let now = Instant::now();
                    if now >= at {
                        state.remove(seq);
                        // The head of the line may have changed
                        self.released.notify_all();
                        return Err(RtosError::Timeout);
                    }
                    self.released
                        .wait_timeout(state, at - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
    }

    /// Give the mutex back, waking the next waiter in priority order
    ///
    /// # Errors
    /// Returns `RtosError::NotOwner` if the caller does not hold the mutex
    pub fn give(&self) -> Result<()> {
        let me = current_task();
        let mut state = self.state();

        if state.holder != Some(me) {
            return Err(RtosError::NotOwner { caller: me });
        }
        state.holder = None;
        let contended = !state.waiters.is_empty();
        drop(state);

        if contended {
            self.released.notify_all();
        }
        Ok(())
    }

    /// Current holder
    pub fn holder(&self) -> Option<TaskId> {
        self.state().holder
    }

    /// Check whether some task holds the mutex
    pub fn is_locked(&self) -> bool {
        self.holder().is_some()
    }

    /// Number of tasks blocked in [`BinaryMutex::take`]
    pub fn waiter_count(&self) -> usize {
        self.state().waiters.len()
    }

    /// Tasks blocked in [`BinaryMutex::take`], in the order they will be granted
    pub fn waiters(&self) -> Vec<TaskId> {
        let state = self.state();
        let mut waiters: Vec<&Waiter> = state.waiters.iter().collect();
        waiters.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.seq.cmp(&b.seq)));
        waiters.into_iter().map(|w| w.task).collect()
    }
}
