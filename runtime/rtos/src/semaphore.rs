//! Binary semaphore
//!
//! A single-slot signal: giving an already-given semaphore is a no-op, taking
//! consumes the slot. Built on a one-element crossbeam channel, which gives a
//! non-blocking post that is safe from interrupt context.

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};

use crate::isr::{self, IsrContext};
use crate::wait::WaitCount;
use crate::{Result, RtosError, Timeout};

/// Binary semaphore, created empty
#[derive(Debug)]
pub struct BinarySemaphore {
    slot_tx: Sender<()>,
    slot_rx: Receiver<()>,
    waiting: WaitCount,
}

impl BinarySemaphore {
    pub fn new() -> Self {
        let (slot_tx, slot_rx) = channel::bounded(1);
        Self {
            slot_tx,
            slot_rx,
            waiting: WaitCount::new(),
        }
    }

    /// Give the semaphore from task context
    ///
    /// Returns `false` if it was already given.
    pub fn give(&self) -> bool {
        self.slot_tx.try_send(()).is_ok()
    }

    /// Give the semaphore from interrupt context
    ///
    /// Never blocks. Records in `ctx` whether a blocked task was made ready.
    pub fn give_from_isr(&self, ctx: &mut IsrContext) -> bool {
        let had_waiters = self.waiting.get() > 0;
        let given = self.slot_tx.try_send(()).is_ok();
        if given && had_waiters {
            ctx.note_task_woken();
        }
        given
    }

    /// Take the semaphore, blocking up to `timeout`
    ///
    /// # Errors
    /// Returns `RtosError::Timeout` if the semaphore was not given in time
    ///
    /// # Panics
    /// Panics when a blocking take is attempted from interrupt context
    pub fn take(&self, timeout: Timeout) -> Result<()> {
        if !timeout.may_block() {
            return match self.slot_rx.try_recv() {
                Ok(()) => Ok(()),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => Err(RtosError::Timeout),
            };
        }

        isr::assert_task_context("BinarySemaphore::take");
        let _waiting = self.waiting.enter();

        match timeout.as_duration() {
            None => self.slot_rx.recv().map_err(|_| RtosError::Timeout),
            Some(limit) => self.slot_rx.recv_timeout(limit).map_err(|e| match e {
                RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected => RtosError::Timeout,
            }),
        }
    }

    /// Check whether the semaphore is currently given
    pub fn is_given(&self) -> bool {
        !self.slot_rx.is_empty()
    }

    /// Number of tasks blocked in [`BinarySemaphore::take`]
    pub fn waiter_count(&self) -> usize {
        self.waiting.get()
    }
}

impl Default for BinarySemaphore {
    fn default() -> Self {
        Self::new()
    }
}
