//! Bounded FIFO queue
//!
//! Capacity is fixed at creation. Items are delivered in insertion order.
//! The queue carries its own synchronization, so any number of tasks may
//! send and receive concurrently; interrupt handlers use
//! [`Queue::send_from_isr`], which never blocks.

use crossbeam::channel::{self, Receiver, RecvTimeoutError, SendTimeoutError, Sender, TryRecvError, TrySendError};

use crate::isr::{self, IsrContext};
use crate::wait::WaitCount;
use crate::{Result, RtosError, Timeout};

/// Bounded FIFO queue of `T`
#[derive(Debug)]
pub struct Queue<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
    capacity: usize,
    receivers_waiting: WaitCount,
}

impl<T> Queue<T> {
    /// Create a queue holding at most `capacity` items
    ///
    /// # Errors
    /// Returns `RtosError::ZeroCapacity` if `capacity` is 0
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(RtosError::ZeroCapacity);
        }

        let (tx, rx) = channel::bounded(capacity);
        Ok(Self {
            tx,
            rx,
            capacity,
            receivers_waiting: WaitCount::new(),
        })
    }

    /// Append an item from task context, blocking up to `timeout` while full
    ///
    /// # Errors
    /// Returns `RtosError::QueueFull` if no space became available in time
    pub fn send(&self, item: T, timeout: Timeout) -> Result<()> {
        if !timeout.may_block() {
            return self.tx.try_send(item).map_err(|_| RtosError::QueueFull);
        }

        isr::assert_task_context("Queue::send");
        match timeout.as_duration() {
            None => self.tx.send(item).map_err(|_| RtosError::QueueFull),
            Some(limit) => self.tx.send_timeout(item, limit).map_err(|e| match e {
                SendTimeoutError::Timeout(_) | SendTimeoutError::Disconnected(_) => RtosError::QueueFull,
            }),
        }
    }

    /// Append an item from interrupt context
    ///
    /// Never blocks. When the queue is full the item is handed back in `Err`.
    /// Records in `ctx` whether a blocked receiver was made ready.
    pub fn send_from_isr(&self, item: T, ctx: &mut IsrContext) -> core::result::Result<(), T> {
        let had_waiters = self.receivers_waiting.get() > 0;
        match self.tx.try_send(item) {
            Ok(()) => {
                if had_waiters {
                    ctx.note_task_woken();
                }
                Ok(())
            }
            Err(TrySendError::Full(item) | TrySendError::Disconnected(item)) => Err(item),
        }
    }

    /// Remove the oldest item, blocking up to `timeout` while empty
    ///
    /// # Errors
    /// Returns `RtosError::Timeout` if nothing arrived in time
    ///
    /// # Panics
    /// Panics when a blocking receive is attempted from interrupt context
    pub fn receive(&self, timeout: Timeout) -> Result<T> {
        if !timeout.may_block() {
            return self.rx.try_recv().map_err(|e| match e {
                TryRecvError::Empty | TryRecvError::Disconnected => RtosError::Timeout,
            });
        }

        isr::assert_task_context("Queue::receive");
        let _waiting = self.receivers_waiting.enter();

        match timeout.as_duration() {
            None => self.rx.recv().map_err(|_| RtosError::Timeout),
            Some(limit) => self.rx.recv_timeout(limit).map_err(|e| match e {
                RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected => RtosError::Timeout,
            }),
        }
    }

    /// Number of queued items
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.rx.is_full()
    }

    /// Capacity fixed at creation
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of tasks blocked in [`Queue::receive`]
    pub fn receiver_count(&self) -> usize {
        self.receivers_waiting.get()
    }
}
