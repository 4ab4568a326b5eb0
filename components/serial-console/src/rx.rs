//! Receive queue
//!
//! Bounded FIFO between the interrupt callback (single producer) and reading
//! tasks. A character arriving while the queue is full is discarded and
//! counted; nothing already queued is displaced.

use core::sync::atomic::{AtomicU64, Ordering};

use sercon_rtos::{IsrContext, Queue, RtosError, Timeout};

use crate::{ConsoleError, Result};

#[derive(Debug)]
pub struct RxQueue {
    queue: Queue<u8>,
    received: AtomicU64,
    dropped: AtomicU64,
}

impl RxQueue {
    /// # Errors
    /// Returns `ConsoleError::Rtos` if `capacity` is zero
    pub fn new(capacity: usize) -> Result<Self> {
        Ok(Self {
            queue: Queue::new(capacity)?,
            received: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        })
    }

    /// Enqueue a received character from interrupt context
    ///
    /// Returns `false` if the queue was full and the character was dropped.
    pub fn push_from_isr(&self, byte: u8, ctx: &mut IsrContext) -> bool {
        match self.queue.send_from_isr(byte, ctx) {
            Ok(()) => {
                self.received.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(lost) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                log::trace!("rx overrun, dropped {:#04x}", lost);
                false
            }
        }
    }

    /// Dequeue the oldest character, waiting up to `timeout`
    ///
    /// # Errors
    /// Returns `ConsoleError::Timeout` if nothing arrived in time
    pub fn pop(&self, timeout: Timeout) -> Result<u8> {
        self.queue.receive(timeout).map_err(|e| match e {
            RtosError::Timeout => ConsoleError::Timeout,
            other => ConsoleError::Rtos(other),
        })
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Characters accepted into the queue so far
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    /// Characters discarded because the queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
