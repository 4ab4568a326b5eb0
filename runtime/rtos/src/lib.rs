//! # RTOS Platform Layer
//!
//! The serial console runs on a preemptive, priority-based scheduler with a
//! separate interrupt context. This crate provides the subset of that
//! scheduler the console relies on, with the same shape regardless of
//! backend:
//!
//! - **Tasks**: identity, priority, spawning ([`task`])
//! - **Timeouts**: tick-based "no wait" / bounded / forever waits ([`Timeout`])
//! - **Binary mutex**: priority-ordered ownership ([`BinaryMutex`])
//! - **Binary semaphore**: single-slot signal with a from-interrupt post ([`BinarySemaphore`])
//! - **Queue**: bounded FIFO with a from-interrupt send ([`Queue`])
//! - **Interrupt context**: the "higher priority task woken" protocol ([`isr`])
//!
//! ## Usage
//!
//! ```rust
//! use sercon_rtos::{isr, BinarySemaphore, Timeout};
//!
//! let done = BinarySemaphore::new();
//!
//! isr::run(|ctx| {
//!     done.give_from_isr(ctx);
//!     isr::yield_from_isr(ctx);
//! });
//!
//! assert!(done.take(Timeout::NoWait).is_ok());
//! ```
//!
//! ## Backends
//!
//! Only the host backend exists today: tasks are OS threads, interrupt
//! context is a thread-local flag set for the duration of [`isr::run`].
//! Blocking operations assert they are not running in interrupt context.

use thiserror::Error;

pub mod isr;
pub mod task;

mod mutex;
mod queue;
mod semaphore;
mod timeout;
mod wait;

pub use isr::IsrContext;
pub use mutex::BinaryMutex;
pub use queue::Queue;
pub use semaphore::BinarySemaphore;
pub use task::{current_priority, current_task, spawn, Priority, TaskConfig, TaskHandle, TaskId};
pub use timeout::{Timeout, TICK_PERIOD, TICK_RATE_HZ};

/// Scheduler primitive errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RtosError {
    #[error("operation timed out")]
    Timeout,

    #[error("queue is full")]
    QueueFull,

    #[error("queue capacity must be non-zero")]
    ZeroCapacity,

    #[error("mutex given by {caller}, which does not hold it")]
    NotOwner { caller: TaskId },

    #[error("failed to spawn task: {0}")]
    Spawn(String),

    #[error("task '{0}' panicked")]
    TaskPanicked(&'static str),
}

pub type Result<T> = core::result::Result<T, RtosError>;
