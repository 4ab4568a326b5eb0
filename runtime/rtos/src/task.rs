//! Task identity, priority and spawning
//!
//! Tasks are host threads. A thread receives its [`TaskId`] the first time
//! it asks for one, so plain `std::thread`s take part in mutual exclusion
//! exactly like tasks created through [`spawn`]. Priorities are logical:
//! they order wake-ups inside the primitives of this crate.

use core::fmt;
use core::num::NonZeroU32;
use core::sync::atomic::{AtomicU32, Ordering};
use std::cell::Cell;
use std::thread;

use crate::{Result, RtosError, TICK_PERIOD};

static NEXT_TASK_ID: AtomicU32 = AtomicU32::new(0);

thread_local! {
    static CURRENT_TASK: Cell<Option<TaskId>> = const { Cell::new(None) };
    static CURRENT_PRIORITY: Cell<Priority> = const { Cell::new(Priority::DEFAULT) };
}

/// Identity of a task (never zero, so `0` can encode "no task")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(NonZeroU32);

impl TaskId {
    /// Raw non-zero value
    pub const fn as_u32(self) -> u32 {
        self.0.get()
    }

    /// Rebuild an identity from its raw value; `0` yields `None`
    pub const fn from_u32(raw: u32) -> Option<Self> {
        match NonZeroU32::new(raw) {
            Some(id) => Some(TaskId(id)),
            None => None,
        }
    }

    fn allocate() -> Self {
        let raw = NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed);
        TaskId(NonZeroU32::MIN.saturating_add(raw))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// Task priority (larger is more urgent)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(pub u8);

impl Priority {
    /// Lowest priority
    pub const IDLE: Priority = Priority(0);

    /// Priority of tasks that never set one
    pub const DEFAULT: Priority = Priority(100);

    /// Highest priority
    pub const MAX: Priority = Priority(255);
}

impl Default for Priority {
    fn default() -> Self {
        Priority::DEFAULT
    }
}

/// Identity of the calling task
pub fn current_task() -> TaskId {
    CURRENT_TASK.with(|slot| match slot.get() {
        Some(id) => id,
        None => {
            let id = TaskId::allocate();
            slot.set(Some(id));
            id
        }
    })
}

/// Priority of the calling task
pub fn current_priority() -> Priority {
    CURRENT_PRIORITY.with(Cell::get)
}

/// Change the priority of the calling task
pub fn set_current_priority(priority: Priority) {
    CURRENT_PRIORITY.with(|slot| slot.set(priority));
}

/// Block the calling task for a number of ticks
pub fn delay(ticks: u32) {
    thread::sleep(TICK_PERIOD * ticks);
}

/// Give up the processor to any other ready task
pub fn yield_now() {
    thread::yield_now();
}

/// Task creation parameters
#[derive(Debug, Clone)]
pub struct TaskConfig {
    /// Task name (for debugging)
    pub name: &'static str,

    /// Scheduling priority
    pub priority: Priority,

    /// Stack size in bytes, backend default when `None`
    pub stack_size: Option<usize>,
}

impl TaskConfig {
    pub fn new(name: &'static str, priority: Priority) -> Self {
        Self {
            name,
            priority,
            stack_size: None,
        }
    }
}

/// Handle to a spawned task
pub struct TaskHandle<T> {
    id: TaskId,
    name: &'static str,
    inner: thread::JoinHandle<T>,
}

impl<T> TaskHandle<T> {
    /// Identity assigned to the task
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Task name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Check whether the task body has returned
    pub fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }

    /// Wait for the task to finish and collect its result
    ///
    /// # Errors
    /// Returns `RtosError::TaskPanicked` if the task body panicked
    pub fn join(self) -> Result<T> {
        self.inner.join().map_err(|_| RtosError::TaskPanicked(self.name))
    }
}

/// Spawn a task
///
/// The task identity is allocated before the task starts, so the caller can
/// record it (e.g. to assert ownership) without racing the task body.
///
/// # Errors
/// Returns `RtosError::Spawn` if the backend refuses to create the thread
pub fn spawn<F, T>(config: TaskConfig, body: F) -> Result<TaskHandle<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let id = TaskId::allocate();
    let priority = config.priority;

    let mut builder = thread::Builder::new().name(config.name.to_string());
    if let Some(size) = config.stack_size {
        builder = builder.stack_size(size);
    }

    let inner = builder
        .spawn(move || {
            CURRENT_TASK.with(|slot| slot.set(Some(id)));
            CURRENT_PRIORITY.with(|slot| slot.set(priority));
            body()
        })
        .map_err(|e| RtosError::Spawn(e.to_string()))?;

    log::debug!("spawned {} '{}' at priority {}", id, config.name, priority.0);

    Ok(TaskHandle {
        id,
        name: config.name,
        inner,
    })
}
