//! Recursive console lock
//!
//! Grants exclusive use of the console to one task at a time. The owner may
//! acquire again without blocking; the underlying binary mutex is only given
//! back when every acquire has been matched by a release. Contending tasks
//! are granted the lock highest priority first.

use core::marker::PhantomData;
use core::sync::atomic::{AtomicU32, Ordering};

use sercon_rtos::{current_task, BinaryMutex, TaskId, Timeout};

/// Owner value meaning "not held"
const NO_OWNER: u32 = 0;

#[derive(Debug, Default)]
pub struct ConsoleLock {
    mutex: BinaryMutex,
    /// `TaskId` of the holder, written only while holding `mutex`
    owner: AtomicU32,
    /// Nesting depth, touched only by the owner
    depth: AtomicU32,
}

impl ConsoleLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock, blocking without limit if another task holds it
    ///
    /// # Panics
    /// Panics when called from interrupt context
    pub fn acquire(&self) {
        let me = current_task();
        if self.owner.load(Ordering::Acquire) != me.as_u32() {
            // An unbounded take only returns once the mutex is ours
            while self.mutex.take(Timeout::Forever).is_err() {}
            self.owner.store(me.as_u32(), Ordering::Release);
            log::debug!("console lock taken by {}", me);
        }
        self.depth.fetch_add(1, Ordering::Relaxed);
    }

    /// Undo one `acquire`
    ///
    /// # Panics
    /// Panics if the caller does not own the lock, which also covers
    /// releasing more times than acquired.
    #[track_caller]
    pub fn release(&self) {
        let me = current_task();
        let owner = self.owner.load(Ordering::Acquire);
        assert!(
            owner == me.as_u32(),
            "console lock released by {} which does not own it (owner: {})",
            me,
            TaskId::from_u32(owner).map_or_else(|| "none".to_string(), |t| t.to_string()),
        );

        let depth = self.depth.load(Ordering::Relaxed);
        assert!(depth > 0, "console lock released more times than acquired");
        self.depth.store(depth - 1, Ordering::Relaxed);

        if depth == 1 {
            self.owner.store(NO_OWNER, Ordering::Release);
            if let Err(e) = self.mutex.give() {
                panic!("console lock owner record out of sync with its mutex: {e}");
            }
            log::debug!("console lock released by {}", me);
        }
    }

    /// Acquire and return a guard that releases on drop
    pub fn lock(&self) -> ConsoleGuard<'_> {
        self.acquire();
        ConsoleGuard {
            lock: self,
            _not_send: PhantomData,
        }
    }

    /// Current holder, if any
    pub fn owner(&self) -> Option<TaskId> {
        TaskId::from_u32(self.owner.load(Ordering::Acquire))
    }

    /// Nesting depth; meaningful to the owner, zero when free
    pub fn depth(&self) -> u32 {
        self.depth.load(Ordering::Relaxed)
    }

    /// Number of tasks blocked in `acquire`
    pub fn waiter_count(&self) -> usize {
        self.mutex.waiter_count()
    }
}

/// Scoped hold on the [`ConsoleLock`]
///
/// Bound to the acquiring task: it cannot be moved to another thread, since
/// the release must come from the owner.
#[must_use = "the console lock is released as soon as the guard is dropped"]
pub struct ConsoleGuard<'a> {
    lock: &'a ConsoleLock,
    _not_send: PhantomData<*const ()>,
}

impl ConsoleGuard<'_> {
    /// Nesting depth including this guard
    pub fn depth(&self) -> u32 {
        self.lock.depth()
    }
}

impl Drop for ConsoleGuard<'_> {
    fn drop(&mut self) {
        self.lock.release();
    }
}
