//! Serial Console Driver
//!
//! # Purpose
//! Lets any number of prioritized tasks share one UART as a console. Whole
//! messages come out contiguously, a task can nest console sections
//! without deadlocking itself, and characters received by the interrupt
//! handler are handed to tasks in arrival order.
//!
//! # Integration Points
//! - Depends on: `sercon-rtos` (mutex, semaphore, queue, interrupt
//!   context), `sercon-uart` (driver capability and events)
//! - Provides to: command-line console, host simulation tool
//!
//! # Architecture
//! ```text
//!   task A ──┐                           ┌──> RxQueue ──> read_char
//!   task B ──┼─ ConsoleLock ─ write ─ UART                 (tasks)
//!   task C ──┘      (recursive)   ▲       └──> TxCompleteSignal
//!                                 │              │
//!                                 └── wait ──────┘   (interrupt callback)
//! ```
//!
//! A write holds the [`ConsoleLock`] from submission until the interrupt
//! callback reports transmit completion, so at most one transmission is in
//! flight. The callback runs in interrupt context and only uses the
//! non-blocking from-interrupt primitives.
//!
//! # Testing Strategy
//! - Unit tests: lock recursion and ownership, queue overrun accounting,
//!   callback dispatch per event kind, configuration parsing
//! - Integration tests: concurrent writers against [`sercon_uart::SimUart`],
//!   end-to-end receive/transmit scenarios, fault paths
//! - Benchmarks: write path latency (`benches/write_path.rs`)

use sercon_rtos::RtosError;
use sercon_uart::{UartError, UartErrorFlags};
use thiserror::Error;

mod callback;
mod config;
mod driver;
mod lock;
mod rx;
mod stats;
mod tx;

pub use config::{ConsoleConfig, RxMode, TxErrorPolicy, DEFAULT_QUEUE_CAPACITY};
pub use driver::{ConsoleWriter, PortHandle, SerialConsole};
pub use lock::{ConsoleGuard, ConsoleLock};
pub use rx::RxQueue;
pub use stats::ConsoleStats;
pub use tx::{TxCompleteSignal, TxOutcome};

/// Serial console errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsoleError {
    /// Nothing was received before the read timeout elapsed
    #[error("no character received before the timeout")]
    Timeout,

    #[error("failed to open UART: {0}")]
    Open(UartError),

    /// The driver refused a transmission. The console lock has already been
    /// released, but the port is in an unknown state.
    #[error("UART rejected transmission: {0}")]
    Submit(UartError),

    #[error("transmission aborted by hardware: {0:?}")]
    Transmit(UartErrorFlags),

    #[error("invalid console configuration: {0}")]
    InvalidConfig(&'static str),

    #[error("scheduler error: {0}")]
    Rtos(#[from] RtosError),
}

impl ConsoleError {
    /// Whether the console should be treated as unusable
    ///
    /// Only driver submission failures are fatal; a timed out read or an
    /// aborted transmission leaves the console consistent.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ConsoleError::Submit(_))
    }
}

pub type Result<T> = core::result::Result<T, ConsoleError>;
