//! Transmit-complete signal
//!
//! Binary signal posted by the interrupt callback when a transmission ends
//! and consumed by the one writer waiting on it. The outcome travels
//! alongside the signal so a hardware error can wake the writer too.

use core::sync::atomic::{AtomicU8, Ordering};

use sercon_rtos::{BinarySemaphore, IsrContext, Timeout};
use sercon_uart::UartErrorFlags;

/// How a transmission ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOutcome {
    Complete,
    Failed(UartErrorFlags),
}

/// Outcome encoding: 0 for `Complete`, otherwise `FAILED | flags`
const FAILED: u8 = 0x80;

#[derive(Debug, Default)]
pub struct TxCompleteSignal {
    done: BinarySemaphore,
    outcome: AtomicU8,
}

impl TxCompleteSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Post the end of a transmission from interrupt context
    pub fn post_from_isr(&self, outcome: TxOutcome, ctx: &mut IsrContext) {
        let encoded = match outcome {
            TxOutcome::Complete => 0,
            TxOutcome::Failed(flags) => FAILED | flags.bits(),
        };
        self.outcome.store(encoded, Ordering::Release);
        self.done.give_from_isr(ctx);
    }

    /// Block without limit until the in-flight transmission ends
    ///
    /// # Panics
    /// Panics when called from interrupt context
    pub fn wait(&self) -> TxOutcome {
        while self.done.take(Timeout::Forever).is_err() {}

        let encoded = self.outcome.swap(0, Ordering::Acquire);
        if encoded & FAILED == 0 {
            TxOutcome::Complete
        } else {
            TxOutcome::Failed(UartErrorFlags::from_bits_truncate(encoded & !FAILED))
        }
    }

    /// Whether a post is pending that no writer has consumed
    pub fn is_posted(&self) -> bool {
        self.done.is_given()
    }
}
