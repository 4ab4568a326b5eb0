//! Interrupt-side event handling
//!
//! Everything here runs in interrupt context and must not block: the receive
//! queue and transmit signal are only touched through their from-interrupt
//! operations.

use core::sync::atomic::{AtomicBool, Ordering};

use sercon_rtos::{isr, IsrContext};
use sercon_uart::UartEvent;

use crate::config::{RxMode, TxErrorPolicy};
use crate::rx::RxQueue;
use crate::stats::{ConsoleStats, TxCounters};
use crate::tx::{TxCompleteSignal, TxOutcome};

/// State shared between writing/reading tasks and the interrupt callback
#[derive(Debug)]
pub(crate) struct ConsoleShared {
    pub(crate) rx: RxQueue,
    pub(crate) tx_done: TxCompleteSignal,
    /// Set by the writer before submitting, cleared when the outcome is posted
    tx_outstanding: AtomicBool,
    pub(crate) counters: TxCounters,
    rx_mode: RxMode,
    tx_error_policy: TxErrorPolicy,
}

impl ConsoleShared {
    pub(crate) fn new(rx: RxQueue, rx_mode: RxMode, tx_error_policy: TxErrorPolicy) -> Self {
        Self {
            rx,
            tx_done: TxCompleteSignal::new(),
            tx_outstanding: AtomicBool::new(false),
            counters: TxCounters::default(),
            rx_mode,
            tx_error_policy,
        }
    }

    pub(crate) fn begin_transmission(&self) {
        self.tx_outstanding.store(true, Ordering::Release);
    }

    /// The driver refused the submission; no completion will follow
    pub(crate) fn abandon_transmission(&self) {
        self.tx_outstanding.store(false, Ordering::Release);
    }

    pub(crate) fn snapshot(&self) -> ConsoleStats {
        let mut stats = ConsoleStats {
            rx_bytes: self.rx.received(),
            rx_dropped: self.rx.dropped(),
            ..ConsoleStats::default()
        };
        self.counters.fill(&mut stats);
        stats
    }

    /// Dispatch one UART event
    ///
    /// `rearm` arms the UART for the next character; it is only called in
    /// [`RxMode::RearmPerCharacter`].
    pub(crate) fn handle_event(&self, event: UartEvent, ctx: &mut IsrContext, rearm: impl FnOnce()) {
        match event {
            UartEvent::RxChar(byte) => {
                self.rx.push_from_isr(byte, ctx);
                if self.rx_mode == RxMode::RearmPerCharacter {
                    rearm();
                }
                isr::yield_from_isr(ctx);
            }
            UartEvent::TxComplete => {
                if self.finish_transmission(TxOutcome::Complete, ctx) {
                    isr::yield_from_isr(ctx);
                } else {
                    log::trace!("tx complete with no write outstanding");
                    self.counters.record_ignored();
                }
            }
            UartEvent::TxError(flags) if self.tx_error_policy == TxErrorPolicy::ReleaseWriter => {
                if self.finish_transmission(TxOutcome::Failed(flags), ctx) {
                    isr::yield_from_isr(ctx);
                } else {
                    self.counters.record_ignored();
                }
            }
            other => {
                log::trace!("ignored uart event {:?}", other);
                self.counters.record_ignored();
            }
        }
    }

    /// Post `outcome` to the waiting writer, if a write is outstanding
    fn finish_transmission(&self, outcome: TxOutcome, ctx: &mut IsrContext) -> bool {
        if !self.tx_outstanding.swap(false, Ordering::AcqRel) {
            return false;
        }
        self.tx_done.post_from_isr(outcome, ctx);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sercon_rtos::Timeout;
    use sercon_uart::UartErrorFlags;

    fn shared(rx_mode: RxMode, policy: TxErrorPolicy) -> ConsoleShared {
        ConsoleShared::new(RxQueue::new(4).unwrap(), rx_mode, policy)
    }

    fn dispatch(shared: &ConsoleShared, event: UartEvent) -> bool {
        let mut rearmed = false;
        isr::run(|ctx| shared.handle_event(event, ctx, || rearmed = true));
        rearmed
    }

    #[test]
    fn test_rx_char_enqueued() {
        let shared = shared(RxMode::Continuous, TxErrorPolicy::ReleaseWriter);
        assert!(!dispatch(&shared, UartEvent::RxChar(b'k')));
        assert_eq!(shared.rx.pop(Timeout::NoWait), Ok(b'k'));
    }

    #[test]
    fn test_rx_char_rearms_per_character() {
        let shared = shared(RxMode::RearmPerCharacter, TxErrorPolicy::ReleaseWriter);
        assert!(dispatch(&shared, UartEvent::RxChar(b'k')));
    }

    #[test]
    fn test_rearm_even_when_queue_full() {
        let shared = shared(RxMode::RearmPerCharacter, TxErrorPolicy::ReleaseWriter);
        for byte in *b"abcd" {
            dispatch(&shared, UartEvent::RxChar(byte));
        }
        assert!(dispatch(&shared, UartEvent::RxChar(b'e')));
        assert_eq!(shared.snapshot().rx_dropped, 1);
    }

    #[test]
    fn test_tx_complete_posts_only_when_outstanding() {
        let shared = shared(RxMode::Continuous, TxErrorPolicy::ReleaseWriter);

        dispatch(&shared, UartEvent::TxComplete);
        assert!(!shared.tx_done.is_posted());
        assert_eq!(shared.snapshot().ignored_events, 1);

        shared.begin_transmission();
        dispatch(&shared, UartEvent::TxComplete);
        assert_eq!(shared.tx_done.wait(), TxOutcome::Complete);
    }

    #[test]
    fn test_tx_error_releases_writer() {
        let shared = shared(RxMode::Continuous, TxErrorPolicy::ReleaseWriter);
        shared.begin_transmission();
        dispatch(&shared, UartEvent::TxError(UartErrorFlags::UNDERRUN));
        assert_eq!(shared.tx_done.wait(), TxOutcome::Failed(UartErrorFlags::UNDERRUN));
    }

    #[test]
    fn test_tx_error_ignored_by_policy() {
        let shared = shared(RxMode::Continuous, TxErrorPolicy::Ignore);
        shared.begin_transmission();
        dispatch(&shared, UartEvent::TxError(UartErrorFlags::UNDERRUN));
        assert!(!shared.tx_done.is_posted());
        assert_eq!(shared.snapshot().ignored_events, 1);

        // The writer is still outstanding and a later completion frees it
        dispatch(&shared, UartEvent::TxComplete);
        assert_eq!(shared.tx_done.wait(), TxOutcome::Complete);
    }

    #[test]
    fn test_other_events_ignored() {
        let shared = shared(RxMode::Continuous, TxErrorPolicy::ReleaseWriter);
        shared.begin_transmission();
        for event in [
            UartEvent::RxComplete,
            UartEvent::TxDataEmpty,
            UartEvent::BreakDetect,
            UartEvent::RxError(UartErrorFlags::OVERFLOW),
        ] {
            dispatch(&shared, event);
        }

        assert!(!shared.tx_done.is_posted());
        assert!(shared.rx.is_empty());
        assert_eq!(shared.snapshot().ignored_events, 4);
    }
}
