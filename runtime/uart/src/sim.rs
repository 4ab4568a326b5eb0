//! Simulated UART peripheral
//!
//! Stands in for the vendor driver on the host. A transmitter thread plays
//! the shift register: it moves submitted bytes onto a wire log at the
//! configured line rate and then raises [`UartEvent::TxComplete`] in
//! interrupt context. Received characters are injected by the test or tool
//! driving the simulation.
//!
//! All events are raised through a single interrupt line, so two events never
//! run the callback concurrently.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, Sender};
use sercon_rtos::isr;

use crate::{Result, UartCallback, UartConfig, UartDriver, UartError, UartErrorFlags, UartEvent};

/// Receive delivery state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RxArm {
    /// Characters arriving now are lost (overrun)
    #[default]
    Disarmed,

    /// Every character raises [`UartEvent::RxChar`]
    Continuous,

    /// The next `n` characters are delivered, then receive disarms
    Remaining(usize),
}

#[derive(Default)]
struct SimState {
    callback: Option<UartCallback>,
    config: Option<UartConfig>,
    rx: RxArm,
    tx_busy: bool,
    byte_time: Duration,
    wire: Vec<u8>,
    frames: Vec<Vec<u8>>,
    rx_overruns: u64,
    fail_next_write: Option<UartError>,
    fail_next_transmission: Option<UartErrorFlags>,
    fail_next_read: Option<UartError>,
}

#[derive(Default)]
struct SimInner {
    state: Mutex<SimState>,
    wire_activity: Condvar,
    irq_line: Mutex<()>,
}

impl SimInner {
    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver events to the callback in interrupt context
    fn raise(&self, callback: &UartCallback, events: &[UartEvent]) {
        let _line = self.irq_line.lock().unwrap_or_else(PoisonError::into_inner);
        isr::run(|ctx| {
            for event in events {
                callback(*event, ctx);
            }
        });
    }

    fn transmit(&self, frames: Receiver<Vec<u8>>) {
        for frame in frames.iter() {
            let byte_time = self.state().byte_time;
            for &byte in &frame {
                if !byte_time.is_zero() {
                    thread::sleep(byte_time);
                }
                self.state().wire.push(byte);
                self.wire_activity.notify_all();
            }

            let (callback, event) = {
                let mut state = self.state();
                state.tx_busy = false;
                state.frames.push(frame);
                let event = match state.fail_next_transmission.take() {
                    Some(flags) => UartEvent::TxError(flags),
                    None => UartEvent::TxComplete,
                };
                (state.callback.clone(), event)
            };

            if let Some(callback) = callback {
                self.raise(&callback, &[event]);
            }
        }
        log::trace!("simulated transmitter stopped");
    }
}

/// Simulated UART peripheral
pub struct SimUart {
    inner: Arc<SimInner>,
    byte_time_override: Option<Duration>,
    frames_tx: Mutex<Option<Sender<Vec<u8>>>>,
}

impl SimUart {
    /// Peripheral that transmits at the line rate given to `open`
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Peripheral with a fixed time per byte (zero for instant transmission)
    pub fn with_byte_time(byte_time: Duration) -> Self {
        Self::build(Some(byte_time))
    }

    fn build(byte_time_override: Option<Duration>) -> Self {
        Self {
            inner: Arc::new(SimInner::default()),
            byte_time_override,
            frames_tx: Mutex::new(None),
        }
    }

    fn frames_tx(&self) -> MutexGuard<'_, Option<Sender<Vec<u8>>>> {
        self.frames_tx.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A character arrives on the receive line
    ///
    /// Raises [`UartEvent::RxChar`] if receive is armed. When disarmed the
    /// byte is lost and [`UartEvent::RxError`] with `OVERFLOW` is raised.
    /// Without an open driver the byte is discarded.
    pub fn inject_rx(&self, byte: u8) {
        let (callback, events) = {
            let mut state = self.inner.state();
            let Some(callback) = state.callback.clone() else {
                log::trace!("rx {:#04x} discarded: port closed", byte);
                return;
            };

            let events = match state.rx {
                RxArm::Continuous => vec![UartEvent::RxChar(byte)],
                RxArm::Remaining(n) if n > 1 => {
                    state.rx = RxArm::Remaining(n - 1);
                    vec![UartEvent::RxChar(byte)]
                }
                RxArm::Remaining(_) => {
                    state.rx = RxArm::Disarmed;
                    vec![UartEvent::RxChar(byte), UartEvent::RxComplete]
                }
                RxArm::Disarmed => {
                    state.rx_overruns += 1;
                    vec![UartEvent::RxError(UartErrorFlags::OVERFLOW)]
                }
            };
            (callback, events)
        };

        self.inner.raise(&callback, &events);
    }

    /// Inject a burst of characters back to back
    pub fn inject_rx_bytes(&self, bytes: &[u8]) {
        for &byte in bytes {
            self.inject_rx(byte);
        }
    }

    /// Raise an arbitrary hardware event
    pub fn inject_event(&self, event: UartEvent) {
        let callback = self.inner.state().callback.clone();
        if let Some(callback) = callback {
            self.inner.raise(&callback, &[event]);
        }
    }

    /// Make the next `write` submission fail with `error`
    pub fn fail_next_write(&self, error: UartError) {
        self.inner.state().fail_next_write = Some(error);
    }

    /// Make the next `read` (receive arming) fail with `error`
    pub fn fail_next_read(&self, error: UartError) {
        self.inner.state().fail_next_read = Some(error);
    }

    /// End the next transmission with [`UartEvent::TxError`] instead of `TxComplete`
    pub fn fail_next_transmission(&self, flags: UartErrorFlags) {
        self.inner.state().fail_next_transmission = Some(flags);
    }

    /// Everything transmitted so far
    pub fn wire(&self) -> Vec<u8> {
        self.inner.state().wire.clone()
    }

    /// Drain the wire log
    pub fn take_wire(&self) -> Vec<u8> {
        core::mem::take(&mut self.inner.state().wire)
    }

    /// Wait until at least `len` bytes are on the wire log
    pub fn wait_for_wire(&self, len: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.inner.state();
        while state.wire.len() < len {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            state = self
                .inner
                .wire_activity
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }

    /// Completed transmissions, one entry per `write` submission
    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.inner.state().frames.clone()
    }

    /// Configuration passed to `open`, if open
    pub fn open_config(&self) -> Option<UartConfig> {
        self.inner.state().config.clone()
    }

    pub fn is_open(&self) -> bool {
        self.inner.state().callback.is_some()
    }

    /// Current receive delivery state
    pub fn rx_arm(&self) -> RxArm {
        self.inner.state().rx
    }

    /// Characters lost because receive was disarmed
    pub fn rx_overruns(&self) -> u64 {
        self.inner.state().rx_overruns
    }

    /// Whether a transmission is in flight
    pub fn is_transmitting(&self) -> bool {
        self.inner.state().tx_busy
    }
}

impl Default for SimUart {
    fn default() -> Self {
        Self::new()
    }
}

impl UartDriver for SimUart {
    fn open(&self, config: &UartConfig, callback: UartCallback) -> Result<()> {
        config.validate()?;

        let mut frames_tx = self.frames_tx();
        let mut state = self.inner.state();
        if state.callback.is_some() {
            return Err(UartError::AlreadyOpen);
        }

        let (tx, rx) = channel::unbounded();
        let inner = Arc::clone(&self.inner);
        thread::Builder::new()
            .name(format!("sim-uart{}-tx", config.channel))
            .spawn(move || inner.transmit(rx))
            .map_err(|e| UartError::Hardware(e.to_string()))?;

        state.byte_time = self.byte_time_override.unwrap_or_else(|| {
            Duration::from_nanos(1_000_000_000 * u64::from(config.bits_per_frame()) / u64::from(config.baud_rate))
        });
        state.callback = Some(callback);
        state.config = Some(config.clone());
        state.rx = RxArm::Disarmed;
        *frames_tx = Some(tx);

        log::debug!(
            "sim uart{} open: {} baud, {:?} per byte",
            config.channel,
            config.baud_rate,
            state.byte_time
        );
        Ok(())
    }

    fn write(&self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Err(UartError::InvalidArgument("empty transmit buffer"));
        }

        let frames_tx = self.frames_tx();
        {
            let mut state = self.inner.state();
            if state.callback.is_none() {
                return Err(UartError::NotOpen);
            }
            if let Some(error) = state.fail_next_write.take() {
                return Err(error);
            }
            if state.tx_busy {
                return Err(UartError::InUse);
            }
            state.tx_busy = true;
        }

        let Some(sender) = frames_tx.as_ref() else {
            self.inner.state().tx_busy = false;
            return Err(UartError::NotOpen);
        };
        sender.send(data.to_vec()).map_err(|_| {
            self.inner.state().tx_busy = false;
            UartError::Hardware("transmitter stopped".into())
        })
    }

    fn read(&self, len: usize) -> Result<()> {
        let mut state = self.inner.state();
        if state.callback.is_none() {
            return Err(UartError::NotOpen);
        }
        if let Some(error) = state.fail_next_read.take() {
            return Err(error);
        }
        state.rx = if len == 0 {
            RxArm::Continuous
        } else {
            RxArm::Remaining(len)
        };
        Ok(())
    }

    fn close(&self) -> Result<()> {
        let mut frames_tx = self.frames_tx();
        let mut state = self.inner.state();
        if state.callback.take().is_none() {
            return Err(UartError::NotOpen);
        }
        state.config = None;
        state.rx = RxArm::Disarmed;
        *frames_tx = None;
        Ok(())
    }
}

impl Drop for SimUart {
    fn drop(&mut self) {
        // Disconnecting the channel stops the transmitter thread
        self.frames_tx().take();
    }
}
