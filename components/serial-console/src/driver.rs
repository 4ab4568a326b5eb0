//! Serial console over a [`UartDriver`]

use core::fmt;
use std::sync::{Arc, Weak};

use sercon_rtos::{IsrContext, Timeout};
use sercon_uart::{UartCallback, UartDriver, UartEvent};

use crate::callback::ConsoleShared;
use crate::config::{ConsoleConfig, RxMode};
use crate::lock::{ConsoleGuard, ConsoleLock};
use crate::rx::RxQueue;
use crate::stats::ConsoleStats;
use crate::tx::TxOutcome;
use crate::{ConsoleError, Result};

/// Identifies the console port to callers
///
/// Only one port exists. Operations accept any handle and always act on
/// that port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortHandle(pub u32);

impl PortHandle {
    pub const CONSOLE: PortHandle = PortHandle(0);
}

/// Thread-safe console on one UART
///
/// Shared between tasks by reference (typically through an `Arc`).
pub struct SerialConsole<U: UartDriver + 'static> {
    uart: Arc<U>,
    lock: ConsoleLock,
    shared: Arc<ConsoleShared>,
}

impl<U: UartDriver + 'static> SerialConsole<U> {
    /// Create the console state, open the UART and arm receive delivery
    ///
    /// Runs once, before any other console operation.
    ///
    /// # Errors
    /// - `ConsoleError::InvalidConfig` if `config` fails validation
    /// - `ConsoleError::Open` if the driver cannot be opened or armed
    pub fn initialize(uart: Arc<U>, config: &ConsoleConfig) -> Result<Self> {
        config.validate()?;

        if config.requested_baud != 0 && config.requested_baud != config.uart.baud_rate {
            log::warn!(
                "requested {} baud ignored; uart{} runs at {} baud",
                config.requested_baud,
                config.uart.channel,
                config.uart.baud_rate
            );
        }

        let shared = Arc::new(ConsoleShared::new(
            RxQueue::new(config.queue_capacity)?,
            config.rx_mode,
            config.tx_error_policy,
        ));

        uart.open(&config.uart, event_callback(&shared, &uart))
            .map_err(ConsoleError::Open)?;

        let arm_len = match config.rx_mode {
            RxMode::Continuous => 0,
            RxMode::RearmPerCharacter => 1,
        };
        if let Err(e) = uart.read(arm_len) {
            if let Err(close_err) = uart.close() {
                log::warn!("uart{} close after failed arm: {}", config.uart.channel, close_err);
            }
            return Err(ConsoleError::Open(e));
        }

        log::info!(
            "serial console on uart{}: {} baud, rx queue {}, {:?} receive",
            config.uart.channel,
            config.uart.baud_rate,
            config.queue_capacity,
            config.rx_mode
        );

        Ok(Self {
            uart,
            lock: ConsoleLock::new(),
            shared,
        })
    }

    /// Initialize with default line settings
    ///
    /// `requested_baud` is accepted but the line rate comes from the UART
    /// configuration.
    pub fn initialize_minimal(uart: Arc<U>, requested_baud: u32, queue_capacity: usize) -> Result<Self> {
        let config = ConsoleConfig {
            requested_baud,
            ..ConsoleConfig::with_queue_capacity(queue_capacity)
        };
        Self::initialize(uart, &config)
    }

    /// Handle for the console port
    pub fn port(&self) -> PortHandle {
        PortHandle::CONSOLE
    }

    /// Transmit `buffer` and wait for the hardware to finish sending it
    ///
    /// The whole buffer appears on the port contiguously. Blocks without limit
    /// for the console lock and then for transmit completion. An empty buffer
    /// returns immediately.
    ///
    /// # Errors
    /// - `ConsoleError::Submit` if the driver refused the transmission. The
    ///   console lock has been released; treat the port as broken.
    /// - `ConsoleError::Transmit` if the hardware aborted the transmission
    ///
    /// # Panics
    /// Panics when called from interrupt context
    pub fn write_string(&self, port: PortHandle, buffer: &[u8]) -> Result<()> {
        self.check_port(port);
        if buffer.is_empty() {
            return Ok(());
        }

        let _guard = self.lock.lock();

        self.shared.begin_transmission();
        if let Err(e) = self.uart.write(buffer) {
            self.shared.abandon_transmission();
            self.shared.counters.record_error();
            log::error!("uart write of {} bytes rejected: {}", buffer.len(), e);
            return Err(ConsoleError::Submit(e));
        }
        log::debug!("tx {} bytes submitted", buffer.len());

        match self.shared.tx_done.wait() {
            TxOutcome::Complete => {
                self.shared.counters.record_frame(buffer.len());
                Ok(())
            }
            TxOutcome::Failed(flags) => {
                self.shared.counters.record_error();
                log::error!("transmission of {} bytes aborted: {:?}", buffer.len(), flags);
                Err(ConsoleError::Transmit(flags))
            }
        }
    }

    /// [`Self::write_string`] for text
    pub fn write_str(&self, port: PortHandle, text: &str) -> Result<()> {
        self.write_string(port, text.as_bytes())
    }

    /// Transmit one character
    ///
    /// `_timeout` is accepted for interface compatibility; the call blocks
    /// exactly like [`Self::write_string`].
    pub fn write_char(&self, port: PortHandle, byte: u8, _timeout: Timeout) -> Result<()> {
        self.write_string(port, &[byte])
    }

    /// Take the oldest received character, waiting up to `timeout`
    ///
    /// # Errors
    /// Returns `ConsoleError::Timeout` if nothing arrived in time
    pub fn read_char(&self, port: PortHandle, timeout: Timeout) -> Result<u8> {
        self.check_port(port);
        self.shared.rx.pop(timeout)
    }

    /// Hold the console across several operations
    ///
    /// Writes made by the holder while the guard lives nest inside it, so
    /// their output cannot be interleaved with other tasks'.
    pub fn lock(&self) -> ConsoleGuard<'_> {
        self.lock.lock()
    }

    /// The console lock itself
    pub fn console_lock(&self) -> &ConsoleLock {
        &self.lock
    }

    pub fn stats(&self) -> ConsoleStats {
        self.shared.snapshot()
    }

    /// Characters waiting in the receive queue
    pub fn rx_pending(&self) -> usize {
        self.shared.rx.len()
    }

    pub fn rx_capacity(&self) -> usize {
        self.shared.rx.capacity()
    }

    /// `core::fmt::Write` adapter holding the console for its lifetime
    ///
    /// Newlines are sent as CR LF.
    pub fn writer(&self, port: PortHandle) -> ConsoleWriter<'_, U> {
        ConsoleWriter {
            guard: self.lock(),
            console: self,
            port,
            error: None,
        }
    }

    fn check_port(&self, port: PortHandle) {
        if port != PortHandle::CONSOLE {
            log::trace!("foreign port handle {:?} treated as the console", port);
        }
    }
}

/// Build the interrupt callback
///
/// The callback keeps the shared state alive but only a weak reference to the
/// driver, which owns the callback.
fn event_callback<U: UartDriver + 'static>(shared: &Arc<ConsoleShared>, uart: &Arc<U>) -> UartCallback {
    let shared = Arc::clone(shared);
    let uart: Weak<U> = Arc::downgrade(uart);
    Arc::new(move |event: UartEvent, ctx: &mut IsrContext| {
        shared.handle_event(event, ctx, || {
            if let Some(uart) = uart.upgrade() {
                if let Err(e) = uart.read(1) {
                    log::trace!("rx re-arm failed: {}", e);
                }
            }
        });
    })
}

/// Formatted output to the console under one lock scope
pub struct ConsoleWriter<'a, U: UartDriver + 'static> {
    guard: ConsoleGuard<'a>,
    console: &'a SerialConsole<U>,
    port: PortHandle,
    error: Option<ConsoleError>,
}

impl<U: UartDriver + 'static> ConsoleWriter<'_, U> {
    /// Nesting depth of the held console lock
    pub fn depth(&self) -> u32 {
        self.guard.depth()
    }

    /// The console error behind the last `fmt::Error`, if any
    pub fn take_error(&mut self) -> Option<ConsoleError> {
        self.error.take()
    }

    fn send(&mut self, bytes: &[u8]) -> fmt::Result {
        self.console.write_string(self.port, bytes).map_err(|e| {
            self.error = Some(e);
            fmt::Error
        })
    }
}

impl<U: UartDriver + 'static> fmt::Write for ConsoleWriter<'_, U> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let mut lines = s.split('\n');
        if let Some(first) = lines.next() {
            self.send(first.as_bytes())?;
        }
        for line in lines {
            self.send(b"\r\n")?;
            self.send(line.as_bytes())?;
        }
        Ok(())
    }
}
