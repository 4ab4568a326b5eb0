//! Console configuration
//!
//! Every field has a default, so a partial TOML table is enough:
//!
//! ```toml
//! queue_capacity = 64
//! rx_mode = "rearm-per-character"
//!
//! [uart]
//! channel = 7
//! baud_rate = 9600
//! ```

use serde::Deserialize;
use sercon_uart::{UartConfig, UartError};

use crate::{ConsoleError, Result};

/// Receive queue capacity used when none is configured
pub const DEFAULT_QUEUE_CAPACITY: usize = 32;

/// How receive delivery is armed on the UART
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RxMode {
    /// Armed once at initialization; every character interrupts
    #[default]
    Continuous,

    /// Armed for one character at a time and re-armed from the callback.
    /// Characters arriving before the re-arm are lost by the hardware.
    RearmPerCharacter,
}

/// What a transmit error event does to the blocked writer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TxErrorPolicy {
    /// Wake the writer with `ConsoleError::Transmit`
    #[default]
    ReleaseWriter,

    /// Drop the event; the writer stays blocked until a later
    /// `TxComplete`, holding the console lock meanwhile
    Ignore,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Baud rate asked for by the application. The line rate actually used
    /// is `uart.baud_rate`; a differing request is logged and ignored.
    /// Zero means no request.
    pub requested_baud: u32,

    /// Receive queue capacity in characters
    pub queue_capacity: usize,

    pub rx_mode: RxMode,

    pub tx_error_policy: TxErrorPolicy,

    /// Line settings handed to the UART driver
    pub uart: UartConfig,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            requested_baud: 0,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            rx_mode: RxMode::default(),
            tx_error_policy: TxErrorPolicy::default(),
            uart: UartConfig::default(),
        }
    }
}

impl ConsoleConfig {
    /// Defaults with the given receive queue capacity
    pub fn with_queue_capacity(queue_capacity: usize) -> Self {
        Self {
            queue_capacity,
            ..Self::default()
        }
    }

    /// Check the configuration before any resource is created
    ///
    /// # Errors
    /// Returns `ConsoleError::InvalidConfig` for a zero queue capacity or bad
    /// line settings
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(ConsoleError::InvalidConfig("queue capacity must be non-zero"));
        }
        self.uart.validate().map_err(|e| match e {
            UartError::InvalidArgument(reason) => ConsoleError::InvalidConfig(reason),
            other => ConsoleError::Open(other),
        })
    }
}
