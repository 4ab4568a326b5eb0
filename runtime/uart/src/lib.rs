//! UART Driver Interface
//!
//! # Purpose
//! Describes the vendor UART driver the serial console sits on: an
//! open/read/write/close capability plus an asynchronous event callback
//! invoked from interrupt context.
//!
//! # Integration Points
//! - Depends on: `sercon-rtos` (interrupt context)
//! - Provides to: serial console driver, host tools, tests
//!
//! # Architecture
//! Register-level configuration and baud-rate setup belong to the driver
//! implementation. Transmission is asynchronous: `write` only reports whether
//! the submission was accepted, and completion arrives later as
//! [`UartEvent::TxComplete`]. Received characters arrive one at a time as
//! [`UartEvent::RxChar`] once delivery has been armed with `read`.
//!
//! # Testing Strategy
//! - Unit tests: configuration defaults, event classification
//! - Integration tests: [`SimUart`] transmit/receive/fault behaviour

use std::sync::Arc;

use bitflags::bitflags;
use serde::Deserialize;
use sercon_rtos::IsrContext;
use thiserror::Error;

mod sim;

pub use sim::{RxArm, SimUart};

/// UART driver errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UartError {
    #[error("UART is not open")]
    NotOpen,

    #[error("UART is already open")]
    AlreadyOpen,

    #[error("a transmission is already in progress")]
    InUse,

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("hardware fault: {0}")]
    Hardware(String),
}

pub type Result<T> = core::result::Result<T, UartError>;

bitflags! {
    /// Receive/transmit error conditions reported by the hardware
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct UartErrorFlags: u8 {
        const PARITY = 1 << 0;
        const FRAMING = 1 << 1;
        const OVERFLOW = 1 << 2;
        const UNDERRUN = 1 << 3;
    }
}

/// Hardware event delivered to the driver callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UartEvent {
    /// One character was received
    RxChar(u8),

    /// An armed multi-character read finished
    RxComplete,

    /// The last byte of the submitted buffer left the shift register
    TxComplete,

    /// The transmit data register is empty (more data may be queued)
    TxDataEmpty,

    /// A break condition was detected on the line
    BreakDetect,

    /// Receive error (the character, if any, is lost)
    RxError(UartErrorFlags),

    /// Transmission aborted by the hardware; no `TxComplete` follows
    TxError(UartErrorFlags),
}

/// Event callback, invoked from interrupt context
///
/// Must not block. From-interrupt primitive variants record woken tasks in
/// the supplied [`IsrContext`].
pub type UartCallback = Arc<dyn Fn(UartEvent, &mut IsrContext) + Send + Sync>;

/// Parity setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
}

/// Line configuration handed to [`UartDriver::open`]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UartConfig {
    /// Hardware channel number
    pub channel: u8,

    /// Line rate in bits per second
    pub baud_rate: u32,

    /// Data bits per character (7 or 8)
    pub data_bits: u8,

    pub parity: Parity,

    /// Stop bits (1 or 2)
    pub stop_bits: u8,
}

impl Default for UartConfig {
    fn default() -> Self {
        Self {
            channel: 0,
            baud_rate: 115_200,
            data_bits: 8,
            parity: Parity::None,
            stop_bits: 1,
        }
    }
}

impl UartConfig {
    /// Bits on the wire per character, including start, parity and stop bits
    pub fn bits_per_frame(&self) -> u32 {
        let parity = u32::from(self.parity != Parity::None);
        1 + u32::from(self.data_bits) + parity + u32::from(self.stop_bits)
    }

    /// Check the line settings
    ///
    /// # Errors
    /// Returns `UartError::InvalidArgument` naming the first bad setting
    pub fn validate(&self) -> Result<()> {
        if self.baud_rate == 0 {
            return Err(UartError::InvalidArgument("baud rate must be non-zero"));
        }
        if !matches!(self.data_bits, 7 | 8) {
            return Err(UartError::InvalidArgument("data bits must be 7 or 8"));
        }
        if !matches!(self.stop_bits, 1 | 2) {
            return Err(UartError::InvalidArgument("stop bits must be 1 or 2"));
        }
        Ok(())
    }
}

/// Vendor UART driver capability
///
/// Exactly one physical port is driven through an implementation.
pub trait UartDriver: Send + Sync {
    /// Configure the hardware and register the event callback
    fn open(&self, config: &UartConfig, callback: UartCallback) -> Result<()>;

    /// Submit `data` for asynchronous transmission
    ///
    /// Returns once the submission is accepted; [`UartEvent::TxComplete`]
    /// reports when the bytes have physically left the port.
    fn write(&self, data: &[u8]) -> Result<()>;

    /// Arm receive delivery
    ///
    /// `len == 0` arms continuous per-character delivery; `len > 0` delivers
    /// `len` characters and then disarms.
    fn read(&self, len: usize) -> Result<()>;

    /// Stop the hardware and drop the callback
    fn close(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = UartConfig::default();
        assert_eq!(config.baud_rate, 115_200);
        assert_eq!(config.bits_per_frame(), 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bits_per_frame_with_parity() {
        let config = UartConfig {
            parity: Parity::Even,
            stop_bits: 2,
            ..UartConfig::default()
        };
        assert_eq!(config.bits_per_frame(), 12);
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        let zero_baud = UartConfig {
            baud_rate: 0,
            ..UartConfig::default()
        };
        assert!(matches!(zero_baud.validate(), Err(UartError::InvalidArgument(_))));

        let nine_bits = UartConfig {
            data_bits: 9,
            ..UartConfig::default()
        };
        assert!(matches!(nine_bits.validate(), Err(UartError::InvalidArgument(_))));
    }

    #[test]
    fn test_error_flags_combine() {
        let flags = UartErrorFlags::PARITY | UartErrorFlags::OVERFLOW;
        assert!(flags.contains(UartErrorFlags::OVERFLOW));
        assert!(!flags.contains(UartErrorFlags::FRAMING));
    }

    static_assertions::assert_impl_all!(SimUart: UartDriver, Send, Sync);
}
