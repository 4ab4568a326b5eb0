//! Simulation configuration
//!
//! Loaded from an optional TOML file; command-line flags then override
//! individual values.
//!
//! ```toml
//! byte_time_us = 87
//! cli_priority = 120
//!
//! [console]
//! queue_capacity = 64
//! rx_mode = "rearm-per-character"
//!
//! [console.uart]
//! baud_rate = 115200
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use serde::Deserialize;
use sercon_console::ConsoleConfig;
use sercon_rtos::Priority;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub console: ConsoleConfig,

    /// Fixed transmit time per byte; derived from the line rate when unset
    pub byte_time_us: Option<u64>,

    /// Priority of the command console task
    pub cli_priority: u8,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            console: ConsoleConfig::default(),
            byte_time_us: None,
            cli_priority: Priority::DEFAULT.0,
        }
    }
}

/// Values given on the command line
#[derive(Debug, Default, Clone, Args)]
pub struct Overrides {
    /// Line rate of the simulated UART
    #[arg(long, global = true)]
    pub baud: Option<u32>,

    /// Receive queue capacity in characters
    #[arg(long, global = true)]
    pub queue_capacity: Option<usize>,

    /// Arm receive one character at a time
    #[arg(long, global = true)]
    pub rearm_per_character: bool,

    /// Leave writers blocked on transmit errors
    #[arg(long, global = true)]
    pub ignore_tx_errors: bool,

    /// Fixed transmit time per byte in microseconds
    #[arg(long, global = true)]
    pub byte_time_us: Option<u64>,
}

impl SimConfig {
    /// Load `path`, or the defaults when no file is given
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.console.validate()?;
        Ok(config)
    }

    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(baud) = overrides.baud {
            self.console.uart.baud_rate = baud;
        }
        if let Some(capacity) = overrides.queue_capacity {
            self.console.queue_capacity = capacity;
        }
        if overrides.rearm_per_character {
            self.console.rx_mode = sercon_console::RxMode::RearmPerCharacter;
        }
        if overrides.ignore_tx_errors {
            self.console.tx_error_policy = sercon_console::TxErrorPolicy::Ignore;
        }
        if overrides.byte_time_us.is_some() {
            self.byte_time_us = overrides.byte_time_us;
        }
    }

    pub fn byte_time(&self) -> Option<Duration> {
        self.byte_time_us.map(Duration::from_micros)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sercon_console::{RxMode, TxErrorPolicy};

    #[test]
    fn test_defaults_without_file() {
        let config = SimConfig::load(None).unwrap();
        assert_eq!(config, SimConfig::default());
        assert_eq!(config.byte_time(), None);
    }

    #[test]
    fn test_parse_nested_tables() {
        let config = SimConfig::parse(
            r#"
            byte_time_us = 87
            cli_priority = 120

            [console]
            queue_capacity = 64

            [console.uart]
            baud_rate = 9600
            "#,
        )
        .unwrap();

        assert_eq!(config.byte_time(), Some(Duration::from_micros(87)));
        assert_eq!(config.cli_priority, 120);
        assert_eq!(config.console.queue_capacity, 64);
        assert_eq!(config.console.uart.baud_rate, 9600);
    }

    #[test]
    fn test_invalid_console_config_rejected() {
        let err = SimConfig::parse("[console]\nqueue_capacity = 0\n").unwrap_err();
        assert!(err.to_string().contains("queue capacity"));
    }

    #[test]
    fn test_overrides_win() {
        let mut config = SimConfig::parse("[console]\nqueue_capacity = 64\n").unwrap();
        config.apply(&Overrides {
            baud: Some(57_600),
            queue_capacity: Some(8),
            rearm_per_character: true,
            ignore_tx_errors: true,
            byte_time_us: Some(0),
        });

        assert_eq!(config.console.uart.baud_rate, 57_600);
        assert_eq!(config.console.queue_capacity, 8);
        assert_eq!(config.console.rx_mode, RxMode::RearmPerCharacter);
        assert_eq!(config.console.tx_error_policy, TxErrorPolicy::Ignore);
        assert_eq!(config.byte_time(), Some(Duration::ZERO));
    }
}
