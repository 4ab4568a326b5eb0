//! Command Console
//!
//! # Purpose
//! Interactive command line served over the serial console: a task reads
//! characters, edits a line, dispatches it to a registered command and
//! prints the reply.
//!
//! # Integration Points
//! - Depends on: `sercon-console` (character I/O, console lock),
//!   `sercon-rtos` (task spawning)
//! - Provides to: firmware images and the host simulation tool
//!
//! # Architecture
//! - [`CommandRegistry`]: named commands with help text and an optional
//!   fixed parameter count; `help` is built in
//! - [`CommandConsole`]: the line editor and dispatch loop
//! - [`spawn_cli_task`]: runs a console as its own task
//!
//! # Testing Strategy
//! - Unit tests: registry dispatch, parameter checking, sample commands
//! - Integration tests: keystrokes injected through the simulated UART

use std::convert::Infallible;
use std::sync::Arc;

use sercon_console::{ConsoleError, SerialConsole};
use sercon_rtos::{Priority, TaskConfig, TaskHandle};
use sercon_uart::UartDriver;
use thiserror::Error;

mod commands;
mod console;
mod registry;

pub use commands::register_sample_commands;
pub use console::{CommandConsole, END_OF_OUTPUT, MAX_INPUT_LENGTH, PROMPT, WELCOME};
pub use registry::{Command, CommandHandler, CommandRegistry};

/// Command console errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CliError {
    #[error("command '{0}' is already registered")]
    DuplicateCommand(&'static str),

    #[error("command name must be a single non-empty word")]
    InvalidName,

    #[error("console I/O failed: {0}")]
    Console(#[from] ConsoleError),

    #[error("formatting console output failed")]
    Output,
}

impl CliError {
    /// Whether the console loop can carry on after this error
    pub fn is_recoverable(&self) -> bool {
        match self {
            CliError::Console(e) => !e.is_fatal(),
            CliError::Output => true,
            CliError::DuplicateCommand(_) | CliError::InvalidName => false,
        }
    }
}

pub type Result<T> = core::result::Result<T, CliError>;

/// Task name used by [`spawn_cli_task`]
pub const CLI_TASK_NAME: &str = "cli";

/// Start a command console task
///
/// The task prints the welcome banner and then serves commands until a
/// fatal console error, which becomes the task's result.
pub fn spawn_cli_task<U: UartDriver + 'static>(
    console: Arc<SerialConsole<U>>,
    registry: CommandRegistry,
    priority: Priority,
) -> sercon_rtos::Result<TaskHandle<Result<Infallible>>> {
    sercon_rtos::spawn(TaskConfig::new(CLI_TASK_NAME, priority), move || {
        let mut cli = CommandConsole::new(console, registry);
        cli.start()?;
        cli.run()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sercon_uart::UartError;

    #[test]
    fn test_recoverable_errors() {
        assert!(CliError::Console(ConsoleError::Timeout).is_recoverable());
        assert!(!CliError::Console(ConsoleError::Submit(UartError::InUse)).is_recoverable());
        assert!(!CliError::DuplicateCommand("echo").is_recoverable());
    }

    static_assertions::assert_impl_all!(CommandRegistry: Send, Sync);
}
