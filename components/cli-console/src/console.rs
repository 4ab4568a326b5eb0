//! Line editor and command loop

use core::fmt::Write as _;
use std::convert::Infallible;
use std::sync::Arc;

use sercon_console::{PortHandle, SerialConsole};
use sercon_rtos::Timeout;
use sercon_uart::UartDriver;

use crate::registry::CommandRegistry;
use crate::{CliError, Result};

/// Longest command line kept; further characters are dropped
pub const MAX_INPUT_LENGTH: usize = 50;

pub const WELCOME: &str = "Serial command console.\nType help to view a list of registered commands.\n\n";

pub const PROMPT: &str = "> ";

/// Printed after every command's output
pub const END_OF_OUTPUT: &str = "\n[Press ENTER to execute the previous command again]\n";

const BACKSPACE: u8 = 0x08;
const DELETE: u8 = 0x7f;

/// Interactive console bound to one [`SerialConsole`]
pub struct CommandConsole<U: UartDriver + 'static> {
    console: Arc<SerialConsole<U>>,
    port: PortHandle,
    registry: CommandRegistry,
    input: String,
    previous: String,
    /// Last character was CR, so an LF right after it ends nothing
    after_cr: bool,
}

impl<U: UartDriver + 'static> CommandConsole<U> {
    pub fn new(console: Arc<SerialConsole<U>>, registry: CommandRegistry) -> Self {
        let port = console.port();
        Self {
            console,
            port,
            registry,
            input: String::with_capacity(MAX_INPUT_LENGTH),
            previous: String::new(),
            after_cr: false,
        }
    }

    /// Print the welcome banner and the first prompt
    pub fn start(&self) -> Result<()> {
        log::info!("command console started with {} commands", self.registry.names().len());
        self.print(&[WELCOME, PROMPT])
    }

    /// Read and execute one line
    ///
    /// Blocks until a line terminator arrives. Returns the line that was
    /// executed; an empty line repeats the previous command, or executes
    /// nothing (`None`) if there is none yet.
    pub fn run_once(&mut self) -> Result<Option<String>> {
        loop {
            let byte = self.console.read_char(self.port, Timeout::Forever)?;
            let after_cr = core::mem::replace(&mut self.after_cr, byte == b'\r');

            match byte {
                b'\n' if after_cr => {}
                b'\r' | b'\n' => return self.execute_line(),
                BACKSPACE | DELETE => {
                    if self.input.pop().is_some() {
                        self.console.write_string(self.port, b"\x08 \x08")?;
                    }
                }
                b' '..=b'~' => {
                    if self.input.len() < MAX_INPUT_LENGTH {
                        self.input.push(char::from(byte));
                        self.console.write_char(self.port, byte, Timeout::Forever)?;
                    }
                }
                _ => log::trace!("ignored input {:#04x}", byte),
            }
        }
    }

    /// Serve commands until a fatal console error
    pub fn run(&mut self) -> Result<Infallible> {
        loop {
            match self.run_once() {
                Ok(_) => {}
                Err(e) if e.is_recoverable() => log::warn!("command console: {}", e),
                Err(e) => {
                    log::error!("command console stopped: {}", e);
                    return Err(e);
                }
            }
        }
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// Current unterminated input
    pub fn pending_input(&self) -> &str {
        &self.input
    }

    fn execute_line(&mut self) -> Result<Option<String>> {
        let line = if self.input.trim().is_empty() {
            self.input.clear();
            self.previous.clone()
        } else {
            core::mem::take(&mut self.input)
        };

        // Newline, reply and prompt go out as one section
        let _section = self.console.lock();
        if line.is_empty() {
            self.print(&["\n", PROMPT])?;
            return Ok(None);
        }

        let reply = self.registry.dispatch(&line);
        self.print(&["\n", reply.as_str(), END_OF_OUTPUT, PROMPT])?;
        self.previous.clone_from(&line);
        Ok(Some(line))
    }

    fn print(&self, parts: &[&str]) -> Result<()> {
        let mut out = self.console.writer(self.port);
        for part in parts {
            if out.write_str(part).is_err() {
                return Err(out.take_error().map_or(CliError::Output, CliError::Console));
            }
        }
        Ok(())
    }
}
