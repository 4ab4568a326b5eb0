//! Command registry and dispatch

use core::fmt;
use core::fmt::Write as _;

use crate::{CliError, Result};

/// Command implementation: receives the parameters after the command name
/// and returns the text to print. Lines end with `\n`.
pub type CommandHandler = Box<dyn Fn(&[&str]) -> String + Send + Sync>;

const HELP_NAME: &str = "help";
const HELP_TEXT: &str = "Lists all the registered commands";

pub struct Command {
    pub name: &'static str,
    pub help: &'static str,
    /// Exact parameter count, or `None` to accept any number
    pub expected_params: Option<usize>,
    pub handler: CommandHandler,
}

impl Command {
    pub fn new(
        name: &'static str,
        help: &'static str,
        expected_params: Option<usize>,
        handler: impl Fn(&[&str]) -> String + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            help,
            expected_params,
            handler: Box::new(handler),
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("expected_params", &self.expected_params)
            .finish_non_exhaustive()
    }
}

/// Registered commands, listed by `help` in registration order
#[derive(Debug, Default)]
pub struct CommandRegistry {
    commands: Vec<Command>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a command
    ///
    /// # Errors
    /// - `CliError::InvalidName` if the name is empty or contains whitespace
    /// - `CliError::DuplicateCommand` if the name is taken (including `help`)
    pub fn register(&mut self, command: Command) -> Result<()> {
        if command.name.is_empty() || command.name.contains(char::is_whitespace) {
            return Err(CliError::InvalidName);
        }
        if command.name == HELP_NAME || self.find(command.name).is_some() {
            return Err(CliError::DuplicateCommand(command.name));
        }

        log::debug!("registered command '{}'", command.name);
        self.commands.push(command);
        Ok(())
    }

    /// Command names, `help` first
    pub fn names(&self) -> Vec<&'static str> {
        core::iter::once(HELP_NAME)
            .chain(self.commands.iter().map(|c| c.name))
            .collect()
    }

    /// Run one command line and return its output
    ///
    /// Unknown commands and wrong parameter counts produce an explanatory
    /// message rather than an error. A blank line produces no output.
    pub fn dispatch(&self, line: &str) -> String {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return String::new();
        };
        let params: Vec<&str> = words.collect();

        if name == HELP_NAME {
            return self.help();
        }

        let Some(command) = self.find(name) else {
            log::debug!("unknown command '{}'", name);
            return "Command not recognised. Enter 'help' to view a list of available commands.\n".to_string();
        };

        if let Some(expected) = command.expected_params {
            if params.len() != expected {
                return format!(
                    "Incorrect command parameter(s). '{}' takes {} parameter(s); enter 'help' for details.\n",
                    command.name, expected
                );
            }
        }

        log::debug!("dispatch '{}' with {} parameter(s)", name, params.len());
        (command.handler)(&params)
    }

    fn find(&self, name: &str) -> Option<&Command> {
        self.commands.iter().find(|c| c.name == name)
    }

    fn help(&self) -> String {
        let mut out = String::new();
        let entries = core::iter::once((HELP_NAME, HELP_TEXT)).chain(self.commands.iter().map(|c| (c.name, c.help)));
        for (name, help) in entries {
            // Writing to a String cannot fail
            let _ = writeln!(out, "{}:\n {}\n", name, help);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> CommandRegistry {
        let mut registry = CommandRegistry::new();
        registry
            .register(Command::new("add", "add <a> <b>: sum two numbers", Some(2), |p| {
                let sum: i64 = p.iter().filter_map(|v| v.parse::<i64>().ok()).sum();
                format!("{}\n", sum)
            }))
            .unwrap();
        registry
    }

    #[test]
    fn test_dispatch_with_params() {
        assert_eq!(registry().dispatch("add 2 40"), "42\n");
        assert_eq!(registry().dispatch("  add   2   40  "), "42\n");
    }

    #[test]
    fn test_wrong_param_count() {
        let reply = registry().dispatch("add 1");
        assert!(reply.starts_with("Incorrect command parameter(s)"));
    }

    #[test]
    fn test_unknown_and_blank() {
        let registry = registry();
        assert!(registry.dispatch("nope").starts_with("Command not recognised"));
        assert_eq!(registry.dispatch("   "), "");
    }

    #[test]
    fn test_duplicates_rejected() {
        let mut registry = registry();
        let again = Command::new("add", "", None, |_| String::new());
        assert_eq!(registry.register(again), Err(CliError::DuplicateCommand("add")));

        let help = Command::new("help", "", None, |_| String::new());
        assert_eq!(registry.register(help), Err(CliError::DuplicateCommand("help")));
    }

    #[test]
    fn test_invalid_names_rejected() {
        let mut registry = CommandRegistry::new();
        assert_eq!(
            registry.register(Command::new("", "", None, |_| String::new())),
            Err(CliError::InvalidName)
        );
        assert_eq!(
            registry.register(Command::new("two words", "", None, |_| String::new())),
            Err(CliError::InvalidName)
        );
    }

    #[test]
    fn test_help_lists_everything_in_order() {
        let registry = registry();
        assert_eq!(registry.names(), vec!["help", "add"]);
        assert_eq!(
            registry.dispatch("help"),
            "help:\n Lists all the registered commands\n\nadd:\n add <a> <b>: sum two numbers\n\n"
        );
    }
}
