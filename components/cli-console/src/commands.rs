//! Sample commands

use std::sync::Arc;

use sercon_console::SerialConsole;
use sercon_rtos::{current_priority, current_task};
use sercon_uart::UartDriver;

use crate::registry::{Command, CommandRegistry};
use crate::Result;

/// Register `echo`, `stats` and `tasks`
///
/// # Errors
/// Returns `CliError::DuplicateCommand` if any of the names is taken
pub fn register_sample_commands<U: UartDriver + 'static>(
    registry: &mut CommandRegistry,
    console: &Arc<SerialConsole<U>>,
) -> Result<()> {
    registry.register(Command::new(
        "echo",
        "echo <text>: Prints each parameter back, separated by spaces",
        None,
        |params| format!("{}\n", params.join(" ")),
    ))?;

    let stats_console = Arc::clone(console);
    registry.register(Command::new(
        "stats",
        "stats: Displays serial console counters",
        Some(0),
        move |_| {
            let stats = stats_console.stats();
            format!(
                "rx bytes      {}\nrx dropped    {}\ntx frames     {}\ntx bytes      {}\ntx errors     {}\nignored irqs  {}\n",
                stats.rx_bytes, stats.rx_dropped, stats.tx_frames, stats.tx_bytes, stats.tx_errors, stats.ignored_events
            )
        },
    ))?;

    registry.register(Command::new(
        "tasks",
        "tasks: Displays the task serving this console",
        Some(0),
        |_| format!("{} priority {}\n", current_task(), current_priority().0),
    ))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sercon_console::ConsoleConfig;
    use sercon_uart::SimUart;
    use std::time::Duration;

    fn registry() -> CommandRegistry {
        let uart = Arc::new(SimUart::with_byte_time(Duration::ZERO));
        let console = Arc::new(SerialConsole::initialize(uart, &ConsoleConfig::default()).unwrap());
        let mut registry = CommandRegistry::new();
        register_sample_commands(&mut registry, &console).unwrap();
        registry
    }

    #[test]
    fn test_sample_names() {
        assert_eq!(registry().names(), vec!["help", "echo", "stats", "tasks"]);
    }

    #[test]
    fn test_echo() {
        assert_eq!(registry().dispatch("echo hello  world"), "hello world\n");
        assert_eq!(registry().dispatch("echo"), "\n");
    }

    #[test]
    fn test_stats_takes_no_params() {
        let registry = registry();
        assert!(registry.dispatch("stats").starts_with("rx bytes      0\n"));
        assert!(registry.dispatch("stats now").starts_with("Incorrect command parameter(s)"));
    }

    #[test]
    fn test_tasks_names_caller() {
        let reply = registry().dispatch("tasks");
        assert_eq!(reply, format!("{} priority {}\n", current_task(), current_priority().0));
    }
}
