//! Concurrent writer demonstration
//!
//! Several tasks of different priority write tagged messages at the same
//! time. Afterwards the wire log is checked: every message must appear
//! exactly once and unbroken.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::Context;
use sercon_console::{ConsoleStats, SerialConsole};
use sercon_rtos::{spawn, Priority, TaskConfig};
use sercon_uart::SimUart;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoReport {
    pub messages: usize,
    /// Lines on the wire that are not a whole message
    pub broken_lines: Vec<String>,
    /// Messages written but not found intact
    pub missing: usize,
    pub stats: ConsoleStats,
}

impl DemoReport {
    pub fn is_clean(&self) -> bool {
        self.broken_lines.is_empty() && self.missing == 0
    }
}

pub fn message(writer: usize, index: usize) -> String {
    format!("[writer {writer} message {index}]")
}

/// Priority of writer `writer`, counting up from the default and saturating at the top
pub fn writer_priority(writer: usize) -> Priority {
    Priority(Priority::DEFAULT.0.saturating_add(u8::try_from(writer).unwrap_or(u8::MAX)))
}

/// Run `writers` tasks writing `messages` lines each and inspect the wire
pub fn run_writers(
    console: &Arc<SerialConsole<SimUart>>,
    uart: &SimUart,
    writers: usize,
    messages: usize,
) -> anyhow::Result<DemoReport> {
    uart.take_wire();

    let mut tasks = Vec::with_capacity(writers);
    for writer in 0..writers {
        let console = Arc::clone(console);
        let priority = writer_priority(writer);
        let task = spawn(TaskConfig::new("demo-writer", priority), move || {
            for index in 0..messages {
                console.write_str(console.port(), &format!("{}\r\n", message(writer, index)))?;
            }
            Ok::<_, sercon_console::ConsoleError>(())
        })?;
        tasks.push(task);
    }

    for task in tasks {
        let name = task.name();
        task.join()?.with_context(|| format!("task '{name}' failed to write"))?;
    }

    let wire = String::from_utf8_lossy(&uart.take_wire()).into_owned();
    Ok(inspect(&wire, writers, messages, console.stats()))
}

/// Check a wire log against the messages the writers produced
pub fn inspect(wire: &str, writers: usize, messages: usize, stats: ConsoleStats) -> DemoReport {
    let expected: BTreeSet<String> = (0..writers)
        .flat_map(|w| (0..messages).map(move |m| message(w, m)))
        .collect();

    let mut found = BTreeSet::new();
    let mut broken_lines = Vec::new();
    for line in wire.split_terminator("\r\n") {
        if expected.contains(line) && found.insert(line.to_string()) {
            continue;
        }
        broken_lines.push(line.to_string());
    }

    DemoReport {
        messages: expected.len(),
        broken_lines,
        missing: expected.len() - found.len(),
        stats,
    }
}
