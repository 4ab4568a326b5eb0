//! Interactive session: stdin becomes received characters, the wire log
//! becomes stdout

use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use sercon_cli::{register_sample_commands, spawn_cli_task, CommandRegistry};
use sercon_console::SerialConsole;
use sercon_rtos::Priority;
use sercon_uart::SimUart;

const POLL: Duration = Duration::from_millis(2);

pub fn run(console: Arc<SerialConsole<SimUart>>, uart: Arc<SimUart>, priority: Priority) -> anyhow::Result<()> {
    let mut registry = CommandRegistry::new();
    register_sample_commands(&mut registry, &console)?;
    let cli = spawn_cli_task(Arc::clone(&console), registry, priority)?;

    let stop = Arc::new(AtomicBool::new(false));
    let printer = {
        let uart = Arc::clone(&uart);
        let stop = Arc::clone(&stop);
        thread::Builder::new()
            .name("wire-printer".into())
            .spawn(move || print_wire(&uart, &stop))?
    };

    let capacity = console.rx_capacity();
    log::info!("reading commands from stdin; end of input stops the session");
    for line in io::stdin().lock().lines() {
        let line = line.context("reading stdin")?;
        for &byte in line.as_bytes().iter().chain(b"\r") {
            // Type no faster than the console drains its queue
            while console.rx_pending() >= capacity && !cli.is_finished() {
                thread::sleep(POLL);
            }
            uart.inject_rx(byte);
        }
        if cli.is_finished() {
            break;
        }
    }

    // Let the last reply reach the wire before stopping the printer
    thread::sleep(Duration::from_millis(100));
    stop.store(true, Ordering::Release);
    printer
        .join()
        .map_err(|_| anyhow::anyhow!("wire printer panicked"))??;

    log::debug!("{}", format_stats(&console));
    if cli.is_finished() {
        match cli.join()? {
            Ok(never) => match never {},
            Err(e) => return Err(e).context("command console stopped"),
        }
    }
    Ok(())
}

fn format_stats(console: &SerialConsole<SimUart>) -> String {
    let stats = console.stats();
    format!(
        "session: {} rx bytes ({} dropped), {} tx frames, {} ignored events",
        stats.rx_bytes, stats.rx_dropped, stats.tx_frames, stats.ignored_events
    )
}

fn print_wire(uart: &SimUart, stop: &AtomicBool) -> io::Result<()> {
    let mut stdout = io::stdout();
    loop {
        let stopping = stop.load(Ordering::Acquire);
        let bytes = uart.take_wire();
        if !bytes.is_empty() {
            stdout.write_all(&bytes)?;
            stdout.flush()?;
        } else if stopping {
            writeln!(stdout)?;
            return Ok(());
        }
        thread::sleep(POLL);
    }
}
