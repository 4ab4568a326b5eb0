//! sercon-sim - serial console on a simulated UART
//!
//! Commands:
//! - `sercon-sim console` - interactive command console (stdin in, wire out)
//! - `sercon-sim demo` - concurrent writers, then check the wire for interleaving
//! - `sercon-sim config` - print the effective configuration

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use colored::Colorize;
use sercon_console::SerialConsole;
use sercon_rtos::Priority;
use sercon_uart::SimUart;

mod config;
mod demo;
mod interactive;

use config::{Overrides, SimConfig};

#[derive(Parser)]
#[command(name = "sercon-sim")]
#[command(version)]
#[command(about = "Serial console driver on a simulated UART", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive command console (default)
    Console,

    /// Concurrent writer tasks sharing the console
    Demo {
        /// Number of writer tasks
        #[arg(short, long, default_value_t = 4)]
        writers: usize,

        /// Messages written by each task
        #[arg(short, long, default_value_t = 8)]
        messages: usize,
    },

    /// Print the effective configuration
    Config,
}

fn main() -> anyhow::Result<ExitCode> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = SimConfig::load(cli.config.as_deref())?;
    config.apply(&cli.overrides);
    config.console.validate()?;

    match cli.command.unwrap_or(Commands::Console) {
        Commands::Config => {
            println!("{:#?}", config);
            Ok(ExitCode::SUCCESS)
        }

        Commands::Console => {
            let (uart, console) = start(&config)?;
            interactive::run(console, uart, Priority(config.cli_priority))?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::Demo { writers, messages } => {
            let (uart, console) = start(&config)?;
            println!(
                "{} {} writers x {} messages",
                "▶".cyan(),
                writers.to_string().bold(),
                messages.to_string().bold()
            );

            let report = demo::run_writers(&console, &uart, writers, messages)?;
            print_report(&report);
            Ok(if report.is_clean() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

fn start(config: &SimConfig) -> anyhow::Result<(Arc<SimUart>, Arc<SerialConsole<SimUart>>)> {
    let uart = Arc::new(match config.byte_time() {
        Some(byte_time) => SimUart::with_byte_time(byte_time),
        None => SimUart::new(),
    });
    let console = SerialConsole::initialize(Arc::clone(&uart), &config.console)?;
    Ok((uart, Arc::new(console)))
}

fn print_report(report: &demo::DemoReport) {
    let stats = &report.stats;
    println!(
        "  {} frames, {} bytes, {} tx errors",
        stats.tx_frames, stats.tx_bytes, stats.tx_errors
    );

    if report.is_clean() {
        println!("{} all {} messages intact", "✓".green(), report.messages);
        return;
    }

    println!(
        "{} {} broken lines, {} messages missing",
        "✗".red(),
        report.broken_lines.len(),
        report.missing
    );
    for line in report.broken_lines.iter().take(10) {
        println!("    {}", line.yellow());
    }
}
