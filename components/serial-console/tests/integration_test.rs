//! Serial console behaviour against the simulated UART

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use sercon_console::*;
use sercon_rtos::{current_task, spawn, Priority, TaskConfig, Timeout};
use sercon_uart::{RxArm, SimUart, UartError, UartErrorFlags, UartEvent};

const WAIT: Duration = Duration::from_secs(5);

fn setup(byte_time: Duration, config: ConsoleConfig) -> (Arc<SimUart>, Arc<SerialConsole<SimUart>>) {
    let uart = Arc::new(SimUart::with_byte_time(byte_time));
    let console = SerialConsole::initialize(Arc::clone(&uart), &config).expect("initialize");
    (uart, Arc::new(console))
}

fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + WAIT;
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn test_nested_lock_excludes_other_writers() {
    let (uart, console) = setup(Duration::ZERO, ConsoleConfig::default());
    let port = console.port();

    let outer = console.lock();
    let inner = console.lock();
    console.write_str(port, "one").unwrap();

    let other = {
        let console = Arc::clone(&console);
        spawn(TaskConfig::new("other", Priority::DEFAULT), move || {
            console.write_str(port, "two")
        })
        .unwrap()
    };
    wait_until("contender to queue", || console.console_lock().waiter_count() == 1);

    drop(inner);
    console.write_str(port, "three").unwrap();
    thread::sleep(Duration::from_millis(20));
    assert_eq!(uart.wire(), b"onethree", "contender ran inside the nested section");

    drop(outer);
    other.join().unwrap().unwrap();
    assert_eq!(uart.wire(), b"onethreetwo");
    assert_eq!(console.console_lock().owner(), None);
}

#[test]
#[should_panic(expected = "console lock")]
fn test_unbalanced_release_is_fatal() {
    let (_uart, console) = setup(Duration::ZERO, ConsoleConfig::default());
    let lock = console.console_lock();
    lock.acquire();
    lock.acquire();
    lock.release();
    lock.release();
    lock.release();
}

#[test]
fn test_concurrent_writers_stay_contiguous() {
    const WRITERS: usize = 4;
    const ROUNDS: usize = 5;
    const LEN: usize = 16;

    let (uart, console) = setup(Duration::from_micros(20), ConsoleConfig::default());

    let tasks: Vec<_> = (0..WRITERS)
        .map(|n| {
            let console = Arc::clone(&console);
            let payload = vec![b'a' + n as u8; LEN];
            spawn(TaskConfig::new("writer", Priority(100 + n as u8)), move || {
                for _ in 0..ROUNDS {
                    console.write_string(console.port(), &payload).unwrap();
                }
            })
            .unwrap()
        })
        .collect();

    for task in tasks {
        task.join().unwrap();
    }

    let wire = uart.wire();
    assert_eq!(wire.len(), WRITERS * ROUNDS * LEN);
    for chunk in wire.chunks(LEN) {
        assert!(
            chunk.iter().all(|&b| b == chunk[0]),
            "interleaved output: {:?}",
            String::from_utf8_lossy(chunk)
        );
    }
    assert_eq!(uart.frames().len(), WRITERS * ROUNDS);
    assert_eq!(console.stats().tx_frames, (WRITERS * ROUNDS) as u64);
}

#[test]
fn test_two_writers_five_and_three_bytes() {
    let (uart, console) = setup(Duration::from_micros(50), ConsoleConfig::default());

    let writers: Vec<_> = [&b"HELLO"[..], &b"abc"[..]]
        .into_iter()
        .map(|payload| {
            let console = Arc::clone(&console);
            spawn(TaskConfig::new("writer", Priority::DEFAULT), move || {
                console.write_string(console.port(), payload)
            })
            .unwrap()
        })
        .collect();

    for writer in writers {
        writer.join().unwrap().unwrap();
    }

    let wire = uart.wire();
    assert!(
        wire == b"HELLOabc" || wire == b"abcHELLO",
        "payloads interleaved: {:?}",
        String::from_utf8_lossy(&wire)
    );
}

#[test]
fn test_waiting_writers_served_by_priority() {
    let (uart, console) = setup(Duration::ZERO, ConsoleConfig::default());
    let port = console.port();
    let held = console.lock();

    let mut writers = Vec::new();
    for (priority, text) in [(10, "low "), (200, "high "), (100, "mid ")] {
        let task_console = Arc::clone(&console);
        writers.push(
            spawn(TaskConfig::new("writer", Priority(priority)), move || {
                task_console.write_str(port, text)
            })
            .unwrap(),
        );
        let queued = writers.len();
        wait_until("writer to queue", || console.console_lock().waiter_count() == queued);
    }

    drop(held);
    for writer in writers {
        writer.join().unwrap().unwrap();
    }
    assert_eq!(uart.wire(), b"high mid low ");
}

#[test]
fn test_receive_fifo_and_overrun() {
    let (uart, console) = setup(Duration::ZERO, ConsoleConfig::with_queue_capacity(4));
    let port = console.port();

    uart.inject_rx_bytes(b"ABCDEF");

    let received: Vec<u8> = (0..4).map(|_| console.read_char(port, Timeout::NoWait).unwrap()).collect();
    assert_eq!(received, b"ABCD");
    assert_eq!(console.read_char(port, Timeout::NoWait), Err(ConsoleError::Timeout));

    let stats = console.stats();
    assert_eq!(stats.rx_bytes, 4);
    assert_eq!(stats.rx_dropped, 2);
}

#[test]
fn test_end_to_end_read_three() {
    let (uart, console) = setup(Duration::ZERO, ConsoleConfig::with_queue_capacity(4));
    let port = console.port();

    for byte in [b'A', b'B', b'C'] {
        uart.inject_rx(byte);
    }

    assert_eq!(console.read_char(port, Timeout::Forever), Ok(b'A'));
    assert_eq!(console.read_char(port, Timeout::Forever), Ok(b'B'));
    assert_eq!(console.read_char(port, Timeout::Forever), Ok(b'C'));

    let start = Instant::now();
    assert_eq!(console.read_char(port, Timeout::NoWait), Err(ConsoleError::Timeout));
    assert!(start.elapsed() < Duration::from_millis(100));
}

#[test]
fn test_read_forever_waits_for_input() {
    let (uart, console) = setup(Duration::ZERO, ConsoleConfig::default());

    let reader = {
        let console = Arc::clone(&console);
        spawn(TaskConfig::new("reader", Priority::DEFAULT), move || {
            console.read_char(console.port(), Timeout::Forever)
        })
        .unwrap()
    };

    thread::sleep(Duration::from_millis(20));
    assert!(!reader.is_finished());

    let yields_before = sercon_rtos::isr::yield_requests();
    uart.inject_rx(b'z');
    assert_eq!(reader.join().unwrap(), Ok(b'z'));
    assert!(sercon_rtos::isr::yield_requests() > yields_before);
}

#[test]
fn test_read_bounded_timeout() {
    let (_uart, console) = setup(Duration::ZERO, ConsoleConfig::default());
    let start = Instant::now();
    assert_eq!(
        console.read_char(console.port(), Timeout::Ticks(15)),
        Err(ConsoleError::Timeout)
    );
    assert!(start.elapsed() >= Duration::from_millis(15));
}

#[test]
fn test_submit_failure_releases_lock() {
    let (uart, console) = setup(Duration::ZERO, ConsoleConfig::default());
    let port = console.port();
    uart.fail_next_write(UartError::Hardware("bus fault".into()));

    let err = console.write_str(port, "lost").unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(err, ConsoleError::Submit(UartError::Hardware(_))));
    assert_eq!(console.console_lock().owner(), None);
    assert_eq!(console.stats().tx_errors, 1);

    // The next writer is not handed a stale completion
    console.write_str(port, "ok").unwrap();
    assert_eq!(uart.wire(), b"ok");
}

#[test]
fn test_transmit_error_releases_writer() {
    let (uart, console) = setup(Duration::ZERO, ConsoleConfig::default());
    let port = console.port();
    uart.fail_next_transmission(UartErrorFlags::UNDERRUN);

    let err = console.write_str(port, "bad").unwrap_err();
    assert_eq!(err, ConsoleError::Transmit(UartErrorFlags::UNDERRUN));
    assert!(!err.is_fatal());
    assert_eq!(console.console_lock().owner(), None);

    console.write_str(port, "good").unwrap();
    let stats = console.stats();
    assert_eq!(stats.tx_errors, 1);
    assert_eq!(stats.tx_frames, 1);
}

#[test]
fn test_ignored_transmit_error_keeps_writer_blocked() {
    let config = ConsoleConfig {
        tx_error_policy: TxErrorPolicy::Ignore,
        ..ConsoleConfig::default()
    };
    let (uart, console) = setup(Duration::ZERO, config);
    uart.fail_next_transmission(UartErrorFlags::UNDERRUN);

    let writer = {
        let console = Arc::clone(&console);
        spawn(TaskConfig::new("writer", Priority::DEFAULT), move || {
            console.write_str(console.port(), "stuck")
        })
        .unwrap()
    };
    let writer_id = writer.id();

    wait_until("transmission to end", || uart.frames().len() == 1);
    thread::sleep(Duration::from_millis(20));
    assert!(!writer.is_finished());
    assert_eq!(console.console_lock().owner(), Some(writer_id));
    assert_ne!(writer_id, current_task());

    uart.inject_event(UartEvent::TxComplete);
    writer.join().unwrap().unwrap();
    assert_eq!(console.stats().ignored_events, 1);
}

#[test]
fn test_rearm_per_character_delivers_burst() {
    let config = ConsoleConfig {
        rx_mode: RxMode::RearmPerCharacter,
        ..ConsoleConfig::with_queue_capacity(8)
    };
    let (uart, console) = setup(Duration::ZERO, config);
    assert_eq!(uart.rx_arm(), RxArm::Remaining(1));

    uart.inject_rx_bytes(b"burst");

    let received: Vec<u8> = (0..5).map(|_| console.read_char(console.port(), Timeout::NoWait).unwrap()).collect();
    assert_eq!(received, b"burst");
    assert_eq!(uart.rx_arm(), RxArm::Remaining(1));
    assert_eq!(uart.rx_overruns(), 0);
    // One RxComplete per single-character read
    assert_eq!(console.stats().ignored_events, 5);
}

#[test]
fn test_missed_rearm_loses_burst_tail() {
    let config = ConsoleConfig {
        rx_mode: RxMode::RearmPerCharacter,
        ..ConsoleConfig::with_queue_capacity(8)
    };
    let (uart, console) = setup(Duration::ZERO, config);

    // The re-arm after the first character is refused
    uart.fail_next_read(UartError::Hardware("rx busy".into()));
    uart.inject_rx_bytes(b"ab");

    assert_eq!(console.read_char(console.port(), Timeout::NoWait), Ok(b'a'));
    assert_eq!(console.read_char(console.port(), Timeout::NoWait), Err(ConsoleError::Timeout));
    assert_eq!(uart.rx_arm(), RxArm::Disarmed);
    assert_eq!(uart.rx_overruns(), 1);

    let stats = console.stats();
    assert_eq!(stats.rx_bytes, 1);
    assert_eq!(stats.rx_dropped, 0);
    // RxComplete for 'a' and the overflow error for 'b'
    assert_eq!(stats.ignored_events, 2);
}

#[test]
fn test_formatted_output_is_one_section() {
    use core::fmt::Write;

    let (uart, console) = setup(Duration::from_micros(20), ConsoleConfig::default());

    let tasks: Vec<_> = (0..3u8)
        .map(|n| {
            let console = Arc::clone(&console);
            spawn(TaskConfig::new("printer", Priority::DEFAULT), move || {
                let mut out = console.writer(console.port());
                writeln!(out, "task {} line {}", n, n).unwrap();
            })
            .unwrap()
        })
        .collect();
    for task in tasks {
        task.join().unwrap();
    }

    let wire = String::from_utf8(uart.wire()).unwrap();
    let mut lines: Vec<&str> = wire.split_terminator("\r\n").collect();
    lines.sort_unstable();
    assert_eq!(lines, ["task 0 line 0", "task 1 line 1", "task 2 line 2"]);
}
