//! Foreground engine with a line-based terminal front end.
//!
//! Events are printed to stdout as JSON lines. Input lines:
//!
//! ```text
//! time HH:MM   set the alarm time
//! on | off     arm or disarm
//! fire         fire the alarm now
//! 1-4          answer the current question
//! status       print the running challenge
//! quit         stop
//! ```
//!
//! Quitting during a challenge follows `alarm.disarm_policy`: with
//! `finish_active` the engine keeps running until the challenge resolves
//! (no more answers are read), with `abort_active` it is abandoned.

use std::io::Write;
use std::sync::Arc;

use momentum_core::challenge::OPTIONS_PER_QUESTION;
use momentum_core::{
    App, AppCommand, AppServices, AudioError, AudioPlayer, Config, Database, Event, RelayClient,
    StaticPermission, TimeOfDay,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, warn};

/// Rings the terminal bell.
struct TerminalBell;

impl AudioPlayer for TerminalBell {
    fn play(&self) -> Result<(), AudioError> {
        let mut err = std::io::stderr();
        err.write_all(b"\x07")
            .and_then(|_| err.flush())
            .map_err(|e| AudioError::Playback(e.to_string()))
    }

    fn stop(&self) {}
}

#[derive(Debug)]
enum Input {
    Command(AppCommand),
    Status,
    Quit,
}

fn parse_line(line: &str) -> Result<Option<Input>, String> {
    let line = line.trim();
    let mut words = line.split_whitespace();
    let Some(word) = words.next() else {
        return Ok(None);
    };

    let input = match word {
        "time" => {
            let raw = words.next().ok_or("usage: time HH:MM")?;
            let time: TimeOfDay = raw.parse().map_err(|e| format!("{e}"))?;
            Input::Command(AppCommand::SetTime(time))
        }
        "on" => Input::Command(AppCommand::SetActive(true)),
        "off" => Input::Command(AppCommand::SetActive(false)),
        "fire" => Input::Command(AppCommand::FireNow),
        "status" => Input::Status,
        "quit" | "exit" => Input::Quit,
        digits => match digits.parse::<usize>() {
            Ok(n) if (1..=OPTIONS_PER_QUESTION).contains(&n) => {
                Input::Command(AppCommand::Answer(n - 1))
            }
            _ => return Err(format!("unknown input: {line}")),
        },
    };
    Ok(Some(input))
}

fn print_event(event: &Event) {
    // Countdown lines only every ten seconds and in the last five.
    if let Event::ChallengeTick { remaining_secs, .. } = event {
        if remaining_secs % 10 != 0 && *remaining_secs > 5 {
            return;
        }
    }
    match serde_json::to_string(event) {
        Ok(json) => println!("{json}"),
        Err(e) => warn!(error = %e, "could not print event"),
    }
}

async fn print_events(mut events: broadcast::Receiver<Event>) {
    loop {
        match events.recv().await {
            Ok(event) => print_event(&event),
            Err(broadcast::error::RecvError::Lagged(n)) => debug!(skipped = n, "event output lagged"),
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

async fn read_input(commands: mpsc::Sender<AppCommand>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "stdin read failed");
                break;
            }
        };
        match parse_line(&line) {
            Ok(Some(Input::Command(cmd))) => {
                if commands.send(cmd).await.is_err() {
                    return;
                }
            }
            Ok(Some(Input::Status)) => {
                let (tx, rx) = oneshot::channel();
                if commands.send(AppCommand::Snapshot(tx)).await.is_err() {
                    return;
                }
                match rx.await {
                    Ok(Some(snapshot)) => match serde_json::to_string(&snapshot) {
                        Ok(json) => println!("{json}"),
                        Err(e) => warn!(error = %e, "could not print status"),
                    },
                    _ => println!("{{\"type\": \"idle\"}}"),
                }
            }
            Ok(Some(Input::Quit)) => break,
            Ok(None) => {}
            Err(msg) => eprintln!("{msg}"),
        }
    }
    let _ = commands.send(AppCommand::Shutdown).await;
}

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    config.validate()?;
    let db = Database::open()?;
    let sender = Arc::new(RelayClient::from_config(&config.relay)?);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let services = AppServices {
            permission: Arc::new(StaticPermission::granted()),
            player: Arc::new(TerminalBell),
            sender,
        };
        let app = App::new(db, config, services);
        let printer = tokio::spawn(print_events(app.subscribe()));
        let (tx, rx) = mpsc::channel(16);
        let input = tokio::spawn(read_input(tx));

        app.run(rx).await;
        input.abort();
        printer.abort();
    });
    // A blocking stdin read may still be parked on its thread.
    rt.shutdown_background();
    Ok(())
}
