//! BBC Micro Mode 7 serial terminal.
//!
//! Usage:
//!   beebterm [OPTIONS] [DEVICE]
//!
//! This terminal:
//! 1. Opens the serial device raw at the configured baud rate
//! 2. Decodes the Beeb's Mode 7 byte stream into coloured display lines
//! 3. Records typed lines into a scrollable command history; RETURN sends
//!    the selected line down the wire followed by a carriage return
//! 4. Accepts injected commands on a Unix control socket

mod control;
mod decoder;
mod history;
mod renderer;
mod screen;
mod serial;

use anyhow::{bail, Context, Result};
use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use serial::ByteSink;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::UnixListener;
use tokio::sync::mpsc;

const DELETE_KEY: u8 = 0x7F; // the Beeb's erase key
const ESCAPE_KEY: u8 = 0x1B; // drops the Beeb out of whatever it is running

/// Ample for a 9600 baud line drained every few milliseconds.
const EVENT_QUEUE_DEPTH: usize = 256;

/// Events marshalled onto the session's single-consumer queue.
#[derive(Debug)]
pub enum SessionEvent {
    /// One byte received from the serial line.
    Serial(u8),
    /// A command line received on the control socket.
    Command(String),
    /// The serial read loop died; fatal to the session.
    Disconnected(io::Error),
}

/// BBC Micro Mode 7 serial terminal with teletext colours and command history.
#[derive(Parser, Debug)]
#[command(name = "beebterm", version, about)]
struct Cli {
    /// Serial device connected to the Beeb.
    #[arg(value_name = "DEVICE", default_value = "/dev/ttyUSB0")]
    device: String,

    /// Baud rate (standard rates, 300 to 230400).
    #[arg(short, long, default_value = "9600")]
    baud: u32,

    /// Control socket path for injected commands.
    #[arg(long, default_value = "/tmp/beebterm.sock")]
    socket: PathBuf,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp_millis()
        .init();

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let result = runtime.block_on(async {
        let link = serial::SerialLink::open(&cli.device, cli.baud)?;
        let listener = control::bind(&cli.socket)?;
        run_session(link, listener).await
    });

    // The read task can stay parked in a blocking read on an idle line;
    // the exit path must not wait for it.
    runtime.shutdown_background();

    // The socket file would otherwise outlive the listener.
    let _ = std::fs::remove_file(&cli.socket);
    result
}

/// Main session loop: serial events, keyboard input, and rendering.
async fn run_session(mut link: serial::SerialLink, listener: UnixListener) -> Result<()> {
    let (term_width, term_height) =
        crossterm::terminal::size().context("failed to get terminal size")?;
    let mut width = term_width as usize;
    let mut height = term_height as usize;

    // Background producers feeding the single-consumer event queue.
    let (event_tx, mut events) = mpsc::channel(EVENT_QUEUE_DEPTH);
    serial::spawn_read_loop(link.reader()?, event_tx.clone());
    tokio::spawn(control::run_listener(listener, event_tx));

    let mut decoder = decoder::Mode7Decoder::new();
    let mut screen = screen::Mode7Screen::new();
    let mut history = history::CommandHistory::new();

    // Initialize the renderer
    renderer::Renderer::init()?;
    let mut render = renderer::Renderer::new(width, height);
    let mut status = renderer::StatusBar::new();

    // Guard to ensure cleanup on exit
    let _cleanup = CleanupGuard;

    // Main event loop
    let render_interval = Duration::from_millis(16); // ~60fps max
    let mut last_render = std::time::Instant::now();

    loop {
        // 1. Drain pending session events.
        while let Ok(session_event) = events.try_recv() {
            handle_session_event(session_event, &mut decoder, &mut screen, &mut link)?;
        }

        // 2. Process user input (keyboard events)
        while event::poll(Duration::from_millis(0))? {
            match event::read()? {
                Event::Key(key_event) => match classify_key(&key_event) {
                    Some(KeyAction::Record(code)) => history.record_char(code),
                    Some(KeyAction::Direct(code)) => {
                        link.consume(code)
                            .context("failed to write to serial line")?;
                    }
                    Some(KeyAction::Commit) => {
                        let line = history.commit();
                        for &byte in &line {
                            link.consume(byte)
                                .context("failed to write to serial line")?;
                        }
                        log::debug!("sent {} byte line", line.len());
                    }
                    Some(KeyAction::ScrollUp) => {
                        let _ = history.scroll_up();
                    }
                    Some(KeyAction::ScrollDown) => {
                        let _ = history.scroll_down();
                    }
                    Some(KeyAction::Quit) => return Ok(()),
                    None => {}
                },
                Event::Resize(new_w, new_h) => {
                    width = new_w as usize;
                    height = new_h as usize;
                    render.resize(width, height);
                    status.force_redraw();
                }
                _ => {}
            }
        }

        // The status bar previews the selected line; empty hides it.
        let preview = String::from_utf8_lossy(history.selected()).into_owned();
        status.set_text(&preview);

        // 3. Render at a reasonable frame rate
        if last_render.elapsed() >= render_interval {
            render.render(&screen)?;
            status.render(width, height)?;
            last_render = std::time::Instant::now();
        }

        // Wait for the next session event or a short timer. This avoids
        // busy-looping while still waking up promptly when the Beeb sends.
        tokio::select! {
            session_event = events.recv() => {
                match session_event {
                    Some(session_event) => {
                        handle_session_event(session_event, &mut decoder, &mut screen, &mut link)?;
                    }
                    None => bail!("session event queue closed"),
                }
            }
            _ = tokio::time::sleep(Duration::from_millis(3)) => {}
        }
    }
}

/// Apply one session event. The returned error is fatal to the session.
fn handle_session_event(
    event: SessionEvent,
    decoder: &mut decoder::Mode7Decoder,
    screen: &mut screen::Mode7Screen,
    link: &mut serial::SerialLink,
) -> Result<()> {
    match event {
        SessionEvent::Serial(byte) => {
            if let Some(effect) = decoder.decode(byte) {
                screen.apply(effect);
            }
            Ok(())
        }
        SessionEvent::Command(line) => {
            control::inject_command(link, &line).context("failed to send injected command")
        }
        SessionEvent::Disconnected(err) => Err(err).context("serial connection lost"),
    }
}

/// What a keystroke means to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyAction {
    /// Append to the line being composed.
    Record(u8),
    /// Send one byte straight down the line, bypassing history.
    Direct(u8),
    /// Transmit the selected line and fold it into history.
    Commit,
    ScrollUp,
    ScrollDown,
    /// Leave the session.
    Quit,
}

/// Convert a crossterm key event to a session action.
fn classify_key(event: &KeyEvent) -> Option<KeyAction> {
    // Act on keydown/autorepeat only.
    if !matches!(event.kind, KeyEventKind::Press | KeyEventKind::Repeat) {
        return None;
    }

    if event.modifiers.contains(KeyModifiers::CONTROL) {
        return match event.code {
            KeyCode::Char('c') | KeyCode::Char('q') => Some(KeyAction::Quit),
            _ => None,
        };
    }

    match event.code {
        KeyCode::Enter => Some(KeyAction::Commit),
        KeyCode::Up => Some(KeyAction::ScrollUp),
        KeyCode::Down => Some(KeyAction::ScrollDown),
        // Both erase keys send DEL; the Beeb does its own rubout.
        KeyCode::Backspace | KeyCode::Delete => Some(KeyAction::Direct(DELETE_KEY)),
        KeyCode::Esc => Some(KeyAction::Direct(ESCAPE_KEY)),
        KeyCode::Char(c) if c.is_ascii() && !c.is_control() => {
            Some(KeyAction::Record(c as u8))
        }
        _ => None,
    }
}

/// Guard that ensures terminal cleanup on drop (normal exit or panic).
struct CleanupGuard;

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        let _ = renderer::Renderer::cleanup();
    }
}
