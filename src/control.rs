//! Control endpoint: a Unix socket accepting externally injected commands.
//!
//! Scripts can push a command into the running session without touching the
//! keyboard. Each line received on the socket becomes a command event; the
//! session sends it out over the serial line character by character followed
//! by a carriage return. Injected commands bypass the input history.

use crate::serial::ByteSink;
use crate::SessionEvent;
use anyhow::{Context, Result};
use std::io;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UnixListener;
use tokio::sync::mpsc;

/// End-of-command marker sent after every injected command.
const COMMAND_TERMINATOR: u8 = 13;

/// Bind the control socket, removing a stale file from a previous run.
pub fn bind(path: &Path) -> Result<UnixListener> {
    let _ = std::fs::remove_file(path);
    UnixListener::bind(path)
        .with_context(|| format!("failed to bind control socket {}", path.display()))
}

/// Accept connections forever, forwarding each received line as a command
/// event. Per-connection reads run as their own tasks so one slow client
/// cannot stall another.
pub async fn run_listener(listener: UnixListener, events: mpsc::Sender<SessionEvent>) {
    loop {
        match listener.accept().await {
            Ok((stream, _)) => {
                let events = events.clone();
                tokio::spawn(async move {
                    let mut lines = BufReader::new(stream).lines();
                    loop {
                        match lines.next_line().await {
                            Ok(Some(line)) => {
                                log::debug!("control socket command: {:?}", line);
                                if events.send(SessionEvent::Command(line)).await.is_err() {
                                    // Session loop has shut down.
                                    return;
                                }
                            }
                            Ok(None) => return,
                            Err(e) => {
                                log::warn!("control socket read failed: {}", e);
                                return;
                            }
                        }
                    }
                });
            }
            Err(e) => {
                log::warn!("control socket accept failed: {}", e);
            }
        }
    }
}

/// Send one command over the sink: each ASCII character in order, then CR.
///
/// Non-ASCII characters have no serial representation and are skipped. An
/// empty command still sends the terminator, a bare RETURN.
pub fn inject_command<S: ByteSink>(sink: &mut S, command: &str) -> io::Result<()> {
    for ch in command.chars() {
        if ch.is_ascii() {
            sink.consume(ch as u8)?;
        } else {
            log::warn!("skipping non-ASCII character {:?} in injected command", ch);
        }
    }
    sink.consume(COMMAND_TERMINATOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records every byte it is handed.
    struct RecordingSink {
        bytes: Vec<u8>,
    }

    impl RecordingSink {
        fn new() -> Self {
            Self { bytes: Vec::new() }
        }
    }

    impl ByteSink for RecordingSink {
        fn consume(&mut self, byte: u8) -> io::Result<()> {
            self.bytes.push(byte);
            Ok(())
        }
    }

    #[test]
    fn inject_sends_chars_then_return() {
        let mut sink = RecordingSink::new();
        inject_command(&mut sink, "HELLO").unwrap();
        assert_eq!(sink.bytes, vec![72, 69, 76, 76, 79, 13]);
    }

    #[test]
    fn inject_empty_command_sends_bare_return() {
        let mut sink = RecordingSink::new();
        inject_command(&mut sink, "").unwrap();
        assert_eq!(sink.bytes, vec![13]);
    }

    #[test]
    fn inject_skips_non_ascii() {
        let mut sink = RecordingSink::new();
        inject_command(&mut sink, "a£b").unwrap();
        assert_eq!(sink.bytes, vec![b'a', b'b', 13]);
    }

    #[tokio::test]
    async fn listener_forwards_lines_as_commands() {
        let path =
            std::env::temp_dir().join(format!("beebterm-ctl-{}.sock", std::process::id()));
        let listener = bind(&path).unwrap();
        let (tx, mut rx) = mpsc::channel(8);
        tokio::spawn(run_listener(listener, tx));

        let mut stream = tokio::net::UnixStream::connect(&path).await.unwrap();
        tokio::io::AsyncWriteExt::write_all(&mut stream, b"*CAT\nCHAIN \"GAME\"\n")
            .await
            .unwrap();
        drop(stream);

        match rx.recv().await {
            Some(SessionEvent::Command(line)) => assert_eq!(line, "*CAT"),
            other => panic!("expected command, got {:?}", other),
        }
        match rx.recv().await {
            Some(SessionEvent::Command(line)) => assert_eq!(line, "CHAIN \"GAME\""),
            other => panic!("expected command, got {:?}", other),
        }
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn bind_replaces_stale_socket() {
        let path =
            std::env::temp_dir().join(format!("beebterm-stale-{}.sock", std::process::id()));
        let first = bind(&path).unwrap();
        // Dropping the listener leaves the socket file behind.
        drop(first);
        assert!(bind(&path).is_ok());
        let _ = std::fs::remove_file(&path);
    }
}
