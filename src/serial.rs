//! Serial line transport: a raw 8N1 tty delivering one byte at a time.
//!
//! Opens the device read+write without claiming it as controlling terminal,
//! configures termios for blocking single-byte reads (VMIN=1, VTIME=0) at
//! the requested baud, and runs the background read loop that forwards every
//! received byte to the session queue. Writes go out one byte at a time with
//! no buffering. EOF or a read error is fatal to the loop and surfaces as a
//! `Disconnected` event; there is no reconnect.

use crate::SessionEvent;
use anyhow::{bail, Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{self, Read as _, Write as _};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use termios::os::target::{B115200, B230400, B57600, CRTSCTS};
use termios::{
    cfmakeraw, cfsetspeed, tcflush, tcsetattr, Termios, B1200, B19200, B2400, B300, B38400,
    B4800, B9600, CLOCAL, CREAD, CSTOPB, TCIOFLUSH, TCSANOW, VMIN, VTIME,
};
use tokio::sync::mpsc;

/// Write-side capability: push one byte toward the remote machine.
///
/// Held by both the keyboard path and the control-socket command path;
/// swappable for a recording sink in tests.
pub trait ByteSink {
    fn consume(&mut self, byte: u8) -> io::Result<()>;
}

/// An open serial device, configured raw.
pub struct SerialLink {
    file: File,
}

impl SerialLink {
    /// Open `path` and configure it 8N1 at `baud`.
    pub fn open(path: &str, baud: u32) -> Result<Self> {
        let speed = baud_constant(baud)?;
        // O_NONBLOCK keeps open() from hanging on a carrier that never
        // comes; reads are switched back to blocking once CLOCAL is set.
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
            .open(path)
            .with_context(|| format!("failed to open serial device {}", path))?;
        let fd = file.as_raw_fd();

        let mut tty =
            Termios::from_fd(fd).context("failed to read serial line attributes")?;
        cfmakeraw(&mut tty);
        // Local line, receiver on, one stop bit, no hardware flow control.
        tty.c_cflag |= CLOCAL | CREAD;
        tty.c_cflag &= !(CSTOPB | CRTSCTS);
        // Wake per byte: block until exactly one arrives.
        tty.c_cc[VMIN] = 1;
        tty.c_cc[VTIME] = 0;
        cfsetspeed(&mut tty, speed)
            .with_context(|| format!("failed to set {} baud on {}", baud, path))?;
        tcsetattr(fd, TCSANOW, &tty).context("failed to apply serial line attributes")?;
        tcflush(fd, TCIOFLUSH).context("failed to flush stale serial data")?;

        // SAFETY: plain fcntl on a descriptor we own.
        let res = unsafe { libc::fcntl(fd, libc::F_SETFL, 0) };
        if res < 0 {
            return Err(io::Error::last_os_error())
                .context("failed to restore blocking reads");
        }

        log::info!("opened {} at {} baud", path, baud);
        Ok(Self { file })
    }

    /// Clone the descriptor for the background read loop.
    pub fn reader(&self) -> Result<File> {
        self.file
            .try_clone()
            .context("failed to clone serial descriptor")
    }
}

impl ByteSink for SerialLink {
    fn consume(&mut self, byte: u8) -> io::Result<()> {
        self.file.write_all(&[byte])
    }
}

/// Map a numeric baud rate to its termios constant.
fn baud_constant(baud: u32) -> Result<termios::speed_t> {
    Ok(match baud {
        300 => B300,
        1200 => B1200,
        2400 => B2400,
        4800 => B4800,
        9600 => B9600,
        19200 => B19200,
        38400 => B38400,
        57600 => B57600,
        115200 => B115200,
        230400 => B230400,
        _ => bail!("unsupported baud rate {}", baud),
    })
}

/// Run the blocking read loop on the tokio blocking pool.
///
/// One byte per read, forwarded in arrival order. The loop ends when the
/// line EOFs, a read fails, or the session side of the queue is gone.
pub fn spawn_read_loop(mut reader: File, events: mpsc::Sender<SessionEvent>) {
    tokio::task::spawn_blocking(move || {
        let mut buf = [0u8; 1];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => {
                    let err =
                        io::Error::new(io::ErrorKind::UnexpectedEof, "serial line closed");
                    let _ = events.blocking_send(SessionEvent::Disconnected(err));
                    return;
                }
                Ok(_) => {
                    if events.blocking_send(SessionEvent::Serial(buf[0])).is_err() {
                        // Session loop has shut down; nothing left to feed.
                        return;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    log::warn!("serial read failed: {}", e);
                    let _ = events.blocking_send(SessionEvent::Disconnected(e));
                    return;
                }
            }
        }
    });
}
