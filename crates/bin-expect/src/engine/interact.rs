//! The interactive passthrough loop.
//!
//! Relays bytes between the human's terminal and the target until the
//! escape character is typed or the target's stream ends. The local
//! terminal is switched to raw mode for the duration so keystrokes reach
//! the target unprocessed.

use std::os::fd::{AsFd, BorrowedFd};

use rustix::termios::{self, OptionalActions, Termios};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::signal::unix::{SignalKind, signal};

use crate::engine::pty::Pty;
use crate::engine::{FilterFn, InteractOptions};
use crate::error::{BinExpectError, Result};

/// Restores the local terminal's attributes when dropped.
struct RawGuard<'fd> {
    fd: BorrowedFd<'fd>,
    saved: Termios,
}

impl Drop for RawGuard<'_> {
    fn drop(&mut self) {
        // Nothing left to report a failure to at this point.
        let _ = termios::tcsetattr(self.fd, OptionalActions::Drain, &self.saved);
    }
}

/// Put the local terminal into raw mode, if it is one.
fn make_local_raw(fd: BorrowedFd<'_>) -> Result<Option<RawGuard<'_>>> {
    if !termios::isatty(fd) {
        return Ok(None);
    }
    let saved = termios::tcgetattr(fd)
        .map_err(|e| BinExpectError::terminal("reading local terminal attributes", e))?;
    let mut raw = saved.clone();
    raw.make_raw();
    termios::tcsetattr(fd, OptionalActions::Drain, &raw)
        .map_err(|e| BinExpectError::terminal("entering raw mode", e))?;
    Ok(Some(RawGuard { fd, saved }))
}

/// Mirror the local terminal's window size onto the target's pty.
fn forward_window_size(local: BorrowedFd<'_>, pty: BorrowedFd<'_>) {
    if let Ok(size) = termios::tcgetwinsize(local) {
        let _ = termios::tcsetwinsize(pty, size);
    }
}

/// Split typed input at the escape character.
///
/// Returns the bytes to forward and whether the escape character was seen.
fn split_at_escape(chunk: &[u8], escape_character: u8) -> (&[u8], bool) {
    match chunk.iter().position(|&b| b == escape_character) {
        Some(pos) => (&chunk[..pos], true),
        None => (chunk, false),
    }
}

fn apply_filter(filter: Option<&mut FilterFn>, data: &[u8]) -> Vec<u8> {
    match filter {
        Some(f) => f(data),
        None => data.to_vec(),
    }
}

/// Run the passthrough loop on a pty until escape or end of stream.
pub(crate) async fn passthrough(pty: &mut Pty, mut options: InteractOptions) -> Result<()> {
    let local = std::io::stdin();
    let _raw = make_local_raw(local.as_fd())?;

    // The select loop below borrows the pty through split halves, so window
    // size updates go through a duplicated descriptor.
    let winch_fd = pty
        .as_fd()
        .try_clone_to_owned()
        .map_err(|e| BinExpectError::io_context("duplicating pty descriptor", e))?;

    let (mut target_out, mut target_in) = tokio::io::split(&mut *pty);

    let mut stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    let mut winch = signal(SignalKind::window_change()).map_err(BinExpectError::Io)?;

    let mut input_buf = [0u8; 1024];
    let mut output_buf = [0u8; 4096];

    loop {
        tokio::select! {
            _ = winch.recv() => {
                forward_window_size(local.as_fd(), winch_fd.as_fd());
            }

            read = target_out.read(&mut output_buf) => {
                match read {
                    Ok(0) => break,
                    Ok(n) => {
                        let data = apply_filter(options.output_filter.as_mut(), &output_buf[..n]);
                        stdout
                            .write_all(&data)
                            .await
                            .map_err(|e| BinExpectError::io_context("writing to local terminal", e))?;
                        stdout
                            .flush()
                            .await
                            .map_err(|e| BinExpectError::io_context("flushing local terminal", e))?;
                    }
                    Err(e) => return Err(BinExpectError::io_context("reading from target", e)),
                }
            }

            read = stdin.read(&mut input_buf) => {
                match read {
                    Ok(0) => break,
                    Ok(n) => {
                        let (kept, escaped) = split_at_escape(&input_buf[..n], options.escape_character);
                        if !kept.is_empty() {
                            let data = apply_filter(options.input_filter.as_mut(), kept);
                            target_in
                                .write_all(&data)
                                .await
                                .map_err(|e| BinExpectError::io_context("writing to target", e))?;
                        }
                        if escaped {
                            break;
                        }
                    }
                    Err(e) => return Err(BinExpectError::io_context("reading local input", e)),
                }
            }
        }
    }

    Ok(())
}
