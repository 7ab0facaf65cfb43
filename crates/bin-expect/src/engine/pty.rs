//! Pseudo-terminal allocation and async master I/O.
//!
//! The OS is asked for exactly one descriptor pair and a device name; all
//! higher-level behavior lives elsewhere.

use std::io;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};
use std::pin::Pin;
use std::task::{Context, Poll};

use rustix::fs::{OFlags, fcntl_setfl};
use rustix::pty::{OpenptFlags, grantpt, openpt, ptsname, unlockpt};
use rustix::termios::{Winsize, tcsetwinsize};
use tokio::io::unix::AsyncFd;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::error::{Result, SpawnError};

/// Render an OS errno for a spawn-error reason.
fn errno_string(errno: rustix::io::Errno) -> String {
    io::Error::from_raw_os_error(errno.raw_os_error()).to_string()
}

/// The controlling (master) side of a pseudo-terminal.
///
/// Reading yields whatever the client side writes; end of stream is reported
/// when the last client descriptor closes. Linux reports that condition as
/// `EIO` rather than a zero-length read, which is mapped to a clean EOF here.
pub struct Pty {
    /// The master descriptor wrapped for async I/O.
    async_fd: AsyncFd<OwnedFd>,
    /// Path of the client-side device.
    client_path: String,
}

impl std::fmt::Debug for Pty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pty")
            .field("fd", &self.async_fd.as_raw_fd())
            .field("client", &self.client_path)
            .finish()
    }
}

impl Pty {
    /// Allocate a fresh pseudo-terminal pair.
    pub fn open() -> Result<Self> {
        let master = openpt(OpenptFlags::RDWR | OpenptFlags::NOCTTY)
            .map_err(|e| SpawnError::pty_allocation(errno_string(e)))?;

        grantpt(&master).map_err(|e| SpawnError::pty_allocation(errno_string(e)))?;
        unlockpt(&master).map_err(|e| SpawnError::pty_allocation(errno_string(e)))?;

        let client_path = ptsname(&master, Vec::new())
            .map_err(|e| SpawnError::pty_allocation(errno_string(e)))?
            .to_str()
            .map_err(|_| SpawnError::pty_allocation("client path is not valid UTF-8"))?
            .to_string();

        fcntl_setfl(&master, OFlags::NONBLOCK)
            .map_err(|e| SpawnError::terminal_setup(errno_string(e)))?;

        let async_fd = AsyncFd::new(master)
            .map_err(|e| SpawnError::terminal_setup(e.to_string()))?;

        Ok(Self {
            async_fd,
            client_path,
        })
    }

    /// Path of the client-side terminal device (e.g. `/dev/pts/4`).
    #[must_use]
    pub fn client_name(&self) -> &str {
        &self.client_path
    }

    /// Open a descriptor on the client side of this pty.
    pub fn open_client(&self) -> Result<OwnedFd> {
        use rustix::fs::{Mode, open};

        open(
            self.client_path.as_str(),
            OFlags::RDWR | OFlags::NOCTTY,
            Mode::empty(),
        )
        .map_err(|e| SpawnError::terminal_setup(errno_string(e)).into())
    }

    /// Set the pty's window size.
    pub fn set_window_size(&self, cols: u16, rows: u16) -> Result<()> {
        let winsize = Winsize {
            ws_col: cols,
            ws_row: rows,
            ws_xpixel: 0,
            ws_ypixel: 0,
        };
        tcsetwinsize(self.async_fd.get_ref(), winsize)
            .map_err(|e| crate::error::BinExpectError::terminal("resizing pty", e))
    }
}

impl AsFd for Pty {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.async_fd.get_ref().as_fd()
    }
}

impl AsRawFd for Pty {
    fn as_raw_fd(&self) -> RawFd {
        self.async_fd.as_raw_fd()
    }
}

impl AsyncRead for Pty {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        loop {
            let mut guard = match self.async_fd.poll_read_ready(cx) {
                Poll::Ready(Ok(guard)) => guard,
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Pending => return Poll::Pending,
            };

            let unfilled = buf.initialize_unfilled();
            match rustix::io::read(self.async_fd.get_ref(), unfilled) {
                Ok(0) => return Poll::Ready(Ok(())),
                Ok(n) => {
                    buf.advance(n);
                    return Poll::Ready(Ok(()));
                }
                Err(rustix::io::Errno::AGAIN) => {
                    guard.clear_ready();
                }
                // The last client descriptor closed; the terminal is gone.
                Err(rustix::io::Errno::IO) => return Poll::Ready(Ok(())),
                Err(e) => {
                    return Poll::Ready(Err(io::Error::from_raw_os_error(e.raw_os_error())));
                }
            }
        }
    }
}

impl AsyncWrite for Pty {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        loop {
            let mut guard = match self.async_fd.poll_write_ready(cx) {
                Poll::Ready(Ok(guard)) => guard,
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Pending => return Poll::Pending,
            };

            match rustix::io::write(self.async_fd.get_ref(), buf) {
                Ok(n) => return Poll::Ready(Ok(n)),
                Err(rustix::io::Errno::AGAIN) => {
                    guard.clear_ready();
                }
                Err(e) => {
                    return Poll::Ready(Err(io::Error::from_raw_os_error(e.raw_os_error())));
                }
            }
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
