//! A bare pseudo-terminal with no child of its own.
//!
//! Useful when another program attaches to the client side, for example a
//! debugger started with `gdb --tty=<name>`. The automation talks to the
//! master side exactly as it would to a spawned child.

use std::io::Write as _;
use std::os::fd::{AsFd, BorrowedFd};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::config::TargetConfig;
use crate::engine::expect::ExpectState;
use crate::engine::pty::Pty;
use crate::engine::{Engine, InteractOptions, Pattern, interact};
use crate::error::{BinExpectError, Result};
use crate::mode;

/// A fresh pty pair whose client side is handed to some other program.
///
/// There is no child to observe, so liveness only tracks whether the handle
/// was closed and both status queries answer `None`. End of stream on the
/// master therefore propagates to the caller instead of being explained by
/// an exit status.
pub struct TtyTarget {
    pty: Pty,
    state: ExpectState,
    config: TargetConfig,
    log: Option<std::fs::File>,
    closed: bool,
}

impl TtyTarget {
    /// Allocate a fresh pty with default configuration.
    pub fn open() -> Result<Self> {
        Self::open_with_config(TargetConfig::default())
    }

    /// Allocate a fresh pty.
    pub fn open_with_config(config: TargetConfig) -> Result<Self> {
        let pty = Pty::open()?;
        pty.set_window_size(config.dimensions.0, config.dimensions.1)?;
        debug!(tty = pty.client_name(), "opened tty target");

        let log = match &config.log_file {
            Some(path) => Some(
                std::fs::File::create(path)
                    .map_err(|e| BinExpectError::io_context("opening session log", e))?,
            ),
            None => None,
        };

        let max_read = config.max_read;
        Ok(Self {
            pty,
            state: ExpectState::new(max_read),
            config,
            log,
            closed: false,
        })
    }

    /// Path of the client-side terminal device.
    #[must_use]
    pub fn tty_name(&self) -> &str {
        self.pty.client_name()
    }

    /// Open a descriptor on the client side, as an attaching program would.
    pub fn open_client(&self) -> Result<std::os::fd::OwnedFd> {
        self.pty.open_client()
    }

    /// Mark the target closed. Further operations fail.
    pub fn close(&mut self) {
        self.closed = true;
    }
}

impl std::fmt::Debug for TtyTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtyTarget")
            .field("tty", &self.pty.client_name())
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl Engine for TtyTarget {
    fn tty(&self) -> BorrowedFd<'_> {
        self.pty.as_fd()
    }

    async fn send(&mut self, data: &[u8]) -> Result<usize> {
        if self.closed {
            return Err(BinExpectError::SessionClosed);
        }
        if !self.config.delay_before_send.is_zero() {
            tokio::time::sleep(self.config.delay_before_send).await;
        }
        self.pty
            .write_all(data)
            .await
            .map_err(|e| BinExpectError::io_context("writing to tty", e))?;
        if let Some(log) = self.log.as_mut() {
            log.write_all(data)
                .map_err(|e| BinExpectError::io_context("writing session log", e))?;
        }
        Ok(data.len())
    }

    async fn expect(
        &mut self,
        pattern: &Pattern,
        timeout: Option<Duration>,
        search_window: Option<usize>,
    ) -> Result<Vec<u8>> {
        if self.closed {
            return Err(BinExpectError::SessionClosed);
        }
        let timeout = timeout.or(self.config.timeout);
        let window = search_window.or(self.config.search_window);
        self.state
            .expect(&mut self.pty, pattern, timeout, window, self.log.as_mut())
            .await
    }

    fn is_alive(&mut self) -> bool {
        !self.closed
    }

    fn exit_status(&self) -> Option<i32> {
        None
    }

    fn signal_status(&self) -> Option<i32> {
        None
    }

    fn echo(&self) -> Result<bool> {
        mode::get_echo(self.pty.as_fd())
    }

    fn set_echo(&mut self, on: bool) -> Result<()> {
        mode::set_echo(self.pty.as_fd(), on)
    }

    async fn interact(&mut self, options: InteractOptions) -> Result<()> {
        if self.closed {
            return Err(BinExpectError::SessionClosed);
        }
        interact::passthrough(&mut self.pty, options).await
    }
}
