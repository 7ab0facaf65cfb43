//! A target process spawned on a fresh pseudo-terminal.

use std::io::Write as _;
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tracing::debug;

use crate::config::TargetConfig;
use crate::engine::expect::ExpectState;
use crate::engine::pty::Pty;
use crate::engine::{Engine, InteractOptions, Pattern, interact};
use crate::error::{BinExpectError, Result, SpawnError};
use crate::mode;

/// A child process running on its own pseudo-terminal.
///
/// The child's stdin, stdout and stderr are the client side of the pty; this
/// handle talks to the master side. The child is reaped here and killed if
/// the handle is dropped while it still runs.
pub struct SpawnedTarget {
    pty: Pty,
    child: Child,
    status: Option<ExitStatus>,
    state: ExpectState,
    config: TargetConfig,
    log: Option<std::fs::File>,
}

impl SpawnedTarget {
    /// Spawn `command` with default configuration.
    pub async fn spawn(command: &str, args: &[&str]) -> Result<Self> {
        Self::spawn_with_config(command, args, TargetConfig::default()).await
    }

    /// Spawn `command` on a fresh pty.
    pub async fn spawn_with_config(
        command: &str,
        args: &[&str],
        config: TargetConfig,
    ) -> Result<Self> {
        let pty = Pty::open()?;
        pty.set_window_size(config.dimensions.0, config.dimensions.1)?;

        let client = pty.open_client()?;
        let stdin = client.try_clone().map_err(SpawnError::Io)?;
        let stdout = client.try_clone().map_err(SpawnError::Io)?;

        let mut cmd = Command::new(command);
        cmd.args(args)
            .stdin(Stdio::from(stdin))
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(client))
            .kill_on_drop(true);
        if let Some(cwd) = &config.cwd {
            cmd.current_dir(cwd);
        }
        for (key, value) in &config.env {
            cmd.env(key, value);
        }

        let ignore_sighup = config.ignore_sighup;
        // SAFETY: the hook runs in the forked child before exec and only
        // makes async-signal-safe calls. The child detaches from our
        // session and adopts its pty client (already dup'ed onto fd 0) as
        // controlling terminal.
        unsafe {
            cmd.pre_exec(move || {
                // SAFETY: all three calls are async-signal-safe.
                unsafe {
                    if libc::setsid() < 0 {
                        return Err(std::io::Error::last_os_error());
                    }
                    if libc::ioctl(0, libc::TIOCSCTTY, 0) < 0 {
                        return Err(std::io::Error::last_os_error());
                    }
                    if ignore_sighup {
                        libc::signal(libc::SIGHUP, libc::SIG_IGN);
                    }
                }
                Ok(())
            });
        }

        let child = cmd.spawn().map_err(SpawnError::Io)?;
        debug!(pid = child.id(), tty = pty.client_name(), "spawned target");

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
            child,
            status: None,
            state: ExpectState::new(max_read),
            config,
            log,
        })
    }

    /// The child's process ID, while it runs.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Path of the child's terminal device.
    #[must_use]
    pub fn tty_name(&self) -> &str {
        self.pty.client_name()
    }

    /// Wait for the child to exit and return its status.
    pub async fn wait(&mut self) -> Result<ExitStatus> {
        if let Some(status) = self.status {
            return Ok(status);
        }
        let status = self
            .child
            .wait()
            .await
            .map_err(|e| BinExpectError::io_context("waiting for target", e))?;
        self.status = Some(status);
        Ok(status)
    }
}

impl std::fmt::Debug for SpawnedTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpawnedTarget")
            .field("pid", &self.child.id())
            .field("tty", &self.pty.client_name())
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl Engine for SpawnedTarget {
    fn tty(&self) -> BorrowedFd<'_> {
        self.pty.as_fd()
    }

    async fn send(&mut self, data: &[u8]) -> Result<usize> {
        if !self.config.delay_before_send.is_zero() {
            tokio::time::sleep(self.config.delay_before_send).await;
        }
        self.pty
            .write_all(data)
            .await
            .map_err(|e| BinExpectError::io_context("writing to target", e))?;
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
        let timeout = timeout.or(self.config.timeout);
        let window = search_window.or(self.config.search_window);
        self.state
            .expect(&mut self.pty, pattern, timeout, window, self.log.as_mut())
            .await
    }

    fn is_alive(&mut self) -> bool {
        if self.status.is_some() {
            return false;
        }
        match self.child.try_wait() {
            Ok(Some(status)) => {
                self.status = Some(status);
                false
            }
            Ok(None) => true,
            Err(_) => false,
        }
    }

    fn exit_status(&self) -> Option<i32> {
        self.status.and_then(|s| s.code())
    }

    fn signal_status(&self) -> Option<i32> {
        self.status.and_then(|s| s.signal())
    }

    fn echo(&self) -> Result<bool> {
        mode::get_echo(self.pty.as_fd())
    }

    fn set_echo(&mut self, on: bool) -> Result<()> {
        mode::set_echo(self.pty.as_fd(), on)
    }

    async fn interact(&mut self, options: InteractOptions) -> Result<()> {
        interact::passthrough(&mut self.pty, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wait_reports_the_exit_code() {
        let mut target = SpawnedTarget::spawn("sh", &["-c", "exit 7"]).await.unwrap();
        let status = target.wait().await.unwrap();
        assert_eq!(status.code(), Some(7));
        assert!(!target.is_alive());
        assert_eq!(target.exit_status(), Some(7));
        assert_eq!(target.signal_status(), None);
    }

    #[tokio::test]
    async fn tty_name_is_a_device_path() {
        let target = SpawnedTarget::spawn("sleep", &["5"]).await.unwrap();
        assert!(target.tty_name().starts_with("/dev/"));
        assert!(target.pid().is_some());
    }
}
