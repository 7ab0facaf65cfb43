//! Configuration for concrete targets.

use std::path::PathBuf;
use std::time::Duration;

/// Default expectation timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default maximum bytes read from the target in one call.
pub const DEFAULT_MAX_READ: usize = 2000;

/// Default terminal width.
pub const DEFAULT_TERMINAL_WIDTH: u16 = 80;

/// Default terminal height.
pub const DEFAULT_TERMINAL_HEIGHT: u16 = 24;

/// Configuration for spawning and reading from a target.
#[derive(Debug, Clone)]
pub struct TargetConfig {
    /// Default timeout for expectation matching. `None` waits forever.
    pub timeout: Option<Duration>,

    /// Maximum number of bytes read from the target at one time.
    /// A value of 1 effectively turns off read buffering.
    pub max_read: usize,

    /// How far back in the incoming buffer pattern matching searches.
    /// `None` searches the whole buffer.
    pub search_window: Option<usize>,

    /// Delay inserted before every send. Helps with targets that read
    /// before they had a chance to configure their terminal.
    pub delay_before_send: Duration,

    /// Terminal dimensions (cols, rows) for the target's pty.
    pub dimensions: (u16, u16),

    /// Copy all bytes sent and received to this file.
    pub log_file: Option<PathBuf>,

    /// Working directory for a spawned target.
    pub cwd: Option<PathBuf>,

    /// Extra environment variables for a spawned target.
    pub env: Vec<(String, String)>,

    /// Whether a spawned target ignores SIGHUP.
    pub ignore_sighup: bool,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            timeout: Some(DEFAULT_TIMEOUT),
            max_read: DEFAULT_MAX_READ,
            search_window: None,
            delay_before_send: Duration::ZERO,
            dimensions: (DEFAULT_TERMINAL_WIDTH, DEFAULT_TERMINAL_HEIGHT),
            log_file: None,
            cwd: None,
            env: Vec::new(),
            ignore_sighup: true,
        }
    }
}

impl TargetConfig {
    /// Create a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default expectation timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the maximum read size.
    #[must_use]
    pub const fn with_max_read(mut self, max_read: usize) -> Self {
        self.max_read = max_read;
        self
    }

    /// Set the pattern search window.
    #[must_use]
    pub const fn with_search_window(mut self, window: Option<usize>) -> Self {
        self.search_window = window;
        self
    }

    /// Set the delay inserted before every send.
    #[must_use]
    pub const fn with_delay_before_send(mut self, delay: Duration) -> Self {
        self.delay_before_send = delay;
        self
    }

    /// Set the pty dimensions.
    #[must_use]
    pub const fn with_dimensions(mut self, cols: u16, rows: u16) -> Self {
        self.dimensions = (cols, rows);
        self
    }

    /// Log all session I/O to the given file.
    #[must_use]
    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    /// Set the working directory of a spawned target.
    #[must_use]
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Add an environment variable for a spawned target.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Set whether a spawned target ignores SIGHUP.
    #[must_use]
    pub const fn with_ignore_sighup(mut self, ignore: bool) -> Self {
        self.ignore_sighup = ignore;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = TargetConfig::default();
        assert_eq!(config.timeout, Some(DEFAULT_TIMEOUT));
        assert_eq!(config.max_read, DEFAULT_MAX_READ);
        assert_eq!(config.dimensions, (80, 24));
        assert!(config.ignore_sighup);
        assert!(config.log_file.is_none());
    }

    #[test]
    fn builder_chain() {
        let config = TargetConfig::new()
            .with_timeout(None)
            .with_max_read(1)
            .with_search_window(Some(128))
            .with_dimensions(120, 40)
            .with_env("TERM", "dumb");
        assert_eq!(config.timeout, None);
        assert_eq!(config.max_read, 1);
        assert_eq!(config.search_window, Some(128));
        assert_eq!(config.dimensions, (120, 40));
        assert_eq!(config.env.len(), 1);
    }
}
