//! Error types for bin-expect.
//!
//! Errors carry the data a script needs to decide what to do next: timeouts
//! and end-of-stream conditions keep the unmatched pattern and the buffer
//! contents at the point of failure.

use std::time::Duration;

use thiserror::Error;

/// Maximum number of buffer bytes echoed into an error message.
const MAX_BUFFER_DISPLAY: usize = 256;

/// Render a buffer tail for inclusion in an error message.
fn buffer_tail(buffer: &str) -> String {
    if buffer.is_empty() {
        return "(empty buffer)".to_string();
    }
    if buffer.len() <= MAX_BUFFER_DISPLAY {
        return format!("buffer: {buffer:?}");
    }
    let skip = buffer.len() - MAX_BUFFER_DISPLAY;
    let tail = &buffer[buffer.len() - MAX_BUFFER_DISPLAY..];
    format!("buffer ({skip} bytes hidden): …{tail:?}")
}

/// Format a timeout error message.
fn format_timeout(duration: Duration, pattern: &str, buffer: &str) -> String {
    format!(
        "timeout after {duration:?} waiting for pattern {pattern}; {}",
        buffer_tail(buffer)
    )
}

/// Format an end-of-stream error message.
fn format_eof(buffer: &str) -> String {
    format!("end of stream; {}", buffer_tail(buffer))
}

/// The main error type for bin-expect operations.
#[derive(Debug, Error)]
pub enum BinExpectError {
    /// Failed to spawn a target.
    #[error("failed to spawn target: {0}")]
    Spawn(#[from] SpawnError),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An I/O error occurred with additional context.
    #[error("{context}: {source}")]
    IoWithContext {
        /// What operation was being performed.
        context: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Timeout waiting for a pattern match.
    #[error("{}", format_timeout(*duration, pattern, buffer))]
    Timeout {
        /// The timeout duration that elapsed.
        duration: Duration,
        /// The pattern that was being searched for.
        pattern: String,
        /// Buffer contents at the time of the timeout.
        buffer: String,
    },

    /// End of stream reached before a pattern matched.
    #[error("{}", format_eof(buffer))]
    Eof {
        /// Buffer contents when the stream ended.
        buffer: String,
    },

    /// Terminal attribute access failed (bad descriptor, not a terminal).
    #[error("{context}: {source}")]
    Terminal {
        /// What terminal operation was being performed.
        context: String,
        /// The underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// A mode restore without a matching saved mode.
    #[error("terminal mode stack is empty: restore without a matching change")]
    ModeStackEmpty,

    /// Invalid regex pattern.
    #[error("invalid regex pattern: {0}")]
    Regex(#[from] regex::Error),

    /// Session is closed.
    #[error("session is closed")]
    SessionClosed,
}

/// Errors related to target spawning.
#[derive(Debug, Error)]
pub enum SpawnError {
    /// PTY allocation failed.
    #[error("failed to allocate PTY: {reason}")]
    PtyAllocation {
        /// The reason for the failure.
        reason: String,
    },

    /// Failed to set up the target's terminal.
    #[error("failed to set up terminal: {reason}")]
    TerminalSetup {
        /// The reason for the failure.
        reason: String,
    },

    /// Invalid command or argument.
    #[error("invalid {kind} {value:?}: {reason}")]
    InvalidArgument {
        /// The kind of invalid input (e.g., "command", "argument").
        kind: String,
        /// The value that was invalid.
        value: String,
        /// The reason it's invalid.
        reason: String,
    },

    /// General I/O error during spawn.
    #[error("I/O error during spawn: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for bin-expect operations.
pub type Result<T> = std::result::Result<T, BinExpectError>;

impl BinExpectError {
    /// Create a timeout error with the given details.
    pub fn timeout(
        duration: Duration,
        pattern: impl Into<String>,
        buffer: impl Into<String>,
    ) -> Self {
        Self::Timeout {
            duration,
            pattern: pattern.into(),
            buffer: buffer.into(),
        }
    }

    /// Create an end-of-stream error.
    pub fn eof(buffer: impl Into<String>) -> Self {
        Self::Eof {
            buffer: buffer.into(),
        }
    }

    /// Create an I/O error with context.
    pub fn io_context(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::IoWithContext {
            context: context.into(),
            source,
        }
    }

    /// Create a terminal attribute access error from an OS errno.
    pub fn terminal(context: impl Into<String>, errno: rustix::io::Errno) -> Self {
        Self::Terminal {
            context: context.into(),
            source: std::io::Error::from_raw_os_error(errno.raw_os_error()),
        }
    }

    /// Check if this is a timeout error.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Check if this is an end-of-stream error.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        matches!(self, Self::Eof { .. })
    }

    /// Get the buffer contents if this error carries them.
    #[must_use]
    pub fn buffer(&self) -> Option<&str> {
        match self {
            Self::Timeout { buffer, .. } | Self::Eof { buffer } => Some(buffer),
            _ => None,
        }
    }
}

impl SpawnError {
    /// Create a PTY allocation error.
    pub fn pty_allocation(reason: impl Into<String>) -> Self {
        Self::PtyAllocation {
            reason: reason.into(),
        }
    }

    /// Create a terminal setup error.
    pub fn terminal_setup(reason: impl Into<String>) -> Self {
        Self::TerminalSetup {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_display() {
        let err = BinExpectError::timeout(Duration::from_secs(5), "\"password:\"", "login: user\n");
        let msg = err.to_string();
        assert!(msg.contains("timeout"));
        assert!(msg.contains("password:"));
        assert!(msg.contains("login: user"));
        assert!(err.is_timeout());
        assert!(!err.is_eof());
    }

    #[test]
    fn eof_display_empty_buffer() {
        let err = BinExpectError::eof("");
        assert!(err.to_string().contains("empty buffer"));
        assert!(err.is_eof());
    }

    #[test]
    fn eof_display_truncates_long_buffer() {
        let buffer: String = "x".repeat(MAX_BUFFER_DISPLAY * 2);
        let err = BinExpectError::eof(buffer);
        let msg = err.to_string();
        assert!(msg.contains("bytes hidden"));
    }

    #[test]
    fn buffer_accessor() {
        let err = BinExpectError::timeout(Duration::from_secs(1), "p", "the buffer");
        assert_eq!(err.buffer(), Some("the buffer"));

        let io = BinExpectError::Io(std::io::Error::other("nope"));
        assert!(io.buffer().is_none());
    }

    #[test]
    fn io_context_display() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such tty");
        let err = BinExpectError::io_context("opening client side", io);
        let msg = err.to_string();
        assert!(msg.contains("opening client side"));
        assert!(msg.contains("no such tty"));
    }

    #[test]
    fn spawn_error_display() {
        let err = SpawnError::pty_allocation("out of ptys");
        assert!(err.to_string().contains("out of ptys"));
    }
}
