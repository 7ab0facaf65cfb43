//! The boundary with the spawn/expectation engine.
//!
//! Everything the rest of the crate needs from an engine fits in the
//! [`Engine`] trait: a raw send primitive, pattern expectation, liveness and
//! exit-status queries, local echo control, and the blocking interactive
//! passthrough loop. The concrete targets in this module implement it on top
//! of a pty; anything else that can satisfy the trait works just as well.

pub mod interact;
pub mod pty;
pub mod spawn;
pub mod tty;

mod expect;

use std::os::fd::BorrowedFd;
use std::time::Duration;

use crate::error::Result;

pub use pty::Pty;
pub use spawn::SpawnedTarget;
pub use tty::TtyTarget;

/// A pattern to match against incoming data.
#[derive(Debug, Clone)]
pub enum Pattern {
    /// An exact byte sequence.
    Exact(Vec<u8>),
    /// A byte-oriented regular expression.
    Regex(regex::bytes::Regex),
}

impl Pattern {
    /// Create an exact byte pattern.
    pub fn exact(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Exact(bytes.into())
    }

    /// Compile a byte-oriented regular expression pattern.
    pub fn regex(pattern: &str) -> Result<Self> {
        Ok(Self::Regex(regex::bytes::Regex::new(pattern)?))
    }

    /// Find the first match in `haystack`, returning its byte range.
    #[must_use]
    pub fn find(&self, haystack: &[u8]) -> Option<(usize, usize)> {
        match self {
            Self::Exact(needle) => {
                if needle.is_empty() {
                    return Some((0, 0));
                }
                haystack
                    .windows(needle.len())
                    .position(|window| window == needle.as_slice())
                    .map(|start| (start, start + needle.len()))
            }
            Self::Regex(re) => re.find(haystack).map(|m| (m.start(), m.end())),
        }
    }

    /// Human-readable form for diagnostics.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Exact(needle) => format!("\"{}\"", needle.escape_ascii()),
            Self::Regex(re) => format!("/{}/", re.as_str()),
        }
    }
}

impl From<&[u8]> for Pattern {
    fn from(bytes: &[u8]) -> Self {
        Self::exact(bytes)
    }
}

impl<const N: usize> From<&[u8; N]> for Pattern {
    fn from(bytes: &[u8; N]) -> Self {
        Self::exact(bytes.as_slice())
    }
}

impl From<&str> for Pattern {
    fn from(s: &str) -> Self {
        Self::exact(s.as_bytes())
    }
}

/// A byte filter applied to one direction of the passthrough loop.
pub type FilterFn = Box<dyn FnMut(&[u8]) -> Vec<u8> + Send>;

/// Options for the interactive passthrough loop.
pub struct InteractOptions {
    /// Typing this character exits the loop. Defaults to Ctrl-] (`0x1d`).
    pub escape_character: u8,
    /// Filter applied to bytes typed by the human before they reach the target.
    pub input_filter: Option<FilterFn>,
    /// Filter applied to target output before it reaches the human.
    pub output_filter: Option<FilterFn>,
}

impl Default for InteractOptions {
    fn default() -> Self {
        Self {
            escape_character: 0x1d,
            input_filter: None,
            output_filter: None,
        }
    }
}

impl std::fmt::Debug for InteractOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractOptions")
            .field("escape_character", &self.escape_character)
            .field("input_filter", &self.input_filter.is_some())
            .field("output_filter", &self.output_filter.is_some())
            .finish()
    }
}

impl InteractOptions {
    /// Create options with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the escape character.
    #[must_use]
    pub const fn with_escape_character(mut self, ch: u8) -> Self {
        self.escape_character = ch;
        self
    }

    /// Set the input filter.
    #[must_use]
    pub fn with_input_filter<F>(mut self, f: F) -> Self
    where
        F: FnMut(&[u8]) -> Vec<u8> + Send + 'static,
    {
        self.input_filter = Some(Box::new(f));
        self
    }

    /// Set the output filter.
    #[must_use]
    pub fn with_output_filter<F>(mut self, f: F) -> Self
    where
        F: FnMut(&[u8]) -> Vec<u8> + Send + 'static,
    {
        self.output_filter = Some(Box::new(f));
        self
    }
}

/// The spawn/expectation engine a session wraps.
///
/// Implementations own a live target (a child process, a bare pty, …) and a
/// read buffer. The wrapper layered on top never reaches around this
/// interface.
pub trait Engine: Send {
    /// The target's controlling terminal descriptor.
    fn tty(&self) -> BorrowedFd<'_>;

    /// Send raw bytes to the target. Returns the number of bytes written.
    fn send(&mut self, data: &[u8]) -> impl Future<Output = Result<usize>> + Send;

    /// Read until `pattern` matches, returning the matched bytes.
    ///
    /// `timeout` and `search_window` default to the engine's configuration
    /// when `None`. Fails with a timeout error when the pattern was not
    /// seen in time and with an end-of-stream error when the target's
    /// stream ended first.
    fn expect(
        &mut self,
        pattern: &Pattern,
        timeout: Option<Duration>,
        search_window: Option<usize>,
    ) -> impl Future<Output = Result<Vec<u8>>> + Send;

    /// Check whether the target is still alive.
    fn is_alive(&mut self) -> bool;

    /// The target's exit code, if it exited normally.
    fn exit_status(&self) -> Option<i32>;

    /// The signal that terminated the target, if any.
    fn signal_status(&self) -> Option<i32>;

    /// Read the target terminal's local-echo flag.
    fn echo(&self) -> Result<bool>;

    /// Set the target terminal's local-echo flag.
    fn set_echo(&mut self, on: bool) -> Result<()>;

    /// Run the blocking interactive passthrough loop.
    ///
    /// Returns when the escape character is typed or the target's stream
    /// ends; the caller checks liveness afterwards.
    fn interact(&mut self, options: InteractOptions) -> impl Future<Output = Result<()>> + Send;
}
