//! bin-expect: binary-safe transport for Expect-style terminal automation
//!
//! This crate decorates a spawn/expectation engine with three capabilities
//! a test harness or exploit-development script needs when it talks to a
//! program through a terminal:
//!
//! - **Binary transport**: arbitrary byte sequences are escaped so the
//!   line discipline passes them through instead of interpreting them as
//!   control sequences ([`BinaryTransport`]).
//! - **Terminal-mode management**: a save/restore stack over the target
//!   terminal's attributes, with newline translation toggled around binary
//!   operations and the line terminator tracked accordingly ([`ModeStack`]).
//! - **Interactive hand-off**: scripted matching suspends, a human drives
//!   the target directly, and the target's death is relayed (and optionally
//!   mirrored) into the controlling process ([`InteractivePrompt`]).
//!
//! The engine itself stays behind the narrow [`Engine`] trait. Two concrete
//! engines ship with the crate: [`SpawnedTarget`] runs a child process on a
//! fresh pty, and [`TtyTarget`] allocates a bare pty for other programs to
//! attach to (for example `gdb --tty=X`).
//!
//! # Example
//!
//! ```ignore
//! use bin_expect::{BinSession, BinaryTransport, InteractivePrompt, Pattern, PromptOptions, SpawnedTarget};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), bin_expect::BinExpectError> {
//!     let target = SpawnedTarget::spawn("./vuln", &[]).await?;
//!     let mut session = BinSession::new(target);
//!
//!     session.set_nonlcr()?;
//!     session.sendbinline(b"\x00\x16\xff\x90payload").await?;
//!     session
//!         .try_expect(&Pattern::exact(b"ok".as_slice()), None, None, true)
//!         .await?;
//!
//!     // Something went sideways? Take over by hand.
//!     session.pwned(PromptOptions::default()).await?;
//!     Ok(())
//! }
//! ```
//!
//! Unix only: the crate leans on POSIX terminal semantics and makes no
//! promises beyond them.

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod escape;
pub mod mode;
pub mod prompt;
pub mod relay;
pub mod session;
pub mod types;

pub use config::TargetConfig;
pub use engine::{Engine, FilterFn, InteractOptions, Pattern, Pty, SpawnedTarget, TtyTarget};
pub use error::{BinExpectError, Result, SpawnError};
pub use escape::{ESCAPE_MARKER, escape};
pub use mode::ModeStack;
pub use prompt::{InteractivePrompt, PromptOptions};
pub use relay::{ProcessPropagator, StatusPropagator, describe_status, signal_name};
pub use session::{BinSession, BinaryTransport};
pub use types::{LineEnding, SessionState};

/// Test utilities: scripted engine and recording propagator.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

#[cfg(any(test, feature = "test-utils"))]
pub use test_utils::{MockEngine, Propagated, RecordingPropagator};
