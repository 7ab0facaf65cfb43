//! The connection wrapper and the binary-transport capability.
//!
//! [`BinSession`] owns an engine connection exclusively and decorates it
//! with the escaping codec, the terminal-mode stack and the active line
//! terminator. Capabilities are plain traits on the wrapper; whether the
//! session does binary transport is an explicit flag set at construction,
//! not something discovered by inspecting types at runtime.

use std::time::Duration;

use rustix::termios::{OptionalActions, OutputModes, Termios};

use crate::engine::{Engine, Pattern};
use crate::error::Result;
use crate::escape::escape;
use crate::mode::ModeStack;
use crate::relay::{ProcessPropagator, StatusPropagator};
use crate::types::{LineEnding, SessionState};

/// Binary-safe send operations on top of a connection.
pub trait BinaryTransport {
    /// Escape the payload, then send it raw.
    fn sendbin(&mut self, payload: &[u8]) -> impl Future<Output = Result<usize>> + Send;

    /// Escape the payload, then send it with the active line terminator.
    fn sendbinline(&mut self, payload: &[u8]) -> impl Future<Output = Result<usize>> + Send;

    /// Turn the target terminal's newline translation on.
    fn set_nlcr(&mut self) -> Result<()>;

    /// Turn the target terminal's newline translation off.
    fn set_nonlcr(&mut self) -> Result<()>;
}

/// An engine connection decorated with binary transport and prompting.
pub struct BinSession<E: Engine> {
    pub(crate) engine: E,
    pub(crate) modes: ModeStack,
    pub(crate) line_ending: LineEnding,
    pub(crate) binary: bool,
    pub(crate) state: SessionState,
    pub(crate) propagator: Box<dyn StatusPropagator>,
}

impl<E: Engine> BinSession<E> {
    /// Wrap an engine connection, with binary transport enabled.
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            modes: ModeStack::new(),
            line_ending: LineEnding::default(),
            binary: true,
            state: SessionState::default(),
            propagator: Box::new(ProcessPropagator),
        }
    }

    /// Enable or disable the binary-transport capability.
    #[must_use]
    pub fn with_binary(mut self, binary: bool) -> Self {
        self.binary = binary;
        self
    }

    /// Replace the status propagator.
    #[must_use]
    pub fn with_propagator(mut self, propagator: Box<dyn StatusPropagator>) -> Self {
        self.propagator = propagator;
        self
    }

    /// Whether the session has the binary-transport capability.
    #[must_use]
    pub const fn is_binary(&self) -> bool {
        self.binary
    }

    /// Which side is driving the session.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// The line terminator currently appended by line-oriented sends.
    #[must_use]
    pub const fn line_ending(&self) -> LineEnding {
        self.line_ending
    }

    /// Number of saved terminal-mode frames awaiting a restore.
    #[must_use]
    pub fn mode_depth(&self) -> usize {
        self.modes.depth()
    }

    /// Shared access to the wrapped engine.
    pub const fn engine(&self) -> &E {
        &self.engine
    }

    /// Exclusive access to the wrapped engine.
    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// Unwrap the session, returning the engine connection.
    #[must_use]
    pub fn into_engine(self) -> E {
        self.engine
    }

    /// Send raw bytes.
    pub async fn send(&mut self, data: &[u8]) -> Result<usize> {
        self.engine.send(data).await
    }

    /// Send bytes followed by the active line terminator.
    pub async fn send_line(&mut self, data: &[u8]) -> Result<usize> {
        let mut line = data.to_vec();
        line.extend_from_slice(self.line_ending.as_bytes());
        self.engine.send(&line).await
    }

    /// Read until `pattern` matches, returning the matched bytes.
    pub async fn expect(
        &mut self,
        pattern: impl Into<Pattern>,
        timeout: Option<Duration>,
    ) -> Result<Vec<u8>> {
        let pattern = pattern.into();
        self.engine.expect(&pattern, timeout, None).await
    }

    /// Scoped terminal-attribute change, draining pending output first.
    ///
    /// The closure mutates a snapshot of the current attributes; if it
    /// changed anything the snapshot is applied, otherwise the terminal is
    /// left alone. Either way one frame is pushed for a later
    /// [`restore_mode`](Self::restore_mode) to pop.
    pub fn change_mode<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&mut Termios),
    {
        self.change_mode_when(OptionalActions::Drain, f)
    }

    /// Scoped terminal-attribute change with explicit timing.
    pub fn change_mode_when<F>(&mut self, when: OptionalActions, f: F) -> Result<()>
    where
        F: FnOnce(&mut Termios),
    {
        let applied = self.modes.change(self.engine.tty(), when, f)?;
        if let Some(mode) = applied {
            self.sync_line_ending(&mode);
        }
        Ok(())
    }

    /// Restore the attributes saved by the most recent mode change.
    pub fn restore_mode(&mut self) -> Result<()> {
        self.restore_mode_when(OptionalActions::Drain)
    }

    /// Restore the most recent saved attributes with explicit timing.
    pub fn restore_mode_when(&mut self, when: OptionalActions) -> Result<()> {
        let restored = self.modes.restore(self.engine.tty(), when)?;
        if let Some(mode) = restored {
            self.sync_line_ending(&mode);
        }
        Ok(())
    }

    /// Set or clear the output newline-translation bit in one scoped change.
    pub fn set_newline_translation(&mut self, on: bool) -> Result<()> {
        self.change_mode(|mode| {
            if on {
                mode.output_modes.insert(OutputModes::ONLCR);
            } else {
                mode.output_modes.remove(OutputModes::ONLCR);
            }
        })
    }

    /// Keep the line terminator in step with the terminal's own translation.
    ///
    /// While the terminal no longer expands `\n`, sending `\r\n` would be
    /// redundant on the wire and `\n` alone matches what the display gets.
    fn sync_line_ending(&mut self, mode: &Termios) {
        self.line_ending =
            LineEnding::from_translation(mode.output_modes.contains(OutputModes::ONLCR));
    }
}

impl<E: Engine> std::fmt::Debug for BinSession<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinSession")
            .field("state", &self.state)
            .field("binary", &self.binary)
            .field("line_ending", &self.line_ending)
            .field("mode_depth", &self.modes.depth())
            .finish_non_exhaustive()
    }
}

impl<E: Engine> BinaryTransport for BinSession<E> {
    async fn sendbin(&mut self, payload: &[u8]) -> Result<usize> {
        self.engine.send(&escape(payload)).await
    }

    async fn sendbinline(&mut self, payload: &[u8]) -> Result<usize> {
        let mut data = escape(payload);
        data.extend_from_slice(self.line_ending.as_bytes());
        self.engine.send(&data).await
    }

    fn set_nlcr(&mut self) -> Result<()> {
        self.set_newline_translation(true)
    }

    fn set_nonlcr(&mut self) -> Result<()> {
        self.set_newline_translation(false)
    }
}
