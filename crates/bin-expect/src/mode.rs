//! Terminal-mode save/restore stack.
//!
//! Binary transfers need the target terminal's newline translation turned
//! off, but nothing else about its attributes should change. The stack
//! captures whole attribute snapshots around each scoped change so a later
//! restore puts back exactly what was there, including attributes some other
//! code set in the meantime.

use std::os::fd::BorrowedFd;

use rustix::termios::{
    self, LocalModes, OptionalActions, SpecialCodeIndex, Termios,
};

use crate::error::{BinExpectError, Result};

/// The control characters compared when deciding whether a snapshot diverged.
const SPECIAL_CODES: [SpecialCodeIndex; 16] = [
    SpecialCodeIndex::VINTR,
    SpecialCodeIndex::VQUIT,
    SpecialCodeIndex::VERASE,
    SpecialCodeIndex::VKILL,
    SpecialCodeIndex::VEOF,
    SpecialCodeIndex::VTIME,
    SpecialCodeIndex::VMIN,
    SpecialCodeIndex::VSTART,
    SpecialCodeIndex::VSTOP,
    SpecialCodeIndex::VSUSP,
    SpecialCodeIndex::VEOL,
    SpecialCodeIndex::VREPRINT,
    SpecialCodeIndex::VDISCARD,
    SpecialCodeIndex::VWERASE,
    SpecialCodeIndex::VLNEXT,
    SpecialCodeIndex::VEOL2,
];

/// Compare two attribute snapshots group by group.
#[must_use]
pub(crate) fn attrs_equal(a: &Termios, b: &Termios) -> bool {
    a.input_modes == b.input_modes
        && a.output_modes == b.output_modes
        && a.control_modes == b.control_modes
        && a.local_modes == b.local_modes
        && a.input_speed() == b.input_speed()
        && a.output_speed() == b.output_speed()
        && SPECIAL_CODES
            .iter()
            .all(|&idx| a.special_codes[idx] == b.special_codes[idx])
}

/// A stack of saved terminal-attribute snapshots for one descriptor.
///
/// Each [`change`](Self::change) pushes one frame and each
/// [`restore`](Self::restore) pops one; a change whose snapshot never
/// diverged is remembered as a no-op frame so its restore does not touch the
/// terminal. Pairing every change with a restore is the caller's contract:
/// an unmatched restore reports [`BinExpectError::ModeStackEmpty`], while an
/// unmatched change leaves the terminal in the changed state.
#[derive(Debug, Default)]
pub struct ModeStack {
    saved: Vec<Option<Termios>>,
}

impl ModeStack {
    /// Create an empty stack.
    #[must_use]
    pub const fn new() -> Self {
        Self { saved: Vec::new() }
    }

    /// Number of saved frames.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.saved.len()
    }

    /// Check whether the stack has no saved frames.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.saved.is_empty()
    }

    /// Scoped attribute change.
    ///
    /// Captures the descriptor's current attributes, pushes a copy, and
    /// hands a working snapshot to `f` for mutation. If `f` left the
    /// snapshot untouched the terminal is not written and the frame becomes
    /// a no-op; otherwise the modified snapshot is applied with the given
    /// timing. Returns the applied snapshot, if any, so callers can track
    /// dependent state such as the active line terminator.
    pub fn change<F>(
        &mut self,
        fd: BorrowedFd<'_>,
        when: OptionalActions,
        f: F,
    ) -> Result<Option<Termios>>
    where
        F: FnOnce(&mut Termios),
    {
        let saved = termios::tcgetattr(fd)
            .map_err(|e| BinExpectError::terminal("reading terminal attributes", e))?;
        let mut mode = saved.clone();
        f(&mut mode);

        if attrs_equal(&mode, &saved) {
            self.saved.push(None);
            return Ok(None);
        }

        termios::tcsetattr(fd, when, &mode)
            .map_err(|e| BinExpectError::terminal("applying terminal attributes", e))?;
        self.saved.push(Some(saved));
        Ok(Some(mode))
    }

    /// Pop the most recent frame and re-apply its snapshot.
    ///
    /// No-op frames do nothing. Returns the re-applied snapshot, if any.
    pub fn restore(
        &mut self,
        fd: BorrowedFd<'_>,
        when: OptionalActions,
    ) -> Result<Option<Termios>> {
        match self.saved.pop() {
            None => Err(BinExpectError::ModeStackEmpty),
            Some(None) => Ok(None),
            Some(Some(saved)) => {
                termios::tcsetattr(fd, when, &saved)
                    .map_err(|e| BinExpectError::terminal("restoring terminal attributes", e))?;
                Ok(Some(saved))
            }
        }
    }
}

/// Read the local-echo flag of a terminal descriptor.
pub(crate) fn get_echo(fd: BorrowedFd<'_>) -> Result<bool> {
    let mode = termios::tcgetattr(fd)
        .map_err(|e| BinExpectError::terminal("reading echo state", e))?;
    Ok(mode.local_modes.contains(LocalModes::ECHO))
}

/// Set or clear the local-echo flag of a terminal descriptor.
pub(crate) fn set_echo(fd: BorrowedFd<'_>, on: bool) -> Result<()> {
    let mut mode = termios::tcgetattr(fd)
        .map_err(|e| BinExpectError::terminal("reading echo state", e))?;
    if on {
        mode.local_modes.insert(LocalModes::ECHO);
    } else {
        mode.local_modes.remove(LocalModes::ECHO);
    }
    termios::tcsetattr(fd, OptionalActions::Drain, &mode)
        .map_err(|e| BinExpectError::terminal("setting echo state", e))
}
