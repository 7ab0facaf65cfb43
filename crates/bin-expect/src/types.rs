//! Common types for bin-expect.

use std::fmt;

/// The line terminator appended by line-oriented sends.
///
/// Tracks the target terminal's output newline translation: while the
/// terminal translates `\n` to `\r\n` the full two-byte sequence is used,
/// and while translation is off only the trailing byte is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineEnding {
    /// Carriage return + line feed.
    #[default]
    CrLf,
    /// Line feed only.
    Lf,
}

impl LineEnding {
    /// Get the line ending as bytes.
    #[must_use]
    pub const fn as_bytes(self) -> &'static [u8] {
        match self {
            Self::CrLf => b"\r\n",
            Self::Lf => b"\n",
        }
    }

    /// Get the line ending as a string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CrLf => "\r\n",
            Self::Lf => "\n",
        }
    }

    /// Derive the line ending from the terminal's newline-translation bit.
    #[must_use]
    pub const fn from_translation(translating: bool) -> Self {
        if translating { Self::CrLf } else { Self::Lf }
    }
}

/// Which side is driving a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Automated expectation-matching is in control.
    #[default]
    Scripted,
    /// A human is in control through the passthrough loop.
    Interactive,
    /// The target died while control was handed over.
    Terminated,
}

impl SessionState {
    /// Check whether the session can still run scripted operations.
    #[must_use]
    pub const fn is_usable(self) -> bool {
        !matches!(self, Self::Terminated)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Scripted => "scripted",
            Self::Interactive => "interactive",
            Self::Terminated => "terminated",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_ending_bytes() {
        assert_eq!(LineEnding::CrLf.as_bytes(), b"\r\n");
        assert_eq!(LineEnding::Lf.as_bytes(), b"\n");
    }

    #[test]
    fn line_ending_follows_translation() {
        assert_eq!(LineEnding::from_translation(true), LineEnding::CrLf);
        assert_eq!(LineEnding::from_translation(false), LineEnding::Lf);
    }

    #[test]
    fn state_usability() {
        assert!(SessionState::Scripted.is_usable());
        assert!(SessionState::Interactive.is_usable());
        assert!(!SessionState::Terminated.is_usable());
    }
}
