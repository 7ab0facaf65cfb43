//! Interactive hand-off between scripted matching and a live human.
//!
//! [`prompt`](InteractivePrompt::prompt) suspends the script and gives a
//! human the target's terminal; [`try_expect`](InteractivePrompt::try_expect)
//! is the fault-tolerant expectation built on top of it: a missed pattern
//! drops into interactive diagnosis instead of failing the script.
//!
//! All diagnostics are written with explicit `\r\n` so they stay legible
//! while the terminal's newline translation is off.

use std::io::Write as _;
use std::os::fd::AsFd;
use std::time::Duration;

use rustix::termios::isatty;
use tracing::debug;

use crate::engine::{Engine, FilterFn, InteractOptions, Pattern};
use crate::error::Result;
use crate::relay::describe_status;
use crate::session::{BinSession, BinaryTransport};
use crate::types::SessionState;

/// Banner printed by [`InteractivePrompt::pwned`] on a real terminal.
const SPLASH: &str = concat!(
    ".______  ____    __    ____ .__   __.  _______  _______\r\n",
    "|   _  \\ \\   \\  /  \\  /   / |  \\ |  | |   ____||       \\\r\n",
    "|  |_)  | \\   \\/    \\/   /  |   \\|  | |  |__   |  .--.  |\r\n",
    "|   ___/   \\            /   |  . `  | |   __|  |  |  |  |\r\n",
    "|  |        \\    /\\    /    |  |\\   | |  |____ |  '--'  |\r\n",
    "| _|         \\__/  \\__/     |__| \\__| |_______||_______/\r\n",
    "\r\n",
);

/// Options for one interactive hand-off.
pub struct PromptOptions {
    /// Text printed before the passthrough starts (terminal output only).
    pub message: Option<String>,
    /// Echo setting applied for the session; `None` leaves echo alone.
    pub echo: Option<bool>,
    /// Typing this character exits the passthrough. Defaults to Ctrl-].
    pub escape_character: u8,
    /// Whether to print the escape-character hint.
    pub print_escape_character: bool,
    /// Whether a dead target's status is mirrored into this process.
    pub exit_with_program: bool,
    /// Filter applied to the human's input before it reaches the target.
    pub input_filter: Option<FilterFn>,
    /// Filter applied to target output before it reaches the human.
    pub output_filter: Option<FilterFn>,
}

impl Default for PromptOptions {
    fn default() -> Self {
        Self {
            message: None,
            echo: Some(true),
            escape_character: 0x1d,
            print_escape_character: true,
            exit_with_program: true,
            input_filter: None,
            output_filter: None,
        }
    }
}

impl std::fmt::Debug for PromptOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptOptions")
            .field("message", &self.message)
            .field("echo", &self.echo)
            .field("escape_character", &self.escape_character)
            .field("exit_with_program", &self.exit_with_program)
            .finish_non_exhaustive()
    }
}

impl PromptOptions {
    /// Create options with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the message printed before the passthrough.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Set the echo behavior. `None` leaves the target's echo alone.
    #[must_use]
    pub const fn with_echo(mut self, echo: Option<bool>) -> Self {
        self.echo = echo;
        self
    }

    /// Set the escape character.
    #[must_use]
    pub const fn with_escape_character(mut self, ch: u8) -> Self {
        self.escape_character = ch;
        self
    }

    /// Set whether the escape-character hint is printed.
    #[must_use]
    pub const fn with_print_escape_character(mut self, print: bool) -> Self {
        self.print_escape_character = print;
        self
    }

    /// Set whether a dead target's status is mirrored into this process.
    #[must_use]
    pub const fn with_exit_with_program(mut self, exit: bool) -> Self {
        self.exit_with_program = exit;
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

/// Interactive prompting on top of a connection.
pub trait InteractivePrompt {
    /// Hand the terminal to a human, then return to scripted control.
    fn prompt(&mut self, options: PromptOptions) -> impl Future<Output = Result<()>> + Send;

    /// Like [`prompt`](Self::prompt), with a decorative banner, and the
    /// target's death is never mirrored into this process.
    fn pwned(&mut self, options: PromptOptions) -> impl Future<Output = Result<()>> + Send;

    /// Expect with recovery: a timeout becomes an interactive hand-off and
    /// `Ok(None)`, an explained target death is reported and swallowed.
    fn try_expect(
        &mut self,
        pattern: &Pattern,
        timeout: Option<Duration>,
        search_window: Option<usize>,
        exit_with_program: bool,
    ) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send;
}

fn stdout_is_tty() -> bool {
    isatty(std::io::stdout().as_fd())
}

/// Best-effort diagnostic line; the session may be half torn down already.
fn diag(text: &str) {
    let mut out = std::io::stdout().lock();
    let _ = out.write_all(text.as_bytes());
    let _ = out.flush();
}

impl<E: Engine> BinSession<E> {
    /// Report a dead target's status and optionally mirror it onto us.
    ///
    /// Returns `true` when the status explains nothing (no signal, no exit
    /// code) and the caller should treat the condition as unexplained.
    pub fn relay_status(&mut self, exit_with_program: bool) -> bool {
        let signal = self.engine.signal_status();
        let exit_code = self.engine.exit_status();

        let Some(report) = describe_status(signal, exit_code) else {
            return true;
        };
        diag(&format!("{report}\r\n"));

        if let Some(signal) = signal {
            if exit_with_program {
                diag("Killing ourself with same signal.\r\n");
                self.propagator.raise(signal);
            }
        } else if let Some(code) = exit_code {
            if exit_with_program {
                diag("Exiting with same status.\r\n");
                self.propagator.exit(code);
            }
        }
        false
    }
}

impl<E: Engine> InteractivePrompt for BinSession<E> {
    async fn prompt(&mut self, mut options: PromptOptions) -> Result<()> {
        let old_echo = self.engine.echo()?;
        if let Some(echo) = options.echo {
            self.engine.set_echo(echo)?;
        }

        // Courtesy for the human: scripted code may have turned newline
        // translation off for binary safety, which makes live output
        // stairstep across the screen.
        let forced_translation = self.binary;
        if forced_translation {
            self.set_nlcr()?;
        }

        if stdout_is_tty() {
            if options.print_escape_character {
                diag(&format!(
                    "Escape character is '^{}'\r\n",
                    options.escape_character.wrapping_add(64) as char
                ));
            }
            if let Some(message) = &options.message {
                diag(message);
            }
        }

        debug!(escape = options.escape_character, "entering passthrough");
        self.state = SessionState::Interactive;

        let interact = InteractOptions {
            escape_character: options.escape_character,
            input_filter: options.input_filter.take(),
            output_filter: options.output_filter.take(),
        };
        self.engine.interact(interact).await?;

        if self.engine.is_alive() {
            if forced_translation {
                self.restore_mode()?;
            }
            if let Some(echo) = options.echo {
                if echo != old_echo {
                    self.engine.set_echo(old_echo)?;
                }
            }
            self.state = SessionState::Scripted;
            return Ok(());
        }

        // The connection dies with the target; restoring modes is moot.
        self.state = SessionState::Terminated;
        self.relay_status(options.exit_with_program);
        Ok(())
    }

    async fn pwned(&mut self, options: PromptOptions) -> Result<()> {
        if stdout_is_tty() {
            diag(SPLASH);
        }
        // We just took the thing over. Don't let it kill us.
        self.prompt(options.with_exit_with_program(false)).await
    }

    async fn try_expect(
        &mut self,
        pattern: &Pattern,
        timeout: Option<Duration>,
        search_window: Option<usize>,
        exit_with_program: bool,
    ) -> Result<Option<Vec<u8>>> {
        match self.engine.expect(pattern, timeout, search_window).await {
            Ok(matched) => Ok(Some(matched)),
            Err(err) if err.is_timeout() => {
                debug!(pattern = %pattern.describe(), "expectation timed out, handing off");
                let options = PromptOptions::default().with_message(format!(
                    "Didn't receive expected {}.\r\n",
                    pattern.describe()
                ));
                self.prompt(options).await?;
                diag("Continuing script.\r\n");
                Ok(None)
            }
            Err(err) if err.is_eof() => {
                if self.engine.is_alive() {
                    // End of stream from a target that still runs is
                    // unexpected; the caller must decide.
                    return Err(err);
                }
                if self.relay_status(exit_with_program) {
                    Err(err)
                } else {
                    Ok(None)
                }
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BinExpectError;
    use crate::test_utils::{MockEngine, Propagated, RecordingPropagator};

    fn session_with_recorder(
        engine: MockEngine,
    ) -> (
        BinSession<MockEngine>,
        std::sync::Arc<std::sync::Mutex<Vec<Propagated>>>,
    ) {
        let (propagator, record) = RecordingPropagator::new();
        let session = BinSession::new(engine).with_propagator(Box::new(propagator));
        (session, record)
    }

    #[tokio::test]
    async fn prompt_restores_modes_and_echo_when_target_survives() {
        let engine = MockEngine::new().unwrap();
        let (mut session, record) = session_with_recorder(engine);

        let before_echo = session.engine().echo().unwrap();
        session.prompt(PromptOptions::default().with_echo(Some(!before_echo)))
            .await
            .unwrap();

        assert_eq!(session.engine().interactions(), 1);
        assert_eq!(session.state(), SessionState::Scripted);
        assert_eq!(session.mode_depth(), 0);
        assert_eq!(session.engine().echo().unwrap(), before_echo);
        assert!(record.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn prompt_relays_a_signal_death() {
        let engine = MockEngine::new()
            .unwrap()
            .with_death_after_interact(Some(15), None);
        let (mut session, record) = session_with_recorder(engine);

        session.prompt(PromptOptions::default()).await.unwrap();

        assert_eq!(session.state(), SessionState::Terminated);
        assert_eq!(record.lock().unwrap().as_slice(), &[Propagated::Raise(15)]);
    }

    #[tokio::test]
    async fn pwned_never_mirrors_the_death() {
        let engine = MockEngine::new()
            .unwrap()
            .with_death_after_interact(None, Some(3));
        let (mut session, record) = session_with_recorder(engine);

        session.pwned(PromptOptions::default()).await.unwrap();

        assert_eq!(session.state(), SessionState::Terminated);
        assert!(record.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn try_expect_timeout_hands_off_and_continues() {
        let engine = MockEngine::new().unwrap().with_expect_result(Err(
            BinExpectError::timeout(Duration::from_secs(1), "\"foo\"", ""),
        ));
        let (mut session, record) = session_with_recorder(engine);

        let result = session
            .try_expect(&Pattern::exact(b"foo".as_slice()), None, None, true)
            .await
            .unwrap();

        assert!(result.is_none());
        assert_eq!(session.engine().interactions(), 1);
        assert!(record.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn try_expect_eof_with_live_target_propagates() {
        let engine = MockEngine::new()
            .unwrap()
            .with_expect_result(Err(BinExpectError::eof("")));
        let (mut session, _record) = session_with_recorder(engine);

        let err = session
            .try_expect(&Pattern::exact(b"foo".as_slice()), None, None, true)
            .await
            .unwrap_err();
        assert!(err.is_eof());
    }

    #[tokio::test]
    async fn try_expect_eof_with_exit_code_is_reported_and_swallowed() {
        let engine = MockEngine::new()
            .unwrap()
            .with_expect_result(Err(BinExpectError::eof("")))
            .with_status(None, Some(3));
        let (mut session, record) = session_with_recorder(engine);

        let result = session
            .try_expect(&Pattern::exact(b"foo".as_slice()), None, None, true)
            .await
            .unwrap();
        assert!(result.is_none());
        assert_eq!(record.lock().unwrap().as_slice(), &[Propagated::Exit(3)]);
    }

    #[tokio::test]
    async fn try_expect_eof_without_status_propagates() {
        let engine = MockEngine::new()
            .unwrap()
            .with_expect_result(Err(BinExpectError::eof("")))
            .with_status(None, None);
        let (mut session, record) = session_with_recorder(engine);

        let err = session
            .try_expect(&Pattern::exact(b"foo".as_slice()), None, None, true)
            .await
            .unwrap_err();
        assert!(err.is_eof());
        assert!(record.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn try_expect_returns_the_match() {
        let engine = MockEngine::new()
            .unwrap()
            .with_expect_result(Ok(b"foo".to_vec()));
        let (mut session, _record) = session_with_recorder(engine);

        let result = session
            .try_expect(&Pattern::exact(b"foo".as_slice()), None, None, true)
            .await
            .unwrap();
        assert_eq!(result.as_deref(), Some(b"foo".as_slice()));
    }
}
