//! Test utilities: a scripted engine and a recording propagator.
//!
//! The mock engine records every raw send and plays back scripted
//! expectation results, while still backing its terminal descriptor with a
//! real pty so attribute operations behave like production. Available to
//! dependents through the `test-utils` feature.

use std::collections::VecDeque;
use std::os::fd::{AsFd, BorrowedFd, OwnedFd};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rustix::pty::{OpenptFlags, openpt};
use rustix::termios::{self, OptionalActions, OutputModes};

use crate::engine::{Engine, InteractOptions, Pattern};
use crate::error::{BinExpectError, Result};
use crate::relay::StatusPropagator;

/// A scripted engine for exercising the session wrapper.
pub struct MockEngine {
    tty: OwnedFd,
    sent: Vec<Vec<u8>>,
    expect_results: VecDeque<Result<Vec<u8>>>,
    interactions: usize,
    alive: bool,
    exit_status: Option<i32>,
    signal_status: Option<i32>,
    death_after_interact: Option<(Option<i32>, Option<i32>)>,
}

impl MockEngine {
    /// Create a mock whose terminal descriptor is a fresh pty master with
    /// newline translation initially on.
    pub fn new() -> Result<Self> {
        let tty = openpt(OpenptFlags::RDWR | OpenptFlags::NOCTTY)
            .map_err(|e| BinExpectError::terminal("allocating mock tty", e))?;

        let mut mode = termios::tcgetattr(&tty)
            .map_err(|e| BinExpectError::terminal("reading mock tty attributes", e))?;
        mode.output_modes.insert(OutputModes::ONLCR);
        termios::tcsetattr(&tty, OptionalActions::Now, &mode)
            .map_err(|e| BinExpectError::terminal("preparing mock tty", e))?;

        Ok(Self {
            tty,
            sent: Vec::new(),
            expect_results: VecDeque::new(),
            interactions: 0,
            alive: true,
            exit_status: None,
            signal_status: None,
            death_after_interact: None,
        })
    }

    /// Queue a result for the next expectation.
    #[must_use]
    pub fn with_expect_result(mut self, result: Result<Vec<u8>>) -> Self {
        self.expect_results.push_back(result);
        self
    }

    /// Mark the target dead with the given signal/exit status.
    #[must_use]
    pub fn with_status(mut self, signal: Option<i32>, exit_code: Option<i32>) -> Self {
        self.alive = false;
        self.signal_status = signal;
        self.exit_status = exit_code;
        self
    }

    /// Make the target die during the next passthrough.
    #[must_use]
    pub const fn with_death_after_interact(
        mut self,
        signal: Option<i32>,
        exit_code: Option<i32>,
    ) -> Self {
        self.death_after_interact = Some((signal, exit_code));
        self
    }

    /// Everything sent through the raw send primitive, in order.
    #[must_use]
    pub fn sent(&self) -> &[Vec<u8>] {
        &self.sent
    }

    /// All raw sends flattened into one byte stream.
    #[must_use]
    pub fn wire(&self) -> Vec<u8> {
        self.sent.concat()
    }

    /// How many passthrough sessions ran.
    #[must_use]
    pub const fn interactions(&self) -> usize {
        self.interactions
    }
}

impl Engine for MockEngine {
    fn tty(&self) -> BorrowedFd<'_> {
        self.tty.as_fd()
    }

    async fn send(&mut self, data: &[u8]) -> Result<usize> {
        self.sent.push(data.to_vec());
        Ok(data.len())
    }

    async fn expect(
        &mut self,
        pattern: &Pattern,
        timeout: Option<Duration>,
        _search_window: Option<usize>,
    ) -> Result<Vec<u8>> {
        self.expect_results.pop_front().unwrap_or_else(|| {
            Err(BinExpectError::timeout(
                timeout.unwrap_or(Duration::ZERO),
                pattern.describe(),
                String::new(),
            ))
        })
    }

    fn is_alive(&mut self) -> bool {
        self.alive
    }

    fn exit_status(&self) -> Option<i32> {
        self.exit_status
    }

    fn signal_status(&self) -> Option<i32> {
        self.signal_status
    }

    fn echo(&self) -> Result<bool> {
        crate::mode::get_echo(self.tty.as_fd())
    }

    fn set_echo(&mut self, on: bool) -> Result<()> {
        crate::mode::set_echo(self.tty.as_fd(), on)
    }

    async fn interact(&mut self, _options: InteractOptions) -> Result<()> {
        self.interactions += 1;
        if let Some((signal, exit_code)) = self.death_after_interact.take() {
            self.alive = false;
            self.signal_status = signal;
            self.exit_status = exit_code;
        }
        Ok(())
    }
}

impl std::fmt::Debug for MockEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockEngine")
            .field("sends", &self.sent.len())
            .field("interactions", &self.interactions)
            .field("alive", &self.alive)
            .finish_non_exhaustive()
    }
}

/// What a [`RecordingPropagator`] was asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagated {
    /// Exit with this code.
    Exit(i32),
    /// Re-raise this signal.
    Raise(i32),
}

/// A propagator that records instead of terminating the process.
#[derive(Debug)]
pub struct RecordingPropagator {
    record: Arc<Mutex<Vec<Propagated>>>,
}

impl RecordingPropagator {
    /// Create a recorder and the shared log it writes to.
    #[must_use]
    pub fn new() -> (Self, Arc<Mutex<Vec<Propagated>>>) {
        let record = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                record: Arc::clone(&record),
            },
            record,
        )
    }
}

impl StatusPropagator for RecordingPropagator {
    fn exit(&mut self, code: i32) {
        self.record.lock().unwrap().push(Propagated::Exit(code));
    }

    fn raise(&mut self, signal: i32) {
        self.record.lock().unwrap().push(Propagated::Raise(signal));
    }
}
