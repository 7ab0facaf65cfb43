//! Relaying a dead target's status into the controlling process.
//!
//! Mirroring the target's death (re-raising its signal, exiting with its
//! code) is a cross-process contract: a wrapper script's own status then
//! reflects the target's, which shell pipelines can rely on. Propagation
//! goes through a trait so tests can intercept it instead of actually
//! terminating the test process.

/// Propagates a target's termination into the current process.
pub trait StatusPropagator: Send {
    /// Exit the current process with `code`.
    fn exit(&mut self, code: i32);

    /// Raise `signal` against the current process.
    fn raise(&mut self, signal: i32);
}

/// The real thing: terminates the current process.
#[derive(Debug, Default)]
pub struct ProcessPropagator;

impl StatusPropagator for ProcessPropagator {
    fn exit(&mut self, code: i32) {
        std::process::exit(code);
    }

    fn raise(&mut self, signal: i32) {
        // SAFETY: raise(3) delivers a signal to the calling process; the
        // caller intends to die the same way the target did. If a handler
        // swallows it, execution simply continues.
        unsafe {
            libc::raise(signal);
        }
    }
}

/// Conventional name of a signal number, if known.
#[must_use]
pub fn signal_name(signal: i32) -> &'static str {
    match signal {
        1 => "SIGHUP",
        2 => "SIGINT",
        3 => "SIGQUIT",
        4 => "SIGILL",
        5 => "SIGTRAP",
        6 => "SIGABRT",
        7 => "SIGBUS",
        8 => "SIGFPE",
        9 => "SIGKILL",
        10 => "SIGUSR1",
        11 => "SIGSEGV",
        12 => "SIGUSR2",
        13 => "SIGPIPE",
        14 => "SIGALRM",
        15 => "SIGTERM",
        16 => "SIGSTKFLT",
        17 => "SIGCHLD",
        18 => "SIGCONT",
        19 => "SIGSTOP",
        20 => "SIGTSTP",
        21 => "SIGTTIN",
        22 => "SIGTTOU",
        23 => "SIGURG",
        24 => "SIGXCPU",
        25 => "SIGXFSZ",
        26 => "SIGVTALRM",
        27 => "SIGPROF",
        28 => "SIGWINCH",
        29 => "SIGIO",
        30 => "SIGPWR",
        31 => "SIGSYS",
        _ => "Unknown",
    }
}

/// Describe a termination status for the human watching the session.
///
/// Returns `None` when neither a signal nor an exit code is known, i.e. the
/// death cannot be explained.
#[must_use]
pub fn describe_status(signal: Option<i32>, exit_code: Option<i32>) -> Option<String> {
    if let Some(signal) = signal {
        return Some(format!(
            "Program received signal {signal}. ({})",
            signal_name(signal)
        ));
    }
    if let Some(code) = exit_code {
        return Some(format!("Program exited with status {code}."));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_the_common_signals() {
        assert_eq!(signal_name(9), "SIGKILL");
        assert_eq!(signal_name(11), "SIGSEGV");
        assert_eq!(signal_name(15), "SIGTERM");
        assert_eq!(signal_name(99), "Unknown");
    }

    #[test]
    fn describes_a_signal_death() {
        let report = describe_status(Some(11), None).unwrap();
        assert!(report.contains("signal 11"));
        assert!(report.contains("SIGSEGV"));
    }

    #[test]
    fn describes_an_exit() {
        let report = describe_status(None, Some(3)).unwrap();
        assert!(report.contains("exited with status 3"));
    }

    #[test]
    fn signal_takes_precedence_over_exit_code() {
        let report = describe_status(Some(15), Some(0)).unwrap();
        assert!(report.contains("SIGTERM"));
    }

    #[test]
    fn unknown_status_has_no_description() {
        assert!(describe_status(None, None).is_none());
    }
}
