//! Command-line glue for the `bin-expect` binary.
//!
//! Spawns the target command (or, with `--tty`/`--gdb`, a fresh pty other
//! programs can attach to) and hands the session straight to a human.
//! Parameter passing only; the interesting behavior lives in the library.

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;

use crate::config::TargetConfig;
use crate::engine::{SpawnedTarget, TtyTarget};
use crate::error::{BinExpectError, Result, SpawnError};
use crate::prompt::{InteractivePrompt, PromptOptions};
use crate::session::{BinSession, BinaryTransport};

/// Spawn a target behind a pty and interact with it binary-safely.
#[derive(Parser, Debug)]
#[command(
    name = "bin-expect",
    version,
    about = "Spawn a target on a pseudo-terminal, exchange raw binary data \
             with it, and hand control to a human on demand. With --tty a \
             fresh terminal device is created instead, for other programs \
             to attach to (for example gdb --tty=X)."
)]
pub struct Cli {
    /// Spawn and interact with a new TTY instead of spawning the process.
    #[arg(short = 't', long, conflicts_with = "gdb")]
    pub tty: bool,

    /// Spawn a new terminal running a gdb instance on the target.
    #[arg(short = 'g', long)]
    pub gdb: bool,

    /// Don't print information such as the TTY's name.
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Seconds after which an unanswered expectation gives up (0 waits forever).
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    /// Don't deactivate newline translation on the tty. If set, a '\n'
    /// printed by the target will appear as '\r\n'.
    #[arg(long)]
    pub nlcr: bool,

    /// Seconds to wait before each send; helps against targets that read
    /// before they finished setting up their terminal.
    #[arg(long, default_value_t = 0.0)]
    pub delay_before_send: f64,

    /// Read buffer size. 1 turns off read buffering.
    #[arg(long, default_value_t = 2000)]
    pub maxread: usize,

    /// How far back in the incoming buffer matches are searched for.
    #[arg(long)]
    pub search_window_size: Option<usize>,

    /// Copy all session I/O to this file.
    #[arg(short = 'l', long)]
    pub logfile: Option<PathBuf>,

    /// Working directory for the target.
    #[arg(long)]
    pub cwd: Option<PathBuf>,

    /// Let the target receive SIGHUP instead of ignoring it.
    #[arg(long)]
    pub no_ignore_sighup: bool,

    /// Terminal emulator for --gdb; `-e` is appended to bare commands.
    #[arg(long, env = "TERMINAL", default_value = "x-terminal-emulator")]
    pub terminal: String,

    /// If a TTY is opened, write its name and the target's arguments to
    /// this file, null-separated. Mainly for interfacing with debuggers.
    #[arg(long)]
    pub writeback: Option<PathBuf>,

    /// The target command.
    pub command: Option<String>,

    /// Arguments for the target command.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

impl Cli {
    /// Build the target configuration these arguments describe.
    #[must_use]
    pub fn target_config(&self) -> TargetConfig {
        let timeout = if self.timeout == 0 {
            None
        } else {
            Some(Duration::from_secs(self.timeout))
        };
        let mut config = TargetConfig::new()
            .with_timeout(timeout)
            .with_max_read(self.maxread)
            .with_search_window(self.search_window_size)
            .with_delay_before_send(Duration::from_secs_f64(self.delay_before_send))
            .with_ignore_sighup(!self.no_ignore_sighup);
        if let Some(path) = &self.logfile {
            config = config.with_log_file(path);
        }
        if let Some(cwd) = &self.cwd {
            config = config.with_cwd(cwd);
        }
        config
    }

    fn command(&self) -> Result<&str> {
        self.command.as_deref().ok_or_else(|| {
            SpawnError::InvalidArgument {
                kind: "command".to_string(),
                value: String::new(),
                reason: "no target command given".to_string(),
            }
            .into()
        })
    }
}

/// Record a tty name and target arguments, null-separated.
fn write_writeback(path: &Path, tty_name: &str, args: &[String]) -> Result<()> {
    let mut file = std::fs::File::create(path)
        .map_err(|e| BinExpectError::io_context("opening writeback file", e))?;
    file.write_all(format!("{tty_name}\0{}", args.join("\0")).as_bytes())
        .map_err(|e| BinExpectError::io_context("writing writeback file", e))
}

/// Launch a terminal emulator running `cmdline`.
///
/// There is no portable way of starting a terminal; a bare command name
/// gets `-e` appended, anything longer is taken as already carrying its
/// own option to run a program.
fn spawn_terminal(terminal: &str, cmdline: &[&str]) -> Result<()> {
    let mut parts: Vec<&str> = terminal.split_whitespace().collect();
    if parts.is_empty() {
        return Err(SpawnError::InvalidArgument {
            kind: "terminal".to_string(),
            value: terminal.to_string(),
            reason: "empty terminal command".to_string(),
        }
        .into());
    }
    if parts.len() == 1 {
        parts.push("-e");
    }

    std::process::Command::new(parts[0])
        .args(&parts[1..])
        .args(cmdline)
        .spawn()
        .map_err(|e| BinExpectError::io_context("launching terminal emulator", e))?;
    Ok(())
}

/// Run the CLI to completion.
pub async fn run(cli: Cli) -> Result<()> {
    let config = cli.target_config();

    if cli.tty || cli.gdb {
        let target = TtyTarget::open_with_config(config)?;
        if !cli.quiet {
            eprintln!("New tty spawned at {}", target.tty_name());
        }
        if let Some(path) = &cli.writeback {
            write_writeback(path, target.tty_name(), &cli.args)?;
        }
        if cli.gdb {
            let command = cli.command()?;
            let binary = command.split_whitespace().next().unwrap_or(command);
            spawn_terminal(
                &cli.terminal,
                &["gdb", "-q", binary, "--tty", target.tty_name()],
            )?;
        }

        let mut session = BinSession::new(target);
        if !cli.nlcr {
            session.set_nonlcr()?;
        }
        session.prompt(PromptOptions::default()).await
    } else {
        let command = cli.command()?.to_string();
        let args: Vec<&str> = cli.args.iter().map(String::as_str).collect();
        let target = SpawnedTarget::spawn_with_config(&command, &args, config).await?;

        let mut session = BinSession::new(target);
        if !cli.nlcr {
            session.set_nonlcr()?;
        }
        session.prompt(PromptOptions::default()).await
    }
}
