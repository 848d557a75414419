//! Process round-trip: launch an external command, block until it exits,
//! and hand the real outcome back to the caller.
//!
//! Nothing here swallows a failure. A program that cannot be started, a
//! wait that fails, or a child that overstays its timeout each come back as
//! a distinct [`ProcessError`].

use std::ffi::{OsStr, OsString};
use std::io;
use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

/// Interval between `try_wait` polls while a timeout is armed.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// `CREATE_NO_WINDOW` process creation flag.
#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("failed to start {program}: {source}")]
    Spawn { program: String, source: io::Error },
    #[error("failed waiting for child: {source}")]
    Wait { source: io::Error },
    #[error("{program} still running after {after:?}; killed")]
    TimedOut { program: String, after: Duration },
    #[error("{program} exited unsuccessfully (code {code:?})")]
    NonZeroExit { program: String, code: Option<i32> },
}

/// A finished child.
#[derive(Debug, Clone, Copy)]
pub struct RoundTrip {
    pub status: ExitStatus,
    pub elapsed: Duration,
}

impl RoundTrip {
    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }

    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// Builder for a single blocking launch.
#[derive(Debug, Clone)]
pub struct ShellCommand {
    program: OsString,
    args: Vec<OsString>,
    envs: Vec<(OsString, OsString)>,
    hidden: bool,
    timeout: Option<Duration>,
}

impl ShellCommand {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            hidden: true,
            timeout: None,
        }
    }

    /// `cmd.exe` on Windows, `/bin/sh` elsewhere.
    pub fn platform_shell() -> Self {
        if cfg!(windows) {
            Self::new("cmd.exe")
        } else {
            Self::new("/bin/sh")
        }
    }

    /// Run `script` through the platform shell (`/C` or `-c`).
    pub fn script(script: impl AsRef<OsStr>) -> Self {
        let flag = if cfg!(windows) { "/C" } else { "-c" };
        Self::platform_shell().arg(flag).arg(script)
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Set an environment variable for the child.
    pub fn env(mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
        self.envs
            .push((key.as_ref().to_os_string(), value.as_ref().to_os_string()));
        self
    }

    /// Suppress the console window on Windows (default `true`).
    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    /// Kill the child if it has not exited after `after`.
    pub fn timeout(mut self, after: Duration) -> Self {
        self.timeout = Some(after);
        self
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn program(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .envs(self.envs.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        #[cfg(windows)]
        if self.hidden {
            use std::os::windows::process::CommandExt;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }
        cmd
    }

    /// Start the child and block the calling thread until it exits.
    pub fn run_to_exit(&self) -> Result<RoundTrip, ProcessError> {
        let started = Instant::now();
        let mut child = self.command().spawn().map_err(|source| ProcessError::Spawn {
            program: self.program(),
            source,
        })?;
        tracing::debug!(pid = child.id(), program = %self.program(), "spawned");

        let status = match self.timeout {
            None => child.wait().map_err(|source| ProcessError::Wait { source })?,
            Some(after) => loop {
                if let Some(status) = child
                    .try_wait()
                    .map_err(|source| ProcessError::Wait { source })?
                {
                    break status;
                }
                if started.elapsed() >= after {
                    // The child may exit between the poll and the kill.
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ProcessError::TimedOut {
                        program: self.program(),
                        after,
                    });
                }
                std::thread::sleep(POLL_INTERVAL);
            },
        };

        let round_trip = RoundTrip {
            status,
            elapsed: started.elapsed(),
        };
        tracing::debug!(
            program = %self.program(),
            code = ?round_trip.code(),
            elapsed = ?round_trip.elapsed,
            "exited"
        );
        Ok(round_trip)
    }

    /// Like [`run_to_exit`](Self::run_to_exit), but a non-zero exit is an error.
    pub fn run_checked(&self) -> Result<RoundTrip, ProcessError> {
        let round_trip = self.run_to_exit()?;
        if round_trip.success() {
            Ok(round_trip)
        } else {
            Err(ProcessError::NonZeroExit {
                program: self.program(),
                code: round_trip.code(),
            })
        }
    }
}
