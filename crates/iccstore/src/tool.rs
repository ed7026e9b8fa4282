//! Blocking invocation of external command-line tools.
//!
//! Every collaborator outside the core (profiling toolchain, profile dumper,
//! compositor control, colour daemon) is driven through [`ToolCommand`]. The
//! runner only classifies outcomes; it never retries.
use std::ffi::{OsStr, OsString};
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("required tool '{program}' was not found on PATH")]
    Missing { program: String },

    #[error("'{program}' exited with {}", describe_status(.status))]
    Failed {
        program: String,
        status: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("'{program}' did not finish within {after:?} and was terminated")]
    TimedOut { program: String, after: Duration },

    #[error("failed to run '{program}': {source}")]
    Io {
        program: String,
        #[source]
        source: io::Error,
    },
}

impl ToolError {
    /// Diagnostic text as the tool printed it: stderr, or stdout when the
    /// tool reports errors there.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            Self::Failed { stdout, stderr, .. } => {
                if stderr.trim().is_empty() {
                    Some(stdout.as_str())
                } else {
                    Some(stderr.as_str())
                }
            }
            _ => None,
        }
    }
}

fn describe_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("status {code}"),
        None => "no exit status (terminated by signal)".to_string(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: String,
    args: Vec<OsString>,
    timeout: Option<Duration>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: None,
        }
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
            .extend(args.into_iter().map(|arg| arg.as_ref().to_os_string()));
        self
    }

    /// Watchdog for the child process; `None` waits indefinitely.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Resolved executable path, if the program can be found.
    pub fn locate(&self) -> Option<PathBuf> {
        which::which(&self.program).ok()
    }

    pub fn available(&self) -> bool {
        self.locate().is_some()
    }

    pub fn run(&self) -> Result<ToolOutput, ToolError> {
        let executable = self.locate().ok_or_else(|| ToolError::Missing {
            program: self.program.clone(),
        })?;

        debug!(program = %self.program, executable = %executable.display(), args = ?self.args, "running external tool");

        let mut child = Command::new(&executable)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| self.spawn_error(err))?;

        let stdout = spawn_reader(child.stdout.take(), &self.program, "stdout");
        let stderr = spawn_reader(child.stderr.take(), &self.program, "stderr");

        let status = match self.timeout {
            Some(limit) => self.wait_with_deadline(&mut child, limit)?,
            None => child.wait().map_err(|source| self.io_error(source))?,
        };

        let output = ToolOutput {
            stdout: join_reader(stdout),
            stderr: join_reader(stderr),
        };

        if status.success() {
            debug!(program = %self.program, "external tool finished");
            Ok(output)
        } else {
            warn!(program = %self.program, status = ?status.code(), "external tool failed");
            Err(ToolError::Failed {
                program: self.program.clone(),
                status: status.code(),
                stdout: output.stdout,
                stderr: output.stderr,
            })
        }
    }

    fn wait_with_deadline(&self, child: &mut Child, limit: Duration) -> Result<ExitStatus, ToolError> {
        let deadline = Instant::now() + limit;
        loop {
            if let Some(status) = child.try_wait().map_err(|source| self.io_error(source))? {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                warn!(program = %self.program, timeout = ?limit, "external tool timed out; terminating");
                if let Err(err) = child.kill() {
                    warn!(program = %self.program, error = %err, "failed to terminate timed out tool");
                }
                let _ = child.wait();
                return Err(ToolError::TimedOut {
                    program: self.program.clone(),
                    after: limit,
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    fn spawn_error(&self, err: io::Error) -> ToolError {
        if err.kind() == io::ErrorKind::NotFound {
            ToolError::Missing {
                program: self.program.clone(),
            }
        } else {
            self.io_error(err)
        }
    }

    fn io_error(&self, source: io::Error) -> ToolError {
        ToolError::Io {
            program: self.program.clone(),
            source,
        }
    }
}

fn spawn_reader<R>(
    pipe: Option<R>,
    program: &str,
    stream: &'static str,
) -> Option<thread::JoinHandle<String>>
where
    R: Read + Send + 'static,
{
    pipe.map(|pipe| {
        let program = program.to_string();
        thread::spawn(move || drain(pipe, &program, stream))
    })
}

/// Reads `pipe` to the end, keeping whatever arrived before a read error.
fn drain(mut pipe: impl Read, program: &str, stream: &str) -> String {
    let mut buffer = Vec::new();
    if let Err(err) = pipe.read_to_end(&mut buffer) {
        warn!(
            program = %program,
            stream,
            error = %err,
            captured = buffer.len(),
            "failed to read tool output; diagnostics may be incomplete"
        );
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

fn join_reader(handle: Option<thread::JoinHandle<String>>) -> String {
    handle
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}
