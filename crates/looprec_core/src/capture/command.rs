//! External encoder process as a capture source.

use crate::capture::{CaptureHandle, CaptureOutcome, CaptureRequest, CaptureSource};
use crate::error::{CoreError, CoreResult};
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How often a running encoder is checked for exit.
const EXIT_POLL: Duration = Duration::from_millis(20);

/// Runs one encoder process per segment.
///
/// The command line is a template. Each argument may contain these
/// placeholders:
///
/// | Placeholder       | Replaced with                         |
/// |-------------------|---------------------------------------|
/// | `{output}`        | destination path of the segment       |
/// | `{duration_ms}`   | maximum segment length, milliseconds  |
/// | `{duration_secs}` | maximum segment length, seconds       |
///
/// A graceful finish writes `finish_input` (default `q`, which ffmpeg
/// understands) to the encoder's stdin and closes it. An encoder that has
/// not exited `finish_grace` later is killed and the segment counts as
/// failed.
///
/// On Unix the encoder runs in its own process group. A Ctrl-C at the
/// terminal then reaches only the recorder, which finishes the encoder
/// through stdin instead of letting it die on the signal.
///
/// The encoder renders its own overlay, so a request's annotator is not
/// used here.
#[derive(Debug, Clone)]
pub struct CommandCapture {
    program: String,
    args: Vec<String>,
    finish_input: String,
    finish_grace: Duration,
}

impl CommandCapture {
    /// Creates a source running `program` with templated `args`.
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            finish_input: "q".to_string(),
            finish_grace: Duration::from_secs(5),
        }
    }

    /// Parses a whitespace-separated command line.
    ///
    /// Quoting is not supported; wrap complex pipelines in a script.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the line is empty or never mentions
    /// `{output}`.
    pub fn parse(command_line: &str) -> CoreResult<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| CoreError::invalid_config("capture command is empty"))?;
        let args: Vec<String> = parts.collect();
        if !args.iter().any(|arg| arg.contains("{output}")) {
            return Err(CoreError::invalid_config(
                "capture command must write to {output}",
            ));
        }
        Ok(Self::new(program, args))
    }

    /// Sets the bytes written to stdin to end a capture early.
    #[must_use]
    pub fn finish_input(mut self, input: impl Into<String>) -> Self {
        self.finish_input = input.into();
        self
    }

    /// Sets how long a finishing encoder may take before it is killed.
    #[must_use]
    pub const fn finish_grace(mut self, grace: Duration) -> Self {
        self.finish_grace = grace;
        self
    }

    /// Returns the arguments for one request.
    #[must_use]
    pub fn expand_args(&self, request: &CaptureRequest) -> Vec<String> {
        let output = request.destination.display().to_string();
        let duration_ms = request.max_duration.as_millis().to_string();
        let duration_secs = request.max_duration.as_secs_f64().to_string();
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{output}", &output)
                    .replace("{duration_ms}", &duration_ms)
                    .replace("{duration_secs}", &duration_secs)
            })
            .collect()
    }
}

impl CaptureSource for CommandCapture {
    type Handle = CommandHandle;

    fn start_capture(&mut self, request: CaptureRequest) -> CoreResult<CommandHandle> {
        let args = self.expand_args(&request);
        debug!(program = %self.program, ?args, "spawning encoder");

        let mut command = Command::new(&self.program);
        command
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let mut child = command
            .spawn()
            .map_err(|e| CoreError::capture_failed(format!("failed to spawn {}: {e}", self.program)))?;

        info!(pid = child.id(), destination = %request.destination.display(), "encoder started");

        let stdin = child.stdin.take();
        Ok(CommandHandle {
            child,
            stdin,
            destination: request.destination,
            finish_input: self.finish_input.clone(),
            finish_grace: self.finish_grace,
            finish_deadline: None,
            exited: false,
        })
    }
}

/// A running encoder process.
///
/// Dropping the handle kills the encoder if it is still running.
#[derive(Debug)]
pub struct CommandHandle {
    child: Child,
    stdin: Option<ChildStdin>,
    destination: PathBuf,
    finish_input: String,
    finish_grace: Duration,
    finish_deadline: Option<Instant>,
    exited: bool,
}

impl CommandHandle {
    fn kill(&mut self) {
        if let Err(e) = self.child.kill() {
            debug!(error = %e, "encoder already gone");
        }
        if let Err(e) = self.child.wait() {
            warn!(error = %e, "failed to reap encoder");
        }
        self.exited = true;
    }
}

impl CaptureHandle for CommandHandle {
    fn poll_completion(&mut self, timeout: Duration) -> CoreResult<Option<CaptureOutcome>> {
        let deadline = Instant::now() + timeout;
        loop {
            let status = self
                .child
                .try_wait()
                .map_err(|e| CoreError::capture_failed(format!("failed to query encoder: {e}")))?;

            if let Some(status) = status {
                self.exited = true;
                if !status.success() {
                    return Err(CoreError::capture_failed(format!("encoder exited with {status}")));
                }
                let bytes_written = fs::metadata(&self.destination)
                    .map_err(|e| {
                        CoreError::capture_failed(format!(
                            "encoder produced no file at {}: {e}",
                            self.destination.display()
                        ))
                    })?
                    .len();
                return Ok(Some(CaptureOutcome {
                    bytes_written,
                    finished_early: self.finish_deadline.is_some(),
                }));
            }

            let now = Instant::now();
            if self.finish_deadline.is_some_and(|limit| now >= limit) {
                self.kill();
                return Err(CoreError::capture_failed(format!(
                    "encoder did not finish within {:?}",
                    self.finish_grace
                )));
            }
            if now >= deadline {
                return Ok(None);
            }
            thread::sleep(EXIT_POLL.min(deadline - now));
        }
    }

    fn request_finish(&mut self) -> CoreResult<()> {
        if self.finish_deadline.is_some() {
            return Ok(());
        }
        self.finish_deadline = Some(Instant::now() + self.finish_grace);

        // Closing stdin after the finish sequence is part of the request
        let Some(mut stdin) = self.stdin.take() else {
            return Ok(());
        };
        match stdin
            .write_all(self.finish_input.as_bytes())
            .and_then(|()| stdin.flush())
        {
            Ok(()) => Ok(()),
            // The encoder exited already; the next poll reports how
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
            Err(e) => Err(CoreError::capture_failed(format!(
                "failed to signal encoder: {e}"
            ))),
        }
    }
}

impl Drop for CommandHandle {
    fn drop(&mut self) {
        if !self.exited {
            warn!(pid = self.child.id(), "killing abandoned encoder");
            self.kill();
        }
    }
}
