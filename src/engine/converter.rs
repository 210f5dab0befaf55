//! Single-item converter: one external tool run from an input artifact to an output artifact.

use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use crate::error::ConversionError;
use crate::pipeline::CancelToken;
use crate::utils::config::{ToolConsts, effective_timeout};

/// Converts one single-record artifact into a converted artifact. Implementations must be callable
/// from several worker threads at once. No retries at this layer.
pub trait Converter: Send + Sync + 'static {
    fn convert(
        &self,
        input: &Path,
        output: &Path,
        conformers: u32,
        cancel: &CancelToken,
    ) -> Result<(), ConversionError>;
}

/// Reject empty or identical paths and a zero conformer count.
pub fn validate_args(input: &Path, output: &Path, conformers: u32) -> Result<(), ConversionError> {
    if input.as_os_str().is_empty() || output.as_os_str().is_empty() {
        return Err(ConversionError::InvalidArgument(
            "input and output paths must be non-empty".into(),
        ));
    }
    if input == output {
        return Err(ConversionError::InvalidArgument(format!(
            "output must differ from input ({})",
            input.display()
        )));
    }
    if conformers == 0 {
        return Err(ConversionError::InvalidArgument(
            "conformer count must be at least 1".into(),
        ));
    }
    Ok(())
}

/// Runs `<program> -c<N> <input> <output>` with a per-call timeout.
#[derive(Clone, Debug)]
pub struct BalloonRunner {
    program: PathBuf,
    timeout: Duration,
    poll_interval: Duration,
}

impl BalloonRunner {
    /// `timeout_secs` of 0 falls back to the default timeout.
    pub fn new(program: impl Into<PathBuf>, timeout_secs: u64) -> Self {
        Self {
            program: program.into(),
            timeout: effective_timeout(timeout_secs),
            poll_interval: ToolConsts::POLL_INTERVAL,
        }
    }

    /// Exact timeout, for callers that need sub-second limits.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Poll the child until it exits, the timeout passes, or the run is cancelled.
    fn wait_for(&self, child: &mut Child, cancel: &CancelToken) -> Result<ExitStatus, ConversionError> {
        let started = Instant::now();
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            let elapsed = started.elapsed();
            if elapsed >= self.timeout {
                kill_and_reap(child);
                return Err(ConversionError::Timeout(self.timeout));
            }
            if cancel.is_cancelled() {
                kill_and_reap(child);
                return Err(ConversionError::Cancelled);
            }
            std::thread::sleep(self.poll_interval.min(self.timeout - elapsed));
        }
    }
}

fn kill_and_reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn remove_partial(output: &Path) {
    match fs::remove_file(output) {
        Ok(()) => debug!("removed partial output {}", output.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("could not remove partial output {}: {}", output.display(), e),
    }
}

impl Converter for BalloonRunner {
    fn convert(
        &self,
        input: &Path,
        output: &Path,
        conformers: u32,
        cancel: &CancelToken,
    ) -> Result<(), ConversionError> {
        validate_args(input, output, conformers)?;
        info!(
            "Running '{} -c{} {} {}'",
            self.program.display(),
            conformers,
            input.display(),
            output.display()
        );

        let mut child = Command::new(&self.program)
            .arg(format!("-c{conformers}"))
            .arg(input)
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| ConversionError::Io(format!("{}: {}", self.program.display(), e)))?;

        let status = match self.wait_for(&mut child, cancel) {
            Ok(status) => status,
            Err(e) => {
                remove_partial(output);
                return Err(e);
            }
        };

        if !status.success() {
            remove_partial(output);
            return Err(ConversionError::ProcessFailed(format!(
                "{} exited with {}",
                self.program.display(),
                status
            )));
        }
        match fs::metadata(output) {
            Ok(meta) if meta.len() > 0 => Ok(()),
            _ => {
                remove_partial(output);
                Err(ConversionError::ProcessFailed(format!(
                    "{} produced no output at {}",
                    self.program.display(),
                    output.display()
                )))
            }
        }
    }
}
