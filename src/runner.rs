use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::io;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::output::{ERROR_MSG, ExitStatus, NOD_INF_OUT, OBS_NODE_OUT, T_LEVEL_OUT};

/// File in the working directory receiving the solver's stdout and stderr.
pub const SOLVER_LOG: &str = "solver.log";

/// Wall-clock limit used by [`crate::Hydrus1D`] unless overridden.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3600);

/// Shared flag asking a running solver to stop.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// What happened to one solver process.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub status: ExitStatus,
    /// `None` when the process was killed or never started.
    pub exit_code: Option<i32>,
    pub elapsed: Duration,
    pub log_path: PathBuf,
    pub diagnostic: Option<String>,
}

/// Runs the solver executable against a directory of input files.
#[derive(Debug, Clone)]
pub struct SolverRunner {
    executable: PathBuf,
    timeout: Duration,
    poll_interval: Duration,
    cancel: CancelToken,
    expected_outputs: Vec<&'static str>,
}

impl SolverRunner {
    /// A runner that kills the solver once it has run for `timeout`.
    pub fn new(executable: impl Into<PathBuf>, timeout: Duration) -> Self {
        SolverRunner {
            executable: executable.into(),
            timeout,
            poll_interval: Duration::from_millis(100),
            cancel: CancelToken::new(),
            expected_outputs: vec![T_LEVEL_OUT, NOD_INF_OUT],
        }
    }

    /// Wall-clock limit after which the solver is killed.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Output files whose absence after a clean exit means `OutputMissing`.
    pub fn with_expected_outputs(mut self, files: Vec<&'static str>) -> Self {
        self.expected_outputs = files;
        self
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Runs the solver in `directory` and waits for it to finish, time out or
    /// be cancelled.
    ///
    /// Only failures to prepare the directory are returned as errors; every
    /// outcome of the process itself is reported through [`RunReport::status`].
    pub fn run(&self, directory: &Path) -> Result<RunReport, Error> {
        let directory = fs::canonicalize(directory).map_err(|e| Error::io(directory, e))?;
        restore_writable(&directory)?;
        self.clear_outputs(&directory)?;

        let log_path = directory.join(SOLVER_LOG);
        remove_if_present(&log_path)?;
        let stdout = File::create(&log_path).map_err(|e| Error::io(&log_path, e))?;
        let stderr = stdout.try_clone().map_err(|e| Error::io(&log_path, e))?;
        let executable = fs::canonicalize(&self.executable).unwrap_or_else(|_| self.executable.clone());

        let start = Instant::now();
        let mut command = Command::new(&executable);
        command
            .arg(&directory)
            .arg("-1")
            .current_dir(&directory)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr);
        // Own process group, so anything the solver starts is stopped with it
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }
        let spawned = command.spawn();
        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                warn!(executable = %executable.display(), error = %e, "failed to launch solver");
                return Ok(RunReport {
                    status: ExitStatus::SolverError,
                    exit_code: None,
                    elapsed: start.elapsed(),
                    log_path,
                    diagnostic: Some(format!("failed to launch {}: {e}", executable.display())),
                });
            }
        };
        info!(
            executable = %executable.display(),
            directory = %directory.display(),
            pid = child.id(),
            "solver launched"
        );

        let report = loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    let elapsed = start.elapsed();
                    debug!(?status, ?elapsed, "solver exited");
                    break self.classify(&directory, status.code(), status.success(), elapsed, log_path);
                }
                Ok(None) => {}
                Err(e) => {
                    stop(&mut child);
                    break RunReport {
                        status: ExitStatus::SolverError,
                        exit_code: None,
                        elapsed: start.elapsed(),
                        log_path,
                        diagnostic: Some(format!("lost track of the solver process: {e}")),
                    };
                }
            }

            let interrupted = if self.cancel.is_cancelled() {
                Some((ExitStatus::Cancelled, "solver run was cancelled".to_string()))
            } else if start.elapsed() >= self.timeout {
                let limit = self.timeout;
                Some((ExitStatus::Timeout, format!("solver exceeded the {limit:?} timeout")))
            } else {
                None
            };
            if let Some((status, diagnostic)) = interrupted {
                warn!(pid = child.id(), ?status, "stopping solver");
                stop(&mut child);
                mark_read_only(&directory);
                break RunReport {
                    status,
                    exit_code: None,
                    elapsed: start.elapsed(),
                    log_path,
                    diagnostic: Some(diagnostic),
                };
            }
            thread::sleep(self.poll_interval);
        };

        info!(status = ?report.status, elapsed = ?report.elapsed, "solver finished");
        Ok(report)
    }

    // Outputs from an earlier run would otherwise be mistaken for this one's
    fn clear_outputs(&self, directory: &Path) -> Result<(), Error> {
        let stale = [T_LEVEL_OUT, NOD_INF_OUT, OBS_NODE_OUT, ERROR_MSG];
        for name in stale.iter().chain(self.expected_outputs.iter()) {
            remove_if_present(&directory.join(name))?;
        }
        Ok(())
    }

    fn classify(
        &self,
        directory: &Path,
        exit_code: Option<i32>,
        success: bool,
        elapsed: Duration,
        log_path: PathBuf,
    ) -> RunReport {
        let error_msg = fs::read_to_string(directory.join(ERROR_MSG))
            .map(|text| text.trim().to_string())
            .unwrap_or_default();
        let missing: Vec<&str> = self
            .expected_outputs
            .iter()
            .copied()
            .filter(|name| !directory.join(name).is_file())
            .collect();

        let (status, diagnostic) = if !error_msg.is_empty() {
            (ExitStatus::SolverError, Some(error_msg))
        } else if !success {
            let code = exit_code.map_or_else(|| "a signal".to_string(), |c| format!("code {c}"));
            (ExitStatus::SolverError, Some(format!("solver exited with {code}")))
        } else if !missing.is_empty() {
            (
                ExitStatus::OutputMissing,
                Some(format!("solver produced no {}", missing.join(", "))),
            )
        } else {
            (ExitStatus::Success, None)
        };
        RunReport {
            status,
            exit_code,
            elapsed,
            log_path,
            diagnostic,
        }
    }
}

fn remove_if_present(path: &Path) -> Result<(), Error> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "removed stale file");
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io(path, e)),
    }
}

fn stop(child: &mut Child) {
    if let Err(e) = kill_group(child) {
        warn!(pid = child.id(), error = %e, "failed to kill solver");
    }
    match child.wait() {
        Ok(status) => debug!(?status, "solver reaped"),
        Err(e) => warn!(pid = child.id(), error = %e, "failed to reap solver"),
    }
}

// The solver leads its own process group, whose id is its pid
#[cfg(unix)]
fn kill_group(child: &Child) -> io::Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let pgid = i32::try_from(child.id()).map_err(|e| io::Error::new(ErrorKind::InvalidInput, e))?;
    match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(io::Error::from(e)),
    }
}

#[cfg(not(unix))]
fn kill_group(child: &mut Child) -> io::Result<()> {
    child.kill()
}

// Undoes mark_read_only so the directory can be run again
fn restore_writable(directory: &Path) -> Result<(), Error> {
    let entries = fs::read_dir(directory).map_err(|e| Error::io(directory, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(directory, e))?;
        let path = entry.path();
        let metadata = entry.metadata().map_err(|e| Error::io(&path, e))?;
        if !metadata.is_file() || !metadata.permissions().readonly() {
            continue;
        }
        fs::set_permissions(&path, writable(metadata.permissions())).map_err(|e| Error::io(&path, e))?;
        debug!(path = %path.display(), "restored write permission");
    }
    Ok(())
}

#[cfg(unix)]
fn writable(permissions: fs::Permissions) -> fs::Permissions {
    use std::os::unix::fs::PermissionsExt;
    fs::Permissions::from_mode(permissions.mode() | 0o200)
}

#[cfg(not(unix))]
#[allow(clippy::permissions_set_readonly_false)]
fn writable(mut permissions: fs::Permissions) -> fs::Permissions {
    permissions.set_readonly(false);
    permissions
}

// Keeps the state of an interrupted run for inspection
fn mark_read_only(directory: &Path) {
    let entries = match fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(directory = %directory.display(), error = %e, "cannot list working directory");
            return;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(metadata) = entry.metadata() else { continue };
        if !metadata.is_file() {
            continue;
        }
        let mut permissions = metadata.permissions();
        permissions.set_readonly(true);
        if let Err(e) = fs::set_permissions(&path, permissions) {
            warn!(path = %path.display(), error = %e, "cannot mark file read-only");
        }
    }
}
