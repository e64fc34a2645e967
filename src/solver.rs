use std::{
    io::Read,
    path::Path,
    process::{Child, Command, Stdio},
    sync::mpsc::{self, Receiver},
    thread,
    time::{Duration, Instant},
};

use tracing::debug;

use crate::error::FoilgenError;

/// Placeholder in the solver command that is replaced by the script path
pub const SCRIPT_PLACEHOLDER: &str = "{script}";

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long stream readers get after the solver exits. A launcher's leftover
/// descendants can hold the pipes open indefinitely.
const STREAM_GRACE: Duration = Duration::from_secs(2);

/// Exit status and captured streams of one solver invocation
#[derive(Debug, Clone, PartialEq)]
pub struct SolverRun {
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl SolverRun {
    pub fn success(&self) -> bool {
        !self.timed_out && self.status == Some(0)
    }
}

/// Runs one case script against an aerodynamic solver
///
/// An `Err` means the solver could not be started at all; a solver that
/// started and failed is reported through [`SolverRun::success`].
pub trait CaseSolver: Send + Sync {
    fn run_case(&self, script_path: &Path) -> Result<SolverRun, FoilgenError>;
}

/// A solver executed as a child process from a fixed command template
#[derive(Debug, Clone)]
pub struct ExternalSolver {
    command: Vec<String>,
    timeout: Option<Duration>,
}

impl ExternalSolver {
    /// # Arguments
    /// * `command` - Program followed by its arguments. Every `{script}` token
    ///   is replaced by the script path; without one, the path is appended.
    /// * `timeout` - Wall-clock limit per case, `None` waits indefinitely
    pub fn new(command: Vec<String>, timeout: Option<Duration>) -> Result<Self, FoilgenError> {
        if command.is_empty() || command[0].trim().is_empty() {
            return Err(FoilgenError::Input(
                "Solver command must name a program".to_owned(),
            ));
        }
        Ok(ExternalSolver { command, timeout })
    }

    fn build_command(&self, script_path: &Path) -> Command {
        let script = script_path.to_string_lossy();
        let program = self.command[0].replace(SCRIPT_PLACEHOLDER, &script);
        let mut args: Vec<String> = self.command[1..]
            .iter()
            .map(|arg| arg.replace(SCRIPT_PLACEHOLDER, &script))
            .collect();
        if !self.command.iter().any(|arg| arg.contains(SCRIPT_PLACEHOLDER)) {
            args.push(script.into_owned());
        }

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        // own process group, so a timeout can take down wrapper scripts and their children
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }
        command
    }
}

/// Kills the solver and, on unix, every process in its group
fn kill_solver(child: &mut Child) {
    #[cfg(unix)]
    {
        let group = format!("-{}", child.id());
        let _ = Command::new("kill")
            .args(["-s", "KILL", "--", group.as_str()])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
    }
    let _ = child.kill();
}

fn drain<R: Read + Send + 'static>(stream: Option<R>) -> Option<Receiver<Vec<u8>>> {
    stream.map(|mut s| {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = s.read_to_end(&mut buf);
            let _ = tx.send(buf);
        });
        rx
    })
}

fn collect(reader: Option<Receiver<Vec<u8>>>, deadline: Instant) -> String {
    reader
        .and_then(|rx| {
            rx.recv_timeout(deadline.saturating_duration_since(Instant::now()))
                .ok()
        })
        .map(|buf| String::from_utf8_lossy(&buf).into_owned())
        .unwrap_or_default()
}

impl CaseSolver for ExternalSolver {
    fn run_case(&self, script_path: &Path) -> Result<SolverRun, FoilgenError> {
        let mut child = match self.build_command(script_path).spawn() {
            Ok(c) => c,
            Err(err) => {
                return Err(FoilgenError::Solver(format!(
                    "Failed to start {}: {err}",
                    self.command[0]
                )));
            }
        };

        // streams are drained concurrently so a chatty solver cannot fill the pipe and stall
        let stdout_reader = drain(child.stdout.take());
        let stderr_reader = drain(child.stderr.take());

        let started = Instant::now();
        let mut timed_out = false;
        let status = loop {
            let polled = child
                .try_wait()
                .map_err(|err| FoilgenError::Solver(format!("Failed to poll solver: {err}")))?;
            if let Some(status) = polled {
                break status;
            }

            if let Some(limit) = self.timeout {
                if started.elapsed() >= limit {
                    debug!(script = %script_path.display(), "solver exceeded {:?}, killing", limit);
                    timed_out = true;
                    kill_solver(&mut child);
                    break child.wait().map_err(|err| {
                        FoilgenError::Solver(format!("Failed to reap solver: {err}"))
                    })?;
                }
            }
            thread::sleep(POLL_INTERVAL);
        };

        let deadline = Instant::now() + STREAM_GRACE;
        Ok(SolverRun {
            status: status.code(),
            stdout: collect(stdout_reader, deadline),
            stderr: collect(stderr_reader, deadline),
            timed_out,
        })
    }
}
