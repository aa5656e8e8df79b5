//! Emulator process supervision.
//!
//! Spawns QEMU against the firmware artifact, bounds its lifetime with a
//! wall-clock deadline, and optionally tees its combined output to a log
//! file while still displaying it.
//!
//! Termination always escalates: a cooperative signal first, a bounded grace
//! period, then an unconditional kill. The pause lets the emulator flush any
//! pending output into the capture file before it disappears.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::RunConfig;
use crate::error::HarnessError;

/// How long a signalled emulator gets to shut down voluntarily before the
/// forced kill.
pub const GRACE_PERIOD: Duration = Duration::from_secs(1);

/// How a supervised run ended.
///
/// Timeout and interrupt are expected endings for an open-ended emulator run,
/// not failures; the caller maps all three to overall success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
  /// The emulator exited on its own before the deadline. Its exit code is
  /// deliberately not interpreted.
  Completed,
  /// The deadline elapsed and the emulator was terminated.
  TimedOut,
  /// The operator interrupted the run and the emulator was terminated.
  Interrupted,
}

/// Emulator command line for one run: non-graphical mode, fixed machine
/// type, artifact as the kernel argument.
#[derive(Debug, Clone)]
pub struct QemuInvocation {
  qemu: PathBuf,
  machine: String,
  kernel: PathBuf,
}

impl QemuInvocation {
  pub fn new(config: &RunConfig, kernel: &Path) -> Self {
    Self {
      qemu: config.qemu.clone(),
      machine: config.machine.clone(),
      kernel: kernel.to_path_buf(),
    }
  }

  /// The full command line, for display.
  pub fn rendered(&self) -> String {
    format!(
      "{} -M {} -nographic -kernel {}",
      self.qemu.display(),
      self.machine,
      self.kernel.display()
    )
  }

  fn command(&self) -> Command {
    let mut command = Command::new(&self.qemu);
    command
      .arg("-M")
      .arg(&self.machine)
      .arg("-nographic")
      .arg("-kernel")
      .arg(&self.kernel);
    // No live emulator may outlast this run, even on an error path.
    command.kill_on_drop(true);
    command
  }
}

/// Run the emulator and enforce the wall-clock deadline.
///
/// With `capture` set, the child's stdout and stderr are piped through an
/// in-process tee that writes every chunk to our stdout and to the capture
/// file; otherwise the child inherits our streams directly. The tee is
/// drained before returning, so the file holds every byte the emulator
/// wrote, on the timeout path included.
pub async fn supervise(
  invocation: &QemuInvocation,
  timeout: Duration,
  capture: Option<&Path>,
) -> Result<RunOutcome, HarnessError> {
  let mut command = invocation.command();
  if capture.is_some() {
    command.stdout(Stdio::piped()).stderr(Stdio::piped());
  }

  let mut child = command.spawn().map_err(|source| HarnessError::Spawn {
    what: "emulator",
    source,
  })?;
  info!(pid = ?child.id(), machine = %invocation.machine, "emulator started");

  let mut tee: Option<JoinHandle<std::io::Result<u64>>> = None;
  if let Some(path) = capture {
    let file = tokio::fs::File::create(path).await?;
    if let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) {
      debug!(file = %path.display(), "capture tee started");
      tee = Some(tokio::spawn(tee_output(stdout, stderr, file)));
    }
  }

  let deadline = tokio::time::sleep(timeout);
  tokio::pin!(deadline);

  let outcome = tokio::select! {
    status = child.wait() => {
      let status = status?;
      debug!(code = ?status.code(), "emulator exited on its own");
      RunOutcome::Completed
    }
    _ = &mut deadline => {
      warn!(secs = timeout.as_secs(), "deadline elapsed, terminating emulator");
      escalate(&mut child).await?;
      RunOutcome::TimedOut
    }
    signal = tokio::signal::ctrl_c() => {
      signal?;
      warn!("interrupt received, terminating emulator");
      escalate(&mut child).await?;
      RunOutcome::Interrupted
    }
  };

  // The child is gone and its pipes are at EOF; drain the tee so the capture
  // file is complete before the caller reads it.
  if let Some(handle) = tee {
    let written = handle.await.map_err(std::io::Error::other)??;
    debug!(bytes = written, "capture drained");
  }

  Ok(outcome)
}

/// Graceful-then-forced termination: cooperative signal, bounded grace
/// period, unconditional kill. The kill step is a no-op if the emulator
/// already exited.
async fn escalate(child: &mut Child) -> std::io::Result<()> {
  terminate(child);
  match tokio::time::timeout(GRACE_PERIOD, child.wait()).await {
    Ok(status) => {
      let status = status?;
      debug!(code = ?status.code(), "emulator exited within the grace period");
    }
    Err(_) => {
      debug!("grace period elapsed, killing emulator");
      let _ = child.start_kill();
      child.wait().await?;
    }
  }
  Ok(())
}

/// Ask the emulator to shut down voluntarily.
#[cfg(unix)]
fn terminate(child: &mut Child) {
  use nix::sys::signal::{Signal, kill};
  use nix::unistd::Pid;

  // id() is None once the child has been reaped; nothing left to signal.
  if let Some(pid) = child.id() {
    let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
  }
}

/// No cooperative stop on this platform; go straight to the kill request and
/// let the grace wait reap it.
#[cfg(not(unix))]
fn terminate(child: &mut Child) {
  let _ = child.start_kill();
}

/// Copy the child's combined output to both our stdout and the capture file.
///
/// Chunks are forwarded in read order, so per-stream ordering is preserved.
/// Ends at EOF on both pipes, i.e. when the emulator is gone. Returns the
/// byte count written to the file.
async fn tee_output(
  mut child_stdout: ChildStdout,
  mut child_stderr: ChildStderr,
  mut file: tokio::fs::File,
) -> std::io::Result<u64> {
  let mut stdout = tokio::io::stdout();
  let mut out_buf = [0u8; 8192];
  let mut err_buf = [0u8; 8192];
  let mut out_open = true;
  let mut err_open = true;
  let mut written = 0u64;

  loop {
    tokio::select! {
      read = child_stdout.read(&mut out_buf), if out_open => {
        let n = read?;
        if n == 0 {
          out_open = false;
        } else {
          forward(&out_buf[..n], &mut stdout, &mut file).await?;
          written += n as u64;
        }
      }
      read = child_stderr.read(&mut err_buf), if err_open => {
        let n = read?;
        if n == 0 {
          err_open = false;
        } else {
          forward(&err_buf[..n], &mut stdout, &mut file).await?;
          written += n as u64;
        }
      }
      else => break,
    }
  }

  file.flush().await?;
  Ok(written)
}

async fn forward(
  chunk: &[u8],
  stdout: &mut tokio::io::Stdout,
  file: &mut tokio::fs::File,
) -> std::io::Result<()> {
  stdout.write_all(chunk).await?;
  stdout.flush().await?;
  file.write_all(chunk).await?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::{DEFAULT_MACHINE, RunConfig};
  use std::time::Instant;
  use tempfile::TempDir;

  #[test]
  fn rendered_command_line_has_the_fixed_flags() {
    let config = RunConfig::default();
    let invocation = QemuInvocation::new(&config, Path::new("/tmp/aspeed-ddk"));
    assert_eq!(
      invocation.rendered(),
      format!("/usr/local/bin/qemu-system-arm -M {DEFAULT_MACHINE} -nographic -kernel /tmp/aspeed-ddk")
    );
  }

  #[tokio::test]
  async fn missing_emulator_is_a_spawn_error() {
    let config = RunConfig {
      qemu: PathBuf::from("/nonexistent/qemu-system-arm"),
      ..RunConfig::default()
    };
    let invocation = QemuInvocation::new(&config, Path::new("firmware.bin"));

    let err = supervise(&invocation, Duration::from_secs(1), None).await.unwrap_err();
    assert!(matches!(err, HarnessError::Spawn { what: "emulator", .. }));
  }

  #[cfg(unix)]
  fn fake_emulator(dir: &Path, body: &str) -> QemuInvocation {
    use std::os::unix::fs::PermissionsExt;

    let script = dir.join("fake-qemu");
    std::fs::write(&script, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut perms = std::fs::metadata(&script).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&script, perms).unwrap();

    let config = RunConfig {
      qemu: script,
      ..RunConfig::default()
    };
    QemuInvocation::new(&config, Path::new("firmware.bin"))
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn run_that_exits_in_time_completes() {
    let temp = TempDir::new().unwrap();
    let invocation = fake_emulator(temp.path(), "exit 0");

    let outcome = supervise(&invocation, Duration::from_secs(10), None).await.unwrap();
    assert_eq!(outcome, RunOutcome::Completed);
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn emulator_exit_code_is_not_interpreted() {
    let temp = TempDir::new().unwrap();
    let invocation = fake_emulator(temp.path(), "exit 3");

    let outcome = supervise(&invocation, Duration::from_secs(10), None).await.unwrap();
    assert_eq!(outcome, RunOutcome::Completed);
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn capture_holds_stdout_and_stderr_in_order() {
    let temp = TempDir::new().unwrap();
    let invocation = fake_emulator(temp.path(), "echo boot-one\necho boot-two\necho boot-err >&2");
    let log = temp.path().join("run.log");

    let outcome = supervise(&invocation, Duration::from_secs(10), Some(&log)).await.unwrap();
    assert_eq!(outcome, RunOutcome::Completed);

    let contents = std::fs::read_to_string(&log).unwrap();
    assert!(contents.contains("boot-err"));
    let one = contents.find("boot-one").unwrap();
    let two = contents.find("boot-two").unwrap();
    assert!(one < two);
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn deadline_terminates_a_cooperative_emulator() {
    let temp = TempDir::new().unwrap();
    let invocation = fake_emulator(temp.path(), "exec sleep 30");

    let start = Instant::now();
    let outcome = supervise(&invocation, Duration::from_millis(300), None).await.unwrap();
    assert_eq!(outcome, RunOutcome::TimedOut);
    // SIGTERM lands well within the grace period.
    assert!(start.elapsed() < Duration::from_secs(5));
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn stubborn_emulator_is_killed_after_the_grace_period() {
    let temp = TempDir::new().unwrap();
    let invocation = fake_emulator(temp.path(), "trap '' TERM\nwhile :; do sleep 1; done");

    let start = Instant::now();
    let outcome = supervise(&invocation, Duration::from_millis(300), None).await.unwrap();
    assert_eq!(outcome, RunOutcome::TimedOut);

    let elapsed = start.elapsed();
    assert!(elapsed >= GRACE_PERIOD);
    assert!(elapsed < Duration::from_secs(8));
  }

  #[cfg(unix)]
  #[tokio::test]
  async fn capture_is_flushed_on_the_timeout_path() {
    let temp = TempDir::new().unwrap();
    let invocation = fake_emulator(temp.path(), "echo early-line\nexec sleep 30");
    let log = temp.path().join("run.log");

    let outcome = supervise(&invocation, Duration::from_millis(500), Some(&log)).await.unwrap();
    assert_eq!(outcome, RunOutcome::TimedOut);

    let contents = std::fs::read_to_string(&log).unwrap();
    assert!(contents.contains("early-line"));
  }
}
