//! Error types for qrun-lib.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort a run.
///
/// Timeouts and operator interrupts are not errors; they are regular
/// [`RunOutcome`](crate::supervise::RunOutcome) values.
#[derive(Debug, Error)]
pub enum HarnessError {
  /// Preflight: the emulator binary is missing or not executable.
  #[error("qemu-system-arm not found or not executable at {}", .path.display())]
  EmulatorMissing { path: PathBuf },

  /// The configured build command has no program.
  #[error("build command is empty")]
  EmptyBuildCommand,

  /// The build command exited non-zero.
  #[error("build failed with exit code {code:?}")]
  BuildFailed { code: Option<i32> },

  /// The build succeeded but the artifact is not on disk.
  #[error("binary not found at {}", .path.display())]
  ArtifactMissing { path: PathBuf },

  /// A child process could not be started.
  #[error("failed to launch {what}: {source}")]
  Spawn {
    what: &'static str,
    source: std::io::Error,
  },

  /// I/O error while communicating with a child process.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}
