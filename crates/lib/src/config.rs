//! Run configuration and compiled-in defaults.
//!
//! Everything is resolved before the first stage starts and never changes
//! afterward; the stages only read from `RunConfig`.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Default emulator machine type.
pub const DEFAULT_MACHINE: &str = "ast1030-evb";

/// Target triple the firmware build tool compiles for.
pub const TARGET_TRIPLE: &str = "thumbv7em-none-eabihf";

/// Name of the firmware binary the build tool produces.
pub const ARTIFACT_NAME: &str = "aspeed-ddk";

/// Default emulator executable path.
pub const DEFAULT_QEMU: &str = "/usr/local/bin/qemu-system-arm";

/// Default build command, whitespace-separated.
pub const DEFAULT_BUILD_CMD: &str = "cargo xtask build";

/// Default wall-clock timeout for an emulator run, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Cargo profile the firmware is built under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildMode {
  #[default]
  Debug,
  Release,
}

impl BuildMode {
  /// Profile directory name under `target/<triple>/`.
  pub fn profile_dir(self) -> &'static str {
    match self {
      BuildMode::Debug => "debug",
      BuildMode::Release => "release",
    }
  }
}

impl fmt::Display for BuildMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.profile_dir())
  }
}

/// Where emulator output goes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CaptureTarget {
  /// The emulator inherits our stdout/stderr; no duplication.
  #[default]
  Disabled,
  /// Tee to an auto-generated timestamped file in the working directory.
  Auto,
  /// Tee to the given file.
  File(PathBuf),
}

impl CaptureTarget {
  /// Map the raw `--output [FILE]` argument to a target.
  ///
  /// A bare flag arrives as an empty string and selects the auto-generated
  /// name; an explicitly empty filename collapses into the same path.
  pub fn from_arg(arg: Option<String>) -> Self {
    match arg {
      None => CaptureTarget::Disabled,
      Some(name) if name.is_empty() => CaptureTarget::Auto,
      Some(name) => CaptureTarget::File(PathBuf::from(name)),
    }
  }
}

/// Fully resolved configuration for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
  /// Emulator executable path.
  pub qemu: PathBuf,
  /// Emulator machine type (`-M`).
  pub machine: String,
  /// Firmware project directory the build command runs in.
  pub project_dir: PathBuf,
  /// Build command, whitespace-separated program and arguments.
  pub build_cmd: String,
  /// Cargo profile to build and locate the artifact under.
  pub mode: BuildMode,
  /// Output capture request.
  pub capture: CaptureTarget,
  /// Wall-clock deadline for the emulator run.
  pub timeout: Duration,
}

impl Default for RunConfig {
  fn default() -> Self {
    Self {
      qemu: PathBuf::from(DEFAULT_QEMU),
      machine: DEFAULT_MACHINE.to_string(),
      project_dir: PathBuf::from("."),
      build_cmd: DEFAULT_BUILD_CMD.to_string(),
      mode: BuildMode::default(),
      capture: CaptureTarget::default(),
      timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
    }
  }
}
