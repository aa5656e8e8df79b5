//! Firmware build stage.
//!
//! Invokes the external build tool with the mode flag and locates the
//! artifact it is expected to produce. Build output streams straight through
//! to our own stdout/stderr; only the exit status is inspected.

use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::{debug, info};

use crate::config::{ARTIFACT_NAME, BuildMode, RunConfig, TARGET_TRIPLE};
use crate::error::HarnessError;

/// Expected artifact location for `mode`, relative to the project directory.
///
/// Pure function of the mode; the build tool owns this layout.
pub fn artifact_path(project_dir: &Path, mode: BuildMode) -> PathBuf {
  project_dir
    .join("target")
    .join(TARGET_TRIPLE)
    .join(mode.profile_dir())
    .join(ARTIFACT_NAME)
}

/// Run the build command in the project directory and verify the artifact.
///
/// The command is `config.build_cmd` split on whitespace, with `--release`
/// appended in release mode. Returns the absolute artifact path.
pub async fn build_firmware(config: &RunConfig) -> Result<PathBuf, HarnessError> {
  let mut parts = config.build_cmd.split_whitespace();
  let Some(program) = parts.next() else {
    return Err(HarnessError::EmptyBuildCommand);
  };

  let mut command = Command::new(program);
  command.args(parts).current_dir(&config.project_dir);
  if config.mode == BuildMode::Release {
    command.arg("--release");
  }

  info!(cmd = %config.build_cmd, mode = %config.mode, "building firmware");

  let status = command.status().await.map_err(|source| HarnessError::Spawn {
    what: "build command",
    source,
  })?;
  if !status.success() {
    return Err(HarnessError::BuildFailed {
      code: status.code(),
    });
  }

  let expected = artifact_path(&config.project_dir, config.mode);
  if !expected.is_file() {
    return Err(HarnessError::ArtifactMissing { path: expected });
  }

  let artifact = expected.canonicalize()?;
  debug!(artifact = %artifact.display(), "artifact located");
  Ok(artifact)
}
