//! Emulator preflight check.

use std::path::Path;

use tracing::debug;

use crate::error::HarnessError;

/// Verify the emulator binary exists and is executable.
///
/// Runs before the build stage so a missing emulator aborts the whole run
/// without wasting a compile.
pub fn check_emulator(path: &Path) -> Result<(), HarnessError> {
  if !is_executable(path) {
    return Err(HarnessError::EmulatorMissing {
      path: path.to_path_buf(),
    });
  }
  debug!(path = %path.display(), "emulator preflight ok");
  Ok(())
}

fn is_executable(path: &Path) -> bool {
  let Ok(meta) = std::fs::metadata(path) else {
    return false;
  };
  if !meta.is_file() {
    return false;
  }

  #[cfg(unix)]
  {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o111 != 0
  }

  #[cfg(not(unix))]
  {
    true
  }
}
