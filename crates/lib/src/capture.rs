//! Capture-file path resolution.

use std::path::PathBuf;

use chrono::Local;

use crate::config::CaptureTarget;

/// Resolve a capture request to a concrete file path, if capture is on.
///
/// The auto-generated name embeds the current local time as
/// `qemu_output_<YYYYMMDD_HHMMSS>.log`, relative to the working directory,
/// so successive invocations get distinct files.
pub fn resolve(target: &CaptureTarget) -> Option<PathBuf> {
  match target {
    CaptureTarget::Disabled => None,
    CaptureTarget::Auto => {
      let stamp = Local::now().format("%Y%m%d_%H%M%S");
      Some(PathBuf::from(format!("qemu_output_{stamp}.log")))
    }
    CaptureTarget::File(path) => Some(path.clone()),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn disabled_resolves_to_none() {
    assert_eq!(resolve(&CaptureTarget::Disabled), None);
  }

  #[test]
  fn explicit_file_is_passed_through() {
    let target = CaptureTarget::File(PathBuf::from("boot.log"));
    assert_eq!(resolve(&target), Some(PathBuf::from("boot.log")));
  }

  #[test]
  fn auto_name_is_timestamped() {
    let path = resolve(&CaptureTarget::Auto).unwrap();
    let name = path.file_name().unwrap().to_str().unwrap();

    let stamp = name
      .strip_prefix("qemu_output_")
      .and_then(|rest| rest.strip_suffix(".log"))
      .unwrap();

    let (date, time) = stamp.split_once('_').unwrap();
    assert_eq!(date.len(), 8);
    assert!(date.chars().all(|c| c.is_ascii_digit()));
    assert_eq!(time.len(), 6);
    assert!(time.chars().all(|c| c.is_ascii_digit()));
  }
}
