//! Colored status output for the terminal.
//!
//! Stage progress, expected deviations, and fatal problems get distinct tags
//! so they stand out of a long emulator log. Everything goes to stdout,
//! interleaved with the emulator output it annotates.

use owo_colors::{OwoColorize, Stream};

/// Progress marker for a stage boundary.
pub fn print_step(message: &str) {
  println!(
    "{} {}",
    "[STEP]".if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

/// Expected deviation: timeout or operator interrupt.
pub fn print_warning(message: &str) {
  println!(
    "{} {}",
    "[WARN]".if_supports_color(Stream::Stdout, |s| s.yellow()),
    message
  );
}

/// Fatal problem; the run is about to abort.
pub fn print_error(message: &str) {
  println!(
    "{} {}",
    "[ERROR]".if_supports_color(Stream::Stdout, |s| s.red()),
    message
  );
}
