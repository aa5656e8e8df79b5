//! qrun-lib: stage logic for the ASPEED QEMU test runner
//!
//! The `qrun` binary sequences three stages, each provided here:
//! - `preflight`: verify the emulator executable is present and runnable
//! - `build`: invoke the firmware build tool and locate the artifact
//! - `supervise`: run the emulator under a wall-clock deadline, optionally
//!   teeing its output to a log file
//!
//! `config` holds the immutable per-run configuration and compiled-in
//! defaults; `capture` resolves where the log file goes.

pub mod build;
pub mod capture;
pub mod config;
pub mod error;
pub mod preflight;
pub mod supervise;
