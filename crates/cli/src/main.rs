//! qrun — build the ASPEED firmware and test it under QEMU.
//!
//! Three stages, each aborting the run on failure: preflight the emulator
//! binary, build the firmware, then supervise a QEMU run against the built
//! artifact under a wall-clock timeout. Timeouts and Ctrl+C are expected
//! endings and exit 0; preflight, build, and supervision failures exit 1.

mod output;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use qrun_lib::build::build_firmware;
use qrun_lib::capture;
use qrun_lib::config::{self, BuildMode, CaptureTarget, RunConfig};
use qrun_lib::preflight::check_emulator;
use qrun_lib::supervise::{QemuInvocation, RunOutcome, supervise};

use crate::output::{print_error, print_step, print_warning};

/// Build the ASPEED firmware and run it under QEMU with a timeout.
#[derive(Parser)]
#[command(name = "qrun", version, about)]
struct Cli {
  /// Build in release mode (default: debug)
  #[arg(long)]
  release: bool,

  /// QEMU machine type
  #[arg(long, value_name = "NAME", default_value = config::DEFAULT_MACHINE)]
  machine: String,

  /// Capture QEMU output to FILE (timestamped name when FILE is omitted)
  #[arg(short, long, value_name = "FILE", num_args = 0..=1, default_missing_value = "")]
  output: Option<String>,

  /// Timeout in seconds
  #[arg(
    long,
    value_name = "SECONDS",
    default_value_t = config::DEFAULT_TIMEOUT_SECS,
    value_parser = clap::value_parser!(u64).range(1..)
  )]
  timeout: u64,

  /// Path to the qemu-system-arm executable
  #[arg(long, value_name = "PATH", env = "QRUN_QEMU", default_value = config::DEFAULT_QEMU)]
  qemu: PathBuf,

  /// Firmware project directory the build runs in
  #[arg(long, value_name = "DIR", env = "QRUN_PROJECT_DIR", default_value = ".")]
  project_dir: PathBuf,

  /// Build command (whitespace-separated; the mode flag is appended)
  #[arg(long, value_name = "CMD", env = "QRUN_BUILD_CMD", default_value = config::DEFAULT_BUILD_CMD)]
  build_cmd: String,

  /// Enable debug-level tracing output
  #[arg(short, long)]
  verbose: bool,
}

impl Cli {
  fn into_config(self) -> RunConfig {
    RunConfig {
      qemu: self.qemu,
      machine: self.machine,
      project_dir: self.project_dir,
      build_cmd: self.build_cmd,
      mode: if self.release {
        BuildMode::Release
      } else {
        BuildMode::Debug
      },
      capture: CaptureTarget::from_arg(self.output),
      timeout: Duration::from_secs(self.timeout),
    }
  }
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let filter = if cli.verbose {
    EnvFilter::new("debug")
  } else {
    EnvFilter::from_default_env()
  };
  tracing_subscriber::fmt().with_env_filter(filter).without_time().init();

  let config = cli.into_config();
  debug!(mode = %config.mode, timeout = config.timeout.as_secs(), "run configuration resolved");

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  rt.block_on(run(config));
  Ok(())
}

async fn run(config: RunConfig) {
  print_step("Starting ASPEED QEMU test...");

  if let Err(err) = check_emulator(&config.qemu) {
    print_error(&err.to_string());
    print_warning("To build QEMU with ASPEED support:");
    println!("  cd <qemu-source-dir>");
    println!("  mkdir build && cd build");
    println!("  ../configure --target-list=arm-softmmu");
    println!("  make -j 4");
    std::process::exit(1);
  }
  print_step(&format!("Using QEMU: {}", config.qemu.display()));

  print_step(&format!("Building project in {} mode...", config.mode));
  let artifact = match build_firmware(&config).await {
    Ok(path) => path,
    Err(err) => {
      print_error(&err.to_string());
      std::process::exit(1);
    }
  };
  print_step(&format!("Binary built successfully: {}", artifact.display()));

  let capture_file = capture::resolve(&config.capture);
  let invocation = QemuInvocation::new(&config, &artifact);

  print_step(&format!(
    "Running QEMU with machine '{}' (timeout: {}s)...",
    config.machine,
    config.timeout.as_secs()
  ));
  if let Some(file) = &capture_file {
    println!("Output will be captured to: {}", file.display());
  }
  println!("Command: {}", invocation.rendered());
  println!("Press Ctrl+C to stop QEMU manually");
  println!("{}", "-".repeat(40));

  let outcome = match supervise(&invocation, config.timeout, capture_file.as_deref()).await {
    Ok(outcome) => outcome,
    Err(err) => {
      print_error(&format!("Error running QEMU: {err}"));
      std::process::exit(1);
    }
  };

  match outcome {
    RunOutcome::Completed => print_step("QEMU process completed successfully!"),
    RunOutcome::TimedOut => {
      print_warning(&format!(
        "QEMU execution timed out after {} seconds",
        config.timeout.as_secs()
      ));
      print_step("QEMU process terminated");
    }
    RunOutcome::Interrupted => {
      print_warning("Received interrupt signal (Ctrl+C)");
      print_step("QEMU process terminated");
    }
  }

  if let Some(file) = &capture_file {
    if file.is_file() {
      print_step(&format!("Output captured in: {}", file.display()));
      println!("To view the output: cat {}", file.display());
    }
  }

  print_step("QEMU test completed successfully!");
}
