use std::path::PathBuf;

use clap::{
  ArgAction,
  Parser,
};

#[derive(Clone, Debug)]
pub struct CliOptions {
  pub script:      PathBuf,
  pub verbosity:   u8,
  pub log_file:    Option<PathBuf>,
  pub config_file: Option<PathBuf>,
}

impl CliOptions {
  pub fn parse() -> Self {
    RawCli::parse().into()
  }
}

/// Replays an editing session against the abbreviation tracker.
#[derive(Parser, Debug)]
#[command(name = "the-replay", about, long_about = None, version)]
struct RawCli {
  /// Session script to replay
  #[arg(value_name = "SCRIPT")]
  script: PathBuf,

  /// Increase logging verbosity (repeat for more detail)
  #[arg(short = 'v', action = ArgAction::Count)]
  verbosity: u8,

  /// Save logs to a specific file
  #[arg(long = "log", value_name = "FILE")]
  log_file: Option<PathBuf>,

  /// Load settings from a specific file
  #[arg(short = 'c', long = "config", value_name = "FILE")]
  config_file: Option<PathBuf>,
}

impl From<RawCli> for CliOptions {
  fn from(raw: RawCli) -> Self {
    Self {
      script:      raw.script,
      verbosity:   raw.verbosity,
      log_file:    raw.log_file,
      config_file: raw.config_file,
    }
  }
}
