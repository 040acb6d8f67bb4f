use std::path::Path;

use anyhow::{
  Context,
  Result,
};
use the_abbr::config::Settings;

use crate::{
  cli::CliOptions,
  script::{
    Script,
    Session,
  },
};

mod cli;
mod script;

fn setup_logging(verbosity: u8, log_file: Option<&Path>) -> Result<()> {
  let level = match verbosity {
    0 => log::LevelFilter::Warn,
    1 => log::LevelFilter::Info,
    2 => log::LevelFilter::Debug,
    _ => log::LevelFilter::Trace,
  };

  let mut logger = fern::Dispatch::new()
    .format(|out, message, record| {
      out.finish(format_args!(
        "{} {} [{}] {}",
        chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
        record.target(),
        record.level(),
        message
      ))
    })
    .level(level);

  logger = match log_file {
    Some(path) => {
      let file = fern::log_file(path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;
      logger.chain(file)
    },
    None => logger.chain(std::io::stderr()),
  };

  logger.apply()?;
  Ok(())
}

fn main() -> Result<()> {
  let options = CliOptions::parse();
  setup_logging(options.verbosity, options.log_file.as_deref())?;

  let base = match &options.config_file {
    Some(path) => Settings::load(path)?,
    None => Settings::default(),
  };
  let script = Script::load(&options.script)?;
  let settings = script.settings(base)?;
  log::debug!("replaying {} with {settings:?}", options.script.display());

  let mut session = Session::new(&script, settings)?;
  println!("start: {}", session.describe());
  for (index, step) in script.steps.iter().enumerate() {
    let output = session
      .run_step(step)
      .with_context(|| format!("step {} ({step}) failed", index + 1))?;
    println!("{:>3} {step}: {}", index + 1, session.describe());
    if let Some(output) = output {
      println!("    {output}");
    }
  }

  println!("text: {:?}", session.text());
  println!("caret: {}", session.caret());
  Ok(())
}
