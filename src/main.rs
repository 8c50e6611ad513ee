mod api;
mod app;
mod commands;
mod config;
mod db;
mod offline;
mod session;
#[cfg(test)]
mod testing;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "trec")]
#[command(about = "Teaching-record API gateway and offline shell cache")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/trec/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: commands::Command,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Logs go to a file so command output stays clean
  let guard = init_logging()?;

  let config = config::Config::load(args.config.as_deref())?;

  let app = app::App::new(config)?;
  if !app.run(args.command).await? {
    // Flush pending log lines before exiting
    drop(guard);
    std::process::exit(1);
  }

  Ok(())
}

/// Daily rolling log file under the data directory, filtered by TREC_LOG
fn init_logging() -> Result<WorkerGuard> {
  let log_dir = config::data_dir()?.join("logs");
  let appender = tracing_appender::rolling::daily(log_dir, "trec.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  let filter = EnvFilter::try_from_env("TREC_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(false)
    .init();

  Ok(guard)
}
