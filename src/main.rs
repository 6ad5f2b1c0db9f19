mod admin;
mod app;
mod cache;
mod commands;
mod config;
mod event;
mod favorites;
mod remote;
mod search;
#[cfg(test)]
mod testutil;
mod ui;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "chorale")]
#[command(about = "A terminal client for a choir song repertoire")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/chorale/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Category id to filter on at startup
  #[arg(long)]
  category: Option<String>,

  #[command(subcommand)]
  command: Option<CliCommand>,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
  /// Administer songs, categories and admin accounts
  #[command(subcommand)]
  Admin(admin::AdminAction),
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;

  // Override startup category if specified on the command line
  let config = if let Some(category) = args.category {
    config::Config {
      default_category: Some(category),
      ..config
    }
  } else {
    config
  };

  match args.command {
    Some(CliCommand::Admin(action)) => admin::run(&config, action).await,
    None => {
      // The terminal belongs to the UI, so logs go to a file.
      let _log_guard = init_logging(&config)?;
      let mut app = app::App::new(config)?;
      app.run().await
    }
  }
}

fn init_logging(config: &config::Config) -> Result<tracing_appender::non_blocking::WorkerGuard> {
  let dir = config.data_dir()?;
  std::fs::create_dir_all(&dir)?;
  let appender = tracing_appender::rolling::never(dir, "chorale.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_env("CHORALE_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
    )
    .with_writer(writer)
    .with_ansi(false)
    .init();

  Ok(guard)
}
