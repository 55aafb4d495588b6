use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

use submgr_rs::{convert, list, location, logging};

#[derive(Parser)]
#[command(author, version, about = "Subscription conversion manager")]
struct Cli {
  /// Path to the TOML config file.
  #[arg(short, long, global = true, default_value = "./configs/config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Fetch converted configs for every enabled subscription and write them to the output directory.
  Convert(convert::Args),

  /// Print a table of the configured subscriptions.
  List,

  /// Print a shareable location link for every enabled subscription.
  ListLocation,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
  logging::init();
  let cli = Cli::parse();
  match cli.command {
    Some(Commands::Convert(args)) => convert::run(&cli.config, args).await,
    Some(Commands::List) => list::run(&cli.config),
    Some(Commands::ListLocation) => location::run(&cli.config),
    None => {
      Cli::command().print_help()?;
      Ok(())
    }
  }
}
