mod cli;
mod config;
mod editor;
mod run;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::config::{AppPaths, Config};

fn main() -> Result<()> {
    let cli = Cli::parse();
    initialise_tracing();

    match cli.command {
        Some(Command::List) => list_sketches(),
        None => run::run(cli),
    }
}

fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn list_sketches() -> Result<()> {
    let paths = AppPaths::discover()?;
    let mut config = Config::load_or_default(&paths.config_file);
    let namespace = config.ensure_namespace(&paths.config_file);
    let store = sketchbook::SketchStore::open(&paths.sketch_dir, namespace);

    let entries = store.list_owned();
    if entries.is_empty() {
        println!("no sketches stored");
        return Ok(());
    }
    for entry in entries {
        println!("{:>4}  {}", entry.id, entry.name);
    }
    Ok(())
}
