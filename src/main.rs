mod app;
mod catalog;
mod charts;
mod cli;
mod color;
mod config;
mod convert;
mod data;
mod download;
mod error;
mod lake;
mod logging;
mod manager;
mod metadata;
mod monitor;
mod organizer;
mod scraper;
mod search;
mod state;
mod trim;
mod ui;

use clap::Parser;

use cli::Cli;
use config::Config;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    logging::init(cli.log_file(&config).as_deref())?;

    if let Err(e) = cli.run(config) {
        log::error!("{e:#}");
        return Err(e);
    }
    Ok(())
}
