pub mod audit;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod io_utils;
pub mod loader;
pub mod lookup;
pub mod merge;
pub mod naming;
pub mod pim;
pub mod pivot;
pub mod preview;
pub mod reasons;
pub mod render;
pub mod schema;
pub mod session;
pub mod split;
pub mod table;
pub mod workbook;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    cli::{Cli, Commands},
    config::Config,
    session::{RunStamp, Session},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("pim_tools", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => {
            info!("Using configuration {:?}", path);
            Config::load(path).with_context(|| format!("Loading configuration {path:?}"))?
        }
        None => Config::default(),
    };
    let stamp = RunStamp::now();
    debug!("Run stamp {}", stamp.minute_stamp());
    let mut session = Session::new(cli.output_dir.clone(), config, stamp);

    match &cli.command {
        Commands::Pivot(args) => pivot::execute(args, &mut session)?,
        Commands::Merge(args) => merge::execute(args, &mut session)?,
        Commands::Split(args) => split::execute(args, &mut session)?,
        Commands::Audit(args) => audit::execute(args, &mut session)?,
        Commands::Preview(args) => preview::execute(args, &mut session)?,
    }
    session.finish(cli.manifest)?;
    Ok(())
}
