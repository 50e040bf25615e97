//! Common types and utilities shared across commands

use anyhow::Context;
use clap::Parser;
use forum_config::Config;
use forum_logger as logger;
use forum_mods::ModSystem;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Global CLI options available to all commands
#[derive(Parser, Debug, Clone, Default)]
pub struct GlobalOpts {
    #[arg(short, long, global = true, help = "Decrease verbosity")]
    pub quiet: bool,

    #[arg(short, long, global = true, action = clap::ArgAction::Count, help = "Increase verbosity (-v for debug, -vv for trace)")]
    pub verbose: u8,

    #[arg(
        long,
        global = true,
        value_name = "DIR",
        help = "Application root; a relative mod directory resolves against it (default: current directory)"
    )]
    pub root: Option<PathBuf>,
}

impl GlobalOpts {
    /// Get the effective verbosity level
    /// - 0: quiet/warn only
    /// - 1: debug (-v)
    /// - 2: trace (-vv)
    pub fn verbosity_level(&self) -> u8 {
        if self.quiet {
            0
        } else {
            self.verbose
        }
    }

    pub fn app_root(&self) -> anyhow::Result<PathBuf> {
        match &self.root {
            Some(root) => Ok(root.clone()),
            None => std::env::current_dir().context("Failed to determine the current directory"),
        }
    }
}

/// Route `tracing` events from the library crates to stderr
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| logger::tracing_filter().into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr),
        )
        .try_init();
}

/// Load the configuration and install the configured mods
pub fn install_mods(opts: &GlobalOpts) -> anyhow::Result<ModSystem> {
    logger::phase("Loading configuration");
    let config = Config::load().context("Failed to load config")?;
    let root = opts.app_root()?;
    debug!("Application root: {}", root.display());

    logger::phase(&format!(
        "Installing mods from {}",
        config.mods.resolve_dir(&root).display()
    ));
    logger::spinner_start("Installing mods...");
    match forum_models::bootstrap(&config.mods, &root) {
        Ok(system) => {
            logger::spinner_finish(Ok(&format!(
                "Installed {} mods",
                system.installed_mods().len()
            )));
            Ok(system)
        }
        Err(e) => {
            logger::spinner_finish(Err("Mod installation failed"));
            Err(e.into())
        }
    }
}
