//! Forum entities and built-in mods
//!
//! [`bootstrap`] declares the core entities, installs the mods selected by
//! the configuration and returns the composed [`ModSystem`].

pub mod entities;
pub mod mods;

use forum_config::ModsConfig;
use forum_mods::{DirectorySource, ModError, ModSystem};
use std::path::Path;
use tracing::debug;

pub use entities::{declare_core, CoreAnchors};
pub use mods::builtin_mods;

/// Prefix shared by every table of the forum
pub const TABLE_PREFIX: &str = "forum_";

/// Table name for a logical table
pub fn table_name(logical: &str) -> String {
    format!("{}{}", TABLE_PREFIX, logical)
}

/// A mod system with the core entities declared, ready to install mods
pub fn new_system(config: ModsConfig) -> Result<(ModSystem, CoreAnchors), ModError> {
    let mut system = ModSystem::new(config);
    let anchors = declare_core(&mut system.core())?;
    Ok((system, anchors))
}

/// The mod directory selected by `config`, backed by the built-in mods
pub fn mod_source(config: &ModsConfig, app_root: &Path) -> DirectorySource {
    let dir = config.resolve_dir(app_root);
    debug!("Using mod directory {}", dir.display());
    DirectorySource::new(dir).with_linked(builtin_mods())
}

/// Declare the core entities and install the configured mods
pub fn bootstrap(config: &ModsConfig, app_root: &Path) -> Result<ModSystem, ModError> {
    let (mut system, _) = new_system(config.clone())?;
    let source = mod_source(config, app_root);
    system.install(&source)?;
    Ok(system)
}
