//! Mods and where they come from
//!
//! A [`Plugin`] is a unit of code that installs itself through a
//! [`ModContext`]. A [`PluginSource`] enumerates the mods available to the
//! application and imports them by name.

use crate::context::ModContext;
use crate::errors::ModError;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// Reserved unit name that describes the mod package itself
pub const PACKAGE_MARKER: &str = "mod";

pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    /// Version compared against other mods' requirements
    fn version(&self) -> Option<&str> {
        None
    }

    /// Declare extendable objects, extensions, requirements and callbacks
    fn install(&self, ctx: &mut ModContext<'_>) -> Result<(), ModError>;
}

pub trait PluginSource {
    /// Names of every available mod
    fn discover(&self) -> Result<BTreeSet<String>, ModError>;

    /// Install the named mod through `ctx` and return its version
    fn import(&self, name: &str, ctx: &mut ModContext<'_>) -> Result<Option<String>, ModError>;
}

type InstallFn = dyn Fn(&mut ModContext<'_>) -> Result<(), ModError> + Send + Sync;

/// A [`Plugin`] built from a closure
pub struct FnPlugin {
    name: String,
    version: Option<String>,
    install: Box<InstallFn>,
}

impl FnPlugin {
    pub fn new<F>(name: &str, install: F) -> Self
    where
        F: Fn(&mut ModContext<'_>) -> Result<(), ModError> + Send + Sync + 'static,
    {
        FnPlugin {
            name: name.to_string(),
            version: None,
            install: Box::new(install),
        }
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version = Some(version.to_string());
        self
    }
}

impl Plugin for FnPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    fn install(&self, ctx: &mut ModContext<'_>) -> Result<(), ModError> {
        (self.install)(ctx)
    }
}

impl fmt::Debug for FnPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnPlugin")
            .field("name", &self.name)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

/// Mods compiled into the application
#[derive(Clone, Default)]
pub struct StaticSource {
    plugins: BTreeMap<String, Arc<dyn Plugin>>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<P: Plugin + 'static>(mut self, plugin: P) -> Self {
        self.register(plugin);
        self
    }

    pub fn register<P: Plugin + 'static>(&mut self, plugin: P) {
        self.plugins
            .insert(plugin.name().to_string(), Arc::new(plugin));
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Plugin>> {
        self.plugins.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.plugins.keys().map(String::as_str)
    }
}

impl PluginSource for StaticSource {
    fn discover(&self) -> Result<BTreeSet<String>, ModError> {
        Ok(self
            .plugins
            .keys()
            .filter(|name| name.as_str() != PACKAGE_MARKER)
            .cloned()
            .collect())
    }

    fn import(&self, name: &str, ctx: &mut ModContext<'_>) -> Result<Option<String>, ModError> {
        let plugin = self.get(name).ok_or_else(|| ModError::Plugin {
            plugin: name.to_string(),
            message: "no such mod".to_string(),
        })?;
        plugin.install(ctx)?;
        Ok(plugin.version().map(String::from))
    }
}
