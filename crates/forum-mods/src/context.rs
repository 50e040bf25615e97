use crate::anchor::{Anchor, AnchorRef, ExtensionPayload};
use crate::catalog::Catalog;
use crate::errors::ModError;
use crate::registry::{Installed, ModRegistry, PendingCallback};
use crate::types::TypeRef;
use std::sync::Arc;
use tracing::debug;

/// The API a mod sees while it installs
///
/// Every declaration made through a context is attributed to the mod it was
/// created for, so a failed or uninstalled mod can be removed cleanly.
pub struct ModContext<'a> {
    registry: &'a mut ModRegistry,
    catalog: &'a mut Catalog,
    plugin: Arc<str>,
}

impl<'a> ModContext<'a> {
    pub(crate) fn new(
        registry: &'a mut ModRegistry,
        catalog: &'a mut Catalog,
        plugin: &str,
    ) -> Self {
        ModContext {
            registry,
            catalog,
            plugin: Arc::from(plugin),
        }
    }

    /// Name of the mod this context installs
    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    /// Make `root` extendable under its own name
    pub fn declare_extendable(&mut self, root: TypeRef) -> Result<Anchor, ModError> {
        self.registry
            .declare_extendable(self.catalog, root, None, &self.plugin)
    }

    /// Make `root` extendable under `name`
    pub fn declare_extendable_as(&mut self, root: TypeRef, name: &str) -> Result<Anchor, ModError> {
        self.registry
            .declare_extendable(self.catalog, root, Some(name), &self.plugin)
    }

    pub fn anchor(&self, name: &str) -> Option<Anchor> {
        self.registry.anchor(name).cloned()
    }

    /// Add `mixin`'s members to the target. Returns the mixin unchanged.
    pub fn extend(
        &mut self,
        target: impl Into<AnchorRef>,
        mixin: TypeRef,
    ) -> Result<TypeRef, ModError> {
        self.registry.extend(
            target.into(),
            &self.plugin,
            ExtensionPayload::Mixin(mixin.clone()),
        )?;
        Ok(mixin)
    }

    /// Register a transform: at composition time it receives the target's
    /// root and returns a derived type, or `None` to contribute nothing
    pub fn extend_with<F>(
        &mut self,
        target: impl Into<AnchorRef>,
        transform: F,
    ) -> Result<(), ModError>
    where
        F: Fn(&TypeRef, &Installed<'_>) -> Option<TypeRef> + Send + Sync + 'static,
    {
        self.registry.extend(
            target.into(),
            &self.plugin,
            ExtensionPayload::Transform(Arc::new(transform)),
        )
    }

    /// Declare that this mod needs `plugin` (at `version` or later). Checked
    /// once every mod has loaded.
    pub fn require(&mut self, plugin: &str, version: Option<&str>) {
        debug!(
            "{} requires {} (version: {})",
            self.plugin,
            plugin,
            version.unwrap_or("any")
        );
        self.registry.require(&self.plugin, plugin, version);
    }

    /// Whether `plugin` is installed. Fails while mods are still loading.
    pub fn installed(&self, plugin: &str, version: Option<&str>) -> Result<bool, ModError> {
        self.registry.installed(plugin, version)
    }

    /// Fail right away unless `plugin` has already been loaded
    pub fn ensure_installed(&self, plugin: &str, version: Option<&str>) -> Result<(), ModError> {
        if self.registry.installed_registry().satisfies(plugin, version)? {
            return Ok(());
        }
        Err(ModError::MissingRequiredPlugin {
            plugin: self.plugin.to_string(),
            required: plugin.to_string(),
            version: version.map(String::from),
        })
    }

    /// Run `callback` after every mod has loaded, if `plugin` is installed
    /// at `version` or later
    pub fn on_installed<F>(&mut self, plugin: &str, version: Option<&str>, callback: F)
    where
        F: FnOnce(&mut ModContext<'_>) -> Result<(), ModError> + Send + 'static,
    {
        self.registry.defer(PendingCallback {
            owner: self.plugin.clone(),
            name: plugin.to_string(),
            version: version.map(String::from),
            callback: Box::new(callback),
        });
    }
}
