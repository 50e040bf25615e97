//! Process-wide bookkeeping of the mod system
//!
//! The registry records extendable objects, the extension journal, declared
//! dependencies, installed mods (in load order) and deferred install
//! callbacks. It is owned by the installer and lent to mods through
//! [`ModContext`](crate::context::ModContext) while they install.

use crate::anchor::{Anchor, AnchorRef, Extension, ExtensionPayload};
use crate::catalog::Catalog;
use crate::context::ModContext;
use crate::errors::ModError;
use crate::types::{TypeDef, TypeRef};
use crate::version;
use std::sync::Arc;
use tracing::{debug, warn};

/// Contributor name used for objects declared by the application itself
pub const CORE_CONTRIBUTOR: &str = "core";

/// A dependency declared by a mod
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyRecord {
    pub plugin: String,
    pub required: String,
    pub version: Option<String>,
}

/// Installed mods and their versions, in load order
#[derive(Debug, Clone, Default)]
pub struct InstalledRegistry {
    entries: Vec<(String, Option<String>)>,
}

impl InstalledRegistry {
    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(n, _)| n == name)
    }

    pub fn insert(&mut self, name: &str, version: Option<String>) {
        match self.position(name) {
            Some(idx) => self.entries[idx].1 = version,
            None => self.entries.push((name.to_string(), version)),
        }
    }

    pub fn remove(&mut self, name: &str) -> bool {
        match self.position(name) {
            Some(idx) => {
                self.entries.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// `None` when the mod is not installed, `Some(None)` when it is
    /// installed without a declared version
    pub fn version(&self, name: &str) -> Option<Option<&str>> {
        self.position(name)
            .map(|idx| self.entries[idx].1.as_deref())
    }

    pub fn satisfies(&self, name: &str, minimum: Option<&str>) -> Result<bool, ModError> {
        match self.version(name) {
            None => Ok(false),
            Some(installed) => version::satisfies(installed, minimum),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries
            .iter()
            .map(|(name, version)| (name.as_str(), version.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Read-only view of installed mods handed to transform extensions
#[derive(Clone, Copy)]
pub struct Installed<'a> {
    registry: &'a InstalledRegistry,
}

impl<'a> Installed<'a> {
    pub(crate) fn new(registry: &'a InstalledRegistry) -> Self {
        Installed { registry }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    pub fn version(&self, name: &str) -> Option<&'a str> {
        self.registry.version(name).flatten()
    }

    /// Whether `name` is installed at `minimum` or later. Unparseable
    /// versions count as unsatisfied.
    pub fn satisfies(&self, name: &str, minimum: Option<&str>) -> bool {
        self.registry
            .satisfies(name, minimum)
            .unwrap_or_else(|err| {
                warn!("Treating {} as not installed: {}", name, err);
                false
            })
    }
}

/// Deferred work run once installation finishes, if a mod is installed
pub type InstallCallback = dyn FnOnce(&mut ModContext<'_>) -> Result<(), ModError> + Send;

pub(crate) struct PendingCallback {
    pub owner: Arc<str>,
    pub name: String,
    pub version: Option<String>,
    pub callback: Box<InstallCallback>,
}

#[derive(Debug, Clone)]
enum ExtensionKey {
    Name(String),
    Anchor(usize),
}

impl ExtensionKey {
    fn targets(&self, anchor: &Anchor) -> bool {
        match self {
            ExtensionKey::Name(name) => name == anchor.name(),
            ExtensionKey::Anchor(key) => *key == anchor.key(),
        }
    }
}

/// Journal positions taken before a mod is imported
#[derive(Debug, Clone, Copy)]
pub struct RegistryCheckpoint {
    anchors: usize,
    extensions: usize,
    requirements: usize,
    pending: usize,
}

#[derive(Default)]
pub struct ModRegistry {
    anchors: Vec<Anchor>,
    extensions: Vec<(ExtensionKey, Extension)>,
    requirements: Vec<DependencyRecord>,
    installed: InstalledRegistry,
    pending: Vec<PendingCallback>,
    mods_loaded: bool,
    composed: bool,
}

impl ModRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extendable objects in declaration order
    pub fn anchors(&self) -> &[Anchor] {
        &self.anchors
    }

    pub fn anchor(&self, name: &str) -> Option<&Anchor> {
        self.anchors.iter().find(|anchor| anchor.name() == name)
    }

    pub fn resolve(&self, target: &AnchorRef) -> Option<Anchor> {
        match target {
            AnchorRef::Name(name) => self.anchor(name).cloned(),
            AnchorRef::Handle(handle) => self
                .anchors
                .iter()
                .find(|anchor| anchor.ptr_eq(handle))
                .cloned(),
        }
    }

    /// Register `root` as extendable under `name` (defaults to the root's
    /// name). Registering the same root again returns its existing anchor.
    pub fn declare_extendable(
        &mut self,
        catalog: &mut Catalog,
        root: TypeRef,
        name: Option<&str>,
        contributor: &str,
    ) -> Result<Anchor, ModError> {
        if let Some(existing) = self
            .anchors
            .iter()
            .find(|anchor| Arc::ptr_eq(anchor.root(), &root))
        {
            return Ok(existing.clone());
        }

        let name = name.unwrap_or(root.name());
        if let Some(existing) = self.anchor(name) {
            return Err(ModError::DuplicateExtendableName {
                name: name.to_string(),
                existing: format!("{} (from {})", existing.root().name(), existing.contributor()),
                new: format!("{} (from {})", root.name(), contributor),
            });
        }

        let anchor = Anchor::new(name, root.clone(), contributor);
        if root.is_entity() {
            catalog.ensure_defined(&root)?;
            let shell = TypeDef::shell(anchor.catalog_name(), root.kind().derived(), vec![root]);
            catalog.define(&shell)?;
        }
        debug!(
            "Registered extendable {} as {} for {}",
            anchor.root().name(),
            anchor.name(),
            contributor
        );
        self.anchors.push(anchor.clone());
        Ok(anchor)
    }

    pub(crate) fn extend(
        &mut self,
        target: AnchorRef,
        contributor: &str,
        payload: ExtensionPayload,
    ) -> Result<(), ModError> {
        if self.composed {
            warn!(
                "Ignoring extension of {} by {}: models are already composed",
                target, contributor
            );
            return Ok(());
        }
        if self.resolve(&target).is_none() {
            return Err(ModError::UnknownAnchor(target.to_string()));
        }
        debug!("{} extends {} with {:?}", contributor, target, payload);
        let key = match target {
            AnchorRef::Name(name) => ExtensionKey::Name(name),
            AnchorRef::Handle(anchor) => ExtensionKey::Anchor(anchor.key()),
        };
        self.extensions.push((
            key,
            Extension {
                contributor: Arc::from(contributor),
                payload,
            },
        ));
        Ok(())
    }

    /// Extensions of `anchor`: those registered by name first, then those
    /// registered by handle, each in registration order
    pub fn extensions_for(&self, anchor: &Anchor) -> Vec<Extension> {
        let by_name = self
            .extensions
            .iter()
            .filter(|(key, _)| matches!(key, ExtensionKey::Name(_)) && key.targets(anchor));
        let by_handle = self
            .extensions
            .iter()
            .filter(|(key, _)| matches!(key, ExtensionKey::Anchor(_)) && key.targets(anchor));
        by_name.chain(by_handle).map(|(_, ext)| ext.clone()).collect()
    }

    pub fn extension_count(&self) -> usize {
        self.extensions.len()
    }

    pub(crate) fn clear_extensions(&mut self) {
        self.extensions.clear();
    }

    pub(crate) fn require(&mut self, plugin: &str, required: &str, version: Option<&str>) {
        self.requirements.push(DependencyRecord {
            plugin: plugin.to_string(),
            required: required.to_string(),
            version: version.map(String::from),
        });
    }

    pub fn requirements(&self) -> &[DependencyRecord] {
        &self.requirements
    }

    /// Whether `name` is installed at `version` or later
    ///
    /// Only answerable once every mod has been loaded.
    pub fn installed(&self, name: &str, version: Option<&str>) -> Result<bool, ModError> {
        if !self.mods_loaded {
            return Err(ModError::PrematureInstalledCheck {
                name: name.to_string(),
                version: version.map(String::from),
            });
        }
        self.installed.satisfies(name, version)
    }

    pub fn installed_registry(&self) -> &InstalledRegistry {
        &self.installed
    }

    pub fn installed_view(&self) -> Installed<'_> {
        Installed::new(&self.installed)
    }

    pub(crate) fn record_installed(&mut self, name: &str, version: Option<String>) {
        self.installed.insert(name, version);
    }

    pub fn mods_loaded(&self) -> bool {
        self.mods_loaded
    }

    pub(crate) fn mark_loaded(&mut self) {
        self.mods_loaded = true;
    }

    pub fn is_composed(&self) -> bool {
        self.composed
    }

    pub(crate) fn mark_composed(&mut self) {
        self.composed = true;
    }

    pub(crate) fn defer(&mut self, callback: PendingCallback) {
        self.pending.push(callback);
    }

    pub(crate) fn take_pending(&mut self) -> Vec<PendingCallback> {
        std::mem::take(&mut self.pending)
    }

    pub fn pending_callbacks(&self) -> usize {
        self.pending.len()
    }

    pub fn checkpoint(&self) -> RegistryCheckpoint {
        RegistryCheckpoint {
            anchors: self.anchors.len(),
            extensions: self.extensions.len(),
            requirements: self.requirements.len(),
            pending: self.pending.len(),
        }
    }

    /// Discard everything recorded after `checkpoint`
    pub fn rollback(&mut self, checkpoint: RegistryCheckpoint) {
        self.anchors.truncate(checkpoint.anchors);
        self.extensions.truncate(checkpoint.extensions);
        self.requirements.truncate(checkpoint.requirements);
        self.pending.truncate(checkpoint.pending);
    }

    /// Remove every trace of an installed mod: its version, extensions,
    /// requirements, callbacks and declared objects (with their catalog
    /// entries and the extensions targeting them)
    ///
    /// Returns the names of the extendable objects that were dropped.
    pub fn forget_plugin(&mut self, plugin: &str, catalog: &mut Catalog) -> Vec<String> {
        self.installed.remove(plugin);
        self.requirements.retain(|record| record.plugin != plugin);
        self.pending.retain(|callback| &*callback.owner != plugin);
        self.extensions
            .retain(|(_, extension)| &*extension.contributor != plugin);

        let (dropped, kept): (Vec<Anchor>, Vec<Anchor>) = std::mem::take(&mut self.anchors)
            .into_iter()
            .partition(|anchor| anchor.contributor() == plugin);
        self.anchors = kept;

        let mut forgotten = Vec::with_capacity(dropped.len());
        for anchor in dropped {
            self.extensions.retain(|(key, _)| !key.targets(&anchor));
            catalog.forget(&[anchor.catalog_name(), anchor.root().name()]);
            forgotten.push(anchor.name().to_string());
        }
        forgotten
    }
}
