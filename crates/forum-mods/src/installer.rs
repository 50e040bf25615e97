//! Mod installation
//!
//! [`ModSystem`] owns the registry and the catalog and drives installation
//! through its phases: load every mod, validate requirements, run deferred
//! install callbacks, then compose. Installation happens once per process;
//! later calls return the composed models.

use crate::anchor::Anchor;
use crate::catalog::Catalog;
use crate::compose::{compose_all, Models};
use crate::context::ModContext;
use crate::errors::ModError;
use crate::loader::{discover_and_load, LoadReport};
use crate::merged::MergedType;
use crate::plugin::PluginSource;
use crate::registry::{DependencyRecord, ModRegistry, CORE_CONTRIBUTOR};
use forum_config::ModsConfig;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum InstallState {
    NotInitialized,
    PluginsLoading,
    PluginsLoaded,
    DependenciesValidated,
    Composed,
}

impl fmt::Display for InstallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InstallState::NotInitialized => "not initialized",
            InstallState::PluginsLoading => "plugins loading",
            InstallState::PluginsLoaded => "plugins loaded",
            InstallState::DependenciesValidated => "dependencies validated",
            InstallState::Composed => "composed",
        };
        write!(f, "{}", name)
    }
}

/// What an installation did
#[derive(Debug, Clone, Default)]
pub struct InstallReport {
    pub load: LoadReport,
    /// Mods removed because a requirement was not met
    pub uninstalled: Vec<String>,
    pub callbacks_run: usize,
}

pub struct ModSystem {
    config: ModsConfig,
    registry: ModRegistry,
    catalog: Catalog,
    state: InstallState,
    report: InstallReport,
    models: Models,
}

impl fmt::Debug for ModSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModSystem")
            .field("state", &self.state)
            .field("installed", &self.installed_mods())
            .finish_non_exhaustive()
    }
}

impl ModSystem {
    pub fn new(config: ModsConfig) -> Self {
        ModSystem {
            config,
            registry: ModRegistry::new(),
            catalog: Catalog::new(),
            state: InstallState::NotInitialized,
            report: InstallReport::default(),
            models: Models::default(),
        }
    }

    pub fn config(&self) -> &ModsConfig {
        &self.config
    }

    pub fn state(&self) -> InstallState {
        self.state
    }

    pub fn report(&self) -> &InstallReport {
        &self.report
    }

    pub fn registry(&self) -> &ModRegistry {
        &self.registry
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Context for the application's own declarations, made before mods
    /// install
    pub fn core(&mut self) -> ModContext<'_> {
        ModContext::new(&mut self.registry, &mut self.catalog, CORE_CONTRIBUTOR)
    }

    /// Load, validate, run callbacks and compose
    pub fn install(&mut self, source: &dyn PluginSource) -> Result<&Models, ModError> {
        match self.state {
            InstallState::Composed => return Ok(&self.models),
            InstallState::NotInitialized => {}
            other => return Err(ModError::InvalidState(other.to_string())),
        }

        self.state = InstallState::PluginsLoading;
        self.report.load =
            discover_and_load(&mut self.registry, &mut self.catalog, source, &self.config)?;
        self.registry.mark_loaded();
        self.state = InstallState::PluginsLoaded;

        self.report.uninstalled = self.validate_required()?;
        self.state = InstallState::DependenciesValidated;

        self.report.callbacks_run = self.run_install_callbacks()?;

        self.models = compose_all(&mut self.registry, &mut self.catalog)?;
        self.state = InstallState::Composed;
        info!(
            "Installed {} mods, composed {} objects",
            self.registry.installed_registry().len(),
            self.models.len()
        );
        Ok(&self.models)
    }

    /// Check every declared requirement against the installed mods
    ///
    /// With `fail_on_missing_required` the first unmet requirement is an
    /// error. Otherwise the dependent mod is uninstalled, which may in turn
    /// leave other requirements unmet; this repeats until all hold.
    fn validate_required(&mut self) -> Result<Vec<String>, ModError> {
        let mut uninstalled = Vec::new();
        loop {
            let Some(record) = self.first_unmet()? else {
                break;
            };
            let err = ModError::MissingRequiredPlugin {
                plugin: record.plugin.clone(),
                required: record.required.clone(),
                version: record.version.clone(),
            };
            let installed = self.registry.installed_registry().contains(&record.plugin);
            if self.config.fail_on_missing_required || !installed {
                return Err(err);
            }

            warn!("{}; uninstalling {}", err, record.plugin);
            let dropped = self.registry.forget_plugin(&record.plugin, &mut self.catalog);
            if !dropped.is_empty() {
                debug!("Dropped extendables of {}: {}", record.plugin, dropped.join(", "));
            }
            uninstalled.push(record.plugin);
        }
        Ok(uninstalled)
    }

    fn first_unmet(&self) -> Result<Option<DependencyRecord>, ModError> {
        for record in self.registry.requirements() {
            let met = self
                .registry
                .installed(&record.required, record.version.as_deref())?;
            debug!(
                "Mod {} requires {} (version: {})...{}",
                record.plugin,
                record.required,
                record.version.as_deref().unwrap_or("any"),
                if met { "ok" } else { "missing" }
            );
            if !met {
                return Ok(Some(record.clone()));
            }
        }
        Ok(None)
    }

    /// Run deferred callbacks whose mod is installed. Callbacks may defer
    /// further callbacks; those run in a following round.
    fn run_install_callbacks(&mut self) -> Result<usize, ModError> {
        let mut run = 0;
        loop {
            let pending = self.registry.take_pending();
            if pending.is_empty() {
                return Ok(run);
            }
            for callback in pending {
                if !self
                    .registry
                    .installed(&callback.name, callback.version.as_deref())?
                {
                    debug!(
                        "Skipping callback of {}: {} is not installed",
                        callback.owner, callback.name
                    );
                    continue;
                }
                let mut ctx =
                    ModContext::new(&mut self.registry, &mut self.catalog, &callback.owner);
                (callback.callback)(&mut ctx)?;
                run += 1;
            }
        }
    }

    pub fn models(&self) -> Result<&Models, ModError> {
        match self.state {
            InstallState::Composed => Ok(&self.models),
            _ => Err(ModError::NotComposed("models".to_string())),
        }
    }

    pub fn anchor(&self, name: &str) -> Option<Anchor> {
        self.registry.anchor(name).cloned()
    }

    /// Merged type of the named extendable object
    pub fn merged(&self, name: &str) -> Result<Arc<MergedType>, ModError> {
        self.registry
            .anchor(name)
            .ok_or_else(|| ModError::UnknownAnchor(name.to_string()))?
            .merged()
    }

    pub fn installed(&self, name: &str, version: Option<&str>) -> Result<bool, ModError> {
        self.registry.installed(name, version)
    }

    pub fn is_installed(&self, name: &str) -> bool {
        self.registry.installed_registry().contains(name)
    }

    pub fn installed_version(&self, name: &str) -> Option<&str> {
        self.registry.installed_registry().version(name).flatten()
    }

    /// Installed mods and their versions, in load order
    pub fn installed_mods(&self) -> Vec<(&str, Option<&str>)> {
        self.registry.installed_registry().iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::{FnPlugin, StaticSource};
    use crate::types::{Attr, AttrType, TypeDef};
    use crate::value::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config(fail: bool) -> ModsConfig {
        ModsConfig {
            installed: vec!["...".to_string()],
            fail_on_missing_required: fail,
            ..ModsConfig::default()
        }
    }

    fn with_topic(system: &mut ModSystem) {
        let topic = TypeDef::entity("Topic")
            .attr("id", Attr::primary_key(AttrType::int()))
            .build();
        system.core().declare_extendable(topic).unwrap();
    }

    fn needs_icons() -> FnPlugin {
        FnPlugin::new("private_message", |ctx| {
            ctx.require("icons", None);
            let message = TypeDef::entity("Message")
                .attr("id", Attr::primary_key(AttrType::int()))
                .build();
            ctx.declare_extendable(message)?;
            ctx.extend(
                "Topic",
                TypeDef::mixin("PrivateMessageModTopic")
                    .attr("pm_only", Attr::required(AttrType::Bool).default(false))
                    .build(),
            )
            .unwrap();
            Ok(())
        })
    }

    #[test]
    fn test_missing_requirement_uninstalls_dependent() {
        let mut system = ModSystem::new(config(false));
        with_topic(&mut system);
        let source = StaticSource::new().with(needs_icons());

        system.install(&source).unwrap();
        assert_eq!(system.state(), InstallState::Composed);
        assert_eq!(system.report().uninstalled, vec!["private_message".to_string()]);
        assert!(!system.is_installed("private_message"));
        assert!(system.anchor("Message").is_none());
        assert!(system.merged("Topic").unwrap().attr("pm_only").is_none());
    }

    #[test]
    fn test_missing_requirement_is_fatal_when_configured() {
        let mut system = ModSystem::new(config(true));
        with_topic(&mut system);
        let source = StaticSource::new().with(needs_icons());

        let err = system.install(&source).unwrap_err();
        assert_eq!(
            err.to_string(),
            "private_message requires 'icons', which was not found"
        );
        assert_eq!(system.state(), InstallState::PluginsLoaded);
        assert!(matches!(
            system.install(&source),
            Err(ModError::InvalidState(_))
        ));
    }

    #[test]
    fn test_uninstall_cascades() {
        let mut system = ModSystem::new(config(false));
        let source = StaticSource::new()
            .with(FnPlugin::new("a", |ctx| {
                ctx.require("b", None);
                Ok(())
            }))
            .with(FnPlugin::new("b", |ctx| {
                ctx.require("c", Some("2.0"));
                Ok(())
            }))
            .with(FnPlugin::new("c", |_| Ok(())).with_version("1.5"));

        system.install(&source).unwrap();
        assert_eq!(
            system.report().uninstalled,
            vec!["b".to_string(), "a".to_string()]
        );
        assert_eq!(system.installed_mods(), vec![("c", Some("1.5"))]);
    }

    #[test]
    fn test_callbacks_run_only_for_installed_mods() {
        static RUNS: AtomicUsize = AtomicUsize::new(0);
        let mut system = ModSystem::new(config(false));
        with_topic(&mut system);
        let source = StaticSource::new()
            .with(FnPlugin::new("icons", |_| Ok(())).with_version("1.0"))
            .with(FnPlugin::new("watcher", |ctx| {
                ctx.on_installed("icons", Some("1.0"), |ctx| {
                    RUNS.fetch_add(1, Ordering::SeqCst);
                    ctx.extend(
                        "Topic",
                        TypeDef::mixin("WatcherModTopic")
                            .method("watched", |_, _| Value::Bool(true))
                            .build(),
                    )
                    .unwrap();
                    ctx.on_installed("icons", None, |_| {
                        RUNS.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    });
                    Ok(())
                });
                ctx.on_installed("polls", None, |_| {
                    RUNS.fetch_add(100, Ordering::SeqCst);
                    Ok(())
                });
                Ok(())
            }));

        system.install(&source).unwrap();
        assert_eq!(RUNS.load(Ordering::SeqCst), 2);
        assert_eq!(system.report().callbacks_run, 2);
        assert!(system.merged("Topic").unwrap().has_method("watched"));
    }

    #[test]
    fn test_install_is_idempotent() {
        let mut system = ModSystem::new(config(false));
        with_topic(&mut system);
        let source = StaticSource::new().with(FnPlugin::new("icons", |_| Ok(())));
        let first = system.install(&source).unwrap().len();
        let second = system.install(&source).unwrap().len();
        assert_eq!(first, second);
        assert!(system.models().is_ok());
        assert!(system.installed("icons", None).unwrap());
    }

    #[test]
    fn test_debug_shows_state_and_installed_mods() {
        let mut system = ModSystem::new(config(false));
        assert!(format!("{:?}", system).contains("NotInitialized"));

        let source =
            StaticSource::new().with(FnPlugin::new("icons", |_| Ok(())).with_version("1.1"));
        system.install(&source).unwrap();
        let debug = format!("{:?}", system);
        assert!(debug.contains("Composed"), "{debug}");
        assert!(debug.contains("\"icons\""), "{debug}");
        assert!(debug.contains("\"1.1\""), "{debug}");
    }

    #[test]
    fn test_queries_before_install() {
        let mut system = ModSystem::new(config(false));
        with_topic(&mut system);
        assert!(matches!(
            system.merged("Topic"),
            Err(ModError::NotComposed(_))
        ));
        assert!(matches!(
            system.merged("Nope"),
            Err(ModError::UnknownAnchor(_))
        ));
        assert!(matches!(
            system.installed("icons", None),
            Err(ModError::PrematureInstalledCheck { .. })
        ));
        assert!(system.models().is_err());
    }
}
