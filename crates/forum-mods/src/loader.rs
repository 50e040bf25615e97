//! Discovery and ordered import of mods
//!
//! The configured load order is split at the first `...` marker: names before
//! it load first, names after it load last, and the marker itself stands for
//! every other discovered mod in alphabetical order. Without a marker only
//! the listed mods load.

use crate::catalog::Catalog;
use crate::context::ModContext;
use crate::errors::ModError;
use crate::plugin::PluginSource;
use crate::registry::ModRegistry;
use forum_config::{ModsConfig, LOAD_REST_MARKER};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Resolved load order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadPlan {
    pub first: Vec<String>,
    pub rest: Vec<String>,
    pub last: Vec<String>,
}

impl LoadPlan {
    pub fn new(ordered: &[String], disabled: &[String], discovered: &BTreeSet<String>) -> Self {
        let is_disabled = |name: &String| disabled.contains(name);
        let marker = ordered.iter().position(|name| name == LOAD_REST_MARKER);
        let (first, last) = match marker {
            Some(idx) => (&ordered[..idx], &ordered[idx + 1..]),
            None => (ordered, &ordered[..0]),
        };

        // Only the first marker splits; later ones are ignored
        let keep = |names: &[String]| -> Vec<String> {
            names
                .iter()
                .filter(|name| name.as_str() != LOAD_REST_MARKER && !is_disabled(name))
                .cloned()
                .collect()
        };
        let first = keep(first);
        let last = keep(last);

        let rest = if marker.is_some() {
            discovered
                .iter()
                .filter(|name| !ordered.contains(name) && !is_disabled(name))
                .cloned()
                .collect()
        } else {
            Vec::new()
        };

        LoadPlan { first, rest, last }
    }

    /// Names in the order they load
    pub fn sequence(&self) -> impl Iterator<Item = &str> {
        self.first
            .iter()
            .chain(&self.rest)
            .chain(&self.last)
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedMod {
    pub name: String,
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedMod {
    pub name: String,
    pub reason: String,
}

/// Outcome of a load pass
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub loaded: Vec<LoadedMod>,
    /// Listed in the load order but not discovered
    pub missing: Vec<String>,
    /// Discovered but disabled
    pub disabled: Vec<String>,
    /// Import aborted on an unmet requirement
    pub skipped: Vec<SkippedMod>,
}

impl LoadReport {
    pub fn loaded_names(&self) -> Vec<&str> {
        self.loaded.iter().map(|m| m.name.as_str()).collect()
    }
}

/// Discover and import every mod the configuration selects
///
/// Each import runs against a checkpoint; a failing import is rolled back so
/// it leaves no declarations behind. Does nothing when mods are already
/// installed.
pub fn discover_and_load(
    registry: &mut ModRegistry,
    catalog: &mut Catalog,
    source: &dyn PluginSource,
    config: &ModsConfig,
) -> Result<LoadReport, ModError> {
    let mut report = LoadReport::default();
    if !registry.installed_registry().is_empty() {
        debug!("Mods already loaded, skipping discovery");
        return Ok(report);
    }

    let discovered = source.discover()?;
    report.disabled = discovered
        .iter()
        .filter(|name| config.disabled.contains(name))
        .cloned()
        .collect();

    let plan = LoadPlan::new(&config.installed, &config.disabled, &discovered);
    for name in plan.sequence() {
        if !discovered.contains(name) {
            warn!("Mod '{}' is listed in the load order but was not found", name);
            report.missing.push(name.to_string());
            continue;
        }
        match load_mod(registry, catalog, source, name) {
            Ok(version) => {
                info!(
                    "Loaded mod {} ({})",
                    name,
                    version.as_deref().unwrap_or("unversioned")
                );
                report.loaded.push(LoadedMod {
                    name: name.to_string(),
                    version,
                });
            }
            Err(err) if err.is_missing_required() && !config.fail_on_missing_required => {
                warn!("Skipping mod {}: {}", name, err);
                report.skipped.push(SkippedMod {
                    name: name.to_string(),
                    reason: err.to_string(),
                });
            }
            Err(err) => return Err(err),
        }
    }
    Ok(report)
}

fn load_mod(
    registry: &mut ModRegistry,
    catalog: &mut Catalog,
    source: &dyn PluginSource,
    name: &str,
) -> Result<Option<String>, ModError> {
    let registry_checkpoint = registry.checkpoint();
    let catalog_checkpoint = catalog.checkpoint();

    let result = {
        let mut ctx = ModContext::new(registry, catalog, name);
        source.import(name, &mut ctx)
    };
    match result {
        Ok(version) => {
            registry.record_installed(name, version.clone());
            Ok(version)
        }
        Err(err) => {
            debug!("Rolling back declarations of {}", name);
            registry.rollback(registry_checkpoint);
            catalog.rollback(catalog_checkpoint);
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::{FnPlugin, StaticSource};
    use crate::types::{Attr, AttrType, TypeDef};

    fn strings(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn discovered(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_plan_splits_at_marker() {
        let plan = LoadPlan::new(
            &strings(&["a", "...", "z"]),
            &[],
            &discovered(&["z", "m", "a", "b"]),
        );
        let order: Vec<&str> = plan.sequence().collect();
        assert_eq!(order, vec!["a", "b", "m", "z"]);

        let plan = LoadPlan::new(
            &strings(&["b", "...", "a"]),
            &[],
            &discovered(&["a", "b", "c", "d"]),
        );
        let order: Vec<&str> = plan.sequence().collect();
        assert_eq!(order, vec!["b", "c", "d", "a"]);
    }

    #[test]
    fn test_plan_without_marker_loads_only_listed() {
        let plan = LoadPlan::new(
            &strings(&["b", "a"]),
            &[],
            &discovered(&["a", "b", "c"]),
        );
        let order: Vec<&str> = plan.sequence().collect();
        assert_eq!(order, vec!["b", "a"]);
    }

    #[test]
    fn test_plan_ignores_extra_markers_and_disabled() {
        let plan = LoadPlan::new(
            &strings(&["a", "...", "x", "...", "z"]),
            &strings(&["x", "m"]),
            &discovered(&["a", "b", "m", "x", "z"]),
        );
        let order: Vec<&str> = plan.sequence().collect();
        assert_eq!(order, vec!["a", "b", "z"]);
    }

    #[test]
    fn test_plan_keeps_missing_names_for_reporting() {
        let plan = LoadPlan::new(&strings(&["ghost"]), &[], &discovered(&["a"]));
        assert_eq!(plan.sequence().collect::<Vec<_>>(), vec!["ghost"]);
    }

    fn config(installed: &[&str], fail: bool) -> ModsConfig {
        ModsConfig {
            installed: strings(installed),
            fail_on_missing_required: fail,
            ..ModsConfig::default()
        }
    }

    #[test]
    fn test_failed_import_is_rolled_back() {
        let source = StaticSource::new()
            .with(FnPlugin::new("broken", |ctx| {
                let ghost = TypeDef::entity("Ghost")
                    .attr("id", Attr::primary_key(AttrType::int()))
                    .build();
                ctx.declare_extendable(ghost)?;
                ctx.ensure_installed("icons", None)
            }))
            .with(FnPlugin::new("ok", |_| Ok(())).with_version("1.0"));
        let mut registry = ModRegistry::new();
        let mut catalog = Catalog::new();

        let report = discover_and_load(
            &mut registry,
            &mut catalog,
            &source,
            &config(&["..."], false),
        )
        .unwrap();

        assert_eq!(report.loaded_names(), vec!["ok"]);
        assert_eq!(report.skipped.len(), 1);
        assert!(registry.anchor("Ghost").is_none());
        assert!(!catalog.contains("Ghost"));
        assert!(!registry.installed_registry().contains("broken"));
    }

    #[test]
    fn test_missing_requirement_is_fatal_when_configured() {
        let source = StaticSource::new().with(FnPlugin::new("broken", |ctx| {
            ctx.ensure_installed("icons", None)
        }));
        let mut registry = ModRegistry::new();
        let mut catalog = Catalog::new();
        let err = discover_and_load(
            &mut registry,
            &mut catalog,
            &source,
            &config(&["..."], true),
        )
        .unwrap_err();
        assert!(err.is_missing_required());
    }

    #[test]
    fn test_other_errors_are_fatal() {
        let source = StaticSource::new().with(FnPlugin::new("broken", |ctx| {
            Err(ModError::Plugin {
                plugin: ctx.plugin().to_string(),
                message: "boom".to_string(),
            })
        }));
        let mut registry = ModRegistry::new();
        let mut catalog = Catalog::new();
        assert!(discover_and_load(
            &mut registry,
            &mut catalog,
            &source,
            &config(&["..."], false),
        )
        .is_err());
    }

    #[test]
    fn test_load_is_idempotent_and_reports_missing() {
        let source = StaticSource::new().with(FnPlugin::new("icons", |_| Ok(())));
        let mut registry = ModRegistry::new();
        let mut catalog = Catalog::new();
        let cfg = config(&["ghost", "..."], false);

        let report = discover_and_load(&mut registry, &mut catalog, &source, &cfg).unwrap();
        assert_eq!(report.missing, vec!["ghost".to_string()]);
        assert_eq!(report.loaded_names(), vec!["icons"]);

        let again = discover_and_load(&mut registry, &mut catalog, &source, &cfg).unwrap();
        assert!(again.loaded.is_empty());
        assert_eq!(registry.installed_registry().len(), 1);
    }
}
