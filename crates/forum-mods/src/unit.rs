//! Declarative mod units and the mod directory
//!
//! A mod directory holds one `<name>.toml` unit per mod. `mod.toml` is
//! reserved for the directory itself and is never loaded as a mod.
//!
//! ```toml
//! version = "1.0"
//!
//! [[requires]]
//! name = "icons"
//!
//! [[extendable]]
//! name = "Message"
//! table = "forum_messages"
//! attrs.id = { kind = "primary_key", type = "int" }
//!
//! [[extend]]
//! target = "Topic"
//! name = "PinnedModTopic"
//! attrs.pinned = { kind = "required", type = "bool", default = false }
//! ```
//!
//! A unit may be backed by compiled code: when the directory source links a
//! [`Plugin`](crate::plugin::Plugin) of the same name, it installs right after
//! the unit's declarations.

use crate::context::ModContext;
use crate::errors::ModError;
use crate::plugin::{PluginSource, StaticSource, PACKAGE_MARKER};
use crate::types::{Attr, AttrKind, AttrType, TypeBuilder, TypeDef};
use crate::value::Value;
use crate::version::parse_version;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModUnit {
    pub version: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub requires: Vec<RequirementDecl>,
    #[serde(default)]
    pub extendable: Vec<ObjectDecl>,
    #[serde(default)]
    pub extend: Vec<ExtensionDecl>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequirementDecl {
    pub name: String,
    pub version: Option<String>,
}

#[derive(Debug, Default, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    #[default]
    Entity,
    Choices,
}

/// An extendable object declared by the unit
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObjectDecl {
    pub name: String,
    #[serde(default)]
    pub kind: ObjectKind,
    pub table: Option<String>,
    /// Registration name, when it differs from `name`
    pub register_as: Option<String>,
    #[serde(default)]
    pub attrs: toml::Table,
    #[serde(default)]
    pub constants: toml::Table,
}

/// An extension of another object
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtensionDecl {
    pub target: String,
    pub name: String,
    /// Only contribute when this mod is installed
    pub when_installed: Option<String>,
    pub min_version: Option<String>,
    #[serde(default)]
    pub attrs: toml::Table,
    #[serde(default)]
    pub constants: toml::Table,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AttrDecl {
    kind: AttrKind,
    #[serde(rename = "type")]
    ty: String,
    column: Option<String>,
    default: Option<toml::Value>,
    #[serde(default)]
    default_now: bool,
    reverse: Option<String>,
    max_len: Option<u32>,
    size: Option<u8>,
}

impl ModUnit {
    pub fn parse(unit: &str, content: &str) -> Result<Self, ModError> {
        toml::from_str(content).map_err(|source| ModError::UnitParse {
            unit: unit.to_string(),
            source,
        })
    }

    /// Register the unit's declarations through `ctx`
    pub fn apply(&self, unit: &str, ctx: &mut ModContext<'_>) -> Result<(), ModError> {
        if let Some(version) = &self.version {
            parse_version(version)?;
        }

        for requirement in &self.requires {
            ctx.require(&requirement.name, requirement.version.as_deref());
        }

        for object in &self.extendable {
            let builder = match object.kind {
                ObjectKind::Entity => {
                    let builder = TypeDef::entity(&object.name);
                    match &object.table {
                        Some(table) => builder.table(table),
                        None => builder,
                    }
                }
                ObjectKind::Choices => TypeDef::choices(&object.name),
            };
            let builder = with_members(
                unit,
                &object.name,
                builder,
                &object.attrs,
                &object.constants,
            )?;
            match &object.register_as {
                Some(name) => ctx.declare_extendable_as(builder.build(), name)?,
                None => ctx.declare_extendable(builder.build())?,
            };
        }

        for extension in &self.extend {
            let builder = with_members(
                unit,
                &extension.name,
                TypeDef::mixin(&extension.name),
                &extension.attrs,
                &extension.constants,
            )?;
            let mixin = builder.build();
            match &extension.when_installed {
                None => {
                    ctx.extend(extension.target.as_str(), mixin)?;
                }
                Some(dependency) => {
                    let dependency = dependency.clone();
                    let minimum = extension.min_version.clone();
                    ctx.extend_with(extension.target.as_str(), move |root, installed| {
                        installed
                            .satisfies(&dependency, minimum.as_deref())
                            .then(|| mixin.reparent(root))
                    })?;
                }
            }
        }
        Ok(())
    }
}

fn with_members(
    unit: &str,
    owner: &str,
    mut builder: TypeBuilder,
    attrs: &toml::Table,
    constants: &toml::Table,
) -> Result<TypeBuilder, ModError> {
    let invalid = |member: &str, reason: String| ModError::InvalidUnit {
        unit: unit.to_string(),
        reason: format!("{}.{}: {}", owner, member, reason),
    };

    for (name, raw) in attrs {
        let decl: AttrDecl = raw
            .clone()
            .try_into()
            .map_err(|err: toml::de::Error| invalid(name, err.message().to_string()))?;
        let ty = attr_type(&decl).map_err(|reason| invalid(name, reason))?;
        let mut attr = match decl.kind {
            AttrKind::PrimaryKey => Attr::primary_key(ty),
            AttrKind::Required => Attr::required(ty),
            AttrKind::Optional => Attr::optional(ty),
            AttrKind::Set => Attr::set(&decl.ty),
        };
        if let Some(column) = &decl.column {
            attr = attr.column(column);
        }
        if let Some(reverse) = &decl.reverse {
            attr = attr.reverse(reverse);
        }
        if let Some(default) = decl.default {
            attr = attr.default(Value::try_from(default).map_err(|reason| invalid(name, reason))?);
        } else if decl.default_now {
            attr = attr.default_now();
        }
        builder = builder.attr(name, attr);
    }

    for (name, raw) in constants {
        let value = Value::try_from(raw.clone()).map_err(|reason| invalid(name, reason))?;
        builder = builder.constant(name, value);
    }
    Ok(builder)
}

/// Scalar names are lowercase; anything else must name an entity
fn attr_type(decl: &AttrDecl) -> Result<AttrType, String> {
    let ty = AttrType::parse(&decl.ty, decl.max_len, decl.size);
    let names_entity = decl
        .ty
        .chars()
        .next()
        .is_some_and(|first| first.is_ascii_uppercase());
    match ty {
        AttrType::Entity(_) if !names_entity => Err(format!(
            "unknown type '{}' (expected bool, int, float, str, long_str, datetime or an entity name)",
            decl.ty
        )),
        AttrType::Entity(_) => Ok(ty),
        _ if decl.kind == AttrKind::Set => {
            Err(format!("a set must hold an entity, not '{}'", decl.ty))
        }
        _ => Ok(ty),
    }
}

/// Mods described by TOML units in a directory
pub struct DirectorySource {
    dir: PathBuf,
    linked: StaticSource,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        DirectorySource {
            dir: dir.into(),
            linked: StaticSource::new(),
        }
    }

    /// Compiled plugins that back units of the same name
    pub fn with_linked(mut self, linked: StaticSource) -> Self {
        self.linked = linked;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn unit_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.toml", name))
    }

    pub fn read_unit(&self, name: &str) -> Result<ModUnit, ModError> {
        let content = fs::read_to_string(self.unit_path(name))?;
        ModUnit::parse(name, &content)
    }
}

impl PluginSource for DirectorySource {
    fn discover(&self) -> Result<BTreeSet<String>, ModError> {
        if !self.dir.is_dir() {
            warn!("Mod directory {} does not exist", self.dir.display());
            return Ok(BTreeSet::new());
        }

        let names: BTreeSet<String> = WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "toml"))
            .filter_map(|e| {
                e.path()
                    .file_stem()
                    .and_then(|stem| stem.to_str())
                    .map(String::from)
            })
            .filter(|name| name != PACKAGE_MARKER)
            .collect();
        debug!("Discovered {} mods in {}", names.len(), self.dir.display());
        Ok(names)
    }

    fn import(&self, name: &str, ctx: &mut ModContext<'_>) -> Result<Option<String>, ModError> {
        let unit = self.read_unit(name)?;
        unit.apply(name, ctx)?;

        let linked_version = match self.linked.get(name) {
            Some(plugin) => {
                plugin.install(ctx)?;
                plugin.version().map(String::from)
            }
            None => None,
        };
        Ok(unit.version.or(linked_version))
    }
}
