//! Forum mod extension system
//!
//! The application declares *extendable objects* (entities, Choices) and mods
//! contribute extensions to them. Once every mod has loaded, each extendable
//! object is composed from its root and the accepted extensions, the entity
//! catalog is repaired to match, and the merged types become reachable through
//! the [`Anchor`] handles handed out at declaration time.
//!
//! ```ignore
//! let mut system = ModSystem::new(config.mods.clone());
//! let topic = system.core().declare_extendable(topic_def)?;
//! system.install(&DirectorySource::new(mods_dir).with_linked(builtins))?;
//! let record = topic.instantiate([("title", "Hello")])?;
//! ```

pub mod anchor;
pub mod catalog;
pub mod compose;
pub mod context;
pub mod errors;
pub mod installer;
pub mod linearize;
pub mod loader;
pub mod merged;
pub mod naming;
pub mod plugin;
pub mod registry;
pub mod types;
pub mod unit;
pub mod value;
pub mod version;

pub use anchor::{Anchor, AnchorRef};
pub use catalog::{Catalog, EntityMeta};
pub use compose::Models;
pub use context::ModContext;
pub use errors::{MappingError, ModError};
pub use installer::{InstallReport, InstallState, ModSystem};
pub use loader::{LoadPlan, LoadReport};
pub use merged::{MergedType, Record};
pub use plugin::{FnPlugin, Plugin, PluginSource, StaticSource};
pub use registry::{Installed, CORE_CONTRIBUTOR};
pub use types::{Attr, AttrKind, AttrType, TypeDef, TypeKind, TypeRef};
pub use unit::{DirectorySource, ModUnit};
pub use value::Value;
