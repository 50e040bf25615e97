//! Composition of extendable objects
//!
//! For every anchor, in declaration order, the registered extensions are
//! turned into candidate bases (mixins are re-parented onto the root,
//! transforms are called with the root). The candidates become the anchor's
//! bases, the catalog entry of the anchor is repaired, and the merged type is
//! built. The mapping is generated once every anchor is composed; only then
//! are the merged types published through their anchors.

use crate::anchor::{Anchor, Extension, ExtensionPayload};
use crate::catalog::Catalog;
use crate::errors::ModError;
use crate::linearize::linearize;
use crate::merged::MergedType;
use crate::naming::temp_object_name;
use crate::registry::{Installed, ModRegistry};
use crate::types::TypeDef;
use std::sync::Arc;
use tracing::{debug, info};

/// The composed types, in declaration order
#[derive(Debug, Clone, Default)]
pub struct Models {
    types: Vec<Arc<MergedType>>,
}

impl Models {
    fn from_anchors(anchors: &[Anchor]) -> Self {
        Models {
            types: anchors.iter().filter_map(|anchor| anchor.merged().ok()).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<MergedType>> {
        self.types.iter().find(|ty| ty.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<MergedType>> {
        self.types.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.types.iter().map(|ty| ty.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Compose every extendable object and finalize the catalog
///
/// A second call returns the already published models.
pub fn compose_all(registry: &mut ModRegistry, catalog: &mut Catalog) -> Result<Models, ModError> {
    if registry.is_composed() {
        return Ok(Models::from_anchors(registry.anchors()));
    }
    let anchors = registry.anchors().to_vec();
    let mut built = Vec::with_capacity(anchors.len());
    for anchor in &anchors {
        let extensions = registry.extensions_for(anchor);
        let mut attempted = Vec::new();
        let merged = compose_anchor(
            anchor,
            &extensions,
            registry.installed_view(),
            catalog,
            &mut attempted,
        )
        .map_err(|source| ModError::Composition {
            anchor: anchor.name().to_string(),
            bases: attempted.clone(),
            source: Box::new(source),
        })?;
        built.push((anchor, Arc::new(merged)));
    }

    registry.clear_extensions();
    catalog.generate_mapping()?;

    for (anchor, merged) in &built {
        anchor.publish(merged.clone());
    }
    registry.mark_composed();
    info!("Composed {} extendable objects", built.len());
    Ok(Models {
        types: built.into_iter().map(|(_, merged)| merged).collect(),
    })
}

fn compose_anchor(
    anchor: &Anchor,
    extensions: &[Extension],
    installed: Installed<'_>,
    catalog: &mut Catalog,
    attempted: &mut Vec<String>,
) -> Result<MergedType, ModError> {
    let root = anchor.root();
    let mut bases = Vec::with_capacity(extensions.len());

    for extension in extensions {
        let candidate = match &extension.payload {
            ExtensionPayload::Mixin(mixin) => Some(mixin.reparent(root)),
            ExtensionPayload::Transform(transform) => transform(root, &installed),
        };
        let Some(candidate) = candidate else {
            debug!(
                "{} contributes nothing to {}",
                extension.contributor,
                anchor.name()
            );
            continue;
        };
        attempted.push(candidate.name().to_string());

        if !linearize(&candidate)?
            .iter()
            .any(|ty| Arc::ptr_eq(ty, root))
        {
            return Err(ModError::Plugin {
                plugin: extension.contributor.to_string(),
                message: format!(
                    "extension {} of {} does not derive from {}",
                    candidate.name(),
                    anchor.name(),
                    root.name()
                ),
            });
        }
        if candidate.is_entity() {
            catalog.ensure_defined(&candidate)?;
        }
        bases.push(candidate);
    }

    if !bases.is_empty() {
        debug!(
            "Extending {} with [{}]",
            anchor.name(),
            bases.iter().map(|b| b.name()).collect::<Vec<_>>().join(", ")
        );
        anchor.set_bases(bases.clone());
        if root.is_entity() {
            let temp = TypeDef::shell(
                &temp_object_name(anchor.name()),
                root.kind().derived(),
                bases,
            );
            catalog.repair(anchor.catalog_name(), &temp)?;
        }
    }
    MergedType::build(anchor, catalog)
}
