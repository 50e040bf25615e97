//! In-memory entity catalog
//!
//! The catalog plays the part of the storage-mapping layer: every entity type
//! is defined here once, receives a creation id, and gets its attribute
//! layout computed from its ancestors. `generate_mapping` finalizes the
//! catalog and validates relationships and column assignments.
//!
//! Anchors are defined before any extension exists, so once composition picks
//! their real bases the anchor entry is stale. [`Catalog::repair`] recomputes
//! it through a throwaway entity and copies the result over, leaving the
//! anchor's name and identity in place.

use crate::errors::{MappingError, ModError};
use crate::linearize::linearize;
use crate::types::{Attr, AttrKind, TypeRef};
use ahash::AHashMap;
use smallvec::SmallVec;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, trace};

/// An attribute as laid out on an entity
#[derive(Debug, Clone, PartialEq)]
pub struct AttrMeta {
    pub name: Arc<str>,
    /// Entity that declared the attribute
    pub owner: Arc<str>,
    pub attr: Attr,
}

impl AttrMeta {
    pub fn column(&self) -> Option<&str> {
        self.attr
            .has_column()
            .then(|| self.attr.column_name(&self.name))
    }

    fn qualified(&self) -> String {
        format!("{}.{}", self.owner, self.name)
    }
}

/// Catalog metadata of one entity
#[derive(Debug, Clone)]
pub struct EntityMeta {
    pub name: Arc<str>,
    /// Creation sequence number
    pub id: u64,
    /// Table shared by the whole hierarchy
    pub table: Arc<str>,
    /// Hierarchy root
    pub root: Arc<str>,
    pub attrs: Vec<AttrMeta>,
    pub adict: AHashMap<Arc<str>, usize>,
    pub base_attrs: Vec<AttrMeta>,
    pub new_attrs: Vec<AttrMeta>,
    /// Entity ancestors in resolution order
    pub all_bases: SmallVec<[Arc<str>; 4]>,
    pub direct_bases: SmallVec<[Arc<str>; 4]>,
}

impl EntityMeta {
    pub fn attr(&self, name: &str) -> Option<&AttrMeta> {
        self.adict.get(name).map(|&idx| &self.attrs[idx])
    }

    pub fn columns(&self) -> Vec<&str> {
        self.attrs.iter().filter_map(AttrMeta::column).collect()
    }

    /// Whether this entity is `name` or derives from it
    pub fn is_a(&self, name: &str) -> bool {
        &*self.name == name || self.all_bases.iter().any(|base| &**base == name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entities: AHashMap<Arc<str>, EntityMeta>,
    defs: AHashMap<Arc<str>, TypeRef>,
    subclasses: AHashMap<Arc<str>, BTreeSet<Arc<str>>>,
    next_id: u64,
    mapped: bool,
}

/// Snapshot taken before a mod is imported
pub struct CatalogCheckpoint(Catalog);

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&EntityMeta> {
        self.entities.get(name)
    }

    /// Entities in creation order
    pub fn entities(&self) -> Vec<&EntityMeta> {
        let mut all: Vec<&EntityMeta> = self.entities.values().collect();
        all.sort_by_key(|meta| meta.id);
        all
    }

    pub fn subclasses(&self, name: &str) -> Vec<&str> {
        self.subclasses
            .get(name)
            .map(|set| set.iter().map(|s| &**s).collect())
            .unwrap_or_default()
    }

    pub fn is_mapped(&self) -> bool {
        self.mapped
    }

    /// Define a new entity. Its entity ancestors must already be defined.
    pub fn define(&mut self, def: &TypeRef) -> Result<(), ModError> {
        if self.entities.contains_key(def.name()) {
            return Err(MappingError::DuplicateEntity(def.name().to_string()).into());
        }

        let order = linearize(def)?;
        let mut ancestors: Vec<&EntityMeta> = Vec::new();
        for ty in order.iter().skip(1).filter(|ty| ty.is_entity()) {
            let meta = self
                .entities
                .get(ty.name())
                .ok_or_else(|| MappingError::UnknownEntity(ty.name().to_string()))?;
            ancestors.push(meta);
        }

        let name = def.name_arc().clone();
        let own: Vec<AttrMeta> = def
            .attrs()
            .iter()
            .map(|(attr_name, attr)| AttrMeta {
                name: attr_name.clone(),
                owner: name.clone(),
                attr: attr.clone(),
            })
            .collect();

        // Resolution order decides which declaration wins
        let mut winners: AHashMap<&str, &AttrMeta> = AHashMap::new();
        for attr in own
            .iter()
            .chain(ancestors.iter().flat_map(|meta| meta.new_attrs.iter()))
        {
            winners.entry(&*attr.name).or_insert(attr);
        }

        // Creation order decides the layout
        let mut by_creation = ancestors.clone();
        by_creation.sort_by_key(|meta| meta.id);
        let mut attrs: Vec<AttrMeta> = Vec::new();
        let mut adict: AHashMap<Arc<str>, usize> = AHashMap::new();
        for attr in by_creation
            .iter()
            .flat_map(|meta| meta.new_attrs.iter())
            .chain(own.iter())
        {
            if adict.contains_key(&attr.name) {
                continue;
            }
            if let Some(winner) = winners.get(&*attr.name) {
                adict.insert(attr.name.clone(), attrs.len());
                attrs.push((*winner).clone());
            }
        }

        let base_attrs = attrs
            .iter()
            .filter(|attr| attr.owner != name)
            .cloned()
            .collect();
        let (table, root) = match ancestors.last() {
            Some(root_meta) => (root_meta.table.clone(), root_meta.root.clone()),
            None => (
                def.table()
                    .map_or_else(|| Arc::from(def.name().to_lowercase()), Arc::from),
                name.clone(),
            ),
        };
        let all_bases: SmallVec<[Arc<str>; 4]> =
            ancestors.iter().map(|meta| meta.name.clone()).collect();
        let direct_bases = def
            .bases()
            .iter()
            .filter(|base| base.is_entity())
            .map(|base| base.name_arc().clone())
            .collect();

        let meta = EntityMeta {
            name: name.clone(),
            id: self.next_id,
            table,
            root,
            attrs,
            adict,
            base_attrs,
            new_attrs: own,
            all_bases,
            direct_bases,
        };
        self.next_id += 1;

        for base in &meta.all_bases {
            self.subclasses
                .entry(base.clone())
                .or_default()
                .insert(name.clone());
        }
        trace!("Defined entity {} (id {}) on table {}", name, meta.id, meta.table);
        self.entities.insert(name.clone(), meta);
        self.defs.insert(name, def.clone());
        Ok(())
    }

    /// Define `def` and any of its entity ancestors that are not defined yet
    ///
    /// A different definition already holding the same name is a duplicate.
    pub fn ensure_defined(&mut self, def: &TypeRef) -> Result<(), ModError> {
        match self.defs.get(def.name()) {
            Some(existing) if Arc::ptr_eq(existing, def) => return Ok(()),
            Some(_) => {
                return Err(MappingError::DuplicateEntity(def.name().to_string()).into());
            }
            None => {}
        }
        for base in def.bases().iter().filter(|base| base.is_entity()) {
            self.ensure_defined(base)?;
        }
        self.define(def)
    }

    /// Recompute the metadata of `anchor` from a throwaway entity with the
    /// anchor's final bases, then delete the throwaway entity
    pub fn repair(&mut self, anchor: &str, temp: &TypeRef) -> Result<(), ModError> {
        if !self.entities.contains_key(anchor) {
            return Err(MappingError::UnknownEntity(anchor.to_string()).into());
        }
        self.ensure_defined(temp)?;
        let fresh = self
            .remove(temp.name())
            .ok_or_else(|| MappingError::UnknownEntity(temp.name().to_string()))?;

        let live = self
            .entities
            .get_mut(anchor)
            .ok_or_else(|| MappingError::UnknownEntity(anchor.to_string()))?;
        let previous = std::mem::replace(&mut live.all_bases, fresh.all_bases);
        live.id = fresh.id;
        live.table = fresh.table;
        live.root = fresh.root;
        live.attrs = fresh.attrs;
        live.adict = fresh.adict;
        live.base_attrs = fresh.base_attrs;
        live.new_attrs = fresh.new_attrs;
        live.direct_bases = fresh.direct_bases;
        let anchor_name = live.name.clone();
        let current = live.all_bases.clone();

        for base in &current {
            self.subclasses
                .entry(base.clone())
                .or_default()
                .insert(anchor_name.clone());
        }
        for base in previous.iter().filter(|base| !current.contains(base)) {
            if let Some(set) = self.subclasses.get_mut(base) {
                set.remove(&anchor_name);
            }
        }
        debug!(
            "Repaired {} with bases [{}]",
            anchor_name,
            current.iter().map(|b| &**b).collect::<Vec<_>>().join(", ")
        );
        Ok(())
    }

    fn remove(&mut self, name: &str) -> Option<EntityMeta> {
        let meta = self.entities.remove(name)?;
        self.defs.remove(name);
        self.subclasses.remove(name);
        for set in self.subclasses.values_mut() {
            set.remove(name);
        }
        Some(meta)
    }

    /// Drop entities, for instance those of an uninstalled mod
    pub fn forget(&mut self, names: &[&str]) {
        for name in names {
            if self.remove(name).is_some() {
                debug!("Removed entity {} from catalog", name);
            }
        }
    }

    pub fn checkpoint(&self) -> CatalogCheckpoint {
        CatalogCheckpoint(self.clone())
    }

    pub fn rollback(&mut self, checkpoint: CatalogCheckpoint) {
        *self = checkpoint.0;
    }

    /// Finalize the catalog, validating relationships and columns
    pub fn generate_mapping(&mut self) -> Result<(), MappingError> {
        let entities = self.entities();
        for meta in &entities {
            for attr in &meta.new_attrs {
                self.check_relationship(meta, attr)?;
            }
        }

        let mut columns: AHashMap<(&str, &str), &AttrMeta> = AHashMap::new();
        for meta in &entities {
            for attr in &meta.new_attrs {
                let Some(column) = attr.column() else {
                    continue;
                };
                match columns.get(&(&*meta.table, column)) {
                    Some(first) if first.name != attr.name => {
                        return Err(MappingError::DuplicateColumn {
                            table: meta.table.to_string(),
                            column: column.to_string(),
                            first: first.qualified(),
                            second: attr.qualified(),
                        });
                    }
                    Some(_) => {}
                    None => {
                        columns.insert((&*meta.table, column), attr);
                    }
                }
            }
        }

        self.mapped = true;
        debug!("Mapping generated for {} entities", self.entities.len());
        Ok(())
    }

    fn check_relationship(&self, meta: &EntityMeta, attr: &AttrMeta) -> Result<(), MappingError> {
        let Some(target) = attr.attr.target() else {
            return Ok(());
        };
        let target_meta = self.get(target).ok_or_else(|| MappingError::UnknownTarget {
            entity: meta.name.to_string(),
            attr: attr.name.to_string(),
            target: target.to_string(),
        })?;
        let points_back = |candidate: &AttrMeta| {
            candidate
                .attr
                .target()
                .is_some_and(|back| meta.is_a(back))
        };
        let not_found = || MappingError::ReverseNotFound {
            entity: meta.name.to_string(),
            attr: attr.name.to_string(),
            target: target.to_string(),
        };

        let reverse = match attr.attr.reverse.as_deref() {
            Some(reverse) => {
                let candidate = target_meta.attr(reverse).ok_or_else(not_found)?;
                let agrees = candidate
                    .attr
                    .reverse
                    .as_deref()
                    .map_or(true, |back| back == &*attr.name);
                if !points_back(candidate) || !agrees {
                    return Err(MappingError::ReverseMismatch {
                        entity: meta.name.to_string(),
                        attr: attr.name.to_string(),
                        target: target.to_string(),
                        reverse: reverse.to_string(),
                    });
                }
                candidate
            }
            None => {
                let candidates: Vec<&AttrMeta> = target_meta
                    .attrs
                    .iter()
                    .filter(|candidate| points_back(*candidate))
                    .filter(|candidate| {
                        candidate
                            .attr
                            .reverse
                            .as_deref()
                            .map_or(true, |back| back == &*attr.name)
                    })
                    .filter(|candidate| {
                        !(candidate.owner == attr.owner && candidate.name == attr.name)
                    })
                    .collect();
                match candidates.as_slice() {
                    [] => return Err(not_found()),
                    [only] => *only,
                    many => {
                        return Err(MappingError::AmbiguousReverse {
                            entity: meta.name.to_string(),
                            attr: attr.name.to_string(),
                            target: target.to_string(),
                            candidates: many
                                .iter()
                                .map(|c| c.name.to_string())
                                .collect::<Vec<_>>()
                                .join(", "),
                        });
                    }
                }
            }
        };

        if attr.attr.kind == AttrKind::Required && reverse.attr.kind == AttrKind::Required {
            return Err(MappingError::BothRequired {
                entity: meta.name.to_string(),
                attr: attr.name.to_string(),
                target: target.to_string(),
                reverse: reverse.name.to_string(),
            });
        }
        Ok(())
    }
}
