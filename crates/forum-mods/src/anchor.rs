//! Stable handles for extendable objects
//!
//! An [`Anchor`] is handed out when an extendable object is declared and stays
//! valid for the life of the process. Until composition finishes it only
//! knows its root; afterwards it resolves to the merged type. Cloning an
//! anchor clones the handle, not the object.

use crate::errors::ModError;
use crate::merged::{MergedType, Record};
use crate::naming::extended_object_name;
use crate::registry::Installed;
use crate::types::TypeRef;
use crate::value::Value;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

struct AnchorInner {
    name: Arc<str>,
    catalog_name: Arc<str>,
    root: TypeRef,
    contributor: Arc<str>,
    bases: RwLock<Vec<TypeRef>>,
    merged: OnceCell<Arc<MergedType>>,
}

#[derive(Clone)]
pub struct Anchor {
    inner: Arc<AnchorInner>,
}

impl Anchor {
    pub(crate) fn new(name: &str, root: TypeRef, contributor: &str) -> Self {
        let catalog_name = extended_object_name(root.name());
        Anchor {
            inner: Arc::new(AnchorInner {
                name: Arc::from(name),
                catalog_name: Arc::from(catalog_name),
                bases: RwLock::new(vec![root.clone()]),
                root,
                contributor: Arc::from(contributor),
                merged: OnceCell::new(),
            }),
        }
    }

    /// Name the object was registered under
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Name of the anchor entity in the catalog
    pub fn catalog_name(&self) -> &str {
        &self.inner.catalog_name
    }

    pub fn root(&self) -> &TypeRef {
        &self.inner.root
    }

    /// Mod (or `core`) that declared the object
    pub fn contributor(&self) -> &str {
        &self.inner.contributor
    }

    /// Current direct bases: the root before composition, the accepted
    /// extensions afterwards
    pub fn bases(&self) -> Vec<TypeRef> {
        self.inner.bases.read().clone()
    }

    pub(crate) fn set_bases(&self, bases: Vec<TypeRef>) {
        *self.inner.bases.write() = bases;
    }

    pub fn is_composed(&self) -> bool {
        self.inner.merged.get().is_some()
    }

    /// The merged type, available once composition has finished
    pub fn merged(&self) -> Result<Arc<MergedType>, ModError> {
        self.inner
            .merged
            .get()
            .cloned()
            .ok_or_else(|| ModError::NotComposed(self.name().to_string()))
    }

    pub(crate) fn publish(&self, merged: Arc<MergedType>) {
        // First publication wins
        let _ = self.inner.merged.set(merged);
    }

    /// Instantiate the merged type
    pub fn instantiate<I, K, V>(&self, values: I) -> Result<Record, ModError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        self.merged()?.instantiate(values)
    }

    pub fn ptr_eq(&self, other: &Anchor) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn key(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }
}

impl fmt::Debug for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Anchor")
            .field("name", &self.name())
            .field("root", &self.root().name())
            .field("composed", &self.is_composed())
            .finish()
    }
}

/// How an extension names its target
#[derive(Debug, Clone)]
pub enum AnchorRef {
    Name(String),
    Handle(Anchor),
}

impl From<&str> for AnchorRef {
    fn from(name: &str) -> Self {
        AnchorRef::Name(name.to_string())
    }
}

impl From<String> for AnchorRef {
    fn from(name: String) -> Self {
        AnchorRef::Name(name)
    }
}

impl From<&Anchor> for AnchorRef {
    fn from(anchor: &Anchor) -> Self {
        AnchorRef::Handle(anchor.clone())
    }
}

impl From<Anchor> for AnchorRef {
    fn from(anchor: Anchor) -> Self {
        AnchorRef::Handle(anchor)
    }
}

impl fmt::Display for AnchorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnchorRef::Name(name) => write!(f, "{}", name),
            AnchorRef::Handle(anchor) => write!(f, "{}", anchor.name()),
        }
    }
}

/// Transform extension: given the root, return a type deriving from it, or
/// `None` to contribute nothing
pub type TransformFn = dyn Fn(&TypeRef, &Installed<'_>) -> Option<TypeRef> + Send + Sync;

#[derive(Clone)]
pub enum ExtensionPayload {
    /// Members re-parented onto the root at composition time
    Mixin(TypeRef),
    Transform(Arc<TransformFn>),
}

impl fmt::Debug for ExtensionPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtensionPayload::Mixin(ty) => write!(f, "Mixin({})", ty.name()),
            ExtensionPayload::Transform(_) => f.write_str("Transform(..)"),
        }
    }
}

/// One registered extension
#[derive(Debug, Clone)]
pub struct Extension {
    pub contributor: Arc<str>,
    pub payload: ExtensionPayload,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeDef;

    #[test]
    fn test_anchor_before_composition() {
        let root = TypeDef::entity("Topic").build();
        let anchor = Anchor::new("Topic", root.clone(), "core");
        assert_eq!(anchor.catalog_name(), "TopicExtended");
        assert!(!anchor.is_composed());
        assert_eq!(anchor.bases().len(), 1);
        assert!(Arc::ptr_eq(&anchor.bases()[0], &root));
        assert!(matches!(anchor.merged(), Err(ModError::NotComposed(name)) if name == "Topic"));
        assert!(anchor
            .instantiate(Vec::<(&str, Value)>::new())
            .is_err());
    }

    #[test]
    fn test_clones_share_identity() {
        let anchor = Anchor::new("Forum", TypeDef::entity("Forum").build(), "core");
        let other = anchor.clone();
        assert!(anchor.ptr_eq(&other));
        assert_eq!(anchor.key(), other.key());

        let unrelated = Anchor::new("Forum", TypeDef::entity("Forum").build(), "core");
        assert!(!anchor.ptr_eq(&unrelated));
    }
}
