//! Type definitions for extendable objects and their extensions
//!
//! A [`TypeDef`] is an explicit member table (attributes, Choices constants,
//! methods) plus an ordered list of base types. Definitions are immutable once
//! built and shared as [`TypeRef`]; the composition engine never mutates a
//! definition, it builds new ones.

use crate::merged::Record;
use crate::naming::extended_object_name_pretty;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub type TypeRef = Arc<TypeDef>;

/// What a type maps to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeKind {
    /// Storage-mapped entity. The table is only set on hierarchy roots.
    Entity { table: Option<Arc<str>> },
    /// Named constants (an enumeration that mods may add members to)
    Choices,
    /// Plain member holder; becomes the root's kind when re-parented
    Mixin,
}

impl TypeKind {
    /// Kind of a type deriving from a type of this kind
    pub fn derived(&self) -> TypeKind {
        match self {
            TypeKind::Entity { .. } => TypeKind::Entity { table: None },
            other => other.clone(),
        }
    }

    pub fn is_entity(&self) -> bool {
        matches!(self, TypeKind::Entity { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttrKind {
    PrimaryKey,
    Required,
    Optional,
    Set,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrType {
    Bool,
    Int { size: Option<u8> },
    Float,
    Str { max_len: Option<u32> },
    LongStr,
    DateTime,
    /// Relationship to another entity, by catalog name
    Entity(Arc<str>),
}

impl AttrType {
    pub fn int() -> Self {
        AttrType::Int { size: None }
    }

    pub fn str() -> Self {
        AttrType::Str { max_len: None }
    }

    pub fn entity(name: &str) -> Self {
        AttrType::Entity(Arc::from(name))
    }

    /// Parse a type name as written in mod units; anything that is not a
    /// scalar name is taken as an entity reference
    pub fn parse(name: &str, max_len: Option<u32>, size: Option<u8>) -> Self {
        match name {
            "bool" => AttrType::Bool,
            "int" => AttrType::Int { size },
            "float" => AttrType::Float,
            "str" => AttrType::Str { max_len },
            "long_str" => AttrType::LongStr,
            "datetime" => AttrType::DateTime,
            other => AttrType::Entity(Arc::from(other)),
        }
    }
}

impl fmt::Display for AttrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrType::Bool => write!(f, "bool"),
            AttrType::Int { size: Some(size) } => write!(f, "int({})", size),
            AttrType::Int { size: None } => write!(f, "int"),
            AttrType::Float => write!(f, "float"),
            AttrType::Str { max_len: Some(len) } => write!(f, "str({})", len),
            AttrType::Str { max_len: None } => write!(f, "str"),
            AttrType::LongStr => write!(f, "long_str"),
            AttrType::DateTime => write!(f, "datetime"),
            AttrType::Entity(name) => write!(f, "{}", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttrDefault {
    Value(Value),
    /// Current UTC time at instantiation
    Now,
}

impl AttrDefault {
    pub fn resolve(&self) -> Value {
        match self {
            AttrDefault::Value(value) => value.clone(),
            AttrDefault::Now => Value::Timestamp(chrono::Utc::now()),
        }
    }
}

/// A declared attribute (column or relationship)
#[derive(Debug, Clone, PartialEq)]
pub struct Attr {
    pub kind: AttrKind,
    pub ty: AttrType,
    pub column: Option<Arc<str>>,
    pub default: Option<AttrDefault>,
    pub reverse: Option<Arc<str>>,
}

impl Attr {
    fn new(kind: AttrKind, ty: AttrType) -> Self {
        Attr {
            kind,
            ty,
            column: None,
            default: None,
            reverse: None,
        }
    }

    pub fn primary_key(ty: AttrType) -> Self {
        Self::new(AttrKind::PrimaryKey, ty)
    }

    pub fn required(ty: AttrType) -> Self {
        Self::new(AttrKind::Required, ty)
    }

    pub fn optional(ty: AttrType) -> Self {
        Self::new(AttrKind::Optional, ty)
    }

    /// To-many side of a relationship
    pub fn set(target: &str) -> Self {
        Self::new(AttrKind::Set, AttrType::entity(target))
    }

    pub fn column(mut self, column: &str) -> Self {
        self.column = Some(Arc::from(column));
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(AttrDefault::Value(value.into()));
        self
    }

    pub fn default_now(mut self) -> Self {
        self.default = Some(AttrDefault::Now);
        self
    }

    pub fn reverse(mut self, reverse: &str) -> Self {
        self.reverse = Some(Arc::from(reverse));
        self
    }

    /// Target entity of a relationship attribute
    pub fn target(&self) -> Option<&str> {
        match &self.ty {
            AttrType::Entity(name) => Some(name),
            _ => None,
        }
    }

    /// Set attributes live on the other table (or a link table)
    pub fn has_column(&self) -> bool {
        self.kind != AttrKind::Set
    }

    pub fn column_name<'a>(&'a self, attr_name: &'a str) -> &'a str {
        self.column.as_deref().unwrap_or(attr_name)
    }
}

pub type MethodFn = dyn Fn(&Record, &[Value]) -> Value + Send + Sync;

/// A method contributed to a type
#[derive(Clone)]
pub struct Method(Arc<MethodFn>);

impl Method {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Record, &[Value]) -> Value + Send + Sync + 'static,
    {
        Method(Arc::new(f))
    }

    pub fn call(&self, record: &Record, args: &[Value]) -> Value {
        (self.0)(record, args)
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Method(..)")
    }
}

#[derive(Debug)]
pub struct TypeDef {
    name: Arc<str>,
    kind: TypeKind,
    bases: Vec<TypeRef>,
    attrs: Vec<(Arc<str>, Attr)>,
    constants: Vec<(Arc<str>, Value)>,
    methods: Vec<(Arc<str>, Method)>,
}

impl TypeDef {
    fn empty(name: &str, kind: TypeKind, bases: Vec<TypeRef>) -> Self {
        TypeDef {
            name: Arc::from(name),
            kind,
            bases,
            attrs: Vec::new(),
            constants: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Start a storage-mapped entity definition
    pub fn entity(name: &str) -> TypeBuilder {
        TypeBuilder::new(TypeDef::empty(name, TypeKind::Entity { table: None }, Vec::new()))
    }

    /// Start a Choices definition
    pub fn choices(name: &str) -> TypeBuilder {
        TypeBuilder::new(TypeDef::empty(name, TypeKind::Choices, Vec::new()))
    }

    /// Start a plain member holder, used as an extension mixin
    pub fn mixin(name: &str) -> TypeBuilder {
        TypeBuilder::new(TypeDef::empty(name, TypeKind::Mixin, Vec::new()))
    }

    /// Start a type deriving from `base`, as a transform extension returns
    pub fn derive(name: &str, base: &TypeRef) -> TypeBuilder {
        TypeBuilder::new(TypeDef::empty(name, base.kind.derived(), vec![base.clone()]))
    }

    /// A member-less type with the given bases
    pub(crate) fn shell(name: &str, kind: TypeKind, bases: Vec<TypeRef>) -> TypeRef {
        Arc::new(TypeDef::empty(name, kind, bases))
    }

    /// Copy this type's own members onto a new type of the same name whose
    /// only base is `root`
    pub fn reparent(&self, root: &TypeRef) -> TypeRef {
        Arc::new(TypeDef {
            name: self.name.clone(),
            kind: root.kind.derived(),
            bases: vec![root.clone()],
            attrs: self.attrs.clone(),
            constants: self.constants.clone(),
            methods: self.methods.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_arc(&self) -> &Arc<str> {
        &self.name
    }

    /// Name with the extended-object suffix removed
    pub fn pretty_name(&self) -> &str {
        extended_object_name_pretty(&self.name)
    }

    pub fn kind(&self) -> &TypeKind {
        &self.kind
    }

    pub fn is_entity(&self) -> bool {
        self.kind.is_entity()
    }

    pub fn table(&self) -> Option<&str> {
        match &self.kind {
            TypeKind::Entity { table } => table.as_deref(),
            _ => None,
        }
    }

    pub fn bases(&self) -> &[TypeRef] {
        &self.bases
    }

    pub fn attrs(&self) -> &[(Arc<str>, Attr)] {
        &self.attrs
    }

    pub fn constants(&self) -> &[(Arc<str>, Value)] {
        &self.constants
    }

    pub fn methods(&self) -> &[(Arc<str>, Method)] {
        &self.methods
    }

    pub fn own_attr(&self, name: &str) -> Option<&Attr> {
        self.attrs
            .iter()
            .find(|(attr_name, _)| attr_name.as_ref() == name)
            .map(|(_, attr)| attr)
    }

    pub fn has_own_members(&self) -> bool {
        !(self.attrs.is_empty() && self.constants.is_empty() && self.methods.is_empty())
    }
}

/// Builder for [`TypeDef`]
///
/// Declaring a member twice replaces the earlier declaration, keeping its
/// position.
pub struct TypeBuilder {
    def: TypeDef,
}

impl TypeBuilder {
    fn new(def: TypeDef) -> Self {
        TypeBuilder { def }
    }

    pub fn base(mut self, base: TypeRef) -> Self {
        self.def.bases.push(base);
        self
    }

    /// Table name of an entity hierarchy root; ignored for other kinds
    pub fn table(mut self, table: &str) -> Self {
        if let TypeKind::Entity { table: slot } = &mut self.def.kind {
            *slot = Some(Arc::from(table));
        }
        self
    }

    pub fn attr(mut self, name: &str, attr: Attr) -> Self {
        upsert(&mut self.def.attrs, name, attr);
        self
    }

    pub fn constant(mut self, name: &str, value: impl Into<Value>) -> Self {
        upsert(&mut self.def.constants, name, value.into());
        self
    }

    pub fn method<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&Record, &[Value]) -> Value + Send + Sync + 'static,
    {
        upsert(&mut self.def.methods, name, Method::new(f));
        self
    }

    pub fn build(self) -> TypeRef {
        Arc::new(self.def)
    }
}

fn upsert<T>(members: &mut Vec<(Arc<str>, T)>, name: &str, member: T) {
    match members.iter_mut().find(|(existing, _)| existing.as_ref() == name) {
        Some((_, slot)) => *slot = member,
        None => members.push((Arc::from(name), member)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_keeps_declaration_order() {
        let topic = TypeDef::entity("Topic")
            .table("forum_topics")
            .attr("id", Attr::primary_key(AttrType::int()))
            .attr("title", Attr::required(AttrType::Str { max_len: Some(100) }))
            .attr("id", Attr::primary_key(AttrType::int()).column("topic_id"))
            .build();

        let names: Vec<&str> = topic.attrs().iter().map(|(n, _)| n.as_ref()).collect();
        assert_eq!(names, vec!["id", "title"]);
        assert_eq!(
            topic.own_attr("id").and_then(|a| a.column.as_deref()),
            Some("topic_id")
        );
        assert_eq!(topic.table(), Some("forum_topics"));
    }

    #[test]
    fn test_reparent_copies_members_onto_root() {
        let root = TypeDef::entity("Topic").table("forum_topics").build();
        let mixin = TypeDef::mixin("ApproveTopicModTopic")
            .attr("approved", Attr::required(AttrType::Bool).default(true))
            .method("is_visible", |_, _| Value::Bool(true))
            .build();

        let base = mixin.reparent(&root);
        assert_eq!(base.name(), "ApproveTopicModTopic");
        assert!(base.is_entity());
        assert_eq!(base.table(), None);
        assert_eq!(base.bases().len(), 1);
        assert!(Arc::ptr_eq(&base.bases()[0], &root));
        assert!(base.own_attr("approved").is_some());
        assert_eq!(base.methods().len(), 1);
    }

    #[test]
    fn test_attr_type_parse() {
        assert_eq!(AttrType::parse("bool", None, None), AttrType::Bool);
        assert_eq!(
            AttrType::parse("str", Some(6), None),
            AttrType::Str { max_len: Some(6) }
        );
        assert_eq!(AttrType::parse("Topic", None, None), AttrType::entity("Topic"));
    }

    #[test]
    fn test_set_attrs_have_no_column() {
        let attr = Attr::set("Post").reverse("topic");
        assert!(!attr.has_column());
        assert_eq!(attr.target(), Some("Post"));
        let attr = Attr::required(AttrType::Bool);
        assert_eq!(attr.column_name("approved"), "approved");
    }
}
