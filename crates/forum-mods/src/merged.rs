//! Composed types and their instances
//!
//! A [`MergedType`] is the final view of an extendable object: every member
//! contributed by the root and its accepted extensions, resolved front to back
//! along the linearization (the first extension to declare a name wins).

use crate::anchor::Anchor;
use crate::catalog::{Catalog, EntityMeta};
use crate::errors::ModError;
use crate::linearize::linearize;
use crate::types::{Attr, AttrKind, AttrType, Method, TypeDef, TypeKind, TypeRef};
use crate::value::Value;
use ahash::AHashMap;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// An attribute of a merged type and the type that declared it
#[derive(Debug, Clone)]
pub struct MergedAttr {
    pub name: Arc<str>,
    pub owner: Arc<str>,
    pub attr: Attr,
}

#[derive(Debug, Clone)]
pub struct MergedConstant {
    pub name: Arc<str>,
    pub owner: Arc<str>,
    pub value: Value,
}

#[derive(Debug)]
pub struct MergedType {
    name: Arc<str>,
    catalog_name: Arc<str>,
    kind: TypeKind,
    bases: Vec<Arc<str>>,
    linearization: Vec<Arc<str>>,
    attrs: Vec<MergedAttr>,
    attr_index: AHashMap<Arc<str>, usize>,
    constants: Vec<MergedConstant>,
    methods: BTreeMap<Arc<str>, (Method, Arc<str>)>,
    meta: Option<EntityMeta>,
}

impl MergedType {
    pub(crate) fn build(anchor: &Anchor, catalog: &Catalog) -> Result<Self, ModError> {
        let root = anchor.root();
        let bases = anchor.bases();
        let shell = TypeDef::shell(anchor.catalog_name(), root.kind().derived(), bases.clone());
        let order = linearize(&shell)?;

        if matches!(root.kind(), TypeKind::Choices) {
            check_choices(anchor.name(), &order)?;
        }

        // Root members first, then each base's own chain
        let mut layout: Vec<TypeRef> = Vec::new();
        for chain in std::iter::once(root).chain(bases.iter()) {
            let mut chain_order = linearize(chain)?;
            chain_order.reverse();
            for ty in chain_order {
                if !layout.iter().any(|seen| Arc::ptr_eq(seen, &ty)) {
                    layout.push(ty);
                }
            }
        }

        let mut attr_winners: AHashMap<&str, MergedAttr> = AHashMap::new();
        let mut constant_winners: AHashMap<&str, MergedConstant> = AHashMap::new();
        let mut methods: BTreeMap<Arc<str>, (Method, Arc<str>)> = BTreeMap::new();
        for ty in &order {
            for (name, attr) in ty.attrs() {
                attr_winners.entry(&**name).or_insert_with(|| MergedAttr {
                    name: name.clone(),
                    owner: ty.name_arc().clone(),
                    attr: attr.clone(),
                });
            }
            for (name, value) in ty.constants() {
                constant_winners
                    .entry(&**name)
                    .or_insert_with(|| MergedConstant {
                        name: name.clone(),
                        owner: ty.name_arc().clone(),
                        value: value.clone(),
                    });
            }
            for (name, method) in ty.methods() {
                methods
                    .entry(name.clone())
                    .or_insert_with(|| (method.clone(), ty.name_arc().clone()));
            }
        }

        let mut attrs = Vec::with_capacity(attr_winners.len());
        let mut attr_index = AHashMap::new();
        let mut constants = Vec::with_capacity(constant_winners.len());
        for ty in &layout {
            for (name, _) in ty.attrs() {
                if let Some(winner) = attr_winners.remove(&**name) {
                    attr_index.insert(name.clone(), attrs.len());
                    attrs.push(winner);
                }
            }
            for (name, _) in ty.constants() {
                if let Some(winner) = constant_winners.remove(&**name) {
                    constants.push(winner);
                }
            }
        }

        Ok(MergedType {
            name: Arc::from(anchor.name()),
            catalog_name: Arc::from(anchor.catalog_name()),
            kind: root.kind().clone(),
            bases: bases.iter().map(|base| base.name_arc().clone()).collect(),
            linearization: order.iter().map(|ty| ty.name_arc().clone()).collect(),
            attrs,
            attr_index,
            constants,
            methods,
            meta: catalog.get(anchor.catalog_name()).cloned(),
        })
    }

    /// Registered name of the extendable object
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn catalog_name(&self) -> &str {
        &self.catalog_name
    }

    pub fn kind(&self) -> &TypeKind {
        &self.kind
    }

    pub fn is_entity(&self) -> bool {
        self.kind.is_entity()
    }

    /// Names of the direct bases
    pub fn bases(&self) -> &[Arc<str>] {
        &self.bases
    }

    /// Member resolution order, the merged type first
    pub fn linearization(&self) -> &[Arc<str>] {
        &self.linearization
    }

    pub fn attrs(&self) -> &[MergedAttr] {
        &self.attrs
    }

    pub fn attr(&self, name: &str) -> Option<&Attr> {
        self.merged_attr(name).map(|merged| &merged.attr)
    }

    pub fn merged_attr(&self, name: &str) -> Option<&MergedAttr> {
        self.attr_index.get(name).map(|&idx| &self.attrs[idx])
    }

    pub fn constants(&self) -> &[MergedConstant] {
        &self.constants
    }

    pub fn constant(&self, name: &str) -> Option<&Value> {
        self.constants
            .iter()
            .find(|constant| &*constant.name == name)
            .map(|constant| &constant.value)
    }

    /// Whether `value` is one of the Choices values
    pub fn contains_choice(&self, value: &Value) -> bool {
        self.constants.iter().any(|constant| &constant.value == value)
    }

    pub fn method_names(&self) -> Vec<&str> {
        self.methods.keys().map(|name| &**name).collect()
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Type that supplied the winning definition of a method
    pub fn method_owner(&self, name: &str) -> Option<&str> {
        self.methods.get(name).map(|(_, owner)| &**owner)
    }

    pub fn meta(&self) -> Option<&EntityMeta> {
        self.meta.as_ref()
    }

    pub fn table(&self) -> Option<&str> {
        self.meta.as_ref().map(|meta| &*meta.table)
    }

    pub fn columns(&self) -> Vec<&str> {
        match &self.meta {
            Some(meta) => meta.columns(),
            None => self
                .attrs
                .iter()
                .filter(|merged| merged.attr.has_column())
                .map(|merged| merged.attr.column_name(&merged.name))
                .collect(),
        }
    }

    /// Create an instance from attribute values
    ///
    /// Missing attributes take their default; primary keys and optional
    /// attributes without one are null and sets start empty. A required
    /// attribute without value or default is an error.
    pub fn instantiate<I, K, V>(self: &Arc<Self>, values: I) -> Result<Record, ModError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut record = Record {
            ty: Arc::clone(self),
            values: BTreeMap::new(),
        };
        for (name, value) in values {
            record.set(name.as_ref(), value)?;
        }

        for merged in &self.attrs {
            if record.values.contains_key(&merged.name) {
                continue;
            }
            let value = match (&merged.attr.default, merged.attr.kind) {
                (Some(default), _) => default.resolve(),
                (None, AttrKind::PrimaryKey | AttrKind::Optional) => Value::Null,
                (None, AttrKind::Set) => Value::List(Vec::new()),
                (None, AttrKind::Required) => {
                    return Err(ModError::MissingValue {
                        entity: self.name.to_string(),
                        attr: merged.name.to_string(),
                    });
                }
            };
            record.values.insert(merged.name.clone(), value);
        }
        Ok(record)
    }
}

fn check_choices(name: &str, order: &[TypeRef]) -> Result<(), ModError> {
    let mut details = Vec::new();
    let mut keys: AHashMap<&str, &str> = AHashMap::new();
    let mut values: Vec<(&Value, &str, &str)> = Vec::new();
    let mut kinds = BTreeSet::new();

    for ty in order.iter().rev() {
        for (key, value) in ty.constants() {
            match keys.get(&**key) {
                Some(owner) => details.push(format!(
                    "key '{}' is defined by both {} and {}",
                    key,
                    owner,
                    ty.name()
                )),
                None => {
                    keys.insert(&**key, ty.name());
                }
            }
            if let Some((_, owner, other)) = values.iter().find(|(seen, _, _)| *seen == value) {
                details.push(format!(
                    "value {} of {}.{} is already used by {}.{}",
                    value,
                    ty.name(),
                    key,
                    owner,
                    other
                ));
            }
            values.push((value, ty.name(), &**key));
            kinds.insert(value.kind_name());
        }
    }
    if kinds.len() > 1 {
        details.push(format!(
            "values mix types: {}",
            kinds.into_iter().collect::<Vec<_>>().join(", ")
        ));
    }

    if details.is_empty() {
        Ok(())
    } else {
        Err(ModError::ChoicesCollision {
            name: name.to_string(),
            details,
        })
    }
}

fn accepts(attr: &Attr, value: &Value) -> bool {
    if value.is_null() {
        return matches!(attr.kind, AttrKind::Optional | AttrKind::PrimaryKey);
    }
    if attr.kind == AttrKind::Set {
        return matches!(value, Value::List(_));
    }
    match (&attr.ty, value) {
        (AttrType::Bool, Value::Bool(_))
        | (AttrType::Int { .. } | AttrType::Entity(_), Value::Int(_))
        | (AttrType::Float, Value::Float(_) | Value::Int(_))
        | (AttrType::LongStr, Value::Str(_))
        | (AttrType::DateTime, Value::Timestamp(_)) => true,
        (AttrType::Str { max_len }, Value::Str(s)) => {
            max_len.map_or(true, |max| s.chars().count() <= max as usize)
        }
        _ => false,
    }
}

fn expected(attr: &Attr) -> String {
    match (&attr.ty, attr.kind) {
        (AttrType::Entity(target), AttrKind::Set) => format!("list of {}", target),
        (AttrType::Entity(target), _) => format!("{} id", target),
        (ty, _) => ty.to_string(),
    }
}

/// An instance of a merged type
#[derive(Debug, Clone)]
pub struct Record {
    ty: Arc<MergedType>,
    values: BTreeMap<Arc<str>, Value>,
}

impl Record {
    pub fn type_name(&self) -> &str {
        self.ty.name()
    }

    pub fn merged_type(&self) -> &Arc<MergedType> {
        &self.ty
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<(), ModError> {
        let value = value.into();
        let merged = self
            .ty
            .merged_attr(name)
            .ok_or_else(|| ModError::UnknownAttribute {
                entity: self.ty.name().to_string(),
                attr: name.to_string(),
            })?;
        if !accepts(&merged.attr, &value) {
            return Err(ModError::InvalidValue {
                entity: self.ty.name().to_string(),
                attr: name.to_string(),
                expected: expected(&merged.attr),
            });
        }
        self.values.insert(merged.name.clone(), value);
        Ok(())
    }

    /// Invoke a merged method on this record
    pub fn call(&self, method: &str, args: &[Value]) -> Result<Value, ModError> {
        let (method, _) = self
            .ty
            .methods
            .get(method)
            .ok_or_else(|| ModError::UnknownMethod {
                entity: self.ty.name().to_string(),
                method: method.to_string(),
            })?;
        Ok(method.call(self, args))
    }

    pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(name, value)| (&**name, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeDef;

    fn composed(anchor: &Anchor, bases: Vec<TypeRef>) -> Arc<MergedType> {
        anchor.set_bases(bases);
        Arc::new(MergedType::build(anchor, &Catalog::new()).unwrap())
    }

    #[test]
    fn test_first_base_wins_member_collisions() {
        let root = TypeDef::mixin("Greeter")
            .method("greet", |_, _| Value::from("hello"))
            .constant("LIMIT", 1i64)
            .build();
        let anchor = Anchor::new("Greeter", root.clone(), "core");
        let first = TypeDef::mixin("First")
            .method("greet", |_, _| Value::from("hi"))
            .build()
            .reparent(&root);
        let second = TypeDef::mixin("Second")
            .method("greet", |_, _| Value::from("hey"))
            .constant("LIMIT", 5i64)
            .build()
            .reparent(&root);

        let merged = composed(&anchor, vec![first, second]);
        let record = merged.instantiate(Vec::<(&str, Value)>::new()).unwrap();
        assert_eq!(record.call("greet", &[]).unwrap(), Value::from("hi"));
        assert_eq!(merged.method_owner("greet"), Some("First"));
        assert_eq!(merged.constant("LIMIT"), Some(&Value::Int(5)));
        let order: Vec<&str> = merged.linearization().iter().map(|n| &**n).collect();
        assert_eq!(order, vec!["GreeterExtended", "First", "Second", "Greeter"]);
    }

    #[test]
    fn test_instantiate_applies_defaults_and_checks_values() {
        let root = TypeDef::entity("Topic")
            .attr("id", Attr::primary_key(AttrType::int()))
            .attr("title", Attr::required(AttrType::Str { max_len: Some(5) }))
            .attr("posts", Attr::set("Post"))
            .build();
        let anchor = Anchor::new("Topic", root.clone(), "core");
        let approve = TypeDef::mixin("ApproveTopicModTopic")
            .attr("approved", Attr::required(AttrType::Bool).default(true))
            .method("is_visible", |record, _| {
                record.get("approved").cloned().unwrap_or(Value::Null)
            })
            .build()
            .reparent(&root);
        let merged = composed(&anchor, vec![approve]);

        let record = merged.instantiate([("title", "Hi")]).unwrap();
        assert_eq!(record.get("approved"), Some(&Value::Bool(true)));
        assert_eq!(record.get("id"), Some(&Value::Null));
        assert_eq!(record.get("posts"), Some(&Value::List(Vec::new())));
        assert_eq!(record.call("is_visible", &[]).unwrap(), Value::Bool(true));

        assert!(matches!(
            merged.instantiate(Vec::<(&str, Value)>::new()),
            Err(ModError::MissingValue { attr, .. }) if attr == "title"
        ));
        assert!(matches!(
            merged.instantiate([("title", "Far too long")]),
            Err(ModError::InvalidValue { .. })
        ));
        assert!(matches!(
            merged.instantiate([("pinned", true)]),
            Err(ModError::UnknownAttribute { .. })
        ));
        assert!(matches!(
            record.call("delete", &[]),
            Err(ModError::UnknownMethod { .. })
        ));
    }

    #[test]
    fn test_attr_layout_keeps_root_first() {
        let root = TypeDef::mixin("Profile")
            .attr("name", Attr::required(AttrType::str()))
            .build();
        let anchor = Anchor::new("Profile", root.clone(), "core");
        let a = TypeDef::mixin("A")
            .attr("alpha", Attr::optional(AttrType::int()))
            .build()
            .reparent(&root);
        let b = TypeDef::mixin("B")
            .attr("beta", Attr::optional(AttrType::int()))
            .attr("name", Attr::optional(AttrType::str()))
            .build()
            .reparent(&root);

        let merged = composed(&anchor, vec![a, b]);
        let names: Vec<&str> = merged.attrs().iter().map(|m| &*m.name).collect();
        assert_eq!(names, vec!["name", "alpha", "beta"]);
        assert_eq!(merged.merged_attr("name").map(|m| &*m.owner), Some("B"));
        assert_eq!(merged.columns(), vec!["name", "alpha", "beta"]);
    }

    #[test]
    fn test_choices_collisions_are_reported() {
        let root = TypeDef::choices("TopicType")
            .constant("NORMAL", 0i64)
            .constant("STICKY", 1i64)
            .build();
        let anchor = Anchor::new("TopicType", root.clone(), "core");
        let polls = TypeDef::mixin("PollsModTopicType")
            .constant("POLL", 1i64)
            .constant("NORMAL", 5i64)
            .build()
            .reparent(&root);
        anchor.set_bases(vec![polls]);

        let err = MergedType::build(&anchor, &Catalog::new()).unwrap_err();
        match err {
            ModError::ChoicesCollision { name, details } => {
                assert_eq!(name, "TopicType");
                assert_eq!(details.len(), 2);
                assert!(details[0].contains("value 1 of PollsModTopicType.POLL"));
                assert!(details[1].contains("key 'NORMAL'"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_choices_extension_adds_values() {
        let root = TypeDef::choices("TopicType")
            .constant("NORMAL", 0i64)
            .build();
        let anchor = Anchor::new("TopicType", root.clone(), "core");
        let polls = TypeDef::mixin("PollsModTopicType")
            .constant("POLL", 3i64)
            .build()
            .reparent(&root);
        let merged = composed(&anchor, vec![polls]);
        assert!(merged.contains_choice(&Value::Int(3)));
        assert!(merged.contains_choice(&Value::Int(0)));
        assert!(!merged.contains_choice(&Value::Int(1)));
    }
}
