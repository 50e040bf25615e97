//! Print the composed types

use crate::common::install_mods;
use crate::GlobalOpts;
use colored::Colorize;
use forum_mods::{AttrKind, MergedType, TypeKind, Value};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct TypeSchema<'a> {
    name: &'a str,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    table: Option<&'a str>,
    bases: Vec<&'a str>,
    linearization: Vec<&'a str>,
    attrs: Vec<AttrSchema<'a>>,
    constants: Vec<ConstantSchema<'a>>,
    methods: Vec<MethodSchema<'a>>,
}

#[derive(Debug, Serialize)]
struct AttrSchema<'a> {
    name: &'a str,
    kind: AttrKind,
    #[serde(rename = "type")]
    ty: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    column: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reverse: Option<&'a str>,
    owner: &'a str,
}

#[derive(Debug, Serialize)]
struct ConstantSchema<'a> {
    name: &'a str,
    value: serde_json::Value,
    owner: &'a str,
}

#[derive(Debug, Serialize)]
struct MethodSchema<'a> {
    name: &'a str,
    owner: &'a str,
}

fn kind_name(kind: &TypeKind) -> &'static str {
    match kind {
        TypeKind::Entity { .. } => "entity",
        TypeKind::Choices => "choices",
        TypeKind::Mixin => "mixin",
    }
}

fn attr_kind_name(kind: AttrKind) -> &'static str {
    match kind {
        AttrKind::PrimaryKey => "primary key",
        AttrKind::Required => "required",
        AttrKind::Optional => "optional",
        AttrKind::Set => "set",
    }
}

fn json_value(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::from(*b),
        Value::Int(i) => serde_json::Value::from(*i),
        Value::Float(x) => serde_json::Value::from(*x),
        Value::Str(s) => serde_json::Value::from(s.as_str()),
        Value::Timestamp(t) => serde_json::Value::from(t.to_rfc3339()),
        Value::List(items) => items.iter().map(json_value).collect(),
    }
}

fn describe(ty: &MergedType) -> TypeSchema<'_> {
    TypeSchema {
        name: ty.name(),
        kind: kind_name(ty.kind()),
        table: ty.table(),
        bases: ty.bases().iter().map(|b| &**b).collect(),
        linearization: ty.linearization().iter().map(|b| &**b).collect(),
        attrs: ty
            .attrs()
            .iter()
            .map(|merged| AttrSchema {
                name: &merged.name,
                kind: merged.attr.kind,
                ty: merged.attr.ty.to_string(),
                column: merged
                    .attr
                    .has_column()
                    .then(|| merged.attr.column_name(&merged.name)),
                reverse: merged.attr.reverse.as_deref(),
                owner: &merged.owner,
            })
            .collect(),
        constants: ty
            .constants()
            .iter()
            .map(|constant| ConstantSchema {
                name: &constant.name,
                value: json_value(&constant.value),
                owner: &constant.owner,
            })
            .collect(),
        methods: ty
            .method_names()
            .into_iter()
            .map(|name| MethodSchema {
                name,
                owner: ty.method_owner(name).unwrap_or_default(),
            })
            .collect(),
    }
}

pub fn handle_schema(entity: Option<String>, json: bool, opts: &GlobalOpts) -> Result<(), String> {
    let system = install_mods(opts).map_err(|e| format!("{:#}", e))?;
    let models = system.models().map_err(|e| e.to_string())?;

    let selected: Vec<&MergedType> = match entity.as_deref() {
        Some(name) => {
            let ty = models
                .get(name)
                .ok_or_else(|| format!("No extendable object named '{}'", name))?;
            vec![ty.as_ref()]
        }
        None => models.iter().map(|ty| ty.as_ref()).collect(),
    };
    let schemas: Vec<TypeSchema<'_>> = selected.into_iter().map(describe).collect();

    if json {
        let rendered = match (entity.is_some(), schemas.as_slice()) {
            (true, [only]) => serde_json::to_string_pretty(only),
            _ => serde_json::to_string_pretty(&schemas),
        }
        .map_err(|e| format!("Failed to render schema: {}", e))?;
        println!("{}", rendered);
        return Ok(());
    }

    if entity.is_none() {
        println!("{}", "Extendable objects:".bold().green());
        for schema in &schemas {
            let mut line = format!("  {} {}", schema.name.bold().blue(), schema.kind.dimmed());
            if let Some(table) = schema.table {
                line.push_str(&format!(" {}", table.cyan()));
            }
            if !schema.bases.is_empty() {
                line.push_str(&format!(" <- {}", schema.bases.join(", ")));
            }
            println!("{}", line);
        }
        return Ok(());
    }

    for schema in &schemas {
        print_details(schema, opts.verbosity_level() > 0);
    }
    Ok(())
}

fn print_details(schema: &TypeSchema<'_>, verbose: bool) {
    let mut header = format!("{} {}", schema.name.bold().green(), schema.kind.dimmed());
    if let Some(table) = schema.table {
        header.push_str(&format!(" ({})", table.cyan()));
    }
    println!("{}", header);
    if verbose {
        println!("  {}: {}", "resolution".cyan(), schema.linearization.join(" -> "));
    }
    if !schema.bases.is_empty() {
        println!("  {}: {}", "extended by".cyan(), schema.bases.join(", "));
    }

    if !schema.attrs.is_empty() {
        println!("  {}", "Attributes:".bold());
    }
    for attr in &schema.attrs {
        let mut line = format!(
            "    {} {} {}",
            attr.name.bold(),
            attr.ty,
            attr_kind_name(attr.kind).dimmed()
        );
        if let Some(column) = attr.column {
            line.push_str(&format!(" [{}]", column));
        }
        if let Some(reverse) = attr.reverse {
            line.push_str(&format!(" reverse={}", reverse));
        }
        if attr.owner != schema.name {
            line.push_str(&format!(" {}", format!("from {}", attr.owner).dimmed()));
        }
        println!("{}", line);
    }

    if !schema.constants.is_empty() {
        println!("  {}", "Constants:".bold());
    }
    for constant in &schema.constants {
        println!(
            "    {} = {} {}",
            constant.name.bold(),
            constant.value,
            format!("from {}", constant.owner).dimmed()
        );
    }

    if !schema.methods.is_empty() {
        println!("  {}", "Methods:".bold());
    }
    for method in &schema.methods {
        println!(
            "    {}() {}",
            method.name.bold(),
            format!("from {}", method.owner).dimmed()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_value_conversion() {
        assert_eq!(json_value(&Value::Int(3)), serde_json::json!(3));
        assert_eq!(json_value(&Value::from("x")), serde_json::json!("x"));
        assert_eq!(
            json_value(&Value::List(vec![Value::Bool(true), Value::Null])),
            serde_json::json!([true, null])
        );
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(kind_name(&TypeKind::Choices), "choices");
        assert_eq!(kind_name(&TypeKind::Entity { table: None }), "entity");
    }
}
