//! Icons for topics and posts

use crate::table_name;
use forum_mods::{Attr, AttrType, ModContext, ModError, Plugin, TypeDef, TypeRef};

pub const NAME: &str = "icons";

#[derive(Debug, Default)]
pub struct Icons;

pub fn icon() -> TypeRef {
    let size = || AttrType::Int { size: Some(1) };
    TypeDef::entity("Icon")
        .table(&table_name("icons"))
        .attr("id", Attr::primary_key(AttrType::int()).column("icon_id"))
        .attr("topics", Attr::set("IconsModTopic").reverse("icon"))
        .attr("posts", Attr::set("IconsModPost").reverse("icon"))
        .attr("url", Attr::optional(AttrType::str()).column("icon_url"))
        .attr("width", Attr::required(size()).default(0_i64).column("icon_width"))
        .attr("height", Attr::required(size()).default(0_i64).column("icon_height"))
        .attr(
            "order",
            Attr::required(AttrType::Int { size: Some(3) })
                .default(0_i64)
                .column("icon_order"),
        )
        .attr(
            "display_on_posting",
            Attr::required(AttrType::Bool).default(true),
        )
        .build()
}

impl Plugin for Icons {
    fn name(&self) -> &str {
        NAME
    }

    fn version(&self) -> Option<&str> {
        Some("1.1")
    }

    fn install(&self, ctx: &mut ModContext<'_>) -> Result<(), ModError> {
        ctx.declare_extendable(icon())?;
        ctx.extend(
            "Topic",
            TypeDef::mixin("IconsModTopic")
                .attr(
                    "icon",
                    Attr::optional(AttrType::entity("Icon"))
                        .column("icon_id")
                        .reverse("topics"),
                )
                .build(),
        )?;
        ctx.extend(
            "Post",
            TypeDef::mixin("IconsModPost")
                .attr(
                    "icon",
                    Attr::optional(AttrType::entity("Icon"))
                        .column("icon_id")
                        .reverse("posts"),
                )
                .build(),
        )?;
        Ok(())
    }
}
