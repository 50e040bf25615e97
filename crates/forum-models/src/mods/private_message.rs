//! Private messages between users
//!
//! Messages carry an icon, so the mod requires `icons`. The icon relationship
//! is declared once the loader has confirmed `icons` is installed.

use crate::mods::icons;
use crate::table_name;
use forum_mods::{Attr, AttrType, ModContext, ModError, Plugin, TypeDef, TypeRef};

pub const NAME: &str = "private_message";

#[derive(Debug, Default)]
pub struct PrivateMessage;

pub fn message() -> TypeRef {
    let flag = |default: bool| Attr::required(AttrType::Bool).default(default);
    TypeDef::entity("Message")
        .table(&table_name("privmsgs"))
        .attr("id", Attr::primary_key(AttrType::int()).column("msg_id"))
        .attr(
            "root_level",
            Attr::optional(AttrType::entity("Message"))
                .column("root_level")
                .reverse("replies"),
        )
        .attr("replies", Attr::set("Message").reverse("root_level"))
        .attr(
            "author",
            Attr::required(AttrType::entity("PrivateMessageModUser"))
                .column("author_id")
                .reverse("messages"),
        )
        .attr(
            "author_ip",
            Attr::optional(AttrType::Str { max_len: Some(40) }).column("author_ip"),
        )
        .attr(
            "time",
            Attr::required(AttrType::DateTime)
                .default_now()
                .column("message_time"),
        )
        .attr(
            "to_address",
            Attr::required(AttrType::LongStr).column("message_to_address"),
        )
        .attr(
            "bcc_address",
            Attr::required(AttrType::LongStr).default("").column("bcc_address"),
        )
        .attr("enable_bbcode", flag(true))
        .attr("enable_smilies", flag(true))
        .attr("enable_magic_url", flag(true))
        .attr("enable_sig", flag(true))
        .attr(
            "subject",
            Attr::optional(AttrType::Str { max_len: Some(100) }).column("message_subject"),
        )
        .attr("text", Attr::optional(AttrType::LongStr).column("message_text"))
        .attr(
            "edit_reason",
            Attr::optional(AttrType::str()).column("message_edit_reason"),
        )
        .attr(
            "edit_user",
            Attr::optional(AttrType::entity("PrivateMessageModUser"))
                .column("message_edit_user")
                .reverse("edited_messages"),
        )
        .attr(
            "edit_time",
            Attr::optional(AttrType::DateTime).column("message_edit_time"),
        )
        .attr(
            "edit_count",
            Attr::required(AttrType::Int { size: Some(2) })
                .default(0_i64)
                .column("message_edit_count"),
        )
        .build()
}

fn user_ext() -> TypeRef {
    let counter = || AttrType::Int { size: Some(1) };
    TypeDef::mixin("PrivateMessageModUser")
        .attr(
            "new_privmsg",
            Attr::required(counter()).default(0_i64).column("user_new_privmsg"),
        )
        .attr(
            "unread_privmsg",
            Attr::required(counter())
                .default(0_i64)
                .column("user_unread_privmsg"),
        )
        .attr(
            "last_privmsg",
            Attr::optional(AttrType::DateTime).column("user_last_privmsg"),
        )
        .attr(
            "message_rules",
            Attr::required(AttrType::Bool)
                .default(false)
                .column("user_message_rules"),
        )
        .attr(
            "allow_pm",
            Attr::required(AttrType::Bool)
                .default(true)
                .column("user_allow_pm"),
        )
        .attr("messages", Attr::set("Message").reverse("author"))
        .attr("edited_messages", Attr::set("Message").reverse("edit_user"))
        .build()
}

fn icon_ext() -> TypeRef {
    TypeDef::mixin("PrivateMessageModIcon")
        .attr(
            "messages",
            Attr::set("PrivateMessageModMessageIcon").reverse("icon"),
        )
        .build()
}

fn message_icon_ext() -> TypeRef {
    TypeDef::mixin("PrivateMessageModMessageIcon")
        .attr(
            "icon",
            Attr::optional(AttrType::entity("PrivateMessageModIcon"))
                .column("icon_id")
                .reverse("messages"),
        )
        .build()
}

impl Plugin for PrivateMessage {
    fn name(&self) -> &str {
        NAME
    }

    fn version(&self) -> Option<&str> {
        Some("1.0")
    }

    fn install(&self, ctx: &mut ModContext<'_>) -> Result<(), ModError> {
        ctx.require(icons::NAME, None);
        ctx.declare_extendable(message())?;
        ctx.extend("User", user_ext())?;

        ctx.on_installed(icons::NAME, None, |ctx| {
            ctx.extend("Icon", icon_ext())?;
            ctx.extend("Message", message_icon_ext())?;
            Ok(())
        });
        Ok(())
    }
}
