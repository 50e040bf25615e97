//! Remember the first and last post of every topic and forum
//!
//! The cached values let forum and topic listings render without walking the
//! posts. Relationships point at this mod's own extension types, so they
//! resolve against the extended entities.

use forum_mods::{Attr, AttrType, ModContext, ModError, Plugin, TypeDef, TypeRef};

pub const NAME: &str = "last_post";

#[derive(Debug, Default)]
pub struct LastPost;

fn colour() -> AttrType {
    AttrType::Str { max_len: Some(6) }
}

fn forum_ext() -> TypeRef {
    TypeDef::mixin("LastPostModForum")
        .attr(
            "last_post",
            Attr::optional(AttrType::entity("LastPostModPost"))
                .column("forum_last_post_id")
                .reverse("last_post_for_forum"),
        )
        .attr(
            "last_post_subject",
            Attr::optional(AttrType::str()).column("forum_last_post_subject"),
        )
        .attr(
            "last_post_time",
            Attr::optional(AttrType::DateTime).column("forum_last_post_time"),
        )
        .attr(
            "last_poster",
            Attr::optional(AttrType::entity("LastPostModUser"))
                .column("forum_last_poster_id")
                .reverse("last_poster_for_forums"),
        )
        .attr(
            "last_poster_name",
            Attr::optional(AttrType::str()).column("forum_last_poster_name"),
        )
        .attr(
            "last_poster_colour",
            Attr::optional(colour()).column("forum_last_poster_colour"),
        )
        .build()
}

fn user_ext() -> TypeRef {
    TypeDef::mixin("LastPostModUser")
        .attr(
            "last_poster_for_forums",
            Attr::set("LastPostModForum").reverse("last_poster"),
        )
        .attr(
            "last_poster_for_topics",
            Attr::set("LastPostModTopic").reverse("last_poster"),
        )
        .build()
}

fn post_ext() -> TypeRef {
    TypeDef::mixin("LastPostModPost")
        .attr(
            "last_post_for_forum",
            Attr::set("LastPostModForum").reverse("last_post"),
        )
        .attr(
            "last_post_for_topic",
            Attr::set("LastPostModTopic").reverse("last_post"),
        )
        .attr(
            "first_post_for_topic",
            Attr::set("LastPostModTopic").reverse("first_post"),
        )
        .build()
}

fn topic_ext() -> TypeRef {
    TypeDef::mixin("LastPostModTopic")
        .attr(
            "first_post",
            Attr::optional(AttrType::entity("LastPostModPost"))
                .column("topic_first_post_id")
                .reverse("first_post_for_topic"),
        )
        .attr(
            "first_poster_name",
            Attr::optional(AttrType::str()).column("topic_first_poster_name"),
        )
        .attr(
            "first_poster_colour",
            Attr::optional(colour()).column("topic_first_poster_colour"),
        )
        .attr(
            "last_post",
            Attr::optional(AttrType::entity("LastPostModPost"))
                .column("topic_last_post_id")
                .reverse("last_post_for_topic"),
        )
        .attr(
            "last_poster",
            Attr::optional(AttrType::entity("LastPostModUser"))
                .column("topic_last_poster_id")
                .reverse("last_poster_for_topics"),
        )
        .attr(
            "last_poster_name",
            Attr::optional(AttrType::str()).column("topic_last_poster_name"),
        )
        .attr(
            "last_poster_colour",
            Attr::optional(colour()).column("topic_last_poster_colour"),
        )
        .attr(
            "last_post_subject",
            Attr::optional(AttrType::Str { max_len: Some(100) })
                .column("topic_last_post_subject"),
        )
        .attr(
            "last_post_time",
            Attr::optional(AttrType::DateTime).column("topic_last_post_time"),
        )
        .attr(
            "last_view_time",
            Attr::optional(AttrType::DateTime).column("topic_last_view_time"),
        )
        .build()
}

impl Plugin for LastPost {
    fn name(&self) -> &str {
        NAME
    }

    fn version(&self) -> Option<&str> {
        Some("1.0")
    }

    fn install(&self, ctx: &mut ModContext<'_>) -> Result<(), ModError> {
        ctx.extend("Forum", forum_ext())?;
        ctx.extend("User", user_ext())?;
        ctx.extend("Post", post_ext())?;
        ctx.extend("Topic", topic_ext())?;
        Ok(())
    }
}
