//! Core entities of the forum
//!
//! Every entity and Choices set here is declared extendable, so mods can add
//! attributes, constants and methods to them before the catalog is mapped.
//! Relationships between core entities name the core entity; mods name each
//! other's extension types.

use crate::table_name;
use chrono::Utc;
use forum_mods::{Anchor, Attr, AttrType, ModContext, ModError, TypeDef, TypeRef, Value};

const DEFAULT_DATEFORMAT: &str = "d M Y H:i";

/// Anchors of the core objects, in declaration order
#[derive(Debug, Clone)]
pub struct CoreAnchors {
    pub topic_type: Anchor,
    pub topic_status: Anchor,
    pub forum_type: Anchor,
    pub forum_status: Anchor,
    pub user_type: Anchor,
    pub log_type: Anchor,
    pub user: Anchor,
    pub forum: Anchor,
    pub topic: Anchor,
    pub post: Anchor,
    pub log: Anchor,
}

impl CoreAnchors {
    pub fn all(&self) -> [&Anchor; 11] {
        [
            &self.topic_type,
            &self.topic_status,
            &self.forum_type,
            &self.forum_status,
            &self.user_type,
            &self.log_type,
            &self.user,
            &self.forum,
            &self.topic,
            &self.post,
            &self.log,
        ]
    }
}

/// Declare the core objects through the application's context
pub fn declare_core(ctx: &mut ModContext<'_>) -> Result<CoreAnchors, ModError> {
    let topic_type = ctx.declare_extendable(topic_type())?;
    let topic_status = ctx.declare_extendable(topic_status())?;
    let forum_type = ctx.declare_extendable(forum_type())?;
    let forum_status = ctx.declare_extendable(forum_status())?;
    let user_type = ctx.declare_extendable(user_type())?;
    let log_type = ctx.declare_extendable(log_type())?;

    let user = ctx.declare_extendable(user())?;
    let forum = ctx.declare_extendable(forum())?;
    let topic = ctx.declare_extendable(topic(topic_status.clone()))?;
    let post = ctx.declare_extendable(post())?;
    let log = ctx.declare_extendable(log())?;

    Ok(CoreAnchors {
        topic_type,
        topic_status,
        forum_type,
        forum_status,
        user_type,
        log_type,
        user,
        forum,
        topic,
        post,
        log,
    })
}

fn tiny_int() -> AttrType {
    AttrType::Int { size: Some(1) }
}

fn short_str(max_len: u32) -> AttrType {
    AttrType::Str {
        max_len: Some(max_len),
    }
}

pub fn topic_type() -> TypeRef {
    TypeDef::choices("TopicType")
        .constant("POST_NORMAL", 0_i64)
        .constant("POST_STICKY", 1_i64)
        .constant("POST_ANNOUNCE", 2_i64)
        .constant("POST_GLOBAL", 3_i64)
        .build()
}

pub fn topic_status() -> TypeRef {
    TypeDef::choices("TopicStatus")
        .constant("ITEM_UNLOCKED", 0_i64)
        .constant("ITEM_LOCKED", 1_i64)
        .constant("ITEM_MOVED", 2_i64)
        .build()
}

pub fn forum_type() -> TypeRef {
    TypeDef::choices("ForumType")
        .constant("FORUM_CAT", 0_i64)
        .constant("FORUM_POST", 1_i64)
        .constant("FORUM_LINK", 2_i64)
        .build()
}

pub fn forum_status() -> TypeRef {
    TypeDef::choices("ForumStatus")
        .constant("ITEM_UNLOCKED", 0_i64)
        .constant("ITEM_LOCKED", 1_i64)
        .build()
}

pub fn user_type() -> TypeRef {
    TypeDef::choices("UserType")
        .constant("NORMAL", 0_i64)
        .constant("INACTIVE", 1_i64)
        .constant("IGNORED", 2_i64)
        .constant("FOUNDER", 3_i64)
        .build()
}

pub fn log_type() -> TypeRef {
    TypeDef::choices("LogType")
        .constant("LOG_ADMIN", 0_i64)
        .constant("LOG_MOD", 1_i64)
        .constant("LOG_CRITICAL", 2_i64)
        .constant("LOG_USERS", 3_i64)
        .build()
}

pub fn user() -> TypeRef {
    TypeDef::entity("User")
        .table(&table_name("users"))
        .attr("id", Attr::primary_key(AttrType::int()).column("user_id"))
        .attr("type", Attr::required(tiny_int()).default(0_i64).column("user_type"))
        .attr("username", Attr::required(AttrType::str()).column("username"))
        .attr(
            "username_clean",
            Attr::required(AttrType::str()).column("username_clean"),
        )
        .attr("email", Attr::optional(short_str(100)).column("user_email"))
        .attr("password", Attr::optional(short_str(60)).column("user_password"))
        .attr("ip", Attr::optional(short_str(40)).column("user_ip"))
        .attr(
            "regdate",
            Attr::required(AttrType::DateTime)
                .default_now()
                .column("user_regdate"),
        )
        .attr(
            "lastvisit",
            Attr::optional(AttrType::DateTime).column("user_lastvisit"),
        )
        .attr("posts", Attr::required(AttrType::int()).default(0_i64).column("user_posts"))
        .attr("dateformat", Attr::optional(short_str(30)).column("user_dateformat"))
        .attr("colour", Attr::optional(short_str(6)).column("user_colour"))
        .attr(
            "login_attempts",
            Attr::required(tiny_int())
                .default(0_i64)
                .column("user_login_attempts"),
        )
        .attr("topics", Attr::set("Topic").reverse("poster"))
        .attr("authored_posts", Attr::set("Post").reverse("poster"))
        .attr("topics_posted_in", Attr::set("Topic").reverse("posters"))
        .attr("bumped_topics", Attr::set("Topic").reverse("bumper"))
        .attr("logs", Attr::set("Log").reverse("user"))
        .attr("reportee_logs", Attr::set("Log").reverse("reportee"))
        .method("get_dateformat", |record, _| {
            record
                .get("dateformat")
                .filter(|value| !value.is_null())
                .cloned()
                .unwrap_or_else(|| Value::from(DEFAULT_DATEFORMAT))
        })
        .method("member_days", |record, _| match record.get("regdate") {
            Some(Value::Timestamp(regdate)) => Value::Int((Utc::now() - *regdate).num_days()),
            _ => Value::Null,
        })
        .build()
}

pub fn forum() -> TypeRef {
    TypeDef::entity("Forum")
        .table(&table_name("forums"))
        .attr("id", Attr::primary_key(AttrType::int()).column("forum_id"))
        .attr(
            "parent",
            Attr::optional(AttrType::entity("Forum"))
                .column("parent_id")
                .reverse("children"),
        )
        .attr("children", Attr::set("Forum").reverse("parent"))
        .attr("name", Attr::required(AttrType::str()).column("forum_name"))
        .attr("desc", Attr::required(AttrType::LongStr).default("").column("forum_desc"))
        .attr("link", Attr::optional(AttrType::str()).column("forum_link"))
        .attr("password", Attr::optional(short_str(40)).column("forum_password"))
        .attr("image", Attr::optional(AttrType::str()).column("forum_image"))
        .attr(
            "topics_per_page",
            Attr::required(tiny_int())
                .default(0_i64)
                .column("forum_topics_per_page"),
        )
        .attr("type", Attr::required(tiny_int()).default(0_i64).column("forum_type"))
        .attr("status", Attr::required(tiny_int()).default(0_i64).column("forum_status"))
        .attr("flags", Attr::required(tiny_int()).default(32_i64).column("forum_flags"))
        .attr(
            "display_on_index",
            Attr::required(AttrType::Bool).default(true),
        )
        .attr("enable_indexing", Attr::required(AttrType::Bool).default(true))
        .attr("enable_icons", Attr::required(AttrType::Bool).default(true))
        .attr("topics", Attr::set("Topic").reverse("forum"))
        .attr("posts", Attr::set("Post").reverse("forum"))
        .attr("logs", Attr::set("Log").reverse("forum"))
        .build()
}

/// `status` is checked against the merged [`topic_status`] Choices
pub fn topic(topic_status: Anchor) -> TypeRef {
    TypeDef::entity("Topic")
        .table(&table_name("topics"))
        .attr("id", Attr::primary_key(AttrType::int()).column("topic_id"))
        .attr(
            "forum",
            Attr::required(AttrType::entity("Forum"))
                .column("forum_id")
                .reverse("topics"),
        )
        .attr(
            "poster",
            Attr::required(AttrType::entity("User"))
                .column("topic_poster")
                .reverse("topics"),
        )
        .attr("posters", Attr::set("User").reverse("topics_posted_in"))
        .attr("title", Attr::required(short_str(100)).column("topic_title"))
        .attr(
            "time",
            Attr::required(AttrType::DateTime)
                .default_now()
                .column("topic_time"),
        )
        .attr(
            "time_limit",
            Attr::required(AttrType::int()).default(0_i64).column("topic_time_limit"),
        )
        .attr("status", Attr::required(tiny_int()).default(0_i64).column("topic_status"))
        .attr("type", Attr::required(tiny_int()).default(0_i64).column("topic_type"))
        .attr(
            "moved",
            Attr::optional(AttrType::entity("Topic"))
                .column("topic_moved_id")
                .reverse("moved_from"),
        )
        .attr("moved_from", Attr::set("Topic").reverse("moved"))
        .attr(
            "bumped",
            Attr::required(AttrType::Bool).default(false).column("topic_bumped"),
        )
        .attr(
            "bumper",
            Attr::optional(AttrType::entity("User"))
                .column("topic_bumper")
                .reverse("bumped_topics"),
        )
        .attr("posts", Attr::set("Post").reverse("topic"))
        .attr("logs", Attr::set("Log").reverse("topic"))
        .method("is_locked", move |record, _| {
            let locked = topic_status
                .merged()
                .ok()
                .and_then(|status| status.constant("ITEM_LOCKED").cloned());
            Value::Bool(locked.is_some() && record.get("status") == locked.as_ref())
        })
        .build()
}

pub fn post() -> TypeRef {
    TypeDef::entity("Post")
        .table(&table_name("posts"))
        .attr("id", Attr::primary_key(AttrType::int()).column("post_id"))
        .attr(
            "topic",
            Attr::required(AttrType::entity("Topic"))
                .column("topic_id")
                .reverse("posts"),
        )
        .attr(
            "forum",
            Attr::required(AttrType::entity("Forum"))
                .column("forum_id")
                .reverse("posts"),
        )
        .attr(
            "poster",
            Attr::required(AttrType::entity("User"))
                .column("poster_id")
                .reverse("authored_posts"),
        )
        .attr("poster_ip", Attr::optional(short_str(40)))
        .attr(
            "time",
            Attr::required(AttrType::DateTime)
                .default_now()
                .column("post_time"),
        )
        .attr("enable_bbcode", Attr::required(AttrType::Bool).default(true))
        .attr("enable_smilies", Attr::required(AttrType::Bool).default(true))
        .attr("enable_magic_url", Attr::required(AttrType::Bool).default(true))
        .attr("enable_sig", Attr::required(AttrType::Bool).default(true))
        .attr(
            "username",
            Attr::required(AttrType::str()).default("").column("post_username"),
        )
        .attr("subject", Attr::required(short_str(100)).column("post_subject"))
        .attr("text", Attr::required(AttrType::LongStr).column("post_text"))
        .attr(
            "checksum",
            Attr::required(short_str(32)).default("").column("post_checksum"),
        )
        .build()
}

pub fn log() -> TypeRef {
    TypeDef::entity("Log")
        .table(&table_name("logs"))
        .attr("id", Attr::primary_key(AttrType::int()).column("log_id"))
        .attr("type", Attr::required(tiny_int()).default(0_i64).column("log_type"))
        .attr(
            "user",
            Attr::optional(AttrType::entity("User"))
                .column("user_id")
                .reverse("logs"),
        )
        .attr(
            "forum",
            Attr::optional(AttrType::entity("Forum"))
                .column("forum_id")
                .reverse("logs"),
        )
        .attr(
            "topic",
            Attr::optional(AttrType::entity("Topic"))
                .column("topic_id")
                .reverse("logs"),
        )
        .attr(
            "reportee",
            Attr::optional(AttrType::entity("User"))
                .column("reportee_id")
                .reverse("reportee_logs"),
        )
        .attr("ip", Attr::optional(short_str(40)).column("log_ip"))
        .attr(
            "time",
            Attr::required(AttrType::DateTime)
                .default_now()
                .column("log_time"),
        )
        .attr("operation", Attr::optional(AttrType::LongStr).column("log_operation"))
        .attr("data", Attr::optional(AttrType::LongStr).column("log_data"))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use forum_config::ModsConfig;
    use forum_mods::{ModSystem, StaticSource};

    fn composed() -> (ModSystem, CoreAnchors) {
        let mut system = ModSystem::new(ModsConfig::default());
        let anchors = declare_core(&mut system.core()).unwrap();
        system.install(&StaticSource::new()).unwrap();
        (system, anchors)
    }

    #[test]
    fn test_core_maps_without_mods() {
        let (system, anchors) = composed();
        assert!(system.catalog().is_mapped());
        for anchor in anchors.all() {
            assert!(anchor.is_composed(), "{} not composed", anchor.name());
        }
        let topic = system.merged("Topic").unwrap();
        assert_eq!(topic.table(), Some("forum_topics"));
        assert!(topic.columns().contains(&"topic_title"));
        assert!(!topic.columns().contains(&"posts"));
    }

    #[test]
    fn test_core_relationships_are_paired() {
        let (system, _) = composed();
        let user = system.catalog().get("User").unwrap();
        let reverse = user.attr("authored_posts").unwrap();
        assert_eq!(reverse.attr.target(), Some("Post"));
        let post = system.catalog().get("Post").unwrap();
        assert_eq!(post.attr("poster").unwrap().attr.target(), Some("User"));
    }

    #[test]
    fn test_topic_is_locked_reads_merged_status() {
        let (system, anchors) = composed();
        let mut topic = anchors
            .topic
            .instantiate([
                ("title", Value::from("Locked")),
                ("forum", Value::Int(1)),
                ("poster", Value::Int(2)),
            ])
            .unwrap();
        assert_eq!(topic.call("is_locked", &[]).unwrap(), Value::Bool(false));

        let locked = system
            .merged("TopicStatus")
            .unwrap()
            .constant("ITEM_LOCKED")
            .cloned()
            .unwrap();
        topic.set("status", locked).unwrap();
        assert_eq!(topic.call("is_locked", &[]).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_user_dateformat_falls_back() {
        let (_, anchors) = composed();
        let mut user = anchors
            .user
            .instantiate([
                ("username", "admin"),
                ("username_clean", "admin"),
            ])
            .unwrap();
        assert_eq!(
            user.call("get_dateformat", &[]).unwrap(),
            Value::from(DEFAULT_DATEFORMAT)
        );
        user.set("dateformat", "Y-m-d").unwrap();
        assert_eq!(user.call("get_dateformat", &[]).unwrap(), Value::from("Y-m-d"));
        assert_eq!(user.call("member_days", &[]).unwrap(), Value::Int(0));
    }
}
