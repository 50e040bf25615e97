//! Topics and posts wait for approval before they become visible

use forum_mods::{Attr, AttrType, ModContext, ModError, Plugin, TypeDef};

pub const NAME: &str = "approve_topic";

#[derive(Debug, Default)]
pub struct ApproveTopic;

impl Plugin for ApproveTopic {
    fn name(&self) -> &str {
        NAME
    }

    fn version(&self) -> Option<&str> {
        Some("1.0")
    }

    fn install(&self, ctx: &mut ModContext<'_>) -> Result<(), ModError> {
        ctx.extend(
            "Topic",
            TypeDef::mixin("ApproveTopicModTopic")
                .attr(
                    "approved",
                    Attr::required(AttrType::Bool)
                        .default(true)
                        .column("topic_approved"),
                )
                .build(),
        )?;
        ctx.extend(
            "Post",
            TypeDef::mixin("ApproveTopicModPost")
                .attr(
                    "approved",
                    Attr::required(AttrType::Bool)
                        .default(true)
                        .column("post_approved"),
                )
                .build(),
        )?;
        Ok(())
    }
}
