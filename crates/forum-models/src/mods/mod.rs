//! Mods shipped with the forum
//!
//! They are linked into the mod directory source: a mod only installs when
//! its unit file is present in the mod directory and the load order selects
//! it.

pub mod approve_topic;
pub mod icons;
pub mod last_post;
pub mod private_message;

use forum_mods::StaticSource;

/// Every built-in mod
pub fn builtin_mods() -> StaticSource {
    StaticSource::new()
        .with(approve_topic::ApproveTopic)
        .with(icons::Icons)
        .with(last_post::LastPost)
        .with(private_message::PrivateMessage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::declare_core;
    use forum_config::ModsConfig;
    use forum_mods::{ModError, ModSystem};

    fn install(installed: &[&str], fail: bool) -> Result<ModSystem, ModError> {
        let mut system = ModSystem::new(ModsConfig {
            installed: installed.iter().map(|s| s.to_string()).collect(),
            fail_on_missing_required: fail,
            ..ModsConfig::default()
        });
        declare_core(&mut system.core())?;
        system.install(&builtin_mods())?;
        Ok(system)
    }

    #[test]
    fn test_builtin_names() {
        let source = builtin_mods();
        let names: Vec<&str> = source.names().collect();
        assert_eq!(
            names,
            vec!["approve_topic", "icons", "last_post", "private_message"]
        );
    }

    #[test]
    fn test_all_builtin_mods_compose() {
        let system = install(&["..."], true).unwrap();
        assert_eq!(
            system.installed_mods(),
            vec![
                ("approve_topic", Some("1.0")),
                ("icons", Some("1.1")),
                ("last_post", Some("1.0")),
                ("private_message", Some("1.0")),
            ]
        );
        assert_eq!(system.report().callbacks_run, 1);

        let topic = system.merged("Topic").unwrap();
        let bases: Vec<&str> = topic.bases().iter().map(|b| &**b).collect();
        assert_eq!(
            bases,
            vec!["ApproveTopicModTopic", "IconsModTopic", "LastPostModTopic"]
        );
        let message = system.merged("Message").unwrap();
        assert!(message.attr("icon").is_some());
        let icon = system.merged("Icon").unwrap();
        assert!(icon.attr("messages").is_some());
        let user = system.merged("User").unwrap();
        assert!(user.attr("allow_pm").is_some());
        assert!(user.attr("last_poster_for_topics").is_some());
    }

    #[test]
    fn test_private_message_is_dropped_without_icons() {
        let system = install(&["private_message", "last_post"], false).unwrap();
        assert_eq!(system.report().uninstalled, vec!["private_message".to_string()]);
        assert!(!system.is_installed("private_message"));
        assert!(system.anchor("Message").is_none());
        assert!(!system.catalog().contains("Message"));
        let user = system.merged("User").unwrap();
        assert!(user.attr("allow_pm").is_none());
        assert!(user.attr("last_poster_for_forums").is_some());
    }
}
