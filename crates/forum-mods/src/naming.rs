//! Naming helpers for extendable objects
//!
//! An anchor is stored in the catalog under its root's name plus
//! [`EXTENDED_OBJECT_SUFFIX`]; the pretty name strips it back off. The
//! throwaway entity used while repairing metadata carries [`TEMP_SUFFIX`].

/// Suffix appended to the catalog name of every anchor
pub const EXTENDED_OBJECT_SUFFIX: &str = "Extended";

/// Suffix of the throwaway entity built during metadata repair
pub const TEMP_SUFFIX: &str = "_TEMP";

/// Returns the name with [`EXTENDED_OBJECT_SUFFIX`] added
pub fn extended_object_name(name: &str) -> String {
    format!("{}{}", name, EXTENDED_OBJECT_SUFFIX)
}

/// Returns the name with the last [`EXTENDED_OBJECT_SUFFIX`] removed
pub fn extended_object_name_pretty(name: &str) -> &str {
    name.rsplit_once(EXTENDED_OBJECT_SUFFIX)
        .map_or(name, |(head, _)| head)
}

pub fn temp_object_name(name: &str) -> String {
    format!("{}{}", name, TEMP_SUFFIX)
}
