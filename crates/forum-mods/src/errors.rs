use thiserror::Error;

/// Errors raised by the storage-mapping catalog while defining entities or
/// finalizing the mapping
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    #[error("Entity '{0}' is already defined")]
    DuplicateEntity(String),

    #[error("Entity '{0}' is not defined")]
    UnknownEntity(String),

    #[error("{entity}.{attr} refers to unknown entity '{target}'")]
    UnknownTarget {
        entity: String,
        attr: String,
        target: String,
    },

    #[error("Reverse attribute for {entity}.{attr} not found in '{target}'")]
    ReverseNotFound {
        entity: String,
        attr: String,
        target: String,
    },

    #[error("Reverse attribute for {entity}.{attr} is ambiguous in '{target}': {candidates}")]
    AmbiguousReverse {
        entity: String,
        attr: String,
        target: String,
        candidates: String,
    },

    #[error("Inconsistent reverse attributes {entity}.{attr} and {target}.{reverse}")]
    ReverseMismatch {
        entity: String,
        attr: String,
        target: String,
        reverse: String,
    },

    #[error("Both attributes {entity}.{attr} and {target}.{reverse} cannot be required")]
    BothRequired {
        entity: String,
        attr: String,
        target: String,
        reverse: String,
    },

    #[error("Column '{column}' of table '{table}' is used by both {first} and {second}")]
    DuplicateColumn {
        table: String,
        column: String,
        first: String,
        second: String,
    },
}

/// Errors raised by the mod extension system
#[derive(Error, Debug)]
pub enum ModError {
    #[error(
        "{new} attempted to register as extendable under '{name}', but {existing} is already \
         registered under that name. Change the name used for one or the other"
    )]
    DuplicateExtendableName {
        name: String,
        existing: String,
        new: String,
    },

    #[error("No extendable objects found under '{0}'")]
    UnknownAnchor(String),

    #[error(
        "installed('{name}', version={version:?}) evaluated before all mods have been loaded. \
         Move this check out of the import path of the mod or use on_installed to defer it"
    )]
    PrematureInstalledCheck {
        name: String,
        version: Option<String>,
    },

    #[error("{plugin} requires '{required}'{}, which was not found", version_clause(.version))]
    MissingRequiredPlugin {
        plugin: String,
        required: String,
        version: Option<String>,
    },

    #[error("{source}\nwhen constructing {anchor} from bases:\n{}", .bases.join("\n"))]
    Composition {
        anchor: String,
        bases: Vec<String>,
        #[source]
        source: Box<ModError>,
    },

    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),

    #[error("Cannot create a consistent member resolution order for '{0}'")]
    InconsistentHierarchy(String),

    #[error("Found collisions among Choices of {name}:\n{}", .details.join("\n"))]
    ChoicesCollision { name: String, details: Vec<String> },

    #[error("Merged type of '{0}' was requested before composition finished")]
    NotComposed(String),

    #[error("Invalid version string '{0}'")]
    InvalidVersion(String),

    #[error("{entity} has no attribute '{attr}'")]
    UnknownAttribute { entity: String, attr: String },

    #[error("{entity}.{attr} is required")]
    MissingValue { entity: String, attr: String },

    #[error("{entity}.{attr} expects a {expected} value")]
    InvalidValue {
        entity: String,
        attr: String,
        expected: String,
    },

    #[error("{entity} has no method '{method}'")]
    UnknownMethod { entity: String, method: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse mod unit '{unit}': {source}")]
    UnitParse {
        unit: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid mod unit '{unit}': {reason}")]
    InvalidUnit { unit: String, reason: String },

    #[error("Mod '{plugin}' failed: {message}")]
    Plugin { plugin: String, message: String },

    #[error("Mod installation cannot resume from state '{0}'")]
    InvalidState(String),
}

impl ModError {
    /// Whether this error (or the error it wraps) is an unmet dependency
    pub fn is_missing_required(&self) -> bool {
        match self {
            ModError::MissingRequiredPlugin { .. } => true,
            ModError::Composition { source, .. } => source.is_missing_required(),
            _ => false,
        }
    }
}

fn version_clause(version: &Option<String>) -> String {
    match version {
        Some(v) => format!(" with minimum version '{}'", v),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_required_display() {
        let err = ModError::MissingRequiredPlugin {
            plugin: "private_message".to_string(),
            required: "icons".to_string(),
            version: None,
        };
        assert_eq!(
            err.to_string(),
            "private_message requires 'icons', which was not found"
        );

        let err = ModError::MissingRequiredPlugin {
            plugin: "polls".to_string(),
            required: "icons".to_string(),
            version: Some("2.0".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "polls requires 'icons' with minimum version '2.0', which was not found"
        );
    }

    #[test]
    fn test_composition_display_lists_bases() {
        let err = ModError::Composition {
            anchor: "Topic".to_string(),
            bases: vec!["ApproveTopicModTopic".to_string(), "LastPostModTopic".to_string()],
            source: Box::new(ModError::InconsistentHierarchy("Topic".to_string())),
        };
        let message = err.to_string();
        assert!(message.starts_with("Cannot create a consistent"));
        assert!(message.contains("when constructing Topic from bases:"));
        assert!(message.ends_with("ApproveTopicModTopic\nLastPostModTopic"));
    }
}
