use thiserror::Error;

use crate::comments::CommentError;
use crate::validate::ValidationError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything that can abort a generation run.
///
/// There is no partial-document recovery: the first error reached while
/// reflecting models or validating the document is returned to the caller of
/// [`Api::spec`](crate::Api::spec).
#[derive(Debug, Error)]
pub enum Error {
    /// A type with no schema rule (unit, functions, ...) reached the engine.
    #[error("unsupported type: {pkg_path}/{type_name}")]
    UnsupportedType { pkg_path: String, type_name: String },

    #[error("maps must have a string key, but this map is of type {key_type:?}")]
    UnsupportedMapKey { key_type: String },

    #[error("failed to get comments for package {package:?}: {source}")]
    CommentLookup {
        package: String,
        #[source]
        source: CommentError,
    },

    /// Two distinct types normalized to the same component name.
    #[error("component name {name:?} is claimed by both {existing} and {incoming}")]
    ComponentCollision {
        name: String,
        existing: String,
        incoming: String,
    },

    /// A failure inside a field, element or map value, with the path to it.
    #[error("error getting schema of {context}: {source}")]
    Nested {
        context: String,
        #[source]
        source: Box<Error>,
    },

    #[error("failed validation: {0}")]
    Validation(#[from] ValidationError),

    #[error("marshal spec err: {0}")]
    Json(#[from] serde_json::Error),

    #[error("marshal spec err: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("at JSON path {path} → {message}")]
    Decode { path: String, message: String },
}

impl Error {
    pub(crate) fn nested(context: impl Into<String>, source: Error) -> Self {
        Error::Nested { context: context.into(), source: Box::new(source) }
    }

    /// Strip [`Error::Nested`] wrappers down to the failure that started it.
    pub fn innermost(&self) -> &Error {
        match self {
            Error::Nested { source, .. } => source.innermost(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn innermost_unwraps_every_layer() {
        let err = Error::nested(
            "field \"data\" of demo.Body",
            Error::nested("map value", Error::UnsupportedMapKey { key_type: "i64".into() }),
        );
        assert!(matches!(err.innermost(), Error::UnsupportedMapKey { key_type } if key_type == "i64"));
        assert!(err.to_string().starts_with("error getting schema of field \"data\""));
    }
}
