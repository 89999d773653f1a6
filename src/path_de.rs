use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// Deserialize with JSON-path context in error messages.
pub fn from_str_with_path<T: DeserializeOwned>(src: &str) -> Result<T> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize::<_, T>(de).map_err(into_decode_error)
}

pub fn from_slice_with_path<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let de = &mut serde_json::Deserializer::from_slice(bytes);
    serde_path_to_error::deserialize::<_, T>(de).map_err(into_decode_error)
}

fn into_decode_error(err: serde_path_to_error::Error<serde_json::Error>) -> Error {
    let path = err.path().to_string();
    Error::Decode { path, message: err.into_inner().to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;

    #[test]
    fn decode_errors_carry_the_json_path() {
        let src = r#"{ "properties": { "id": { "type": "uuid" } } }"#;
        let err = from_str_with_path::<Schema>(src).unwrap_err();
        match err {
            Error::Decode { path, .. } => assert!(path.starts_with("properties.id"), "{path}"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn slices_decode_like_strings() {
        let schema: Schema = from_slice_with_path(br#"{ "type": "string", "format": "date-time" }"#).unwrap();
        assert_eq!(schema, Schema::date_time());
    }
}
