//! GraphQL wire types exchanged with the [`Transport`](crate::Transport).

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json_bytes::ByteString;
use serde_json_bytes::Map as JsonMap;
use serde_json_bytes::Value;

use crate::error::FetchError;
use crate::json_ext::Object;
use crate::json_ext::Path;
pub use crate::request::Request;
pub use crate::response::Response;

/// Where an error points in the sent document.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

/// An entry of the `errors` array of a [`Response`].
///
/// Errors are kept on the query state next to the data that came with them,
/// and handed to watchers in [`QueryResult::errors`](crate::QueryResult::errors).
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct Error {
    pub message: String,

    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub locations: Vec<Location>,

    /// Set for field errors, relative to [`Response::data`].
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub path: Option<Path>,

    #[serde(skip_serializing_if = "Object::is_empty", default)]
    pub extensions: Object,
}

#[buildstructor::buildstructor]
impl Error {
    /// Returns a builder, mostly useful to transports and tests.
    ///
    /// * `.message(impl Into<String>)` required
    /// * `.location(Location)` optional, repeatable
    /// * `.path(Path)` optional
    /// * `.extension(impl Into<ByteString>, impl Into<Value>)` optional, repeatable
    #[builder(visibility = "pub")]
    fn new(
        message: String,
        locations: Vec<Location>,
        path: Option<Path>,
        // Skip the `Object` type alias in order to use buildstructor’s map special-casing
        extensions: JsonMap<ByteString, Value>,
    ) -> Self {
        Self {
            message,
            locations,
            path,
            extensions,
        }
    }

    /// Decodes one entry of a response's `errors` array.
    pub(crate) fn from_value(value: Value) -> Result<Error, FetchError> {
        serde_json_bytes::from_value(value).map_err(|error| FetchError::MalformedResponse {
            reason: format!("invalid error entry: {error}"),
        })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.message.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::json;

    use super::*;

    #[test]
    fn error_from_value() {
        let error = Error::from_value(json!({
            "message": "not allowed",
            "locations": [{"line": 1, "column": 3}],
            "path": ["user", 0, "email"],
            "extensions": {"code": "FORBIDDEN"}
        }))
        .unwrap();

        assert_eq!(
            error,
            Error::builder()
                .message("not allowed")
                .location(Location { line: 1, column: 3 })
                .path(Path::from(vec!["user"]).join(0).join("email"))
                .extension("code", "FORBIDDEN")
                .build()
        );
        assert_eq!(error.to_string(), "not allowed");
    }

    #[test]
    fn malformed_error_entry() {
        assert!(matches!(
            Error::from_value(json!(["not", "an", "object"])),
            Err(FetchError::MalformedResponse { .. })
        ));
    }
}
