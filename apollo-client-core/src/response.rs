use serde::Deserialize;
use serde::Serialize;
use serde_json_bytes::ByteString;
use serde_json_bytes::Map;

use crate::error::FetchError;
use crate::graphql::Error;
use crate::json_ext::Object;
use crate::json_ext::Value;

/// A GraphQL response, as returned by the [`Transport`](crate::Transport).
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct Response {
    /// The response data.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub data: Option<Value>,

    /// The optional GraphQL errors encountered.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub errors: Vec<Error>,

    /// The optional GraphQL extensions.
    #[serde(skip_serializing_if = "Object::is_empty", default)]
    pub extensions: Object,
}

#[buildstructor::buildstructor]
impl Response {
    /// Constructor
    #[builder(visibility = "pub")]
    fn new(data: Option<Value>, errors: Vec<Error>, extensions: Map<ByteString, Value>) -> Self {
        Self {
            data,
            errors,
            extensions,
        }
    }

    /// Decodes a response from its JSON representation.
    ///
    /// This will return an error if the input is not a response object.
    pub fn from_value(value: Value) -> Result<Response, FetchError> {
        let mut object = match value {
            Value::Object(object) => object,
            other => {
                return Err(FetchError::MalformedResponse {
                    reason: format!("expected a JSON object, got {other}"),
                });
            }
        };

        let data = match object.remove("data") {
            None | Some(Value::Null) => None,
            Some(data @ Value::Object(_)) => Some(data),
            Some(other) => {
                return Err(FetchError::MalformedResponse {
                    reason: format!("'data' must be an object, got {other}"),
                });
            }
        };
        let errors = match object.remove("errors") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(errors)) => errors
                .into_iter()
                .map(Error::from_value)
                .collect::<Result<Vec<_>, _>>()?,
            Some(other) => {
                return Err(FetchError::MalformedResponse {
                    reason: format!("'errors' must be an array, got {other}"),
                });
            }
        };
        let extensions = match object.remove("extensions") {
            Some(Value::Object(extensions)) => extensions,
            _ => Object::default(),
        };

        Ok(Response {
            data,
            errors,
            extensions,
        })
    }

    /// The `data` object, if the server sent one.
    pub fn data_object(&self) -> Option<&Object> {
        self.data.as_ref().and_then(Value::as_object)
    }
}
