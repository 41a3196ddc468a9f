use serde::Deserialize;
use serde::Serialize;
use serde_json_bytes::ByteString;
use serde_json_bytes::Map as JsonMap;
use serde_json_bytes::Value;

use crate::json_ext::Object;

/// A GraphQL request, as handed to the [`Transport`](crate::Transport).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct Request {
    /// The GraphQL document text.
    pub query: String,

    /// The optional GraphQL operation name.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub operation_name: Option<String>,

    /// The variables in the form of a JSON object.
    #[serde(skip_serializing_if = "Object::is_empty", default)]
    pub variables: Object,
}

#[buildstructor::buildstructor]
impl Request {
    /// Returns a builder that builds a GraphQL [`Request`].
    ///
    /// * `.query(impl Into<String>)` required
    /// * `.operation_name(impl Into<String>)` optional
    /// * `.variable(impl Into<ByteString>, impl Into<Value>)` optional, repeatable
    #[builder(visibility = "pub")]
    fn new(
        query: String,
        operation_name: Option<String>,
        // Skip the `Object` type alias in order to use buildstructor’s map special-casing
        variables: JsonMap<ByteString, Value>,
    ) -> Self {
        Self {
            query,
            operation_name,
            variables,
        }
    }
}
