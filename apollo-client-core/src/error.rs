//! Client errors.
use displaydoc::Display;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

pub use crate::configuration::ConfigurationError;
use crate::graphql;
use crate::json_ext::Object;
use crate::json_ext::Path;
pub use crate::spec::SpecError;

/// Error raised while normalizing a result into the store.
///
/// A write that fails leaves the store it was given untouched.
#[derive(Error, Display, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum WriteError {
    /// missing field '{field}' on result object '{store_key}'
    MissingField {
        /// The response key that was selected but absent.
        field: String,
        /// The store key of the object being written.
        store_key: String,
    },

    /// field '{field}' on '{store_key}' has a selection set but its value is not an object
    ExpectedObject {
        /// The response key of the field.
        field: String,
        /// The store key of the object being written.
        store_key: String,
    },

    /// the object at '{field}' on '{store_key}' has no identifier, but the store already references '{existing_id}' there
    IdConflict {
        /// The field storage key.
        field: String,
        /// The store key of the parent object.
        store_key: String,
        /// The declared identifier already stored for that field.
        existing_id: String,
    },

    /// unknown fragment '{0}'
    UnknownFragment(String),
}

/// Error raised while reading a query from the store.
#[derive(Error, Display, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ReadError {
    /// can't find field '{field}' on object '{store_key}' (at path '{path}')
    MissingField {
        /// The field storage key that was looked up.
        field: String,
        /// The store key of the object that was read.
        store_key: String,
        /// Where the field sits in the requested result.
        path: Path,
    },

    /// unknown fragment '{0}'
    UnknownFragment(String),
}

/// Errors surfaced when talking to the GraphQL endpoint.
///
/// These are recorded on the query state through a `QueryError` action; the
/// core never retries.
#[derive(Error, Display, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
#[ignore_extra_doc_attributes]
#[non_exhaustive]
pub enum FetchError {
    /// network request failed: {reason}
    ///
    /// Note that this relates to a transport error and not a GraphQL error.
    TransportError {
        /// The reason the request failed.
        reason: String,
    },

    /// response was malformed: {reason}
    MalformedResponse {
        /// The reason the response could not be used.
        reason: String,
    },

    /// could not write the result to the store: {error}
    StoreWrite {
        /// The underlying normalization failure.
        error: WriteError,
    },
}

impl FetchError {
    /// Convert the fetch error to a GraphQL error.
    pub fn to_graphql_error(&self, path: Option<Path>) -> graphql::Error {
        let code = match self {
            FetchError::TransportError { .. } => "NETWORK_ERROR",
            FetchError::MalformedResponse { .. } => "MALFORMED_RESPONSE",
            FetchError::StoreWrite { .. } => "STORE_WRITE_FAILED",
        };
        let mut extensions = Object::new();
        extensions.insert("code", code.into());
        graphql::Error {
            message: self.to_string(),
            path,
            extensions,
            ..Default::default()
        }
    }
}

impl From<WriteError> for FetchError {
    fn from(error: WriteError) -> Self {
        FetchError::StoreWrite { error }
    }
}

/// Errors returned by the [`QueryManager`](crate::QueryManager) API.
#[derive(Error, Display, Debug, Clone)]
#[non_exhaustive]
pub enum QueryManagerError {
    /// invalid query document: {0}
    Spec(#[from] SpecError),

    /// cache read failed: {0}
    Read(#[from] ReadError),

    /// cache write failed: {0}
    Write(#[from] WriteError),

    /// request failed: {0}
    Fetch(#[from] FetchError),

    /// the server returned errors: {0:?}
    GraphQL(Vec<graphql::Error>),

    /// unknown query id '{0}'
    UnknownQuery(String),

    /// expected a {expected} operation
    WrongOperationKind {
        /// The operation kind the method accepts.
        expected: &'static str,
    },

    /// the query was stopped before it produced a result
    Stopped,
}
