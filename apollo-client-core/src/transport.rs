use async_trait::async_trait;

use crate::error::FetchError;
use crate::graphql::Request;
use crate::graphql::Response;

/// Sends GraphQL requests to the server.
///
/// Implementations report network failures as [`FetchError::TransportError`]
/// and responses that are not GraphQL responses as
/// [`FetchError::MalformedResponse`]; GraphQL errors belong in
/// [`Response::errors`]. Requests are never retried by the client.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn execute(&self, request: Request) -> Result<Response, FetchError>;
}
