use std::pin::Pin;
use std::sync::Weak;
use std::task::Context;
use std::task::Poll;

use futures::Stream;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::actions::QueryId;
use crate::error::FetchError;
use crate::error::QueryManagerError;
use crate::graphql;
use crate::json_ext::Object;
use crate::query_manager::Inner;

/// What a watched query currently resolves to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    /// The data read from the store. Incomplete only when `partial` is set,
    /// which requires the query to accept partial data.
    pub data: Option<Object>,
    /// A request for this query is pending.
    pub loading: bool,
    /// Some selected fields are not in the store.
    pub partial: bool,
    /// GraphQL errors of the last response.
    pub errors: Vec<graphql::Error>,
    pub network_error: Option<FetchError>,
}

/// A stream of the results of a watched query.
///
/// Dropping it, or calling [`ObservableQuery::unsubscribe`], stops the query.
/// The stream ends when the query is stopped.
pub struct ObservableQuery {
    query_id: QueryId,
    receiver: mpsc::UnboundedReceiver<QueryResult>,
    manager: Weak<Inner>,
}

impl ObservableQuery {
    pub(crate) fn new(
        query_id: QueryId,
        receiver: mpsc::UnboundedReceiver<QueryResult>,
        manager: Weak<Inner>,
    ) -> Self {
        Self {
            query_id,
            receiver,
            manager,
        }
    }

    pub fn query_id(&self) -> &str {
        &self.query_id
    }

    /// Fetches the query again, with new variables if provided.
    pub fn refetch(&self, variables: Option<Object>) -> Result<(), QueryManagerError> {
        match self.manager.upgrade() {
            Some(manager) => manager.refetch(&self.query_id, variables),
            None => Err(QueryManagerError::Stopped),
        }
    }

    /// The result as of now, whether or not it was delivered already.
    pub fn current_result(&self) -> Option<QueryResult> {
        self.manager.upgrade()?.current_result(&self.query_id)
    }

    pub fn unsubscribe(self) {
        drop(self)
    }
}

impl Stream for ObservableQuery {
    type Item = QueryResult;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for ObservableQuery {
    fn drop(&mut self) {
        if let Some(manager) = self.manager.upgrade() {
            manager.stop_query(&self.query_id);
        }
    }
}
