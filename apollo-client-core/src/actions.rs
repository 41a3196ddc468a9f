//! The actions that drive every state transition of the client.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::FetchError;
use crate::graphql::Response;
use crate::json_ext::Object;
use crate::spec::Query;

pub type QueryId = String;
pub type MutationId = String;

/// Identifies one network request. Ids increase monotonically, so a
/// completion carrying an id lower than the last one issued for its query is
/// stale.
pub type RequestId = u64;

#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum Action {
    /// A query starts being watched, or is restarted with new options.
    QueryInit {
        query_id: QueryId,
        query: Arc<Query>,
        /// Variables with their defaults applied.
        variables: Object,
        force_fetch: bool,
        return_partial_data: bool,
        poll_interval: Option<Duration>,
        /// Keep the current variables as `previous_variables` when they
        /// change.
        store_previous_variables: bool,
    },
    FetchRequest {
        query_id: QueryId,
        request_id: RequestId,
        requested_at: Instant,
    },
    QueryResult {
        query_id: QueryId,
        request_id: RequestId,
        result: Response,
    },
    QueryError {
        query_id: QueryId,
        request_id: RequestId,
        error: FetchError,
    },
    /// The query was answered from the store, without a request.
    QueryResultClient { query_id: QueryId, complete: bool },
    QueryStop { query_id: QueryId },
    /// Forgets a stopped query once no response can arrive for it anymore.
    /// A query restarted since is kept.
    QueryRemove { query_id: QueryId },
    /// Drops all data. Only the listed queries keep their state, and are
    /// fetched again.
    StoreReset { observable_query_ids: Vec<QueryId> },
    MutationInit {
        mutation_id: MutationId,
        mutation: Arc<Query>,
        variables: Object,
    },
    MutationResult {
        mutation_id: MutationId,
        result: Response,
    },
    MutationError {
        mutation_id: MutationId,
        error: FetchError,
    },
}

impl Action {
    /// The name of the action, as used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::QueryInit { .. } => "QUERY_INIT",
            Action::FetchRequest { .. } => "FETCH_REQUEST",
            Action::QueryResult { .. } => "QUERY_RESULT",
            Action::QueryError { .. } => "QUERY_ERROR",
            Action::QueryResultClient { .. } => "QUERY_RESULT_CLIENT",
            Action::QueryStop { .. } => "QUERY_STOP",
            Action::QueryRemove { .. } => "QUERY_REMOVE",
            Action::StoreReset { .. } => "STORE_RESET",
            Action::MutationInit { .. } => "MUTATION_INIT",
            Action::MutationResult { .. } => "MUTATION_RESULT",
            Action::MutationError { .. } => "MUTATION_ERROR",
        }
    }
}
