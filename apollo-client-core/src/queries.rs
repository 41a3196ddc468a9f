//! Per query lifecycle state.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::actions::Action;
use crate::actions::QueryId;
use crate::actions::RequestId;
use crate::error::FetchError;
use crate::graphql;
use crate::json_ext::Object;
use crate::spec::Query;

/// The state of every outstanding query, ordered by id.
pub type QueryStore = BTreeMap<QueryId, Arc<QueryState>>;

#[derive(Debug, Clone, PartialEq)]
pub struct QueryState {
    pub query: Arc<Query>,
    pub variables: Object,
    /// The variables used before the last re-initialization, kept until a
    /// result for the new ones arrives.
    pub previous_variables: Option<Object>,
    pub loading: bool,
    pub stopped: bool,
    pub in_flight: bool,
    pub force_fetch: bool,
    pub return_partial_data: bool,
    pub poll_interval: Option<Duration>,
    /// Id of the last request sent for this query, `0` if none was.
    pub last_request_id: RequestId,
    /// When the last request was sent. `None` until the query is fetched
    /// after its initialization.
    pub last_request_time: Option<Instant>,
    pub network_error: Option<FetchError>,
    pub graphql_errors: Vec<graphql::Error>,
}

impl QueryState {
    /// Whether a completion for `request_id` arrives after a newer request
    /// was sent.
    pub fn is_stale(&self, request_id: RequestId) -> bool {
        request_id < self.last_request_id
    }
}

/// Applies an action to the query states.
///
/// Unknown query ids are ignored, so that actions racing with a stop or a
/// reset are harmless. The normalized store is never looked at.
pub fn queries_reducer(previous: &QueryStore, action: &Action) -> QueryStore {
    let mut queries = previous.clone();
    match action {
        Action::QueryInit {
            query_id,
            query,
            variables,
            force_fetch,
            return_partial_data,
            poll_interval,
            store_previous_variables,
        } => {
            let existing = queries.get(query_id);
            let previous_variables = existing
                .filter(|existing| *store_previous_variables && existing.variables != *variables)
                .map(|existing| existing.variables.clone());
            let last_request_id = existing.map_or(0, |existing| existing.last_request_id);

            queries.insert(
                query_id.clone(),
                Arc::new(QueryState {
                    query: query.clone(),
                    variables: variables.clone(),
                    previous_variables,
                    loading: true,
                    stopped: false,
                    in_flight: false,
                    force_fetch: *force_fetch,
                    return_partial_data: *return_partial_data,
                    poll_interval: *poll_interval,
                    last_request_id,
                    last_request_time: None,
                    network_error: None,
                    graphql_errors: Vec::new(),
                }),
            );
        }
        Action::FetchRequest {
            query_id,
            request_id,
            requested_at,
        } => {
            if let Some(state) = queries.get_mut(query_id) {
                let state = Arc::make_mut(state);
                state.in_flight = true;
                state.last_request_id = *request_id;
                state.last_request_time = Some(*requested_at);
            }
        }
        Action::QueryResult {
            query_id,
            request_id,
            result,
        } => {
            if let Some(state) = updatable(&mut queries, query_id, *request_id) {
                state.loading = false;
                state.in_flight = false;
                state.network_error = None;
                state.graphql_errors = result.errors.clone();
                state.previous_variables = None;
            }
        }
        Action::QueryError {
            query_id,
            request_id,
            error,
        } => {
            if let Some(state) = updatable(&mut queries, query_id, *request_id) {
                state.loading = false;
                state.in_flight = false;
                state.network_error = Some(error.clone());
            }
        }
        Action::QueryResultClient { query_id, complete } => {
            if let Some(state) = queries.get_mut(query_id) {
                let state = Arc::make_mut(state);
                state.loading = !complete;
                state.network_error = None;
                state.graphql_errors.clear();
                state.previous_variables = None;
            }
        }
        Action::QueryStop { query_id } => {
            if let Some(state) = queries.get_mut(query_id) {
                let state = Arc::make_mut(state);
                state.loading = false;
                state.stopped = true;
            }
        }
        Action::QueryRemove { query_id } => {
            if queries.get(query_id).map_or(false, |state| state.stopped) {
                queries.remove(query_id);
            }
        }
        Action::StoreReset {
            observable_query_ids,
        } => {
            queries.retain(|query_id, _| observable_query_ids.contains(query_id));
            for state in queries.values_mut() {
                let state = Arc::make_mut(state);
                state.loading = true;
                state.in_flight = false;
                state.last_request_time = None;
            }
        }
        Action::MutationInit { .. }
        | Action::MutationResult { .. }
        | Action::MutationError { .. } => {}
    }
    queries
}

/// The state of `query_id` for modification, unless the query is unknown,
/// stopped, or `request_id` is stale.
fn updatable<'a>(
    queries: &'a mut QueryStore,
    query_id: &str,
    request_id: RequestId,
) -> Option<&'a mut QueryState> {
    let state = queries.get_mut(query_id)?;
    if state.stopped {
        tracing::debug!("ignoring completion of request {request_id} for stopped query {query_id}");
        return None;
    }
    if state.is_stale(request_id) {
        tracing::debug!(
            "ignoring stale completion of request {request_id} for query {query_id}, \
             request {} was sent since",
            state.last_request_id
        );
        return None;
    }
    Some(Arc::make_mut(state))
}
