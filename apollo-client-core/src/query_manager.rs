//! Wires the store, the reducers and the scheduler to a [`Transport`].

use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Weak;
use std::time::Duration;

use futures::StreamExt;
use parking_lot::Mutex;
use serde_json_bytes::ByteString;
use serde_json_bytes::Map as JsonMap;
use serde_json_bytes::Value;
use tokio::sync::mpsc;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::actions::Action;
use crate::actions::QueryId;
use crate::error::FetchError;
use crate::error::QueryManagerError;
use crate::error::WriteError;
use crate::graphql::Request;
use crate::graphql::Response;
use crate::json_ext::Object;
use crate::observable::ObservableQuery;
use crate::observable::QueryResult;
use crate::queries::QueryState;
use crate::scheduler::Scheduler;
use crate::spec::OperationKind;
use crate::spec::Query;
use crate::state::ClientState;
use crate::store::read_query_from_store;
use crate::store::DataIdFromObject;
use crate::store::NoDataId;
use crate::store::NormalizedStore;
use crate::store::ReadContext;
use crate::store::ReadResult;
use crate::Configuration;
use crate::Transport;

/// Options of [`QueryManager::watch_query`] and [`QueryManager::query`].
#[derive(Debug, Clone, Default)]
pub struct WatchQueryOptions {
    pub query: String,
    pub operation_name: Option<String>,
    pub variables: Object,
    /// Go to the network even when the store has the data. Defaults to the
    /// configured value.
    pub force_fetch: Option<bool>,
    /// Deliver what the store has while the rest is fetched. Defaults to the
    /// configured value.
    pub return_partial_data: Option<bool>,
    pub poll_interval: Option<Duration>,
}

#[buildstructor::buildstructor]
impl WatchQueryOptions {
    /// * `.query(impl Into<String>)` required
    /// * `.operation_name(impl Into<String>)` optional
    /// * `.variable(impl Into<ByteString>, impl Into<Value>)` optional, repeatable
    /// * `.force_fetch(bool)`, `.return_partial_data(bool)` optional
    /// * `.poll_interval(Duration)` optional
    #[builder(visibility = "pub")]
    fn new(
        query: String,
        operation_name: Option<String>,
        // Skip the `Object` type alias in order to use buildstructor’s map special-casing
        variables: JsonMap<ByteString, Value>,
        force_fetch: Option<bool>,
        return_partial_data: Option<bool>,
        poll_interval: Option<Duration>,
    ) -> Self {
        Self {
            query,
            operation_name,
            variables,
            force_fetch,
            return_partial_data,
            poll_interval,
        }
    }
}

/// Options of [`QueryManager::mutate`].
#[derive(Debug, Clone, Default)]
pub struct MutationOptions {
    pub mutation: String,
    pub operation_name: Option<String>,
    pub variables: Object,
}

#[buildstructor::buildstructor]
impl MutationOptions {
    /// * `.mutation(impl Into<String>)` required
    /// * `.operation_name(impl Into<String>)` optional
    /// * `.variable(impl Into<ByteString>, impl Into<Value>)` optional, repeatable
    #[builder(visibility = "pub")]
    fn new(
        mutation: String,
        operation_name: Option<String>,
        variables: JsonMap<ByteString, Value>,
    ) -> Self {
        Self {
            mutation,
            operation_name,
            variables,
        }
    }
}

/// Runs queries and mutations against a [`Transport`], caching their results
/// in a normalized store.
///
/// Every state change goes through [`ClientState::reduce`]. After each one
/// the scheduler decides which queries to fetch, and watchers whose result
/// changed are notified. A background task wakes polling queries up; it
/// stops when the last clone of the manager is dropped.
///
/// Must be built from within a tokio runtime.
#[derive(Clone)]
pub struct QueryManager {
    inner: Arc<Inner>,
}

pub(crate) struct Inner {
    transport: Arc<dyn Transport>,
    configuration: Configuration,
    data_id_from_object: Arc<dyn DataIdFromObject>,
    state: Mutex<ManagerState>,
    next_id: AtomicU64,
    next_request_id: AtomicU64,
    wakeup: Arc<Notify>,
}

#[derive(Default)]
struct ManagerState {
    client: ClientState,
    scheduler: Scheduler,
    watchers: HashMap<QueryId, Watcher>,
}

struct Watcher {
    sender: mpsc::UnboundedSender<QueryResult>,
    last: Option<QueryResult>,
}

#[buildstructor::buildstructor]
impl QueryManager {
    /// Returns a builder.
    ///
    /// * `.transport(Arc<dyn Transport>)` required
    /// * `.configuration(Configuration)` optional
    /// * `.data_id_from_object(Arc<dyn DataIdFromObject>)` optional, objects
    ///   are stored by path when absent
    #[builder(visibility = "pub")]
    fn new(
        transport: Arc<dyn Transport>,
        configuration: Option<Configuration>,
        data_id_from_object: Option<Arc<dyn DataIdFromObject>>,
    ) -> Self {
        let wakeup = Arc::new(Notify::new());
        let inner = Arc::new(Inner {
            transport,
            configuration: configuration.unwrap_or_default(),
            data_id_from_object: data_id_from_object.unwrap_or_else(|| Arc::new(NoDataId)),
            state: Mutex::new(ManagerState::default()),
            next_id: AtomicU64::new(1),
            next_request_id: AtomicU64::new(1),
            wakeup: wakeup.clone(),
        });
        tokio::spawn(drive(Arc::downgrade(&inner), wakeup));
        Self { inner }
    }
}

impl QueryManager {
    /// Starts watching a query.
    ///
    /// The returned stream yields a [`QueryResult`] every time the result of
    /// the query changes, whether because of its own fetches or because
    /// other operations wrote overlapping data.
    pub fn watch_query(
        &self,
        options: WatchQueryOptions,
    ) -> Result<ObservableQuery, QueryManagerError> {
        let inner = &self.inner;
        let query = Arc::new(Query::parse(
            options.query,
            options.operation_name.as_deref(),
            &inner.configuration,
        )?);
        if query.kind() != OperationKind::Query {
            return Err(QueryManagerError::WrongOperationKind { expected: "query" });
        }

        let query_id = inner.next_id();
        let (sender, receiver) = mpsc::unbounded_channel();
        let variables = query.variables_with_defaults(&options.variables);
        let init = Action::QueryInit {
            query_id: query_id.clone(),
            query,
            variables,
            force_fetch: options
                .force_fetch
                .unwrap_or(inner.configuration.force_fetch),
            return_partial_data: options
                .return_partial_data
                .unwrap_or(inner.configuration.return_partial_data),
            poll_interval: inner.configuration.poll_interval(options.poll_interval),
            store_previous_variables: false,
        };

        let mut state = inner.state.lock();
        inner.init_query(&mut state, init)?;
        state
            .watchers
            .insert(query_id.clone(), Watcher { sender, last: None });
        inner.tick(&mut state, Instant::now());
        drop(state);

        tracing::debug!("watching query {query_id}");
        Ok(ObservableQuery::new(
            query_id,
            receiver,
            Arc::downgrade(&self.inner),
        ))
    }

    /// Runs a query once and returns its first settled result.
    pub async fn query(&self, options: WatchQueryOptions) -> Result<QueryResult, QueryManagerError> {
        let mut observable = self.watch_query(options)?;
        while let Some(result) = observable.next().await {
            if result.loading {
                continue;
            }
            if let Some(error) = result.network_error {
                return Err(QueryManagerError::Fetch(error));
            }
            if result.data.is_none() && !result.errors.is_empty() {
                return Err(QueryManagerError::GraphQL(result.errors));
            }
            return Ok(result);
        }
        Err(QueryManagerError::Stopped)
    }

    /// Sends a mutation and writes its result to the store.
    ///
    /// Returns the server response, GraphQL errors included.
    pub async fn mutate(&self, options: MutationOptions) -> Result<Response, QueryManagerError> {
        let inner = &self.inner;
        let mutation = Arc::new(Query::parse(
            options.mutation,
            options.operation_name.as_deref(),
            &inner.configuration,
        )?);
        if mutation.kind() != OperationKind::Mutation {
            return Err(QueryManagerError::WrongOperationKind {
                expected: "mutation",
            });
        }

        let mutation_id = inner.next_id();
        let variables = mutation.variables_with_defaults(&options.variables);
        let request = Request {
            query: mutation.as_str().to_string(),
            operation_name: mutation.operation_name().map(String::from),
            variables: variables.clone(),
        };
        {
            let mut state = inner.state.lock();
            inner.dispatch(
                &mut state,
                Action::MutationInit {
                    mutation_id: mutation_id.clone(),
                    mutation,
                    variables,
                },
            )?;
        }

        let result = inner.transport.execute(request).await;

        let mut state = inner.state.lock();
        let outcome = match result {
            Ok(response) => {
                let action = Action::MutationResult {
                    mutation_id: mutation_id.clone(),
                    result: response.clone(),
                };
                match inner.dispatch(&mut state, action) {
                    Ok(()) => Ok(response),
                    Err(error) => {
                        inner.dispatch_infallible(
                            &mut state,
                            Action::MutationError {
                                mutation_id,
                                error: error.clone().into(),
                            },
                        );
                        Err(QueryManagerError::Write(error))
                    }
                }
            }
            Err(error) => {
                inner.dispatch_infallible(
                    &mut state,
                    Action::MutationError {
                        mutation_id,
                        error: error.clone(),
                    },
                );
                Err(QueryManagerError::Fetch(error))
            }
        };
        inner.tick(&mut state, Instant::now());
        outcome
    }

    /// Fetches a watched query again, optionally with new variables.
    pub fn refetch(
        &self,
        query_id: &str,
        variables: Option<Object>,
    ) -> Result<(), QueryManagerError> {
        self.inner.refetch(query_id, variables)
    }

    /// Stops a query: it won't be fetched or delivered anymore. A request in
    /// flight is not cancelled, its result is ignored. The query is forgotten
    /// once no request for it is in flight.
    pub fn stop_query(&self, query_id: &str) {
        self.inner.stop_query(query_id)
    }

    /// Drops all cached data and refetches the watched queries.
    pub fn reset_store(&self) {
        let inner = &self.inner;
        let mut state = inner.state.lock();
        let observable_query_ids = state.watchers.keys().cloned().collect();
        inner.dispatch_infallible(
            &mut state,
            Action::StoreReset {
                observable_query_ids,
            },
        );
        inner.tick(&mut state, Instant::now());
    }

    /// Reads a query from the store, without going to the network.
    pub fn read_query(
        &self,
        query: &str,
        variables: Object,
    ) -> Result<Object, QueryManagerError> {
        let query = Query::parse(query, None, &self.inner.configuration)?;
        let variables = query.variables_with_defaults(&variables);
        let state = self.inner.state.lock();
        let ReadResult { result, .. } = read_query_from_store(ReadContext {
            store: &state.client.data,
            root_id: query.root_id(),
            selection_set: query.selection_set(),
            variables: &variables,
            fragments: query.fragments(),
            possible_types: query.possible_types(),
            return_partial_data: false,
        })?;
        Ok(result)
    }

    /// The current normalized data.
    pub fn store_snapshot(&self) -> NormalizedStore {
        self.inner.state.lock().client.data.clone()
    }

    pub fn query_state(&self, query_id: &str) -> Option<Arc<QueryState>> {
        self.inner.state.lock().client.queries.get(query_id).cloned()
    }
}

impl Inner {
    fn next_id(&self) -> String {
        self.next_id.fetch_add(1, Ordering::Relaxed).to_string()
    }

    fn dispatch(&self, state: &mut ManagerState, action: Action) -> Result<(), WriteError> {
        state.client = state.client.reduce(&action, self.data_id_from_object.as_ref())?;
        Ok(())
    }

    /// Dispatches an action that doesn't write results.
    fn dispatch_infallible(&self, state: &mut ManagerState, action: Action) {
        let kind = action.kind();
        if let Err(error) = self.dispatch(state, action) {
            failfast_error!("{kind} failed to apply: {error}");
        }
    }

    /// Registers a query and answers it from the store when possible.
    fn init_query(&self, state: &mut ManagerState, init: Action) -> Result<(), QueryManagerError> {
        let Action::QueryInit {
            query_id,
            force_fetch,
            return_partial_data,
            ..
        } = &init
        else {
            return Ok(());
        };
        let (query_id, force_fetch, return_partial_data) =
            (query_id.clone(), *force_fetch, *return_partial_data);
        self.dispatch(state, init)?;
        if force_fetch {
            return Ok(());
        }

        let Some(query_state) = state.client.queries.get(&query_id).cloned() else {
            return Ok(());
        };
        let ReadResult { is_missing, .. } = read_query_from_store(ReadContext {
            store: &state.client.data,
            root_id: query_state.query.root_id(),
            selection_set: query_state.query.selection_set(),
            variables: &query_state.variables,
            fragments: query_state.query.fragments(),
            possible_types: query_state.query.possible_types(),
            return_partial_data: true,
        })?;
        if !is_missing || return_partial_data {
            tracing::trace!(
                "query {query_id} answered from the store (complete: {})",
                !is_missing
            );
            self.dispatch(
                state,
                Action::QueryResultClient {
                    query_id,
                    complete: !is_missing,
                },
            )?;
        }
        Ok(())
    }

    /// Fires the queries the scheduler asks for, then notifies watchers.
    fn tick(self: &Arc<Self>, state: &mut ManagerState, now: Instant) {
        let schedule = state.scheduler.schedule(&state.client.queries, now);
        for query_id in schedule.fire {
            self.fetch(state, query_id, now);
        }
        if schedule.timer_replaced {
            self.wakeup.notify_one();
        }
        self.broadcast(state);
    }

    fn fetch(self: &Arc<Self>, state: &mut ManagerState, query_id: QueryId, now: Instant) {
        let Some(query_state) = state.client.queries.get(&query_id).cloned() else {
            return;
        };
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("fetching query {query_id} (request {request_id})");
        self.dispatch_infallible(
            state,
            Action::FetchRequest {
                query_id: query_id.clone(),
                request_id,
                requested_at: now,
            },
        );

        let request = Request {
            query: query_state.query.as_str().to_string(),
            operation_name: query_state.query.operation_name().map(String::from),
            variables: query_state.variables.clone(),
        };
        let transport = self.transport.clone();
        let inner = Arc::downgrade(self);
        tokio::spawn(async move {
            let result = transport.execute(request).await;
            if let Some(inner) = inner.upgrade() {
                inner.complete_fetch(query_id, request_id, result);
            }
        });
    }

    fn complete_fetch(
        self: &Arc<Self>,
        query_id: QueryId,
        request_id: u64,
        result: Result<Response, FetchError>,
    ) {
        let mut state = self.state.lock();
        let action = match result {
            Ok(result) => Action::QueryResult {
                query_id: query_id.clone(),
                request_id,
                result,
            },
            Err(error) => {
                tracing::debug!("request {request_id} of query {query_id} failed: {error}");
                Action::QueryError {
                    query_id: query_id.clone(),
                    request_id,
                    error,
                }
            }
        };
        // the last request of a stopped query is the last thing it waits for
        let stopped_and_done = state
            .client
            .queries
            .get(&query_id)
            .map_or(false, |query_state| {
                query_state.stopped && !query_state.is_stale(request_id)
            });
        if let Err(error) = self.dispatch(&mut state, action) {
            tracing::debug!("could not write result {request_id} of query {query_id}: {error}");
            self.dispatch_infallible(
                &mut state,
                Action::QueryError {
                    query_id: query_id.clone(),
                    request_id,
                    error: error.into(),
                },
            );
        }
        if stopped_and_done {
            self.dispatch_infallible(&mut state, Action::QueryRemove { query_id });
        }
        self.tick(&mut state, Instant::now());
    }

    /// Sends every watcher its current result, if it changed.
    fn broadcast(&self, state: &mut ManagerState) {
        let ManagerState {
            client, watchers, ..
        } = state;
        watchers.retain(|query_id, watcher| {
            let Some(query_state) = client.queries.get(query_id) else {
                return true;
            };
            if query_state.stopped {
                return true;
            }
            let Some(result) = current_result(&client.data, query_state) else {
                return true;
            };
            if watcher.last.as_ref() == Some(&result) {
                return true;
            }
            watcher.last = Some(result.clone());
            watcher.sender.send(result).is_ok()
        });
    }

    pub(crate) fn refetch(
        self: &Arc<Self>,
        query_id: &str,
        variables: Option<Object>,
    ) -> Result<(), QueryManagerError> {
        let mut state = self.state.lock();
        let existing = state
            .client
            .queries
            .get(query_id)
            .cloned()
            .ok_or_else(|| QueryManagerError::UnknownQuery(query_id.to_string()))?;
        let variables = match variables {
            Some(variables) => existing.query.variables_with_defaults(&variables),
            None => existing.variables.clone(),
        };
        self.dispatch(
            &mut state,
            Action::QueryInit {
                query_id: query_id.to_string(),
                query: existing.query.clone(),
                variables,
                force_fetch: existing.force_fetch,
                return_partial_data: existing.return_partial_data,
                poll_interval: existing.poll_interval,
                store_previous_variables: true,
            },
        )?;
        self.tick(&mut state, Instant::now());
        Ok(())
    }

    pub(crate) fn stop_query(self: &Arc<Self>, query_id: &str) {
        let mut state = self.state.lock();
        state.watchers.remove(query_id);
        self.dispatch_infallible(
            &mut state,
            Action::QueryStop {
                query_id: query_id.to_string(),
            },
        );
        // otherwise removed once its response arrives
        let idle = state
            .client
            .queries
            .get(query_id)
            .map_or(false, |query_state| !query_state.in_flight);
        if idle {
            self.dispatch_infallible(
                &mut state,
                Action::QueryRemove {
                    query_id: query_id.to_string(),
                },
            );
        }
        tracing::debug!("stopped query {query_id}");
        self.tick(&mut state, Instant::now());
    }

    pub(crate) fn current_result(&self, query_id: &str) -> Option<QueryResult> {
        let state = self.state.lock();
        let query_state = state.client.queries.get(query_id)?;
        current_result(&state.client.data, query_state)
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        // lets the driver see that the manager is gone
        self.wakeup.notify_one();
    }
}

/// What a watcher of the query should see, `None` while there is nothing to
/// show yet.
fn current_result(data: &NormalizedStore, query_state: &QueryState) -> Option<QueryResult> {
    let read = read_query_from_store(ReadContext {
        store: data,
        root_id: query_state.query.root_id(),
        selection_set: query_state.query.selection_set(),
        variables: &query_state.variables,
        fragments: query_state.query.fragments(),
        possible_types: query_state.query.possible_types(),
        return_partial_data: true,
    });
    let (data, partial) = match read {
        Ok(ReadResult {
            result,
            is_missing: false,
        }) => (Some(result), false),
        Ok(ReadResult {
            result,
            is_missing: true,
        }) if query_state.return_partial_data => (Some(result), true),
        Ok(_) => (None, true),
        Err(error) => {
            failfast_debug!("could not read query from the store: {error}");
            (None, true)
        }
    };
    if query_state.loading && data.is_none() && query_state.network_error.is_none() {
        return None;
    }
    Some(QueryResult {
        data,
        loading: query_state.loading,
        partial,
        errors: query_state.graphql_errors.clone(),
        network_error: query_state.network_error.clone(),
    })
}

/// Wakes polling queries up. Sleeps until the scheduler's pending wake-up or
/// until the timer changes, and ends with the manager.
async fn drive(inner: Weak<Inner>, wakeup: Arc<Notify>) {
    loop {
        let deadline = match inner.upgrade() {
            Some(inner) => {
                let pending = inner.state.lock().scheduler.pending_wakeup();
                pending
            }
            None => return,
        };
        match deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = tokio::time::sleep_until(deadline) => {}
                    _ = wakeup.notified() => {}
                }
            }
            None => wakeup.notified().await,
        }
        let Some(inner) = inner.upgrade() else {
            return;
        };
        let mut state = inner.state.lock();
        inner.tick(&mut state, Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use serde_json_bytes::json;
    use test_log::test;

    use super::*;
    use crate::store::TypenameAndId;
    use crate::MockTransport;

    fn manager(transport: MockTransport) -> QueryManager {
        let transport: Arc<dyn Transport> = Arc::new(transport);
        QueryManager::builder()
            .transport(transport)
            .data_id_from_object(Arc::new(TypenameAndId) as Arc<dyn DataIdFromObject>)
            .configuration(Configuration {
                add_typename: true,
                ..Default::default()
            })
            .build()
    }

    fn response(data: Value) -> Response {
        Response::builder().data(data).build()
    }

    #[test(tokio::test)]
    async fn query_is_fetched_once_then_served_from_the_store() {
        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .times(1)
            .withf(|request| {
                request.query == "query { user(id: 1) { id name __typename } }"
                    && request.variables.is_empty()
            })
            .returning(|_| {
                Ok(response(
                    json!({"user": {"id": "1", "name": "Ann", "__typename": "User"}}),
                ))
            });
        let manager = manager(transport);

        let options = WatchQueryOptions::builder()
            .query("{ user(id: 1) { id name } }")
            .build();
        let result = manager.query(options.clone()).await.unwrap();
        assert_eq!(
            result.data,
            json!({"user": {"id": "1", "name": "Ann", "__typename": "User"}}).as_object().cloned()
        );
        assert!(!result.partial);

        // second run: no request
        let result = manager.query(options).await.unwrap();
        assert!(!result.loading);
        assert_eq!(
            result.data,
            json!({"user": {"id": "1", "name": "Ann", "__typename": "User"}}).as_object().cloned()
        );
    }

    #[test(tokio::test)]
    async fn stopped_queries_are_forgotten() {
        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .times(1)
            .returning(|_| Ok(response(json!({"count": 1}))));
        let manager = manager(transport);

        let mut observable = manager
            .watch_query(WatchQueryOptions::builder().query("{ count }").build())
            .unwrap();
        let query_id = observable.query_id().to_string();
        let result = observable.next().await.unwrap();
        assert_eq!(result.data, json!({"count": 1}).as_object().cloned());
        assert!(manager.query_state(&query_id).is_some());

        drop(observable);
        assert_eq!(manager.query_state(&query_id), None);
        assert_eq!(
            manager.read_query("{ count }", Object::new()).unwrap(),
            json!({"count": 1}).as_object().cloned().unwrap()
        );
    }

    #[test(tokio::test)]
    async fn network_errors_are_reported() {
        let mut transport = MockTransport::new();
        transport.expect_execute().times(1).returning(|_| {
            Err(FetchError::TransportError {
                reason: "connection refused".to_string(),
            })
        });
        let manager = manager(transport);

        let error = manager
            .query(WatchQueryOptions::builder().query("{ count }").build())
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            QueryManagerError::Fetch(FetchError::TransportError { .. })
        ));
    }

    #[test(tokio::test)]
    async fn malformed_results_become_query_errors() {
        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .times(1)
            .returning(|_| Ok(response(json!({"user": {"id": "1", "__typename": "User"}}))));
        let manager = manager(transport);

        let error = manager
            .query(
                WatchQueryOptions::builder()
                    .query("{ user { id name } }")
                    .build(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            QueryManagerError::Fetch(FetchError::StoreWrite {
                error: WriteError::MissingField { .. }
            })
        ));
        assert!(manager.store_snapshot().is_empty());
    }

    #[test(tokio::test)]
    async fn graphql_errors_without_data() {
        let mut transport = MockTransport::new();
        transport.expect_execute().times(1).returning(|_| {
            Ok(Response::builder()
                .error(crate::graphql::Error::builder().message("forbidden").build())
                .build())
        });
        let manager = manager(transport);

        let error = manager
            .query(WatchQueryOptions::builder().query("{ secret }").build())
            .await
            .unwrap_err();
        assert!(matches!(error, QueryManagerError::GraphQL(errors) if errors[0].message == "forbidden"));
    }

    #[test(tokio::test)]
    async fn mutations_update_watched_queries() {
        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .withf(|request| request.query.starts_with("query"))
            .times(1)
            .returning(|_| {
                Ok(response(
                    json!({"post": {"id": "1", "likes": 1, "__typename": "Post"}}),
                ))
            });
        transport
            .expect_execute()
            .withf(|request| request.query.starts_with("mutation"))
            .times(1)
            .returning(|request| {
                assert_eq!(request.variables.get("id"), Some(&json!("1")));
                Ok(response(
                    json!({"like": {"id": "1", "likes": 2, "__typename": "Post"}}),
                ))
            });
        let manager = manager(transport);

        let mut observable = manager
            .watch_query(
                WatchQueryOptions::builder()
                    .query("{ post { id likes } }")
                    .build(),
            )
            .unwrap();
        let first = observable.next().await.unwrap();
        assert_eq!(
            first.data,
            json!({"post": {"id": "1", "likes": 1, "__typename": "Post"}}).as_object().cloned()
        );

        let response = manager
            .mutate(
                MutationOptions::builder()
                    .mutation("mutation Like($id: ID!) { like(id: $id) { id likes } }")
                    .variable("id", "1")
                    .build(),
            )
            .await
            .unwrap();
        assert!(response.errors.is_empty());

        let second = observable.next().await.unwrap();
        assert_eq!(
            second.data,
            json!({"post": {"id": "1", "likes": 2, "__typename": "Post"}}).as_object().cloned()
        );
    }

    #[test(tokio::test)]
    async fn operation_kinds_are_checked() {
        let manager = manager(MockTransport::new());
        assert!(matches!(
            manager.watch_query(
                WatchQueryOptions::builder()
                    .query("mutation { a }")
                    .build()
            ),
            Err(QueryManagerError::WrongOperationKind { expected: "query" })
        ));
        assert!(matches!(
            manager
                .mutate(MutationOptions::builder().mutation("{ a }").build())
                .await,
            Err(QueryManagerError::WrongOperationKind {
                expected: "mutation"
            })
        ));
        assert!(matches!(
            manager.refetch("404", None),
            Err(QueryManagerError::UnknownQuery(_))
        ));
    }
}
