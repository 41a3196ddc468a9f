//! Applies actions to the normalized data.

use super::write_result_to_store;
use super::DataIdFromObject;
use super::NormalizedStore;
use super::WriteContext;
use crate::actions::Action;
use crate::error::WriteError;
use crate::graphql::Response;
use crate::json_ext::Object;
use crate::spec::Query;
use crate::state::ClientState;

/// Computes the data that follows `action`.
///
/// Results are checked against the query states of `previous`, before the
/// action is applied to them: completions of unknown, stopped or superseded
/// requests leave the data untouched.
pub fn data_reducer(
    previous: &ClientState,
    action: &Action,
    data_id_from_object: &dyn DataIdFromObject,
) -> Result<NormalizedStore, WriteError> {
    match action {
        Action::QueryResult {
            query_id,
            request_id,
            result,
        } => {
            let Some(state) = previous.queries.get(query_id) else {
                return Ok(previous.data.clone());
            };
            if state.stopped || state.is_stale(*request_id) {
                tracing::trace!("not writing result {request_id} of query {query_id}");
                return Ok(previous.data.clone());
            }
            write_response(
                &previous.data,
                result,
                &state.query,
                &state.variables,
                data_id_from_object,
            )
        }
        Action::MutationResult {
            mutation_id,
            result,
        } => match previous.mutations.get(mutation_id) {
            Some(state) => write_response(
                &previous.data,
                result,
                &state.mutation,
                &state.variables,
                data_id_from_object,
            ),
            None => Ok(previous.data.clone()),
        },
        Action::StoreReset { .. } => Ok(NormalizedStore::new()),
        _ => Ok(previous.data.clone()),
    }
}

fn write_response(
    store: &NormalizedStore,
    response: &Response,
    query: &Query,
    variables: &Object,
    data_id_from_object: &dyn DataIdFromObject,
) -> Result<NormalizedStore, WriteError> {
    // a response with errors only has nothing to write
    let Some(data) = response.data_object() else {
        return Ok(store.clone());
    };
    write_result_to_store(
        WriteContext {
            result: data,
            data_id: query.root_id(),
            selection_set: query.selection_set(),
            variables,
            fragments: query.fragments(),
            possible_types: query.possible_types(),
            data_id_from_object,
        },
        store,
    )
}
