//! The combined client state and its reducer.

use crate::actions::Action;
use crate::error::WriteError;
use crate::mutations::mutations_reducer;
use crate::mutations::MutationStore;
use crate::queries::queries_reducer;
use crate::queries::QueryStore;
use crate::store::data_reducer::data_reducer;
use crate::store::DataIdFromObject;
use crate::store::NormalizedStore;

/// Everything the client knows: normalized data plus the state of every
/// query and mutation. Cloning is cheap, values are shared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientState {
    pub data: NormalizedStore,
    pub queries: QueryStore,
    pub mutations: MutationStore,
}

impl ClientState {
    /// Returns the state that follows `action`.
    ///
    /// Fails only when a result can't be written to the store, in which case
    /// `self` is still the current state.
    pub fn reduce(
        &self,
        action: &Action,
        data_id_from_object: &dyn DataIdFromObject,
    ) -> Result<ClientState, WriteError> {
        tracing::trace!(action = action.kind(), "reducing");
        let data = data_reducer(self, action, data_id_from_object)?;
        Ok(ClientState {
            data,
            queries: queries_reducer(&self.queries, action),
            mutations: mutations_reducer(&self.mutations, action),
        })
    }
}
