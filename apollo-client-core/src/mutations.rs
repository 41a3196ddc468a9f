//! Mutation lifecycle state.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::actions::Action;
use crate::actions::MutationId;
use crate::error::FetchError;
use crate::graphql;
use crate::json_ext::Object;
use crate::spec::Query;

pub type MutationStore = BTreeMap<MutationId, Arc<MutationState>>;

#[derive(Debug, Clone, PartialEq)]
pub struct MutationState {
    pub mutation: Arc<Query>,
    pub variables: Object,
    pub loading: bool,
    pub error: Option<FetchError>,
    pub graphql_errors: Vec<graphql::Error>,
}

pub fn mutations_reducer(previous: &MutationStore, action: &Action) -> MutationStore {
    let mut mutations = previous.clone();
    match action {
        Action::MutationInit {
            mutation_id,
            mutation,
            variables,
        } => {
            mutations.insert(
                mutation_id.clone(),
                Arc::new(MutationState {
                    mutation: mutation.clone(),
                    variables: variables.clone(),
                    loading: true,
                    error: None,
                    graphql_errors: Vec::new(),
                }),
            );
        }
        Action::MutationResult {
            mutation_id,
            result,
        } => {
            if let Some(state) = mutations.get_mut(mutation_id) {
                let state = Arc::make_mut(state);
                state.loading = false;
                state.error = None;
                state.graphql_errors = result.errors.clone();
            }
        }
        Action::MutationError { mutation_id, error } => {
            if let Some(state) = mutations.get_mut(mutation_id) {
                let state = Arc::make_mut(state);
                state.loading = false;
                state.error = Some(error.clone());
            }
        }
        Action::StoreReset { .. } => mutations.clear(),
        _ => {}
    }
    mutations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphql::Response;
    use crate::Configuration;

    fn init(mutation_id: &str) -> Action {
        Action::MutationInit {
            mutation_id: mutation_id.to_string(),
            mutation: Arc::new(
                Query::parse(
                    "mutation { addTodo(text: \"milk\") { id } }",
                    None,
                    &Configuration::default(),
                )
                .unwrap(),
            ),
            variables: Object::new(),
        }
    }

    #[test]
    fn mutation_lifecycle() {
        let mutations = mutations_reducer(&MutationStore::new(), &init("1"));
        assert!(mutations["1"].loading);

        let mutations = mutations_reducer(
            &mutations,
            &Action::MutationResult {
                mutation_id: "1".to_string(),
                result: Response::builder().build(),
            },
        );
        assert!(!mutations["1"].loading);
        assert_eq!(mutations["1"].error, None);

        let mutations = mutations_reducer(&mutations, &init("2"));
        let mutations = mutations_reducer(
            &mutations,
            &Action::MutationError {
                mutation_id: "2".to_string(),
                error: FetchError::TransportError {
                    reason: "offline".to_string(),
                },
            },
        );
        assert!(mutations["2"].error.is_some());

        let mutations = mutations_reducer(
            &mutations,
            &Action::StoreReset {
                observable_query_ids: Vec::new(),
            },
        );
        assert!(mutations.is_empty());
    }

    #[test]
    fn query_actions_are_ignored() {
        let mutations = mutations_reducer(&MutationStore::new(), &init("1"));
        let after = mutations_reducer(
            &mutations,
            &Action::QueryStop {
                query_id: "1".to_string(),
            },
        );
        assert_eq!(after, mutations);
    }
}
