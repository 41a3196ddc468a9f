//! Normalized GraphQL result cache and query coordination.
//!
//! Query results are flattened into a [`NormalizedStore`] keyed by object
//! identifiers, read back for any query shape, and every outstanding query is
//! tracked by a pure reducer so that a [`Scheduler`] can decide when the
//! network must be hit. [`QueryManager`] wires these pieces to a
//! [`Transport`] and pushes updates to [`ObservableQuery`] subscribers.

#![cfg_attr(feature = "failfast", allow(unreachable_code))]
#![warn(unreachable_pub)]

macro_rules! failfast_debug {
    ($($tokens:tt)+) => {{
        tracing::debug!($($tokens)+);
        #[cfg(feature = "failfast")]
        panic!(
            "failfast triggered. \
            Please remove the feature failfast if you don't want to see these panics"
        );
    }};
}

macro_rules! failfast_error {
    ($($tokens:tt)+) => {{
        tracing::error!($($tokens)+);
        #[cfg(feature = "failfast")]
        panic!(
            "failfast triggered. \
            Please remove the feature failfast if you don't want to see these panics"
        );
    }};
}

pub mod json_ext;

pub mod actions;
mod configuration;
pub mod error;
pub mod graphql;
pub mod mutations;
mod observable;
pub mod queries;
mod query_manager;
mod request;
mod response;
pub mod scheduler;
pub mod spec;
pub mod state;
pub mod store;
mod transport;

pub use actions::Action;
pub use configuration::Configuration;
pub use observable::ObservableQuery;
pub use observable::QueryResult;
pub use query_manager::MutationOptions;
pub use query_manager::QueryManager;
pub use query_manager::WatchQueryOptions;
pub use scheduler::Scheduler;
pub use spec::Query;
pub use state::ClientState;
pub use store::NormalizedStore;
pub use transport::Transport;

#[cfg(test)]
pub(crate) use transport::MockTransport;
