//! GraphQL document model: operations, selection sets and fragments.
//!
//! Documents are parsed once with `apollo-parser` and turned into plain Rust
//! values that the store writer and reader walk.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]

mod fragments;
mod input_value;
mod possible_types;
mod query;
mod selection;

use displaydoc::Display;
pub use fragments::*;
pub use input_value::InputValue;
pub use possible_types::*;
pub use query::*;
pub use selection::*;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

pub const TYPENAME: &str = "__typename";

/// GraphQL parsing errors.
#[derive(Error, Debug, Display, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum SpecError {
    /// selection processing recursion limit exceeded
    RecursionLimitExceeded,
    /// parsing error: {0}
    ParsingError(String),
    /// the document does not contain any operation
    NoOperation,
    /// Unknown operation named "{0}"
    UnknownOperation(String),
    /// the document contains several operations, an operation name is required
    AmbiguousOperation,
    /// unknown fragment "{0}"
    UnknownFragment(String),
    /// subscription operation is not supported
    SubscriptionNotSupported,
}
