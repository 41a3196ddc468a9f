//! The normalized store: a flat map of objects linked by references.
//!
//! Results are written with [`write_result_to_store`] and read back with
//! [`read_query_from_store`]. Objects are shared behind [`Arc`] so that every
//! write produces a new snapshot without copying untouched objects.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

pub mod data_reducer;
pub mod key;
pub mod reader;
pub mod writer;

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
pub use key::*;
pub use reader::diff_query_against_store;
pub use reader::read_query_from_store;
pub use reader::ReadContext;
pub use reader::ReadResult;
use serde::Serialize;
pub use writer::write_result_to_store;
pub use writer::WriteContext;

use crate::json_ext::Value;
pub use crate::spec::ROOT_MUTATION;
pub use crate::spec::ROOT_QUERY;
use crate::spec::TYPENAME;

/// The fields of one normalized object, by field storage key.
pub type StoreObject = IndexMap<String, StoreValue>;

/// A value held in a [`StoreObject`].
///
/// Serialized with the variant name as key, so that a JSON leaf never reads
/// like a reference.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreValue {
    /// A leaf: scalar, enum, null, or a JSON value selected without a
    /// selection set.
    Json(Value),
    /// A pointer to another object of the store.
    Reference(IdValue),
    /// A list of values, in result order.
    List(Vec<StoreValue>),
}

/// The key of a referenced object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct IdValue {
    pub id: String,
    /// `true` when the id was derived from the path to the object rather
    /// than declared by the object itself.
    pub generated: bool,
}

/// An immutable snapshot of the normalized data.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct NormalizedStore {
    objects: HashMap<String, Arc<StoreObject>>,
}

impl NormalizedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, store_key: &str) -> Option<&StoreObject> {
        self.objects.get(store_key).map(|object| object.as_ref())
    }

    pub fn contains(&self, store_key: &str) -> bool {
        self.objects.contains_key(store_key)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.objects.keys().map(String::as_str)
    }

    /// Replaces the object stored under `store_key`.
    pub fn insert(&mut self, store_key: impl Into<String>, object: StoreObject) {
        self.objects.insert(store_key.into(), Arc::new(object));
    }

    pub fn remove(&mut self, store_key: &str) -> Option<Arc<StoreObject>> {
        self.objects.remove(store_key)
    }

    /// Returns the object stored under `store_key` for modification, creating
    /// it if needed. Objects shared with other snapshots are copied first.
    pub(crate) fn object_mut(&mut self, store_key: &str) -> &mut StoreObject {
        Arc::make_mut(self.objects.entry(store_key.to_string()).or_default())
    }

    /// Whether both snapshots hold the very same object under `store_key`.
    pub fn shares_object(&self, other: &NormalizedStore, store_key: &str) -> bool {
        match (self.objects.get(store_key), other.objects.get(store_key)) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

/// The `__typename` recorded on a store object, if any.
pub(crate) fn stored_typename(object: &StoreObject) -> Option<&str> {
    match object.get(TYPENAME) {
        Some(StoreValue::Json(Value::String(typename))) => Some(typename.as_str()),
        _ => None,
    }
}
