//! Denormalization: reading a query back out of the store.

use super::store_field_key;
use super::stored_typename;
use super::NormalizedStore;
use super::StoreObject;
use super::StoreValue;
use crate::error::ReadError;
use crate::json_ext::Object;
use crate::json_ext::Path;
use crate::json_ext::Value;
use crate::json_ext::ValueExt;
use crate::spec::Field;
use crate::spec::FragmentMatch;
use crate::spec::Fragments;
use crate::spec::PossibleTypes;
use crate::spec::Selection;

/// Everything needed to read one query.
#[derive(Clone, Copy)]
pub struct ReadContext<'a> {
    pub store: &'a NormalizedStore,
    /// The store key the query is rooted at (`ROOT_QUERY`...).
    pub root_id: &'a str,
    pub selection_set: &'a [Selection],
    /// Variables, defaults included.
    pub variables: &'a Object,
    pub fragments: &'a Fragments,
    pub possible_types: &'a PossibleTypes,
    /// Returns whatever is available instead of failing on the first missing
    /// field.
    pub return_partial_data: bool,
}

/// The outcome of a store read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadResult {
    /// The result tree, shaped like the selection set. Missing fields are
    /// absent from it.
    pub result: Object,
    /// `true` when at least one selected field could not be found.
    pub is_missing: bool,
}

/// Reads the result of a query from the store.
///
/// Without `return_partial_data`, the first missing field fails the read with
/// [`ReadError::MissingField`]. The store is never modified.
///
/// Fields of a fragment are skipped only when the fragment is known not to
/// apply to the object; when that is unknown they are required like any other.
#[tracing::instrument(skip_all, level = "trace", fields(root_id = context.root_id))]
pub fn read_query_from_store(context: ReadContext<'_>) -> Result<ReadResult, ReadError> {
    let mut reader = Reader {
        store: context.store,
        variables: context.variables,
        fragments: context.fragments,
        possible_types: context.possible_types,
        return_partial_data: context.return_partial_data,
        is_missing: false,
    };
    let mut result = Object::new();
    reader.read_selection_set(
        context.root_id,
        context.store.get(context.root_id),
        context.selection_set,
        &Path::empty(),
        &mut result,
    )?;
    Ok(ReadResult {
        result,
        is_missing: reader.is_missing,
    })
}

/// Whether the store lacks some of the data selected by the query, in which
/// case it has to be fetched.
pub fn diff_query_against_store(context: ReadContext<'_>) -> Result<bool, ReadError> {
    let ReadResult { is_missing, .. } = read_query_from_store(ReadContext {
        return_partial_data: true,
        ..context
    })?;
    Ok(is_missing)
}

struct Reader<'a> {
    store: &'a NormalizedStore,
    variables: &'a Object,
    fragments: &'a Fragments,
    possible_types: &'a PossibleTypes,
    return_partial_data: bool,
    is_missing: bool,
}

impl<'a> Reader<'a> {
    /// Fields selected more than once under the same response key, directly
    /// or through fragments, are merged into one value.
    fn read_selection_set(
        &mut self,
        store_key: &str,
        object: Option<&'a StoreObject>,
        selection_set: &[Selection],
        path: &Path,
        output: &mut Object,
    ) -> Result<(), ReadError> {
        for selection in selection_set {
            match selection {
                Selection::Field(field) => {
                    if field.include_skip.should_skip(self.variables) {
                        continue;
                    }
                    let field_key = store_field_key(field, self.variables);
                    let field_path = path.join(field.response_key());
                    let value = match object.and_then(|object| object.get(&field_key)) {
                        Some(stored) => {
                            let location = (store_key, field_key.as_str());
                            self.read_value(stored, field, location, &field_path)?
                        }
                        None => None,
                    };
                    match value {
                        Some(value) => match output.get_mut(field.response_key()) {
                            Some(existing) => existing.deep_merge(value),
                            None => {
                                output.insert(field.response_key(), value);
                            }
                        },
                        None => self.missing(&field_key, store_key, field_path)?,
                    }
                }
                Selection::InlineFragment {
                    type_condition,
                    include_skip,
                    selection_set,
                    ..
                } => {
                    if include_skip.should_skip(self.variables) {
                        continue;
                    }
                    if let Some(condition) = type_condition {
                        if self.does_not_apply(object, condition) {
                            continue;
                        }
                    }
                    self.read_selection_set(store_key, object, selection_set, path, output)?;
                }
                Selection::FragmentSpread {
                    name, include_skip, ..
                } => {
                    if include_skip.should_skip(self.variables) {
                        continue;
                    }
                    let fragment = match self.fragments.get(name) {
                        Some(fragment) => fragment,
                        None => {
                            failfast_debug!("unknown fragment {name} while reading the store");
                            return Err(ReadError::UnknownFragment(name.clone()));
                        }
                    };
                    if self.does_not_apply(object, &fragment.type_condition) {
                        continue;
                    }
                    self.read_selection_set(
                        store_key,
                        object,
                        &fragment.selection_set,
                        path,
                        output,
                    )?;
                }
            }
        }
        Ok(())
    }

    /// Returns `None` when the value points to an object that is not in the
    /// store. `location` is the store key and field key the value was found at.
    fn read_value(
        &mut self,
        stored: &'a StoreValue,
        field: &Field,
        location: (&str, &str),
        path: &Path,
    ) -> Result<Option<Value>, ReadError> {
        match stored {
            StoreValue::Json(value) => Ok(Some(value.clone())),
            StoreValue::Reference(reference) => {
                let store = self.store;
                let Some(object) = store.get(&reference.id) else {
                    tracing::debug!("dangling reference to {}", reference.id);
                    return Ok(None);
                };
                let mut output = Object::new();
                let selection_set = field.selection_set.as_deref().unwrap_or_default();
                self.read_selection_set(&reference.id, Some(object), selection_set, path, &mut output)?;
                Ok(Some(Value::Object(output)))
            }
            StoreValue::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    let item_path = path.join(index);
                    match self.read_value(item, field, location, &item_path)? {
                        Some(value) => values.push(value),
                        None => {
                            let (store_key, field_key) = location;
                            self.missing(field_key, store_key, item_path)?;
                            values.push(Value::Null);
                        }
                    }
                }
                Ok(Some(Value::Array(values)))
            }
        }
    }

    fn does_not_apply(&self, object: Option<&StoreObject>, type_condition: &str) -> bool {
        let typename = object.and_then(stored_typename);
        self.possible_types.match_fragment(typename, type_condition) == FragmentMatch::DoesNotApply
    }

    fn missing(&mut self, field: &str, store_key: &str, path: Path) -> Result<(), ReadError> {
        if self.return_partial_data {
            self.is_missing = true;
            Ok(())
        } else {
            Err(ReadError::MissingField {
                field: field.to_string(),
                store_key: store_key.to_string(),
                path,
            })
        }
    }
}
