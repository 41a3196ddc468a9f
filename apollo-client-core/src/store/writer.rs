//! Normalization of query results into the store.

use super::generated_id;
use super::store_field_key;
use super::DataIdFromObject;
use super::IdValue;
use super::NormalizedStore;
use super::StoreValue;
use super::GENERATED_ID_PREFIX;
use crate::error::WriteError;
use crate::json_ext::Object;
use crate::json_ext::Value;
use crate::spec::Field;
use crate::spec::FragmentMatch;
use crate::spec::Fragments;
use crate::spec::PossibleTypes;
use crate::spec::Selection;
use crate::spec::TYPENAME;

/// Everything needed to write one result.
#[derive(Clone, Copy)]
pub struct WriteContext<'a> {
    /// The result object, `data` of a GraphQL response for a root write.
    pub result: &'a Object,
    /// The store key the result is written under (`ROOT_QUERY`...).
    pub data_id: &'a str,
    pub selection_set: &'a [Selection],
    /// Variables, defaults included.
    pub variables: &'a Object,
    pub fragments: &'a Fragments,
    pub possible_types: &'a PossibleTypes,
    pub data_id_from_object: &'a dyn DataIdFromObject,
}

/// Writes `result` into a copy of `store` and returns it.
///
/// The write is atomic: when it fails, nothing of it is visible in `store`.
///
/// Fragments known not to apply to an object are not written. When that is
/// unknown, a fragment none of whose fields are in the result is taken as not
/// applying; otherwise all of its fields are required.
#[tracing::instrument(skip_all, level = "trace", fields(data_id = context.data_id))]
pub fn write_result_to_store(
    context: WriteContext<'_>,
    store: &NormalizedStore,
) -> Result<NormalizedStore, WriteError> {
    let mut store = store.clone();
    let writer = Writer {
        variables: context.variables,
        fragments: context.fragments,
        possible_types: context.possible_types,
        data_id_from_object: context.data_id_from_object,
    };
    writer.write_selection_set(
        &mut store,
        context.data_id,
        context.result,
        context.selection_set,
    )?;
    Ok(store)
}

struct Writer<'a> {
    variables: &'a Object,
    fragments: &'a Fragments,
    possible_types: &'a PossibleTypes,
    data_id_from_object: &'a dyn DataIdFromObject,
}

impl Writer<'_> {
    fn write_selection_set(
        &self,
        store: &mut NormalizedStore,
        data_id: &str,
        result: &Object,
        selection_set: &[Selection],
    ) -> Result<(), WriteError> {
        for selection in selection_set {
            match selection {
                Selection::Field(field) => {
                    if field.include_skip.should_skip(self.variables) {
                        continue;
                    }
                    match result.get(field.response_key()) {
                        Some(value) => self.write_field(store, data_id, field, value)?,
                        None => {
                            return Err(WriteError::MissingField {
                                field: field.response_key().to_string(),
                                store_key: data_id.to_string(),
                            })
                        }
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
                        if !self.applies(result, condition, selection_set)? {
                            continue;
                        }
                    }
                    self.write_selection_set(store, data_id, result, selection_set)?;
                }
                Selection::FragmentSpread {
                    name, include_skip, ..
                } => {
                    if include_skip.should_skip(self.variables) {
                        continue;
                    }
                    let fragment = self
                        .fragments
                        .get(name)
                        .ok_or_else(|| WriteError::UnknownFragment(name.clone()))?;
                    if !self.applies(result, &fragment.type_condition, &fragment.selection_set)? {
                        continue;
                    }
                    self.write_selection_set(store, data_id, result, &fragment.selection_set)?;
                }
            }
        }
        Ok(())
    }

    /// Whether a fragment is written for this result object.
    fn applies(
        &self,
        result: &Object,
        type_condition: &str,
        selection_set: &[Selection],
    ) -> Result<bool, WriteError> {
        let typename = result.get(TYPENAME).and_then(|typename| typename.as_str());
        Ok(match self.possible_types.match_fragment(typename, type_condition) {
            FragmentMatch::Applies => true,
            FragmentMatch::DoesNotApply => false,
            FragmentMatch::Unknown => {
                let selected = self.selects_any(result, selection_set)?;
                if !selected {
                    tracing::trace!(
                        "no field of the fragment on {type_condition} in the result, not writing it"
                    );
                }
                selected
            }
        })
    }

    /// Whether `result` holds any field of `selection_set` besides
    /// `__typename`, fragments included.
    fn selects_any(&self, result: &Object, selection_set: &[Selection]) -> Result<bool, WriteError> {
        for selection in selection_set {
            let found = match selection {
                Selection::Field(field) => {
                    field.name != TYPENAME && result.contains_key(field.response_key())
                }
                Selection::InlineFragment { selection_set, .. } => {
                    self.selects_any(result, selection_set)?
                }
                Selection::FragmentSpread { name, .. } => {
                    let fragment = self
                        .fragments
                        .get(name)
                        .ok_or_else(|| WriteError::UnknownFragment(name.clone()))?;
                    self.selects_any(result, &fragment.selection_set)?
                }
            };
            if found {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn write_field(
        &self,
        store: &mut NormalizedStore,
        data_id: &str,
        field: &Field,
        value: &Value,
    ) -> Result<(), WriteError> {
        let field_key = store_field_key(field, self.variables);

        let store_value = match &field.selection_set {
            None => StoreValue::Json(value.clone()),
            Some(selection_set) => {
                let existing = store
                    .get(data_id)
                    .and_then(|object| object.get(&field_key))
                    .cloned();
                let location = FieldLocation {
                    data_id,
                    field_key: &field_key,
                    response_key: field.response_key(),
                };
                self.write_value(
                    store,
                    &location,
                    value,
                    selection_set,
                    existing.as_ref(),
                    &mut Vec::new(),
                )?
            }
        };

        store
            .object_mut(data_id)
            .insert(field_key, store_value);
        Ok(())
    }

    /// Writes a value selected with a selection set: an object, null, or a
    /// (nested) list of those.
    fn write_value(
        &self,
        store: &mut NormalizedStore,
        location: &FieldLocation<'_>,
        value: &Value,
        selection_set: &[Selection],
        existing: Option<&StoreValue>,
        indices: &mut Vec<usize>,
    ) -> Result<StoreValue, WriteError> {
        match value {
            Value::Null => Ok(StoreValue::Json(Value::Null)),
            Value::Object(object) => {
                let generated = generated_id(location.data_id, location.field_key, indices);
                let existing = match existing {
                    Some(StoreValue::Reference(existing)) => Some(existing),
                    _ => None,
                };
                self.write_object(store, location, object, selection_set, generated, existing)
                    .map(StoreValue::Reference)
            }
            Value::Array(items) => {
                let existing_items = match existing {
                    Some(StoreValue::List(existing_items)) => existing_items.as_slice(),
                    _ => &[],
                };
                let mut values = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    indices.push(index);
                    let value = self.write_value(
                        store,
                        location,
                        item,
                        selection_set,
                        existing_items.get(index),
                        indices,
                    );
                    indices.pop();
                    values.push(value?);
                }
                Ok(StoreValue::List(values))
            }
            _ => Err(WriteError::ExpectedObject {
                field: location.response_key.to_string(),
                store_key: location.data_id.to_string(),
            }),
        }
    }

    fn write_object(
        &self,
        store: &mut NormalizedStore,
        location: &FieldLocation<'_>,
        object: &Object,
        selection_set: &[Selection],
        generated: String,
        existing: Option<&IdValue>,
    ) -> Result<IdValue, WriteError> {
        let declared = self
            .data_id_from_object
            .data_id(object)
            .filter(|id| {
                if id.starts_with(GENERATED_ID_PREFIX) {
                    tracing::debug!(
                        "ignoring object identifier {id}: identifiers starting with \
                         '{GENERATED_ID_PREFIX}' are reserved for generated ids"
                    );
                    false
                } else {
                    true
                }
            });
        let id = match declared {
            Some(id) => IdValue {
                id,
                generated: false,
            },
            None => IdValue {
                id: generated,
                generated: true,
            },
        };

        if let Some(existing) = existing {
            if existing.generated && existing.id != id.id {
                // the object was only reachable by its path until now
                merge_generated(store, &existing.id, &id.id);
            } else if !existing.generated && id.generated {
                return Err(WriteError::IdConflict {
                    field: location.field_key.to_string(),
                    store_key: location.data_id.to_string(),
                    existing_id: existing.id.clone(),
                });
            }
        }

        self.write_selection_set(store, &id.id, object, selection_set)?;
        Ok(id)
    }
}

struct FieldLocation<'a> {
    data_id: &'a str,
    field_key: &'a str,
    response_key: &'a str,
}

/// Moves the fields of the generated object `generated` into `target`, then
/// removes it. Fields already present on `target` win. Generated children
/// present on both sides are merged the same way.
fn merge_generated(store: &mut NormalizedStore, generated: &str, target: &str) {
    let Some(generated_object) = store.remove(generated) else {
        return;
    };
    tracing::trace!("merging generated object {generated} into {target}");

    for (key, value) in generated_object.iter() {
        let target_value = store.get(target).and_then(|object| object.get(key)).cloned();
        match (value, target_value) {
            (StoreValue::Reference(from), Some(StoreValue::Reference(to)))
                if from.generated && to.generated && from.id != to.id =>
            {
                merge_generated(store, &from.id, &to.id);
            }
            (_, Some(_)) => {}
            (value, None) => {
                store.object_mut(target).insert(key.clone(), value.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use insta::assert_json_snapshot;
    use serde_json_bytes::json;

    use super::*;
    use crate::spec::Query;
    use crate::store::NoDataId;
    use crate::store::TypenameAndId;
    use crate::store::ROOT_QUERY;
    use crate::Configuration;

    fn object(value: Value) -> Object {
        value.as_object().cloned().unwrap()
    }

    fn write(
        query: &str,
        result: Value,
        variables: Value,
        data_id_from_object: &dyn DataIdFromObject,
        store: &NormalizedStore,
    ) -> Result<NormalizedStore, WriteError> {
        write_with(
            &Configuration::default(),
            query,
            result,
            variables,
            data_id_from_object,
            store,
        )
    }

    fn write_with(
        configuration: &Configuration,
        query: &str,
        result: Value,
        variables: Value,
        data_id_from_object: &dyn DataIdFromObject,
        store: &NormalizedStore,
    ) -> Result<NormalizedStore, WriteError> {
        let query = Query::parse(query, None, configuration).unwrap();
        let variables = query.variables_with_defaults(&object(variables));
        write_result_to_store(
            WriteContext {
                result: &object(result),
                data_id: ROOT_QUERY,
                selection_set: query.selection_set(),
                variables: &variables,
                fragments: query.fragments(),
                possible_types: query.possible_types(),
                data_id_from_object,
            },
            store,
        )
    }

    fn field<'a>(store: &'a NormalizedStore, id: &str, key: &str) -> &'a StoreValue {
        store
            .get(id)
            .unwrap_or_else(|| panic!("no object {id}"))
            .get(key)
            .unwrap_or_else(|| panic!("no field {key} on {id}"))
    }

    fn reference(id: &str, generated: bool) -> StoreValue {
        StoreValue::Reference(IdValue {
            id: id.to_string(),
            generated,
        })
    }

    #[test]
    fn normalizes_nested_objects_and_lists() {
        let store = write(
            r#"query Hero($episode: Episode) {
                hero(episode: $episode) {
                    id
                    __typename
                    name
                    friends { id __typename name }
                    stats { strength }
                    appearsIn
                }
            }"#,
            json!({
                "hero": {
                    "id": "2001",
                    "__typename": "Droid",
                    "name": "R2-D2",
                    "friends": [
                        {"id": "1000", "__typename": "Human", "name": "Luke Skywalker"},
                        {"id": "1002", "__typename": "Human", "name": "Han Solo"},
                    ],
                    "stats": {"strength": 10},
                    "appearsIn": ["NEWHOPE", "EMPIRE", "JEDI"],
                }
            }),
            json!({"episode": "JEDI"}),
            &TypenameAndId,
            &NormalizedStore::new(),
        )
        .unwrap();

        insta::with_settings!({sort_maps => true}, {
            assert_json_snapshot!(store);
        });
    }

    #[test]
    fn writing_twice_is_idempotent() {
        let query = "{ user(id: 1) { name address { city } tags } }";
        let result = json!({"user": {"name": "Ann", "address": {"city": "Paris"}, "tags": ["a"]}});
        let once = write(query, result.clone(), json!({}), &NoDataId, &NormalizedStore::new()).unwrap();
        let twice = write(query, result, json!({}), &NoDataId, &once).unwrap();
        assert_eq!(once, twice);
        assert_eq!(
            field(&once, ROOT_QUERY, r#"user({"id":1})"#),
            &reference(r#"$ROOT_QUERY.user({"id":1})"#, true)
        );
        assert_eq!(
            field(&once, r#"$ROOT_QUERY.user({"id":1})"#, "address"),
            &reference(r#"$ROOT_QUERY.user({"id":1}).address"#, true)
        );
    }

    #[test]
    fn writes_merge_with_existing_objects() {
        let store = write(
            "{ user { id __typename name } }",
            json!({"user": {"id": "1", "__typename": "User", "name": "Ann"}}),
            json!({}),
            &TypenameAndId,
            &NormalizedStore::new(),
        )
        .unwrap();
        let store = write(
            "{ me { id __typename email } }",
            json!({"me": {"id": "1", "__typename": "User", "email": "ann@example.com"}}),
            json!({}),
            &TypenameAndId,
            &store,
        )
        .unwrap();

        let user = store.get("User:1").unwrap();
        assert_eq!(user.get("name"), Some(&StoreValue::Json(json!("Ann"))));
        assert_eq!(
            user.get("email"),
            Some(&StoreValue::Json(json!("ann@example.com")))
        );
    }

    #[test]
    fn skipped_fields_keep_their_cached_value() {
        let query = "query Q($withEmail: Boolean) { user { name email @include(if: $withEmail) } }";
        let store = write(
            query,
            json!({"user": {"name": "Ann", "email": "ann@example.com"}}),
            json!({"withEmail": true}),
            &NoDataId,
            &NormalizedStore::new(),
        )
        .unwrap();
        let store = write(
            query,
            json!({"user": {"name": "Annie"}}),
            json!({"withEmail": false}),
            &NoDataId,
            &store,
        )
        .unwrap();

        assert_eq!(
            field(&store, "$ROOT_QUERY.user", "email"),
            &StoreValue::Json(json!("ann@example.com"))
        );
        assert_eq!(
            field(&store, "$ROOT_QUERY.user", "name"),
            &StoreValue::Json(json!("Annie"))
        );
    }

    #[test]
    fn fragments_are_walked_inline() {
        let store = write(
            "{ hero { __typename ...Details ... on Droid { primaryFunction } ... on Human { height } } }
             fragment Details on Character { name }",
            json!({"hero": {"__typename": "Droid", "name": "R2-D2", "primaryFunction": "Astromech"}}),
            json!({}),
            &NoDataId,
            &NormalizedStore::new(),
        )
        .unwrap();
        let hero = store.get("$ROOT_QUERY.hero").unwrap();
        assert_eq!(hero.get("name"), Some(&StoreValue::Json(json!("R2-D2"))));
        assert_eq!(
            hero.get("primaryFunction"),
            Some(&StoreValue::Json(json!("Astromech")))
        );
        assert_eq!(hero.get("height"), None);
    }

    #[test]
    fn fragment_partly_in_the_result_is_required() {
        let error = write(
            "{ hero { __typename ...Details } } fragment Details on Character { name height }",
            json!({"hero": {"__typename": "Human", "name": "Luke"}}),
            json!({}),
            &NoDataId,
            &NormalizedStore::new(),
        )
        .unwrap_err();
        assert_eq!(
            error,
            WriteError::MissingField {
                field: "height".to_string(),
                store_key: "$ROOT_QUERY.hero".to_string(),
            }
        );
    }

    #[test]
    fn possible_types_decide_which_fragments_are_written() {
        let mut configuration = Configuration::default();
        configuration
            .possible_types
            .insert("Character", ["Droid", "Human"]);
        let query = "{ hero { __typename ...Details ... on Human { height } } }
                     fragment Details on Character { name }";

        let error = write_with(
            &configuration,
            query,
            json!({"hero": {"__typename": "Droid"}}),
            json!({}),
            &NoDataId,
            &NormalizedStore::new(),
        )
        .unwrap_err();
        assert_eq!(
            error,
            WriteError::MissingField {
                field: "name".to_string(),
                store_key: "$ROOT_QUERY.hero".to_string(),
            }
        );

        let store = write_with(
            &configuration,
            query,
            json!({"hero": {"__typename": "Droid", "name": "R2-D2", "height": 0.96}}),
            json!({}),
            &NoDataId,
            &NormalizedStore::new(),
        )
        .unwrap();
        let hero = store.get("$ROOT_QUERY.hero").unwrap();
        assert_eq!(hero.get("name"), Some(&StoreValue::Json(json!("R2-D2"))));
        assert_eq!(hero.get("height"), None);
    }

    #[test]
    fn nulls_and_nested_lists() {
        let store = write(
            "{ matrix { value } nothing { value } }",
            json!({"matrix": [[{"value": 1}, null], []], "nothing": null}),
            json!({}),
            &NoDataId,
            &NormalizedStore::new(),
        )
        .unwrap();
        assert_eq!(
            field(&store, ROOT_QUERY, "matrix"),
            &StoreValue::List(vec![
                StoreValue::List(vec![
                    reference("$ROOT_QUERY.matrix.0.0", true),
                    StoreValue::Json(Value::Null)
                ]),
                StoreValue::List(vec![]),
            ])
        );
        assert_eq!(
            field(&store, ROOT_QUERY, "nothing"),
            &StoreValue::Json(Value::Null)
        );
    }

    #[test]
    fn missing_field_aborts_the_whole_write() {
        let existing = write(
            "{ a }",
            json!({"a": 1}),
            json!({}),
            &NoDataId,
            &NormalizedStore::new(),
        )
        .unwrap();
        let error = write(
            "{ a user { name email } }",
            json!({"a": 2, "user": {"name": "Ann"}}),
            json!({}),
            &NoDataId,
            &existing,
        )
        .unwrap_err();
        assert_eq!(
            error,
            WriteError::MissingField {
                field: "email".to_string(),
                store_key: "$ROOT_QUERY.user".to_string(),
            }
        );
        assert_eq!(field(&existing, ROOT_QUERY, "a"), &StoreValue::Json(json!(1)));
        assert!(!existing.contains("$ROOT_QUERY.user"));
    }

    #[test]
    fn scalar_where_an_object_is_expected() {
        let error = write(
            "{ user { name } }",
            json!({"user": "Ann"}),
            json!({}),
            &NoDataId,
            &NormalizedStore::new(),
        )
        .unwrap_err();
        assert!(matches!(error, WriteError::ExpectedObject { field, .. } if field == "user"));
    }

    #[test]
    fn generated_object_merges_into_declared_one() {
        let store = write(
            "{ user { name friend { name } } }",
            json!({"user": {"name": "Ann", "friend": {"name": "Bob"}}}),
            json!({}),
            &NoDataId,
            &NormalizedStore::new(),
        )
        .unwrap();
        let store = write(
            "{ user { id __typename } }",
            json!({"user": {"id": "1", "__typename": "User"}}),
            json!({}),
            &TypenameAndId,
            &store,
        )
        .unwrap();

        assert_eq!(field(&store, ROOT_QUERY, "user"), &reference("User:1", false));
        assert_eq!(
            field(&store, "User:1", "name"),
            &StoreValue::Json(json!("Ann"))
        );
        assert!(!store.contains("$ROOT_QUERY.user"));

        // later writes of the child move it under the declared parent
        let store = write(
            "{ user { id __typename friend { name } } }",
            json!({"user": {"id": "1", "__typename": "User", "friend": {"name": "Bobby"}}}),
            json!({}),
            &TypenameAndId,
            &store,
        )
        .unwrap();
        assert_eq!(
            field(&store, "User:1", "friend"),
            &reference("$User:1.friend", true)
        );
        assert!(!store.contains("$ROOT_QUERY.user.friend"));
        assert_eq!(
            field(&store, "$User:1.friend", "name"),
            &StoreValue::Json(json!("Bobby"))
        );
    }

    #[test]
    fn declared_object_cannot_lose_its_identity() {
        let store = write(
            "{ user { id __typename name } }",
            json!({"user": {"id": "1", "__typename": "User", "name": "Ann"}}),
            json!({}),
            &TypenameAndId,
            &NormalizedStore::new(),
        )
        .unwrap();
        let error = write(
            "{ user { name } }",
            json!({"user": {"name": "Ann"}}),
            json!({}),
            &TypenameAndId,
            &store,
        )
        .unwrap_err();
        assert_eq!(
            error,
            WriteError::IdConflict {
                field: "user".to_string(),
                store_key: ROOT_QUERY.to_string(),
                existing_id: "User:1".to_string(),
            }
        );
    }

    #[test]
    fn reserved_identifiers_fall_back_to_generated_ids() {
        let data_id = |object: &Object| {
            object
                .get("id")
                .and_then(|id| id.as_str())
                .map(|id| format!("${id}"))
        };
        let store = write(
            "{ user { id } }",
            json!({"user": {"id": "1"}}),
            json!({}),
            &data_id,
            &NormalizedStore::new(),
        )
        .unwrap();
        assert_eq!(
            field(&store, ROOT_QUERY, "user"),
            &reference("$ROOT_QUERY.user", true)
        );
    }
}
