//! Store keys: where fields and objects live in the [`NormalizedStore`].
//!
//! [`NormalizedStore`]: super::NormalizedStore

use crate::json_ext::Object;
use crate::json_ext::Value;
use crate::json_ext::ValueExt;
use crate::spec::Field;

/// Prefix of every generated id. Declared identifiers may not start with it.
pub const GENERATED_ID_PREFIX: char = '$';

/// The key a field invocation is stored under inside its parent object.
///
/// `name` when called without arguments, `name({"arg":value,...})` otherwise,
/// with argument objects serialized with sorted keys.
pub fn storage_key(field_name: &str, arguments: &Object) -> String {
    if arguments.is_empty() {
        field_name.to_string()
    } else {
        format!(
            "{field_name}({})",
            canonical_json(&Value::Object(arguments.clone()))
        )
    }
}

/// Storage key of a selected field, after substituting variables in its
/// arguments.
pub fn store_field_key(field: &Field, variables: &Object) -> String {
    storage_key(&field.name, &field.resolved_arguments(variables))
}

/// Serializes a value with object keys sorted at every level.
pub fn canonical_json(value: &Value) -> String {
    // serializing a JSON value to a string can't fail
    serde_json::to_string(&value.canonicalize()).unwrap_or_default()
}

/// Id of an object reachable only through the field `field_key` of `parent`.
///
/// `indices` locate the object inside (possibly nested) lists.
pub fn generated_id(parent: &str, field_key: &str, indices: &[usize]) -> String {
    let mut id = if parent.starts_with(GENERATED_ID_PREFIX) {
        format!("{parent}.{field_key}")
    } else {
        format!("{GENERATED_ID_PREFIX}{parent}.{field_key}")
    };
    for index in indices {
        id.push('.');
        id.push_str(&index.to_string());
    }
    id
}

/// Computes the identifier of a result object.
///
/// Objects that get an identifier are stored once under it and shared by every
/// result they appear in. Returning `None` stores the object under a generated
/// id scoped to the path it was found at.
pub trait DataIdFromObject: Send + Sync {
    fn data_id(&self, object: &Object) -> Option<String>;
}

impl<F> DataIdFromObject for F
where
    F: Fn(&Object) -> Option<String> + Send + Sync,
{
    fn data_id(&self, object: &Object) -> Option<String> {
        self(object)
    }
}

/// Never identifies objects: everything is stored by path.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDataId;

impl DataIdFromObject for NoDataId {
    fn data_id(&self, _object: &Object) -> Option<String> {
        None
    }
}

/// Identifies objects as `<__typename>:<id>`, using `id` or `_id`.
///
/// Objects without a `__typename` are not identified, so this is meant to be
/// used with the `add_typename` option.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypenameAndId;

impl DataIdFromObject for TypenameAndId {
    fn data_id(&self, object: &Object) -> Option<String> {
        let typename = object.get(crate::spec::TYPENAME)?.as_str()?;
        let id = object.get("id").or_else(|| object.get("_id"))?;
        match id {
            Value::String(id) => Some(format!("{typename}:{}", id.as_str())),
            Value::Number(id) => Some(format!("{typename}:{id}")),
            _ => None,
        }
    }
}
