use std::collections::BTreeMap;
use std::collections::BTreeSet;

use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

/// The object types implementing each interface or member of each union,
/// by abstract type name.
///
/// When at least one abstract type is listed, the map is taken as complete:
/// any other type condition names an object type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct PossibleTypes(BTreeMap<String, BTreeSet<String>>);

/// Whether a fragment applies to an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentMatch {
    Applies,
    DoesNotApply,
    /// The object has no `__typename`, or nothing is known about the type
    /// condition.
    Unknown,
}

impl PossibleTypes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Records the object types of an interface or union.
    pub fn insert(
        &mut self,
        abstract_type: impl Into<String>,
        object_types: impl IntoIterator<Item = impl Into<String>>,
    ) {
        self.0
            .entry(abstract_type.into())
            .or_default()
            .extend(object_types.into_iter().map(Into::into));
    }

    /// Matches the type condition of a fragment against the `__typename` of
    /// an object.
    pub fn match_fragment(&self, typename: Option<&str>, type_condition: &str) -> FragmentMatch {
        let Some(typename) = typename else {
            return FragmentMatch::Unknown;
        };
        if typename == type_condition {
            return FragmentMatch::Applies;
        }
        match self.0.get(type_condition) {
            Some(object_types) if object_types.contains(typename) => FragmentMatch::Applies,
            Some(_) => FragmentMatch::DoesNotApply,
            None if self.is_empty() => FragmentMatch::Unknown,
            // an object type other than the object's own
            None => FragmentMatch::DoesNotApply,
        }
    }
}
