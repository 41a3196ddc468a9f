use std::collections::HashMap;
use std::fmt;

use apollo_parser::cst;

use super::input_value::required_name;
use super::selection::add_typename_to_selection_set;
use super::selection::selection_set_from_cst;
use super::selection::write_selection_set;
use super::Selection;
use super::SpecError;

/// The fragment definitions of a document, by name.
///
/// Built once per document and handed explicitly to every store read and
/// write so fragment spreads resolve without re-parsing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragments {
    map: HashMap<String, Fragment>,
}

impl Fragments {
    pub(crate) fn from_cst(document: &cst::Document) -> Result<Self, SpecError> {
        let map = document
            .definitions()
            .filter_map(|definition| match definition {
                // Spec: https://spec.graphql.org/draft/#FragmentDefinition
                cst::Definition::FragmentDefinition(fragment_definition) => {
                    Some(fragment_definition)
                }
                _ => None,
            })
            .map(|fragment_definition| {
                let name = required_name(
                    fragment_definition
                        .fragment_name()
                        .and_then(|fragment_name| fragment_name.name()),
                    "fragment",
                )?;
                let type_condition = required_name(
                    fragment_definition
                        .type_condition()
                        .and_then(|type_condition| type_condition.named_type())
                        .and_then(|named_type| named_type.name()),
                    "type condition",
                )?;
                let selection_set = fragment_definition
                    .selection_set()
                    .map(|selection_set| selection_set_from_cst(selection_set, 0))
                    .transpose()?
                    .unwrap_or_default();

                Ok((
                    name,
                    Fragment {
                        type_condition,
                        selection_set,
                    },
                ))
            })
            .collect::<Result<HashMap<_, _>, SpecError>>()?;
        Ok(Fragments { map })
    }

    pub fn get(&self, key: impl AsRef<str>) -> Option<&Fragment> {
        self.map.get(key.as_ref())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn insert(&mut self, name: impl Into<String>, fragment: Fragment) {
        self.map.insert(name.into(), fragment);
    }

    pub(crate) fn add_typename(&mut self) {
        for fragment in self.map.values_mut() {
            add_typename_to_selection_set(&mut fragment.selection_set);
        }
    }

    /// Fragment definitions sorted by name, for printing.
    pub(crate) fn sorted(&self) -> Vec<(&str, &Fragment)> {
        let mut fragments: Vec<_> = self
            .map
            .iter()
            .map(|(name, fragment)| (name.as_str(), fragment))
            .collect();
        fragments.sort_by_key(|(name, _)| *name);
        fragments
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub type_condition: String,
    pub selection_set: Vec<Selection>,
}

impl Fragment {
    pub(crate) fn display<'a>(&'a self, name: &'a str) -> impl fmt::Display + 'a {
        FragmentDisplay {
            name,
            fragment: self,
        }
    }
}

struct FragmentDisplay<'a> {
    name: &'a str,
    fragment: &'a Fragment,
}

impl fmt::Display for FragmentDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fragment {} on {} ",
            self.name, self.fragment.type_condition
        )?;
        write_selection_set(f, &self.fragment.selection_set)
    }
}
