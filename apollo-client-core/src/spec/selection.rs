use std::fmt;

use apollo_parser::cst;

use super::input_value::required_name;
use super::InputValue;
use super::SpecError;
use super::TYPENAME;
use crate::json_ext::Object;

// The RECURSION_LIMIT is chosen to be:
//   < # expected to cause stack overflow &&
//   > # expected in a legitimate query
const RECURSION_LIMIT: usize = 512;

#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Field(Field),
    InlineFragment {
        type_condition: Option<String>,
        directives: Vec<Directive>,
        include_skip: IncludeSkip,
        selection_set: Vec<Selection>,
    },
    FragmentSpread {
        name: String,
        directives: Vec<Directive>,
        include_skip: IncludeSkip,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub alias: Option<String>,
    pub arguments: Vec<Argument>,
    pub directives: Vec<Directive>,
    pub include_skip: IncludeSkip,
    pub selection_set: Option<Vec<Selection>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub name: String,
    pub value: InputValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    pub name: String,
    pub arguments: Vec<Argument>,
}

impl Selection {
    pub(crate) fn from_cst(selection: cst::Selection, mut count: usize) -> Result<Option<Self>, SpecError> {
        if count > RECURSION_LIMIT {
            tracing::error!("selection processing recursion limit({RECURSION_LIMIT}) exceeded");
            return Err(SpecError::RecursionLimitExceeded);
        }
        count += 1;
        Ok(match selection {
            // Spec: https://spec.graphql.org/draft/#Field
            cst::Selection::Field(field) => {
                let directives = Directive::from_cst_list(field.directives())?;
                let include_skip = IncludeSkip::parse(&directives);
                if include_skip.statically_skipped() {
                    return Ok(None);
                }
                let name = required_name(field.name(), "field")?;
                let alias = field
                    .alias()
                    .map(|alias| required_name(alias.name(), "alias"))
                    .transpose()?;
                let arguments = Argument::from_cst_list(field.arguments())?;
                let selection_set = field
                    .selection_set()
                    .map(|selection_set| selection_set_from_cst(selection_set, count))
                    .transpose()?;

                Some(Self::Field(Field {
                    name,
                    alias,
                    arguments,
                    directives,
                    include_skip,
                    selection_set,
                }))
            }
            // Spec: https://spec.graphql.org/draft/#InlineFragment
            cst::Selection::InlineFragment(inline_fragment) => {
                let directives = Directive::from_cst_list(inline_fragment.directives())?;
                let include_skip = IncludeSkip::parse(&directives);
                if include_skip.statically_skipped() {
                    return Ok(None);
                }
                let type_condition = inline_fragment
                    .type_condition()
                    .and_then(|condition| condition.named_type())
                    .map(|named_type| required_name(named_type.name(), "type condition"))
                    .transpose()?;
                let selection_set = inline_fragment
                    .selection_set()
                    .map(|selection_set| selection_set_from_cst(selection_set, count))
                    .transpose()?
                    .unwrap_or_default();

                // Can be empty with a statically skipped selection set
                if selection_set.is_empty() {
                    return Ok(None);
                }

                Some(Self::InlineFragment {
                    type_condition,
                    directives,
                    include_skip,
                    selection_set,
                })
            }
            // Spec: https://spec.graphql.org/draft/#FragmentSpread
            cst::Selection::FragmentSpread(fragment_spread) => {
                let directives = Directive::from_cst_list(fragment_spread.directives())?;
                let include_skip = IncludeSkip::parse(&directives);
                if include_skip.statically_skipped() {
                    return Ok(None);
                }
                let name = required_name(
                    fragment_spread
                        .fragment_name()
                        .and_then(|fragment_name| fragment_name.name()),
                    "fragment",
                )?;

                Some(Self::FragmentSpread {
                    name,
                    directives,
                    include_skip,
                })
            }
        })
    }

    pub(crate) fn is_typename_field(&self) -> bool {
        matches!(self, Selection::Field(field) if field.name == TYPENAME)
    }

    /// Calls `f` with the name of every fragment spread in this selection,
    /// recursively.
    pub(crate) fn visit_fragment_spreads<'a>(&'a self, f: &mut impl FnMut(&'a str)) {
        match self {
            Selection::Field(Field {
                selection_set: Some(selection_set),
                ..
            })
            | Selection::InlineFragment { selection_set, .. } => {
                for selection in selection_set {
                    selection.visit_fragment_spreads(f);
                }
            }
            Selection::Field(_) => {}
            Selection::FragmentSpread { name, .. } => f(name),
        }
    }

    /// Adds a `__typename` field to every object selection set below this
    /// selection.
    pub(crate) fn add_typename(&mut self) {
        match self {
            Selection::Field(Field {
                selection_set: Some(selection_set),
                ..
            }) => add_typename_to_selection_set(selection_set),
            Selection::InlineFragment { selection_set, .. } => {
                for selection in selection_set.iter_mut() {
                    selection.add_typename();
                }
            }
            Selection::Field(_) | Selection::FragmentSpread { .. } => {}
        }
    }
}

pub(crate) fn selection_set_from_cst(
    selection_set: cst::SelectionSet,
    count: usize,
) -> Result<Vec<Selection>, SpecError> {
    selection_set
        .selections()
        .filter_map(|selection| Selection::from_cst(selection, count).transpose())
        .collect()
}

/// Adds `__typename` to this selection set if it is missing, then recurses.
pub(crate) fn add_typename_to_selection_set(selection_set: &mut Vec<Selection>) {
    for selection in selection_set.iter_mut() {
        selection.add_typename();
    }
    if !selection_set.iter().any(Selection::is_typename_field) {
        selection_set.push(Selection::Field(Field::typename()));
    }
}

impl Field {
    /// The key under which this field appears in a result: its alias if it
    /// has one, its name otherwise.
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub(crate) fn typename() -> Self {
        Field {
            name: TYPENAME.to_string(),
            alias: None,
            arguments: Vec::new(),
            directives: Vec::new(),
            include_skip: IncludeSkip::default(),
            selection_set: None,
        }
    }

    /// Resolves the arguments against the variables.
    pub fn resolved_arguments(&self, variables: &Object) -> Object {
        self.arguments
            .iter()
            .map(|argument| {
                (
                    argument.name.as_str().into(),
                    argument.value.resolve(variables),
                )
            })
            .collect()
    }
}

impl Argument {
    fn from_cst_list(arguments: Option<cst::Arguments>) -> Result<Vec<Self>, SpecError> {
        arguments
            .into_iter()
            .flat_map(|arguments| arguments.arguments())
            .map(|argument| {
                let name = required_name(argument.name(), "argument")?;
                let value = argument.value().ok_or_else(|| {
                    SpecError::ParsingError(format!("missing value for argument {name}"))
                })?;
                Ok(Argument {
                    name,
                    value: InputValue::from_cst(value)?,
                })
            })
            .collect()
    }
}

impl Directive {
    pub(crate) fn from_cst_list(directives: Option<cst::Directives>) -> Result<Vec<Self>, SpecError> {
        directives
            .into_iter()
            .flat_map(|directives| directives.directives())
            .map(|directive| {
                Ok(Directive {
                    name: required_name(directive.name(), "directive")?,
                    arguments: Argument::from_cst_list(directive.arguments())?,
                })
            })
            .collect()
    }

    fn argument(&self, name: &str) -> Option<&InputValue> {
        self.arguments
            .iter()
            .find(|argument| argument.name == name)
            .map(|argument| &argument.value)
    }
}

/// The `@include` and `@skip` conditions of a selection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IncludeSkip {
    include: Condition,
    skip: Condition,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Condition {
    Yes,
    No,
    Variable(String),
}

impl Default for IncludeSkip {
    fn default() -> Self {
        Self {
            include: Condition::Yes,
            skip: Condition::No,
        }
    }
}

impl IncludeSkip {
    pub(crate) fn parse(directives: &[Directive]) -> Self {
        let mut include = None;
        let mut skip = None;
        for directive in directives {
            if include.is_none() && directive.name == "include" {
                include = Condition::parse(directive)
            }
            if skip.is_none() && directive.name == "skip" {
                skip = Condition::parse(directive)
            }
        }
        Self {
            include: include.unwrap_or(Condition::Yes),
            skip: skip.unwrap_or(Condition::No),
        }
    }

    pub(crate) fn statically_skipped(&self) -> bool {
        matches!(self.skip, Condition::Yes) || matches!(self.include, Condition::No)
    }

    pub fn should_skip(&self, variables: &Object) -> bool {
        // A missing or non boolean variable behaves as if the directive was absent
        self.skip.eval(variables).unwrap_or(false) || !self.include.eval(variables).unwrap_or(true)
    }
}

impl Condition {
    fn parse(directive: &Directive) -> Option<Self> {
        match directive.argument("if")? {
            InputValue::Boolean(true) => Some(Condition::Yes),
            InputValue::Boolean(false) => Some(Condition::No),
            InputValue::Variable(variable) => Some(Condition::Variable(variable.clone())),
            _ => None,
        }
    }

    fn eval(&self, variables: &Object) -> Option<bool> {
        match self {
            Condition::Yes => Some(true),
            Condition::No => Some(false),
            Condition::Variable(variable_name) => variables
                .get(variable_name.as_str())
                .and_then(|v| v.as_bool()),
        }
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::Field(field) => {
                if let Some(alias) = &field.alias {
                    write!(f, "{alias}: ")?;
                }
                f.write_str(&field.name)?;
                write_arguments(f, &field.arguments)?;
                write_directives(f, &field.directives)?;
                if let Some(selection_set) = &field.selection_set {
                    f.write_str(" ")?;
                    write_selection_set(f, selection_set)?;
                }
                Ok(())
            }
            Selection::InlineFragment {
                type_condition,
                directives,
                selection_set,
                ..
            } => {
                f.write_str("...")?;
                if let Some(type_condition) = type_condition {
                    write!(f, " on {type_condition}")?;
                }
                write_directives(f, directives)?;
                f.write_str(" ")?;
                write_selection_set(f, selection_set)
            }
            Selection::FragmentSpread {
                name, directives, ..
            } => {
                write!(f, "...{name}")?;
                write_directives(f, directives)
            }
        }
    }
}

pub(crate) fn write_selection_set(f: &mut fmt::Formatter<'_>, selection_set: &[Selection]) -> fmt::Result {
    f.write_str("{")?;
    for selection in selection_set {
        write!(f, " {selection}")?;
    }
    f.write_str(" }")
}

fn write_arguments(f: &mut fmt::Formatter<'_>, arguments: &[Argument]) -> fmt::Result {
    if arguments.is_empty() {
        return Ok(());
    }
    f.write_str("(")?;
    for (index, argument) in arguments.iter().enumerate() {
        if index > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}: {}", argument.name, argument.value)?;
    }
    f.write_str(")")
}

pub(crate) fn write_directives(f: &mut fmt::Formatter<'_>, directives: &[Directive]) -> fmt::Result {
    for directive in directives {
        write!(f, " @{}", directive.name)?;
        write_arguments(f, &directive.arguments)?;
    }
    Ok(())
}
