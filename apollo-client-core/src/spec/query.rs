use std::fmt;

use apollo_parser::cst;
use derivative::Derivative;
use serde::Deserialize;
use serde::Serialize;

use super::input_value::node_text;
use super::input_value::required_name;
use super::selection::selection_set_from_cst;
use super::selection::write_directives;
use super::selection::write_selection_set;
use super::Directive;
use super::Fragments;
use super::InputValue;
use super::PossibleTypes;
use super::Selection;
use super::SpecError;
use crate::json_ext::Object;
use crate::Configuration;

/// Store key of the root object that query results are written under.
pub const ROOT_QUERY: &str = "ROOT_QUERY";
/// Store key of the root object that mutation results are written under.
pub const ROOT_MUTATION: &str = "ROOT_MUTATION";

/// A parsed GraphQL operation together with the fragments of its document.
#[derive(Debug, Clone, Derivative)]
#[derivative(PartialEq, Hash, Eq)]
pub struct Query {
    string: String,
    operation_name: Option<String>,
    #[derivative(PartialEq = "ignore", Hash = "ignore")]
    operation: Operation,
    #[derivative(PartialEq = "ignore", Hash = "ignore")]
    fragments: Fragments,
    #[derivative(PartialEq = "ignore", Hash = "ignore")]
    possible_types: PossibleTypes,
}

#[derive(Debug, Clone, PartialEq)]
struct Operation {
    kind: OperationKind,
    variables: Vec<VariableDefinition>,
    directives: Vec<Directive>,
    selection_set: Vec<Selection>,
}

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableDefinition {
    pub name: String,
    /// The type as written in the document, for example `[ID!]`.
    pub ty: String,
    pub default_value: Option<InputValue>,
}

impl Query {
    /// Parses a document and selects one of its operations.
    ///
    /// `operation_name` may be omitted when the document contains a single
    /// operation.
    #[tracing::instrument(skip_all, level = "trace")]
    pub fn parse(
        query: impl Into<String>,
        operation_name: Option<&str>,
        configuration: &Configuration,
    ) -> Result<Self, SpecError> {
        let source = query.into();

        let parser = apollo_parser::Parser::new(source.as_str());
        let tree = parser.parse();
        let errors = tree
            .errors()
            .map(|err| err.message().to_string())
            .collect::<Vec<_>>();

        if !errors.is_empty() {
            tracing::debug!("parsing error(s): {}", errors.join(", "));
            return Err(SpecError::ParsingError(errors.join(", ")));
        }

        let document = tree.document();
        let mut fragments = Fragments::from_cst(&document)?;

        let mut operations = document
            .definitions()
            .filter_map(|definition| match definition {
                cst::Definition::OperationDefinition(operation) => Some(operation),
                _ => None,
            })
            .map(|operation| {
                let name = operation.name().map(|name| name.text().to_string());
                (name, operation)
            })
            .collect::<Vec<_>>();

        let (name, operation) = match operation_name {
            Some(wanted) => {
                let position = operations
                    .iter()
                    .position(|(name, _)| name.as_deref() == Some(wanted))
                    .ok_or_else(|| SpecError::UnknownOperation(wanted.to_string()))?;
                operations.swap_remove(position)
            }
            None if operations.len() > 1 => return Err(SpecError::AmbiguousOperation),
            None => operations.pop().ok_or(SpecError::NoOperation)?,
        };
        let mut operation = Operation::from_cst(operation)?;

        let mut unknown_fragment = None;
        let mut check_spread = |name: &str| {
            if fragments.get(name).is_none() && unknown_fragment.is_none() {
                unknown_fragment = Some(name.to_string());
            }
        };
        for selection in &operation.selection_set {
            selection.visit_fragment_spreads(&mut check_spread);
        }
        for (_, fragment) in fragments.sorted() {
            for selection in &fragment.selection_set {
                selection.visit_fragment_spreads(&mut check_spread);
            }
        }
        if let Some(name) = unknown_fragment {
            return Err(SpecError::UnknownFragment(name));
        }

        let string = if configuration.add_typename {
            // root fields never get a __typename, only the objects below them
            for selection in operation.selection_set.iter_mut() {
                selection.add_typename();
            }
            fragments.add_typename();
            Query::print(name.as_deref(), &operation, &fragments)
        } else {
            source
        };

        Ok(Query {
            string,
            operation_name: name,
            operation,
            fragments,
            possible_types: configuration.possible_types.clone(),
        })
    }

    /// The document text to send to the server.
    pub fn as_str(&self) -> &str {
        self.string.as_str()
    }

    pub fn operation_name(&self) -> Option<&str> {
        self.operation_name.as_deref()
    }

    pub fn kind(&self) -> OperationKind {
        self.operation.kind
    }

    pub fn selection_set(&self) -> &[Selection] {
        &self.operation.selection_set
    }

    pub fn fragments(&self) -> &Fragments {
        &self.fragments
    }

    /// How fragments of this query are matched against objects.
    pub fn possible_types(&self) -> &PossibleTypes {
        &self.possible_types
    }

    pub fn variable_definitions(&self) -> &[VariableDefinition] {
        &self.operation.variables
    }

    /// The store key this operation's result is rooted at.
    pub fn root_id(&self) -> &'static str {
        match self.operation.kind {
            OperationKind::Mutation => ROOT_MUTATION,
            OperationKind::Query | OperationKind::Subscription => ROOT_QUERY,
        }
    }

    /// Returns the provided variables completed with the default values
    /// declared by the operation.
    pub fn variables_with_defaults(&self, variables: &Object) -> Object {
        let mut result = Object::new();
        for definition in &self.operation.variables {
            if let Some(default_value) = &definition.default_value {
                result.insert(
                    definition.name.as_str(),
                    default_value.resolve(&Object::new()),
                );
            }
        }
        for (name, value) in variables {
            result.insert(name.clone(), value.clone());
        }
        result
    }

    fn print(name: Option<&str>, operation: &Operation, fragments: &Fragments) -> String {
        let mut printed = OperationDisplay { name, operation }.to_string();
        for (name, fragment) in fragments.sorted() {
            printed.push_str("\n\n");
            printed.push_str(&fragment.display(name).to_string());
        }
        printed
    }
}

impl Operation {
    // Spec: https://spec.graphql.org/draft/#sec-Language.Operations
    fn from_cst(operation: cst::OperationDefinition) -> Result<Self, SpecError> {
        let kind = operation
            .operation_type()
            .map(|operation_type| {
                if operation_type.mutation_token().is_some() {
                    OperationKind::Mutation
                } else if operation_type.subscription_token().is_some() {
                    OperationKind::Subscription
                } else {
                    OperationKind::Query
                }
            })
            .unwrap_or(OperationKind::Query);
        if kind == OperationKind::Subscription {
            return Err(SpecError::SubscriptionNotSupported);
        }

        let variables = operation
            .variable_definitions()
            .into_iter()
            .flat_map(|definitions| definitions.variable_definitions())
            .map(|definition| {
                let name = required_name(
                    definition.variable().and_then(|variable| variable.name()),
                    "variable",
                )?;
                let ty = definition
                    .ty()
                    .map(|ty| node_text(&ty))
                    .ok_or_else(|| SpecError::ParsingError(format!("missing type for ${name}")))?;
                let default_value = definition
                    .default_value()
                    .and_then(|default_value| default_value.value())
                    .map(InputValue::from_cst)
                    .transpose()?;
                Ok(VariableDefinition {
                    name,
                    ty,
                    default_value,
                })
            })
            .collect::<Result<Vec<_>, SpecError>>()?;

        let directives = Directive::from_cst_list(operation.directives())?;
        let selection_set = operation
            .selection_set()
            .map(|selection_set| selection_set_from_cst(selection_set, 0))
            .transpose()?
            .unwrap_or_default();

        Ok(Operation {
            kind,
            variables,
            directives,
            selection_set,
        })
    }
}

struct OperationDisplay<'a> {
    name: Option<&'a str>,
    operation: &'a Operation,
}

impl fmt::Display for OperationDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self.operation.kind {
            OperationKind::Query => "query",
            OperationKind::Mutation => "mutation",
            OperationKind::Subscription => "subscription",
        })?;
        if let Some(name) = self.name {
            write!(f, " {name}")?;
        }
        if !self.operation.variables.is_empty() {
            f.write_str("(")?;
            for (index, variable) in self.operation.variables.iter().enumerate() {
                if index > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "${}: {}", variable.name, variable.ty)?;
                if let Some(default_value) = &variable.default_value {
                    write!(f, " = {default_value}")?;
                }
            }
            f.write_str(")")?;
        }
        write_directives(f, &self.operation.directives)?;
        f.write_str(" ")?;
        write_selection_set(f, &self.operation.selection_set)
    }
}
