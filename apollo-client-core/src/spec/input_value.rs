use std::fmt;

use apollo_parser::cst;
use apollo_parser::cst::CstNode;
use serde_json::Number;

use super::SpecError;
use crate::json_ext::Object;
use crate::json_ext::Value;

/// A GraphQL input value as written in a document: argument values, directive
/// arguments and variable defaults. Variables are kept unresolved until the
/// value is needed.
#[derive(Debug, Clone, PartialEq)]
pub enum InputValue {
    Variable(String),
    Null,
    Boolean(bool),
    Number(Number),
    String(String),
    Enum(String),
    List(Vec<InputValue>),
    Object(Vec<(String, InputValue)>),
}

impl InputValue {
    pub(crate) fn from_cst(value: cst::Value) -> Result<Self, SpecError> {
        Ok(match value {
            cst::Value::Variable(variable) => {
                InputValue::Variable(required_name(variable.name(), "variable")?)
            }
            cst::Value::StringValue(string) => InputValue::String(String::from(string)),
            cst::Value::IntValue(int) => {
                let text = node_text(&int);
                let number = text
                    .parse::<i64>()
                    .map(Number::from)
                    .or_else(|_| text.parse::<f64>().ok().and_then(Number::from_f64).ok_or(()))
                    .map_err(|_| SpecError::ParsingError(format!("invalid Int value: {text}")))?;
                InputValue::Number(number)
            }
            cst::Value::FloatValue(float) => {
                let text = node_text(&float);
                let number = text
                    .parse::<f64>()
                    .ok()
                    .and_then(Number::from_f64)
                    .ok_or_else(|| SpecError::ParsingError(format!("invalid Float value: {text}")))?;
                InputValue::Number(number)
            }
            cst::Value::BooleanValue(boolean) => InputValue::Boolean(node_text(&boolean) == "true"),
            cst::Value::NullValue(_) => InputValue::Null,
            cst::Value::EnumValue(value) => InputValue::Enum(node_text(&value)),
            cst::Value::ListValue(list) => InputValue::List(
                list.values()
                    .map(InputValue::from_cst)
                    .collect::<Result<_, _>>()?,
            ),
            cst::Value::ObjectValue(object) => InputValue::Object(
                object
                    .object_fields()
                    .map(|field| {
                        let name = required_name(field.name(), "object field")?;
                        let value = field.value().ok_or_else(|| {
                            SpecError::ParsingError(format!("missing value for field {name}"))
                        })?;
                        Ok((name, InputValue::from_cst(value)?))
                    })
                    .collect::<Result<_, SpecError>>()?,
            ),
        })
    }

    /// Substitutes variables and returns the JSON value.
    ///
    /// An undefined variable resolves to `null`.
    pub fn resolve(&self, variables: &Object) -> Value {
        match self {
            InputValue::Variable(name) => variables.get(name.as_str()).cloned().unwrap_or_default(),
            InputValue::Null => Value::Null,
            InputValue::Boolean(b) => Value::Bool(*b),
            InputValue::Number(n) => Value::Number(n.clone()),
            InputValue::String(s) => Value::String(s.as_str().into()),
            InputValue::Enum(e) => Value::String(e.as_str().into()),
            InputValue::List(values) => {
                Value::Array(values.iter().map(|v| v.resolve(variables)).collect())
            }
            InputValue::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(name, value)| (name.as_str().into(), value.resolve(variables)))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for InputValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputValue::Variable(name) => write!(f, "${name}"),
            InputValue::Null => f.write_str("null"),
            InputValue::Boolean(b) => write!(f, "{b}"),
            InputValue::Number(n) => write!(f, "{n}"),
            // JSON string escapes are valid GraphQL string escapes
            InputValue::String(s) => {
                write!(f, "{}", serde_json::to_string(s).map_err(|_| fmt::Error)?)
            }
            InputValue::Enum(e) => f.write_str(e),
            InputValue::List(values) => {
                f.write_str("[")?;
                for (index, value) in values.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{value}")?;
                }
                f.write_str("]")
            }
            InputValue::Object(fields) => {
                f.write_str("{")?;
                for (index, (name, value)) in fields.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}: {value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

pub(crate) fn required_name(name: Option<cst::Name>, what: &str) -> Result<String, SpecError> {
    name.map(|name| name.text().to_string())
        .ok_or_else(|| SpecError::ParsingError(format!("missing {what} name")))
}

/// Source text of a node without the surrounding ignored tokens.
pub(crate) fn node_text(node: &impl CstNode) -> String {
    node.syntax()
        .text()
        .to_string()
        .trim_matches(|c: char| c.is_whitespace() || c == ',')
        .to_string()
}
