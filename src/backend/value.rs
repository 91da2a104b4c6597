use std::fmt;

use crate::error::{GrammarError, RqlResult};
use crate::metadata::{Property, PropertyType};
use crate::term::{TermId, Tree};

/// A literal ready to bind
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    /// Cast a literal term to `property`'s declared type. An unquoted `null`
    ///  is [Value::Null]; a quoted one is text like any other string.
    pub fn cast(property: &Property, tree: &Tree, term: TermId) -> RqlResult<Value> {
        if !tree.is_leaf(term) {
            return Err(GrammarError::InvalidValue {
                column: property.name.clone(),
                value: tree.to_rql(term),
                expected: "a literal".to_string(),
            }
            .into());
        }
        if tree.is_null(term) {
            return Ok(Value::Null);
        }
        Self::parse(property, tree.token(term))
    }

    pub fn parse(property: &Property, raw: &str) -> RqlResult<Value> {
        let invalid = || GrammarError::InvalidValue {
            column: property.name.clone(),
            value: raw.to_string(),
            expected: property.property_type.as_str().to_string(),
        };
        let value = match property.property_type {
            PropertyType::Integer => Value::Int(raw.trim().parse().map_err(|_| invalid())?),
            PropertyType::Decimal => {
                let f: f64 = raw.trim().parse().map_err(|_| invalid())?;
                if !f.is_finite() {
                    return Err(invalid().into());
                }
                Value::Float(f)
            }
            PropertyType::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Value::Bool(true),
                "false" | "0" => Value::Bool(false),
                _ => return Err(invalid().into()),
            },
            PropertyType::String | PropertyType::Date | PropertyType::Timestamp => {
                Value::Text(raw.to_string())
            }
        };
        Ok(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => write!(f, "{s}"),
        }
    }
}

/// Bound literals as `(column, value)` pairs in emission order
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct BoundValues(Vec<(String, Value)>);

impl BoundValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, column: impl Into<String>, value: Value) {
        self.0.push((column.into(), value));
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<(&str, &Value)> {
        self.0.get(index).map(|(c, v)| (c.as_str(), v))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(c, v)| (c.as_str(), v))
    }

    /// Just the values, for positional binding
    pub fn values(&self) -> Vec<&Value> {
        self.0.iter().map(|(_, v)| v).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prop(t: PropertyType) -> Property {
        Property::new("col", t)
    }

    #[test]
    fn test_cast_by_type() {
        assert_eq!(Value::parse(&prop(PropertyType::Integer), "42").unwrap(), Value::Int(42));
        assert_eq!(
            Value::parse(&prop(PropertyType::Decimal), "3.5").unwrap(),
            Value::Float(3.5)
        );
        assert_eq!(
            Value::parse(&prop(PropertyType::Boolean), "TRUE").unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            Value::parse(&prop(PropertyType::Timestamp), "1996-07-04").unwrap(),
            Value::text("1996-07-04")
        );
    }

    #[test]
    fn test_cast_failure_names_column() {
        let err = Value::parse(&prop(PropertyType::Integer), "abc").unwrap_err();
        assert_eq!(
            err,
            GrammarError::InvalidValue {
                column: "col".into(),
                value: "abc".into(),
                expected: "integer".into(),
            }
            .into()
        );
    }

    #[test]
    fn test_null_keyword_vs_quoted() {
        let mut tree = Tree::new();
        let bare = tree.leaf("null", None);
        let quoted = tree.leaf("null", Some('"'));
        let p = prop(PropertyType::String);
        assert_eq!(Value::cast(&p, &tree, bare).unwrap(), Value::Null);
        assert_eq!(Value::cast(&p, &tree, quoted).unwrap(), Value::text("null"));
    }
}
