//! Structural shapes over dynamic values.

use crate::codec::Codec;
use crate::error::{join_field, join_index, ValidationError, ValidationResult, Violation};
use crate::value::Value;
use std::collections::BTreeMap;

/// A structural validator for [`Value`]s.
///
/// `Shape` is a [`Codec`] whose output is the validated value itself, so it
/// can guard a collection without an application-side type. Records accept
/// fields beyond the declared ones. Validation reports every violation, not
/// just the first.
///
/// ```
/// use shapedb_codec::{Codec, Shape, Value};
///
/// let shape = Shape::record([
///     ("id", Shape::Integer),
///     ("tags", Shape::array(Shape::Text)),
///     ("email", Shape::optional(Shape::Text)),
/// ]);
///
/// let value = Value::record([
///     ("id", Value::from(1)),
///     ("tags", Value::from(vec![Value::from("a"), Value::from(2)])),
/// ]);
///
/// let err = shape.decode(&value).unwrap_err();
/// assert_eq!(err.violations()[0].path, "tags[1]");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// Accepts anything.
    Any,
    /// Only `null`.
    Null,
    /// A boolean.
    Bool,
    /// An integer.
    Integer,
    /// An integer or a float.
    Number,
    /// A text string.
    Text,
    /// A byte string.
    Bytes,
    /// Exactly this value.
    Literal(Value),
    /// An array whose every element has the inner shape.
    Array(Box<Shape>),
    /// A record with (at least) these fields.
    Record(BTreeMap<String, Shape>),
    /// The inner shape, `null`, or (as a record field) absent.
    Optional(Box<Shape>),
    /// Any one of these shapes.
    Union(Vec<Shape>),
}

impl Shape {
    /// Array of `element`.
    pub fn array(element: Shape) -> Self {
        Shape::Array(Box::new(element))
    }

    /// Record with the given fields.
    pub fn record<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Shape)>,
    {
        Shape::Record(fields.into_iter().map(|(k, s)| (k.into(), s)).collect())
    }

    /// Optional `inner`.
    pub fn optional(inner: Shape) -> Self {
        Shape::Optional(Box::new(inner))
    }

    /// Exactly `value`.
    pub fn literal(value: impl Into<Value>) -> Self {
        Shape::Literal(value.into())
    }

    /// One of `shapes`.
    pub fn union(shapes: impl IntoIterator<Item = Shape>) -> Self {
        Shape::Union(shapes.into_iter().collect())
    }

    /// Checks `value`, returning every violation.
    pub fn validate(&self, value: &Value) -> ValidationResult<()> {
        let mut violations = Vec::new();
        self.check(value, "", &mut violations);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(violations))
        }
    }

    /// Returns true if `value` conforms.
    pub fn accepts(&self, value: &Value) -> bool {
        let mut violations = Vec::new();
        self.check(value, "", &mut violations);
        violations.is_empty()
    }

    fn check(&self, value: &Value, path: &str, out: &mut Vec<Violation>) {
        let matches = match (self, value) {
            (Shape::Any, _)
            | (Shape::Null, Value::Null)
            | (Shape::Bool, Value::Bool(_))
            | (Shape::Integer, Value::Integer(_))
            | (Shape::Number, Value::Integer(_) | Value::Float(_))
            | (Shape::Text, Value::Text(_))
            | (Shape::Bytes, Value::Bytes(_))
            | (Shape::Optional(_), Value::Null) => true,
            (Shape::Literal(expected), actual) => expected == actual,
            (Shape::Optional(inner), _) => {
                inner.check(value, path, out);
                return;
            }
            (Shape::Array(element), Value::Array(items)) => {
                for (i, item) in items.iter().enumerate() {
                    element.check(item, &join_index(path, i), out);
                }
                return;
            }
            (Shape::Record(fields), Value::Map(map)) => {
                for (name, shape) in fields {
                    let field_path = join_field(path, name);
                    match (map.get(name), shape) {
                        (Some(v), _) => shape.check(v, &field_path, out),
                        (None, Shape::Optional(_) | Shape::Any) => {}
                        (None, _) => {
                            out.push(Violation::new(field_path, shape.to_string(), "undefined"));
                        }
                    }
                }
                return;
            }
            (Shape::Union(members), _) => members.iter().any(|m| m.accepts(value)),
            _ => false,
        };

        if !matches {
            out.push(Violation::new(path, self.to_string(), value.describe()));
        }
    }
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Shape::Any => f.write_str("any"),
            Shape::Null => f.write_str("null"),
            Shape::Bool => f.write_str("boolean"),
            Shape::Integer => f.write_str("integer"),
            Shape::Number => f.write_str("number"),
            Shape::Text => f.write_str("string"),
            Shape::Bytes => f.write_str("bytes"),
            Shape::Literal(v) => write!(f, "literal {}", v.describe()),
            Shape::Array(element) => write!(f, "Array<{element}>"),
            Shape::Record(fields) => {
                if fields.is_empty() {
                    return f.write_str("{}");
                }
                f.write_str("{ ")?;
                for (i, (name, shape)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}: {shape}")?;
                }
                f.write_str(" }")
            }
            Shape::Optional(inner) => write!(f, "{inner} | null"),
            Shape::Union(members) => {
                for (i, m) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" | ")?;
                    }
                    write!(f, "{m}")?;
                }
                Ok(())
            }
        }
    }
}

impl Codec for Shape {
    type Output = Value;

    fn describe(&self) -> String {
        self.to_string()
    }

    fn decode(&self, raw: &Value) -> ValidationResult<Value> {
        self.validate(raw)?;
        Ok(raw.clone())
    }

    fn encode(&self, value: &Value) -> ValidationResult<Value> {
        self.validate(value)?;
        Ok(value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn user() -> Shape {
        Shape::record([("id", Shape::Number), ("name", Shape::Text)])
    }

    #[test]
    fn accepts_conforming_record() {
        let v = Value::record([("id", Value::from(1)), ("name", Value::from("James"))]);
        assert_eq!(user().decode(&v).unwrap(), v);
    }

    #[test]
    fn extra_fields_are_allowed() {
        let v = Value::record([
            ("id", Value::from(1)),
            ("name", Value::from("James")),
            ("age", Value::from(40)),
        ]);
        assert!(user().accepts(&v));
    }

    #[test]
    fn reports_all_violations() {
        let v = Value::record([("id", Value::from("1"))]);
        let err = user().decode(&v).unwrap_err();
        let violations = err.violations();
        assert_eq!(violations.len(), 2);
        assert_eq!(violations[0].path, "id");
        assert_eq!(violations[0].expected, "number");
        assert_eq!(violations[1].path, "name");
        assert_eq!(violations[1].actual, "undefined");
    }

    #[test]
    fn non_record_is_rejected_at_root() {
        let err = user().decode(&Value::from(5)).unwrap_err();
        assert_eq!(err.violations().len(), 1);
        assert_eq!(err.violations()[0].path, "");
        assert_eq!(err.violations()[0].expected, "{ id: number, name: string }");
    }

    #[test]
    fn nested_paths() {
        let shape = Shape::record([(
            "address",
            Shape::record([("city", Shape::Text), ("zip", Shape::array(Shape::Integer))]),
        )]);
        let v = Value::record([(
            "address",
            Value::record([
                ("city", Value::Null),
                ("zip", Value::from(vec![Value::from(1), Value::from(true)])),
            ]),
        )]);
        let err = shape.validate(&v).unwrap_err();
        let paths: Vec<_> = err.violations().iter().map(|v| v.path.as_str()).collect();
        assert_eq!(paths, vec!["address.city", "address.zip[1]"]);
    }

    #[test]
    fn optional_fields() {
        let shape = Shape::record([("nick", Shape::optional(Shape::Text))]);
        assert!(shape.accepts(&Value::record(Vec::<(String, Value)>::new())));
        assert!(shape.accepts(&Value::record([("nick", Value::Null)])));
        assert!(shape.accepts(&Value::record([("nick", Value::from("jj"))])));
        assert!(!shape.accepts(&Value::record([("nick", Value::from(1))])));
    }

    #[test]
    fn union_and_literal() {
        let status = Shape::union([Shape::literal("active"), Shape::literal("banned")]);
        assert!(status.accepts(&Value::from("active")));
        let err = status.validate(&Value::from("deleted")).unwrap_err();
        assert_eq!(
            err.violations()[0].expected,
            "literal string \"active\" | literal string \"banned\""
        );
    }

    #[test]
    fn number_accepts_integer_and_float() {
        assert!(Shape::Number.accepts(&Value::from(1)));
        assert!(Shape::Number.accepts(&Value::from(1.5)));
        assert!(!Shape::Integer.accepts(&Value::from(1.5)));
    }

    #[test]
    fn encode_validates_too() {
        let bad = Value::record([("id", Value::from(1))]);
        assert!(user().encode(&bad).is_err());
    }

    #[test]
    fn display() {
        assert_eq!(Shape::array(Shape::optional(Shape::Text)).to_string(), "Array<string | null>");
        assert_eq!(Shape::record(Vec::<(String, Shape)>::new()).to_string(), "{}");
    }

    proptest! {
        #[test]
        fn any_accepts_everything(n in any::<i64>(), s in ".{0,16}") {
            prop_assert!(Shape::Any.accepts(&Value::from(n)));
            prop_assert!(Shape::Any.accepts(&Value::from(s.as_str())));
        }

        #[test]
        fn integer_arrays(items in prop::collection::vec(any::<i64>(), 0..32)) {
            let value = Value::Array(items.into_iter().map(Value::from).collect());
            prop_assert!(Shape::array(Shape::Integer).accepts(&value));
            prop_assert!(Shape::array(Shape::Number).accepts(&value));
        }
    }
}
