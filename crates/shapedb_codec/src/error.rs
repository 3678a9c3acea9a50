//! Validation error types.

use std::fmt;
use thiserror::Error;

/// Result type for codec operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// A single place where a value did not match its declared shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Location of the offending value (`""` for the root, `address.city`,
    /// `tags[2]`, ...).
    pub path: String,
    /// Description of what the shape required.
    pub expected: String,
    /// Description of what was found.
    pub actual: String,
}

impl Violation {
    /// Creates a violation.
    pub fn new(
        path: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "expected {}, got {}", self.expected, self.actual)
        } else {
            write!(
                f,
                "{}: expected {}, got {}",
                self.path, self.expected, self.actual
            )
        }
    }
}

/// A value failed to decode or encode against its codec.
///
/// Carries every violation found, not just the first one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}", render(.violations))]
pub struct ValidationError {
    violations: Vec<Violation>,
}

fn render(violations: &[Violation]) -> String {
    match violations {
        [] => "invalid value".to_string(),
        [only] => only.to_string(),
        [first, rest @ ..] => format!("{first} (and {} more)", rest.len()),
    }
}

impl ValidationError {
    /// Creates an error from a list of violations.
    pub fn new(violations: Vec<Violation>) -> Self {
        Self { violations }
    }

    /// Creates an error holding one violation.
    pub fn single(
        path: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::new(vec![Violation::new(path, expected, actual)])
    }

    /// Returns the violations.
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Consumes the error, returning its violations.
    pub fn into_violations(self) -> Vec<Violation> {
        self.violations
    }

    /// Appends the violations of `other`.
    pub fn merge(&mut self, other: ValidationError) {
        self.violations.extend(other.violations);
    }

    /// Re-roots every violation under a record field.
    #[must_use]
    pub fn at_field(mut self, field: &str) -> Self {
        for v in &mut self.violations {
            v.path = prefix_path(&join_field("", field), &v.path);
        }
        self
    }

    /// Re-roots every violation under a sequence index.
    #[must_use]
    pub fn at_index(mut self, index: usize) -> Self {
        for v in &mut self.violations {
            v.path = prefix_path(&join_index("", index), &v.path);
        }
        self
    }
}

pub(crate) fn join_field(path: &str, field: &str) -> String {
    if path.is_empty() {
        field.to_string()
    } else {
        format!("{path}.{field}")
    }
}

pub(crate) fn join_index(path: &str, index: usize) -> String {
    format!("{path}[{index}]")
}

fn prefix_path(prefix: &str, path: &str) -> String {
    if path.is_empty() {
        prefix.to_string()
    } else if path.starts_with('[') {
        format!("{prefix}{path}")
    } else {
        format!("{prefix}.{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_single_violation() {
        let err = ValidationError::single("name", "string", "integer 3");
        assert_eq!(err.to_string(), "name: expected string, got integer 3");
    }

    #[test]
    fn display_root_violation() {
        let err = ValidationError::single("", "record", "null");
        assert_eq!(err.to_string(), "expected record, got null");
    }

    #[test]
    fn display_counts_extra_violations() {
        let err = ValidationError::new(vec![
            Violation::new("id", "integer", "string \"a\""),
            Violation::new("name", "string", "undefined"),
            Violation::new("age", "integer", "null"),
        ]);
        assert_eq!(
            err.to_string(),
            "id: expected integer, got string \"a\" (and 2 more)"
        );
    }

    #[test]
    fn paths_are_prefixed() {
        let err = ValidationError::new(vec![
            Violation::new("", "integer", "null"),
            Violation::new("city", "string", "null"),
            Violation::new("[1]", "string", "null"),
        ])
        .at_field("address")
        .at_index(4);

        let paths: Vec<_> = err.violations().iter().map(|v| v.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["[4].address", "[4].address.city", "[4].address[1]"]
        );
    }

    #[test]
    fn merge_keeps_order() {
        let mut err = ValidationError::single("a", "x", "y");
        err.merge(ValidationError::single("b", "x", "y"));
        assert_eq!(err.violations().len(), 2);
        assert_eq!(err.violations()[1].path, "b");

        let paths: Vec<_> = err.into_violations().into_iter().map(|v| v.path).collect();
        assert_eq!(paths, vec!["a".to_string(), "b".to_string()]);
    }
}
