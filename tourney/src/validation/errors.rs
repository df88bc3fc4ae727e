//! Validation error types.

use super::schema::FieldKind;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Path used for violations about the body as a whole
pub const ROOT_PATH: &str = "$";

/// What is wrong with a field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViolationKind {
    /// Required field absent
    Missing,

    /// Field present with the wrong JSON type
    WrongType { expected: FieldKind, found: FieldKind },

    /// Enumerated field holding a value outside its known set
    UnknownValue { value: String, allowed: Vec<String> },

    /// Body is not JSON
    Unparseable { reason: String },

    /// Body is JSON but not an object
    NotAnObject { found: FieldKind },
}

/// A single schema violation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub field: String,
    #[serde(flatten)]
    pub kind: ViolationKind,
}

impl Violation {
    pub fn new(field: impl Into<String>, kind: ViolationKind) -> Self {
        Self {
            field: field.into(),
            kind,
        }
    }

    /// True if the body itself could not be read as an object
    pub fn is_shape_level(&self) -> bool {
        self.field == ROOT_PATH
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ViolationKind::Missing => write!(f, "{}: missing", self.field),
            ViolationKind::WrongType { expected, found } => {
                write!(f, "{}: expected {expected}, found {found}", self.field)
            }
            ViolationKind::UnknownValue { value, allowed } => write!(
                f,
                "{}: unknown value {value:?} (allowed: {})",
                self.field,
                allowed.join(", ")
            ),
            ViolationKind::Unparseable { reason } => {
                write!(f, "{}: not valid JSON ({reason})", self.field)
            }
            ViolationKind::NotAnObject { found } => {
                write!(f, "{}: expected object, found {found}", self.field)
            }
        }
    }
}

/// Response did not match the schema
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("Response failed validation: {}", join(.violations))]
pub struct ValidationFailure {
    pub violations: Vec<Violation>,
}

impl ValidationFailure {
    pub fn new(violations: Vec<Violation>) -> Self {
        Self { violations }
    }

    /// True if the server returned something that is not a game object at all
    pub fn is_shape_level(&self) -> bool {
        self.violations.iter().any(Violation::is_shape_level)
    }

    /// Violation for `field`, if any
    pub fn violation_for(&self, field: &str) -> Option<&Violation> {
        self.violations.iter().find(|v| v.field == field)
    }
}

fn join(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub type ValidationResult<T> = Result<T, ValidationFailure>;
