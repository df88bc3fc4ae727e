//! Response schema configuration.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// JSON value type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
    Null,
}

impl FieldKind {
    /// Kind of a JSON value. Integral numbers are `Integer`.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Boolean,
            Value::Number(n) if n.is_i64() || n.is_u64() => Self::Integer,
            Value::Number(_) => Self::Number,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Object,
        }
    }

    /// Whether a value of kind `found` satisfies this kind
    pub fn accepts(self, found: FieldKind) -> bool {
        self == found || (self == Self::Number && found == Self::Integer)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
            Self::Null => "null",
        };
        f.write_str(name)
    }
}

/// Type expectation for an additional field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldSpec {
    pub fn required(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
        }
    }
}

/// Expected shape of a game-server response.
///
/// The status field is always required. The result field is required once
/// the status is one of `finished_statuses`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseSchema {
    pub status_field: String,
    pub ongoing_statuses: Vec<String>,
    pub finished_statuses: Vec<String>,
    pub result_field: String,
    pub white_wins: Vec<String>,
    pub black_wins: Vec<String>,
    pub draws: Vec<String>,
    pub fields: Vec<FieldSpec>,
}

impl Default for ResponseSchema {
    fn default() -> Self {
        Self {
            status_field: "status".into(),
            ongoing_statuses: vec!["created".into(), "ongoing".into()],
            finished_statuses: vec!["finished".into()],
            result_field: "result".into(),
            white_wins: vec!["white".into()],
            black_wins: vec!["black".into()],
            draws: vec!["draw".into()],
            fields: vec![
                FieldSpec::optional("id", FieldKind::String),
                FieldSpec::optional("moves", FieldKind::Integer),
            ],
        }
    }
}

impl ResponseSchema {
    /// Every status value the schema knows
    pub fn known_statuses(&self) -> Vec<String> {
        self.ongoing_statuses
            .iter()
            .chain(&self.finished_statuses)
            .cloned()
            .collect()
    }

    /// Every result value the schema knows
    pub fn known_results(&self) -> Vec<String> {
        self.white_wins
            .iter()
            .chain(&self.black_wins)
            .chain(&self.draws)
            .cloned()
            .collect()
    }

    pub fn with_field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }
}
