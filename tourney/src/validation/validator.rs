//! Response validator.

use super::{
    errors::{ROOT_PATH, ValidationFailure, ValidationResult, Violation, ViolationKind},
    schema::{FieldKind, ResponseSchema},
};
use crate::{
    observer::RawResponse,
    pairing::{GameResult, Side},
};
use serde::Serialize;
use serde_json::{Map, Value};

/// Game state read from a valid response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidatedResult {
    Ongoing,
    Winner(Side),
    Draw,
}

impl ValidatedResult {
    /// Final result, `None` while the game is still running
    pub fn game_result(self) -> Option<GameResult> {
        match self {
            Self::Ongoing => None,
            Self::Winner(side) => Some(GameResult::Win(side)),
            Self::Draw => Some(GameResult::Draw),
        }
    }
}

/// Checks responses against a [`ResponseSchema`]
#[derive(Debug, Clone, Default)]
pub struct ResponseValidator {
    schema: ResponseSchema,
}

impl ResponseValidator {
    pub fn new(schema: ResponseSchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &ResponseSchema {
        &self.schema
    }

    /// Validate a response body.
    ///
    /// Unknown fields are ignored. Every violation is reported, not just
    /// the first.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationFailure`] if the body is not a JSON object or does
    /// not match the schema.
    pub fn validate(&self, response: &RawResponse) -> ValidationResult<ValidatedResult> {
        let value: Value = serde_json::from_str(&response.body).map_err(|e| {
            ValidationFailure::new(vec![Violation::new(
                ROOT_PATH,
                ViolationKind::Unparseable {
                    reason: e.to_string(),
                },
            )])
        })?;

        let Value::Object(object) = value else {
            return Err(ValidationFailure::new(vec![Violation::new(
                ROOT_PATH,
                ViolationKind::NotAnObject {
                    found: FieldKind::of(&value),
                },
            )]));
        };

        self.validate_object(&object)
    }

    fn validate_object(&self, object: &Map<String, Value>) -> ValidationResult<ValidatedResult> {
        let schema = &self.schema;
        let mut violations = Vec::new();

        let status = Self::enumerated(
            object,
            &schema.status_field,
            &schema.known_statuses(),
            true,
            &mut violations,
        );

        let finished = status.is_some_and(|s| schema.finished_statuses.iter().any(|f| f == s));
        let result = Self::enumerated(
            object,
            &schema.result_field,
            &schema.known_results(),
            finished,
            &mut violations,
        );

        for spec in &schema.fields {
            match object.get(&spec.name) {
                None | Some(Value::Null) if !spec.required => {}
                None => violations.push(Violation::new(&spec.name, ViolationKind::Missing)),
                Some(value) => {
                    let found = FieldKind::of(value);
                    if !spec.kind.accepts(found) {
                        violations.push(Violation::new(
                            &spec.name,
                            ViolationKind::WrongType {
                                expected: spec.kind,
                                found,
                            },
                        ));
                    }
                }
            }
        }

        if !violations.is_empty() {
            return Err(ValidationFailure::new(violations));
        }

        if !finished {
            return Ok(ValidatedResult::Ongoing);
        }

        // A finished game always carries a known result once violations are empty
        let result = result.unwrap_or_default();
        if schema.white_wins.iter().any(|r| r == result) {
            Ok(ValidatedResult::Winner(Side::White))
        } else if schema.black_wins.iter().any(|r| r == result) {
            Ok(ValidatedResult::Winner(Side::Black))
        } else {
            Ok(ValidatedResult::Draw)
        }
    }

    /// Read a string field that must hold one of `allowed`.
    /// An optional field may be absent or null but is still checked when present.
    /// Returns the value only if it is known.
    fn enumerated<'a>(
        object: &'a Map<String, Value>,
        field: &str,
        allowed: &[String],
        required: bool,
        violations: &mut Vec<Violation>,
    ) -> Option<&'a str> {
        match object.get(field) {
            None if required => {
                violations.push(Violation::new(field, ViolationKind::Missing));
                None
            }
            None => None,
            Some(Value::Null) if !required => None,
            Some(Value::String(value)) => {
                if allowed.iter().any(|a| a == value) {
                    Some(value.as_str())
                } else {
                    violations.push(Violation::new(
                        field,
                        ViolationKind::UnknownValue {
                            value: value.clone(),
                            allowed: allowed.to_vec(),
                        },
                    ));
                    None
                }
            }
            Some(other) => {
                violations.push(Violation::new(
                    field,
                    ViolationKind::WrongType {
                        expected: FieldKind::String,
                        found: FieldKind::of(other),
                    },
                ));
                None
            }
        }
    }
}
