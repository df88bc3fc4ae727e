//! Validation of game-server responses.
//!
//! A [`ResponseValidator`] checks a raw response body against a configured
//! [`ResponseSchema`] and either classifies the game state or reports every
//! violation it found.

pub mod errors;
pub mod schema;
pub mod validator;

pub use errors::{ValidationFailure, ValidationResult, Violation, ViolationKind};
pub use schema::{FieldKind, FieldSpec, ResponseSchema};
pub use validator::{ResponseValidator, ValidatedResult};
