//! Validation failures as values.
//!
//! Mutations answer with a [`MutationResponse`]: either the written entity or
//! the list of `(field, message)` pairs that prevented the write.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{ValidationErrors, ValidationErrorsKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FieldValidator {
    /// Field path, e.g. `name` or `items[1].weight`
    pub field: String,
    pub message: String,
}

impl FieldValidator {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Flatten `validator` errors, including nested structs and lists, into
    /// field validators sorted by field path.
    pub fn from_validation_errors(errors: &ValidationErrors) -> Vec<FieldValidator> {
        let mut validators = Vec::new();
        collect("", errors, &mut validators);
        validators.sort_by(|a, b| a.field.cmp(&b.field));
        validators
    }
}

fn join(prefix: &str, field: &str) -> String {
    match (prefix.is_empty(), field) {
        (true, _) => field.to_string(),
        (false, "__all__") => prefix.to_string(),
        (false, _) => format!("{prefix}.{field}"),
    }
}

fn collect(prefix: &str, errors: &ValidationErrors, out: &mut Vec<FieldValidator>) {
    for (field, kind) in errors.errors() {
        let path = join(prefix, field);
        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                out.extend(field_errors.iter().map(|error| {
                    let message = error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("failed '{}' validation", error.code));
                    FieldValidator::new(path.clone(), message)
                }));
            }
            ValidationErrorsKind::Struct(nested) => collect(&path, nested, out),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    collect(&format!("{path}[{index}]"), nested, out);
                }
            }
        }
    }
}

/// Outcome of a create/update/patch.
///
/// A non-empty `field_validators` means nothing was written and `entity` is
/// `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MutationResponse<T> {
    pub entity: Option<T>,
    pub field_validators: Vec<FieldValidator>,
}

impl<T> MutationResponse<T> {
    pub fn ok(entity: T) -> Self {
        Self {
            entity: Some(entity),
            field_validators: Vec::new(),
        }
    }

    pub fn invalid(field_validators: Vec<FieldValidator>) -> Self {
        Self {
            entity: None,
            field_validators,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.field_validators.is_empty()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> MutationResponse<U> {
        MutationResponse {
            entity: self.entity.map(f),
            field_validators: self.field_validators,
        }
    }

    /// `success` when valid, 400 otherwise
    pub fn status(&self, success: StatusCode) -> StatusCode {
        if self.is_valid() {
            success
        } else {
            StatusCode::BAD_REQUEST
        }
    }
}

impl<T: Serialize> MutationResponse<T> {
    /// Respond with `success` (e.g. 201 for creates) when valid
    pub fn into_response_with(self, success: StatusCode) -> Response {
        (self.status(success), Json(self)).into_response()
    }
}

impl<T: Serialize> IntoResponse for MutationResponse<T> {
    fn into_response(self) -> Response {
        self.into_response_with(StatusCode::OK)
    }
}
