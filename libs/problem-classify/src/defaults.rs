//! Default handlers mapping the built-in failures to catalog problems.

use http::HeaderValue;
use http::header;
use problem_core::catalog::{general, parameters, security, validation, web};
use problem_core::{Problem, ResponseProblem};
use serde_json::{Value, json};

use crate::failures::{
    AccessDenied, AuthenticationFailure, AuthenticationKind, ConstraintViolation, FieldViolation,
    IllegalArgument, MethodNotAllowed, MissingParameter, UnsupportedMediaType,
    UnsupportedOperation, ValidationFailure,
};
use crate::registry::{BoxError, HandlerRegistryBuilder};

/// Map-channel key of the field violation list.
pub const ERRORS_KEY: &str = "errors";

/// Register a handler for every built-in failure type.
#[must_use]
pub fn register_defaults(builder: HandlerRegistryBuilder) -> HandlerRegistryBuilder {
    builder
        .register(validation_failure)
        .register(constraint_violation)
        .register(access_denied)
        .register(authentication_failure)
        .register(method_not_allowed)
        .register(unsupported_media_type)
        .register(missing_parameter)
        .register(|f: &IllegalArgument| general::ILLEGAL_ARGUMENT.with_detail(f.to_string()))
        .register(|f: &UnsupportedOperation| {
            general::UNSUPPORTED_OPERATION.with_detail(f.to_string())
        })
}

fn errors(violations: &[FieldViolation]) -> Value {
    violations
        .iter()
        .map(|v| json!({"field": v.field, "message": v.message}))
        .collect()
}

fn validation_failure(failure: &ValidationFailure) -> Problem {
    validation::VALIDATION_FAILED.with_property(ERRORS_KEY, errors(failure.violations()))
}

fn constraint_violation(failure: &ConstraintViolation) -> Problem {
    validation::CONSTRAINT_VIOLATION.with_property(ERRORS_KEY, errors(failure.violations()))
}

fn access_denied(failure: &AccessDenied) -> Problem {
    if failure.message().is_empty() {
        security::ACCESS_DENIED
    } else {
        security::ACCESS_DENIED.with_detail(failure.message().to_owned())
    }
}

fn authentication_failure(failure: &AuthenticationFailure) -> Problem {
    let problem = match failure.kind() {
        AuthenticationKind::Unauthorized => security::UNAUTHORIZED,
        AuthenticationKind::AccountExpired => security::ACCOUNT_EXPIRED,
        AuthenticationKind::CredentialsExpired => security::CREDENTIALS_EXPIRED,
        AuthenticationKind::AccountLocked => security::ACCOUNT_LOCKED,
        AuthenticationKind::UsernameNotFound => security::USERNAME_NOT_FOUND,
    };
    problem.with_detail(failure.message().to_owned())
}

fn method_not_allowed(failure: &MethodNotAllowed) -> Result<ResponseProblem, BoxError> {
    let mut response = ResponseProblem::with(web::METHOD_NOT_ALLOWED.with_detail(failure.to_string()));
    if !failure.allowed().is_empty() {
        let allow = failure
            .allowed()
            .iter()
            .map(http::Method::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        response.add_header(header::ALLOW, HeaderValue::from_str(&allow)?);
    }
    Ok(response)
}

fn unsupported_media_type(failure: &UnsupportedMediaType) -> Result<ResponseProblem, BoxError> {
    let mut response =
        ResponseProblem::with(web::UNSUPPORTED_MEDIA_TYPE.with_detail(failure.to_string()));
    if !failure.supported().is_empty() {
        let accept = failure.supported().join(", ");
        response.add_header(header::ACCEPT, HeaderValue::from_str(&accept)?);
    }
    Ok(response)
}

fn missing_parameter(failure: &MissingParameter) -> Problem {
    parameters::MISSING_PARAMETER
        .with_detail(failure.to_string())
        .with_property("parameter", failure.name().to_owned())
}
