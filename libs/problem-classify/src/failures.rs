//! Failure types for common request-processing errors.
//!
//! Each has a default handler in [`crate::defaults`]. Applications extend them
//! by embedding one and declaring the relation with
//! [`HandlerRegistryBuilder::extends`](crate::HandlerRegistryBuilder::extends).

use std::fmt;

use http::Method;
use serde::Serialize;

/// A single rejected input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

impl FieldViolation {
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Request body or form binding failed validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, thiserror::Error)]
#[error("validation failed with {} violation(s)", .violations.len())]
pub struct ValidationFailure {
    violations: Vec<FieldViolation>,
}

impl ValidationFailure {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A violation of `field`; object-level errors use the object name.
    #[must_use]
    pub fn with_violation(mut self, field: impl Into<String>, message: impl Into<String>) -> Self {
        self.violations.push(FieldViolation::new(field, message));
        self
    }

    #[must_use]
    pub fn violations(&self) -> &[FieldViolation] {
        &self.violations
    }
}

impl FromIterator<FieldViolation> for ValidationFailure {
    fn from_iter<I: IntoIterator<Item = FieldViolation>>(iter: I) -> Self {
        Self {
            violations: iter.into_iter().collect(),
        }
    }
}

/// Constraint checks on method parameters or entities failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, thiserror::Error)]
#[error("{} constraint(s) violated", .violations.len())]
pub struct ConstraintViolation {
    violations: Vec<FieldViolation>,
}

impl ConstraintViolation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A violated constraint at `path` (e.g. `create.user.email`).
    #[must_use]
    pub fn with_violation(mut self, path: impl Into<String>, message: impl Into<String>) -> Self {
        self.violations.push(FieldViolation::new(path, message));
        self
    }

    #[must_use]
    pub fn violations(&self) -> &[FieldViolation] {
        &self.violations
    }
}

/// The authenticated caller lacks permission.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct AccessDenied {
    message: String,
}

impl AccessDenied {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthenticationKind {
    Unauthorized,
    AccountExpired,
    CredentialsExpired,
    AccountLocked,
    UsernameNotFound,
}

impl fmt::Display for AuthenticationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unauthorized => "unauthorized",
            Self::AccountExpired => "account expired",
            Self::CredentialsExpired => "credentials expired",
            Self::AccountLocked => "account locked",
            Self::UsernameNotFound => "username not found",
        })
    }
}

/// The caller could not be authenticated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("authentication failed ({kind}): {message}")]
pub struct AuthenticationFailure {
    kind: AuthenticationKind,
    message: String,
}

impl AuthenticationFailure {
    #[must_use]
    pub fn new(kind: AuthenticationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> AuthenticationKind {
        self.kind
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// The request method is not supported by the target resource.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("request method '{method}' is not supported")]
pub struct MethodNotAllowed {
    method: Method,
    allowed: Vec<Method>,
}

impl MethodNotAllowed {
    #[must_use]
    pub fn new(method: Method, allowed: impl IntoIterator<Item = Method>) -> Self {
        Self {
            method,
            allowed: allowed.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn allowed(&self) -> &[Method] {
        &self.allowed
    }
}

/// The request body has a content type the endpoint cannot consume.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("content type '{}' is not supported", .content_type.as_deref().unwrap_or("unknown"))]
pub struct UnsupportedMediaType {
    content_type: Option<String>,
    supported: Vec<String>,
}

impl UnsupportedMediaType {
    #[must_use]
    pub fn new(
        content_type: Option<impl Into<String>>,
        supported: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            content_type: content_type.map(Into::into),
            supported: supported.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    #[must_use]
    pub fn supported(&self) -> &[String] {
        &self.supported
    }
}

/// A required request parameter is absent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("required parameter '{name}' is not present")]
pub struct MissingParameter {
    name: String,
}

impl MissingParameter {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct IllegalArgument {
    message: String,
}

impl IllegalArgument {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct UnsupportedOperation {
    message: String,
}

impl UnsupportedOperation {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn messages_describe_the_failure() {
        let failure = ValidationFailure::new()
            .with_violation("email", "must not be blank")
            .with_violation("age", "must be positive");
        assert_eq!(failure.to_string(), "validation failed with 2 violation(s)");

        let failure = MethodNotAllowed::new(Method::DELETE, [Method::GET]);
        assert_eq!(failure.to_string(), "request method 'DELETE' is not supported");

        let failure = UnsupportedMediaType::new(None::<String>, ["application/json"]);
        assert_eq!(failure.to_string(), "content type 'unknown' is not supported");

        let failure = AuthenticationFailure::new(AuthenticationKind::AccountLocked, "too many attempts");
        assert_eq!(
            failure.to_string(),
            "authentication failed (account locked): too many attempts"
        );
    }

    #[test]
    fn violations_collect_from_iterators() {
        let failure: ValidationFailure = [FieldViolation::new("name", "required")]
            .into_iter()
            .collect();
        assert_eq!(failure.violations().len(), 1);
    }
}
