#![allow(dead_code)]

use problem_classify::failures::{AccessDenied, ValidationFailure};
use problem_classify::{HandlerRegistry, HandlerRegistryBuilder, Subtype, register_defaults};
use problem_core::Problem;

/// Storage failure family: `Storage` <- `Timeout` <- `ReadTimeout`.
#[derive(Debug, thiserror::Error)]
#[error("storage unavailable: {0}")]
pub struct Storage(pub String);

#[derive(Debug, thiserror::Error)]
#[error("storage timed out")]
pub struct Timeout {
    pub base: Storage,
}

impl Default for Timeout {
    fn default() -> Self {
        Self::new()
    }
}

impl Timeout {
    #[must_use]
    pub fn new() -> Self {
        Self {
            base: Storage("timeout".to_owned()),
        }
    }
}

impl Subtype<Storage> for Timeout {
    fn upcast(&self) -> &Storage {
        &self.base
    }
}

#[derive(Debug, thiserror::Error)]
#[error("read timed out after {millis}ms")]
pub struct ReadTimeout {
    pub base: Timeout,
    pub millis: u64,
}

impl ReadTimeout {
    #[must_use]
    pub fn new(millis: u64) -> Self {
        Self {
            base: Timeout::new(),
            millis,
        }
    }
}

impl Subtype<Timeout> for ReadTimeout {
    fn upcast(&self) -> &Timeout {
        &self.base
    }
}

/// A validation failure raised by the signup form.
#[derive(Debug, thiserror::Error)]
#[error("signup form is invalid")]
pub struct SignupInvalid {
    pub base: ValidationFailure,
}

impl Subtype<ValidationFailure> for SignupInvalid {
    fn upcast(&self) -> &ValidationFailure {
        &self.base
    }
}

/// Outer failure wrapping a cause.
#[derive(Debug, thiserror::Error)]
#[error("{context}")]
pub struct Context {
    pub context: &'static str,
    #[source]
    pub cause: Box<dyn std::error::Error + Send + Sync>,
}

#[must_use]
pub fn wrap(
    context: &'static str,
    cause: impl std::error::Error + Send + Sync + 'static,
) -> Context {
    Context {
        context,
        cause: Box::new(cause),
    }
}

/// Access denied wrapped in two layers of context.
#[must_use]
pub fn nested_access_denied() -> Context {
    wrap(
        "handling GET /reports",
        wrap("loading report", AccessDenied::new("reports are admin only")),
    )
}

/// Failure holding its cause inline, at the same address as the wrapper.
#[derive(Debug, thiserror::Error)]
#[error("loading report")]
pub struct Loading(#[source] pub AccessDenied);

#[must_use]
pub fn inline_access_denied() -> Loading {
    Loading(AccessDenied::new("admin only"))
}

#[must_use]
pub fn storage_builder() -> HandlerRegistryBuilder {
    HandlerRegistry::builder()
        .extends::<Timeout, Storage>()
        .extends::<ReadTimeout, Timeout>()
}

/// Defaults plus the storage family, with handlers for `Storage` and
/// `Timeout` only.
#[must_use]
pub fn registry() -> HandlerRegistry {
    register_defaults(storage_builder())
        .extends::<SignupInvalid, ValidationFailure>()
        .register(|f: &Storage| {
            Problem::service_unavailable("storage_unavailable").with_detail(f.to_string())
        })
        .register(|f: &Timeout| {
            Problem::service_unavailable("storage_timeout").with_detail(f.to_string())
        })
        .build()
        .unwrap()
}
