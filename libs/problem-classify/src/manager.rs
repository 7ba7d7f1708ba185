//! Single entry point turning a live failure into a finished problem.
//!
//! Classification of one failure:
//! 1. Unwrap the `source()` chain, bounded by the unwrap limit and guarded
//!    against repeated links.
//! 2. If any link is a [`ProblemError`], use the problem it carries (the one
//!    nearest to the root cause wins).
//! 3. Otherwise walk the chain from the root cause outward and take the first
//!    link with a type-specific handler, first in the request scope's
//!    registry, then in the global one. Catch-all handlers are consulted
//!    only when no link matched, with the root cause.
//! 4. Run the handler inside a containment boundary: an error or a panic
//!    leaves the failure unclassified instead of escaping.
//! 5. Stage the result and run the customizer chain in order.

use std::any::Any;
use std::error::Error;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use problem_core::catalog::general;
use problem_core::{ProblemError, ResponseProblem};

use crate::config::ClassifierConfig;
use crate::customize::{
    CustomizeContext, MessageCatalogCustomizer, ProblemCustomizer, RequestIdCustomizer,
    TypeBaseCustomizer,
};
use crate::hierarchy::FailureType;
use crate::messages::MessageSource;
use crate::registry::{Handled, Handler, HandlerRegistry};

pub const DEFAULT_UNWRAP_LIMIT: usize = 32;

type Failure<'a> = &'a (dyn Error + 'static);

/// Per-request inputs to classification.
#[derive(Debug, Clone, Default)]
pub struct RequestScope {
    registry: Option<Arc<HandlerRegistry>>,
    request_id: Option<String>,
    locale: Option<String>,
}

impl RequestScope {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Handlers that take precedence over the global registry.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<HandlerRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    #[must_use]
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    #[must_use]
    pub fn registry(&self) -> Option<&Arc<HandlerRegistry>> {
        self.registry.as_ref()
    }

    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    #[must_use]
    pub fn locale(&self) -> Option<&str> {
        self.locale.as_deref()
    }
}

pub struct ClassificationManagerBuilder {
    registry: Arc<HandlerRegistry>,
    customizers: Vec<Arc<dyn ProblemCustomizer>>,
    unwrap_limit: usize,
}

impl ClassificationManagerBuilder {
    #[must_use]
    pub fn unwrap_limit(mut self, limit: usize) -> Self {
        self.unwrap_limit = limit;
        self
    }

    /// Append a customizer; customizers run in the order they are added.
    #[must_use]
    pub fn customizer(mut self, customizer: impl ProblemCustomizer + 'static) -> Self {
        self.customizers.push(Arc::new(customizer));
        self
    }

    /// Append the configured built-in customizers: request id, then message
    /// catalog (only when `catalog` is given), then type base URI.
    #[must_use]
    pub fn standard_customizers(
        mut self,
        config: &ClassifierConfig,
        catalog: Option<Arc<dyn MessageSource>>,
    ) -> Self {
        if let Some(key) = &config.request_id_key {
            self = self.customizer(RequestIdCustomizer::new(key.clone()));
        }
        if let Some(source) = catalog.filter(|_| config.messages.enabled) {
            self = self.customizer(
                MessageCatalogCustomizer::new(source)
                    .with_code_prefix(config.messages.code_prefix.clone())
                    .with_separator(config.messages.separator.clone()),
            );
        }
        if let Some(base) = &config.type_base_uri {
            self = self.customizer(TypeBaseCustomizer::new(base.clone()));
        }
        self
    }

    #[must_use]
    pub fn build(self) -> ClassificationManager {
        ClassificationManager {
            registry: self.registry,
            customizers: self.customizers,
            unwrap_limit: self.unwrap_limit,
        }
    }
}

/// Converts failures into customized [`ResponseProblem`]s.
pub struct ClassificationManager {
    registry: Arc<HandlerRegistry>,
    customizers: Vec<Arc<dyn ProblemCustomizer>>,
    unwrap_limit: usize,
}

impl ClassificationManager {
    #[must_use]
    pub fn builder(registry: Arc<HandlerRegistry>) -> ClassificationManagerBuilder {
        ClassificationManagerBuilder {
            registry,
            customizers: Vec::new(),
            unwrap_limit: DEFAULT_UNWRAP_LIMIT,
        }
    }

    /// Manager with the unwrap limit and built-in customizers taken from
    /// `config`.
    #[must_use]
    pub fn from_config(
        registry: Arc<HandlerRegistry>,
        config: &ClassifierConfig,
        catalog: Option<Arc<dyn MessageSource>>,
    ) -> Self {
        Self::builder(registry)
            .unwrap_limit(config.unwrap_limit)
            .standard_customizers(config, catalog)
            .build()
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn unwrap_limit(&self) -> usize {
        self.unwrap_limit
    }

    /// Classify `failure` against the global registry only.
    #[must_use]
    pub fn classify(&self, failure: Failure<'_>) -> Option<ResponseProblem> {
        self.classify_in(failure, &RequestScope::default())
    }

    /// Classify `failure`; `None` when nothing in its cause chain is
    /// classifiable or the selected handler declined or failed.
    #[must_use]
    pub fn classify_in(
        &self,
        failure: Failure<'_>,
        scope: &RequestScope,
    ) -> Option<ResponseProblem> {
        let chain = self.cause_chain(failure);
        let (matched, handled) = match carried_problem(&chain) {
            Some(found) => found,
            None => self.dispatch(&chain, scope)?,
        };
        Some(self.finish(matched, handled.into_response(), scope))
    }

    /// Like [`classify_in`](Self::classify_in), falling back to the
    /// internal-server-error problem.
    #[must_use]
    pub fn classify_or_default(
        &self,
        failure: Failure<'_>,
        scope: &RequestScope,
    ) -> ResponseProblem {
        self.classify_in(failure, scope).unwrap_or_else(|| {
            self.finish(
                failure,
                ResponseProblem::with(general::INTERNAL_SERVER_ERROR),
                scope,
            )
        })
    }

    /// `failure` followed by its causes, outermost first.
    fn cause_chain<'a>(&self, failure: Failure<'a>) -> Vec<Failure<'a>> {
        let mut chain = vec![failure];
        let mut current = failure;
        while let Some(cause) = current.source() {
            if chain.len() > self.unwrap_limit {
                tracing::debug!(limit = self.unwrap_limit, "cause chain truncated at unwrap limit");
                break;
            }
            if chain.iter().any(|&seen| same_link(seen, cause)) {
                tracing::debug!(depth = chain.len(), "cause chain truncated at a repeated link");
                break;
            }
            chain.push(cause);
            current = cause;
        }
        chain
    }

    fn dispatch<'a>(
        &self,
        chain: &[Failure<'a>],
        scope: &RequestScope,
    ) -> Option<(Failure<'a>, Handled)> {
        let registries: Vec<&HandlerRegistry> = scope
            .registry()
            .map(Arc::as_ref)
            .into_iter()
            .chain(std::iter::once(self.registry.as_ref()))
            .collect();

        for registry in &registries {
            for &failure in chain.iter().rev() {
                let handler = registry
                    .resolve(registry.identify(failure))
                    .filter(|h| !h.is_catch_all());
                if let Some(handler) = handler {
                    return run(registry, handler, failure).map(|handled| (failure, handled));
                }
            }
        }

        let &root = chain.last()?;
        for registry in &registries {
            if let Some(handler) = registry.resolve(FailureType::root()) {
                return run(registry, handler, root).map(|handled| (root, handled));
            }
        }

        tracing::debug!(failure = %root, "failure left unclassified: no handler matched");
        None
    }

    fn finish(
        &self,
        matched: Failure<'_>,
        mut response: ResponseProblem,
        scope: &RequestScope,
    ) -> ResponseProblem {
        let ctx = CustomizeContext::new(matched)
            .with_request_id(scope.request_id())
            .with_locale(scope.locale());
        for customizer in &self.customizers {
            customizer.customize(&ctx, &mut response);
        }
        response
    }
}

impl fmt::Debug for ClassificationManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassificationManager")
            .field("registry", &self.registry)
            .field("customizers", &self.customizers.len())
            .field("unwrap_limit", &self.unwrap_limit)
            .finish()
    }
}

/// Same error object: equal address and equal vtable. A cause stored inline
/// at the start of its wrapper shares the wrapper's address but not its type.
#[allow(ambiguous_wide_pointer_comparisons)]
fn same_link(a: Failure<'_>, b: Failure<'_>) -> bool {
    std::ptr::eq(a, b)
}

fn carried_problem<'a>(chain: &[Failure<'a>]) -> Option<(Failure<'a>, Handled)> {
    chain.iter().rev().find_map(|&failure| {
        failure
            .downcast_ref::<ProblemError>()
            .map(|e| (failure, Handled::Problem(e.problem().clone())))
    })
}

fn run(registry: &HandlerRegistry, handler: &Handler, failure: Failure<'_>) -> Option<Handled> {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| registry.invoke(handler, failure)));
    match outcome {
        Ok(Ok(Some(handled))) => Some(handled),
        Ok(Ok(None)) => {
            tracing::debug!(
                failure_type = %handler.failure_type(),
                "problem handler declined the failure"
            );
            None
        }
        Ok(Err(e)) => {
            tracing::warn!(
                failure_type = %handler.failure_type(),
                error = %e,
                "problem handler failed; failure left unclassified"
            );
            None
        }
        Err(payload) => {
            tracing::error!(
                failure_type = %handler.failure_type(),
                panic = panic_message(payload.as_ref()),
                "problem handler panicked; failure left unclassified"
            );
            None
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
