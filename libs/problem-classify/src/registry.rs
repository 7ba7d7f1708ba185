//! Handler registry with nearest-ancestor resolution.
//!
//! Design goals:
//! - Handlers are registered once, during a deterministic configuration phase.
//! - Resolution picks the handler of the nearest registered ancestor of a
//!   concrete failure type; ties are broken by registration order.
//! - Every resolution outcome, including "no handler", is cached per concrete
//!   type, so the hot path is a single concurrent map lookup.
//!
//! Implementation details:
//! - Key = `TypeId` of the concrete failure type (undeclared types share the
//!   root key).
//! - Value = index into the handler list, or `None` for the no-match sentinel.
//! - The cache is a `DashMap`; concurrent misses may compute the same entry
//!   twice, which is harmless because resolution is deterministic.

use std::any::TypeId;
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use problem_core::{Problem, ResponseProblem};
use serde::{Deserialize, Serialize};

use crate::hierarchy::{FailureType, Subtype, TypeHierarchy};

/// Error type returned by handlers.
pub type BoxError = Box<dyn Error + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("a handler is already registered for {failure_type}")]
    DuplicateHandler { failure_type: &'static str },

    #[error("declaring {child} as a subtype of {parent} would create a cycle")]
    HierarchyCycle {
        child: &'static str,
        parent: &'static str,
    },

    #[error("{failure_type} cannot extend itself")]
    SelfExtension { failure_type: &'static str },
}

/// What happens when a second handler is registered for the same type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Fail the build with [`RegistryError::DuplicateHandler`].
    #[default]
    Reject,
    /// Keep the handler registered first.
    KeepFirst,
    /// Use the newer handler at the older one's registration position.
    Replace,
}

/// Outcome of a handler that classified its failure.
#[derive(Debug, Clone, PartialEq)]
pub enum Handled {
    Problem(Problem),
    Response(ResponseProblem),
}

impl Handled {
    #[must_use]
    pub fn into_response(self) -> ResponseProblem {
        match self {
            Self::Problem(problem) => ResponseProblem::with(problem),
            Self::Response(response) => response,
        }
    }
}

impl From<Problem> for Handled {
    fn from(problem: Problem) -> Self {
        Self::Problem(problem)
    }
}

impl From<ResponseProblem> for Handled {
    fn from(response: ResponseProblem) -> Self {
        Self::Response(response)
    }
}

/// Values a handler may return.
///
/// `Ok(None)` means the handler declined the failure.
pub trait IntoHandled {
    /// # Errors
    /// Returns the handler's own error.
    fn into_handled(self) -> Result<Option<Handled>, BoxError>;
}

impl IntoHandled for Handled {
    fn into_handled(self) -> Result<Option<Handled>, BoxError> {
        Ok(Some(self))
    }
}

impl IntoHandled for Problem {
    fn into_handled(self) -> Result<Option<Handled>, BoxError> {
        Ok(Some(Handled::Problem(self)))
    }
}

impl IntoHandled for ResponseProblem {
    fn into_handled(self) -> Result<Option<Handled>, BoxError> {
        Ok(Some(Handled::Response(self)))
    }
}

impl<T: IntoHandled> IntoHandled for Option<T> {
    fn into_handled(self) -> Result<Option<Handled>, BoxError> {
        self.map_or(Ok(None), IntoHandled::into_handled)
    }
}

impl<T, E> IntoHandled for Result<T, E>
where
    T: IntoHandled,
    E: Into<BoxError>,
{
    fn into_handled(self) -> Result<Option<Handled>, BoxError> {
        match self {
            Ok(value) => value.into_handled(),
            Err(e) => Err(e.into()),
        }
    }
}

type HandlerFn =
    dyn Fn(&TypeHierarchy, &(dyn Error + 'static)) -> Result<Option<Handled>, BoxError> + Send + Sync;

fn handler_fn<F>(f: F) -> Arc<HandlerFn>
where
    F: Fn(&TypeHierarchy, &(dyn Error + 'static)) -> Result<Option<Handled>, BoxError>
        + Send
        + Sync
        + 'static,
{
    Arc::new(f)
}

/// A registered handler.
#[derive(Clone)]
pub struct Handler {
    failure_type: FailureType,
    position: usize,
    func: Arc<HandlerFn>,
}

impl Handler {
    /// The type the handler was registered for.
    #[must_use]
    pub fn failure_type(&self) -> FailureType {
        self.failure_type
    }

    /// Registration position, the secondary resolution order.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Whether this is a catch-all handler registered for the root type.
    #[must_use]
    pub fn is_catch_all(&self) -> bool {
        self.failure_type.is_root()
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("failure_type", &self.failure_type)
            .field("position", &self.position)
            .finish_non_exhaustive()
    }
}

/// Configuration-phase builder for [`HandlerRegistry`].
///
/// Methods are chainable; the first configuration error is kept and
/// returned by [`build`](Self::build).
pub struct HandlerRegistryBuilder {
    hierarchy: TypeHierarchy,
    entries: Vec<Handler>,
    policy: DuplicatePolicy,
    error: Option<RegistryError>,
}

impl Default for HandlerRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlerRegistryBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::with_hierarchy(TypeHierarchy::new(), DuplicatePolicy::default())
    }

    fn with_hierarchy(hierarchy: TypeHierarchy, policy: DuplicatePolicy) -> Self {
        Self {
            hierarchy,
            entries: Vec::new(),
            policy,
            error: None,
        }
    }

    /// Declare `C` as a direct subtype of `P`.
    #[must_use]
    pub fn extends<C, P>(mut self) -> Self
    where
        C: Subtype<P> + Error + 'static,
        P: Error + 'static,
    {
        if let Err(e) = self.hierarchy.extends::<C, P>() {
            self.error.get_or_insert(e);
        }
        self
    }

    /// Make `T` identifiable without registering a handler for it.
    #[must_use]
    pub fn declare<T: Error + 'static>(mut self) -> Self {
        self.hierarchy.declare::<T>();
        self
    }

    /// Register a handler for `T` and, through the declared hierarchy, for
    /// every subtype of `T` without a nearer handler.
    #[must_use]
    pub fn register<T, F, R>(mut self, handler: F) -> Self
    where
        T: Error + 'static,
        F: Fn(&T) -> R + Send + Sync + 'static,
        R: IntoHandled,
    {
        let failure_type = self.hierarchy.declare::<T>();
        let func = handler_fn(move |hierarchy, failure| match hierarchy.view::<T>(failure) {
            Some(matched) => handler(matched).into_handled(),
            None => Ok(None),
        });
        self.push(failure_type, func);
        self
    }

    /// Register a catch-all handler for the root failure type.
    #[must_use]
    pub fn register_any<F, R>(mut self, handler: F) -> Self
    where
        F: Fn(&(dyn Error + 'static)) -> R + Send + Sync + 'static,
        R: IntoHandled,
    {
        let func = handler_fn(move |_, failure| handler(failure).into_handled());
        self.push(FailureType::root(), func);
        self
    }

    #[must_use]
    pub fn duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.policy = policy;
        self
    }

    fn push(&mut self, failure_type: FailureType, func: Arc<HandlerFn>) {
        tracing::debug!(failure_type = %failure_type, "problem handler registered");
        self.entries.push(Handler {
            failure_type,
            position: self.entries.len(),
            func,
        });
    }

    /// Freeze the registry.
    ///
    /// # Errors
    /// Returns the first hierarchy error recorded during configuration, or
    /// [`RegistryError::DuplicateHandler`] under [`DuplicatePolicy::Reject`].
    pub fn build(self) -> Result<HandlerRegistry, RegistryError> {
        if let Some(e) = self.error {
            return Err(e);
        }

        let mut handlers: Vec<Handler> = Vec::with_capacity(self.entries.len());
        let mut slots: HashMap<TypeId, usize> = HashMap::new();
        for mut entry in self.entries {
            let Some(&slot) = slots.get(&entry.failure_type.id()) else {
                entry.position = handlers.len();
                slots.insert(entry.failure_type.id(), entry.position);
                handlers.push(entry);
                continue;
            };
            match self.policy {
                DuplicatePolicy::Reject => {
                    return Err(RegistryError::DuplicateHandler {
                        failure_type: entry.failure_type.name(),
                    });
                }
                DuplicatePolicy::KeepFirst => {
                    tracing::debug!(
                        failure_type = %entry.failure_type,
                        "duplicate problem handler ignored"
                    );
                }
                DuplicatePolicy::Replace => {
                    tracing::debug!(
                        failure_type = %entry.failure_type,
                        position = slot,
                        "problem handler replaced"
                    );
                    entry.position = slot;
                    if let Some(existing) = handlers.get_mut(slot) {
                        *existing = entry;
                    }
                }
            }
        }

        tracing::debug!(
            handlers = handlers.len(),
            types = self.hierarchy.len(),
            "problem handler registry built"
        );
        Ok(HandlerRegistry {
            hierarchy: self.hierarchy,
            handlers,
            cache: DashMap::new(),
            scans: AtomicUsize::new(0),
            policy: self.policy,
        })
    }
}

/// Immutable mapping from failure types to handlers, with a resolution cache.
pub struct HandlerRegistry {
    hierarchy: TypeHierarchy,
    handlers: Vec<Handler>,
    cache: DashMap<TypeId, Option<usize>>,
    scans: AtomicUsize,
    policy: DuplicatePolicy,
}

impl HandlerRegistry {
    #[must_use]
    pub fn builder() -> HandlerRegistryBuilder {
        HandlerRegistryBuilder::new()
    }

    /// A builder for a scope-local registry that shares this registry's
    /// hierarchy and duplicate policy but none of its handlers.
    #[must_use]
    pub fn scope(&self) -> HandlerRegistryBuilder {
        HandlerRegistryBuilder::with_hierarchy(self.hierarchy.clone(), self.policy)
    }

    /// Handler of the nearest registered ancestor of `ty`, if any.
    #[must_use]
    pub fn resolve(&self, ty: FailureType) -> Option<&Handler> {
        let cached = self.cache.get(&ty.id()).map(|entry| *entry);
        let slot = cached.unwrap_or_else(|| {
            let slot = self.scan(ty);
            self.cache.insert(ty.id(), slot);
            slot
        });
        slot.and_then(|i| self.handlers.get(i))
    }

    fn scan(&self, ty: FailureType) -> Option<usize> {
        self.scans.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(failure_type = %ty, "scanning problem handlers");

        let distances: HashMap<FailureType, usize> =
            self.hierarchy.ancestors(ty).into_iter().collect();
        self.handlers
            .iter()
            .filter_map(|h| distances.get(&h.failure_type).map(|d| (*d, h.position)))
            .min()
            .map(|(_, position)| position)
    }

    /// Exact concrete type of `failure` as known to this registry.
    #[must_use]
    pub fn identify(&self, failure: &(dyn Error + 'static)) -> FailureType {
        self.hierarchy.identify(failure)
    }

    /// Run `handler` against `failure`.
    ///
    /// # Errors
    /// Returns whatever error the handler returns.
    pub fn invoke(
        &self,
        handler: &Handler,
        failure: &(dyn Error + 'static),
    ) -> Result<Option<Handled>, BoxError> {
        (handler.func)(&self.hierarchy, failure)
    }

    /// Number of full registry scans performed so far (cache misses).
    #[must_use]
    pub fn scan_count(&self) -> usize {
        self.scans.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn hierarchy(&self) -> &TypeHierarchy {
        &self.hierarchy
    }

    /// Registered handlers in resolution tie-break order.
    #[must_use]
    pub fn handlers(&self) -> impl Iterator<Item = &Handler> {
        self.handlers.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.handlers)
            .field("hierarchy", &self.hierarchy)
            .field("policy", &self.policy)
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}
