//! Failure type identities and the declared supertype graph.
//!
//! Rust has no class inheritance, so a failure type that "is a" more general
//! failure embeds that failure and exposes it through [`Subtype::upcast`].
//! Declaring the relation with [`TypeHierarchy::extends`] records the edge
//! together with the projection, which lets a handler written for the
//! supertype receive a `&P` for any subtype instance.
//!
//! Every failure type implicitly extends the root type (`dyn Error`), which
//! is the most distant ancestor of all.
//!
//! [`TypeHierarchy::identify`] downcasts against each declared type in
//! declaration order. Its cost grows linearly with the number of declared
//! types and is paid for every link of a cause chain; only the handler
//! resolution that follows is cached per concrete type.

use std::any::{Any, TypeId};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet, VecDeque};
use std::error::Error;
use std::fmt;

use crate::registry::RegistryError;

/// Embedded supertype of a failure type.
///
/// ```
/// use problem_classify::Subtype;
///
/// #[derive(Debug, thiserror::Error)]
/// #[error("validation failed")]
/// struct Validation;
///
/// #[derive(Debug, thiserror::Error)]
/// #[error("signup form invalid")]
/// struct SignupInvalid {
///     base: Validation,
/// }
///
/// impl Subtype<Validation> for SignupInvalid {
///     fn upcast(&self) -> &Validation {
///         &self.base
///     }
/// }
/// ```
pub trait Subtype<P> {
    fn upcast(&self) -> &P;
}

/// Identity of a failure type.
#[derive(Clone, Copy)]
pub struct FailureType {
    id: TypeId,
    name: &'static str,
}

impl FailureType {
    #[must_use]
    pub fn of<T: Error + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The implicit ancestor of every failure type.
    #[must_use]
    pub fn root() -> Self {
        Self {
            id: TypeId::of::<dyn Error + Send + Sync>(),
            name: "dyn Error",
        }
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.id == TypeId::of::<dyn Error + Send + Sync>()
    }

    #[must_use]
    pub fn id(&self) -> TypeId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for FailureType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for FailureType {}

impl std::hash::Hash for FailureType {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

type Probe = for<'a> fn(&'a (dyn Error + 'static)) -> Option<&'a dyn Any>;
type Upcast = for<'a> fn(&'a dyn Any) -> Option<&'a dyn Any>;

fn probe<'a, T: Error + 'static>(failure: &'a (dyn Error + 'static)) -> Option<&'a dyn Any> {
    failure.downcast_ref::<T>().map(|t| t as &dyn Any)
}

fn upcast<'a, C, P>(value: &'a dyn Any) -> Option<&'a dyn Any>
where
    C: Subtype<P> + 'static,
    P: 'static,
{
    value.downcast_ref::<C>().map(|c| c.upcast() as &dyn Any)
}

#[derive(Clone)]
struct Node {
    ty: FailureType,
    probe: Probe,
    parents: Vec<(FailureType, Upcast)>,
}

/// Declared failure types and their direct supertypes.
#[derive(Clone, Default)]
pub struct TypeHierarchy {
    nodes: HashMap<TypeId, Node>,
    order: Vec<TypeId>,
}

impl TypeHierarchy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `T` identifiable; idempotent.
    pub fn declare<T: Error + 'static>(&mut self) -> FailureType {
        let ty = FailureType::of::<T>();
        if let Entry::Vacant(slot) = self.nodes.entry(ty.id) {
            slot.insert(Node {
                ty,
                probe: probe::<T>,
                parents: Vec::new(),
            });
            self.order.push(ty.id);
        }
        ty
    }

    /// Declare `C` as a direct subtype of `P`.
    ///
    /// # Errors
    /// Returns [`RegistryError::SelfExtension`] when `C` and `P` are the same
    /// type and [`RegistryError::HierarchyCycle`] when `P` already descends
    /// from `C`.
    pub fn extends<C, P>(&mut self) -> Result<(), RegistryError>
    where
        C: Subtype<P> + Error + 'static,
        P: Error + 'static,
    {
        let child = FailureType::of::<C>();
        let parent = FailureType::of::<P>();
        if child == parent {
            return Err(RegistryError::SelfExtension {
                failure_type: child.name,
            });
        }
        self.declare::<P>();
        if self.is_supertype_of(child, parent) {
            return Err(RegistryError::HierarchyCycle {
                child: child.name,
                parent: parent.name,
            });
        }
        self.declare::<C>();
        if let Some(node) = self.nodes.get_mut(&child.id)
            && !node.parents.iter().any(|(p, _)| *p == parent)
        {
            node.parents.push((parent, upcast::<C, P>));
        }
        Ok(())
    }

    /// Number of declared types, the root excluded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Exact concrete type of `failure`; the root for undeclared types.
    #[must_use]
    pub fn identify(&self, failure: &(dyn Error + 'static)) -> FailureType {
        self.order
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .find(|node| (node.probe)(failure).is_some())
            .map_or_else(FailureType::root, |node| node.ty)
    }

    /// `ty` and all its ancestors with their distance from `ty`, nearest
    /// first. The root always comes last, at distance `usize::MAX`.
    #[must_use]
    pub fn ancestors(&self, ty: FailureType) -> Vec<(FailureType, usize)> {
        if ty.is_root() {
            return vec![(ty, 0)];
        }
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut queue = VecDeque::from([(ty, 0usize)]);
        while let Some((current, depth)) = queue.pop_front() {
            if !seen.insert(current.id) {
                continue;
            }
            out.push((current, depth));
            if let Some(node) = self.nodes.get(&current.id) {
                for (parent, _) in &node.parents {
                    queue.push_back((*parent, depth + 1));
                }
            }
        }
        out.push((FailureType::root(), usize::MAX));
        out
    }

    /// Hops from `ty` up to `ancestor`, or `None` when unrelated.
    #[must_use]
    pub fn distance(&self, ancestor: FailureType, ty: FailureType) -> Option<usize> {
        self.ancestors(ty)
            .into_iter()
            .find(|(candidate, _)| *candidate == ancestor)
            .map(|(_, depth)| depth)
    }

    /// Whether `ty` is `ancestor` or one of its subtypes.
    #[must_use]
    pub fn is_supertype_of(&self, ancestor: FailureType, ty: FailureType) -> bool {
        self.distance(ancestor, ty).is_some()
    }

    /// Project `failure` onto its ancestor `P`.
    #[must_use]
    pub fn view<'a, P: Error + 'static>(&self, failure: &'a (dyn Error + 'static)) -> Option<&'a P> {
        if let Some(direct) = failure.downcast_ref::<P>() {
            return Some(direct);
        }
        let target = TypeId::of::<P>();
        self.order
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .find_map(|node| {
                let value = (node.probe)(failure)?;
                self.project(node.ty.id, value, target)
            })
            .and_then(|value| value.downcast_ref::<P>())
    }

    fn project<'a>(&self, from: TypeId, value: &'a dyn Any, target: TypeId) -> Option<&'a dyn Any> {
        if from == target {
            return Some(value);
        }
        let node = self.nodes.get(&from)?;
        node.parents.iter().find_map(|(parent, up)| {
            let lifted = up(value)?;
            self.project(parent.id, lifted, target)
        })
    }
}

impl fmt::Debug for TypeHierarchy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for node in self.order.iter().filter_map(|id| self.nodes.get(id)) {
            let parents: Vec<_> = node.parents.iter().map(|(p, _)| p.name).collect();
            map.entry(&node.ty.name, &parents);
        }
        map.finish()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("a")]
    struct A;

    #[derive(Debug, thiserror::Error)]
    #[error("b")]
    struct B {
        a: A,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("c")]
    struct C {
        b: B,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("unrelated")]
    struct Unrelated;

    impl Subtype<A> for B {
        fn upcast(&self) -> &A {
            &self.a
        }
    }

    impl Subtype<B> for C {
        fn upcast(&self) -> &B {
            &self.b
        }
    }

    impl Subtype<C> for A {
        fn upcast(&self) -> &C {
            unreachable!("only used to provoke a cycle")
        }
    }

    impl Subtype<A> for A {
        fn upcast(&self) -> &A {
            self
        }
    }

    fn abc() -> TypeHierarchy {
        let mut h = TypeHierarchy::new();
        h.extends::<B, A>().unwrap();
        h.extends::<C, B>().unwrap();
        h
    }

    #[test]
    fn distances_follow_declared_edges() {
        let h = abc();
        let c = FailureType::of::<C>();
        assert_eq!(h.distance(FailureType::of::<C>(), c), Some(0));
        assert_eq!(h.distance(FailureType::of::<B>(), c), Some(1));
        assert_eq!(h.distance(FailureType::of::<A>(), c), Some(2));
        assert_eq!(h.distance(FailureType::root(), c), Some(usize::MAX));
        assert_eq!(h.distance(FailureType::of::<C>(), FailureType::of::<A>()), None);
    }

    #[test]
    fn undeclared_types_identify_as_root() {
        let h = abc();
        assert!(h.identify(&Unrelated).is_root());
        assert_eq!(h.identify(&C { b: B { a: A } }), FailureType::of::<C>());
    }

    #[test]
    fn view_projects_through_intermediate_supertypes() {
        let h = abc();
        let failure = C { b: B { a: A } };
        assert!(h.view::<A>(&failure).is_some());
        assert!(h.view::<B>(&failure).is_some());
        assert!(h.view::<Unrelated>(&failure).is_none());
    }

    #[test]
    fn cycles_and_self_extension_are_rejected() {
        let mut h = abc();
        assert!(matches!(
            h.extends::<A, C>(),
            Err(RegistryError::HierarchyCycle { .. })
        ));
        assert!(matches!(
            h.extends::<A, A>(),
            Err(RegistryError::SelfExtension { .. })
        ));
    }

    #[test]
    fn repeated_extension_is_idempotent() {
        let mut h = abc();
        h.extends::<B, A>().unwrap();
        let ancestors = h.ancestors(FailureType::of::<B>());
        assert_eq!(ancestors.len(), 3);
        assert_eq!(h.len(), 3);
    }
}
