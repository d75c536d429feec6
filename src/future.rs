use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::ValueError;
use crate::node::{Dependency, NodeRef, TypedNode};
use crate::runtime::Runtime;

/// A typed handle to a node that resolves to a value of type `T`.
///
/// A `Future<T>` is a lightweight, clonable token representing the result of
/// a task. The value is computed lazily when the node is invoked under a
/// build-type command and memoized for the rest of the run; reading it
/// earlier fails with [`ValueError::Unresolved`].
///
/// # Diamond dependencies
///
/// If two tasks both depend on the same future, the underlying node still
/// runs its action only once per run and both read the shared value.
pub struct Future<T> {
    pub(crate) node: NodeRef,
    _phantom: PhantomData<fn() -> T>,
}

impl<T> Clone for Future<T> {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
            _phantom: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for Future<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Future({})", self.node.name())
    }
}

impl<T> Future<T>
where
    T: Send + Sync + 'static,
{
    /// Wrap a typed node into a future of its output.
    pub fn from_node<N>(node: N) -> Self
    where
        N: TypedNode<Output = T> + 'static,
    {
        Self {
            node: Arc::new(node),
            _phantom: PhantomData,
        }
    }

    /// The underlying node.
    pub fn node(&self) -> &NodeRef {
        &self.node
    }

    /// Read the resolved value.
    ///
    /// Fails with [`ValueError::Unresolved`] if the node has not been invoked
    /// under a build-type command in the current run. Repeated reads return
    /// the same cached value without re-running the action.
    pub fn value(&self, rt: &Runtime) -> Result<Arc<T>, ValueError> {
        rt.value(self)
    }

    /// Derive a future whose value is computed from this one.
    ///
    /// The mapping introduces no action of its own, but it is still a regular
    /// node wired through a dependency edge, so traversal order is respected.
    pub fn map<U, F>(&self, f: F) -> Future<U>
    where
        U: Send + Sync + 'static,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        Future::from_node(MapNode {
            upstream: self.clone(),
            apply: f,
            _phantom: PhantomData,
        })
    }
}

impl<I> Future<Vec<I>>
where
    I: Clone + Send + Sync + 'static,
{
    /// Keep only the elements for which `pred` holds.
    pub fn filter<F>(&self, pred: F) -> Future<Vec<I>>
    where
        F: Fn(&I) -> bool + Send + Sync + 'static,
    {
        self.map(move |items: &Vec<I>| {
            let mut kept = Vec::new();
            for item in items {
                if pred(item) {
                    kept.push(item.clone());
                }
            }
            kept
        })
    }
}

impl<T> From<&Future<T>> for Dependency {
    fn from(future: &Future<T>) -> Self {
        Dependency::new(future.node.clone())
    }
}

impl<T> From<Future<T>> for Dependency {
    fn from(future: Future<T>) -> Self {
        Dependency::new(future.node)
    }
}

struct MapNode<T, U, F> {
    upstream: Future<T>,
    apply: F,
    _phantom: PhantomData<fn() -> U>,
}

impl<T, U, F> TypedNode for MapNode<T, U, F>
where
    T: Send + Sync + 'static,
    U: Send + Sync + 'static,
    F: Fn(&T) -> U + Send + Sync + 'static,
{
    type Output = U;

    fn name(&self) -> String {
        format!("map of {}", self.upstream.node.name())
    }

    fn dependencies(&self) -> Vec<Dependency> {
        vec![Dependency::from(&self.upstream)]
    }

    fn build(&self, rt: &mut Runtime) -> anyhow::Result<U> {
        let value = self.upstream.value(rt)?;
        Ok((self.apply)(&value))
    }
}
