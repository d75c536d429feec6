//! The node abstraction shared by every task in the graph.
use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::runtime::Runtime;

/// A type-erased, thread-safe container for a node's resolved value.
pub(crate) type Dynamic = Arc<dyn Any + Send + Sync>;

/// A shared reference to a node in the graph.
pub type NodeRef = Arc<dyn Node>;

/// Reference identity of a node.
///
/// Nodes have no natural key; two `NodeRef`s are the same node exactly when
/// they point at the same allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub(crate) fn of(node: &NodeRef) -> Self {
        NodeId(Arc::as_ptr(node) as *const () as usize)
    }
}

/// The type-erased node trait held by the graph.
///
/// Most nodes are written against [`TypedNode`] and bridged here by the
/// blanket impl; the invoker only ever sees this erased form.
pub trait Node: Send + Sync {
    /// Human-readable name used in errors, logs and descriptions.
    fn name(&self) -> String;

    /// Dependency edges declared at construction time, in declaration order.
    fn dependencies(&self) -> Vec<Dependency>;

    /// Additional edges the node computes itself, e.g. from constructor
    /// arguments. Appended after [`dependencies`](Node::dependencies).
    fn extra_dependencies(&self) -> Vec<Dependency> {
        Vec::new()
    }

    /// Run the build action and produce the node's value.
    fn build(&self, rt: &mut Runtime) -> anyhow::Result<Dynamic>;

    /// Tear down whatever `build` produced. Default: nothing to remove.
    fn clean(&self, rt: &mut Runtime) -> anyhow::Result<()> {
        let _ = rt;
        Ok(())
    }

    /// Render a human-readable label for describe mode.
    fn describe(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        write!(out, "{}", self.name())
    }
}

/// A node with a concrete output type.
///
/// This is the trait tasks actually implement; the blanket impl below erases
/// the output into [`Dynamic`] so that nodes of different types can share one
/// graph.
pub trait TypedNode: Send + Sync {
    /// The concrete value this node resolves to.
    type Output: Send + Sync + 'static;

    fn name(&self) -> String;

    fn dependencies(&self) -> Vec<Dependency>;

    fn extra_dependencies(&self) -> Vec<Dependency> {
        Vec::new()
    }

    fn build(&self, rt: &mut Runtime) -> anyhow::Result<Self::Output>;

    fn clean(&self, rt: &mut Runtime) -> anyhow::Result<()> {
        let _ = rt;
        Ok(())
    }

    fn describe(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        write!(out, "{}", self.name())
    }
}

// A blanket implementation to automatically bridge the two. This is where the
// type erasure actually happens.
impl<T> Node for T
where
    T: TypedNode + 'static,
{
    fn name(&self) -> String {
        T::name(self)
    }

    fn dependencies(&self) -> Vec<Dependency> {
        T::dependencies(self)
    }

    fn extra_dependencies(&self) -> Vec<Dependency> {
        T::extra_dependencies(self)
    }

    fn build(&self, rt: &mut Runtime) -> anyhow::Result<Dynamic> {
        // Call the typed method, then erase the result.
        Ok(Arc::new(T::build(self, rt)?))
    }

    fn clean(&self, rt: &mut Runtime) -> anyhow::Result<()> {
        T::clean(self, rt)
    }

    fn describe(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        T::describe(self, out)
    }
}

/// A directed edge from a dependent node to one of its dependencies.
///
/// The `clean_after_build` flag marks the target as transient: after a
/// [`Command::BuildAndClean`](crate::Command::BuildAndClean) run it is torn
/// down again, unless some plain edge still reaches it from the root.
#[derive(Clone)]
pub struct Dependency {
    pub(crate) target: NodeRef,
    pub(crate) clean_after_build: bool,
}

impl Dependency {
    /// A plain edge to `target`.
    pub fn new(target: NodeRef) -> Self {
        Self {
            target,
            clean_after_build: false,
        }
    }

    /// Mark the target as transient.
    pub fn clean_after_build(mut self) -> Self {
        self.clean_after_build = true;
        self
    }

    /// The node this edge points at.
    pub fn target(&self) -> &NodeRef {
        &self.target
    }

    pub fn is_clean_after_build(&self) -> bool {
        self.clean_after_build
    }
}

impl From<NodeRef> for Dependency {
    fn from(target: NodeRef) -> Self {
        Dependency::new(target)
    }
}

impl From<&NodeRef> for Dependency {
    fn from(target: &NodeRef) -> Self {
        Dependency::new(target.clone())
    }
}

impl fmt::Debug for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dependency")
            .field("target", &self.target.name())
            .field("clean_after_build", &self.clean_after_build)
            .finish()
    }
}

/// Both edge sources of a node, merged in order: declared slots first, then
/// the node-computed extras.
pub(crate) fn node_edges(node: &NodeRef) -> Vec<Dependency> {
    let mut edges = node.dependencies();
    edges.extend(node.extra_dependencies());
    edges
}
