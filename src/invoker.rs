//! The traversal engine driving the task graph for one command run.
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use console::style;

use crate::command::{Command, Direction};
use crate::error::{InvokeError, ValueError};
use crate::future::Future;
use crate::node::{Dependency, Dynamic, NodeId, NodeRef, node_edges};
use crate::runtime::{Describer, Environment, Runtime};

/// Per-node progress within one top-level walk.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Phase {
    Invoking,
    Invoked,
}

/// Memo for a single top-level walk.
///
/// A fresh one is created for every [`Invoker::invoke`] call and for the
/// clean-after-build pass, so a node built during the run can still be
/// cleaned afterwards.
pub(crate) struct Pass {
    memo: HashMap<NodeId, Phase>,
    trail: Vec<String>,
}

impl Pass {
    fn new() -> Self {
        Self {
            memo: HashMap::new(),
            trail: Vec::new(),
        }
    }
}

/// Drives the task graph for one command run.
///
/// The invoker owns all run-scoped state: the resolved values, the adjacency
/// observed while walking (static edges plus dynamic expansions), and the
/// clean-after-build registry. Create a new invoker per command run; the
/// nodes themselves carry no run state and can be shared between runs.
pub struct Invoker<'e> {
    env: &'e Environment,
    values: HashMap<NodeId, Dynamic>,
    observed: HashMap<NodeId, Vec<Dependency>>,
    registry: Vec<(NodeId, NodeRef)>,
    root: Option<NodeRef>,
}

impl<'e> Invoker<'e> {
    pub fn new(env: &'e Environment) -> Self {
        Self {
            env,
            values: HashMap::new(),
            observed: HashMap::new(),
            registry: Vec::new(),
            root: None,
        }
    }

    pub(crate) fn env(&self) -> &'e Environment {
        self.env
    }

    /// Run `command` to completion: invoke `root`, then the clean-after-build
    /// pass when the command has one.
    pub fn run(&mut self, command: Command, root: &NodeRef) -> Result<(), InvokeError> {
        eprintln!(
            "Running {} under {}.",
            style(root.name()).green(),
            style(command).blue()
        );

        self.invoke(command, root)?;
        self.clean_after_build(command)?;

        Ok(())
    }

    /// Invoke `root` under `command`: dependency-first for build-type
    /// commands, dependent-first tear-down for [`Command::Clean`].
    ///
    /// A node reachable over several paths acts at most once; re-entering a
    /// node that is still being invoked is a cycle and fails fast.
    pub fn invoke(&mut self, command: Command, root: &NodeRef) -> Result<(), InvokeError> {
        if command.builds() && self.root.is_none() {
            self.root = Some(root.clone());
        }

        let mut pass = Pass::new();
        self.walk(command, root, &mut pass)
    }

    pub(crate) fn walk(
        &mut self,
        command: Command,
        node: &NodeRef,
        pass: &mut Pass,
    ) -> Result<(), InvokeError> {
        let id = NodeId::of(node);

        match pass.memo.get(&id) {
            Some(Phase::Invoked) => return Ok(()),
            Some(Phase::Invoking) => {
                let mut trail = pass.trail.clone();
                trail.push(node.name());
                return Err(InvokeError::Cycle(trail.join(" -> ")));
            }
            None => {}
        }

        pass.memo.insert(id, Phase::Invoking);
        pass.trail.push(node.name());

        let edges = node_edges(node);

        if command.builds() {
            self.observed
                .entry(id)
                .or_default()
                .extend(edges.iter().cloned());

            for edge in &edges {
                if edge.is_clean_after_build() {
                    self.registry.push((id, edge.target().clone()));
                }
            }
        }

        match command.direction() {
            Direction::DependenciesFirst => {
                for edge in &edges {
                    self.walk(command, edge.target(), pass)?;
                }
                self.execute(command, node, id, pass)?;
            }
            Direction::DependentsFirst => {
                self.execute(command, node, id, pass)?;
                for edge in &edges {
                    self.walk(command, edge.target(), pass)?;
                }
            }
        }

        pass.trail.pop();
        pass.memo.insert(id, Phase::Invoked);

        Ok(())
    }

    fn execute(
        &mut self,
        command: Command,
        node: &NodeRef,
        id: NodeId,
        pass: &mut Pass,
    ) -> Result<(), InvokeError> {
        if command.builds() {
            tracing::debug!(task = node.name(), "build");

            let value = {
                let mut rt = Runtime {
                    invoker: &mut *self,
                    pass: &mut *pass,
                    command,
                    current: id,
                };
                node.build(&mut rt)
            }
            .map_err(|source| InvokeError::Action {
                task: node.name(),
                source,
            })?;

            self.values.insert(id, value);
        } else if command.cleans() {
            tracing::debug!(task = node.name(), "clean");

            let result = {
                let mut rt = Runtime {
                    invoker: &mut *self,
                    pass: &mut *pass,
                    command,
                    current: id,
                };
                node.clean(&mut rt)
            };

            result.map_err(|source| InvokeError::Action {
                task: node.name(),
                source,
            })?;
        }

        Ok(())
    }

    /// Record a dynamically discovered sub-node as a plain edge, so the
    /// clean-after-build pass sees the expansion.
    pub(crate) fn record_expansion(&mut self, parent: NodeId, node: &NodeRef) {
        self.observed
            .entry(parent)
            .or_default()
            .push(Dependency::new(node.clone()));
    }

    /// Tear down the dependencies recorded as clean-after-build during the
    /// preceding build. Must be called with the same command token as the
    /// build; a no-op for commands without a cleanup phase.
    ///
    /// The pass works as follows:
    /// 1. Take the registry of edges flagged clean-after-build while the
    ///    build walked them; it is consumed exactly once.
    /// 2. Mark every node still reachable from the run's root without
    ///    crossing a flagged edge as preserved.
    /// 3. Walk each recorded target's dependency closure dependent-first,
    ///    under a fresh memo, invoking the clean action of every node that
    ///    is not preserved.
    pub fn clean_after_build(&mut self, command: Command) -> Result<(), InvokeError> {
        if !command.has_cleanup_phase() {
            return Ok(());
        }

        let registry = std::mem::take(&mut self.registry);
        if registry.is_empty() {
            return Ok(());
        }

        let preserved = self.reachable_without_transients();

        let mut pass = Pass::new();
        for (_, target) in &registry {
            self.clean_walk(target, &preserved, &mut pass)?;
        }

        Ok(())
    }

    /// Every node reachable from the run's root over edges that were not
    /// flagged clean-after-build. These survive the cleanup pass even when a
    /// flagged edge also reaches them.
    fn reachable_without_transients(&self) -> HashSet<NodeId> {
        let mut reachable = HashSet::new();
        let mut queue = Vec::new();

        if let Some(root) = &self.root {
            let id = NodeId::of(root);
            reachable.insert(id);
            queue.push(id);
        }

        while let Some(id) = queue.pop() {
            for edge in self.observed.get(&id).into_iter().flatten() {
                if edge.is_clean_after_build() {
                    continue;
                }

                let target = NodeId::of(edge.target());
                if reachable.insert(target) {
                    queue.push(target);
                }
            }
        }

        reachable
    }

    fn clean_walk(
        &mut self,
        node: &NodeRef,
        preserved: &HashSet<NodeId>,
        pass: &mut Pass,
    ) -> Result<(), InvokeError> {
        let id = NodeId::of(node);

        match pass.memo.get(&id) {
            Some(Phase::Invoked) => return Ok(()),
            Some(Phase::Invoking) => {
                let mut trail = pass.trail.clone();
                trail.push(node.name());
                return Err(InvokeError::Cycle(trail.join(" -> ")));
            }
            None => {}
        }

        pass.memo.insert(id, Phase::Invoking);
        pass.trail.push(node.name());

        if !preserved.contains(&id) {
            tracing::debug!(task = node.name(), "clean after build");

            let result = {
                let mut rt = Runtime {
                    invoker: &mut *self,
                    pass: &mut *pass,
                    command: Command::Clean,
                    current: id,
                };
                node.clean(&mut rt)
            };

            result.map_err(|source| InvokeError::Action {
                task: node.name(),
                source,
            })?;
        }

        // The closure follows the edges observed during the build, including
        // dynamic expansions; generators are not re-run here.
        let edges = self.observed.get(&id).cloned().unwrap_or_default();
        for edge in &edges {
            self.clean_walk(edge.target(), preserved, pass)?;
        }

        pass.trail.pop();
        pass.memo.insert(id, Phase::Invoked);

        Ok(())
    }

    /// Read the value `future` resolved to during this run.
    pub fn value<T>(&self, future: &Future<T>) -> Result<Arc<T>, ValueError>
    where
        T: Send + Sync + 'static,
    {
        let node = future.node();
        let value = self
            .values
            .get(&NodeId::of(node))
            .ok_or_else(|| ValueError::Unresolved(node.name()))?;

        value
            .clone()
            .downcast::<T>()
            .map_err(|_| ValueError::TypeMismatch(node.name(), std::any::type_name::<T>()))
    }

    /// Walk the graph dependency-first without running any actions, writing
    /// each node's description to `out` once, nested by depth.
    pub fn describe(&self, root: &NodeRef, out: &mut String) -> std::fmt::Result {
        let mut seen = HashSet::new();
        let mut sink = Describer::new(out);
        Self::describe_walk(root, &mut seen, &mut sink)
    }

    fn describe_walk(
        node: &NodeRef,
        seen: &mut HashSet<NodeId>,
        sink: &mut Describer<'_>,
    ) -> std::fmt::Result {
        let id = NodeId::of(node);
        if !seen.insert(id) {
            return Ok(());
        }

        sink.enter();
        for edge in node_edges(node) {
            Self::describe_walk(edge.target(), seen, sink)?;
        }
        sink.leave();

        sink.line(node)
    }
}
