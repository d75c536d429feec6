use std::borrow::Cow;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::future::Future;
use crate::node::{Dependency, NodeRef, TypedNode};
use crate::runtime::Runtime;

type CleanFn = Box<dyn Fn(&mut Runtime) -> anyhow::Result<()> + Send + Sync>;

/// Start defining a task called `name`.
///
/// Dependencies are declared up front, in order; [`TaskDef::run`] seals the
/// definition with a build action and returns a typed [`Future`] of its
/// result.
///
/// ```rust,no_run
/// use dandori::{Input, task};
///
/// let out_dir = Input::<String>::with_default("OUT_DIR", "dist".into());
/// let render = task("render site")
///     .depends_on(&out_dir)
///     .run({
///         let out_dir = out_dir.clone();
///         move |rt| {
///             let dir = out_dir.value(rt)?;
///             // render into `dir`...
///             Ok(dir.len())
///         }
///     });
/// ```
pub fn task(name: impl Into<Cow<'static, str>>) -> TaskDef {
    TaskDef {
        name: name.into(),
        description: None,
        dependencies: Vec::new(),
        clean: None,
    }
}

/// An unsealed task definition; see [`task`].
pub struct TaskDef {
    name: Cow<'static, str>,
    description: Option<String>,
    dependencies: Vec<Dependency>,
    clean: Option<CleanFn>,
}

impl TaskDef {
    /// Add a plain dependency edge.
    ///
    /// Every future the build action reads must be declared here, otherwise
    /// the read may happen before the value is resolved.
    pub fn depends_on(mut self, dep: impl Into<Dependency>) -> Self {
        self.dependencies.push(dep.into());
        self
    }

    /// Add a transient dependency edge: built before this task, torn down by
    /// the clean-after-build pass unless reachable through a plain edge.
    pub fn depends_on_transient(mut self, dep: impl Into<Dependency>) -> Self {
        self.dependencies.push(dep.into().clean_after_build());
        self
    }

    /// Override the describe-mode label.
    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Attach a clean action, run under [`Command::Clean`](crate::Command)
    /// and by the clean-after-build pass.
    pub fn clean<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Runtime) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.clean = Some(Box::new(f));
        self
    }

    /// Seal the definition with a build action, returning the future of its
    /// result.
    pub fn run<F, R>(self, f: F) -> Future<R>
    where
        F: Fn(&mut Runtime) -> anyhow::Result<R> + Send + Sync + 'static,
        R: Send + Sync + 'static,
    {
        Future::from_node(TaskNode {
            name: self.name,
            description: self.description,
            dependencies: self.dependencies,
            build: f,
            clean: self.clean,
            _phantom: PhantomData,
        })
    }
}

struct TaskNode<F, R> {
    name: Cow<'static, str>,
    description: Option<String>,
    dependencies: Vec<Dependency>,
    build: F,
    clean: Option<CleanFn>,
    _phantom: PhantomData<fn() -> R>,
}

impl<F, R> TypedNode for TaskNode<F, R>
where
    F: Fn(&mut Runtime) -> anyhow::Result<R> + Send + Sync + 'static,
    R: Send + Sync + 'static,
{
    type Output = R;

    fn name(&self) -> String {
        self.name.to_string()
    }

    fn dependencies(&self) -> Vec<Dependency> {
        self.dependencies.clone()
    }

    fn build(&self, rt: &mut Runtime) -> anyhow::Result<R> {
        (self.build)(rt)
    }

    fn clean(&self, rt: &mut Runtime) -> anyhow::Result<()> {
        match &self.clean {
            Some(clean) => clean(rt),
            None => Ok(()),
        }
    }

    fn describe(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        match &self.description {
            Some(text) => write!(out, "{text}"),
            None => write!(out, "{}", self.name),
        }
    }
}

/// Group several nodes under one target with no action of its own.
///
/// Useful as the root of a command run, and as the combined form of the
/// conditional branches.
pub fn all(
    name: impl Into<Cow<'static, str>>,
    nodes: impl IntoIterator<Item = NodeRef>,
) -> NodeRef {
    Arc::new(AllNode {
        name: name.into(),
        dependencies: nodes.into_iter().map(Dependency::new).collect(),
    })
}

struct AllNode {
    name: Cow<'static, str>,
    dependencies: Vec<Dependency>,
}

impl TypedNode for AllNode {
    type Output = ();

    fn name(&self) -> String {
        self.name.to_string()
    }

    fn dependencies(&self) -> Vec<Dependency> {
        self.dependencies.clone()
    }

    fn build(&self, _: &mut Runtime) -> anyhow::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use crate::invoker::Invoker;
    use crate::runtime::Environment;

    #[test]
    fn test_all_groups_targets() {
        let left = task("left").run(|_| Ok(1));
        let right = task("right").run(|_| Ok(2));

        let group = all("group", [left.node().clone(), right.node().clone()]);

        let env = Environment::default();
        let mut invoker = Invoker::new(&env);
        invoker.invoke(Command::Build, &group).unwrap();

        assert_eq!(*invoker.value(&left).unwrap(), 1);
        assert_eq!(*invoker.value(&right).unwrap(), 2);
    }

    #[test]
    fn test_describe_label_override() {
        let labeled = task("internal name")
            .describe("deploy the website")
            .run(|_| Ok(()));

        let env = Environment::default();
        let invoker = Invoker::new(&env);

        let mut out = String::new();
        invoker.describe(labeled.node(), &mut out).unwrap();

        assert_eq!(out, "deploy the website\n");
    }
}
