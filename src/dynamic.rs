//! Nodes whose dependents are discovered only at run time.
//!
//! A generator depends on an upstream future; once that value resolves, it
//! constructs fresh sub-nodes and drives them through the run's re-entrant
//! [`Runtime::invoke`] before exposing its own value. The sub-nodes take part
//! in memoization and clean-after-build accounting as if their edges were
//! static.
use std::marker::PhantomData;
use std::sync::Arc;

use crate::future::Future;
use crate::node::{Dependency, NodeRef, TypedNode};
use crate::runtime::Runtime;
use crate::task::all;

impl<I> Future<Vec<I>>
where
    I: Send + Sync + 'static,
{
    /// Map every element of the resolved sequence to its own sub-future.
    ///
    /// The sub-nodes are constructed only once the upstream value is known,
    /// and each is invoked under the current command before this future's
    /// aggregate value resolves, so a sibling or parent may read it
    /// immediately.
    pub fn for_each<O, F>(&self, f: F) -> Future<Vec<O>>
    where
        O: Clone + Send + Sync + 'static,
        F: Fn(&I) -> Future<O> + Send + Sync + 'static,
    {
        Future::from_node(ForEach {
            upstream: self.clone(),
            spawn: move |item: &I| vec![f(item)],
            _phantom: PhantomData,
        })
    }

    /// Map every element to zero or more sub-futures, flattened.
    pub fn for_each_many<O, F>(&self, f: F) -> Future<Vec<O>>
    where
        O: Clone + Send + Sync + 'static,
        F: Fn(&I) -> Vec<Future<O>> + Send + Sync + 'static,
    {
        Future::from_node(ForEach {
            upstream: self.clone(),
            spawn: f,
            _phantom: PhantomData,
        })
    }
}

impl Future<bool> {
    /// Invoke the node produced by `branch` only when this resolves true.
    ///
    /// The branch is constructed lazily; when the condition does not hold it
    /// is never built at all, so it can have no observable side effects.
    pub fn when_true<F>(&self, branch: F) -> NodeRef
    where
        F: Fn() -> NodeRef + Send + Sync + 'static,
    {
        Arc::new(Conditional {
            condition: self.clone(),
            branch,
            invert: false,
        })
    }

    /// Invoke the node produced by `branch` only when this resolves false.
    pub fn when_false<F>(&self, branch: F) -> NodeRef
    where
        F: Fn() -> NodeRef + Send + Sync + 'static,
    {
        Arc::new(Conditional {
            condition: self.clone(),
            branch,
            invert: true,
        })
    }

    /// Invoke exactly one of the two branches, never both.
    pub fn branch<T, F>(&self, when_true: T, when_false: F) -> NodeRef
    where
        T: Fn() -> NodeRef + Send + Sync + 'static,
        F: Fn() -> NodeRef + Send + Sync + 'static,
    {
        all(
            format!("branch on {}", self.node().name()),
            [self.when_true(when_true), self.when_false(when_false)],
        )
    }
}

struct ForEach<I, O, F> {
    upstream: Future<Vec<I>>,
    spawn: F,
    _phantom: PhantomData<fn() -> O>,
}

impl<I, O, F> TypedNode for ForEach<I, O, F>
where
    I: Send + Sync + 'static,
    O: Clone + Send + Sync + 'static,
    F: Fn(&I) -> Vec<Future<O>> + Send + Sync + 'static,
{
    type Output = Vec<O>;

    fn name(&self) -> String {
        format!("for each of {}", self.upstream.node().name())
    }

    fn dependencies(&self) -> Vec<Dependency> {
        vec![Dependency::from(&self.upstream)]
    }

    fn build(&self, rt: &mut Runtime) -> anyhow::Result<Vec<O>> {
        let items = self.upstream.value(rt)?;

        let mut spawned = Vec::new();
        for item in items.iter() {
            spawned.extend((self.spawn)(item));
        }

        let mut values = Vec::with_capacity(spawned.len());
        for sub in &spawned {
            rt.invoke(sub.node())?;
            values.push((*sub.value(rt)?).clone());
        }

        Ok(values)
    }
}

struct Conditional<F> {
    condition: Future<bool>,
    branch: F,
    invert: bool,
}

impl<F> TypedNode for Conditional<F>
where
    F: Fn() -> NodeRef + Send + Sync + 'static,
{
    type Output = ();

    fn name(&self) -> String {
        let polarity = if self.invert { "false" } else { "true" };
        format!("when {} is {}", self.condition.node().name(), polarity)
    }

    fn dependencies(&self) -> Vec<Dependency> {
        vec![Dependency::from(&self.condition)]
    }

    fn build(&self, rt: &mut Runtime) -> anyhow::Result<()> {
        let condition = *self.condition.value(rt)?;

        if condition != self.invert {
            let node = (self.branch)();
            rt.invoke(&node)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::command::Command;
    use crate::invoker::Invoker;
    use crate::runtime::Environment;
    use crate::task::task;

    type Log = Arc<Mutex<Vec<String>>>;

    fn spy(name: &'static str, log: &Log) -> NodeRef {
        let log = log.clone();
        task(name)
            .run(move |_| {
                log.lock().unwrap().push(format!("build {name}"));
                Ok(())
            })
            .node()
            .clone()
    }

    #[test]
    fn test_for_each_maps_elements() {
        let names = task("names").run(|_| Ok(vec!["a".to_string(), "b".to_string()]));
        let lengths = names.for_each(|name: &String| {
            let name = name.clone();
            task(format!("length of {name}")).run(move |_| Ok(name.len()))
        });

        let env = Environment::default();
        let mut invoker = Invoker::new(&env);
        invoker.invoke(Command::Build, lengths.node()).unwrap();

        assert_eq!(*invoker.value(&lengths).unwrap(), vec![1, 1]);
    }

    #[test]
    fn test_for_each_many_flattens() {
        let seeds = task("seeds").run(|_| Ok(vec![1, 2]));
        let expanded = seeds.for_each_many(|seed: &i32| {
            let seed = *seed;
            (0..seed)
                .map(|i| task(format!("{seed}/{i}")).run(move |_| Ok(seed * 10 + i)))
                .collect()
        });

        let env = Environment::default();
        let mut invoker = Invoker::new(&env);
        invoker.invoke(Command::Build, expanded.node()).unwrap();

        assert_eq!(*invoker.value(&expanded).unwrap(), vec![10, 20, 21]);
    }

    #[test]
    fn test_when_true_invokes_branch() {
        let log = Log::default();
        let cond = task("cond").run(|_| Ok(true));

        let branch = {
            let log = log.clone();
            cond.when_true(move || spy("branch", &log))
        };

        let env = Environment::default();
        let mut invoker = Invoker::new(&env);
        invoker.invoke(Command::Build, &branch).unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["build branch"]);
    }

    #[test]
    fn test_false_condition_never_touches_branch() {
        let log = Log::default();
        let constructed = Arc::new(AtomicBool::new(false));

        let cond = task("cond").run(|_| Ok(false));
        let branch = {
            let log = log.clone();
            let constructed = constructed.clone();
            cond.when_true(move || {
                constructed.store(true, Ordering::SeqCst);
                spy("excluded", &log)
            })
        };

        let env = Environment::default();
        let mut invoker = Invoker::new(&env);
        invoker.invoke(Command::Build, &branch).unwrap();

        assert!(!constructed.load(Ordering::SeqCst));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_branch_invokes_exactly_one() {
        let log = Log::default();
        let cond = task("cond").run(|_| Ok(false));

        let either = {
            let log_t = log.clone();
            let log_f = log.clone();
            cond.branch(
                move || spy("on true", &log_t),
                move || spy("on false", &log_f),
            )
        };

        let env = Environment::default();
        let mut invoker = Invoker::new(&env);
        invoker.invoke(Command::Build, &either).unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["build on false"]);
    }

    #[test]
    fn test_spawned_nodes_join_cleanup_accounting() {
        let cleaned = Log::default();

        let names = task("names").run(|_| Ok(vec!["x".to_string(), "y".to_string()]));
        let staged = {
            let cleaned = cleaned.clone();
            names.for_each(move |name: &String| {
                let cleaned = cleaned.clone();
                let label = name.clone();
                let value = name.clone();
                task(format!("stage {name}"))
                    .clean(move |_| {
                        cleaned.lock().unwrap().push(label.clone());
                        Ok(())
                    })
                    .run(move |_| Ok(value.clone()))
            })
        };
        let root = task("root").depends_on_transient(&staged).run(|_| Ok(()));

        let env = Environment::default();
        let mut invoker = Invoker::new(&env);
        invoker.invoke(Command::BuildAndClean, root.node()).unwrap();
        invoker.clean_after_build(Command::BuildAndClean).unwrap();

        let mut cleaned = cleaned.lock().unwrap().clone();
        cleaned.sort();
        assert_eq!(cleaned, vec!["x", "y"]);
    }
}
