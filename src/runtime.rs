//! The ambient services and the per-run execution context handed to tasks.
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::process;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::command::Command;
use crate::error::{InvokeError, ParameterError, ShellError, ValueError};
use crate::future::Future;
use crate::invoker::{Invoker, Pass};
use crate::node::{NodeId, NodeRef};

/// Key-value inputs for leaf futures, taken from the process environment, a
/// JSON file, or set explicitly.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(transparent)]
pub struct Parameters {
    values: HashMap<String, String>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture the current process environment.
    pub fn from_env() -> Self {
        Self {
            values: std::env::vars().collect(),
        }
    }

    /// Load parameters from a JSON object of strings.
    pub fn from_json(path: impl AsRef<Utf8Path>) -> Result<Self, ParameterError> {
        let text = fs::read_to_string(path.as_ref())?;
        let params = serde_json::from_str(&text)?;
        Ok(params)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Merge `other` over this set; colliding keys take the new value.
    pub fn merge(&mut self, other: Parameters) {
        self.values.extend(other.values);
    }
}

/// Narrow shell interface for concrete task bodies.
///
/// Runs a single program with arguments, captures its output and reports
/// non-zero exits as errors. There is no shell interpolation.
#[derive(Debug, Clone, Default)]
pub struct Shell {
    cwd: Option<Utf8PathBuf>,
}

impl Shell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every command from `dir` instead of the process working directory.
    pub fn in_dir(dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            cwd: Some(dir.into()),
        }
    }

    /// Run `program` with `args`, returning captured stdout.
    pub fn run(&self, program: &str, args: &[&str]) -> Result<String, ShellError> {
        let pretty = if args.is_empty() {
            program.to_string()
        } else {
            format!("{} {}", program, args.join(" "))
        };

        tracing::debug!(command = %pretty, "shell");

        let mut command = process::Command::new(program);
        command.args(args);

        if let Some(dir) = &self.cwd {
            command.current_dir(dir);
        }

        let output = command.output().map_err(|source| ShellError::Spawn {
            command: pretty.clone(),
            source,
        })?;

        if !output.status.success() {
            return Err(ShellError::Exit {
                command: pretty,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Ambient services available to every task body: configuration parameters
/// and a shell. One environment typically lives for the whole program and is
/// shared by all command runs.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    params: Parameters,
    shell: Shell,
}

impl Environment {
    pub fn new(params: Parameters) -> Self {
        Self {
            params,
            shell: Shell::default(),
        }
    }

    pub fn with_shell(mut self, shell: Shell) -> Self {
        self.shell = shell;
        self
    }

    /// Parameters given to this process.
    pub fn params(&self) -> &Parameters {
        &self.params
    }

    /// Shell command execution for task bodies.
    pub fn shell(&self) -> &Shell {
        &self.shell
    }
}

/// The execution context handed to every build and clean action.
///
/// It gives actions access to the [`Environment`], memoized value reads, and
/// a re-entrant [`invoke`](Runtime::invoke) used by nodes that discover
/// sub-nodes at run time.
pub struct Runtime<'a, 'e> {
    pub(crate) invoker: &'a mut Invoker<'e>,
    pub(crate) pass: &'a mut Pass,
    pub(crate) command: Command,
    pub(crate) current: NodeId,
}

impl<'a, 'e> Runtime<'a, 'e> {
    /// The ambient environment.
    pub fn env(&self) -> &Environment {
        self.invoker.env()
    }

    /// The command this run was started with.
    pub fn command(&self) -> Command {
        self.command
    }

    /// Read the memoized value of `future`.
    pub fn value<T>(&self, future: &Future<T>) -> Result<Arc<T>, ValueError>
    where
        T: Send + Sync + 'static,
    {
        self.invoker.value(future)
    }

    /// Drive `node` under the current command and run state.
    ///
    /// Dynamically discovered sub-nodes must be routed through here before
    /// the discovering node's own value is considered resolved; they share
    /// the run's memo, value cache and clean-after-build registry, so a node
    /// reached both statically and dynamically still acts at most once.
    pub fn invoke(&mut self, node: &NodeRef) -> Result<(), InvokeError> {
        self.invoker.record_expansion(self.current, node);
        self.invoker.walk(self.command, node, self.pass)
    }
}

/// Scoped sink for describe mode output.
///
/// Each node's label lands on its own line, indented by how deep the node
/// sits below the described root.
pub struct Describer<'a> {
    out: &'a mut String,
    depth: usize,
}

impl<'a> Describer<'a> {
    pub fn new(out: &'a mut String) -> Self {
        Self { out, depth: 0 }
    }

    pub(crate) fn enter(&mut self) {
        self.depth += 1;
    }

    pub(crate) fn leave(&mut self) {
        self.depth -= 1;
    }

    pub(crate) fn line(&mut self, node: &NodeRef) -> fmt::Result {
        for _ in 0..self.depth {
            self.out.push_str("  ");
        }

        node.describe(self.out)?;
        self.out.push('\n');

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameters_merge() {
        let mut base = Parameters::new();
        base.set("a", "1");
        base.set("b", "2");

        let mut over = Parameters::new();
        over.set("b", "3");
        over.set("c", "4");

        base.merge(over);

        assert_eq!(base.get("a"), Some("1"));
        assert_eq!(base.get("b"), Some("3"));
        assert_eq!(base.get("c"), Some("4"));
        assert_eq!(base.get("d"), None);
    }

    #[test]
    fn test_parameters_from_json() {
        let path = std::env::temp_dir().join("dandori-params-test.json");
        fs::write(&path, r#"{"HOST": "localhost", "PORT": "8080"}"#).unwrap();

        let params = Parameters::from_json(Utf8Path::from_path(&path).unwrap()).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(params.get("HOST"), Some("localhost"));
        assert_eq!(params.get("PORT"), Some("8080"));
    }

    #[test]
    fn test_shell_missing_program() {
        let shell = Shell::new();
        let err = shell.run("dandori-no-such-program", &[]).unwrap_err();
        assert!(matches!(err, ShellError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_shell_captures_stdout() {
        let shell = Shell::new();
        let out = shell.run("echo", &["hello"]).unwrap();
        assert_eq!(out.trim(), "hello");
    }
}
