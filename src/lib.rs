#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

mod command;
mod dynamic;
mod error;
mod future;
mod input;
mod invoker;
mod node;
mod runtime;
mod task;
#[cfg(feature = "logging")]
mod utils;

pub use crate::command::Command;
pub use crate::error::{InputError, InvokeError, ParameterError, ShellError, ValueError};
pub use crate::future::Future;
pub use crate::input::Input;
pub use crate::invoker::Invoker;
pub use crate::node::{Dependency, Node, NodeId, NodeRef, TypedNode};
pub use crate::runtime::{Describer, Environment, Parameters, Runtime, Shell};
pub use crate::task::{TaskDef, all, task};
#[cfg(feature = "logging")]
pub use crate::utils::init_logging;
