use std::str::FromStr;

use crate::error::InputError;
use crate::future::Future;
use crate::node::{Dependency, TypedNode};
use crate::runtime::Runtime;

/// A leaf future resolved from the process-level
/// [`Parameters`](crate::Parameters) table.
///
/// Inputs carry no action beyond the lookup and no clean action; there is no
/// artifact to remove.
pub struct Input<T> {
    name: String,
    default: Option<T>,
}

impl<T> Input<T>
where
    T: FromStr + Clone + Send + Sync + 'static,
{
    /// A required input: missing is an error at build time.
    pub fn required(name: impl Into<String>) -> Future<T> {
        Future::from_node(Input {
            name: name.into(),
            default: None,
        })
    }

    /// An input falling back to `default` when not given.
    pub fn with_default(name: impl Into<String>, default: T) -> Future<T> {
        Future::from_node(Input {
            name: name.into(),
            default: Some(default),
        })
    }
}

impl<T> TypedNode for Input<T>
where
    T: FromStr + Clone + Send + Sync + 'static,
{
    type Output = T;

    fn name(&self) -> String {
        self.name.clone()
    }

    fn dependencies(&self) -> Vec<Dependency> {
        Vec::new()
    }

    fn build(&self, rt: &mut Runtime) -> anyhow::Result<T> {
        match rt.env().params().get(&self.name) {
            Some(raw) => raw.parse::<T>().map_err(|_| {
                InputError::Parse {
                    name: self.name.clone(),
                    ty: std::any::type_name::<T>(),
                    value: raw.to_string(),
                }
                .into()
            }),
            None => match &self.default {
                Some(default) => Ok(default.clone()),
                None => Err(InputError::Missing(self.name.clone()).into()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use crate::error::InvokeError;
    use crate::invoker::Invoker;
    use crate::runtime::{Environment, Parameters};

    #[test]
    fn test_given_value_overrides_default() {
        let mut params = Parameters::new();
        params.set("PORT", "8080");
        let env = Environment::new(params);

        let port = Input::<u16>::with_default("PORT", 80);

        let mut invoker = Invoker::new(&env);
        invoker.invoke(Command::Build, port.node()).unwrap();

        assert_eq!(*invoker.value(&port).unwrap(), 8080);
    }

    #[test]
    fn test_default_applies_when_missing() {
        let env = Environment::default();

        let port = Input::<u16>::with_default("PORT", 80);

        let mut invoker = Invoker::new(&env);
        invoker.invoke(Command::Build, port.node()).unwrap();

        assert_eq!(*invoker.value(&port).unwrap(), 80);
    }

    #[test]
    fn test_missing_required_input() {
        let env = Environment::default();

        let host = Input::<String>::required("HOST");

        let mut invoker = Invoker::new(&env);
        let err = invoker.invoke(Command::Build, host.node()).unwrap_err();

        match err {
            InvokeError::Action { task, source } => {
                assert_eq!(task, "HOST");
                assert!(source.downcast_ref::<InputError>().is_some());
            }
            other => panic!("expected action failure, got {other}"),
        }
    }

    #[test]
    fn test_parse_failure_names_input() {
        let mut params = Parameters::new();
        params.set("PORT", "not-a-number");
        let env = Environment::new(params);

        let port = Input::<u16>::required("PORT");

        let mut invoker = Invoker::new(&env);
        let err = invoker.invoke(Command::Build, port.node()).unwrap_err();

        assert!(err.to_string().contains("PORT"));
        assert!(err.to_string().contains("not-a-number"));
    }
}
