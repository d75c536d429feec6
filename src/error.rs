use thiserror::Error;

#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("Dependency cycle: {0}")]
    Cycle(String),

    #[error("Task '{task}':\n{source}")]
    Action {
        task: String,
        #[source]
        source: anyhow::Error,
    },
}

#[derive(Debug, Error)]
pub enum ValueError {
    #[error("Value of '{0}' has not been resolved in this run")]
    Unresolved(String),

    #[error("Value of '{0}' is not a {1}")]
    TypeMismatch(String, &'static str),
}

#[derive(Debug, Error)]
pub enum InputError {
    #[error("Input '{0}' is required but was not given")]
    Missing(String),

    #[error("Input '{name}' is not a valid {ty}: {value:?}")]
    Parse {
        name: String,
        ty: &'static str,
        value: String,
    },
}

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("Couldn't start '{command}'.\n{source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command '{command}' exited with {status}.\n{stderr}")]
    Exit {
        command: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

#[derive(Debug, Error)]
pub enum ParameterError {
    #[error("Couldn't read parameter file.\n{0}")]
    FileSystem(#[from] std::io::Error),

    #[error("Couldn't parse parameter file.\n{0}")]
    Format(#[from] serde_json::Error),
}
