use std::fmt;

/// Selects what a top-level invocation does and in which direction the graph
/// is walked.
///
/// Tokens carry no payload and are compared by identity. The token used for a
/// build must be handed unchanged to
/// [`Invoker::clean_after_build`](crate::Invoker::clean_after_build) for the
/// pass that follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Build every dependency before its dependents.
    Build,
    /// Clean every dependent before its dependencies.
    Clean,
    /// Build, then tear down dependencies marked clean-after-build.
    BuildAndClean,
}

/// The order in which a node and its dependencies are visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    /// Post-order: dependencies first, then the node's own action.
    DependenciesFirst,
    /// Pre-order: the node's own action first, then its dependencies.
    DependentsFirst,
}

impl Command {
    pub(crate) fn direction(self) -> Direction {
        match self {
            Command::Build | Command::BuildAndClean => Direction::DependenciesFirst,
            Command::Clean => Direction::DependentsFirst,
        }
    }

    /// Whether this command runs build actions and resolves values.
    pub(crate) fn builds(self) -> bool {
        matches!(self, Command::Build | Command::BuildAndClean)
    }

    /// Whether this command runs clean actions during the main walk.
    pub(crate) fn cleans(self) -> bool {
        matches!(self, Command::Clean)
    }

    /// Whether a clean-after-build pass follows the main walk.
    pub(crate) fn has_cleanup_phase(self) -> bool {
        matches!(self, Command::BuildAndClean)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Build => write!(f, "build"),
            Command::Clean => write!(f, "clean"),
            Command::BuildAndClean => write!(f, "build-and-clean"),
        }
    }
}
