use std::path::PathBuf;

/// A command definition that cannot be executed as written.
///
/// Raised while deserializing a [`CommandSpec`](crate::spec::CommandSpec)
/// so malformed definitions fail at load time, and while rendering a
/// command line whose items do not split into shell words.
#[derive(Debug, thiserror::Error)]
pub enum SpecError {
    #[error("command name must not be empty")]
    EmptyName,

    #[error("command '{0}' has an empty command line")]
    EmptyCommand(String),

    #[error("{field} '{path}' must be a relative path inside the job directory")]
    UnsafePath { field: &'static str, path: String },

    #[error("invalid glob pattern '{pattern}': {reason}")]
    InvalidGlob { pattern: String, reason: String },

    #[error("return entry '{0}' is declared more than once")]
    DuplicateReturn(String),

    #[error("return entry name 'job_id' is reserved")]
    ReservedReturnName,

    #[error("return entry '{name}' of type '{kind}' requires '{field}'")]
    MissingReturnField {
        name: String,
        kind: &'static str,
        field: &'static str,
    },

    #[error("unbalanced quoting in command item: {0}")]
    UnbalancedQuoting(String),

    #[error("command line contains a NUL byte")]
    NulByte,
}

/// Failure while loading the command registry from disk.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("command '{0}' is defined more than once")]
    DuplicateCommand(String),
}

/// Failure of a single command run.
///
/// A non-zero exit status of the subprocess is not an error; it is reported
/// through the execution log record and whatever outputs the spec returns.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("Command {0} not found.")]
    CommandNotFound(String),

    #[error("Missing required param: {0}")]
    MissingParam(String),

    #[error("Invalid command: {0}")]
    InvalidCommand(#[from] SpecError),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to spawn command: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Command timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },
}

impl RunError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Stable machine-readable code for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::CommandNotFound(_) => "COMMAND_NOT_FOUND",
            Self::MissingParam(_) => "MISSING_PARAM",
            Self::InvalidCommand(_) => "INVALID_COMMAND",
            Self::Io { .. } => "IO_ERROR",
            Self::Spawn(_) => "SPAWN_ERROR",
            Self::Timeout { .. } => "TIMEOUT",
        }
    }

    /// Whether the caller (rather than the server) is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::CommandNotFound(_) | Self::MissingParam(_) | Self::InvalidCommand(_)
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
