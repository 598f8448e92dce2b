//! Error taxonomy for shell commands.
//!
//! Every variant is recoverable at the shell level: the command is abandoned,
//! the message is printed, and the loop reads the next line.

use thiserror::Error;

/// Failure talking to the management API.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("{reason}, {status}")]
    Status { status: u16, reason: String },
    #[error("cannot reach the management API: {0}")]
    Transport(String),
    #[error("unexpected response from the management API: {0}")]
    Decode(String),
}

/// Coarse classification of a [`CommandError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unknown option, missing value, value outside its domain.
    Grammar,
    /// A cross-field rule was violated; nothing was sent.
    Invariant,
    /// A database name or uid did not resolve.
    Reference,
    /// The management API rejected or failed the request.
    Remote,
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("unknown option `{token}` for {verb}")]
    UnknownFlag { verb: &'static str, token: String },

    #[error("option `{flag}` given more than once")]
    DuplicateFlag { flag: &'static str },

    #[error("option `{flag}` needs {capability}, which this cluster does not support")]
    UnsupportedFlag {
        flag: &'static str,
        capability: &'static str,
    },

    #[error("missing parameter for `{flag}`")]
    MissingValue { flag: String },

    #[error("missing {what} for {verb}")]
    MissingArgument {
        verb: &'static str,
        what: &'static str,
    },

    #[error("illegal parameter `{value}` for `{flag}`: expected {expected}")]
    InvalidValue {
        flag: &'static str,
        value: String,
        expected: String,
    },

    #[error(
        "malformed retention `{value}` for `{flag}`: expected disabled, aof[-every-sec|-always] or snapshot[-every-<1|6|12>-hours]"
    )]
    MalformedRetention { flag: &'static str, value: String },

    #[error("invalid entity `{0}`: expected db or shards")]
    UnknownEntityKind(String),

    #[error("unexpected argument `{token}` for {verb}")]
    UnexpectedArgument { verb: &'static str, token: String },

    #[error("`{0}` does not build a request body (only create and change do)")]
    NotAMutation(String),

    #[error("ram size ({ram} bytes) exceeds the memory size ({memory} bytes)")]
    CapacityExceeded { ram: u64, memory: u64 },

    #[error("ram needs memory to be set in the same create command")]
    RamWithoutBudget,

    #[error("rack awareness requires replication to be enabled")]
    RackRequiresReplication,

    #[error("a database with this name already exists: {0}")]
    NameTaken(String),

    #[error("database is already a replica of {0}")]
    AlreadyReplicaOf(String),

    #[error("a database cannot be a replica of itself")]
    SelfReplica,

    #[error("database {0} has no endpoint to replicate from")]
    NoReplicaEndpoint(u64),

    #[error("database does not exist: {0}")]
    UnknownEntity(String),

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl CommandError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CommandError::UnknownFlag { .. }
            | CommandError::DuplicateFlag { .. }
            | CommandError::UnsupportedFlag { .. }
            | CommandError::MissingValue { .. }
            | CommandError::MissingArgument { .. }
            | CommandError::InvalidValue { .. }
            | CommandError::MalformedRetention { .. }
            | CommandError::UnknownEntityKind(_)
            | CommandError::UnexpectedArgument { .. }
            | CommandError::NotAMutation(_) => ErrorKind::Grammar,
            CommandError::CapacityExceeded { .. }
            | CommandError::RamWithoutBudget
            | CommandError::RackRequiresReplication
            | CommandError::NameTaken(_)
            | CommandError::AlreadyReplicaOf(_)
            | CommandError::SelfReplica
            | CommandError::NoReplicaEndpoint(_) => ErrorKind::Invariant,
            CommandError::UnknownEntity(_) => ErrorKind::Reference,
            CommandError::Remote(_) => ErrorKind::Remote,
        }
    }
}
