//! dbadmin command engine
//!
//! This crate holds everything the `dbadmin` shell needs that is not I/O:
//! - a static command grammar with a single transition table (`grammar`),
//! - a quote-aware tokenizer and a cursor-context resolver (`tokenize`, `context`),
//! - a payload builder that turns a token line into a request body (`payload`),
//! - a completion engine that predicts exactly what the builder accepts next (`completion`),
//! - a cached database registry (`registry`),
//! - an executor that dispatches commands to a [`ControlPlane`] (`executor`).
//!
//! The HTTP transport lives in `dbadmin-rest`; rendering and the REPL live in
//! `dbadmin-cli`.

pub mod api;
pub mod completion;
pub mod context;
pub mod error;
pub mod executor;
pub mod grammar;
pub mod model;
pub mod payload;
pub mod registry;
pub mod tokenize;

#[cfg(test)]
pub(crate) mod fixtures;

pub use api::ControlPlane;
pub use completion::{Completion, CompletionEngine};
pub use context::CursorContext;
pub use error::{CommandError, ErrorKind, RemoteError};
pub use executor::{CommandExecutor, Outcome};
pub use grammar::{CommandGrammar, Verb};
pub use model::{ClusterInfo, Database, Shard};
pub use payload::{MutationRequest, PayloadBuilder, RequestBody, Target};
pub use registry::{EntityRegistry, RegistrySnapshot};
