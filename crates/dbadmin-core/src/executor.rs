//! Dispatch parsed commands to the management API.

use crate::api::ControlPlane;
use crate::error::CommandError;
use crate::grammar::{CommandGrammar, EntityKind, Step, Verb, Walk};
use crate::model::{Database, Shard};
use crate::payload::{PayloadBuilder, Target};
use crate::registry::{EntityRegistry, RegistrySnapshot};
use crate::tokenize::split_command_line;
use tracing::{debug, info, warn};

/// Result of one shell command, ready for rendering.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Blank line.
    Nothing,
    Help,
    Exit,
    Overview {
        databases: Vec<Database>,
        shards: Vec<Shard>,
    },
    Databases(Vec<Database>),
    Database(Database),
    Shards(Vec<Shard>),
    Created(Database),
    Changed { uid: u64 },
    Deleted { uid: u64 },
}

pub struct CommandExecutor<A> {
    api: A,
    registry: EntityRegistry,
    grammar: CommandGrammar,
}

impl<A: ControlPlane> CommandExecutor<A> {
    pub fn new(api: A, registry: EntityRegistry) -> Self {
        Self {
            api,
            registry,
            grammar: CommandGrammar::default(),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn execute_line(&self, line: &str) -> Result<Outcome, CommandError> {
        self.execute(&split_command_line(line))
    }

    pub fn execute<S: AsRef<str>>(&self, tokens: &[S]) -> Result<Outcome, CommandError> {
        let Some(first) = tokens.first() else {
            return Ok(Outcome::Nothing);
        };
        match Verb::parse(first.as_ref()) {
            None => {
                debug!(verb = first.as_ref(), "unknown command");
                Ok(Outcome::Help)
            }
            Some(Verb::Help) => Ok(Outcome::Help),
            Some(Verb::Quit) => Ok(Outcome::Exit),
            Some(Verb::List) => self.list(tokens),
            Some(Verb::Create | Verb::Change) => self.mutate(tokens),
            Some(Verb::Delete) => self.delete(tokens),
        }
    }

    fn walk<S: AsRef<str>>(
        &self,
        tokens: &[S],
        snapshot: &RegistrySnapshot,
    ) -> Result<Vec<Step>, CommandError> {
        Walk::new().replay(&self.grammar, snapshot, tokens)
    }

    fn list<S: AsRef<str>>(&self, tokens: &[S]) -> Result<Outcome, CommandError> {
        let snapshot = self.registry.snapshot();
        let steps = self.walk(tokens, &snapshot)?;
        let kind = steps.iter().find_map(|step| match step {
            Step::Kind(kind) => Some(*kind),
            _ => None,
        });
        let target = target_of(&steps);

        Ok(match (kind, target) {
            (None, _) => Outcome::Overview {
                databases: self.api.list_databases()?,
                shards: self.api.list_shards(None)?,
            },
            (Some(EntityKind::Database), None) => Outcome::Databases(self.api.list_databases()?),
            (Some(EntityKind::Database), Some(uid)) => {
                Outcome::Database(self.api.get_database(uid)?)
            }
            (Some(EntityKind::Shard), target) => Outcome::Shards(self.api.list_shards(target)?),
        })
    }

    fn mutate<S: AsRef<str>>(&self, tokens: &[S]) -> Result<Outcome, CommandError> {
        PayloadBuilder::new(&self.grammar, &self.registry.snapshot(), &self.api)
            .precheck(tokens)?;
        self.registry.refresh(&self.api)?;
        let snapshot = self.registry.snapshot();
        let request = PayloadBuilder::new(&self.grammar, &snapshot, &self.api).build(tokens)?;

        let outcome = match &request.target {
            Target::New { name } => {
                info!(name = %name, raw = request.body.is_raw(), "creating database");
                Outcome::Created(self.api.create_database(&request.body)?)
            }
            Target::Existing { uid } => {
                info!(uid, raw = request.body.is_raw(), "updating database");
                self.api.update_database(*uid, &request.body)?;
                Outcome::Changed { uid: *uid }
            }
        };
        self.refresh_after();
        Ok(outcome)
    }

    fn delete<S: AsRef<str>>(&self, tokens: &[S]) -> Result<Outcome, CommandError> {
        Walk::deferring_references().replay(&self.grammar, &self.registry.snapshot(), tokens)?;
        self.registry.refresh(&self.api)?;
        let snapshot = self.registry.snapshot();
        let steps = self.walk(tokens, &snapshot)?;
        let uid = target_of(&steps).ok_or(CommandError::MissingArgument {
            verb: "delete",
            what: "a database uid or name",
        })?;

        info!(uid, "deleting database");
        self.api.delete_database(uid)?;
        self.refresh_after();
        Ok(Outcome::Deleted { uid })
    }

    /// The command already succeeded remotely; a stale registry is only
    /// worth a warning.
    fn refresh_after(&self) {
        if let Err(err) = self.registry.refresh(&self.api) {
            warn!(%err, "registry refresh after command failed");
        }
    }
}

fn target_of(steps: &[Step]) -> Option<u64> {
    steps.iter().find_map(|step| match step {
        Step::Target(uid) => Some(*uid),
        _ => None,
    })
}
