//! Turn a `create` / `change` token line into a request body.
//!
//! Tokens are replayed through the grammar's transition table; accepted
//! values land in an accumulator where every field is an `Option` (unset means
//! "leave unchanged" on change and "service default" on create). Cross-field
//! rules run once, after the last token, so argument order never matters.
//! The body is then serialized with `serde`, skipping every unset field.

use crate::api::ControlPlane;
use crate::error::CommandError;
use crate::grammar::{
    AofPolicy, CommandGrammar, Flag, ReplicaAction, Retention, SourceRef, Step, Value, Verb,
    Walk, GIGABYTE,
};
use crate::model::{Database, SyncSource};
use crate::registry::RegistrySnapshot;
use serde::Serialize;
use tracing::{debug, warn};

/// Which database a request is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    New { name: String },
    Existing { uid: u64 },
}

/// The body sent to the management API.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Only the fields the command touched.
    Fields(serde_json::Map<String, serde_json::Value>),
    /// Operator-supplied text, passed through untouched.
    Raw(String),
}

impl RequestBody {
    pub fn to_json_string(&self) -> String {
        match self {
            RequestBody::Fields(fields) => {
                serde_json::Value::Object(fields.clone()).to_string()
            }
            RequestBody::Raw(text) => text.clone(),
        }
    }

    pub fn fields(&self) -> Option<&serde_json::Map<String, serde_json::Value>> {
        match self {
            RequestBody::Fields(fields) => Some(fields),
            RequestBody::Raw(_) => None,
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, RequestBody::Raw(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MutationRequest {
    pub target: Target,
    pub body: RequestBody,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct ShardKeyRegex {
    regex: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct SnapshotPolicy {
    secs: u64,
    writes: u64,
}

/// Hash-tag aware key placement, then everything else.
fn default_shard_key_regex() -> Vec<ShardKeyRegex> {
    vec![
        ShardKeyRegex {
            regex: r".*\{(?<tag>.*)\}.*",
        },
        ShardKeyRegex {
            regex: "(?<tag>.*)",
        },
    ]
}

#[derive(Debug, Default, Serialize)]
struct DatabaseSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    memory_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bigstore: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bigstore_ram_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    shards_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    shard_key_regex: Option<Vec<ShardKeyRegex>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    replication: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rack_aware: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    eviction_policy: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data_persistence: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    aof_policy: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    snapshot_policy: Option<Vec<SnapshotPolicy>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sync: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sync_sources: Option<Vec<SyncSource>>,
}

impl DatabaseSpec {
    fn apply_retention(&mut self, retention: Retention) {
        match retention {
            Retention::Disabled => self.data_persistence = Some("disabled"),
            Retention::Aof(policy) => {
                self.data_persistence = Some("aof");
                self.aof_policy = Some(match policy {
                    AofPolicy::EverySecond => "appendfsync-every-sec",
                    AofPolicy::Always => "appendfsync-always",
                });
            }
            Retention::Snapshot { hours } => {
                self.data_persistence = Some("snapshot");
                self.snapshot_policy = Some(vec![SnapshotPolicy {
                    secs: u64::from(hours) * 3600,
                    writes: 1,
                }]);
            }
        }
    }

    fn into_fields(self) -> serde_json::Map<String, serde_json::Value> {
        match serde_json::to_value(&self) {
            Ok(serde_json::Value::Object(fields)) => fields,
            other => {
                warn!(?other, "request body did not serialize to an object");
                serde_json::Map::new()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ReplicaRequest {
    Add(SourceRef),
    Off,
    Start,
    Stop,
}

/// Values the command set, by flag. `None` means the flag was not given.
#[derive(Debug, Default)]
struct Accumulator {
    memory_gb: Option<u64>,
    ram_gb: Option<u64>,
    shards: Option<u64>,
    replication: Option<bool>,
    rack: Option<bool>,
    eviction: Option<&'static str>,
    persistence: Option<Retention>,
    replica: Option<ReplicaRequest>,
}

impl Accumulator {
    fn record(&mut self, flag: Flag, value: Value) {
        match (flag, value) {
            (Flag::Memory, Value::Integer(n)) => self.memory_gb = Some(n),
            (Flag::Ram, Value::Integer(n)) => self.ram_gb = Some(n),
            (Flag::Shards, Value::Integer(n)) => self.shards = Some(n),
            (Flag::Replication, Value::Bool(b)) => self.replication = Some(b),
            (Flag::Rack, Value::Bool(b)) => self.rack = Some(b),
            (Flag::Eviction, Value::Choice(policy)) => self.eviction = Some(policy),
            (Flag::Persistence, Value::Retention(r)) => self.persistence = Some(r),
            (flag, value) => warn!(?flag, ?value, "value does not belong to flag; ignored"),
        }
    }

    /// Rules decidable from the command alone, without the registry or the
    /// database's current state.
    fn check_local(&self, creating: bool) -> Result<(), CommandError> {
        if let Some(ram_gb) = self.ram_gb {
            match self.memory_gb {
                Some(memory_gb) if ram_gb > memory_gb => {
                    return Err(CommandError::CapacityExceeded {
                        ram: ram_gb * GIGABYTE,
                        memory: memory_gb * GIGABYTE,
                    })
                }
                None if creating => return Err(CommandError::RamWithoutBudget),
                _ => {}
            }
        }
        let replicated = match self.replication {
            Some(enabled) => Some(enabled),
            None if creating => Some(false),
            None => None,
        };
        if self.rack == Some(true) && replicated == Some(false) {
            return Err(CommandError::RackRequiresReplication);
        }
        Ok(())
    }

    fn record_replica_action(&mut self, action: ReplicaAction) {
        self.replica = match action {
            // Completed by the source token that follows.
            ReplicaAction::Add => None,
            ReplicaAction::Off => Some(ReplicaRequest::Off),
            ReplicaAction::Start => Some(ReplicaRequest::Start),
            ReplicaAction::Stop => Some(ReplicaRequest::Stop),
        };
    }
}

enum Content {
    Fields(Accumulator),
    Raw(String),
}

/// A command line reduced to its target and what it sets.
struct Parsed {
    creating: bool,
    target: Option<Target>,
    content: Content,
}

/// Lazily fetched current state of the database being changed.
struct CurrentState<'a> {
    api: &'a dyn ControlPlane,
    uid: Option<u64>,
    cached: Option<Database>,
}

impl<'a> CurrentState<'a> {
    fn new(api: &'a dyn ControlPlane, target: &Target) -> Self {
        let uid = match target {
            Target::Existing { uid } => Some(*uid),
            Target::New { .. } => None,
        };
        Self {
            api,
            uid,
            cached: None,
        }
    }

    /// `None` for a database that does not exist yet.
    fn get(&mut self) -> Result<Option<&Database>, CommandError> {
        let Some(uid) = self.uid else {
            return Ok(None);
        };
        if self.cached.is_none() {
            debug!(uid, "fetching current database state");
            self.cached = Some(self.api.get_database(uid)?);
        }
        Ok(self.cached.as_ref())
    }
}

pub struct PayloadBuilder<'a> {
    grammar: &'a CommandGrammar,
    registry: &'a RegistrySnapshot,
    api: &'a dyn ControlPlane,
}

impl<'a> PayloadBuilder<'a> {
    pub fn new(
        grammar: &'a CommandGrammar,
        registry: &'a RegistrySnapshot,
        api: &'a dyn ControlPlane,
    ) -> Self {
        Self {
            grammar,
            registry,
            api,
        }
    }

    /// Build the request for a full `create ...` or `change ...` token line.
    pub fn build<S: AsRef<str>>(&self, tokens: &[S]) -> Result<MutationRequest, CommandError> {
        let parsed = self.parse(Walk::new(), tokens)?;
        let target = parsed.target.ok_or(CommandError::MissingArgument {
            verb: "request",
            what: "a create or change command",
        })?;
        let body = match parsed.content {
            Content::Raw(text) => RequestBody::Raw(text),
            Content::Fields(acc) => {
                RequestBody::Fields(self.finalize(&target, acc)?.into_fields())
            }
        };
        Ok(MutationRequest { target, body })
    }

    /// Reject what can be rejected without a network call: grammar errors
    /// and the cross-field rules that only involve values on the line.
    /// References and names are not resolved.
    pub fn precheck<S: AsRef<str>>(&self, tokens: &[S]) -> Result<(), CommandError> {
        let parsed = self.parse(Walk::deferring_references(), tokens)?;
        match parsed.content {
            Content::Raw(_) => Ok(()),
            Content::Fields(acc) => acc.check_local(parsed.creating),
        }
    }

    fn parse<S: AsRef<str>>(
        &self,
        mut walk: Walk,
        tokens: &[S],
    ) -> Result<Parsed, CommandError> {
        let steps = walk.replay(self.grammar, self.registry, tokens)?;
        let mut creating = false;
        let mut target = None;
        let mut acc = Accumulator::default();

        for step in steps {
            match step {
                Step::Verb(Verb::Create) => creating = true,
                Step::Verb(Verb::Change) | Step::Flag(_) => {}
                Step::Verb(other) => {
                    return Err(CommandError::NotAMutation(other.as_str().to_string()))
                }
                Step::UnknownVerb(word) => return Err(CommandError::NotAMutation(word)),
                Step::Name(name) => target = Some(Target::New { name }),
                Step::Target(uid) => target = Some(Target::Existing { uid }),
                Step::Value(flag, value) => acc.record(flag, value),
                Step::ReplicaAction(action) => acc.record_replica_action(action),
                Step::ReplicaSource(source) => acc.replica = Some(ReplicaRequest::Add(source)),
                Step::Raw(text) => {
                    debug!("raw override; other flags ignored");
                    return Ok(Parsed {
                        creating,
                        target,
                        content: Content::Raw(text),
                    });
                }
                Step::Kind(_) | Step::Reference(_) | Step::Ignored(_) => {}
            }
        }

        Ok(Parsed {
            creating,
            target,
            content: Content::Fields(acc),
        })
    }

    fn finalize(&self, target: &Target, acc: Accumulator) -> Result<DatabaseSpec, CommandError> {
        let mut current = CurrentState::new(self.api, target);
        let mut spec = DatabaseSpec::default();

        if let Target::New { name } = target {
            spec.name = Some(name.clone());
            spec.kind = Some("redis");
        }

        spec.memory_size = acc.memory_gb.map(|gb| gb * GIGABYTE);

        if let Some(ram_gb) = acc.ram_gb {
            let ram = ram_gb * GIGABYTE;
            let budget = match spec.memory_size {
                Some(memory) => memory,
                None => match current.get()? {
                    Some(db) => db.memory_size,
                    None => return Err(CommandError::RamWithoutBudget),
                },
            };
            if ram > budget {
                return Err(CommandError::CapacityExceeded {
                    ram,
                    memory: budget,
                });
            }
            spec.bigstore = Some(true);
            spec.bigstore_ram_size = Some(ram);
        }

        if let Some(shards) = acc.shards {
            spec.shards_count = Some(shards);
            spec.shard_key_regex = Some(default_shard_key_regex());
        }

        spec.replication = acc.replication;
        spec.rack_aware = acc.rack;
        if acc.rack == Some(true) {
            let replicated = match acc.replication {
                Some(enabled) => enabled,
                None => current.get()?.map_or(false, |db| db.replication),
            };
            if !replicated {
                return Err(CommandError::RackRequiresReplication);
            }
        }
        if acc.replication == Some(false)
            && acc.rack.is_none()
            && current.get()?.map_or(false, |db| db.rack_aware)
        {
            debug!("replication disabled on a rack-aware database; clearing rack awareness");
            spec.rack_aware = Some(false);
        }

        spec.eviction_policy = acc.eviction;
        if let Some(retention) = acc.persistence {
            spec.apply_retention(retention);
        }

        if let Some(replica) = acc.replica {
            self.apply_replica(&mut spec, replica, &mut current)?;
        }

        Ok(spec)
    }

    fn apply_replica(
        &self,
        spec: &mut DatabaseSpec,
        replica: ReplicaRequest,
        current: &mut CurrentState<'_>,
    ) -> Result<(), CommandError> {
        match replica {
            ReplicaRequest::Add(source) => {
                let uri = match source {
                    SourceRef::Uri(uri) => uri,
                    SourceRef::Entity(uid) => self
                        .api
                        .get_database(uid)?
                        .replica_uri()
                        .ok_or(CommandError::NoReplicaEndpoint(uid))?,
                };
                let mut sources = current
                    .get()?
                    .map(|db| db.sync_sources.clone())
                    .unwrap_or_default();
                if sources.iter().any(|s| s.uri == uri) {
                    return Err(CommandError::AlreadyReplicaOf(uri));
                }
                sources.push(SyncSource::new(uri));
                spec.sync = Some("enabled");
                spec.sync_sources = Some(sources);
            }
            ReplicaRequest::Off => {
                spec.sync = Some("disabled");
                spec.sync_sources = Some(Vec::new());
            }
            ReplicaRequest::Start => spec.sync = Some("enabled"),
            ReplicaRequest::Stop => spec.sync = Some("paused"),
        }
        Ok(())
    }
}
