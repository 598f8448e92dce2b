//! Command vocabulary and the transition table shared by parsing and
//! completion.
//!
//! A command line is walked token by token through [`Walk::advance`]. Each
//! accepted token yields a typed [`Step`]; each rejected token yields a
//! [`CommandError`]. [`Walk::expected`] answers, for the state reached so far,
//! which tokens `advance` would accept next. The payload builder consumes the
//! steps, the completer consumes `expected`; neither has verb-specific
//! branching of its own.

use crate::error::CommandError;
use crate::registry::RegistrySnapshot;

pub const GIGABYTE: u64 = 1024 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    List,
    Create,
    Change,
    Delete,
    Help,
    Quit,
}

impl Verb {
    /// Offered when nothing has been typed yet.
    pub const VOCABULARY: [&'static str; 6] =
        ["create", "change", "delete", "list", "quit", "help"];

    /// Case-insensitive. `exit` and `bye` are accepted as quit.
    pub fn parse(token: &str) -> Option<Verb> {
        match token.to_ascii_lowercase().as_str() {
            "list" => Some(Verb::List),
            "create" => Some(Verb::Create),
            "change" => Some(Verb::Change),
            "delete" => Some(Verb::Delete),
            "help" => Some(Verb::Help),
            "quit" | "exit" | "bye" => Some(Verb::Quit),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verb::List => "list",
            Verb::Create => "create",
            Verb::Change => "change",
            Verb::Delete => "delete",
            Verb::Help => "help",
            Verb::Quit => "quit",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Database,
    Shard,
}

impl EntityKind {
    pub const VOCABULARY: [&'static str; 2] = ["db", "shards"];

    pub fn parse(token: &str) -> Option<EntityKind> {
        match token {
            "db" => Some(EntityKind::Database),
            "shards" => Some(EntityKind::Shard),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Flag {
    Memory,
    Ram,
    Shards,
    Replication,
    Rack,
    Eviction,
    Persistence,
    ReplicaOf,
    Json,
}

impl Flag {
    fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

/// Set of flags already consumed by the command being walked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FlagSet(u16);

impl FlagSet {
    pub fn insert(&mut self, flag: Flag) -> bool {
        let fresh = !self.contains(flag);
        self.0 |= flag.bit();
        fresh
    }

    pub fn contains(&self, flag: Flag) -> bool {
        self.0 & flag.bit() != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    RackAwareness,
}

impl Capability {
    pub fn describe(self) -> &'static str {
        match self {
            Capability::RackAwareness => "rack awareness",
        }
    }
}

/// Cluster feature flags that gate parts of the grammar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub rack_awareness: bool,
}

impl Capabilities {
    pub fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::RackAwareness => self.rack_awareness,
        }
    }
}

pub const BOOL_TOKENS: [&str; 8] = ["true", "false", "yes", "no", "on", "off", "1", "0"];

pub const EVICTION_POLICIES: [&str; 8] = [
    "noeviction",
    "allkeys-lru",
    "allkeys-lfu",
    "allkeys-random",
    "volatile-lru",
    "volatile-lfu",
    "volatile-random",
    "volatile-ttl",
];

pub const RETENTION_TOKENS: [&str; 8] = [
    "disabled",
    "aof",
    "aof-every-sec",
    "aof-always",
    "snapshot",
    "snapshot-every-1-hours",
    "snapshot-every-6-hours",
    "snapshot-every-12-hours",
];

pub const REPLICA_ACTIONS: [&str; 4] = ["add", "off", "start", "stop"];

const SNAPSHOT_HOURS: [u32; 3] = [1, 6, 12];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Decimal integer in `min..=max`.
    Integer { min: u64, max: u64 },
    /// One of [`BOOL_TOKENS`], case-insensitive.
    Boolean,
    /// Fixed vocabulary, case-insensitive.
    Enumeration(&'static [&'static str]),
    /// `<method>[-<granularity>]`, see [`Retention`].
    Retention,
    /// `add <ref-or-uri>` | `off` | `start` | `stop`.
    ReplicaOf,
    /// The whole request body, verbatim.
    Raw,
}

impl ValueKind {
    /// Closed vocabulary offered for completion; empty for open domains.
    pub fn candidates(&self) -> &'static [&'static str] {
        match self {
            ValueKind::Boolean => &BOOL_TOKENS,
            ValueKind::Enumeration(values) => *values,
            ValueKind::Retention => &RETENTION_TOKENS,
            ValueKind::ReplicaOf => &REPLICA_ACTIONS,
            ValueKind::Integer { .. } | ValueKind::Raw => &[],
        }
    }

    fn describe(&self) -> String {
        match self {
            ValueKind::Integer { min, .. } => format!("a number >= {min}"),
            ValueKind::Raw => "a request body".to_string(),
            other => format!("one of {}", other.candidates().join(", ")),
        }
    }
}

#[derive(Debug)]
pub struct FlagSpec {
    pub flag: Flag,
    pub name: &'static str,
    pub verbs: &'static [Verb],
    pub value: ValueKind,
    pub gate: Option<Capability>,
    pub usage: &'static str,
}

const CREATE_AND_CHANGE: &[Verb] = &[Verb::Create, Verb::Change];

const MAX_GIGABYTES: u64 = u64::MAX / GIGABYTE;

/// Completion order is table order; `json` stays last.
static FLAGS: [FlagSpec; 9] = [
    FlagSpec {
        flag: Flag::Memory,
        name: "memory",
        verbs: CREATE_AND_CHANGE,
        value: ValueKind::Integer {
            min: 1,
            max: MAX_GIGABYTES,
        },
        gate: None,
        usage: "memory <GB>",
    },
    FlagSpec {
        flag: Flag::Ram,
        name: "ram",
        verbs: CREATE_AND_CHANGE,
        value: ValueKind::Integer {
            min: 1,
            max: MAX_GIGABYTES,
        },
        gate: None,
        usage: "ram <GB>",
    },
    FlagSpec {
        flag: Flag::Shards,
        name: "shards",
        verbs: CREATE_AND_CHANGE,
        value: ValueKind::Integer {
            min: 1,
            max: u32::MAX as u64,
        },
        gate: None,
        usage: "shards <number of shards>",
    },
    FlagSpec {
        flag: Flag::Replication,
        name: "replication",
        verbs: CREATE_AND_CHANGE,
        value: ValueKind::Boolean,
        gate: None,
        usage: "replication true|false",
    },
    FlagSpec {
        flag: Flag::Rack,
        name: "rack",
        verbs: CREATE_AND_CHANGE,
        value: ValueKind::Boolean,
        gate: Some(Capability::RackAwareness),
        usage: "rack true|false",
    },
    FlagSpec {
        flag: Flag::Eviction,
        name: "eviction",
        verbs: CREATE_AND_CHANGE,
        value: ValueKind::Enumeration(&EVICTION_POLICIES),
        gate: None,
        usage: "eviction <policy>",
    },
    FlagSpec {
        flag: Flag::Persistence,
        name: "persistence",
        verbs: CREATE_AND_CHANGE,
        value: ValueKind::Retention,
        gate: None,
        usage: "persistence disabled|aof[-every-sec|-always]|snapshot[-every-<1|6|12>-hours]",
    },
    FlagSpec {
        flag: Flag::ReplicaOf,
        name: "replicaof",
        verbs: &[Verb::Change],
        value: ValueKind::ReplicaOf,
        gate: None,
        usage: "replicaof add <db uid>|<db name>|<uri> | start | stop | off",
    },
    FlagSpec {
        flag: Flag::Json,
        name: "json",
        verbs: CREATE_AND_CHANGE,
        value: ValueKind::Raw,
        gate: None,
        usage: "json '<request body>'",
    },
];

/// Static description of the command vocabulary.
#[derive(Debug, Clone, Copy)]
pub struct CommandGrammar {
    flags: &'static [FlagSpec],
}

impl Default for CommandGrammar {
    fn default() -> Self {
        Self { flags: &FLAGS }
    }
}

impl CommandGrammar {
    pub fn spec(&self, flag: Flag) -> &'static FlagSpec {
        self.flags
            .iter()
            .find(|s| s.flag == flag)
            .unwrap_or_else(|| unreachable!("flag {flag:?} missing from the grammar table"))
    }

    pub fn all_flags(&self) -> &'static [FlagSpec] {
        self.flags
    }

    /// Flags currently legal for `verb`: not yet consumed and not gated off.
    pub fn flags_for(
        &self,
        verb: Verb,
        consumed: FlagSet,
        capabilities: Capabilities,
    ) -> Vec<&'static FlagSpec> {
        self.flags
            .iter()
            .filter(|s| s.verbs.contains(&verb))
            .filter(|s| !consumed.contains(s.flag))
            .filter(|s| s.gate.map_or(true, |cap| capabilities.supports(cap)))
            .collect()
    }

    pub fn value_domain(&self, verb: Verb, flag: Flag) -> Option<ValueKind> {
        let spec = self.spec(flag);
        spec.verbs.contains(&verb).then_some(spec.value)
    }

    fn lookup(&self, verb: Verb, name: &str) -> Option<&'static FlagSpec> {
        self.flags
            .iter()
            .find(|s| s.name == name && s.verbs.contains(&verb))
    }
}

/// How a database persists its dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retention {
    Disabled,
    Aof(AofPolicy),
    Snapshot { hours: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AofPolicy {
    EverySecond,
    Always,
}

impl Retention {
    /// Splits `<method>[-<granularity>]` and validates both halves.
    pub fn parse(raw: &str) -> Option<Retention> {
        let lowered = raw.to_ascii_lowercase();
        let (method, granularity) = match lowered.split_once('-') {
            Some((m, g)) => (m, Some(g)),
            None => (lowered.as_str(), None),
        };
        match (method, granularity) {
            ("disabled", None) => Some(Retention::Disabled),
            ("aof", None) | ("aof", Some("every-sec")) => {
                Some(Retention::Aof(AofPolicy::EverySecond))
            }
            ("aof", Some("always")) => Some(Retention::Aof(AofPolicy::Always)),
            ("snapshot", None) => Some(Retention::Snapshot { hours: 1 }),
            ("snapshot", Some(g)) => {
                let hours: u32 = g
                    .strip_prefix("every-")?
                    .strip_suffix("-hours")?
                    .parse()
                    .ok()?;
                SNAPSHOT_HOURS
                    .contains(&hours)
                    .then_some(Retention::Snapshot { hours })
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicaAction {
    Add,
    Off,
    Start,
    Stop,
}

impl ReplicaAction {
    fn parse(token: &str) -> Option<ReplicaAction> {
        match token {
            "add" => Some(ReplicaAction::Add),
            "off" => Some(ReplicaAction::Off),
            "start" => Some(ReplicaAction::Start),
            "stop" => Some(ReplicaAction::Stop),
            _ => None,
        }
    }
}

/// Where `replicaof add` replicates from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRef {
    Entity(u64),
    Uri(String),
}

/// A validated flag value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Integer(u64),
    Bool(bool),
    Choice(&'static str),
    Retention(Retention),
}

/// What an accepted token contributed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Verb(Verb),
    UnknownVerb(String),
    Kind(EntityKind),
    Target(u64),
    /// A positional reference left unresolved by [`Walk::deferring_references`].
    Reference(String),
    Name(String),
    Flag(Flag),
    Value(Flag, Value),
    ReplicaAction(ReplicaAction),
    ReplicaSource(SourceRef),
    Raw(String),
    Ignored(String),
}

/// The entity a command is bound to once its positional argument is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Kind(EntityKind),
    Entity(u64),
    NewEntity(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Verb,
    ListKind,
    ListTarget,
    ListDone,
    DeleteTarget,
    DeleteDone,
    CreateName,
    ChangeTarget,
    FlagName,
    FlagValue(Flag),
    ReplicaSource,
    /// After the raw override body; everything else is ignored.
    Closed,
    /// After `help`, `quit` or an unknown verb.
    Terminal,
}

/// Position reached while walking a command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Walk {
    pub state: State,
    pub verb: Option<Verb>,
    pub scope: Option<Scope>,
    pub consumed: FlagSet,
    defer_references: bool,
}

impl Default for Walk {
    fn default() -> Self {
        Self::new()
    }
}

impl Walk {
    pub fn new() -> Self {
        Self {
            state: State::Verb,
            verb: None,
            scope: None,
            consumed: FlagSet::default(),
            defer_references: false,
        }
    }

    /// A walk that accepts any positional reference or new name without
    /// consulting the registry. Used to reject malformed commands before the
    /// registry is refreshed.
    pub fn deferring_references() -> Self {
        Self {
            defer_references: true,
            ..Self::new()
        }
    }

    fn reference(&self, registry: &RegistrySnapshot, token: &str) -> Result<Step, CommandError> {
        if self.defer_references {
            return Ok(Step::Reference(token.to_string()));
        }
        registry.resolve(token).map(Step::Target)
    }

    fn bind(&mut self, step: &Step) {
        if let Step::Target(uid) = step {
            self.scope = Some(Scope::Entity(*uid));
        }
    }

    fn bound_entity(&self) -> Option<u64> {
        match self.scope {
            Some(Scope::Entity(uid)) => Some(uid),
            _ => None,
        }
    }

    fn verb_name(&self) -> &'static str {
        self.verb.map_or("command", Verb::as_str)
    }

    /// Consume one token. On error the walk is left unchanged.
    pub fn advance(
        &mut self,
        grammar: &CommandGrammar,
        registry: &RegistrySnapshot,
        token: &str,
    ) -> Result<Step, CommandError> {
        match self.state {
            State::Verb => Ok(match Verb::parse(token) {
                Some(verb) => {
                    self.verb = Some(verb);
                    self.state = match verb {
                        Verb::List => State::ListKind,
                        Verb::Create => State::CreateName,
                        Verb::Change => State::ChangeTarget,
                        Verb::Delete => State::DeleteTarget,
                        Verb::Help | Verb::Quit => State::Terminal,
                    };
                    Step::Verb(verb)
                }
                None => {
                    self.state = State::Terminal;
                    Step::UnknownVerb(token.to_string())
                }
            }),
            State::ListKind => {
                let kind = EntityKind::parse(token)
                    .ok_or_else(|| CommandError::UnknownEntityKind(token.to_string()))?;
                self.scope = Some(Scope::Kind(kind));
                self.state = State::ListTarget;
                Ok(Step::Kind(kind))
            }
            State::ListTarget => {
                let step = self.reference(registry, token)?;
                self.state = State::ListDone;
                Ok(step)
            }
            State::DeleteTarget => {
                let step = self.reference(registry, token)?;
                self.bind(&step);
                self.state = State::DeleteDone;
                Ok(step)
            }
            State::ListDone | State::DeleteDone => Err(CommandError::UnexpectedArgument {
                verb: self.verb_name(),
                token: token.to_string(),
            }),
            State::CreateName => {
                if !self.defer_references && registry.contains_name(token) {
                    return Err(CommandError::NameTaken(token.to_string()));
                }
                self.scope = Some(Scope::NewEntity(token.to_string()));
                self.state = State::FlagName;
                Ok(Step::Name(token.to_string()))
            }
            State::ChangeTarget => {
                let step = self.reference(registry, token)?;
                self.bind(&step);
                self.state = State::FlagName;
                Ok(step)
            }
            State::FlagName => {
                let verb = self.verb.unwrap_or(Verb::Change);
                let spec = grammar
                    .lookup(verb, token)
                    .ok_or_else(|| CommandError::UnknownFlag {
                        verb: verb.as_str(),
                        token: token.to_string(),
                    })?;
                if self.consumed.contains(spec.flag) {
                    return Err(CommandError::DuplicateFlag { flag: spec.name });
                }
                if let Some(cap) = spec.gate {
                    if !registry.capabilities().supports(cap) {
                        return Err(CommandError::UnsupportedFlag {
                            flag: spec.name,
                            capability: cap.describe(),
                        });
                    }
                }
                self.consumed.insert(spec.flag);
                self.state = State::FlagValue(spec.flag);
                Ok(Step::Flag(spec.flag))
            }
            State::FlagValue(flag) => self.advance_value(grammar, flag, token),
            State::ReplicaSource => {
                let source = match registry.resolve(token) {
                    Ok(uid) if Some(uid) == self.bound_entity() => {
                        return Err(CommandError::SelfReplica)
                    }
                    Ok(uid) => SourceRef::Entity(uid),
                    Err(_) => SourceRef::Uri(token.to_string()),
                };
                self.state = State::FlagName;
                Ok(Step::ReplicaSource(source))
            }
            State::Closed | State::Terminal => Ok(Step::Ignored(token.to_string())),
        }
    }

    fn advance_value(
        &mut self,
        grammar: &CommandGrammar,
        flag: Flag,
        token: &str,
    ) -> Result<Step, CommandError> {
        let spec = grammar.spec(flag);
        let invalid = || CommandError::InvalidValue {
            flag: spec.name,
            value: token.to_string(),
            expected: spec.value.describe(),
        };
        let value = match spec.value {
            ValueKind::Integer { min, max } => {
                let n: u64 = token.parse().map_err(|_| invalid())?;
                if n < min || n > max {
                    return Err(invalid());
                }
                Value::Integer(n)
            }
            ValueKind::Boolean => match token.to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Value::Bool(true),
                "false" | "no" | "off" | "0" => Value::Bool(false),
                _ => return Err(invalid()),
            },
            ValueKind::Enumeration(values) => {
                let choice = values
                    .iter()
                    .find(|v| v.eq_ignore_ascii_case(token))
                    .ok_or_else(invalid)?;
                Value::Choice(*choice)
            }
            ValueKind::Retention => {
                let retention = Retention::parse(token).ok_or_else(|| {
                    CommandError::MalformedRetention {
                        flag: spec.name,
                        value: token.to_string(),
                    }
                })?;
                Value::Retention(retention)
            }
            ValueKind::ReplicaOf => {
                let action = ReplicaAction::parse(token).ok_or_else(invalid)?;
                self.state = match action {
                    ReplicaAction::Add => State::ReplicaSource,
                    _ => State::FlagName,
                };
                return Ok(Step::ReplicaAction(action));
            }
            ValueKind::Raw => {
                self.state = State::Closed;
                return Ok(Step::Raw(token.to_string()));
            }
        };
        self.state = State::FlagName;
        Ok(Step::Value(flag, value))
    }

    /// Every token `advance` would accept next, for closed vocabularies.
    ///
    /// Open positions (a new database name, a numeric value, a URI, the raw
    /// body) contribute no candidates.
    pub fn expected(&self, grammar: &CommandGrammar, registry: &RegistrySnapshot) -> Vec<String> {
        match self.state {
            State::Verb => Verb::VOCABULARY.iter().map(|s| s.to_string()).collect(),
            State::ListKind => EntityKind::VOCABULARY.iter().map(|s| s.to_string()).collect(),
            State::ListTarget | State::DeleteTarget | State::ChangeTarget => {
                registry.candidates(None)
            }
            State::ReplicaSource => registry.candidates(self.bound_entity()),
            State::FlagName => match self.verb {
                Some(verb) => grammar
                    .flags_for(verb, self.consumed, registry.capabilities())
                    .into_iter()
                    .map(|s| s.name.to_string())
                    .collect(),
                None => Vec::new(),
            },
            State::FlagValue(flag) => grammar
                .spec(flag)
                .value
                .candidates()
                .iter()
                .map(|s| s.to_string())
                .collect(),
            State::ListDone
            | State::DeleteDone
            | State::CreateName
            | State::Closed
            | State::Terminal => Vec::new(),
        }
    }

    /// Walk a complete line and check that it did not stop short.
    ///
    /// Errors in the flag section are held back: if a raw override follows,
    /// it replaces every field and the held errors are dropped. Otherwise the
    /// first one is returned.
    pub fn replay<S: AsRef<str>>(
        &mut self,
        grammar: &CommandGrammar,
        registry: &RegistrySnapshot,
        tokens: &[S],
    ) -> Result<Vec<Step>, CommandError> {
        let mut steps = Vec::with_capacity(tokens.len());
        let mut held: Option<CommandError> = None;
        for token in tokens {
            match self.advance(grammar, registry, token.as_ref()) {
                Ok(step) => steps.push(step),
                Err(err) => match self.state {
                    State::FlagName => {
                        held.get_or_insert(err);
                    }
                    State::FlagValue(_) | State::ReplicaSource => {
                        held.get_or_insert(err);
                        self.state = State::FlagName;
                    }
                    _ => return Err(err),
                },
            }
        }
        if self.state == State::Closed {
            return Ok(steps);
        }
        if let Some(err) = held {
            return Err(err);
        }
        self.finish(grammar)?;
        Ok(steps)
    }

    /// Check that the line did not stop in the middle of a required token.
    pub fn finish(&self, grammar: &CommandGrammar) -> Result<(), CommandError> {
        match self.state {
            State::CreateName => Err(CommandError::MissingArgument {
                verb: "create",
                what: "a database name",
            }),
            State::ChangeTarget => Err(CommandError::MissingArgument {
                verb: "change",
                what: "a database uid or name",
            }),
            State::DeleteTarget => Err(CommandError::MissingArgument {
                verb: "delete",
                what: "a database uid or name",
            }),
            State::FlagValue(flag) => Err(CommandError::MissingValue {
                flag: grammar.spec(flag).name.to_string(),
            }),
            State::ReplicaSource => Err(CommandError::MissingValue {
                flag: "replicaof add".to_string(),
            }),
            _ => Ok(()),
        }
    }
}
