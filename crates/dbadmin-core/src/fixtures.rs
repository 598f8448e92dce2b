//! In-memory control plane for unit tests.

use crate::api::ControlPlane;
use crate::error::RemoteError;
use crate::model::{ClusterInfo, Database, Endpoint, Shard};
use crate::payload::RequestBody;
use std::cell::RefCell;

pub(crate) fn shard(uid: u64, bdb_uid: u64) -> Shard {
    Shard {
        uid: uid.to_string(),
        bdb_uid: bdb_uid.to_string(),
        node_uid: "1".into(),
        assigned_slots: "0-16383".into(),
        role: "master".into(),
    }
}

pub(crate) fn db(uid: u64, name: &str) -> Database {
    Database {
        uid,
        name: name.to_string(),
        memory_size: 4 * crate::grammar::GIGABYTE,
        shards_count: 1,
        endpoints: vec![Endpoint {
            dns_name: format!("redis-{}.cluster.local", 12000 + uid),
            addr: vec![format!("10.0.0.{uid}")],
            port: 12000 + uid as u16,
        }],
        authentication_admin_pass: Some(format!("pass{uid}")),
        ..Database::default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    ListDatabases,
    ClusterInfo,
    ListShards(Option<u64>),
    Get(u64),
    Create(String),
    Update(u64, String),
    Delete(u64),
}

#[derive(Default)]
struct State {
    databases: Vec<Database>,
    shards: Vec<Shard>,
    rack_awareness: bool,
    fail_reads: bool,
    calls: Vec<Call>,
}

pub(crate) struct FakeControlPlane {
    state: RefCell<State>,
}

impl FakeControlPlane {
    pub(crate) fn new(databases: Vec<Database>) -> Self {
        Self {
            state: RefCell::new(State {
                databases,
                ..State::default()
            }),
        }
    }

    pub(crate) fn with_rack_awareness(self, enabled: bool) -> Self {
        self.state.borrow_mut().rack_awareness = enabled;
        self
    }

    pub(crate) fn set_databases(&self, databases: Vec<Database>) {
        self.state.borrow_mut().databases = databases;
    }

    pub(crate) fn set_shards(&self, shards: Vec<Shard>) {
        self.state.borrow_mut().shards = shards;
    }

    pub(crate) fn update_db(&self, uid: u64, f: impl FnOnce(&mut Database)) {
        let mut state = self.state.borrow_mut();
        if let Some(db) = state.databases.iter_mut().find(|d| d.uid == uid) {
            f(db);
        }
    }

    pub(crate) fn fail_reads(&self, fail: bool) {
        self.state.borrow_mut().fail_reads = fail;
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    pub(crate) fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    /// Calls that would change the cluster.
    pub(crate) fn mutations(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Create(_) | Call::Update(..) | Call::Delete(_)))
            .collect()
    }

    fn check_reads(&self, call: Call) -> Result<(), RemoteError> {
        let mut state = self.state.borrow_mut();
        state.calls.push(call);
        if state.fail_reads {
            return Err(RemoteError::Transport("connection refused".into()));
        }
        Ok(())
    }
}

impl ControlPlane for FakeControlPlane {
    fn list_databases(&self) -> Result<Vec<Database>, RemoteError> {
        self.check_reads(Call::ListDatabases)?;
        Ok(self.state.borrow().databases.clone())
    }

    fn get_database(&self, uid: u64) -> Result<Database, RemoteError> {
        self.check_reads(Call::Get(uid))?;
        self.state
            .borrow()
            .databases
            .iter()
            .find(|d| d.uid == uid)
            .cloned()
            .ok_or(RemoteError::Status {
                status: 404,
                reason: "Not Found".into(),
            })
    }

    fn list_shards(&self, database: Option<u64>) -> Result<Vec<Shard>, RemoteError> {
        self.check_reads(Call::ListShards(database))?;
        let state = self.state.borrow();
        Ok(state
            .shards
            .iter()
            .filter(|s| database.map_or(true, |uid| s.bdb_uid == uid.to_string()))
            .cloned()
            .collect())
    }

    fn cluster_info(&self) -> Result<ClusterInfo, RemoteError> {
        self.check_reads(Call::ClusterInfo)?;
        Ok(ClusterInfo {
            name: "test-cluster".into(),
            rack_aware: self.state.borrow().rack_awareness,
        })
    }

    fn create_database(&self, body: &RequestBody) -> Result<Database, RemoteError> {
        let text = body.to_json_string();
        let name = serde_json::from_str::<serde_json::Value>(&text)
            .ok()
            .and_then(|v| v.get("name").and_then(|n| n.as_str()).map(str::to_string))
            .unwrap_or_default();
        let mut state = self.state.borrow_mut();
        state.calls.push(Call::Create(text));
        let uid = state.databases.iter().map(|d| d.uid).max().unwrap_or(0) + 1;
        let created = db(uid, &name);
        state.databases.push(created.clone());
        Ok(created)
    }

    fn update_database(&self, uid: u64, body: &RequestBody) -> Result<(), RemoteError> {
        self.state
            .borrow_mut()
            .calls
            .push(Call::Update(uid, body.to_json_string()));
        Ok(())
    }

    fn delete_database(&self, uid: u64) -> Result<(), RemoteError> {
        let mut state = self.state.borrow_mut();
        state.calls.push(Call::Delete(uid));
        state.databases.retain(|d| d.uid != uid);
        Ok(())
    }
}
