//! Recording control plane shared by the integration tests.

#![allow(dead_code)]

use dbadmin_core::model::Endpoint;
use dbadmin_core::{
    ClusterInfo, ControlPlane, Database, EntityRegistry, RemoteError, RequestBody, Shard,
};
use std::cell::RefCell;

pub const GB: u64 = 1 << 30;

pub fn database(uid: u64, name: &str) -> Database {
    Database {
        uid,
        name: name.to_string(),
        memory_size: 8 * GB,
        shards_count: 1,
        endpoints: vec![Endpoint {
            dns_name: format!("{name}.db.example"),
            addr: Vec::new(),
            port: 14000 + uid as u16,
        }],
        authentication_admin_pass: Some("secret".into()),
        ..Database::default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Post(String),
    Put(u64, String),
    Delete(u64),
}

pub struct Recorder {
    pub databases: RefCell<Vec<Database>>,
    pub rack_aware: bool,
    pub sent: RefCell<Vec<Sent>>,
    pub reads: RefCell<Vec<String>>,
}

impl Recorder {
    pub fn new(rack_aware: bool) -> Self {
        Self {
            databases: RefCell::new(vec![
                database(1, "orders"),
                database(2, "cache"),
                database(4, "sessions"),
            ]),
            rack_aware,
            sent: RefCell::new(Vec::new()),
            reads: RefCell::new(Vec::new()),
        }
    }

    pub fn registry(&self) -> EntityRegistry {
        let registry = EntityRegistry::new();
        registry
            .refresh(self)
            .expect("in-memory refresh cannot fail");
        self.reads.borrow_mut().clear();
        registry
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.borrow().clone()
    }

    /// Paths read since the registry was built, e.g. `bdbs/2`.
    pub fn reads(&self) -> Vec<String> {
        self.reads.borrow().clone()
    }

    fn read(&self, path: impl Into<String>) {
        self.reads.borrow_mut().push(path.into());
    }
}

impl ControlPlane for Recorder {
    fn list_databases(&self) -> Result<Vec<Database>, RemoteError> {
        self.read("bdbs");
        Ok(self.databases.borrow().clone())
    }

    fn get_database(&self, uid: u64) -> Result<Database, RemoteError> {
        self.read(format!("bdbs/{uid}"));
        self.databases
            .borrow()
            .iter()
            .find(|d| d.uid == uid)
            .cloned()
            .ok_or(RemoteError::Status {
                status: 404,
                reason: "Not Found".into(),
            })
    }

    fn list_shards(&self, database: Option<u64>) -> Result<Vec<Shard>, RemoteError> {
        self.read(match database {
            Some(uid) => format!("bdbs/{uid}/shards"),
            None => "shards".to_string(),
        });
        Ok(Vec::new())
    }

    fn cluster_info(&self) -> Result<ClusterInfo, RemoteError> {
        self.read("cluster");
        Ok(ClusterInfo {
            name: "recorder".into(),
            rack_aware: self.rack_aware,
        })
    }

    fn create_database(&self, body: &RequestBody) -> Result<Database, RemoteError> {
        let text = body.to_json_string();
        self.sent.borrow_mut().push(Sent::Post(text));
        let uid = self.databases.borrow().len() as u64 + 100;
        Ok(database(uid, "created"))
    }

    fn update_database(&self, uid: u64, body: &RequestBody) -> Result<(), RemoteError> {
        self.sent
            .borrow_mut()
            .push(Sent::Put(uid, body.to_json_string()));
        Ok(())
    }

    fn delete_database(&self, uid: u64) -> Result<(), RemoteError> {
        self.sent.borrow_mut().push(Sent::Delete(uid));
        Ok(())
    }
}
