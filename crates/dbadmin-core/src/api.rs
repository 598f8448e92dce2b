//! The management API as seen by the engine.

use crate::error::RemoteError;
use crate::model::{ClusterInfo, Database, Shard};
use crate::payload::RequestBody;

/// Blocking access to the cluster's control plane.
///
/// Request bodies are produced exclusively by [`crate::PayloadBuilder`].
pub trait ControlPlane {
    fn list_databases(&self) -> Result<Vec<Database>, RemoteError>;

    fn get_database(&self, uid: u64) -> Result<Database, RemoteError>;

    /// All shards, or only the shards of one database.
    fn list_shards(&self, database: Option<u64>) -> Result<Vec<Shard>, RemoteError>;

    fn cluster_info(&self) -> Result<ClusterInfo, RemoteError>;

    fn create_database(&self, body: &RequestBody) -> Result<Database, RemoteError>;

    fn update_database(&self, uid: u64, body: &RequestBody) -> Result<(), RemoteError>;

    fn delete_database(&self, uid: u64) -> Result<(), RemoteError>;
}
