//! Records returned by the management API.
//!
//! Only the fields the shell reads are modelled; everything else in the
//! response is ignored. Missing fields fall back to their defaults so older
//! clusters that omit e.g. `bigstore` still decode.

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Database {
    pub uid: u64,
    pub name: String,
    pub memory_size: u64,
    pub replication: bool,
    pub rack_aware: bool,
    pub shards_count: u64,
    pub bigstore: bool,
    pub bigstore_ram_size: u64,
    pub eviction_policy: Option<String>,
    pub data_persistence: Option<String>,
    pub endpoints: Vec<Endpoint>,
    pub sync_sources: Vec<SyncSource>,
    pub sync: Option<String>,
    pub authentication_admin_pass: Option<String>,
}

impl Database {
    pub fn primary_endpoint(&self) -> Option<&Endpoint> {
        self.endpoints.first()
    }

    /// The URI another database uses to replicate from this one.
    pub fn replica_uri(&self) -> Option<String> {
        let endpoint = self.primary_endpoint()?;
        let pass = self.authentication_admin_pass.as_deref().unwrap_or_default();
        Some(format!(
            "redis://admin:{pass}@{}:{}",
            endpoint.dns_name, endpoint.port
        ))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoint {
    pub dns_name: String,
    pub addr: Vec<String>,
    pub port: u16,
}

/// One entry of a database's `sync_sources`.
///
/// Fields other than `uri` (ids, status, lag, ...) are carried through
/// untouched so that re-sending the list does not drop them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncSource {
    pub uri: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SyncSource {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            extra: serde_json::Map::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Shard {
    #[serde(deserialize_with = "id_string")]
    pub uid: String,
    #[serde(deserialize_with = "id_string")]
    pub bdb_uid: String,
    #[serde(deserialize_with = "id_string")]
    pub node_uid: String,
    pub assigned_slots: String,
    pub role: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterInfo {
    pub name: String,
    pub rack_aware: bool,
}

/// Shard ids come back as numbers on some API versions and strings on others.
fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Num(u64),
        Text(String),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Num(n) => n.to_string(),
        Id::Text(s) => s,
    })
}
