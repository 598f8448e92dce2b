//! HTTP transport for the management API.
//!
//! [`RestClient`] implements [`ControlPlane`] on top of a blocking `reqwest`
//! client: basic auth on every request, JSON in and out, and every non-2xx
//! status turned into [`RemoteError::Status`].

use dbadmin_core::{ClusterInfo, ControlPlane, Database, RemoteError, RequestBody, Shard};
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, USER_AGENT};
use reqwest::Method;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

pub const DEFAULT_PORT: u16 = 9443;

const API_PREFIX: &str = "v1/";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid management API address `{address}`: {source}")]
    InvalidAddress {
        address: String,
        source: url::ParseError,
    },
    #[error("failed to build http client: {0}")]
    Build(#[from] reqwest::Error),
}

/// Where and how to reach the management API.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub timeout: Duration,
    /// Cluster certificates are usually self-signed; verification is opt-in.
    pub verify_tls: bool,
    /// Replaces `https://host:port/`. Used for plain-HTTP test servers and
    /// proxies.
    pub base_url: Option<String>,
}

impl ClientConfig {
    pub fn new(
        host: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            user: user.into(),
            password: password.into(),
            timeout: Duration::from_secs(30),
            verify_tls: false,
            base_url: None,
        }
    }

    /// `<base>/v1/`, always with a trailing slash so relative joins stay
    /// under the prefix.
    pub fn api_root(&self) -> Result<Url, ClientError> {
        let address = match &self.base_url {
            Some(base) => base.clone(),
            None => format!("https://{}:{}/", self.host, self.port),
        };
        let parse = |s: &str| {
            Url::parse(s).map_err(|source| ClientError::InvalidAddress {
                address: address.clone(),
                source,
            })
        };
        let mut base = parse(&address)?;
        if !base.path().ends_with('/') {
            base = parse(&format!("{address}/"))?;
        }
        base.join(API_PREFIX)
            .map_err(|source| ClientError::InvalidAddress {
                address: address.clone(),
                source,
            })
    }
}

pub struct RestClient {
    client: Client,
    root: Url,
    user: String,
    password: String,
}

impl RestClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("dbadmin/", env!("CARGO_PKG_VERSION"))),
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()?;

        Ok(Self {
            client,
            root: config.api_root()?,
            user: config.user.clone(),
            password: config.password.clone(),
        })
    }

    pub fn root(&self) -> &Url {
        &self.root
    }

    fn url(&self, path: &str) -> Result<Url, RemoteError> {
        self.root
            .join(path)
            .map_err(|e| RemoteError::Transport(format!("bad request path `{path}`: {e}")))
    }

    fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&RequestBody>,
    ) -> Result<Response, RemoteError> {
        let url = self.url(path)?;
        debug!(%method, %url, "management API request");

        let mut request = self
            .client
            .request(method, url)
            .basic_auth(&self.user, Some(&self.password));
        if let Some(body) = body {
            request = request
                .header(CONTENT_TYPE, "application/json")
                .body(body.to_json_string());
        }

        let response = request
            .send()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            debug!(status = status.as_u16(), body = %text, "management API rejected request");
            return Err(RemoteError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }
        Ok(response)
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, RemoteError> {
        self.send(Method::GET, path, None)?
            .json()
            .map_err(|e| RemoteError::Decode(format!("GET {path}: {e}")))
    }
}

impl ControlPlane for RestClient {
    fn list_databases(&self) -> Result<Vec<Database>, RemoteError> {
        self.get_json("bdbs")
    }

    fn get_database(&self, uid: u64) -> Result<Database, RemoteError> {
        self.get_json(&format!("bdbs/{uid}"))
    }

    fn list_shards(&self, database: Option<u64>) -> Result<Vec<Shard>, RemoteError> {
        match database {
            Some(uid) => self.get_json(&format!("bdbs/{uid}/shards")),
            None => self.get_json("shards"),
        }
    }

    fn cluster_info(&self) -> Result<ClusterInfo, RemoteError> {
        self.get_json("cluster")
    }

    fn create_database(&self, body: &RequestBody) -> Result<Database, RemoteError> {
        self.send(Method::POST, "bdbs", Some(body))?
            .json()
            .map_err(|e| RemoteError::Decode(format!("POST bdbs: {e}")))
    }

    fn update_database(&self, uid: u64, body: &RequestBody) -> Result<(), RemoteError> {
        self.send(Method::PUT, &format!("bdbs/{uid}"), Some(body))
            .map(drop)
    }

    fn delete_database(&self, uid: u64) -> Result<(), RemoteError> {
        self.send(Method::DELETE, &format!("bdbs/{uid}"), None)
            .map(drop)
    }
}
