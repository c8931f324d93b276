//! etcd v2 HTTP client.
//!
//! # Responsibilities
//! - Read keys through `GET /v2/keys/<key>`
//! - Long-poll watches through `?wait=true&waitIndex=N`
//! - Translate etcd error codes into `KvError`
//! - Optional TLS with a private CA and a client certificate

use std::fs;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Certificate, Identity, Response};
use serde::Deserialize;
use url::Url;

use crate::config::StoreConfig;
use crate::kv::{KvClient, KvError, KvNode, KvResponse, WatchOptions};

const INDEX_HEADER: &str = "x-etcd-index";

const CODE_KEY_NOT_FOUND: u32 = 100;
const CODE_EVENT_INDEX_CLEARED: u32 = 401;

#[derive(Debug, Deserialize)]
struct EtcdBody {
    node: EtcdNode,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EtcdNode {
    key: Option<String>,
    value: Option<String>,
    #[serde(default)]
    dir: bool,
    #[serde(default)]
    nodes: Vec<EtcdNode>,
    #[serde(default)]
    modified_index: u64,
}

impl From<EtcdNode> for KvNode {
    fn from(node: EtcdNode) -> Self {
        KvNode {
            key: node.key.unwrap_or_else(|| "/".to_string()),
            value: node.value,
            is_dir: node.dir,
            children: node.nodes.into_iter().map(KvNode::from).collect(),
            revision: node.modified_index,
            error: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EtcdErrorBody {
    error_code: u32,
    message: String,
    #[serde(default)]
    cause: Option<String>,
}

/// Client for the etcd v2 keys API.
#[derive(Clone)]
pub struct EtcdClient {
    http: reqwest::Client,
    endpoint: Url,
    /// Bound on a whole `get`; watches carry their own timeout.
    request_timeout: Duration,
}

impl EtcdClient {
    /// Build a client from store settings, loading TLS material if configured.
    pub fn new(config: &StoreConfig) -> Result<Self, KvError> {
        let mut endpoint: Url = config
            .endpoint
            .parse()
            .map_err(|e| KvError::Transport(format!("invalid endpoint '{}': {}", config.endpoint, e)))?;
        endpoint.set_path("");
        endpoint.set_query(None);

        let request_timeout = Duration::from_secs(config.request_timeout_secs);
        let mut builder = reqwest::Client::builder().connect_timeout(request_timeout);

        if let Some(path) = &config.ca_file {
            let pem = fs::read(path)
                .map_err(|e| KvError::Transport(format!("reading CA file {}: {}", path.display(), e)))?;
            let cert = Certificate::from_pem(&pem)
                .map_err(|e| KvError::Transport(format!("parsing CA file {}: {}", path.display(), e)))?;
            builder = builder.add_root_certificate(cert);
        }

        if let (Some(cert_path), Some(key_path)) = (&config.cert_file, &config.key_file) {
            let mut pem = fs::read(cert_path).map_err(|e| {
                KvError::Transport(format!("reading certificate {}: {}", cert_path.display(), e))
            })?;
            let key = fs::read(key_path)
                .map_err(|e| KvError::Transport(format!("reading key {}: {}", key_path.display(), e)))?;
            pem.extend_from_slice(b"\n");
            pem.extend_from_slice(&key);
            let identity = Identity::from_pem(&pem)
                .map_err(|e| KvError::Transport(format!("loading client identity: {}", e)))?;
            builder = builder.identity(identity);
        }

        let http = builder
            .build()
            .map_err(|e| KvError::Transport(format!("building HTTP client: {}", e)))?;

        tracing::debug!(endpoint = %endpoint, "etcd client initialized");
        Ok(Self {
            http,
            endpoint,
            request_timeout,
        })
    }

    fn key_url(&self, key: &str) -> Result<Url, KvError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| KvError::Transport(format!("endpoint {} cannot carry a path", self.endpoint)))?
            .pop_if_empty()
            .push("v2")
            .push("keys")
            .extend(key.split('/').filter(|segment| !segment.is_empty()));
        Ok(url)
    }

    async fn decode(key: &str, res: Response) -> Result<KvResponse, KvError> {
        let index = res
            .headers()
            .get(INDEX_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or_default();
        let status = res.status();
        let bytes = res
            .bytes()
            .await
            .map_err(|e| KvError::Transport(e.to_string()))?;

        if !status.is_success() {
            let body: EtcdErrorBody = serde_json::from_slice(&bytes)
                .map_err(|_| KvError::Transport(format!("etcd returned status {}", status)))?;
            return Err(error_from_code(key, body));
        }

        let body: EtcdBody =
            serde_json::from_slice(&bytes).map_err(|e| KvError::Decode(e.to_string()))?;
        Ok(KvResponse {
            node: body.node.into(),
            index,
        })
    }
}

fn error_from_code(key: &str, body: EtcdErrorBody) -> KvError {
    match body.error_code {
        CODE_KEY_NOT_FOUND => KvError::KeyNotFound(key.to_string()),
        CODE_EVENT_INDEX_CLEARED => KvError::RevisionUnavailable {
            key: key.to_string(),
            requested: 0,
        },
        200..=299 => KvError::Field {
            key: key.to_string(),
            message: body.message,
        },
        code => KvError::Transport(format!(
            "etcd error {}: {} ({})",
            code,
            body.message,
            body.cause.unwrap_or_default()
        )),
    }
}

fn transport(err: reqwest::Error) -> KvError {
    if err.is_timeout() {
        KvError::Timeout
    } else {
        KvError::Transport(err.to_string())
    }
}

#[async_trait]
impl KvClient for EtcdClient {
    async fn get(&self, key: &str) -> Result<KvResponse, KvError> {
        let mut url = self.key_url(key)?;
        url.query_pairs_mut().append_pair("sorted", "true");

        let res = self
            .http
            .get(url)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(transport)?;
        Self::decode(key, res).await
    }

    async fn watch(&self, key: &str, opts: WatchOptions) -> Result<KvResponse, KvError> {
        let mut url = self.key_url(key)?;
        url.query_pairs_mut()
            .append_pair("wait", "true")
            .append_pair("recursive", if opts.recursive { "true" } else { "false" })
            .append_pair("waitIndex", &opts.since_revision.to_string());

        let res = self
            .http
            .get(url)
            .timeout(opts.timeout)
            .send()
            .await
            .map_err(transport)?;
        match Self::decode(key, res).await {
            Err(KvError::RevisionUnavailable { key, .. }) => Err(KvError::RevisionUnavailable {
                key,
                requested: opts.since_revision,
            }),
            other => other,
        }
    }
}
