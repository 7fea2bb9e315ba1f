//! Upload through an IPFS gateway exposing `POST /add`.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokenlist_shared::{Result, TokenListError};
use tracing::{debug, instrument};

use crate::StoredContent;

/// Node-style `Buffer` JSON the gateway expects for file contents.
#[derive(Serialize)]
struct JsonBuffer<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    data: &'a [u8],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AddRequest<'a> {
    file_name: &'a str,
    buffer: JsonBuffer<'a>,
}

#[derive(Deserialize)]
struct AddResponse {
    #[serde(default)]
    data: Vec<AddedEntry>,
}

#[derive(Deserialize)]
struct AddedEntry {
    hash: String,
    #[serde(default)]
    path: String,
}

/// Primary upload channel.
#[derive(Clone)]
pub struct IpfsGateway {
    client: Client,
    base_url: String,
}

impl IpfsGateway {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Base URL files can be retrieved from (`{base}/ipfs/{cid}`).
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Upload `bytes` as `file_name`. The first returned entry is the file itself.
    #[instrument(skip_all, fields(file_name = %file_name, size = bytes.len()))]
    pub async fn add(&self, file_name: &str, bytes: &[u8]) -> Result<StoredContent> {
        let url = format!("{}/add", self.base_url);
        let body = AddRequest {
            file_name,
            buffer: JsonBuffer {
                kind: "Buffer",
                data: bytes,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| TokenListError::Publish(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TokenListError::Publish(format!("{url}: HTTP {status}")));
        }

        let parsed: AddResponse = response
            .json()
            .await
            .map_err(|e| TokenListError::Publish(format!("{url}: unreadable response: {e}")))?;
        let entry = parsed
            .data
            .into_iter()
            .next()
            .ok_or_else(|| TokenListError::Publish(format!("{url}: response lists no files")))?;

        debug!(hash = %entry.hash, "added to ipfs");
        Ok(StoredContent {
            path: if entry.path.is_empty() {
                format!("/ipfs/{}", entry.hash)
            } else {
                entry.path
            },
            content_id: entry.hash,
        })
    }
}

/// Read-only access to files through an IPFS HTTP gateway.
#[derive(Clone)]
pub struct GatewayReader {
    client: Client,
    base_url: String,
}

impl GatewayReader {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Download `{base}/ipfs/{ipfs_path}`.
    pub async fn get(&self, ipfs_path: &str) -> Result<Vec<u8>> {
        let url = format!("{}/ipfs/{}", self.base_url, ipfs_path.trim_start_matches('/'));
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| TokenListError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TokenListError::Network(format!("{url}: HTTP {status}")));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| TokenListError::Network(format!("{url}: failed to read body: {e}")))?;
        Ok(bytes.to_vec())
    }
}
