//! Publishing side of the pipeline: content upload channels, pinning, the
//! previously published list, and the shared retry policy.

mod cid;
mod estuary;
mod ipfs;
mod list;
mod pinata;
mod retry;

use std::time::Duration;

use reqwest::Client;
use tokenlist_shared::{Result, TokenListError};

pub use cid::{MAX_SINGLE_BLOCK, cid_v0};
pub use estuary::Estuary;
pub use ipfs::{GatewayReader, IpfsGateway};
pub use list::{ListLocation, write_list};
pub use pinata::Pinata;
pub use retry::{RetryPolicy, retry};

/// User-Agent string for publish requests.
const USER_AGENT: &str = concat!("tokenlist/", env!("CARGO_PKG_VERSION"));

/// Result of storing a file in a content-addressed store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredContent {
    /// Content identifier (CID) of the stored file.
    pub content_id: String,
    /// Path of the file under the store's root.
    pub path: String,
}

/// Build the HTTP client shared by every publish adapter.
pub fn http_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| TokenListError::Network(format!("failed to build HTTP client: {e}")))
}
