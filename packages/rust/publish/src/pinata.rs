//! Pinata `pinByHash` client.

use reqwest::Client;
use serde_json::json;
use tokenlist_shared::{Result, TokenListError};
use tracing::{debug, instrument};

#[derive(Clone)]
pub struct Pinata {
    client: Client,
    base_url: String,
    api_key: String,
    secret_api_key: String,
}

impl Pinata {
    pub fn new(client: Client, base_url: &str, api_key: String, secret_api_key: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            secret_api_key,
        }
    }

    /// Ask Pinata to pin content that already exists on the IPFS network.
    #[instrument(skip_all, fields(content_id = %content_id))]
    pub async fn pin_by_hash(&self, content_id: &str) -> Result<()> {
        let url = format!("{}/pinning/pinByHash", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("pinata_api_key", &self.api_key)
            .header("pinata_secret_api_key", &self.secret_api_key)
            .json(&json!({ "hashToPin": content_id }))
            .send()
            .await
            .map_err(|e| TokenListError::Publish(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TokenListError::Publish(format!("{url}: HTTP {status}")));
        }
        debug!("pin requested");
        Ok(())
    }
}
