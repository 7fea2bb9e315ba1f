//! Estuary upload, the secondary content channel.

use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tokenlist_shared::{Result, TokenListError};
use tracing::{debug, instrument};

use crate::StoredContent;

#[derive(Deserialize)]
struct EstuaryUpload {
    cid: String,
}

/// Multipart uploader authenticated with a bearer token.
#[derive(Clone)]
pub struct Estuary {
    client: Client,
    base_url: String,
    api_key: String,
}

impl Estuary {
    pub fn new(client: Client, base_url: &str, api_key: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    #[instrument(skip_all, fields(file_name = %file_name, size = bytes.len()))]
    pub async fn upload(&self, file_name: &str, bytes: &[u8]) -> Result<StoredContent> {
        let url = format!("{}/content/add", self.base_url);
        let part = Part::bytes(bytes.to_vec()).file_name(file_name.to_string());
        let form = Form::new().part("data", part);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| TokenListError::Publish(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TokenListError::Publish(format!("{url}: HTTP {status} {body}")));
        }

        let parsed: EstuaryUpload = response
            .json()
            .await
            .map_err(|e| TokenListError::Publish(format!("{url}: unreadable response: {e}")))?;
        debug!(cid = %parsed.cid, "uploaded to estuary");

        Ok(StoredContent {
            path: format!("/ipfs/{}", parsed.cid),
            content_id: parsed.cid,
        })
    }
}
