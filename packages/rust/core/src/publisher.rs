//! Upload, pinning, and pointer update of a finished document.

use tracing::{info, instrument, warn};

use tokenlist_publish::{RetryPolicy, StoredContent, retry};
use tokenlist_shared::{Result, TokenListError};

use crate::sources::{ContentStore, NameService, PinService};

/// Where a list ended up after publishing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    pub content_id: String,
    pub path: String,
    /// Label of the upload channel that accepted the file.
    pub channel: String,
    pub pinned: bool,
    /// Name now pointing at `content_id`, if one is configured.
    pub pointer: Option<String>,
}

/// Publish-side sinks, each call wrapped in the same retry policy.
pub struct Publisher<'a> {
    stores: Vec<(String, &'a dyn ContentStore)>,
    pin: Option<&'a dyn PinService>,
    names: Option<(String, &'a dyn NameService)>,
    policy: RetryPolicy,
}

impl<'a> Publisher<'a> {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            stores: Vec::new(),
            pin: None,
            names: None,
            policy,
        }
    }

    /// Add an upload channel. Channels are tried in the order added.
    pub fn with_store(mut self, label: impl Into<String>, store: &'a dyn ContentStore) -> Self {
        self.stores.push((label.into(), store));
        self
    }

    pub fn with_pin(mut self, pin: &'a dyn PinService) -> Self {
        self.pin = Some(pin);
        self
    }

    pub fn with_name(mut self, list_name: impl Into<String>, names: &'a dyn NameService) -> Self {
        self.names = Some((list_name.into(), names));
        self
    }

    pub fn channels(&self) -> impl Iterator<Item = &str> {
        self.stores.iter().map(|(label, _)| label.as_str())
    }

    /// Id the first channel able to predict one would give `bytes`. Nothing
    /// is stored.
    pub fn content_id(&self, bytes: &[u8]) -> Option<String> {
        self.stores.iter().find_map(|(_, store)| store.content_id(bytes))
    }

    /// Store `bytes` on the first channel that accepts them within the retry
    /// policy. Returns the stored content and the channel label.
    #[instrument(skip_all, fields(name = %name, size = bytes.len()))]
    pub async fn upload(&self, name: &str, bytes: &[u8]) -> Result<(StoredContent, String)> {
        let mut failures = Vec::new();

        for (label, store) in &self.stores {
            match retry(&self.policy, label, || store.publish(name, bytes)).await {
                Ok(stored) => {
                    info!(channel = %label, content_id = %stored.content_id, "uploaded");
                    return Ok((stored, label.clone()));
                }
                Err(e) => {
                    warn!(channel = %label, error = %e, "upload channel exhausted");
                    failures.push(format!("{label}: {e}"));
                }
            }
        }

        if failures.is_empty() {
            return Err(TokenListError::Publish(
                "no upload channel configured".into(),
            ));
        }
        Err(TokenListError::Publish(format!(
            "every upload channel failed ({})",
            failures.join("; ")
        )))
    }

    /// Upload the list, pin it, and move the name pointer. Any step failing
    /// after its retries fails the publication.
    #[instrument(skip_all, fields(file_name = %file_name))]
    pub async fn publish_list(&self, file_name: &str, bytes: &[u8]) -> Result<PublishReceipt> {
        let (stored, channel) = self.upload(file_name, bytes).await?;
        let content_id = stored.content_id.as_str();

        let pinned = match self.pin {
            Some(pin) => {
                retry(&self.policy, "pin", || pin.pin(content_id)).await?;
                info!(%content_id, "pinned");
                true
            }
            None => false,
        };

        let pointer = match &self.names {
            Some((list_name, names)) => {
                retry(&self.policy, "name pointer", || {
                    names.update_pointer(list_name, content_id)
                })
                .await?;
                Some(list_name.clone())
            }
            None => None,
        };

        Ok(PublishReceipt {
            content_id: stored.content_id.clone(),
            path: stored.path,
            channel,
            pinned,
            pointer,
        })
    }
}
