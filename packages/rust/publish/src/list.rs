//! Loading the currently published list and writing local copies.

use std::path::Path;

use reqwest::{Client, StatusCode};
use tokenlist_shared::{Result, TokenListError, VersionedList};
use tracing::{debug, info, instrument};

/// Where the previously published list lives: a URL or a local file.
#[derive(Clone)]
pub struct ListLocation {
    client: Client,
    location: String,
}

impl ListLocation {
    pub fn new(client: Client, location: &str) -> Self {
        Self {
            client,
            location: location.trim().to_string(),
        }
    }

    fn is_remote(&self) -> bool {
        self.location.starts_with("http://") || self.location.starts_with("https://")
    }

    /// Load the list. A configured location always holds a published list,
    /// so an HTTP 404 or a missing file is an error, never "nothing yet".
    #[instrument(skip_all, fields(location = %self.location))]
    pub async fn fetch(&self) -> Result<VersionedList> {
        let raw = if self.is_remote() {
            self.fetch_remote().await?
        } else {
            tokio::fs::read_to_string(&self.location)
                .await
                .map_err(|e| TokenListError::io(&self.location, e))?
        };

        // Addresses are re-checksummed while deserializing.
        let list = VersionedList::from_json(&raw)?;
        info!(version = %list.version, tokens = list.tokens.len(), "loaded previous list");
        Ok(list)
    }

    async fn fetch_remote(&self) -> Result<String> {
        let response = self
            .client
            .get(&self.location)
            .header("pragma", "no-cache")
            .header("cache-control", "no-cache")
            .send()
            .await
            .map_err(|e| TokenListError::Network(format!("{}: {e}", self.location)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!("previous list not found");
            return Err(TokenListError::Network(format!(
                "{}: previous list not found (HTTP 404)",
                self.location
            )));
        }
        if !status.is_success() {
            return Err(TokenListError::Network(format!(
                "{}: HTTP {status}",
                self.location
            )));
        }

        response
            .text()
            .await
            .map_err(|e| TokenListError::Network(format!("{}: failed to read body: {e}", self.location)))
    }
}

/// Write a serialized list to `path`, creating parent directories.
pub fn write_list(path: &Path, json: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| TokenListError::io(parent, e))?;
    }
    std::fs::write(path, json).map_err(|e| TokenListError::io(path, e))?;
    info!(path = %path.display(), "list written");
    Ok(())
}
