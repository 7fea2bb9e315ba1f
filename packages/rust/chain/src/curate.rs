//! Curated decimals registry, read through its subgraph.
//!
//! Each registry item carries two decoded columns, `[address, decimals]`, plus
//! its submission status and whether its latest request has been resolved.

use std::time::Duration;

use alloy_primitives::Address;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tokenlist_shared::{CurateEntry, CurateStatus, Result, TokenListError};
use tracing::{debug, info, instrument, warn};

/// Items requested per subgraph page (the subgraph maximum).
const PAGE_SIZE: usize = 1000;

const ITEMS_QUERY: &str = r#"
query Items($registry: String!, $first: Int!, $skip: Int!) {
  items(where: { registry: $registry }, first: $first, skip: $skip, orderBy: itemID) {
    itemID
    status
    decodedData
    latestRequestResolved
  }
}"#;

#[derive(Deserialize)]
struct GraphResponse {
    data: Option<ItemsData>,
    #[serde(default)]
    errors: Vec<GraphError>,
}

#[derive(Deserialize)]
struct GraphError {
    message: String,
}

#[derive(Deserialize)]
struct ItemsData {
    items: Vec<RawItem>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawItem {
    #[serde(rename = "itemID")]
    item_id: String,
    status: String,
    #[serde(default)]
    decoded_data: Vec<String>,
    #[serde(default)]
    latest_request_resolved: bool,
}

/// Subgraph client for the curated decimals registry.
pub struct CurateSubgraph {
    client: Client,
    url: String,
    registry: Address,
}

impl CurateSubgraph {
    pub fn new(url: &str, registry: Address, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| TokenListError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.to_string(),
            registry,
        })
    }

    /// Fetch every item of the registry. Items whose columns do not decode are skipped.
    #[instrument(skip_all, fields(registry = %self.registry))]
    pub async fn items(&self) -> Result<Vec<CurateEntry>> {
        let mut entries = Vec::new();
        let mut skip = 0usize;
        // The subgraph indexes registry ids in lowercase.
        let registry = format!("{:#x}", self.registry);

        loop {
            let body = json!({
                "query": ITEMS_QUERY,
                "variables": { "registry": registry, "first": PAGE_SIZE, "skip": skip },
            });
            let response = self
                .client
                .post(&self.url)
                .json(&body)
                .send()
                .await
                .map_err(|e| TokenListError::Network(format!("curate subgraph: {e}")))?;

            let status = response.status();
            if !status.is_success() {
                return Err(TokenListError::Network(format!("curate subgraph: HTTP {status}")));
            }

            let parsed: GraphResponse = response
                .json()
                .await
                .map_err(|e| TokenListError::decode(format!("curate subgraph: {e}")))?;
            if let Some(err) = parsed.errors.first() {
                return Err(TokenListError::decode(format!(
                    "curate subgraph query failed: {}",
                    err.message
                )));
            }
            let items = parsed.data.map(|d| d.items).unwrap_or_default();
            let page_len = items.len();
            debug!(skip, page_len, "curate page");

            entries.extend(items.into_iter().filter_map(decode_item));

            if page_len < PAGE_SIZE {
                break;
            }
            skip += PAGE_SIZE;
        }

        info!(count = entries.len(), "fetched curated decimals");
        Ok(entries)
    }
}

fn decode_item(item: RawItem) -> Option<CurateEntry> {
    let decoded = (|| {
        let [address, decimals] = item.decoded_data.as_slice() else {
            return None;
        };
        Some(CurateEntry {
            address: address.trim().parse().ok()?,
            decimals: decimals.trim().parse().ok()?,
            resolved: item.latest_request_resolved,
            status: item.status.parse::<CurateStatus>().ok()?,
        })
    })();
    if decoded.is_none() {
        warn!(item = %item.item_id, "skipping undecodable curate item");
    }
    decoded
}
