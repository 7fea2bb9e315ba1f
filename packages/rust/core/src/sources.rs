//! Capability traits the pipeline runs against, and their implementations
//! for the chain and publish adapters.
//!
//! Tests swap any of these for in-memory fakes.

use std::collections::HashSet;

use alloy_primitives::{Address, FixedBytes};
use async_trait::async_trait;
use tracing::info;

use tokenlist_chain::{BadgeReader, ContractReader, CurateSubgraph, EnsUpdater, T2crTokens};
use tokenlist_publish::{
    Estuary, GatewayReader, IpfsGateway, ListLocation, Pinata, StoredContent, cid_v0,
};
use tokenlist_shared::{CurateEntry, Result, TokenRecord, VersionedList};

/// Raw token records, possibly with duplicates and zero-address padding.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch_all(&self, chain_id: u64) -> Result<Vec<TokenRecord>>;
}

/// Per-contract reads used while resolving decimals.
#[async_trait]
pub trait ContractProbe: Send + Sync {
    async fn decimals(&self, token: Address) -> Result<u8>;
    async fn supports_interface(&self, token: Address, interface_id: FixedBytes<4>) -> Result<bool>;
}

/// The curated decimals registry.
#[async_trait]
pub trait CurateRegistry: Send + Sync {
    async fn items(&self) -> Result<Vec<CurateEntry>>;
}

/// Membership of a badge registry.
#[async_trait]
pub trait BadgeSource: Send + Sync {
    async fn addresses_with_badge(&self, badge: Address) -> Result<HashSet<Address>>;
}

/// Content-addressed storage.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn publish(&self, name: &str, bytes: &[u8]) -> Result<StoredContent>;

    /// Id `publish` would return for `bytes`, computed without storing them.
    /// `None` when the store cannot tell in advance.
    fn content_id(&self, _bytes: &[u8]) -> Option<String> {
        None
    }
}

/// Long-term pinning of already stored content.
#[async_trait]
pub trait PinService: Send + Sync {
    async fn pin(&self, content_id: &str) -> Result<()>;
}

/// A human-readable pointer (ENS name) to the latest list.
#[async_trait]
pub trait NameService: Send + Sync {
    async fn update_pointer(&self, list_name: &str, content_id: &str) -> Result<()>;
}

/// The currently published list. `None` only for a source that stands for
/// "never published".
#[async_trait]
pub trait PreviousListSource: Send + Sync {
    async fn fetch(&self) -> Result<Option<VersionedList>>;
}

/// Raw bytes behind a logo URI path, for mirroring.
#[async_trait]
pub trait BlobSource: Send + Sync {
    async fn fetch_blob(&self, ipfs_path: &str) -> Result<Vec<u8>>;
}

/// Stand-in for a list that has never been published. Only an initial
/// publication accepts it.
pub struct NoPreviousList;

#[async_trait]
impl PreviousListSource for NoPreviousList {
    async fn fetch(&self) -> Result<Option<VersionedList>> {
        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// Adapter implementations
// ---------------------------------------------------------------------------

#[async_trait]
impl TokenSource for T2crTokens {
    async fn fetch_all(&self, chain_id: u64) -> Result<Vec<TokenRecord>> {
        T2crTokens::fetch_all(self, chain_id).await
    }
}

#[async_trait]
impl ContractProbe for ContractReader {
    async fn decimals(&self, token: Address) -> Result<u8> {
        ContractReader::decimals(self, token).await
    }

    async fn supports_interface(&self, token: Address, interface_id: FixedBytes<4>) -> Result<bool> {
        ContractReader::supports_interface(self, token, interface_id).await
    }
}

#[async_trait]
impl CurateRegistry for CurateSubgraph {
    async fn items(&self) -> Result<Vec<CurateEntry>> {
        CurateSubgraph::items(self).await
    }
}

#[async_trait]
impl BadgeSource for BadgeReader {
    async fn addresses_with_badge(&self, badge: Address) -> Result<HashSet<Address>> {
        BadgeReader::addresses_with_badge(self, badge).await
    }
}

#[async_trait]
impl ContentStore for IpfsGateway {
    async fn publish(&self, name: &str, bytes: &[u8]) -> Result<StoredContent> {
        self.add(name, bytes).await
    }

    fn content_id(&self, bytes: &[u8]) -> Option<String> {
        cid_v0(bytes)
    }
}

#[async_trait]
impl ContentStore for Estuary {
    async fn publish(&self, name: &str, bytes: &[u8]) -> Result<StoredContent> {
        self.upload(name, bytes).await
    }
}

#[async_trait]
impl PinService for Pinata {
    async fn pin(&self, content_id: &str) -> Result<()> {
        self.pin_by_hash(content_id).await
    }
}

#[async_trait]
impl NameService for EnsUpdater {
    async fn update_pointer(&self, list_name: &str, content_id: &str) -> Result<()> {
        let tx = self.set_content_hash(list_name, content_id).await?;
        info!(name = list_name, %tx, "name pointer updated");
        Ok(())
    }
}

#[async_trait]
impl PreviousListSource for ListLocation {
    async fn fetch(&self) -> Result<Option<VersionedList>> {
        ListLocation::fetch(self).await.map(Some)
    }
}

#[async_trait]
impl BlobSource for GatewayReader {
    async fn fetch_blob(&self, ipfs_path: &str) -> Result<Vec<u8>> {
        self.get(ipfs_path).await
    }
}
