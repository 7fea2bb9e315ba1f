//! In-memory fakes for every pipeline seam.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use alloy_primitives::{Address, FixedBytes};
use async_trait::async_trait;
use sha2::{Digest, Sha256};

use tokenlist_publish::StoredContent;
use tokenlist_shared::{CurateEntry, Result, TokenListError, TokenRecord, VersionedList};

use crate::sources::{
    BadgeSource, BlobSource, ContentStore, ContractProbe, CurateRegistry, NameService,
    PinService, PreviousListSource, TokenSource,
};

pub fn token(byte: u8, symbol: &str, decimals: Option<u8>) -> TokenRecord {
    TokenRecord {
        chain_id: 1,
        address: Address::repeat_byte(byte),
        symbol: symbol.into(),
        name: format!("{symbol} Token"),
        decimals,
        standard: None,
        logo_uri: None,
        tags: vec![],
    }
}

fn revert() -> TokenListError {
    TokenListError::Rpc {
        code: 3,
        message: "execution reverted".into(),
    }
}

#[derive(Default)]
pub struct FakeTokens {
    pub records: Vec<TokenRecord>,
}

#[async_trait]
impl TokenSource for FakeTokens {
    async fn fetch_all(&self, _chain_id: u64) -> Result<Vec<TokenRecord>> {
        Ok(self.records.clone())
    }
}

#[derive(Default)]
pub struct FakeProbe {
    decimals: HashMap<Address, u8>,
    interfaces: HashMap<Address, Vec<FixedBytes<4>>>,
    called: Mutex<Vec<Address>>,
}

impl FakeProbe {
    pub fn with_decimals(mut self, byte: u8, decimals: u8) -> Self {
        self.decimals.insert(Address::repeat_byte(byte), decimals);
        self
    }

    pub fn with_interface(mut self, byte: u8, id: FixedBytes<4>) -> Self {
        self.interfaces
            .entry(Address::repeat_byte(byte))
            .or_default()
            .push(id);
        self
    }

    pub fn was_called(&self, token: Address) -> bool {
        self.called.lock().unwrap().contains(&token)
    }
}

#[async_trait]
impl ContractProbe for FakeProbe {
    async fn decimals(&self, token: Address) -> Result<u8> {
        self.called.lock().unwrap().push(token);
        self.decimals.get(&token).copied().ok_or_else(revert)
    }

    async fn supports_interface(&self, token: Address, interface_id: FixedBytes<4>) -> Result<bool> {
        self.called.lock().unwrap().push(token);
        match self.interfaces.get(&token) {
            Some(ids) => Ok(ids.contains(&interface_id)),
            None => Err(revert()),
        }
    }
}

pub struct FakeCurate {
    entries: Option<Vec<CurateEntry>>,
    calls: AtomicUsize,
}

impl FakeCurate {
    pub fn new(entries: Vec<CurateEntry>) -> Self {
        Self {
            entries: Some(entries),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            entries: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CurateRegistry for FakeCurate {
    async fn items(&self) -> Result<Vec<CurateEntry>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entries
            .clone()
            .ok_or_else(|| TokenListError::Network("subgraph down".into()))
    }
}

#[derive(Default)]
pub struct FakeBadges {
    members: HashMap<Address, HashSet<Address>>,
}

impl FakeBadges {
    pub fn with_badge(mut self, badge: Address, members: &[u8]) -> Self {
        self.members.insert(
            badge,
            members.iter().map(|b| Address::repeat_byte(*b)).collect(),
        );
        self
    }
}

#[async_trait]
impl BadgeSource for FakeBadges {
    async fn addresses_with_badge(&self, badge: Address) -> Result<HashSet<Address>> {
        self.members
            .get(&badge)
            .cloned()
            .ok_or_else(|| TokenListError::Network(format!("badge {badge} unreachable")))
    }
}

/// Content store that derives ids from the upload count and can fail a set
/// number of times first. An `addressed` store derives them from the bytes
/// instead and can predict them.
pub struct FakeStore {
    prefix: &'static str,
    failures_left: AtomicUsize,
    permanent: bool,
    addressed: bool,
    pub uploads: Mutex<Vec<(String, Vec<u8>)>>,
}

impl FakeStore {
    pub fn new(prefix: &'static str) -> Self {
        Self {
            prefix,
            failures_left: AtomicUsize::new(0),
            permanent: false,
            addressed: false,
            uploads: Mutex::new(Vec::new()),
        }
    }

    pub fn addressed(prefix: &'static str) -> Self {
        Self {
            addressed: true,
            ..Self::new(prefix)
        }
    }

    fn address_of(&self, bytes: &[u8]) -> String {
        let digest = format!("{:x}", Sha256::digest(bytes));
        format!("{}{}", self.prefix, &digest[..16])
    }

    pub fn failing(prefix: &'static str, times: usize) -> Self {
        let store = Self::new(prefix);
        store.failures_left.store(times, Ordering::SeqCst);
        store
    }

    pub fn broken(prefix: &'static str) -> Self {
        Self {
            permanent: true,
            ..Self::new(prefix)
        }
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }
}

#[async_trait]
impl ContentStore for FakeStore {
    async fn publish(&self, name: &str, bytes: &[u8]) -> Result<StoredContent> {
        if self.permanent {
            return Err(TokenListError::Publish(format!("{} unavailable", self.prefix)));
        }
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(TokenListError::Publish(format!("{} timed out", self.prefix)));
        }
        let mut uploads = self.uploads.lock().unwrap();
        uploads.push((name.to_string(), bytes.to_vec()));
        let content_id = if self.addressed {
            self.address_of(bytes)
        } else {
            format!("{}{}", self.prefix, uploads.len())
        };
        Ok(StoredContent {
            path: format!("/{name}"),
            content_id,
        })
    }

    fn content_id(&self, bytes: &[u8]) -> Option<String> {
        self.addressed.then(|| self.address_of(bytes))
    }
}

#[derive(Default)]
pub struct FakePin {
    pub pinned: Mutex<Vec<String>>,
    pub broken: bool,
}

#[async_trait]
impl PinService for FakePin {
    async fn pin(&self, content_id: &str) -> Result<()> {
        if self.broken {
            return Err(TokenListError::Publish("pinning rejected".into()));
        }
        self.pinned.lock().unwrap().push(content_id.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeNames {
    pub pointers: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl NameService for FakeNames {
    async fn update_pointer(&self, list_name: &str, content_id: &str) -> Result<()> {
        self.pointers
            .lock()
            .unwrap()
            .push((list_name.to_string(), content_id.to_string()));
        Ok(())
    }
}

pub struct FakePrevious(pub Option<VersionedList>);

#[async_trait]
impl PreviousListSource for FakePrevious {
    async fn fetch(&self) -> Result<Option<VersionedList>> {
        Ok(self.0.clone())
    }
}

#[derive(Default)]
pub struct FakeBlobs {
    pub fetched: Mutex<Vec<String>>,
}

#[async_trait]
impl BlobSource for FakeBlobs {
    async fn fetch_blob(&self, ipfs_path: &str) -> Result<Vec<u8>> {
        self.fetched.lock().unwrap().push(ipfs_path.to_string());
        if ipfs_path.contains("missing") {
            return Err(TokenListError::Network("404".into()));
        }
        Ok(ipfs_path.as_bytes().to_vec())
    }
}
