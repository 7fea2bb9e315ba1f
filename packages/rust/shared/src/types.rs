//! Core domain types for token lists.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use alloy_primitives::Address;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TokenListError};

/// The all-zero address used as padding by fixed-size view-contract batches.
pub const ZERO_ADDRESS: Address = Address::ZERO;

// ---------------------------------------------------------------------------
// Address serialization
// ---------------------------------------------------------------------------

/// Serde adapter that writes addresses in EIP-55 checksum form and accepts
/// any casing on input.
pub mod checksum {
    use alloy_primitives::Address;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(address: &Address, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&address.to_checksum(None))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Address, D::Error> {
        let raw = String::deserialize(d)?;
        raw.trim()
            .parse::<Address>()
            .map_err(|e| serde::de::Error::custom(format!("invalid address {raw:?}: {e}")))
    }
}

// ---------------------------------------------------------------------------
// TokenKey
// ---------------------------------------------------------------------------

/// Identity of a token inside a list: `(chainId, address)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenKey {
    pub chain_id: u64,
    pub address: Address,
}

impl fmt::Display for TokenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "eip155:{}:{}", self.chain_id, self.address.to_checksum(None))
    }
}

// ---------------------------------------------------------------------------
// NftStandard
// ---------------------------------------------------------------------------

/// Non-fungible token standards a contract can be reclassified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NftStandard {
    Erc721,
    Erc1155,
}

impl NftStandard {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Erc721 => "erc721",
            Self::Erc1155 => "erc1155",
        }
    }
}

impl fmt::Display for NftStandard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// TokenRecord
// ---------------------------------------------------------------------------

/// A single token entry, fungible (`decimals`) or non-fungible (`standard`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRecord {
    pub chain_id: u64,
    #[serde(with = "checksum")]
    pub address: Address,
    pub symbol: String,
    pub name: String,
    /// Decimal precision. `Some(0)` straight from a batch read is ambiguous.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standard: Option<NftStandard>,
    #[serde(rename = "logoURI", default, skip_serializing_if = "Option::is_none")]
    pub logo_uri: Option<String>,
    /// Tag keys in insertion order, no duplicates.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl TokenRecord {
    /// The `(chainId, address)` identity of this record.
    pub fn key(&self) -> TokenKey {
        TokenKey {
            chain_id: self.chain_id,
            address: self.address,
        }
    }

    /// True when decimals are missing or hold the ambiguous `0` sentinel and
    /// the record has not been reclassified.
    pub fn needs_decimals(&self) -> bool {
        self.standard.is_none() && self.decimals.unwrap_or(0) == 0
    }

    pub fn is_collectible(&self) -> bool {
        self.standard.is_some()
    }

    /// Append `tag` unless already present. Returns whether it was added.
    pub fn add_tag(&mut self, tag: &str) -> bool {
        if self.tags.iter().any(|t| t == tag) {
            return false;
        }
        self.tags.push(tag.to_string());
        true
    }

    /// Finalize as a fungible token.
    pub fn set_decimals(&mut self, decimals: u8) {
        self.decimals = Some(decimals);
        self.standard = None;
    }

    /// Move the record out of the fungible pipeline.
    pub fn reclassify(&mut self, standard: NftStandard) {
        self.decimals = None;
        self.standard = Some(standard);
    }
}

// ---------------------------------------------------------------------------
// Version
// ---------------------------------------------------------------------------

/// Semantic version of a published list.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    /// Version assigned to the first list ever published.
    pub const INITIAL: Version = Version {
        major: 1,
        minor: 0,
        patch: 0,
    };

    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    pub fn bump_major(self) -> Result<Self> {
        Ok(Self::new(increment(self, "major", self.major)?, 0, 0))
    }

    pub fn bump_minor(self) -> Result<Self> {
        Ok(Self::new(self.major, increment(self, "minor", self.minor)?, 0))
    }

    pub fn bump_patch(self) -> Result<Self> {
        Ok(Self::new(self.major, self.minor, increment(self, "patch", self.patch)?))
    }
}

fn increment(version: Version, component: &str, value: u32) -> Result<u32> {
    value.checked_add(1).ok_or_else(|| {
        TokenListError::validation(format!("cannot bump {component} of version {version}"))
    })
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

// ---------------------------------------------------------------------------
// VersionedList
// ---------------------------------------------------------------------------

/// Human-readable description of a tag key used by tokens in the list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagDefinition {
    pub name: String,
    pub description: String,
}

/// The published list document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionedList {
    pub name: String,
    #[serde(rename = "logoURI", default, skip_serializing_if = "Option::is_none")]
    pub logo_uri: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// ISO-8601 timestamp, kept verbatim so reloaded lists re-serialize identically.
    pub timestamp: String,
    pub version: Version,
    #[serde(default)]
    pub tags: BTreeMap<String, TagDefinition>,
    pub tokens: Vec<TokenRecord>,
}

impl VersionedList {
    /// Parse a list document from JSON.
    pub fn from_json(raw: &str) -> crate::Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| crate::TokenListError::decode(format!("invalid list document: {e}")))
    }

    /// Serialize to the canonical pretty-printed form that gets published.
    pub fn to_pretty_json(&self) -> crate::Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| crate::TokenListError::decode(format!("serialize list: {e}")))
    }
}

/// Format a timestamp the way list documents carry it (`2021-03-04T10:11:12.345Z`).
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

// ---------------------------------------------------------------------------
// CurateEntry
// ---------------------------------------------------------------------------

/// Submission state of an item in the curated decimals registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CurateStatus {
    /// Submitted, not yet crowdfunded.
    Pending,
    /// Deposit fully crowdfunded, awaiting the challenge period.
    Crowdfunded,
    /// Challenge period running; provisionally usable.
    PendingAccept,
    Accepted,
    Rejected,
}

impl FromStr for CurateStatus {
    type Err = crate::TokenListError;

    /// Accepts both the registry's own names and the generalized-registry
    /// subgraph status names.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['_', '-'], "").as_str() {
            "pending" | "registrationrequested" => Ok(Self::Pending),
            "crowdfunded" => Ok(Self::Crowdfunded),
            "pendingaccept" | "clearingrequested" => Ok(Self::PendingAccept),
            "accepted" | "registered" => Ok(Self::Accepted),
            "rejected" | "absent" => Ok(Self::Rejected),
            other => Err(crate::TokenListError::decode(format!(
                "unknown curate status: {other}"
            ))),
        }
    }
}

/// Decoded item of the curated decimals registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurateEntry {
    pub address: Address,
    pub decimals: u8,
    pub resolved: bool,
    pub status: CurateStatus,
}
