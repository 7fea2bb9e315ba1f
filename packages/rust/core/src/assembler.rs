//! List document assembly.
//!
//! Folds finished token records into a [`VersionedList`] under the
//! configured header, and renders it to the exact bytes that get published.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

use tokenlist_shared::{
    BadgeConfig, ListConfig, Result, TagDefinition, TokenRecord, Version, VersionedList,
};

/// Everything in the document except version, timestamp and tokens.
#[derive(Debug, Clone, PartialEq)]
pub struct ListHeader {
    pub name: String,
    pub logo_uri: Option<String>,
    pub keywords: Vec<String>,
    pub tags: BTreeMap<String, TagDefinition>,
}

impl ListHeader {
    /// Header for the configured list. Every badge gets a tag definition,
    /// whether or not it has a registry address.
    pub fn from_config(list: &ListConfig, badges: &[BadgeConfig]) -> Self {
        Self {
            name: format!("Kleros {}", list.name),
            logo_uri: Some(list.logo_uri.clone()).filter(|uri| !uri.is_empty()),
            keywords: list.keywords.clone(),
            tags: badges
                .iter()
                .map(|b| (b.key.clone(), b.definition()))
                .collect(),
        }
    }
}

/// Build the list document. Tokens keep their order.
pub fn assemble(
    header: &ListHeader,
    version: Version,
    timestamp: &str,
    tokens: Vec<TokenRecord>,
) -> VersionedList {
    VersionedList {
        name: header.name.clone(),
        logo_uri: header.logo_uri.clone(),
        keywords: header.keywords.clone(),
        timestamp: timestamp.to_string(),
        version,
        tags: header.tags.clone(),
        tokens,
    }
}

/// The published bytes of a list and their digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedList {
    pub json: String,
    /// Lowercase hex SHA-256 of `json`.
    pub sha256: String,
}

#[instrument(skip_all, fields(version = %list.version, tokens = list.tokens.len()))]
pub fn render(list: &VersionedList) -> Result<RenderedList> {
    let json = list.to_pretty_json()?;

    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    let sha256 = format!("{:x}", hasher.finalize());

    debug!(size = json.len(), %sha256, "rendered list");
    Ok(RenderedList { json, sha256 })
}
